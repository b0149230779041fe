//! Neighbour pruning on sparse distance matrices and bounded multi-hop
//! neighbourhood closure.

use crate::connectivity::umap_connectivities;
use crate::sparse_util::{retain_entries, row_entries};
use log::info;
use nalgebra_sparse::CsrMatrix;
use rand::Rng;

/// Shift added to stored distances so that a true zero distance is not
/// mistaken for a missing entry
pub const DISTANCE_EPS: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NeighborMode {
    /// neighbours are the surviving columns of the pruned distances
    #[default]
    Distances,
    /// neighbours are the non-zero columns of the fuzzy connectivities
    Connectivities,
}

/// Fixed-capacity neighbour table with an explicit valid count per row.
///
/// Row `i` occupies `indices[i * width .. i * width + n_valid[i]]`; the
/// remaining slots of a row are unused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborIndices {
    width: usize,
    indices: Vec<usize>,
    n_valid: Vec<usize>,
}

impl NeighborIndices {
    /// Build a table from variable-length rows. The width is the longest
    /// row.
    ///
    /// * `rows` - neighbour indices of each cell
    pub fn from_rows(rows: &[Vec<usize>]) -> anyhow::Result<Self> {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        Self::from_rows_with_width(rows, width)
    }

    /// Build a table from rows with a given capacity per row
    pub fn from_rows_with_width(rows: &[Vec<usize>], width: usize) -> anyhow::Result<Self> {
        let n_cells = rows.len();
        let mut indices = vec![0; n_cells * width];
        let mut n_valid = Vec::with_capacity(n_cells);

        for (i, row) in rows.iter().enumerate() {
            if row.len() > width {
                anyhow::bail!("row {} has {} > {} neighbours", i, row.len(), width);
            }
            if let Some(&j) = row.iter().find(|&&j| j >= n_cells) {
                anyhow::bail!("neighbour {} of row {} out of range {}", j, i, n_cells);
            }
            indices[i * width..i * width + row.len()].copy_from_slice(row);
            n_valid.push(row.len());
        }

        Ok(Self {
            width,
            indices,
            n_valid,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.n_valid.len()
    }

    /// Capacity of each row
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn num_valid(&self, cell: usize) -> usize {
        self.n_valid[cell]
    }

    /// Valid neighbours of `cell`
    pub fn row(&self, cell: usize) -> &[usize] {
        let start = cell * self.width;
        &self.indices[start..start + self.n_valid[cell]]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[usize]> + '_ {
        (0..self.num_cells()).map(move |i| self.row(i))
    }

    /// True if every row is filled up to the width
    pub fn is_full(&self) -> bool {
        self.n_valid.iter().all(|&n| n == self.width)
    }
}

/// Prune a sparse distance matrix so that every row keeps the same
/// number of nearest neighbours.
///
/// The effective number of neighbours is the smaller of `n_neighbors`
/// and the fewest stored entries of any row. Rows with more entries keep
/// only the closest ones; ties keep the storage order.
///
/// * `dist` - cell x cell distances; stored entries mark candidates
/// * `n_neighbors` - requested neighbours per cell (all if `None`)
/// * `mode` - where to read the neighbour table from
///
/// Returns the neighbour table and the pruned distances.
pub fn get_indices(
    dist: &CsrMatrix<f32>,
    n_neighbors: Option<usize>,
    mode: NeighborMode,
) -> anyhow::Result<(NeighborIndices, CsrMatrix<f32>)> {
    if dist.nrows() != dist.ncols() {
        anyhow::bail!(
            "distance matrix must be square: {} x {}",
            dist.nrows(),
            dist.ncols()
        );
    }

    let nn = dist.nrows();

    // an entry counts as present if it survives the epsilon shift
    let is_present = |x: f32| x + DISTANCE_EPS > 0.;

    let n_counts: Vec<usize> = (0..nn)
        .map(|i| row_entries(dist, i).1.iter().filter(|&&x| is_present(x)).count())
        .collect();

    let min_count = n_counts.iter().copied().min().unwrap_or(0);
    let knn = n_neighbors.map_or(min_count, |k| k.min(min_count));

    if let Some(k) = n_neighbors.filter(|&k| k > min_count) {
        info!("reduced n_neighbors from {} to {}", k, knn);
    }

    // mark stored positions to keep
    let mut keep = vec![false; dist.nnz()];
    let offsets = dist.row_offsets();

    for i in 0..nn {
        let start = offsets[i];
        let (_, values) = row_entries(dist, i);

        let mut candidates: Vec<usize> = (0..values.len())
            .filter(|&p| is_present(values[p]))
            .collect();

        if n_counts[i] > knn {
            // stable: equal distances keep storage order
            candidates.sort_by(|&a, &b| {
                values[a]
                    .partial_cmp(&values[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            candidates.truncate(knn);
        }

        for p in candidates {
            keep[start + p] = true;
        }
    }

    let positions = position_lookup(dist);
    let pruned = retain_entries(dist, |i, j, _| keep[positions(i, j)])?;

    let indices = match mode {
        NeighborMode::Distances => {
            let rows: Vec<Vec<usize>> = pruned
                .row_iter()
                .map(|r| r.col_indices().to_vec())
                .collect();
            NeighborIndices::from_rows_with_width(&rows, knn)?
        }
        NeighborMode::Connectivities => {
            let conn = umap_connectivities(&pruned);
            indices_from_connectivities(&conn)?
        }
    };

    Ok((indices, pruned))
}

/// Map `(row, col)` of a stored entry back to its position in the value
/// array
fn position_lookup(csr: &CsrMatrix<f32>) -> impl Fn(usize, usize) -> usize + '_ {
    move |i, j| {
        let start = csr.row_offsets()[i];
        let (cols, _) = row_entries(csr, i);
        // columns of a valid csr row are sorted
        start + cols.partition_point(|&c| c < j)
    }
}

/// Extract the non-zero columns of each connectivity row. The table is
/// as wide as the densest row; shorter rows carry fewer valid entries.
pub fn indices_from_connectivities(conn: &CsrMatrix<f32>) -> anyhow::Result<NeighborIndices> {
    let rows: Vec<Vec<usize>> = conn
        .row_iter()
        .map(|r| {
            r.col_indices()
                .iter()
                .zip(r.values())
                .filter(|(_, x)| **x > 0.)
                .map(|(&j, _)| j)
                .collect()
        })
        .collect();
    NeighborIndices::from_rows(&rows)
}

/// Cells reachable from `index` within `n_recurse_neighbors` hops of the
/// neighbour graph, the seed included.
///
/// * `indices` - neighbour table
/// * `index` - seed cell
/// * `n_recurse_neighbors` - number of hops (0 returns the seed alone)
/// * `max_neighs` - if the closure is larger, sample this many cells
///   uniformly without replacement
/// * `rng` - random source for the sampling
///
/// Returns sorted cell indices.
pub fn get_iterative_indices<R: Rng>(
    indices: &NeighborIndices,
    index: usize,
    n_recurse_neighbors: usize,
    max_neighs: Option<usize>,
    rng: &mut R,
) -> anyhow::Result<Vec<usize>> {
    let nn = indices.num_cells();
    if index >= nn {
        anyhow::bail!("seed {} out of range {}", index, nn);
    }

    let mut visited = vec![false; nn];
    visited[index] = true;
    let mut closure = vec![index];
    let mut frontier = vec![index];

    for _ in 0..n_recurse_neighbors {
        let mut next = vec![];
        for &i in frontier.iter() {
            for &j in indices.row(i) {
                if !visited[j] {
                    visited[j] = true;
                    next.push(j);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        closure.extend_from_slice(&next);
        frontier = next;
    }

    closure.sort_unstable();

    match max_neighs {
        Some(m) if closure.len() > m => {
            let mut sampled: Vec<usize> = rand::seq::index::sample(rng, closure.len(), m)
                .into_iter()
                .map(|p| closure[p])
                .collect();
            sampled.sort_unstable();
            Ok(sampled)
        }
        _ => Ok(closure),
    }
}

/// Bounded closures for every cell
pub fn get_iterative_indices_all<R: Rng>(
    indices: &NeighborIndices,
    n_recurse_neighbors: usize,
    max_neighs: Option<usize>,
    rng: &mut R,
) -> anyhow::Result<Vec<Vec<usize>>> {
    (0..indices.num_cells())
        .map(|i| get_iterative_indices(indices, i, n_recurse_neighbors, max_neighs, rng))
        .collect()
}
