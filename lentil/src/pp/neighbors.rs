use anno_data::{AnnError, AnnotatedData};
use log::info;
use matrix_util::connectivity::umap_connectivities;
use matrix_util::dmatrix_rsvd::pca_scores;
use matrix_util::knn::knn_distances;
use matrix_util::neighbors::{get_indices, NeighborMode};
use matrix_util::sparse_util::{csr_from_parts, map_values, row_sums, scale_rows};
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;

pub const DISTANCES_KEY: &str = "distances";
pub const CONNECTIVITIES_KEY: &str = "connectivities";
pub const PCA_KEY: &str = "X_pca";

#[derive(Clone, Debug)]
pub struct NeighborsArgs {
    /// neighbourhood size, the cell itself included
    pub n_neighbors: usize,
    /// principal components of `X`; `X` itself is used when zero
    pub n_pcs: usize,
    /// embedding to use instead of principal components
    pub use_rep: Option<String>,
    /// random seed of the randomized SVD
    pub seed: u64,
}

impl Default for NeighborsArgs {
    fn default() -> Self {
        Self {
            n_neighbors: 30,
            n_pcs: 30,
            use_rep: None,
            seed: 42,
        }
    }
}

/// Cell representation for the neighbour search: a given embedding,
/// an existing `X_pca` with enough components, fresh principal
/// components of `X` (stored as `X_pca`), or `X` itself
fn representation<A>(adata: &mut A, args: &NeighborsArgs) -> anyhow::Result<DMatrix<f32>>
where
    A: AnnotatedData + ?Sized,
{
    if let Some(key) = &args.use_rep {
        return Ok(adata.obsm(key)?.clone());
    }

    let n_pcs = args.n_pcs.min(adata.n_obs()).min(adata.n_vars());
    if n_pcs == 0 {
        return Ok(adata.x().to_dense());
    }

    if let Ok(pcs) = adata.obsm(PCA_KEY) {
        if pcs.ncols() >= n_pcs {
            return Ok(pcs.columns(0, n_pcs).into_owned());
        }
    }

    info!("{} principal components of {} x {}", n_pcs, adata.n_obs(), adata.n_vars());
    let pcs = pca_scores(&adata.x().to_dense(), n_pcs, args.seed)?;
    adata.set_obsm(PCA_KEY, pcs.clone())?;
    Ok(pcs)
}

/// Build the kNN graph of the cells.
///
/// Stores the `n_neighbors - 1` nearest distances per cell as the
/// `distances` graph and their fuzzy union as `connectivities`, and a
/// record of the parameters in the unstructured store under
/// `neighbors`.
pub fn neighbors<A>(adata: &mut A, args: &NeighborsArgs) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    if args.n_neighbors < 2 {
        return Err(AnnError::InvalidConfig(format!(
            "n_neighbors = {} leaves no neighbour besides the cell itself",
            args.n_neighbors
        ))
        .into());
    }

    let rep = representation(adata, args)?;
    let distances = knn_distances(&rep, args.n_neighbors - 1)?;
    let connectivities = umap_connectivities(&distances);

    info!(
        "kNN graph: {} cells, {} distances, {} connectivities",
        distances.nrows(),
        distances.nnz(),
        connectivities.nnz()
    );

    adata.set_graph(DISTANCES_KEY, distances)?;
    adata.set_graph(CONNECTIVITIES_KEY, connectivities)?;
    adata.set_uns(
        "neighbors",
        serde_json::json!({
            "params": {
                "n_neighbors": args.n_neighbors,
                "n_pcs": args.n_pcs,
                "use_rep": args.use_rep,
                "method": "umap",
            }
        }),
    );
    Ok(())
}

/// Number of neighbours per cell in the `distances` graph (the fewest
/// over all cells)
pub fn get_n_neighs<A>(adata: &A) -> anyhow::Result<usize>
where
    A: AnnotatedData + ?Sized,
{
    let dist = adata.graph(DISTANCES_KEY)?;
    Ok(dist.row_iter().map(|r| r.nnz()).min().unwrap_or(0))
}

/// 0/1 matrix of the given rows with every diagonal entry set
fn binary_with_self_loops<I>(rows: I, nn: usize) -> anyhow::Result<CsrMatrix<f32>>
where
    I: Iterator<Item = Vec<usize>>,
{
    let mut row_offsets = Vec::with_capacity(nn + 1);
    let mut col_indices = vec![];
    row_offsets.push(0);
    for (i, mut cols) in rows.enumerate() {
        cols.push(i);
        cols.sort_unstable();
        cols.dedup();
        col_indices.extend(cols);
        row_offsets.push(col_indices.len());
    }
    let values = vec![1_f32; col_indices.len()];
    csr_from_parts(nn, nn, row_offsets, col_indices, values)
}

/// Row-stochastic neighbourhood weights with self loops.
///
/// * `mode` - read neighbours from the pruned `distances` or from the
///   non-zero `connectivities`
/// * `n_neighbors` - prune the `distances` graph down to this many
///   neighbours first (only if fewer than it holds)
/// * `recurse_neighbors` - add half the weight of second-order
///   neighbours, clipped to 1 before normalization
pub fn get_connectivities<A>(
    adata: &A,
    mode: NeighborMode,
    n_neighbors: Option<usize>,
    recurse_neighbors: bool,
) -> anyhow::Result<CsrMatrix<f32>>
where
    A: AnnotatedData + ?Sized,
{
    let nn = adata.n_obs();

    let prune = match n_neighbors {
        Some(k) => k < get_n_neighs(adata)?,
        None => false,
    };

    let binary = if prune || mode == NeighborMode::Distances {
        let dist = adata.graph(DISTANCES_KEY)?;
        let (indices, _) = get_indices(dist, n_neighbors, NeighborMode::Distances)?;
        binary_with_self_loops(indices.rows().map(|r| r.to_vec()), nn)?
    } else {
        let conn = adata.graph(CONNECTIVITIES_KEY)?;
        let rows = conn.row_iter().map(|r| {
            r.col_indices()
                .iter()
                .zip(r.values())
                .filter(|&(_, &x)| x > 0.)
                .map(|(&j, _)| j)
                .collect::<Vec<_>>()
        });
        binary_with_self_loops(rows, nn)?
    };

    let conn = if recurse_neighbors {
        let half = map_values(&binary, |x| 0.5 * x);
        let second = &binary * &half;
        map_values(&(&binary + &second), |x| x.clamp(0., 1.))
    } else {
        binary
    };

    let inv: Vec<f32> = row_sums(&conn)
        .into_iter()
        .map(|s| if s > 0. { 1. / s } else { 0. })
        .collect();
    Ok(scale_rows(&conn, &inv))
}
