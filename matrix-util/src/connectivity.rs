use fnv::FnvHashMap as HashMap;
use log::info;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Connectivities of a kNN distance graph.
///
/// Each cell gets a local scale: `rho`, its nearest distance, and a
/// bandwidth `sigma` making its memberships sum to `log2(k)`. A
/// neighbour at distance `d` belongs to the cell with strength
/// `exp(-(d - rho) / sigma)`, so the nearest one always gets 1. The two
/// directions of an edge are merged as a probabilistic union
/// `a + b - a * b`.
///
/// * `knn_dist` - cell x cell distances, row `i` storing the neighbours of `i`
///
/// Returns a symmetric cell x cell matrix with weights in (0, 1].
pub fn umap_connectivities(knn_dist: &CsrMatrix<f32>) -> CsrMatrix<f32> {
    let nn = knn_dist.nrows();

    let mut directed: HashMap<(usize, usize), f32> = HashMap::default();
    for (i, row) in knn_dist.row_iter().enumerate() {
        if row.nnz() == 0 {
            continue;
        }
        let scale = LocalScale::fit(row.values());
        for (&j, &d) in row.col_indices().iter().zip(row.values()) {
            if i != j {
                directed.insert((i, j), scale.membership(d));
            }
        }
    }

    let mut coo = CooMatrix::new(nn, nn);
    for (&(i, j), &a) in directed.iter() {
        match directed.get(&(j, i)) {
            // the reverse edge pushes its own entry
            Some(&b) if a + b > 0. => coo.push(i, j, a + b - a * b),
            Some(_) => {}
            None if a > 0. => {
                coo.push(i, j, a);
                coo.push(j, i, a);
            }
            None => {}
        }
    }

    let conn = CsrMatrix::from(&coo);
    info!("{} connectivities among {} cells", conn.nnz(), nn);
    conn
}

/// Nearest distance and bandwidth of one cell
struct LocalScale {
    rho: f32,
    sigma: f32,
}

impl LocalScale {
    const MAX_STEPS: usize = 64;
    const TOLERANCE: f32 = 1e-5;

    /// Bisect on `sigma` (the membership total grows with it), doubling
    /// until the target is bracketed. `sigma` is floored at a thousandth
    /// of the mean distance.
    fn fit(dists: &[f32]) -> Self {
        let rho = dists.iter().copied().fold(f32::INFINITY, f32::min);
        let target = (dists.len() as f32).log2();
        let floor = 1e-3 * dists.iter().sum::<f32>() / dists.len().max(1) as f32;

        let mut lower = 0_f32;
        let mut upper: Option<f32> = None;
        let mut sigma = 1_f32;

        for _ in 0..Self::MAX_STEPS {
            let total: f32 = dists.iter().map(|&d| Self { rho, sigma }.membership(d)).sum();
            if (total - target).abs() < Self::TOLERANCE {
                break;
            }
            if total > target {
                upper = Some(sigma);
            } else {
                lower = sigma;
            }
            sigma = match upper {
                Some(u) => 0.5 * (lower + u),
                None => 2. * sigma,
            };
        }

        Self {
            rho,
            sigma: sigma.max(floor),
        }
    }

    fn membership(&self, d: f32) -> f32 {
        if !d.is_finite() || self.sigma <= 0. {
            return 0.;
        }
        (-(d - self.rho).max(0.) / self.sigma).exp()
    }
}
