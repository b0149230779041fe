use crate::pp::neighbors::{get_connectivities, get_n_neighs, neighbors, NeighborsArgs};
use anno_data::{AnnotatedData, Layer};
use log::info;
use matrix_util::neighbors::NeighborMode;
use matrix_util::sparse_util::to_dense;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;

#[derive(Clone, Debug)]
pub struct MomentsArgs {
    /// neighbourhood size, the cell itself included; the kNN graph is
    /// (re)built when missing or smaller
    pub n_neighbors: Option<usize>,
    /// read neighbours from `distances` or from `connectivities`
    pub mode: NeighborMode,
    /// how to build the kNN graph when needed
    pub neighbors: NeighborsArgs,
}

impl Default for MomentsArgs {
    fn default() -> Self {
        Self {
            n_neighbors: None,
            mode: NeighborMode::Connectivities,
            neighbors: NeighborsArgs::default(),
        }
    }
}

/// `cc * xx` as a dense matrix
pub fn smooth_layer(cc: &CsrMatrix<f32>, xx: &Layer) -> DMatrix<f32> {
    match xx {
        Layer::Dense(x) => cc * x,
        Layer::Sparse(x) => to_dense(&(cc * x)),
    }
}

/// First-order moments `Ms` and `Mu`: spliced and unspliced counts
/// averaged over each cell's neighbourhood (the cell included).
pub fn moments<A>(adata: &mut A, args: &MomentsArgs) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let stored = match get_n_neighs(adata) {
        Ok(k) if adata.graph("connectivities").is_ok() => Some(k),
        _ => None,
    };

    let wanted = args.n_neighbors.unwrap_or(args.neighbors.n_neighbors);
    if stored.map_or(true, |k| k + 1 < wanted) {
        let nargs = NeighborsArgs {
            n_neighbors: wanted,
            ..args.neighbors.clone()
        };
        neighbors(adata, &nargs)?;
    }

    let prune = args.n_neighbors.map(|k| k.saturating_sub(1));
    let cc = get_connectivities(adata, args.mode, prune, false)?;

    let ms = smooth_layer(&cc, adata.layer("spliced")?);
    let mu = smooth_layer(&cc, adata.layer("unspliced")?);
    info!("computed moments Ms and Mu over {} cells", cc.nrows());

    adata.set_layer("Ms", Layer::Dense(ms))?;
    adata.set_layer("Mu", Layer::Dense(mu))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anno_data::AnnMatrix;
    use approx::assert_abs_diff_eq;

    #[test]
    fn moments_average_within_neighbourhoods() -> anyhow::Result<()> {
        // two groups of three cells far apart in spliced counts
        let s = DMatrix::from_row_slice(
            6,
            2,
            &[1., 0., 2., 0., 3., 0., 0., 10., 0., 11., 0., 12.],
        );
        let u = DMatrix::from_row_slice(6, 2, &[3., 0., 3., 0., 3., 0., 0., 6., 0., 9., 0., 0.]);

        let mut adata = AnnMatrix::from_layer(Layer::Dense(s.clone()));
        adata.set_layer("spliced", Layer::Sparse(Layer::Dense(s).to_sparse()))?;
        adata.set_layer("unspliced", Layer::Dense(u))?;

        let args = MomentsArgs {
            n_neighbors: Some(3),
            mode: NeighborMode::Distances,
            neighbors: NeighborsArgs {
                n_pcs: 0,
                ..Default::default()
            },
        };
        moments(&mut adata, &args)?;

        let ms = adata.layer("Ms")?.to_dense();
        let mu = adata.layer("Mu")?.to_dense();
        for i in 0..3 {
            assert_abs_diff_eq!(ms[(i, 0)], 2., epsilon = 1e-5);
            assert_abs_diff_eq!(mu[(i, 0)], 3., epsilon = 1e-5);
            assert_abs_diff_eq!(ms[(i + 3, 1)], 11., epsilon = 1e-5);
            assert_abs_diff_eq!(mu[(i + 3, 1)], 5., epsilon = 1e-5);
        }
        Ok(())
    }
}
