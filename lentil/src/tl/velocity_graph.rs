use crate::pp::neighbors::DISTANCES_KEY;
use crate::tl::utils::cosine_correlation;
use anno_data::{AnnError, AnnotatedData, Axis};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressIterator, ProgressStyle};
use log::{info, warn};
use matrix_util::dmatrix_util::row_differences;
use matrix_util::neighbors::{get_indices, get_iterative_indices, NeighborMode};
use matrix_util::traits::MatTriplets;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Clone, Debug)]
pub struct VelocityGraphArgs {
    /// velocity layer
    pub vkey: String,
    /// state layer the displacements are taken in
    pub xkey: String,
    /// boolean var attribute of the genes to use; `<vkey>_genes` if
    /// present, all genes otherwise
    pub genes_key: Option<String>,
    /// prune the `distances` graph to this many neighbours
    pub n_neighbors: Option<usize>,
    /// hops of the neighbour graph to search (2 on distances, 1 on
    /// connectivities if `None`)
    pub n_recurse_neighbors: Option<usize>,
    /// sample at most this many candidates per cell
    pub max_neighs: Option<usize>,
    pub mode: NeighborMode,
    /// compare signed square roots of displacements and velocities
    pub sqrt_transform: bool,
    /// seed of the candidate sampling
    pub seed: u64,
    pub show_progress: bool,
}

impl Default for VelocityGraphArgs {
    fn default() -> Self {
        Self {
            vkey: "velocity".into(),
            xkey: "Ms".into(),
            genes_key: None,
            n_neighbors: None,
            n_recurse_neighbors: None,
            max_neighs: None,
            mode: NeighborMode::Distances,
            sqrt_transform: false,
            seed: 0,
            show_progress: false,
        }
    }
}

pub fn graph_key(vkey: &str) -> String {
    format!("{}_graph", vkey)
}

pub fn graph_neg_key(vkey: &str) -> String {
    format!("{}_graph_neg", vkey)
}

/// Genes flagged by `genes_key` (or `<vkey>_genes`), all genes when
/// there is no flag
fn selected_genes<A>(adata: &A, args: &VelocityGraphArgs) -> anyhow::Result<Vec<usize>>
where
    A: AnnotatedData + ?Sized,
{
    let default_key = format!("{}_genes", args.vkey);
    let key = match &args.genes_key {
        Some(k) => Some(k.as_str()),
        None if adata.has_attr(Axis::Var, &default_key) => Some(default_key.as_str()),
        None => None,
    };

    let Some(key) = key else {
        return Ok((0..adata.n_vars()).collect());
    };

    let flags = adata.attr(Axis::Var, key)?;
    let flags = flags
        .as_bool()
        .ok_or(AnnError::InvalidConfig(format!("{} is not boolean", key)))?;
    Ok((0..flags.len()).filter(|&j| flags[j]).collect())
}

/// Keep only the columns finite in both matrices
fn finite_columns(xx: &DMatrix<f32>, vv: &DMatrix<f32>) -> Vec<usize> {
    (0..xx.ncols())
        .filter(|&j| {
            xx.column(j)
                .iter()
                .chain(vv.column(j).iter())
                .all(|x| x.is_finite())
        })
        .collect()
}

fn signed_sqrt(x: &mut f32) {
    *x = x.signum() * x.abs().sqrt();
}

/// Cosine similarities between each cell's velocity and its
/// displacements towards the cells of its neighbourhood.
///
/// The neighbourhood of cell `i` is every cell within
/// `n_recurse_neighbors` hops of the pruned kNN graph (`i` excluded).
/// Cells with zero velocity get no edges. Positive similarities are
/// stored as the graph `<vkey>_graph`, negative ones as
/// `<vkey>_graph_neg`.
pub fn velocity_graph<A>(adata: &mut A, args: &VelocityGraphArgs) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let genes = selected_genes(adata, args)?;
    let xx = adata.layer(&args.xkey)?.select_columns(&genes).to_dense();
    let vv = adata.layer(&args.vkey)?.select_columns(&genes).to_dense();

    let finite = finite_columns(&xx, &vv);
    if finite.is_empty() {
        return Err(AnnError::InvalidConfig(format!(
            "no gene with finite {} and {} values",
            args.xkey, args.vkey
        ))
        .into());
    }
    let mut xx = xx.select_columns(&finite);
    let mut vv = vv.select_columns(&finite);

    if args.sqrt_transform {
        xx.apply(signed_sqrt);
        vv.apply(signed_sqrt);
    }

    let (indices, _) = get_indices(adata.graph(DISTANCES_KEY)?, args.n_neighbors, args.mode)?;
    let n_recurse = args.n_recurse_neighbors.unwrap_or(match args.mode {
        NeighborMode::Distances => 2,
        NeighborMode::Connectivities => 1,
    });

    let nn = adata.n_obs();
    info!(
        "velocity graph of {} cells over {} genes, {} hop(s)",
        nn,
        xx.ncols(),
        n_recurse
    );

    let pb = ProgressBar::new(nn as u64).with_style(
        ProgressStyle::with_template("Velocity graph {bar:40} {pos}/{len} cells ({eta})")?
            .progress_chars("##-"),
    );
    if !args.show_progress {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut positive = vec![];
    let mut negative = vec![];

    for i in (0..nn).progress_with(pb.clone()) {
        let v: Vec<f32> = vv.row(i).iter().copied().collect();
        if v.iter().all(|&x| x == 0.) {
            continue;
        }

        let neighs: Vec<usize> =
            get_iterative_indices(&indices, i, n_recurse, args.max_neighs, &mut rng)?
                .into_iter()
                .filter(|&j| j != i)
                .collect();
        if neighs.is_empty() {
            continue;
        }

        let dx = row_differences(&xx, i, &neighs);
        for (&j, &c) in neighs.iter().zip(cosine_correlation(&dx, &v).iter()) {
            if c > 0. {
                positive.push((i, j, c.min(1.)));
            } else if c < 0. {
                negative.push((i, j, c.max(-1.)));
            }
        }
    }
    pb.finish_and_clear();

    if positive.is_empty() {
        warn!("no cell moves towards any of its neighbours");
    }

    let graph = CsrMatrix::<f32>::from_nonzero_triplets(nn, nn, positive)?;
    let graph_neg = CsrMatrix::<f32>::from_nonzero_triplets(nn, nn, negative)?;
    info!(
        "{} positive and {} negative edges",
        graph.nnz(),
        graph_neg.nnz()
    );

    adata.set_graph(&graph_key(&args.vkey), graph)?;
    adata.set_graph(&graph_neg_key(&args.vkey), graph_neg)?;
    adata.set_uns(
        &format!("{}_graph_params", args.vkey),
        serde_json::json!({
            "xkey": args.xkey,
            "n_genes": finite.len(),
            "n_recurse_neighbors": n_recurse,
            "sqrt_transform": args.sqrt_transform,
        }),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pp::neighbors::{neighbors, NeighborsArgs};
    use anno_data::{AnnMatrix, Column, Layer};

    /// cells on a line moving to the right
    fn line(n: usize) -> anyhow::Result<AnnMatrix> {
        let xs: Vec<f32> = (0..n).flat_map(|i| [i as f32, 0.]).collect();
        let ms = DMatrix::from_row_slice(n, 2, &xs);
        let vv = DMatrix::from_fn(n, 2, |i, j| if j == 0 && i > 0 { 1. } else { 0. });

        let mut adata = AnnMatrix::from_layer(Layer::Dense(ms.clone()));
        adata.set_layer("Ms", Layer::Dense(ms))?;
        adata.set_layer("velocity", Layer::Dense(vv))?;
        let args = NeighborsArgs {
            n_neighbors: 3,
            n_pcs: 0,
            ..Default::default()
        };
        neighbors(&mut adata, &args)?;
        Ok(adata)
    }

    #[test]
    fn edges_point_along_the_velocity() -> anyhow::Result<()> {
        let mut adata = line(6)?;
        velocity_graph(&mut adata, &VelocityGraphArgs::default())?;

        let graph = adata.graph("velocity_graph")?;
        let graph_neg = adata.graph("velocity_graph_neg")?;
        assert!(graph.nnz() > 0);
        for (i, j, &c) in graph.triplet_iter() {
            assert!(j > i);
            assert!(c > 0. && c <= 1.);
        }
        for (i, j, &c) in graph_neg.triplet_iter() {
            assert!(j < i);
            assert!(c < 0. && c >= -1.);
        }
        // the first cell does not move
        assert!(graph.row(0).nnz() == 0 && graph_neg.row(0).nnz() == 0);
        Ok(())
    }

    #[test]
    fn gene_flags_are_honoured() -> anyhow::Result<()> {
        let mut adata = line(5)?;
        adata.set_attr(Axis::Var, "velocity_genes", Column::Bool(vec![false, true]))?;
        // the flagged gene carries no velocity at all
        velocity_graph(&mut adata, &VelocityGraphArgs::default())?;
        assert_eq!(adata.graph("velocity_graph")?.nnz(), 0);

        adata.set_attr(Axis::Var, "velocity_genes", Column::Bool(vec![false, false]))?;
        assert!(velocity_graph(&mut adata, &VelocityGraphArgs::default()).is_err());
        Ok(())
    }
}
