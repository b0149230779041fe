use crate::tl::transition::{transition_matrix, TransitionArgs};
use anno_data::{AnnError, AnnotatedData};
use log::info;
use matrix_util::dmatrix_util::row_differences;
use matrix_util::sparse_util::{retain_entries, row_entries};
use nalgebra::DMatrix;

#[derive(Clone, Debug)]
pub struct EmbeddingArgs {
    /// embedding to project onto, read from `X_<basis>` (or `<basis>`)
    pub basis: String,
    pub vkey: String,
    pub transition: TransitionArgs,
}

impl Default for EmbeddingArgs {
    fn default() -> Self {
        Self {
            basis: "umap".into(),
            vkey: "velocity".into(),
            transition: TransitionArgs::default(),
        }
    }
}

/// Velocities projected onto a low-dimensional embedding.
///
/// Each cell moves along the unit displacements towards the cells it
/// transitions to, weighted by the transition probabilities, minus the
/// average displacement so that a uniform spread of probabilities
/// gives no motion. Stored in obsm as `<vkey>_<basis>`.
pub fn velocity_embedding<A>(adata: &mut A, args: &EmbeddingArgs) -> anyhow::Result<DMatrix<f32>>
where
    A: AnnotatedData + ?Sized,
{
    let x_emb = match adata.obsm(&format!("X_{}", args.basis)) {
        Ok(x) => x.clone(),
        Err(_) => adata.obsm(&args.basis)?.clone(),
    };
    if x_emb.nrows() != adata.n_obs() {
        return Err(AnnError::shape(&args.basis, adata.n_obs(), x_emb.nrows()).into());
    }

    let targs = TransitionArgs {
        vkey: args.vkey.clone(),
        ..args.transition.clone()
    };
    let tt = transition_matrix(adata, &targs)?;
    let tt = retain_entries(&tt, |i, j, x| i != j && x != 0.)?;

    let mut v_emb = DMatrix::<f32>::zeros(x_emb.nrows(), x_emb.ncols());
    for i in 0..tt.nrows() {
        let (indices, probs) = row_entries(&tt, i);
        if indices.is_empty() {
            continue;
        }

        let mut dx = row_differences(&x_emb, i, indices);
        for mut row in dx.row_iter_mut() {
            let norm = row.norm();
            row /= if norm > 0. { norm } else { 1. };
        }

        let p_mean = probs.iter().sum::<f32>() / probs.len() as f32;
        let mut v = v_emb.row_mut(i);
        for (row, &p) in dx.row_iter().zip(probs.iter()) {
            v += row * (p - p_mean);
        }
    }

    info!("projected velocities onto {}", args.basis);
    adata.set_obsm(&format!("{}_{}", args.vkey, args.basis), v_emb.clone())?;
    Ok(v_emb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pp::neighbors::{neighbors, NeighborsArgs};
    use crate::tl::velocity_graph::{velocity_graph, VelocityGraphArgs};
    use anno_data::{AnnMatrix, Layer};

    #[test]
    fn projection_follows_the_velocity() -> anyhow::Result<()> {
        let n = 8;
        let xs: Vec<f32> = (0..n).flat_map(|i| [i as f32, 0.]).collect();
        let ms = DMatrix::from_row_slice(n, 2, &xs);
        let vv = DMatrix::from_fn(n, 2, |_, j| if j == 0 { 1. } else { 0. });

        let mut adata = AnnMatrix::from_layer(Layer::Dense(ms.clone()));
        adata.set_layer("Ms", Layer::Dense(ms.clone()))?;
        adata.set_layer("velocity", Layer::Dense(vv))?;
        adata.set_obsm("X_umap", ms)?;
        neighbors(
            &mut adata,
            &NeighborsArgs {
                n_neighbors: 3,
                n_pcs: 0,
                ..Default::default()
            },
        )?;
        velocity_graph(&mut adata, &VelocityGraphArgs::default())?;

        let v_emb = velocity_embedding(&mut adata, &EmbeddingArgs::default())?;
        assert_eq!(v_emb.shape(), (n, 2));
        // interior cells see both sides and move right
        for i in 1..n - 1 {
            assert!(v_emb[(i, 0)] > 0.);
        }
        assert_eq!(adata.obsm("velocity_umap")?, &v_emb);

        let missing = EmbeddingArgs {
            basis: "tsne".into(),
            ..Default::default()
        };
        assert!(velocity_embedding(&mut adata, &missing).is_err());
        Ok(())
    }
}
