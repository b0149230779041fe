use matrix_util::geometric::geometric_matrix_sum;
use matrix_util::knn::knn_distances;
use matrix_util::neighbors::*;
use matrix_util::sparse_util::{identity, row_sums, scale_rows};
use matrix_util::traits::SampleOps;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// two well separated blobs of 20 points each
fn two_blobs() -> DMatrix<f32> {
    let mut rng = StdRng::seed_from_u64(17);
    let mut xx = DMatrix::<f32>::rnorm_with(40, 3, &mut rng);
    for i in 20..40 {
        for j in 0..3 {
            xx[(i, j)] += 50.;
        }
    }
    xx
}

#[test]
fn pruned_knn_graph_stays_within_blobs() -> anyhow::Result<()> {
    let xx = two_blobs();
    let dist = knn_distances(&xx, 10)?;
    let (indices, pruned) = get_indices(&dist, Some(5), NeighborMode::Distances)?;

    assert_eq!(indices.width(), 5);
    assert_eq!(pruned.nnz(), 40 * 5);

    for i in 0..40 {
        let blob = i / 20;
        assert!(indices.row(i).iter().all(|&j| j / 20 == blob));
    }

    // closures never leave the blob either
    let mut rng = StdRng::seed_from_u64(0);
    let closures = get_iterative_indices_all(&indices, 3, Some(12), &mut rng)?;
    for (i, ix) in closures.iter().enumerate() {
        assert!(ix.len() <= 12);
        assert!(ix.iter().all(|&j| j / 20 == i / 20));
    }
    Ok(())
}

#[test]
fn pruning_more_than_available_is_capped() -> anyhow::Result<()> {
    let xx = two_blobs();
    let dist = knn_distances(&xx, 4)?;
    let (indices, again) = get_indices(&dist, Some(30), NeighborMode::Distances)?;
    assert_eq!(indices.width(), 4);
    assert_eq!(again, dist);
    Ok(())
}

#[test]
fn transition_sums_stay_stochastic() -> anyhow::Result<()> {
    let xx = two_blobs();
    let dist = knn_distances(&xx, 6)?;
    let (_, pruned) = get_indices(&dist, None, NeighborMode::Distances)?;

    // row-stochastic operator from the pruned graph
    let adj = &pruned + &identity(40);
    let sums = row_sums(&adj);
    let inv: Vec<f32> = sums.iter().map(|s| 1. / s).collect();
    let tt = scale_rows(&adj, &inv);

    // every power of a stochastic matrix is stochastic
    let ss = geometric_matrix_sum(&tt, 3);
    for s in row_sums(&ss) {
        approx::assert_abs_diff_eq!(s, 3.0, epsilon = 1e-3);
    }
    Ok(())
}
