use crate::sparse_util::csr_from_parts;
use log::info;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;

/// Exact k-nearest neighbours among the rows of `xx` by Euclidean
/// distance. A row is never its own neighbour; equal distances are
/// broken by the smaller row index.
///
/// * `xx` - points x features
/// * `knn` - number of neighbours (capped at `nrows - 1`)
///
/// Returns a points x points matrix storing, in row `i`, the distances
/// to the neighbours of `i`.
pub fn knn_distances(xx: &DMatrix<f32>, knn: usize) -> anyhow::Result<CsrMatrix<f32>> {
    let nn = xx.nrows();
    let knn = knn.min(nn.saturating_sub(1));

    if knn == 0 {
        anyhow::bail!("need at least two points and one neighbour ({} points)", nn);
    }

    // squared norms: |x - y|^2 = |x|^2 + |y|^2 - 2 x'y
    let norms: Vec<f32> = xx.row_iter().map(|r| r.norm_squared()).collect();
    let gram = xx * xx.transpose();

    let mut row_offsets = Vec::with_capacity(nn + 1);
    let mut col_indices = Vec::with_capacity(nn * knn);
    let mut values = Vec::with_capacity(nn * knn);
    row_offsets.push(0);

    for i in 0..nn {
        let mut dist: Vec<(usize, f32)> = (0..nn)
            .filter(|&j| j != i)
            .map(|j| {
                let d2 = norms[i] + norms[j] - 2. * gram[(i, j)];
                (j, d2.max(0.).sqrt())
            })
            .collect();

        dist.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        for &(j, d) in dist.iter().take(knn) {
            col_indices.push(j);
            values.push(d);
        }
        row_offsets.push(col_indices.len());
    }

    info!("found {} nearest neighbours for {} points", knn, nn);

    csr_from_parts(nn, nn, row_offsets, col_indices, values)
}
