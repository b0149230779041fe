use crate::traits::{MatOps, SampleOps};
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;

type Mat = DMatrix<f32>;
type Vec = DVector<f32>;

pub trait RSVD {
    fn rsvd(&self, rank: usize, seed: u64) -> anyhow::Result<(Mat, Vec, Mat)>;
}

impl RSVD for Mat {
    fn rsvd(&self, rank: usize, seed: u64) -> anyhow::Result<(Mat, Vec, Mat)> {
        let default_iter = 5;
        let mut rsvd = RandomizedSVD::new(rank, default_iter).with_seed(seed);
        rsvd.compute(self)?;
        Ok((
            rsvd.matrix_u().clone(),
            rsvd.singular_values().clone(),
            rsvd.matrix_v().clone(),
        ))
    }
}

/// Principal component scores of the rows of `xx` (cells x features)
///
/// Columns are centred first; the scores are `U * diag(d)`.
pub fn pca_scores(xx: &Mat, n_pcs: usize, seed: u64) -> anyhow::Result<Mat> {
    if xx.nrows() == 0 || xx.ncols() == 0 {
        anyhow::bail!("empty matrix for pca: {} x {}", xx.nrows(), xx.ncols());
    }
    let centred = xx.centre_columns();
    let (uu, dd, _) = centred.rsvd(n_pcs, seed)?;
    let mut scores = uu;
    for (mut u_k, &d_k) in scores.column_iter_mut().zip(dd.iter()) {
        u_k *= d_k;
    }
    Ok(scores)
}

/// Randomized SVD
///
/// Implement Alg 4.4 of Halko et al. (2009)
/// Modified from https://github.com/kazuotani14/RandomizedSvd
///
pub struct RandomizedSVD {
    max_rank: usize,
    iter: usize,
    seed: u64,
    u_vectors: Mat,
    singular_values: Vec,
    v_vectors: Mat,
    qq: Mat,
}

impl RandomizedSVD {
    pub fn new(max_rank: usize, iter: usize) -> Self {
        Self {
            max_rank,
            iter,
            seed: 42,
            u_vectors: Mat::zeros(0, 0),
            singular_values: Vec::zeros(0),
            v_vectors: Mat::zeros(0, 0),
            qq: Mat::zeros(0, 0),
        }
    }

    /// Seed of the random test matrix
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn matrix_u(&self) -> &Mat {
        &self.u_vectors
    }

    pub fn matrix_v(&self) -> &Mat {
        &self.v_vectors
    }

    pub fn singular_values(&self) -> &Vec {
        &self.singular_values
    }

    pub fn compute(&mut self, xx: &Mat) -> anyhow::Result<()> {
        let nr = xx.nrows();
        let nc = xx.ncols();

        let mut rank = nr.min(nc);
        let mut oversample = 0;

        if self.max_rank > 0 && rank > self.max_rank {
            rank = self.max_rank;
            oversample = 5_usize.min(nr.min(nc) - rank);
        }

        if rank == 0 {
            anyhow::bail!("Must be at least rank = 1");
        }

        self.rand_subspace_iteration(xx, rank + oversample);

        let rank = rank.min(self.qq.ncols());
        self.qq = self.qq.columns(0, rank).into_owned();

        let bb = self.qq.transpose() * xx;

        debug!("Final svd on [{} x {}]", bb.nrows(), bb.ncols());

        let svd = bb.svd(true, true);

        if let (Some(svd_u), Some(svd_vt)) = (svd.u, svd.v_t) {
            self.u_vectors = &self.qq * svd_u.columns(0, rank);
            self.v_vectors = svd_vt.transpose().columns(0, rank).into_owned();
            self.singular_values = svd.singular_values.rows(0, rank).into_owned();
        } else {
            anyhow::bail!("SVD failed");
        }

        Ok(())
    }

    // Find an orthonormal matrix qq whose range approximates the range of xx
    fn rand_subspace_iteration(&mut self, xx: &Mat, rank_and_oversample: usize) {
        let nr = xx.nrows();
        let nc = xx.ncols();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut ll = Mat::zeros(nr, rank_and_oversample);
        let mut qq = Mat::runif_with(nc, rank_and_oversample, &mut rng);

        for i in 0..self.iter {
            let lu1 = xx * &qq;
            ll.fill(0.);
            ll.fill_with_identity();
            ll.view_mut((0, 0), (nr, rank_and_oversample))
                .lower_triangle()
                .copy_from(&lu1);

            let lu2 = xx.transpose() * &ll;
            qq.fill(0.);
            qq.fill_with_identity();
            qq.view_mut((0, 0), (nc, rank_and_oversample))
                .lower_triangle()
                .copy_from(&lu2);

            debug!("LU iteration {:>10}", i + 1);
        }

        let qr = (xx * &qq).qr();
        let kk = rank_and_oversample.min(qr.q().ncols());
        self.qq = qr.q().columns(0, kk).into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn low_rank_is_recovered() -> anyhow::Result<()> {
        let mut rng = StdRng::seed_from_u64(3);
        let aa = Mat::rnorm_with(40, 2, &mut rng);
        let bb = Mat::rnorm_with(2, 15, &mut rng);
        let xx = &aa * &bb;

        let (uu, dd, vv) = xx.rsvd(2, 7)?;
        assert_eq!(uu.shape(), (40, 2));
        assert_eq!(vv.shape(), (15, 2));

        let recon = &uu * Mat::from_diagonal(&dd) * vv.transpose();
        assert_abs_diff_eq!(recon, xx, epsilon = 1e-2);
        Ok(())
    }

    #[test]
    fn pca_scores_are_centred_and_seeded() -> anyhow::Result<()> {
        let mut rng = StdRng::seed_from_u64(5);
        let xx = Mat::rnorm_with(30, 8, &mut rng).add_scalar(3.);

        let a = pca_scores(&xx, 3, 1)?;
        let b = pca_scores(&xx, 3, 1)?;
        assert_eq!(a.shape(), (30, 3));
        assert_eq!(a, b);
        for k in 0..3 {
            assert_abs_diff_eq!(a.column(k).mean(), 0., epsilon = 1e-3);
        }
        Ok(())
    }
}
