use crate::traits::{MatOps, SampleOps};
use nalgebra::DMatrix;
use rand_distr::{Distribution, StandardNormal};

impl SampleOps for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn runif_with<R: rand::Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        let rvec: Vec<f32> = (0..(dd * nn)).map(|_| rng.random::<f32>()).collect();
        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }

    fn rnorm_with<R: rand::Rng>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        let rvec: Vec<f32> = (0..(dd * nn)).map(|_| StandardNormal.sample(rng)).collect();
        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }
}

impl MatOps for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn normalize_rows(&self) -> Self::Mat {
        let mut ret = self.clone();
        for mut row in ret.row_iter_mut() {
            let denom: f32 = row.iter().map(|x| x.abs()).sum();
            if denom > 0. {
                row /= denom;
            }
        }
        ret
    }

    /// Y[,j] = X[,j] / max(1, norm(X[,j]))
    fn normalize_columns_inplace(&mut self) {
        for mut xx_j in self.column_iter_mut() {
            let denom = xx_j.norm().max(1.0);
            xx_j /= denom;
        }
    }

    fn normalize_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.normalize_columns_inplace();
        ret
    }

    fn centre_columns_inplace(&mut self) {
        for mut xx_j in self.column_iter_mut() {
            let mu = xx_j.mean();
            xx_j.add_scalar_mut(-mu);
        }
    }

    fn centre_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.centre_columns_inplace();
        ret
    }
}

/// Displacements `xx[j] - xx[i]`, one row per `j` in `others`
pub fn row_differences(xx: &DMatrix<f32>, i: usize, others: &[usize]) -> DMatrix<f32> {
    let mut ret = DMatrix::<f32>::zeros(others.len(), xx.ncols());
    for (r, &j) in others.iter().enumerate() {
        let diff = xx.row(j) - xx.row(i);
        ret.row_mut(r).copy_from(&diff);
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn seeded_sampling_is_reproducible() {
        let a = DMatrix::<f32>::rnorm_with(4, 3, &mut StdRng::seed_from_u64(11));
        let b = DMatrix::<f32>::rnorm_with(4, 3, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);

        let u = DMatrix::<f32>::runif_with(10, 10, &mut StdRng::seed_from_u64(1));
        assert!(u.iter().all(|&x| (0. ..1.).contains(&x)));
    }

    #[test]
    fn row_normalization_uses_absolute_sums() {
        let xx = DMatrix::from_row_slice(2, 3, &[1., -1., 2., 0., 0., 0.]);
        let yy = xx.normalize_rows();
        assert_abs_diff_eq!(yy[(0, 0)], 0.25);
        assert_abs_diff_eq!(yy[(0, 1)], -0.25);
        assert_eq!(yy.row(1).sum(), 0.);
    }

    #[test]
    fn centred_columns_have_zero_mean() {
        let xx = DMatrix::from_row_slice(3, 2, &[1., 10., 2., 20., 3., 60.]);
        let yy = xx.centre_columns();
        for j in 0..2 {
            assert_abs_diff_eq!(yy.column(j).sum(), 0., epsilon = 1e-5);
        }
    }

    #[test]
    fn differences_from_a_row() {
        let xx = DMatrix::from_row_slice(3, 2, &[1., 1., 2., 3., 0., 5.]);
        let dd = row_differences(&xx, 0, &[1, 2]);
        assert_eq!(dd, DMatrix::from_row_slice(2, 2, &[1., 2., -1., 4.]));
    }
}
