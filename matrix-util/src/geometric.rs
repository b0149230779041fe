use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;

/// Truncated geometric series of a square matrix
pub trait GeometricSum {
    type Mat;

    /// `C + C^2 + ... + C^n_power`, evaluated as `S_1 = C` and
    /// `S_n = C + C * S_{n-1}`; `n_power <= 1` gives `C`
    fn geometric_sum(&self, n_power: usize) -> Self::Mat;
}

impl GeometricSum for DMatrix<f32> {
    type Mat = Self;

    fn geometric_sum(&self, n_power: usize) -> Self::Mat {
        let mut ret = self.clone();
        for _ in 1..n_power {
            ret = self + self * &ret;
        }
        ret
    }
}

impl GeometricSum for CsrMatrix<f32> {
    type Mat = Self;

    fn geometric_sum(&self, n_power: usize) -> Self::Mat {
        let mut ret = self.clone();
        for _ in 1..n_power {
            let prod = self * &ret;
            ret = self + &prod;
        }
        ret
    }
}

/// See [`GeometricSum::geometric_sum`]
pub fn geometric_matrix_sum<M>(cc: &M, n_power: usize) -> M::Mat
where
    M: GeometricSum,
{
    cc.geometric_sum(n_power)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn example() -> DMatrix<f32> {
        DMatrix::from_row_slice(3, 3, &[0.5, 0.5, 0., 0.2, 0.3, 0.5, 0., 0.1, 0.9])
    }

    #[test]
    fn first_power_is_identity_map() {
        let cc = example();
        assert_eq!(geometric_matrix_sum(&cc, 1), cc);
        assert_eq!(geometric_matrix_sum(&cc, 0), cc);
    }

    #[test]
    fn recursion_holds() {
        let cc = example();
        for n in 2..6 {
            let s_prev = geometric_matrix_sum(&cc, n - 1);
            let s_n = geometric_matrix_sum(&cc, n);
            let expected = &cc + &cc * &s_prev;
            assert_abs_diff_eq!(s_n, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn matches_explicit_powers() {
        let cc = example();
        let c2 = &cc * &cc;
        let c3 = &c2 * &cc;
        let expected = &cc + &c2 + &c3;
        assert_abs_diff_eq!(geometric_matrix_sum(&cc, 3), expected, epsilon = 1e-5);
    }

    #[test]
    fn sparse_agrees_with_dense() {
        let cc = example();
        let sparse = CsrMatrix::from(&cc);
        let dense_sum = geometric_matrix_sum(&cc, 4);
        let sparse_sum = DMatrix::from(&geometric_matrix_sum(&sparse, 4));
        assert_abs_diff_eq!(dense_sum, sparse_sum, epsilon = 1e-5);
    }
}
