use matrix_util::sparse_util;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;

/// A cells x genes matrix, either dense or sparse
#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    Dense(DMatrix<f32>),
    Sparse(CsrMatrix<f32>),
}

impl From<DMatrix<f32>> for Layer {
    fn from(xx: DMatrix<f32>) -> Self {
        Layer::Dense(xx)
    }
}

impl From<CsrMatrix<f32>> for Layer {
    fn from(xx: CsrMatrix<f32>) -> Self {
        Layer::Sparse(xx)
    }
}

impl Layer {
    pub fn nrows(&self) -> usize {
        match self {
            Layer::Dense(xx) => xx.nrows(),
            Layer::Sparse(xx) => xx.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Layer::Dense(xx) => xx.ncols(),
            Layer::Sparse(xx) => xx.ncols(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Layer::Sparse(_))
    }

    /// Dense copy
    pub fn to_dense(&self) -> DMatrix<f32> {
        match self {
            Layer::Dense(xx) => xx.clone(),
            Layer::Sparse(xx) => sparse_util::to_dense(xx),
        }
    }

    /// Sparse copy (zeros dropped)
    pub fn to_sparse(&self) -> CsrMatrix<f32> {
        match self {
            Layer::Dense(xx) => sparse_util::from_dense(xx),
            Layer::Sparse(xx) => xx.clone(),
        }
    }

    pub fn row_sums(&self) -> Vec<f32> {
        match self {
            Layer::Dense(xx) => xx.row_iter().map(|r| r.sum()).collect(),
            Layer::Sparse(xx) => sparse_util::row_sums(xx),
        }
    }

    pub fn column_sums(&self) -> Vec<f32> {
        match self {
            Layer::Dense(xx) => xx.column_iter().map(|c| c.sum()).collect(),
            Layer::Sparse(xx) => sparse_util::column_sums(xx),
        }
    }

    /// Number of positive entries per column
    pub fn column_positive_counts(&self) -> Vec<f32> {
        match self {
            Layer::Dense(xx) => xx
                .column_iter()
                .map(|c| c.iter().filter(|&&x| x > 0.).count() as f32)
                .collect(),
            Layer::Sparse(xx) => sparse_util::column_positive_counts(xx),
        }
    }

    /// Maximum of each column (implicit zeros included)
    pub fn column_max(&self) -> Vec<f32> {
        match self {
            Layer::Dense(xx) => xx.column_iter().map(|c| c.max()).collect(),
            Layer::Sparse(xx) => {
                let mut ret = vec![f32::NEG_INFINITY; xx.ncols()];
                let mut stored = vec![0_usize; xx.ncols()];
                for (_, j, &x) in xx.triplet_iter() {
                    ret[j] = ret[j].max(x);
                    stored[j] += 1;
                }
                for (m, &n) in ret.iter_mut().zip(stored.iter()) {
                    if n < xx.nrows() {
                        *m = m.max(0.);
                    }
                }
                ret
            }
        }
    }

    /// The first few stored values: row 0 when dense, the first `n`
    /// stored entries when sparse
    pub fn leading_values(&self, n: usize) -> Vec<f32> {
        match self {
            Layer::Dense(xx) if xx.nrows() > 0 => xx.row(0).iter().copied().collect(),
            Layer::Dense(_) => vec![],
            Layer::Sparse(xx) => xx.values().iter().take(n).copied().collect(),
        }
    }

    pub fn select_rows(&self, rows: &[usize]) -> anyhow::Result<Layer> {
        Ok(match self {
            Layer::Dense(xx) => {
                if let Some(&i) = rows.iter().find(|&&i| i >= xx.nrows()) {
                    return Err(anyhow::anyhow!("row {} out of range ({} rows)", i, xx.nrows()));
                }
                Layer::Dense(xx.select_rows(rows))
            }
            Layer::Sparse(xx) => Layer::Sparse(sparse_util::select_rows(xx, rows)?),
        })
    }

    pub fn select_columns(&self, columns: &[usize]) -> Layer {
        match self {
            Layer::Dense(xx) => Layer::Dense(xx.select_columns(columns)),
            Layer::Sparse(xx) => Layer::Sparse(sparse_util::select_columns(xx, columns)),
        }
    }

    /// Multiply row `i` by `factors[i]`
    pub fn scale_rows(&self, factors: &[f32]) -> Layer {
        match self {
            Layer::Dense(xx) => {
                let mut ret = xx.clone();
                for (mut row, &f) in ret.row_iter_mut().zip(factors.iter()) {
                    row *= f;
                }
                Layer::Dense(ret)
            }
            Layer::Sparse(xx) => Layer::Sparse(sparse_util::scale_rows(xx, factors)),
        }
    }

    /// Apply `f` to every stored value; for sparse layers `f(0)` must be
    /// zero to keep the meaning of implicit entries
    pub fn map_values<F>(&self, f: F) -> Layer
    where
        F: Fn(f32) -> f32,
    {
        match self {
            Layer::Dense(xx) => Layer::Dense(xx.map(f)),
            Layer::Sparse(xx) => Layer::Sparse(sparse_util::map_values(xx, f)),
        }
    }

    /// Column `j` as a dense vector
    pub fn column(&self, j: usize) -> Vec<f32> {
        match self {
            Layer::Dense(xx) => xx.column(j).iter().copied().collect(),
            Layer::Sparse(xx) => {
                let mut ret = vec![0.; xx.nrows()];
                for (i, row) in xx.row_iter().enumerate() {
                    if let Ok(p) = row.col_indices().binary_search(&j) {
                        ret[i] = row.values()[p];
                    }
                }
                ret
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense() -> DMatrix<f32> {
        DMatrix::from_row_slice(3, 2, &[1., 0., 0., -2., 4., 0.])
    }

    #[test]
    fn dense_and_sparse_agree() {
        let d = Layer::from(dense());
        let s = Layer::from(d.to_sparse());
        assert!(s.is_sparse());
        assert_eq!(d.row_sums(), s.row_sums());
        assert_eq!(d.column_sums(), s.column_sums());
        assert_eq!(d.column_positive_counts(), s.column_positive_counts());
        assert_eq!(d.column_max(), s.column_max());
        assert_eq!(d.column_max(), vec![4., 0.]);
        assert_eq!(d.column(1), s.column(1));
        assert_eq!(
            d.select_rows(&[2, 0]).unwrap().to_dense(),
            s.select_rows(&[2, 0]).unwrap().to_dense()
        );
        assert!(d.select_rows(&[3]).is_err());
        assert!(s.select_rows(&[3]).is_err());
        assert_eq!(
            d.scale_rows(&[2., 1., 0.5]).to_dense(),
            s.scale_rows(&[2., 1., 0.5]).to_dense()
        );
    }

    #[test]
    fn leading_values_follow_storage() {
        let d = Layer::from(dense());
        assert_eq!(d.leading_values(10), vec![1., 0.]);
        let s = Layer::from(d.to_sparse());
        assert_eq!(s.leading_values(2), vec![1., -2.]);
    }
}
