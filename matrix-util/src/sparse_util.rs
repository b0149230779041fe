use crate::traits::MatTriplets;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Stored entries of a CSR row as `(column, value)` slices
pub fn row_entries(csr: &CsrMatrix<f32>, row: usize) -> (&[usize], &[f32]) {
    let offsets = csr.row_offsets();
    let (start, end) = (offsets[row], offsets[row + 1]);
    (&csr.col_indices()[start..end], &csr.values()[start..end])
}

/// Sum of each row (explicit and implicit zeros included)
pub fn row_sums(csr: &CsrMatrix<f32>) -> Vec<f32> {
    csr.row_iter().map(|r| r.values().iter().sum()).collect()
}

/// Sum of each column
pub fn column_sums(csr: &CsrMatrix<f32>) -> Vec<f32> {
    let mut ret = vec![0_f32; csr.ncols()];
    for (_, j, &x) in csr.triplet_iter() {
        ret[j] += x;
    }
    ret
}

/// Number of strictly positive entries in each column
pub fn column_positive_counts(csr: &CsrMatrix<f32>) -> Vec<f32> {
    let mut ret = vec![0_f32; csr.ncols()];
    for (_, j, &x) in csr.triplet_iter() {
        if x > 0. {
            ret[j] += 1.;
        }
    }
    ret
}

/// Build a CSR matrix directly from the raw row-major pieces. Column
/// indices may come in any order within a row.
pub fn csr_from_parts(
    nrows: usize,
    ncols: usize,
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f32>,
) -> anyhow::Result<CsrMatrix<f32>> {
    CsrMatrix::try_from_unsorted_csr_data(nrows, ncols, row_offsets, col_indices, values)
        .map_err(|e| anyhow::anyhow!("invalid csr data: {}", e))
}

/// Apply `f` to every stored value, keeping the sparsity pattern
pub fn map_values<F>(csr: &CsrMatrix<f32>, f: F) -> CsrMatrix<f32>
where
    F: Fn(f32) -> f32,
{
    let mut ret = csr.clone();
    ret.values_mut().iter_mut().for_each(|x| *x = f(*x));
    ret
}

/// Multiply row `i` by `factors[i]`
pub fn scale_rows(csr: &CsrMatrix<f32>, factors: &[f32]) -> CsrMatrix<f32> {
    debug_assert_eq!(csr.nrows(), factors.len());
    let mut ret = csr.clone();
    for (mut row, &f) in ret.row_iter_mut().zip(factors.iter()) {
        row.values_mut().iter_mut().for_each(|x| *x *= f);
    }
    ret
}

/// Drop stored entries for which `keep` is false
pub fn retain_entries<F>(csr: &CsrMatrix<f32>, keep: F) -> anyhow::Result<CsrMatrix<f32>>
where
    F: Fn(usize, usize, f32) -> bool,
{
    let mut row_offsets = Vec::with_capacity(csr.nrows() + 1);
    let mut col_indices = Vec::with_capacity(csr.nnz());
    let mut values = Vec::with_capacity(csr.nnz());
    row_offsets.push(0);

    for (i, row) in csr.row_iter().enumerate() {
        for (&j, &x) in row.col_indices().iter().zip(row.values()) {
            if keep(i, j, x) {
                col_indices.push(j);
                values.push(x);
            }
        }
        row_offsets.push(col_indices.len());
    }

    CsrMatrix::try_from_csr_data(csr.nrows(), csr.ncols(), row_offsets, col_indices, values)
        .map_err(|e| anyhow::anyhow!("retained entries: {}", e))
}

/// Keep the rows listed in `rows` (in that order)
pub fn select_rows(csr: &CsrMatrix<f32>, rows: &[usize]) -> anyhow::Result<CsrMatrix<f32>> {
    if let Some(&i) = rows.iter().find(|&&i| i >= csr.nrows()) {
        return Err(anyhow::anyhow!("row {} out of range ({} rows)", i, csr.nrows()));
    }
    let mut row_offsets = Vec::with_capacity(rows.len() + 1);
    let mut col_indices = vec![];
    let mut values = vec![];
    row_offsets.push(0);
    for &i in rows {
        let (cols, vals) = row_entries(csr, i);
        col_indices.extend_from_slice(cols);
        values.extend_from_slice(vals);
        row_offsets.push(col_indices.len());
    }
    CsrMatrix::try_from_csr_data(rows.len(), csr.ncols(), row_offsets, col_indices, values)
        .map_err(|e| anyhow::anyhow!("selected rows: {}", e))
}

/// Keep the columns listed in `columns` (in that order), re-indexed
/// `0..columns.len()`
pub fn select_columns(csr: &CsrMatrix<f32>, columns: &[usize]) -> CsrMatrix<f32> {
    let mut new_index = vec![None; csr.ncols()];
    for (new_j, &j) in columns.iter().enumerate() {
        new_index[j] = Some(new_j);
    }

    let mut coo = CooMatrix::new(csr.nrows(), columns.len());
    for (i, j, &x) in csr.triplet_iter() {
        if let Some(new_j) = new_index[j] {
            coo.push(i, new_j, x);
        }
    }
    CsrMatrix::from(&coo)
}

/// `n x n` identity in CSR
pub fn identity(n: usize) -> CsrMatrix<f32> {
    CsrMatrix::identity(n)
}

/// Dense copy
pub fn to_dense(csr: &CsrMatrix<f32>) -> DMatrix<f32> {
    DMatrix::from(csr)
}

/// Sparse copy of the non-zero entries
pub fn from_dense(xx: &DMatrix<f32>) -> CsrMatrix<f32> {
    CsrMatrix::from(xx)
}

impl MatTriplets for CsrMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug,
    {
        let mut coo = CooMatrix::<f32>::new(nrow, ncol);
        for (ii, jj, x_ij) in triplets {
            let ii: usize = ii.try_into().map_err(|e| anyhow::anyhow!("{:?}", e))?;
            let jj: usize = jj.try_into().map_err(|e| anyhow::anyhow!("{:?}", e))?;
            if ii >= nrow || jj >= ncol {
                anyhow::bail!("triplet ({}, {}) out of bounds", ii, jj);
            }
            coo.push(ii, jj, x_ij);
        }
        Ok(CsrMatrix::from(&coo))
    }

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)> {
        let triplets = self
            .triplet_iter()
            .filter(|(_, _, x)| **x != 0.)
            .map(|(i, j, &x)| (i, j, x))
            .collect();
        Ok((self.nrows(), self.ncols(), triplets))
    }
}

impl MatTriplets for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn from_nonzero_triplets<I>(
        nrow: usize,
        ncol: usize,
        triplets: Vec<(I, I, Self::Scalar)>,
    ) -> anyhow::Result<Self::Mat>
    where
        I: TryInto<usize> + Copy,
        <I as TryInto<usize>>::Error: std::fmt::Debug,
    {
        let mut ret = DMatrix::<f32>::zeros(nrow, ncol);
        for (ii, jj, x_ij) in triplets {
            let ii: usize = ii.try_into().map_err(|e| anyhow::anyhow!("{:?}", e))?;
            let jj: usize = jj.try_into().map_err(|e| anyhow::anyhow!("{:?}", e))?;
            if ii >= nrow || jj >= ncol {
                anyhow::bail!("triplet ({}, {}) out of bounds", ii, jj);
            }
            ret[(ii, jj)] += x_ij;
        }
        Ok(ret)
    }

    fn to_nonzero_triplets(
        &self,
    ) -> anyhow::Result<(usize, usize, Vec<(usize, usize, Self::Scalar)>)> {
        let mut ret = vec![];
        for i in 0..self.nrows() {
            for j in 0..self.ncols() {
                let x_ij = self[(i, j)];
                if x_ij != 0. {
                    ret.push((i, j, x_ij));
                }
            }
        }
        Ok((self.nrows(), self.ncols(), ret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> CsrMatrix<f32> {
        // [1 0 2]
        // [0 0 0]
        // [3 4 0]
        CsrMatrix::from_nonzero_triplets(
            3,
            3,
            vec![(0_usize, 0_usize, 1.), (0, 2, 2.), (2, 0, 3.), (2, 1, 4.)],
        )
        .unwrap()
    }

    #[test]
    fn sums_and_counts() {
        let x = small();
        assert_eq!(row_sums(&x), vec![3., 0., 7.]);
        assert_eq!(column_sums(&x), vec![4., 4., 2.]);
        assert_eq!(column_positive_counts(&x), vec![2., 1., 1.]);
    }

    #[test]
    fn select_rows_and_columns() -> anyhow::Result<()> {
        let x = small();
        let rows = select_rows(&x, &[2, 0])?;
        assert_eq!(to_dense(&rows), DMatrix::from_row_slice(2, 3, &[3., 4., 0., 1., 0., 2.]));

        let cols = select_columns(&x, &[2, 0]);
        assert_eq!(
            to_dense(&cols),
            DMatrix::from_row_slice(3, 2, &[2., 1., 0., 0., 0., 3.])
        );
        Ok(())
    }

    #[test]
    fn out_of_range_rows_are_an_error() {
        let x = small();
        assert!(select_rows(&x, &[0, 3]).is_err());
        assert!(select_rows(&x, &[]).is_ok_and(|r| r.nrows() == 0));
    }

    #[test]
    fn scaling_and_retention() -> anyhow::Result<()> {
        let x = small();
        let y = scale_rows(&x, &[2., 1., 0.]);
        assert_eq!(y.nnz(), 4);
        let y = retain_entries(&y, |_, _, v| v != 0.)?;
        assert_eq!(y.nnz(), 2);
        assert_eq!(to_dense(&y)[(0, 2)], 4.);

        let upper = retain_entries(&x, |i, j, _| j >= i)?;
        assert_eq!(upper.nnz(), 2);
        Ok(())
    }

    #[test]
    fn unsorted_parts_are_accepted() {
        let x = csr_from_parts(1, 3, vec![0, 2], vec![2, 0], vec![5., 6.]).unwrap();
        assert_eq!(x.row(0).col_indices(), &[0, 2]);
        assert_eq!(x.row(0).values(), &[6., 5.]);
    }
}
