use anno_data::AnnError;
use nalgebra::DMatrix;
use num_traits::Float;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CorrMode {
    /// linear relationship
    #[default]
    Pearson,
    /// monotonic relationship (Pearson on average ranks)
    Spearman,
}

/// Which vectors of a matrix are correlated with `y`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CorrAxis {
    #[default]
    Rows,
    Columns,
}

/// 1-based ranks, ties sharing their average rank. NaN stays NaN and
/// is not ranked.
pub fn rankdata<T: Float>(x: &[T]) -> Vec<T> {
    let mut order: Vec<usize> = (0..x.len()).filter(|&i| !x[i].is_nan()).collect();
    order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![T::nan(); x.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && x[order[end]] == x[order[start]] {
            end += 1;
        }
        // positions start..end share ranks start+1..=end
        let avg = T::from(start + end + 1).unwrap_or_else(T::nan) / T::from(2).unwrap_or_else(T::one);
        for &i in &order[start..end] {
            ranks[i] = avg;
        }
        start = end;
    }
    ranks
}

fn nan_mean<T: Float>(x: &[T]) -> T {
    let (s, n) = x
        .iter()
        .filter(|v| !v.is_nan())
        .fold((T::zero(), 0_usize), |(s, n), &v| (s + v, n + 1));
    match T::from(n) {
        Some(n) if n > T::zero() => s / n,
        _ => T::nan(),
    }
}

fn nan_sum<I, T>(iter: I) -> T
where
    I: Iterator<Item = T>,
    T: Float,
{
    iter.filter(|v| !v.is_nan()).fold(T::zero(), |s, v| s + v)
}

/// Pearson correlation where sums skip NaN terms
fn nan_pearson<T: Float>(x: &[T], y: &[T]) -> T {
    let (mx, my) = (nan_mean(x), nan_mean(y));
    let xm: Vec<T> = x.iter().map(|&v| v - mx).collect();
    let ym: Vec<T> = y.iter().map(|&v| v - my).collect();

    let sxy = nan_sum(xm.iter().zip(ym.iter()).map(|(&a, &b)| a * b));
    let sxx = nan_sum(xm.iter().map(|&a| a * a));
    let syy = nan_sum(ym.iter().map(|&b| b * b));
    sxy / (sxx * syy).sqrt()
}

fn correlate<T: Float>(x: &[T], y: &[T], mode: CorrMode) -> T {
    match mode {
        CorrMode::Pearson => nan_pearson(x, y),
        CorrMode::Spearman => nan_pearson(&rankdata(x), &rankdata(y)),
    }
}

/// Correlation coefficient of two equally long vectors
pub fn corrcoef<T: Float>(x: &[T], y: &[T], mode: CorrMode) -> anyhow::Result<T> {
    if x.len() != y.len() {
        return Err(AnnError::shape("correlated vectors", x.len(), y.len()).into());
    }
    Ok(correlate(x, y, mode))
}

/// Correlation of every row (or column) of `xx` with `y`
pub fn vcorrcoef(
    xx: &DMatrix<f32>,
    y: &[f32],
    mode: CorrMode,
    axis: CorrAxis,
) -> anyhow::Result<Vec<f32>> {
    let vectors: Vec<Vec<f32>> = match axis {
        CorrAxis::Rows => xx.row_iter().map(|r| r.iter().copied().collect()).collect(),
        CorrAxis::Columns => xx.column_iter().map(|c| c.iter().copied().collect()).collect(),
    };
    let expected = match axis {
        CorrAxis::Rows => xx.ncols(),
        CorrAxis::Columns => xx.nrows(),
    };
    if expected != y.len() {
        return Err(AnnError::shape("correlated vectors", expected, y.len()).into());
    }

    let y = match mode {
        CorrMode::Pearson => y.to_vec(),
        CorrMode::Spearman => rankdata(y),
    };
    Ok(vectors
        .iter()
        .map(|x| match mode {
            CorrMode::Pearson => nan_pearson(x, &y),
            CorrMode::Spearman => nan_pearson(&rankdata(x), &y),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_linear_correlation() -> anyhow::Result<()> {
        let r = corrcoef(&[1., 2., 3.], &[2., 4., 6.], CorrMode::Pearson)?;
        assert_abs_diff_eq!(r, 1_f64, epsilon = 1e-12);
        let r = corrcoef(&[1_f32, 2., 3.], &[6., 4., 2.], CorrMode::Pearson)?;
        assert_abs_diff_eq!(r, -1., epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn spearman_sees_monotonic_trends() -> anyhow::Result<()> {
        let x = [1., 2., 3., 4., 5.];
        let y = [1., 4., 9., 16., 100.];
        assert_abs_diff_eq!(corrcoef(&x, &y, CorrMode::Spearman)?, 1., epsilon = 1e-12);
        assert!(corrcoef(&x, &y, CorrMode::Pearson)? < 1.);
        Ok(())
    }

    #[test]
    fn tied_ranks_are_averaged() {
        let r = rankdata(&[10., 20., 10., f64::NAN, 5.]);
        assert_eq!(r[0], 2.5);
        assert_eq!(r[1], 4.);
        assert_eq!(r[2], 2.5);
        assert!(r[3].is_nan());
        assert_eq!(r[4], 1.);
    }

    #[test]
    fn nan_terms_are_skipped() -> anyhow::Result<()> {
        let r = corrcoef(&[1., 2., f32::NAN, 3.], &[1., 2., 5., 3.], CorrMode::Pearson)?;
        assert!(r.is_finite());
        assert!(r > 0.9);
        Ok(())
    }

    #[test]
    fn rows_and_columns() -> anyhow::Result<()> {
        let xx = DMatrix::from_row_slice(2, 3, &[1., 2., 3., 3., 2., 1.]);
        let by_row = vcorrcoef(&xx, &[1., 2., 3.], CorrMode::Pearson, CorrAxis::Rows)?;
        assert_abs_diff_eq!(by_row[0], 1., epsilon = 1e-6);
        assert_abs_diff_eq!(by_row[1], -1., epsilon = 1e-6);

        let by_col = vcorrcoef(&xx, &[0., 1.], CorrMode::Spearman, CorrAxis::Columns)?;
        assert_abs_diff_eq!(by_col[0], 1., epsilon = 1e-6);
        assert_abs_diff_eq!(by_col[2], -1., epsilon = 1e-6);
        assert!(by_col[1].is_nan());

        assert!(vcorrcoef(&xx, &[1., 2.], CorrMode::Pearson, CorrAxis::Rows).is_err());
        Ok(())
    }
}
