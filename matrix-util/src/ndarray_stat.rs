use crate::{common_io::write_lines, traits::RunningStatOps};
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use ndarray::{Array1, ArrayBase, Data, Dimension, Ix1, NdIndex, OwnedRepr, RemoveAxis};

/// A container to keep track of sufficient statistics of an arbitrary
/// shape `ndarray`
///
/// # Type parameters
/// - `S` : The shape of the array
///
#[derive(Clone)]
pub struct RunningStatistics<S>
where
    S: Dimension + RemoveAxis,
{
    npos: ArrayBase<OwnedRepr<f32>, S>,
    s0: ArrayBase<OwnedRepr<f32>, S>,
    s1: ArrayBase<OwnedRepr<f32>, S>,
    s2: ArrayBase<OwnedRepr<f32>, S>,
}

impl<S> RunningStatistics<S>
where
    S: Dimension + RemoveAxis,
{
    /// Create a new RunningStatistics object
    ///
    /// # Arguments
    ///
    /// * `shape` - The shape of the array
    ///
    /// # Examples
    ///
    /// ```
    /// use matrix_util::ndarray_stat::RunningStatistics;
    /// use ndarray::Ix1;
    /// let ngenes = 10;
    /// RunningStatistics::new(Ix1(ngenes));
    /// ```
    ///
    pub fn new(shape: S) -> Self {
        let npos = ArrayBase::zeros(shape.clone());
        let s0 = ArrayBase::zeros(shape.clone());
        let s1 = ArrayBase::zeros(shape.clone());
        let s2 = ArrayBase::zeros(shape);

        RunningStatistics { npos, s0, s1, s2 }
    }

    pub fn add<V>(&mut self, xx: &ArrayBase<V, S>)
    where
        V: Data<Elem = f32>,
    {
        self.npos += &xx.mapv(Self::_is_positive);
        self.s0 += &xx.mapv(Self::_is_finite);
        self.s1 += &xx.mapv(Self::_finite);
        self.s2 += &xx.mapv(Self::_finite).mapv(|v| v * v);
    }

    /// Add a single observation at `idx`; out-of-range indices are
    /// ignored
    pub fn add_element<I>(&mut self, idx: I, val: f32)
    where
        I: NdIndex<S> + Clone,
    {
        let safe_val = Self::_finite(val);
        if let Some(x) = self.npos.get_mut(idx.clone()) {
            *x += Self::_is_positive(val);
        }
        if let Some(x) = self.s0.get_mut(idx.clone()) {
            *x += Self::_is_finite(val);
        }
        if let Some(x) = self.s1.get_mut(idx.clone()) {
            *x += safe_val;
        }
        if let Some(x) = self.s2.get_mut(idx) {
            *x += safe_val * safe_val;
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.s0.shape()
    }

    //////////////////////
    // helper functions //
    //////////////////////

    fn _finite(x: f32) -> f32 {
        if x.is_finite() {
            x
        } else {
            0_f32
        }
    }

    fn _is_finite(x: f32) -> f32 {
        if x.is_finite() {
            1_f32
        } else {
            0_f32
        }
    }

    fn _is_positive(x: f32) -> f32 {
        if x.is_finite() && x > 0_f32 {
            1_f32
        } else {
            0_f32
        }
    }

    fn _add_pseudo_count(x: f32) -> f32 {
        x + 1e-8
    }
}

impl RunningStatistics<Ix1> {
    /// Column statistics of a sparse cells x genes matrix. Implicit
    /// zeros count as observed zeros.
    pub fn from_csr_columns(csr: &CsrMatrix<f32>) -> Self {
        let mut ret = Self::new(Ix1(csr.ncols()));
        ret.s0.fill(csr.nrows() as f32);
        for (_, j, &x) in csr.triplet_iter() {
            if !x.is_finite() {
                ret.s0[j] -= 1.;
                continue;
            }
            ret.npos[j] += Self::_is_positive(x);
            ret.s1[j] += x;
            ret.s2[j] += x * x;
        }
        ret
    }

    /// Column statistics of a dense cells x genes matrix
    pub fn from_dmatrix_columns(xx: &DMatrix<f32>) -> Self {
        let mut ret = Self::new(Ix1(xx.ncols()));
        for row in xx.row_iter() {
            let row: Array1<f32> = row.iter().copied().collect();
            ret.add(&row);
        }
        ret
    }

    /// Unbiased variance `s2/(n-1) - mean^2 * n/(n-1)`
    pub fn sample_variance(&self) -> Array1<f32> {
        let n = &self.s0;
        let mean = self.mean();
        let biased = &self.s2 / &n.mapv(Self::_add_pseudo_count) - &mean * &mean;
        let correction = n.mapv(|n| if n > 1. { n / (n - 1.) } else { 1. });
        (biased * correction).mapv(|v| v.max(0.))
    }

    /// Save the statistics to a delimited text file
    /// # Arguments
    /// * `filename` - The name of the file to save the statistics to
    /// * `names` - The names of the statistics
    /// * `sep` - Separator for text formats
    pub fn save(&self, filename: &str, names: &[Box<str>], sep: &str) -> anyhow::Result<()> {
        let mut out = self.to_string_vec(names, sep)?;
        let header = format!("#name{}nnz{}tot{}mu{}sig", sep, sep, sep, sep);
        out.insert(0, header.into_boxed_str());
        write_lines(&out, filename)?;
        Ok(())
    }

    pub fn to_string_vec(&self, names: &[Box<str>], sep: &str) -> anyhow::Result<Vec<Box<str>>> {
        if names.len() != self.shape()[0] {
            anyhow::bail!(
                "{} names for {} statistics",
                names.len(),
                self.shape()[0]
            );
        }

        let nnz_ = to_string_vec(&self.count_positives());
        let tot_ = to_string_vec(&self.s1);
        let mu_ = to_string_vec(&self.mean());
        let sig_ = to_string_vec(&self.std());

        let out: Vec<Box<str>> = (0..self.shape()[0])
            .map(|i| {
                [&names[i][..], nnz_[i].as_str(), tot_[i].as_str(), mu_[i].as_str(), sig_[i].as_str()]
                    .join(sep)
                    .into_boxed_str()
            })
            .collect();
        Ok(out)
    }
}

impl<S> RunningStatOps<f32> for RunningStatistics<S>
where
    S: Dimension + RemoveAxis,
{
    type Output = ArrayBase<OwnedRepr<f32>, S>;

    fn clear(&mut self) {
        self.npos.fill(0.0);
        self.s0.fill(0.0);
        self.s1.fill(0.0);
        self.s2.fill(0.0);
    }

    /// Frequency of positive values. For a sparse count matrix, this
    /// will reflect the number of non-zero values
    fn count_positives(&self) -> Self::Output {
        self.npos.clone()
    }

    fn sum(&self) -> Self::Output {
        self.s1.clone()
    }

    fn mean(&self) -> Self::Output {
        self.s1.clone() / &self.s0.mapv(Self::_add_pseudo_count)
    }

    fn variance(&self) -> Self::Output {
        let mean = self.mean();
        let nn = &self.s0.mapv(Self::_add_pseudo_count);
        &self.s2 / nn - &mean * &mean
    }

    fn std(&self) -> Self::Output {
        self.variance().mapv(|v| v.max(0.).sqrt())
    }
}

fn to_string_vec(xx: &Array1<f32>) -> Vec<String> {
    xx.iter()
        .map(|&v| {
            if v.abs() > 1e-4 {
                format!("{:.4}", v)
                    .trim_end_matches('0')
                    .trim_end_matches('.')
                    .to_string()
            } else if v.abs() > 1e-20 {
                format!("{:.4e}", v)
            } else {
                "0".to_string()
            }
        })
        .collect()
}
