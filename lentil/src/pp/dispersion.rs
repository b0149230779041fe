use crate::pp::utils::set_initial_size;
use anno_data::{AnnError, AnnotatedData, Axis, Column, Layer};
use log::info;
use matrix_util::ndarray_stat::RunningStatistics;
use matrix_util::traits::RunningStatOps;
use matrix_util::utils::{median, percentile};

use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_svm::Svm;
use svm_ndarray::{Array1, Array2};

/// How normalized dispersions are computed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Flavor {
    /// z-score of the (log) dispersion within equal-width bins of the
    /// (log1p) mean
    #[default]
    Seurat,
    /// absolute deviation from the bin median, scaled by the median
    /// absolute deviation, within percentile bins of the mean
    CellRanger,
    /// residual of the log2 coefficient of variation from a support
    /// vector regression on the log2 mean
    Svr,
}

#[derive(Clone, Debug)]
pub struct DispersionArgs {
    pub flavor: Flavor,
    pub min_disp: Option<f32>,
    pub max_disp: Option<f32>,
    pub min_mean: Option<f32>,
    pub max_mean: Option<f32>,
    /// number of mean bins for the `Seurat` flavor
    pub n_bins: usize,
    /// keep this many genes by normalized dispersion; cutoffs are ignored
    pub n_top_genes: Option<usize>,
    /// log of the dispersion and log1p of the mean (`Seurat` only)
    pub log: bool,
    /// drop the genes not selected
    pub subset: bool,
}

impl Default for DispersionArgs {
    fn default() -> Self {
        Self {
            flavor: Flavor::Seurat,
            min_disp: None,
            max_disp: None,
            min_mean: None,
            max_mean: None,
            n_bins: 20,
            n_top_genes: None,
            log: true,
            subset: true,
        }
    }
}

impl DispersionArgs {
    fn has_cutoffs(&self) -> bool {
        self.min_disp.is_some()
            || self.max_disp.is_some()
            || self.min_mean.is_some()
            || self.max_mean.is_some()
    }
}

/// Per-gene dispersion statistics
pub struct GeneDispersion {
    pub means: Vec<f32>,
    pub dispersions: Vec<f32>,
    pub dispersions_norm: Vec<f32>,
}

/// Select highly variable genes by normalized dispersion.
///
/// Selection happens when `n_top_genes` is smaller than the number of
/// genes, or when any mean/dispersion cutoff is given; otherwise the
/// call leaves the data untouched. Writes `means`, `dispersions`,
/// `dispersions_norm` and `highly_variable` to var, then drops the
/// unselected genes if `subset` is set.
pub fn filter_genes_dispersion<A>(adata: &mut A, args: &DispersionArgs) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    set_initial_size(adata, &["spliced", "unspliced"])?;

    let n_vars = adata.n_vars();
    let n_top = args.n_top_genes.filter(|&n| n < n_vars);

    if n_top.is_none() && !args.has_cutoffs() {
        info!("no gene selection: {} genes kept", n_vars);
        return Ok(());
    }

    if args.n_bins == 0 {
        return Err(AnnError::InvalidConfig("n_bins must be positive".into()).into());
    }

    let disp = gene_dispersion(adata.x(), args)?;

    let highly_variable: Vec<bool> = match n_top {
        Some(0) => vec![false; n_vars],
        Some(n) => {
            let mut sorted: Vec<f32> = disp
                .dispersions_norm
                .iter()
                .copied()
                .filter(|x| !x.is_nan())
                .collect();
            sorted.sort_by(|a, b| b.total_cmp(a));
            match sorted.get(n - 1).or(sorted.last()) {
                Some(&cutoff) => disp.dispersions_norm.iter().map(|&x| x >= cutoff).collect(),
                None => vec![false; n_vars],
            }
        }
        None => {
            let min_mean = args.min_mean.unwrap_or(f32::NEG_INFINITY);
            let max_mean = args.max_mean.unwrap_or(f32::INFINITY);
            let min_disp = args.min_disp.unwrap_or(f32::NEG_INFINITY);
            let max_disp = args.max_disp.unwrap_or(f32::INFINITY);
            disp.means
                .iter()
                .zip(disp.dispersions_norm.iter())
                .map(|(&m, &d)| {
                    let d = if d.is_nan() { 0. } else { d };
                    m > min_mean && m < max_mean && d > min_disp && d < max_disp
                })
                .collect()
        }
    };

    let n_selected = highly_variable.iter().filter(|&&b| b).count();
    info!("{} highly variable genes out of {}", n_selected, n_vars);

    adata.set_attr(Axis::Var, "means", Column::Float(disp.means))?;
    adata.set_attr(Axis::Var, "dispersions", Column::Float(disp.dispersions))?;
    adata.set_attr(Axis::Var, "dispersions_norm", Column::Float(disp.dispersions_norm))?;
    adata.set_attr(Axis::Var, "highly_variable", Column::Bool(highly_variable.clone()))?;

    if args.subset {
        adata.subset(&highly_variable, Axis::Var)?;
    }
    Ok(())
}

/// Means, dispersions (variance over mean) and their normalized values
/// for every column of `xx`
pub fn gene_dispersion(xx: &Layer, args: &DispersionArgs) -> anyhow::Result<GeneDispersion> {
    let stat = match xx {
        Layer::Sparse(x) => RunningStatistics::from_csr_columns(x),
        Layer::Dense(x) => RunningStatistics::from_dmatrix_columns(x),
    };

    let mut means: Vec<f32> = stat
        .mean()
        .iter()
        .map(|&m| if m == 0. { 1e-12 } else { m })
        .collect();
    let variances = stat.sample_variance();
    let mut dispersions: Vec<f32> = variances
        .iter()
        .zip(means.iter())
        .map(|(&v, &m)| v / m)
        .collect();

    let dispersions_norm = match args.flavor {
        Flavor::Seurat => {
            if args.log {
                for d in dispersions.iter_mut() {
                    *d = if *d == 0. { f32::NAN } else { d.ln() };
                }
                for m in means.iter_mut() {
                    *m = m.ln_1p();
                }
            }
            let bins = equal_width_bins(&means, args.n_bins);
            seurat_norm(&dispersions, &bins, args.n_bins)
        }
        Flavor::CellRanger => {
            let bins = percentile_bins(&means);
            cell_ranger_norm(&dispersions, &bins)
        }
        Flavor::Svr => {
            let nn = xx.nrows() as f32;
            let ddof = if nn > 1. { (nn - 1.) / nn } else { 0. };
            let stds: Vec<f32> = variances.iter().map(|&v| (v * ddof).max(0.).sqrt()).collect();
            svr_residuals(&means, &stds)?
        }
    };

    Ok(GeneDispersion {
        means,
        dispersions,
        dispersions_norm,
    })
}

/// Residual of every gene's log2 coefficient of variation from a
/// Gaussian-kernel SVR fitted on log2 means. Genes without a finite
/// coefficient of variation get NaN and take no part in the fit.
fn svr_residuals(means: &[f32], stds: &[f32]) -> anyhow::Result<Vec<f32>> {
    let points: Vec<(usize, f64, f64)> = means
        .iter()
        .zip(stds.iter())
        .enumerate()
        .filter_map(|(j, (&m, &s))| {
            let log_mu = (m as f64).log2();
            let log_cv = (s as f64 / m as f64).log2();
            (log_mu.is_finite() && log_cv.is_finite()).then_some((j, log_mu, log_cv))
        })
        .collect();

    let mut ret = vec![f32::NAN; means.len()];
    if points.len() < 2 {
        return Ok(ret);
    }

    let records = Array2::from_shape_fn((points.len(), 1), |(i, _)| points[i].1);
    let targets: Array1<f64> = points.iter().map(|p| p.2).collect();

    // kernel exp(-|x - y|^2 / eps), eps = n_genes / 150
    let kernel_eps = means.len() as f64 / 150.;
    let model = Svm::<f64, f64>::params()
        .c_svr(1., Some(0.1))
        .gaussian_kernel(kernel_eps)
        .fit(&Dataset::new(records.clone(), targets))?;
    let fitted: Array1<f64> = model.predict(&records);

    for (&(j, _, log_cv), &f) in points.iter().zip(fitted.iter()) {
        ret[j] = (log_cv - f) as f32;
    }
    info!("svr fit of log2 cv on {} genes", points.len());
    Ok(ret)
}

/// Bin index of every value among `n_bins` equal-width intervals over
/// the finite range of `values`
fn equal_width_bins(values: &[f32], n_bins: usize) -> Vec<usize> {
    let finite = values.iter().copied().filter(|x| x.is_finite());
    let lb = finite.clone().fold(f32::INFINITY, f32::min);
    let ub = finite.fold(f32::NEG_INFINITY, f32::max);
    let width = (ub - lb) / n_bins as f32;

    values
        .iter()
        .map(|&x| {
            if !(width > 0.) || !x.is_finite() {
                0
            } else {
                (((x - lb) / width).floor() as usize).min(n_bins - 1)
            }
        })
        .collect()
}

/// Bins split at the 10th, 15th, ..., 100th percentiles; intervals are
/// closed on the right
fn percentile_bins(values: &[f32]) -> Vec<usize> {
    let edges: Vec<f32> = (0..19)
        .filter_map(|k| percentile(values, 10. + 5. * k as f32))
        .collect();
    values
        .iter()
        .map(|&x| edges.partition_point(|&e| e < x))
        .collect()
}

/// Finite (non-NaN) values of `xx` grouped by bin
fn group_by_bin(xx: &[f32], bins: &[usize], n_bins: usize) -> Vec<Vec<f32>> {
    let mut groups = vec![vec![]; n_bins];
    for (&x, &b) in xx.iter().zip(bins.iter()) {
        if !x.is_nan() {
            groups[b].push(x);
        }
    }
    groups
}

fn seurat_norm(dispersions: &[f32], bins: &[usize], n_bins: usize) -> Vec<f32> {
    let groups = group_by_bin(dispersions, bins, n_bins);

    // a bin with a single gene gets mean 0 and its value as the scale
    let (bin_mean, bin_std): (Vec<f32>, Vec<f32>) = groups
        .iter()
        .map(|g| {
            let n = g.len() as f32;
            let mean = g.iter().sum::<f32>() / n;
            if g.len() > 1 {
                let ss = g.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>();
                (mean, (ss / (n - 1.)).sqrt())
            } else {
                (0., mean)
            }
        })
        .unzip();

    dispersions
        .iter()
        .zip(bins.iter())
        .map(|(&d, &b)| (d - bin_mean[b]) / bin_std[b])
        .collect()
}

fn cell_ranger_norm(dispersions: &[f32], bins: &[usize]) -> Vec<f32> {
    let n_bins = bins.iter().copied().max().map_or(0, |b| b + 1);
    let groups = group_by_bin(dispersions, bins, n_bins);

    // median absolute deviation, scaled to a normal sd
    let stats: Vec<(f32, f32)> = groups
        .iter()
        .map(|g| {
            let med = median(g).unwrap_or(f32::NAN);
            let dev: Vec<f32> = g.iter().map(|x| (x - med).abs()).collect();
            let mad = median(&dev).unwrap_or(f32::NAN) / 0.6745;
            (med, mad)
        })
        .collect();

    dispersions
        .iter()
        .zip(bins.iter())
        .map(|(&d, &b)| (d - stats[b].0).abs() / stats[b].1)
        .collect()
}
