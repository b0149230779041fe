use anno_data::AnnError;
use matrix_util::utils::percentile;
use special::Error;

/// Outcome of [`test_bimodality`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bimodality {
    pub t_stat: f32,
    /// one-sided normal tail probability of `t_stat`
    pub p_val: f32,
    /// locations of the lower and the upper mode
    pub means: [f32; 2],
}

fn linspace(lb: f32, ub: f32, n: usize) -> Vec<f32> {
    if n == 1 {
        return vec![lb];
    }
    let step = (ub - lb) / (n - 1) as f32;
    (0..n).map(|k| lb + step * k as f32).collect()
}

fn std_dev(x: &[f32], ddof: usize) -> f32 {
    let n = x.len() as f32;
    let mu = x.iter().sum::<f32>() / n;
    let ss: f32 = x.iter().map(|v| (v - mu) * (v - mu)).sum();
    (ss / (n - ddof as f32)).sqrt()
}

/// Gaussian kernel density at each grid point, Scott's bandwidth
fn gaussian_kde(x: &[f32], grid: &[f32]) -> Vec<f32> {
    let n = x.len() as f32;
    let h = std_dev(x, 1) * n.powf(-0.2);
    let norm = 1. / (n * h * (2. * std::f32::consts::PI).sqrt());
    grid.iter()
        .map(|&g| {
            x.iter()
                .map(|&xi| {
                    let z = (g - xi) / h;
                    (-0.5 * z * z).exp()
                })
                .sum::<f32>()
                * norm
        })
        .collect()
}

/// Density histogram over the bins delimited by `edges`; the last bin
/// includes its right edge
fn density_histogram(x: &[f32], edges: &[f32]) -> Vec<f32> {
    let n_bins = edges.len() - 1;
    let mut counts = vec![0_f32; n_bins];
    let (lb, ub) = (edges[0], edges[n_bins]);
    for &v in x.iter().filter(|&&v| v >= lb && v <= ub) {
        let b = edges.partition_point(|&e| e <= v).saturating_sub(1).min(n_bins - 1);
        counts[b] += 1.;
    }
    let total: f32 = counts.iter().sum();
    counts
        .iter()
        .zip(edges.windows(2))
        .map(|(&c, w)| {
            let width = w[1] - w[0];
            if total > 0. && width > 0. {
                c / total / width
            } else {
                0.
            }
        })
        .collect()
}

fn argmax(x: &[f32]) -> usize {
    x.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(k, m), (i, &v)| if v > m { (i, v) } else { (k, m) })
        .0
}

fn argmin(x: &[f32]) -> usize {
    x.iter()
        .enumerate()
        .fold((0, f32::INFINITY), |(k, m), (i, &v)| if v < m { (i, v) } else { (k, m) })
        .0
}

/// Test a sample for two modes.
///
/// The density (Gaussian KDE, or a histogram) is evaluated on `bins`
/// evenly spaced points between the minimum and the maximum. The grid
/// is split at the lowest density near its middle, and the upper
/// half's peak is compared to that half's mean density.
pub fn test_bimodality(x: &[f32], bins: usize, kde: bool) -> anyhow::Result<Bimodality> {
    if bins < 8 {
        return Err(AnnError::InvalidConfig(format!("{} bins; need at least 8", bins)).into());
    }
    if x.len() < 2 {
        return Err(AnnError::InvalidConfig("need at least two values".into()).into());
    }

    let lb = x.iter().copied().fold(f32::INFINITY, f32::min);
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let ub = percentile(x, 99.9).unwrap_or(max);
    let grid = linspace(lb, if ub <= lb { ub } else { max }, bins);

    let density = if kde {
        gaussian_kde(x, &grid)
    } else {
        density_histogram(x, &grid)
    };

    let mut idx = bins / 2 - 2;
    idx += argmin(&density[idx..idx + 4]);

    let (lower, upper) = density.split_at(idx);
    let peak_0 = argmax(lower);
    let peak_1 = argmax(upper);

    let upper_mean = upper.iter().sum::<f32>() / upper.len() as f32;
    let spread = (std_dev(&density, 0) / (bins as f32).sqrt()).max(1.);
    let t_stat = (upper[peak_1] - upper_mean) / spread;
    let p_val = 0.5 * (t_stat as f64 / std::f64::consts::SQRT_2).compl_error();

    let (grid_0, grid_1) = grid.split_at(idx);
    let mode = |g: &[f32], p: usize| (g[p] + g[(p + 1).min(g.len() - 1)]) / 2.;

    Ok(Bimodality {
        t_stat,
        p_val: p_val as f32,
        means: [mode(grid_0, peak_0), mode(grid_1, peak_1)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn two_modes() -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(7);
        let lo = Normal::new(0_f32, 0.5).unwrap();
        let hi = Normal::new(5_f32, 0.5).unwrap();
        (0..2000)
            .map(|i| if i % 2 == 0 { lo.sample(&mut rng) } else { hi.sample(&mut rng) })
            .collect()
    }

    #[test]
    fn modes_of_a_mixture() -> anyhow::Result<()> {
        let x = two_modes();
        for kde in [true, false] {
            let res = test_bimodality(&x, 30, kde)?;
            assert_abs_diff_eq!(res.means[0], 0., epsilon = 0.6);
            assert_abs_diff_eq!(res.means[1], 5., epsilon = 0.6);
            assert!(res.t_stat > 0.);
            assert!(res.p_val < 0.5);
        }
        Ok(())
    }

    #[test]
    fn too_few_bins() {
        assert!(test_bimodality(&[1., 2., 3.], 5, true).is_err());
    }

    #[test]
    fn histogram_is_a_density() {
        let edges = linspace(0., 4., 5);
        let h = density_histogram(&[0., 0.5, 1., 3.9, 4.], &edges);
        assert_eq!(h.len(), 4);
        assert_abs_diff_eq!(h.iter().sum::<f32>(), 1., epsilon = 1e-6);
        assert_abs_diff_eq!(h[3], 0.4, epsilon = 1e-6);
    }
}
