use crate::tl::utils::{xy_norm, R_squared};
use anno_data::{AnnotatedData, Axis, Column, Layer};
use log::{info, warn};
use matrix_util::utils::percentile;
use nalgebra::DMatrix;

#[derive(Clone, Debug)]
pub struct VelocityArgs {
    /// layer the velocities are stored in
    pub vkey: String,
    /// fit only on cells in the lower and upper percentiles of the
    /// normalized abundance; all cells if `None`
    pub perc: Option<[f32; 2]>,
    /// minimum goodness of fit of a velocity gene
    pub min_r2: f32,
    /// fit on the raw `spliced`/`unspliced` counts instead of `Ms`/`Mu`
    pub use_raw: bool,
    /// fit an intercept besides the degradation rate
    pub fit_offset: bool,
}

impl Default for VelocityArgs {
    fn default() -> Self {
        Self {
            vkey: "velocity".into(),
            perc: Some([5., 95.]),
            min_r2: 0.01,
            use_raw: false,
            fit_offset: false,
        }
    }
}

/// Steady-state fit of one gene
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SteadyState {
    pub gamma: f32,
    pub offset: f32,
}

/// Weighted least squares of `y ~ gamma * x (+ offset)`. Zero weights
/// drop a cell. A degenerate fit gives zero slope.
pub fn fit_steady_state(x: &[f32], y: &[f32], w: &[bool], fit_offset: bool) -> SteadyState {
    let pairs = || {
        x.iter()
            .zip(y.iter())
            .zip(w.iter())
            .filter(|(_, w)| **w)
            .map(|((&x, &y), _)| (x, y))
    };

    if fit_offset {
        let n = pairs().count() as f32;
        if n == 0. {
            return SteadyState { gamma: 0., offset: 0. };
        }
        let x_mean = pairs().map(|(x, _)| x).sum::<f32>() / n;
        let y_mean = pairs().map(|(_, y)| y).sum::<f32>() / n;
        let cov: f32 = pairs().map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
        let var: f32 = pairs().map(|(x, _)| (x - x_mean) * (x - x_mean)).sum();
        let gamma = if var > 0. { cov / var } else { 0. };
        SteadyState {
            gamma,
            offset: y_mean - gamma * x_mean,
        }
    } else {
        let xy: f32 = pairs().map(|(x, y)| x * y).sum();
        let xx: f32 = pairs().map(|(x, _)| x * x).sum();
        SteadyState {
            gamma: if xx > 0. { xy / xx } else { 0. },
            offset: 0.,
        }
    }
}

/// Cells in the extreme percentiles of each gene's normalized
/// abundance (every cell if `perc` is `None`)
fn extreme_quantile_weights(xx: &DMatrix<f32>, yy: &DMatrix<f32>, perc: Option<[f32; 2]>) -> DMatrix<bool> {
    let Some([lo, hi]) = perc else {
        return DMatrix::from_element(xx.nrows(), xx.ncols(), true);
    };

    let norm = xy_norm(xx, yy);
    let mut ret = DMatrix::from_element(xx.nrows(), xx.ncols(), false);
    for (j, col) in norm.column_iter().enumerate() {
        let values: Vec<f32> = col.iter().copied().collect();
        let lb = percentile(&values, lo).unwrap_or(f32::NEG_INFINITY);
        let ub = percentile(&values, hi).unwrap_or(f32::INFINITY);
        for (i, &w) in values.iter().enumerate() {
            ret[(i, j)] = w <= lb || w >= ub;
        }
    }
    ret
}

/// RNA velocity under the deterministic steady-state model.
///
/// For each gene the degradation rate `gamma` is the weighted least
/// squares slope of unspliced over spliced abundance, fitted on the
/// cells at the extreme quantiles. The velocity is the residual
/// `u - gamma * s (- offset)`.
///
/// Stores the layer `<vkey>`, the var attributes `<vkey>_gamma`,
/// `<vkey>_r2`, `<vkey>_genes` (and `<vkey>_offset` when fitted), and
/// the parameters under `<vkey>_params`.
pub fn velocity<A>(adata: &mut A, args: &VelocityArgs) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let (xkey, ykey) = if args.use_raw {
        ("spliced", "unspliced")
    } else {
        ("Ms", "Mu")
    };
    let ss = adata.layer(xkey)?.to_dense();
    let uu = adata.layer(ykey)?.to_dense();
    let weights = extreme_quantile_weights(&ss, &uu, args.perc);

    let n_genes = ss.ncols();
    let mut gamma = Vec::with_capacity(n_genes);
    let mut offset = Vec::with_capacity(n_genes);
    for j in 0..n_genes {
        let x: Vec<f32> = ss.column(j).iter().copied().collect();
        let y: Vec<f32> = uu.column(j).iter().copied().collect();
        let w: Vec<bool> = weights.column(j).iter().copied().collect();
        let fit = fit_steady_state(&x, &y, &w, args.fit_offset);
        gamma.push(fit.gamma);
        offset.push(fit.offset);
    }

    let mut vv = uu.clone();
    for (j, mut v) in vv.column_iter_mut().enumerate() {
        for (i, x) in v.iter_mut().enumerate() {
            *x -= gamma[j] * ss[(i, j)] + offset[j];
        }
    }

    let mut centred = uu.clone();
    for mut col in centred.column_iter_mut() {
        let mu = col.mean();
        col.add_scalar_mut(-mu);
    }
    let r2 = R_squared(&vv, &centred);

    let s_max: Vec<f32> = ss.column_iter().map(|c| c.max()).collect();
    let u_max: Vec<f32> = uu.column_iter().map(|c| c.max()).collect();
    let genes: Vec<bool> = (0..n_genes)
        .map(|j| r2[j] > args.min_r2 && gamma[j] > 0.01 && s_max[j] > 0. && u_max[j] > 0.)
        .collect();

    let n_velocity_genes = genes.iter().filter(|&&g| g).count();
    if n_velocity_genes == 0 {
        warn!("no velocity genes: the fit explains none of the genes");
    }
    info!("{} velocity genes out of {}", n_velocity_genes, n_genes);

    let vkey = &args.vkey;
    adata.set_layer(vkey, Layer::Dense(vv))?;
    adata.set_attr(Axis::Var, &format!("{}_gamma", vkey), Column::Float(gamma))?;
    adata.set_attr(Axis::Var, &format!("{}_r2", vkey), Column::Float(r2))?;
    adata.set_attr(Axis::Var, &format!("{}_genes", vkey), Column::Bool(genes))?;
    if args.fit_offset {
        adata.set_attr(Axis::Var, &format!("{}_offset", vkey), Column::Float(offset))?;
    }
    adata.set_uns(
        &format!("{}_params", vkey),
        serde_json::json!({
            "mode": "deterministic",
            "perc": args.perc,
            "min_r2": args.min_r2,
            "use_raw": args.use_raw,
            "fit_offset": args.fit_offset,
        }),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anno_data::AnnMatrix;
    use approx::assert_abs_diff_eq;

    #[test]
    fn slope_through_origin() {
        let x = [1., 2., 3., 4.];
        let y = [0.5, 1., 1.5, 100.];
        let fit = fit_steady_state(&x, &y, &[true, true, true, false], false);
        assert_abs_diff_eq!(fit.gamma, 0.5, epsilon = 1e-6);
        assert_eq!(fit.offset, 0.);

        let fit = fit_steady_state(&x, &[2., 2.5, 3., 3.5], &[true; 4], true);
        assert_abs_diff_eq!(fit.gamma, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(fit.offset, 1.5, epsilon = 1e-5);

        let fit = fit_steady_state(&[0., 0.], &[1., 2.], &[true, true], false);
        assert_eq!(fit.gamma, 0.);
    }

    fn moments_data() -> anyhow::Result<AnnMatrix> {
        // gene 0: u = 0.5 s give or take 0.3, gene 1 silent
        let n = 40;
        let ms = DMatrix::from_fn(n, 2, |i, j| if j == 0 { i as f32 / 4. } else { 0. });
        let mu = DMatrix::from_fn(n, 2, |i, j| {
            if j == 0 {
                let s = i as f32 / 4.;
                if i % 2 == 0 { 0.5 * s + 0.3 } else { 0.5 * s - 0.3 }
            } else {
                0.
            }
        });
        let mut adata = AnnMatrix::from_layer(Layer::Dense(ms.clone()));
        adata.set_layer("Ms", Layer::Dense(ms))?;
        adata.set_layer("Mu", Layer::Dense(mu))?;
        Ok(adata)
    }

    #[test]
    fn velocities_are_residuals_of_the_fit() -> anyhow::Result<()> {
        let mut adata = moments_data()?;
        let args = VelocityArgs {
            perc: None,
            ..Default::default()
        };
        velocity(&mut adata, &args)?;

        let gamma = adata.attr(Axis::Var, "velocity_gamma")?.to_f32().unwrap_or_default();
        assert_abs_diff_eq!(gamma[0], 0.5, epsilon = 0.02);
        assert_eq!(gamma[1], 0.);

        let genes = adata.attr(Axis::Var, "velocity_genes")?.as_bool().map(|g| g.to_vec());
        assert_eq!(genes, Some(vec![true, false]));

        let vv = adata.layer("velocity")?.to_dense();
        let ms = adata.layer("Ms")?.to_dense();
        let mu = adata.layer("Mu")?.to_dense();
        for i in 0..vv.nrows() {
            assert_abs_diff_eq!(vv[(i, 0)], mu[(i, 0)] - gamma[0] * ms[(i, 0)], epsilon = 1e-5);
        }
        assert!(adata.uns("velocity_params").is_ok());
        Ok(())
    }

    #[test]
    fn offset_is_stored_when_fitted() -> anyhow::Result<()> {
        let mut adata = moments_data()?;
        let args = VelocityArgs {
            fit_offset: true,
            vkey: "v".into(),
            ..Default::default()
        };
        velocity(&mut adata, &args)?;
        assert!(adata.has_attr(Axis::Var, "v_offset"));
        assert!(adata.has_layer("v"));
        Ok(())
    }
}
