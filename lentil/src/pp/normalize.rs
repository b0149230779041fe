use crate::pp::utils::initial_size_key;
use anno_data::{AnnotatedData, Axis, Column, Layer};
use log::info;
use matrix_util::utils::median;

/// Count layers whose normalization is tracked by initial sizes
pub const COUNT_LAYERS: [&str; 2] = ["spliced", "unspliced"];

#[derive(Clone, Debug)]
pub struct NormalizeArgs {
    /// target total per cell; median of the non-zero totals if `None`
    pub counts_per_cell_after: Option<f32>,
    /// precomputed totals; `initial_size_spliced` or the row sums of
    /// `X` otherwise
    pub counts_per_cell: Option<Vec<f32>>,
    /// obs key for the totals
    pub key_n_counts: String,
    /// log1p-transform `X` at the end
    pub log: bool,
}

impl Default for NormalizeArgs {
    fn default() -> Self {
        Self {
            counts_per_cell_after: None,
            counts_per_cell: None,
            key_n_counts: "n_counts".into(),
            log: true,
        }
    }
}

/// Scale each row of `xx` so that, measured by `counts_per_cell`, it
/// sums to `after` (median of the positive totals if `None`). Rows with
/// a zero total are left as they are.
pub fn normalize_rows_to(xx: &Layer, counts_per_cell: &[f32], after: Option<f32>) -> Layer {
    let positive: Vec<f32> = counts_per_cell.iter().copied().filter(|&c| c > 0.).collect();
    let after = after.or_else(|| median(&positive)).unwrap_or(1.);

    let factors: Vec<f32> = counts_per_cell
        .iter()
        .map(|&c| if c > 0. { after / c } else { 1. })
        .collect();
    xx.scale_rows(&factors)
}

/// Normalize total counts per cell of `X`, then of the count layers.
///
/// Totals default to `initial_size_spliced`, so that cells keep the
/// scale measured before gene filtering. The totals are stored in obs
/// under `key_n_counts`.
pub fn normalize_per_cell<A>(adata: &mut A, args: &NormalizeArgs) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let counts_per_cell = match &args.counts_per_cell {
        Some(c) => c.clone(),
        None => match adata.attr(Axis::Obs, &initial_size_key("spliced")) {
            Ok(c) => c.to_f32().ok_or(anyhow::anyhow!("initial sizes are not numeric"))?,
            Err(_) => adata.x().row_sums(),
        },
    };

    adata.set_attr(
        Axis::Obs,
        &args.key_n_counts,
        Column::Float(counts_per_cell.clone()),
    )?;

    let x = normalize_rows_to(adata.x(), &counts_per_cell, args.counts_per_cell_after);
    adata.set_x(x)?;

    normalize_layers(adata, &COUNT_LAYERS)?;

    if args.log {
        log1p(adata)?;
    }
    Ok(())
}

/// True if the first stored values look like raw counts
fn holds_counts(xx: &Layer) -> bool {
    xx.leading_values(10)
        .iter()
        .all(|&x| x.rem_euclid(1.) <= 1e-3)
}

/// Normalize the given layers to the median total per cell.
///
/// Spliced and unspliced layers are only touched while they still hold
/// counts, and are sized by their `initial_size_<layer>` when present.
/// Any other layer is normalized by its own totals. Missing layers are
/// skipped.
pub fn normalize_layers<A>(adata: &mut A, layers: &[&str]) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    for &name in layers {
        if !adata.has_layer(name) {
            continue;
        }

        let xx = adata.layer(name)?;
        let (size, not_yet_normalized) = if COUNT_LAYERS.contains(&name) {
            let size = adata
                .attr(Axis::Obs, &initial_size_key(name))
                .ok()
                .and_then(|c| c.to_f32());
            (size, holds_counts(xx))
        } else {
            (None, true)
        };

        if not_yet_normalized {
            let size = size.unwrap_or_else(|| xx.row_sums());
            let normalized = normalize_rows_to(xx, &size, None);
            adata.set_layer(name, normalized)?;
            info!("normalized layer {}", name);
        }
    }
    Ok(())
}

/// Natural `log(1 + x)` of `X`
pub fn log1p<A>(adata: &mut A) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let x = adata.x().map_values(f32::ln_1p);
    adata.set_x(x)
}
