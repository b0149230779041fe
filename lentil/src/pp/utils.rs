use anno_data::{AnnotatedData, Axis, Column};
use log::info;

/// Count layers in the order they are reported
pub const ABUNDANCE_LAYERS: [&str; 3] = ["spliced", "unspliced", "ambiguous"];

/// Mean per-cell fraction of each count layer
#[derive(Clone, Debug, PartialEq)]
pub struct Proportions {
    pub layers: Vec<Box<str>>,
    pub fractions: Vec<f32>,
}

impl std::fmt::Display for Proportions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Abundance of {:?}: {:?}", self.layers, self.fractions)
    }
}

/// Fraction of spliced/unspliced/ambiguous abundances, averaged over
/// cells and rounded to two decimals. Cells without any count in these
/// layers are left out of the average.
pub fn show_proportions<A>(adata: &A) -> anyhow::Result<Proportions>
where
    A: AnnotatedData + ?Sized,
{
    let layers: Vec<Box<str>> = ABUNDANCE_LAYERS
        .iter()
        .filter(|k| adata.has_layer(k))
        .map(|&k| k.into())
        .collect();

    let totals = layers
        .iter()
        .map(|k| adata.layer(k).map(|x| x.row_sums()))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let nn = adata.n_obs();
    let cell_totals: Vec<f32> = (0..nn)
        .map(|i| totals.iter().map(|t| t[i]).sum())
        .collect();

    let fractions = totals
        .iter()
        .map(|tot| {
            let (s, n) = tot
                .iter()
                .zip(cell_totals.iter())
                .filter(|&(_, &c)| c > 0.)
                .fold((0_f32, 0_usize), |(s, n), (&t, &c)| (s + t / c, n + 1));
            let mean = if n > 0 { s / n as f32 } else { 0. };
            (mean * 100.).round() / 100.
        })
        .collect();

    let ret = Proportions { layers, fractions };
    info!("{}", ret);
    Ok(ret)
}

/// Parts of the container [`cleanup`] may clear
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanTarget {
    Obs,
    Var,
    Uns,
    Layers,
    All,
}

/// Delete every entry of the selected parts whose key is not in `keep`
///
/// * `clean` - which parts to clear
/// * `keep` - keys that survive (e.g. `["spliced", "unspliced"]`)
pub fn cleanup<A>(adata: &mut A, clean: &[CleanTarget], keep: &[&str])
where
    A: AnnotatedData + ?Sized,
{
    let selected = |t: CleanTarget| clean.iter().any(|&c| c == t || c == CleanTarget::All);
    let dropped = |k: &str| !keep.iter().any(|&x| x == k);

    for axis in [Axis::Obs, Axis::Var] {
        let target = match axis {
            Axis::Obs => CleanTarget::Obs,
            Axis::Var => CleanTarget::Var,
        };
        if selected(target) {
            for key in adata.attr_keys(axis) {
                if dropped(key.as_ref()) {
                    adata.remove_attr(axis, &key);
                }
            }
        }
    }

    if selected(CleanTarget::Uns) {
        for key in adata.uns_keys() {
            if dropped(key.as_ref()) {
                adata.remove_uns(&key);
            }
        }
    }

    if selected(CleanTarget::Layers) {
        for key in adata.layer_names() {
            if dropped(key.as_ref()) {
                info!("removing layer {}", key);
                adata.remove_layer(&key);
            }
        }
    }
}

/// Record per-cell totals of each layer as `initial_size_<layer>` in
/// obs, but only if all `layers` exist
pub fn set_initial_size<A>(adata: &mut A, layers: &[&str]) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    if !layers.iter().all(|k| adata.has_layer(k)) {
        return Ok(());
    }
    for &k in layers {
        let size = adata.layer(k)?.row_sums();
        adata.set_attr(Axis::Obs, &initial_size_key(k), Column::Float(size))?;
    }
    Ok(())
}

pub fn initial_size_key(layer: &str) -> String {
    format!("initial_size_{}", layer)
}
