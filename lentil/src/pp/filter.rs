use crate::pp::utils::set_initial_size;
use anno_data::{AnnotatedData, Axis, Column, Layer};
use log::info;

/// Gene filters on spliced (`X`) and unspliced counts
#[derive(Clone, Debug)]
pub struct FilterGenesArgs {
    /// minimum total counts of a gene
    pub min_counts: Option<f32>,
    /// minimum number of cells expressing a gene
    pub min_cells: Option<f32>,
    pub max_counts: Option<f32>,
    pub max_cells: Option<f32>,
    /// the same four bounds on the unspliced layer
    pub min_counts_u: Option<f32>,
    pub min_cells_u: Option<f32>,
    pub max_counts_u: Option<f32>,
    pub max_cells_u: Option<f32>,
}

impl Default for FilterGenesArgs {
    fn default() -> Self {
        Self {
            min_counts: Some(3.),
            min_cells: None,
            max_counts: None,
            max_cells: None,
            min_counts_u: Some(3.),
            min_cells_u: None,
            max_counts_u: None,
            max_cells_u: None,
        }
    }
}

#[derive(Clone, Copy)]
enum GeneStat {
    Counts,
    Cells,
}

impl GeneStat {
    fn key(&self) -> &'static str {
        match self {
            GeneStat::Counts => "n_counts",
            GeneStat::Cells => "n_cells",
        }
    }

    fn compute(&self, xx: &Layer) -> Vec<f32> {
        match self {
            GeneStat::Counts => xx.column_sums(),
            GeneStat::Cells => xx.column_positive_counts(),
        }
    }
}

/// Keep genes whose statistic lies in `[lb, ub]`; returns the number of
/// genes removed
fn subset_genes_within<A>(
    adata: &mut A,
    stat: &[f32],
    lb: f32,
    ub: f32,
) -> anyhow::Result<usize>
where
    A: AnnotatedData + ?Sized,
{
    let mask: Vec<bool> = stat.iter().map(|&x| lb <= x && x <= ub).collect();
    let n_removed = mask.iter().filter(|&&b| !b).count();
    adata.subset(&mask, Axis::Var)?;
    Ok(n_removed)
}

/// Filter genes by total counts and number of expressing cells, first
/// on `X` and then on the `unspliced` layer.
///
/// Initial cell sizes are recorded before anything is removed. Each
/// bound on `X` is applied on its own, storing the statistic it used
/// (`n_counts` or `n_cells`) in var for the surviving genes.
pub fn filter_genes<A>(adata: &mut A, args: &FilterGenesArgs) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    set_initial_size(adata, &["spliced", "unspliced"])?;

    let bounds = [
        (GeneStat::Counts, args.min_counts, None),
        (GeneStat::Counts, None, args.max_counts),
        (GeneStat::Cells, args.min_cells, None),
        (GeneStat::Cells, None, args.max_cells),
    ];

    for (stat, lb, ub) in bounds {
        if lb.is_none() && ub.is_none() {
            continue;
        }
        let values = stat.compute(adata.x());
        adata.set_attr(Axis::Var, stat.key(), Column::Float(values.clone()))?;
        let n_removed = subset_genes_within(
            adata,
            &values,
            lb.unwrap_or(f32::NEG_INFINITY),
            ub.unwrap_or(f32::INFINITY),
        )?;
        info!("filtered out {} genes by {}", n_removed, stat.key());
    }

    if adata.has_layer("unspliced") {
        let bounds_u = [
            (GeneStat::Counts, args.min_counts_u, args.max_counts_u),
            (GeneStat::Cells, args.min_cells_u, args.max_cells_u),
        ];
        for (stat, lb, ub) in bounds_u {
            if lb.is_none() && ub.is_none() {
                continue;
            }
            let values = stat.compute(adata.layer("unspliced")?);
            let n_removed = subset_genes_within(
                adata,
                &values,
                lb.unwrap_or(f32::NEG_INFINITY),
                ub.unwrap_or(f32::INFINITY),
            )?;
            info!("filtered out {} genes by unspliced {}", n_removed, stat.key());
        }
    }

    Ok(())
}
