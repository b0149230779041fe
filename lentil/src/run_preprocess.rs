use crate::cli_common::*;
use lentil::pp::{
    filter_genes, filter_genes_dispersion, normalize_per_cell, show_proportions, DispersionArgs,
    FilterGenesArgs, Flavor, NormalizeArgs,
};
use matrix_util::ndarray_stat::RunningStatistics;

/// Dispersion flavor CLI enum
#[derive(ValueEnum, Clone, Debug, Default, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum FlavorCli {
    /// z-scores within equal-width bins of log mean
    #[default]
    Seurat,
    /// robust z-scores within percentile bins of mean
    CellRanger,
    /// residual log2 CV from an SVR fit on log2 mean
    Svr,
}

impl From<FlavorCli> for Flavor {
    fn from(cli: FlavorCli) -> Self {
        match cli {
            FlavorCli::Seurat => Flavor::Seurat,
            FlavorCli::CellRanger => Flavor::CellRanger,
            FlavorCli::Svr => Flavor::Svr,
        }
    }
}

#[derive(Args, Debug)]
pub struct PreprocessArgs {
    #[arg(
        required = true,
        help = "Data directory with spliced/unspliced counts",
        long_help = "Data directory holding cells x genes MatrixMarket files.\n\n\
		     Expected files:\n\
		     - spliced.mtx[.gz], unspliced.mtx[.gz] (required)\n\
		     - ambiguous.mtx[.gz] (optional)\n\
		     - barcodes.tsv[.gz], genes.tsv[.gz] (optional names)"
    )]
    pub data_dir: Box<str>,

    #[arg(
        long,
        short = 'o',
        required = true,
        help = "Output directory",
        long_help = "Output directory.\n\n\
		     Generates:\n\
		     - X.mtx.gz and one {layer}.mtx.gz per layer\n\
		     - barcodes.tsv.gz, genes.tsv.gz\n\
		     - obs.tsv.gz, var.tsv.gz: per-cell and per-gene attributes\n\
		     - gene_stat.tsv.gz: per-gene statistics of X"
    )]
    pub out: Box<str>,

    #[arg(long, default_value_t = 3., help = "Minimum spliced counts per gene")]
    pub min_counts: f32,

    #[arg(long, default_value_t = 3., help = "Minimum unspliced counts per gene")]
    pub min_counts_u: f32,

    #[arg(long, help = "Minimum number of cells expressing a gene")]
    pub min_cells: Option<f32>,

    #[arg(
        long,
        short = 'n',
        default_value_t = 2000,
        help = "Number of highly variable genes to keep",
        long_help = "Number of highly variable genes to keep.\n\
		     Nothing is removed if the data have fewer genes."
    )]
    pub n_top_genes: usize,

    #[arg(long, default_value = "seurat", help = "Dispersion normalization flavor")]
    pub flavor: FlavorCli,

    #[arg(
        long,
        help = "Target total counts per cell",
        long_help = "Target total counts per cell after normalization.\n\
		     Median of the non-zero cell totals if not given."
    )]
    pub counts_per_cell_after: Option<f32>,

    #[arg(long, default_value_t = false, help = "Skip log1p of X")]
    pub no_log: bool,

    #[arg(long, short, help = "Verbose output")]
    pub verbose: bool,
}

/// Load, filter genes, select variable genes and normalize
pub fn preprocess_data(args: &PreprocessArgs) -> anyhow::Result<AnnMatrix> {
    let mut adata = read_mtx_dir(&args.data_dir)?;
    show_proportions(&adata)?;

    let filter_args = FilterGenesArgs {
        min_counts: Some(args.min_counts),
        min_counts_u: Some(args.min_counts_u),
        min_cells: args.min_cells,
        ..Default::default()
    };
    filter_genes(&mut adata, &filter_args)?;

    let disp_args = DispersionArgs {
        flavor: args.flavor.clone().into(),
        n_top_genes: Some(args.n_top_genes),
        ..Default::default()
    };
    filter_genes_dispersion(&mut adata, &disp_args)?;

    let norm_args = NormalizeArgs {
        counts_per_cell_after: args.counts_per_cell_after,
        log: !args.no_log,
        ..Default::default()
    };
    normalize_per_cell(&mut adata, &norm_args)?;

    info!("{} cells x {} genes after preprocessing", adata.n_obs(), adata.n_vars());
    Ok(adata)
}

/// Write the container and per-gene statistics of `X`
pub fn write_preprocessed(adata: &AnnMatrix, out: &str) -> anyhow::Result<()> {
    write_mtx_dir(adata, out)?;
    let stat = RunningStatistics::from_csr_columns(&adata.x().to_sparse());
    stat.save(&out_file(out, "gene_stat.tsv.gz")?, adata.var_names(), "\t")
}

pub fn run_preprocess(args: &PreprocessArgs) -> anyhow::Result<()> {
    init_logger(args.verbose);

    let adata = preprocess_data(args)?;
    write_preprocessed(&adata, &args.out)?;
    Ok(())
}
