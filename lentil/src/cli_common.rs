pub use clap::{Args, Parser, Subcommand, ValueEnum};
pub use log::info;

pub use anno_data::io::{read_embedding, read_mtx_dir, write_mtx_dir};
pub use anno_data::{AnnMatrix, AnnotatedData};
pub use matrix_util::common_io::mkdir;
pub use matrix_util::dmatrix_io::write_tsv_with_names;
pub use matrix_util::mtx_io::write_mtx_csr;
pub use matrix_util::neighbors::NeighborMode;

pub const DEFAULT_KNN: usize = 30;
pub const DEFAULT_PCS: usize = 30;

/// `RUST_LOG=info` when verbose, then start the logger
pub fn init_logger(verbose: bool) {
    if verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}

/// `<dir>/<file>` as a string
pub fn out_file(dir: &str, file: &str) -> anyhow::Result<String> {
    std::path::Path::new(dir)
        .join(file)
        .to_str()
        .map(|s| s.to_string())
        .ok_or(anyhow::anyhow!("invalid path in {}", dir))
}

/// Neighbour lookup CLI enum
#[derive(ValueEnum, Clone, Debug, Default, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum NeighborModeCli {
    /// pruned kNN distances
    #[default]
    Distances,
    /// non-zero fuzzy connectivities
    Connectivities,
}

impl From<NeighborModeCli> for NeighborMode {
    fn from(cli: NeighborModeCli) -> Self {
        match cli {
            NeighborModeCli::Distances => NeighborMode::Distances,
            NeighborModeCli::Connectivities => NeighborMode::Connectivities,
        }
    }
}
