pub mod dispersion;
pub mod filter;
pub mod moments;
pub mod neighbors;
pub mod normalize;
pub mod utils;

pub use dispersion::{filter_genes_dispersion, DispersionArgs, Flavor};
pub use filter::{filter_genes, FilterGenesArgs};
pub use moments::{moments, MomentsArgs};
pub use neighbors::{get_connectivities, neighbors, NeighborsArgs};
pub use normalize::{log1p, normalize_layers, normalize_per_cell, NormalizeArgs};
pub use utils::{cleanup, set_initial_size, show_proportions, CleanTarget, Proportions};
