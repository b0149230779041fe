pub mod bimodality;
pub mod categorical;
pub mod correlation;
pub mod embedding;
pub mod transition;
pub mod utils;
pub mod velocity;
pub mod velocity_graph;

pub use bimodality::{test_bimodality, Bimodality};
pub use categorical::{merge_groups, strings_to_categoricals};
pub use correlation::{corrcoef, vcorrcoef, CorrAxis, CorrMode};
pub use embedding::{velocity_embedding, EmbeddingArgs};
pub use transition::{transition_matrix, TransitionArgs};
pub use utils::*;
pub use velocity::{velocity, VelocityArgs};
pub use velocity_graph::{velocity_graph, VelocityGraphArgs};
