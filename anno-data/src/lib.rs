//! Annotated cells x genes matrices: named layers, per-cell and
//! per-gene attributes, cell graphs and embeddings, and an
//! unstructured store.

pub mod ann_matrix;
pub mod column;
pub mod error;
pub mod io;
pub mod layer;
pub mod traits;

pub use ann_matrix::AnnMatrix;
pub use column::{Categorical, Column};
pub use error::AnnError;
pub use layer::Layer;
pub use traits::{AnnotatedData, Axis};
