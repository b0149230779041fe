//! RNA velocity preprocessing and neighbourhood graphs on annotated
//! spliced/unspliced count matrices.
//!
//! * [`pp`] - gene filtering, normalization, neighbours and moments
//! * [`tl`] - velocity estimation, velocity graph, transitions and the
//!   statistical helpers used around them

pub mod pp;
pub mod tl;

pub use anno_data::{AnnMatrix, AnnotatedData, Axis, Column, Layer};
