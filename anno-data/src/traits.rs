use crate::column::Column;
use crate::layer::Layer;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;

/// Which side of the cells x genes matrix an annotation belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// cells (rows)
    Obs,
    /// genes (columns)
    Var,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Obs => write!(f, "obs"),
            Axis::Var => write!(f, "var"),
        }
    }
}

/// A cells x genes data matrix with named layers, per-cell and
/// per-gene attribute tables, cell x cell graphs, cell embeddings and
/// an unstructured key-value store.
///
/// Every accessor for a missing key fails with
/// [`crate::AnnError::MissingKey`]; every assignment whose shape does
/// not line up with `n_obs x n_vars` fails with
/// [`crate::AnnError::ShapeMismatch`].
pub trait AnnotatedData {
    fn n_obs(&self) -> usize;
    fn n_vars(&self) -> usize;

    fn obs_names(&self) -> &[Box<str>];
    fn var_names(&self) -> &[Box<str>];

    /// The main matrix
    fn x(&self) -> &Layer;
    fn set_x(&mut self, x: Layer) -> anyhow::Result<()>;

    fn layer(&self, name: &str) -> anyhow::Result<&Layer>;
    fn set_layer(&mut self, name: &str, layer: Layer) -> anyhow::Result<()>;
    fn remove_layer(&mut self, name: &str) -> Option<Layer>;
    fn layer_names(&self) -> Vec<Box<str>>;

    fn has_layer(&self, name: &str) -> bool {
        self.layer(name).is_ok()
    }

    fn attr(&self, axis: Axis, key: &str) -> anyhow::Result<&Column>;
    fn set_attr(&mut self, axis: Axis, key: &str, column: Column) -> anyhow::Result<()>;
    fn remove_attr(&mut self, axis: Axis, key: &str) -> Option<Column>;
    fn attr_keys(&self, axis: Axis) -> Vec<Box<str>>;

    fn has_attr(&self, axis: Axis, key: &str) -> bool {
        self.attr(axis, key).is_ok()
    }

    fn uns(&self, key: &str) -> anyhow::Result<&serde_json::Value>;
    fn set_uns(&mut self, key: &str, value: serde_json::Value);
    fn remove_uns(&mut self, key: &str) -> Option<serde_json::Value>;
    fn uns_keys(&self) -> Vec<Box<str>>;

    /// Cell x cell matrices such as `distances` or `connectivities`
    fn graph(&self, key: &str) -> anyhow::Result<&CsrMatrix<f32>>;
    fn set_graph(&mut self, key: &str, graph: CsrMatrix<f32>) -> anyhow::Result<()>;
    fn remove_graph(&mut self, key: &str) -> Option<CsrMatrix<f32>>;

    /// Cell embeddings (cells x dimensions), e.g. `X_pca`, `X_umap`
    fn obsm(&self, key: &str) -> anyhow::Result<&DMatrix<f32>>;
    fn set_obsm(&mut self, key: &str, embedding: DMatrix<f32>) -> anyhow::Result<()>;

    /// Keep the cells (`Axis::Obs`) or genes (`Axis::Var`) where `mask`
    /// is true. Everything aligned to that axis is subset together.
    fn subset(&mut self, mask: &[bool], axis: Axis) -> anyhow::Result<()>;
}
