use crate::column::Column;
use crate::error::AnnError;
use crate::layer::Layer;
use crate::traits::{AnnotatedData, Axis};
use matrix_util::sparse_util;
use nalgebra::DMatrix;
use nalgebra_sparse::CsrMatrix;
use std::collections::BTreeMap;

/// In-memory annotated matrix
#[derive(Clone, Debug)]
pub struct AnnMatrix {
    x: Layer,
    obs_names: Vec<Box<str>>,
    var_names: Vec<Box<str>>,
    layers: BTreeMap<Box<str>, Layer>,
    obs: BTreeMap<Box<str>, Column>,
    var: BTreeMap<Box<str>, Column>,
    uns: BTreeMap<Box<str>, serde_json::Value>,
    graphs: BTreeMap<Box<str>, CsrMatrix<f32>>,
    obsm: BTreeMap<Box<str>, DMatrix<f32>>,
}

impl AnnMatrix {
    /// * `x` - the main cells x genes matrix
    /// * `obs_names` - cell names (e.g. barcodes)
    /// * `var_names` - gene names
    pub fn new(
        x: Layer,
        obs_names: Vec<Box<str>>,
        var_names: Vec<Box<str>>,
    ) -> anyhow::Result<Self> {
        if obs_names.len() != x.nrows() {
            return Err(AnnError::shape("cell names", x.nrows(), obs_names.len()).into());
        }
        if var_names.len() != x.ncols() {
            return Err(AnnError::shape("gene names", x.ncols(), var_names.len()).into());
        }
        Ok(Self {
            x,
            obs_names,
            var_names,
            layers: BTreeMap::new(),
            obs: BTreeMap::new(),
            var: BTreeMap::new(),
            uns: BTreeMap::new(),
            graphs: BTreeMap::new(),
            obsm: BTreeMap::new(),
        })
    }

    /// A container with generic names `cell_<i>` and `gene_<j>`
    pub fn from_layer(x: Layer) -> Self {
        let obs_names = (0..x.nrows()).map(|i| format!("cell_{}", i).into()).collect();
        let var_names = (0..x.ncols()).map(|j| format!("gene_{}", j).into()).collect();
        Self {
            x,
            obs_names,
            var_names,
            layers: BTreeMap::new(),
            obs: BTreeMap::new(),
            var: BTreeMap::new(),
            uns: BTreeMap::new(),
            graphs: BTreeMap::new(),
            obsm: BTreeMap::new(),
        }
    }

    fn check_layer_shape(&self, what: &str, layer: &Layer) -> Result<(), AnnError> {
        let expected = (self.n_obs(), self.n_vars());
        if layer.shape() != expected {
            return Err(AnnError::shape(
                what,
                format!("{:?}", expected),
                format!("{:?}", layer.shape()),
            ));
        }
        Ok(())
    }

    fn axis_len(&self, axis: Axis) -> usize {
        match axis {
            Axis::Obs => self.n_obs(),
            Axis::Var => self.n_vars(),
        }
    }

    fn attrs(&self, axis: Axis) -> &BTreeMap<Box<str>, Column> {
        match axis {
            Axis::Obs => &self.obs,
            Axis::Var => &self.var,
        }
    }

    fn attrs_mut(&mut self, axis: Axis) -> &mut BTreeMap<Box<str>, Column> {
        match axis {
            Axis::Obs => &mut self.obs,
            Axis::Var => &mut self.var,
        }
    }
}

impl AnnotatedData for AnnMatrix {
    fn n_obs(&self) -> usize {
        self.obs_names.len()
    }

    fn n_vars(&self) -> usize {
        self.var_names.len()
    }

    fn obs_names(&self) -> &[Box<str>] {
        &self.obs_names
    }

    fn var_names(&self) -> &[Box<str>] {
        &self.var_names
    }

    fn x(&self) -> &Layer {
        &self.x
    }

    fn set_x(&mut self, x: Layer) -> anyhow::Result<()> {
        self.check_layer_shape("X", &x)?;
        self.x = x;
        Ok(())
    }

    fn layer(&self, name: &str) -> anyhow::Result<&Layer> {
        self.layers
            .get(name)
            .ok_or_else(|| AnnError::missing("layer", name).into())
    }

    fn set_layer(&mut self, name: &str, layer: Layer) -> anyhow::Result<()> {
        self.check_layer_shape(&format!("layer {}", name), &layer)?;
        self.layers.insert(name.into(), layer);
        Ok(())
    }

    fn remove_layer(&mut self, name: &str) -> Option<Layer> {
        self.layers.remove(name)
    }

    fn layer_names(&self) -> Vec<Box<str>> {
        self.layers.keys().cloned().collect()
    }

    fn attr(&self, axis: Axis, key: &str) -> anyhow::Result<&Column> {
        let kind = match axis {
            Axis::Obs => "obs attribute",
            Axis::Var => "var attribute",
        };
        self.attrs(axis)
            .get(key)
            .ok_or_else(|| AnnError::missing(kind, key).into())
    }

    fn set_attr(&mut self, axis: Axis, key: &str, column: Column) -> anyhow::Result<()> {
        let expected = self.axis_len(axis);
        if column.len() != expected {
            return Err(AnnError::shape(&format!("{} {}", axis, key), expected, column.len()).into());
        }
        self.attrs_mut(axis).insert(key.into(), column);
        Ok(())
    }

    fn remove_attr(&mut self, axis: Axis, key: &str) -> Option<Column> {
        self.attrs_mut(axis).remove(key)
    }

    fn attr_keys(&self, axis: Axis) -> Vec<Box<str>> {
        self.attrs(axis).keys().cloned().collect()
    }

    fn uns(&self, key: &str) -> anyhow::Result<&serde_json::Value> {
        self.uns
            .get(key)
            .ok_or_else(|| AnnError::missing("uns entry", key).into())
    }

    fn set_uns(&mut self, key: &str, value: serde_json::Value) {
        self.uns.insert(key.into(), value);
    }

    fn remove_uns(&mut self, key: &str) -> Option<serde_json::Value> {
        self.uns.remove(key)
    }

    fn uns_keys(&self) -> Vec<Box<str>> {
        self.uns.keys().cloned().collect()
    }

    fn graph(&self, key: &str) -> anyhow::Result<&CsrMatrix<f32>> {
        self.graphs
            .get(key)
            .ok_or_else(|| AnnError::missing("graph", key).into())
    }

    fn set_graph(&mut self, key: &str, graph: CsrMatrix<f32>) -> anyhow::Result<()> {
        let nn = self.n_obs();
        if graph.nrows() != nn || graph.ncols() != nn {
            return Err(AnnError::shape(
                &format!("graph {}", key),
                format!("({}, {})", nn, nn),
                format!("({}, {})", graph.nrows(), graph.ncols()),
            )
            .into());
        }
        self.graphs.insert(key.into(), graph);
        Ok(())
    }

    fn remove_graph(&mut self, key: &str) -> Option<CsrMatrix<f32>> {
        self.graphs.remove(key)
    }

    fn obsm(&self, key: &str) -> anyhow::Result<&DMatrix<f32>> {
        self.obsm
            .get(key)
            .ok_or_else(|| AnnError::missing("embedding", key).into())
    }

    fn set_obsm(&mut self, key: &str, embedding: DMatrix<f32>) -> anyhow::Result<()> {
        if embedding.nrows() != self.n_obs() {
            return Err(
                AnnError::shape(&format!("embedding {}", key), self.n_obs(), embedding.nrows())
                    .into(),
            );
        }
        self.obsm.insert(key.into(), embedding);
        Ok(())
    }

    fn subset(&mut self, mask: &[bool], axis: Axis) -> anyhow::Result<()> {
        let nn = self.axis_len(axis);
        if mask.len() != nn {
            return Err(AnnError::shape(&format!("{} mask", axis), nn, mask.len()).into());
        }

        let keep: Vec<usize> = (0..nn).filter(|&i| mask[i]).collect();

        match axis {
            Axis::Obs => {
                self.x = self.x.select_rows(&keep)?;
                for layer in self.layers.values_mut() {
                    *layer = layer.select_rows(&keep)?;
                }
                for graph in self.graphs.values_mut() {
                    let rows = sparse_util::select_rows(graph, &keep)?;
                    *graph = sparse_util::select_columns(&rows, &keep);
                }
                for emb in self.obsm.values_mut() {
                    *emb = emb.select_rows(&keep);
                }
                self.obs_names = keep.iter().map(|&i| self.obs_names[i].clone()).collect();
            }
            Axis::Var => {
                self.x = self.x.select_columns(&keep);
                for layer in self.layers.values_mut() {
                    *layer = layer.select_columns(&keep);
                }
                self.var_names = keep.iter().map(|&j| self.var_names[j].clone()).collect();
            }
        }

        for column in self.attrs_mut(axis).values_mut() {
            *column = column.select(&keep);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_util::traits::MatTriplets;

    fn small() -> AnnMatrix {
        let x = DMatrix::from_row_slice(3, 2, &[1., 2., 3., 4., 5., 6.]);
        AnnMatrix::new(
            Layer::Dense(x),
            vec!["c0".into(), "c1".into(), "c2".into()],
            vec!["g0".into(), "g1".into()],
        )
        .unwrap()
    }

    #[test]
    fn missing_keys_are_typed() {
        let adata = small();
        let err = adata.layer("spliced").unwrap_err();
        assert_eq!(
            err.downcast_ref::<AnnError>(),
            Some(&AnnError::missing("layer", "spliced"))
        );
        assert!(adata.uns("params").is_err());
        assert!(adata.graph("connectivities").is_err());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut adata = small();
        let bad = Layer::Dense(DMatrix::zeros(2, 2));
        let err = adata.set_layer("spliced", bad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnnError>(),
            Some(AnnError::ShapeMismatch { .. })
        ));
        assert!(adata
            .set_attr(Axis::Var, "n_counts", Column::Float(vec![1.; 3]))
            .is_err());
        assert!(adata.set_graph("distances", CsrMatrix::zeros(3, 2)).is_err());
    }

    #[test]
    fn obs_subset_is_aligned() -> anyhow::Result<()> {
        let mut adata = small();
        adata.set_layer("spliced", Layer::Sparse(adata.x().to_sparse()))?;
        adata.set_attr(Axis::Obs, "size", Column::Float(vec![3., 7., 11.]))?;
        adata.set_attr(Axis::Var, "name", Column::Str(vec!["a".into(), "b".into()]))?;
        let graph = CsrMatrix::from_nonzero_triplets(
            3,
            3,
            vec![(0_usize, 2_usize, 0.5_f32), (2, 0, 0.5), (1, 2, 0.1)],
        )?;
        adata.set_graph("connectivities", graph)?;
        adata.set_obsm("X_umap", DMatrix::from_row_slice(3, 1, &[0., 1., 2.]))?;

        adata.subset(&[true, false, true], Axis::Obs)?;

        assert_eq!(adata.n_obs(), 2);
        assert_eq!(adata.obs_names(), &["c0".into(), "c2".into()] as &[Box<str>]);
        assert_eq!(adata.x().to_dense(), DMatrix::from_row_slice(2, 2, &[1., 2., 5., 6.]));
        assert_eq!(adata.layer("spliced")?.to_dense(), adata.x().to_dense());
        assert_eq!(adata.attr(Axis::Obs, "size")?, &Column::Float(vec![3., 11.]));
        assert_eq!(adata.attr(Axis::Var, "name")?.len(), 2);

        let g = DMatrix::from(adata.graph("connectivities")?);
        assert_eq!(g, DMatrix::from_row_slice(2, 2, &[0., 0.5, 0.5, 0.]));
        assert_eq!(adata.obsm("X_umap")?.as_slice(), &[0., 2.]);
        Ok(())
    }

    #[test]
    fn var_subset_is_aligned() -> anyhow::Result<()> {
        let mut adata = small();
        adata.set_attr(Axis::Var, "n_cells", Column::Int(vec![3, 1]))?;
        adata.subset(&[false, true], Axis::Var)?;
        assert_eq!(adata.n_vars(), 1);
        assert_eq!(adata.var_names(), &["g1".into()] as &[Box<str>]);
        assert_eq!(adata.attr(Axis::Var, "n_cells")?, &Column::Int(vec![1]));
        assert!(adata.subset(&[true], Axis::Obs).is_err());
        Ok(())
    }
}
