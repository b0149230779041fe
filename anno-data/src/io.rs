use crate::ann_matrix::AnnMatrix;
use crate::column::Column;
use crate::layer::Layer;
use crate::traits::{AnnotatedData, Axis};
use log::info;
use matrix_util::common_io::{find_plain_or_gz, read_lines_of_words_delim, write_lines};
use matrix_util::dmatrix_io::read_tsv_with_names;
use matrix_util::mtx_io::{read_mtx_csr, write_mtx_csr};
use std::path::Path;

/// Layers read by [`read_mtx_dir`], the first being required
pub const COUNT_LAYERS: [&str; 3] = ["spliced", "unspliced", "ambiguous"];

/// First column of every line of a (possibly gzipped) tsv file
fn read_names(file: &str) -> anyhow::Result<Vec<Box<str>>> {
    let out = read_lines_of_words_delim(file, "\t", -1)?;
    out.lines
        .into_iter()
        .map(|words| {
            words
                .into_iter()
                .next()
                .ok_or(anyhow::anyhow!("empty line in {}", file))
        })
        .collect()
}

/// Load a directory with `spliced.mtx[.gz]`, `unspliced.mtx[.gz]`,
/// optionally `ambiguous.mtx[.gz]` (cells x genes), `barcodes.tsv[.gz]`
/// and `genes.tsv[.gz]`. `X` starts as a copy of the spliced counts.
pub fn read_mtx_dir(dir: &str) -> anyhow::Result<AnnMatrix> {
    let spliced_file = find_plain_or_gz(dir, "spliced.mtx")
        .ok_or(anyhow::anyhow!("no spliced.mtx[.gz] in {}", dir))?;
    let spliced = read_mtx_csr(&spliced_file)?;

    let obs_names = match find_plain_or_gz(dir, "barcodes.tsv") {
        Some(file) => read_names(&file)?,
        None => (0..spliced.nrows()).map(|i| format!("cell_{}", i).into()).collect(),
    };
    let var_names = match find_plain_or_gz(dir, "genes.tsv") {
        Some(file) => read_names(&file)?,
        None => (0..spliced.ncols()).map(|j| format!("gene_{}", j).into()).collect(),
    };

    info!(
        "{}: {} cells x {} genes, {} non-zeros",
        spliced_file,
        spliced.nrows(),
        spliced.ncols(),
        spliced.nnz()
    );

    let mut adata = AnnMatrix::new(Layer::Sparse(spliced.clone()), obs_names, var_names)?;
    adata.set_layer(COUNT_LAYERS[0], Layer::Sparse(spliced))?;

    for name in COUNT_LAYERS.iter().skip(1) {
        if let Some(file) = find_plain_or_gz(dir, &format!("{}.mtx", name)) {
            let counts = read_mtx_csr(&file)?;
            info!("{}: {} non-zeros", file, counts.nnz());
            adata.set_layer(name, Layer::Sparse(counts))?;
        }
    }

    Ok(adata)
}

/// Attach a cell embedding read from a tsv file with a header line and
/// cell names in the first column; rows are matched by cell name.
pub fn read_embedding<A>(adata: &mut A, key: &str, tsv_file: &str) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let named = read_tsv_with_names(tsv_file)?;
    let position: fnv::FnvHashMap<&str, usize> = named
        .rows
        .iter()
        .enumerate()
        .map(|(i, r)| (r.as_ref(), i))
        .collect();

    let mut emb = nalgebra::DMatrix::<f32>::zeros(adata.n_obs(), named.mat.ncols());
    for (i, cell) in adata.obs_names().iter().enumerate() {
        let r = *position
            .get(cell.as_ref())
            .ok_or(anyhow::anyhow!("cell {} missing in {}", cell, tsv_file))?;
        emb.row_mut(i).copy_from(&named.mat.row(r));
    }
    adata.set_obsm(key, emb)
}

/// Write a layer (or `X` when `name` is "X") as a MatrixMarket file
pub fn write_layer_mtx<A>(adata: &A, name: &str, mtx_file: &str) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let layer = if name == "X" {
        adata.x()
    } else {
        adata.layer(name)?
    };
    write_mtx_csr(&layer.to_sparse(), mtx_file)
}

/// Write the attribute table of one axis as tsv: a header line, then
/// the name and every attribute per line
pub fn write_attr_tsv<A>(adata: &A, axis: Axis, tsv_file: &str) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    let keys = adata.attr_keys(axis);
    let names = match axis {
        Axis::Obs => adata.obs_names(),
        Axis::Var => adata.var_names(),
    };

    let columns: Vec<Vec<Box<str>>> = keys
        .iter()
        .map(|k| adata.attr(axis, k).map(Column::labels))
        .collect::<anyhow::Result<_>>()?;

    let mut lines = Vec::with_capacity(names.len() + 1);
    let header = std::iter::once("name")
        .chain(keys.iter().map(|k| k.as_ref()))
        .collect::<Vec<_>>()
        .join("\t");
    lines.push(header.into_boxed_str());

    for (i, name) in names.iter().enumerate() {
        let mut fields = vec![name.to_string()];
        fields.extend(columns.iter().map(|c| c[i].to_string()));
        lines.push(fields.join("\t").into_boxed_str());
    }

    write_lines(&lines, tsv_file)
}

/// Write `X`, every layer, both attribute tables and the names into
/// `dir`
pub fn write_mtx_dir<A>(adata: &A, dir: &str) -> anyhow::Result<()>
where
    A: AnnotatedData + ?Sized,
{
    std::fs::create_dir_all(dir)?;
    let path = |f: &str| -> anyhow::Result<String> {
        Path::new(dir)
            .join(f)
            .to_str()
            .map(|s| s.to_string())
            .ok_or(anyhow::anyhow!("invalid path in {}", dir))
    };

    write_layer_mtx(adata, "X", &path("X.mtx.gz")?)?;
    for name in adata.layer_names() {
        write_layer_mtx(adata, &name, &path(&format!("{}.mtx.gz", name))?)?;
    }
    write_lines(adata.obs_names(), &path("barcodes.tsv.gz")?)?;
    write_lines(adata.var_names(), &path("genes.tsv.gz")?)?;
    write_attr_tsv(adata, Axis::Obs, &path("obs.tsv.gz")?)?;
    write_attr_tsv(adata, Axis::Var, &path("var.tsv.gz")?)?;

    info!("wrote {} layers to {}", adata.layer_names().len() + 1, dir);
    Ok(())
}
