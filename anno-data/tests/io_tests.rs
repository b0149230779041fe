use anno_data::io::{read_embedding, read_mtx_dir, write_mtx_dir};
use anno_data::{AnnotatedData, Axis, Column};
use matrix_util::common_io::write_lines;
use matrix_util::dmatrix_io::write_tsv_with_names;
use matrix_util::mtx_io::write_mtx_triplets;
use nalgebra::DMatrix;

fn write_counts(dir: &str) -> anyhow::Result<()> {
    let spliced = vec![(0, 0, 3.), (0, 2, 1.), (1, 1, 4.), (2, 0, 2.), (2, 2, 5.)];
    let unspliced = vec![(0, 0, 1.), (1, 1, 2.), (2, 2, 1.)];
    write_mtx_triplets(&spliced, 3, 3, &format!("{}/spliced.mtx.gz", dir))?;
    write_mtx_triplets(&unspliced, 3, 3, &format!("{}/unspliced.mtx", dir))?;

    let barcodes: Vec<Box<str>> = vec!["AAA".into(), "CCC".into(), "GGG".into()];
    write_lines(&barcodes, &format!("{}/barcodes.tsv", dir))?;
    let genes: Vec<Box<str>> = vec!["Actb\tActb".into(), "Gapdh\tGapdh".into(), "Sox2\tSox2".into()];
    write_lines(&genes, &format!("{}/genes.tsv.gz", dir))?;
    Ok(())
}

#[test]
fn load_counts_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let dir = dir.path().to_str().unwrap().to_string();
    write_counts(&dir)?;

    let adata = read_mtx_dir(&dir)?;
    assert_eq!(adata.n_obs(), 3);
    assert_eq!(adata.n_vars(), 3);
    assert_eq!(adata.obs_names()[1].as_ref(), "CCC");
    assert_eq!(adata.var_names()[2].as_ref(), "Sox2");
    assert!(adata.has_layer("spliced"));
    assert!(adata.has_layer("unspliced"));
    assert!(!adata.has_layer("ambiguous"));
    assert_eq!(adata.x().row_sums(), vec![4., 4., 7.]);
    assert_eq!(adata.layer("unspliced")?.row_sums(), vec![1., 2., 1.]);
    Ok(())
}

#[test]
fn write_then_reload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("in");
    let output = dir.path().join("out");
    std::fs::create_dir_all(&input)?;
    let input = input.to_str().unwrap();
    let output = output.to_str().unwrap();

    write_counts(input)?;
    let mut adata = read_mtx_dir(input)?;
    adata.set_attr(Axis::Obs, "batch", Column::Str(vec!["a".into(), "b".into(), "a".into()]))?;
    adata.subset(&[true, false, true], Axis::Var)?;

    write_mtx_dir(&adata, output)?;
    assert!(std::path::Path::new(&format!("{}/X.mtx.gz", output)).is_file());

    let back = read_mtx_dir(output)?;
    assert_eq!(back.n_vars(), 2);
    assert_eq!(back.var_names()[1].as_ref(), "Sox2");
    assert_eq!(
        back.layer("spliced")?.to_dense(),
        adata.layer("spliced")?.to_dense()
    );
    Ok(())
}

#[test]
fn embedding_rows_follow_cell_names() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let dir_str = dir.path().to_str().unwrap().to_string();
    write_counts(&dir_str)?;
    let mut adata = read_mtx_dir(&dir_str)?;

    let emb_file = format!("{}/umap.tsv", dir_str);
    let emb = DMatrix::from_row_slice(3, 2, &[3., 3., 1., 1., 2., 2.]);
    let rows: Vec<Box<str>> = vec!["GGG".into(), "AAA".into(), "CCC".into()];
    let cols: Vec<Box<str>> = vec!["umap1".into(), "umap2".into()];
    write_tsv_with_names(&emb, &rows, &cols, &emb_file)?;

    read_embedding(&mut adata, "X_umap", &emb_file)?;
    let x_umap = adata.obsm("X_umap")?;
    assert_eq!(x_umap.row(0)[0], 1.);
    assert_eq!(x_umap.row(1)[0], 2.);
    assert_eq!(x_umap.row(2)[0], 3.);
    Ok(())
}
