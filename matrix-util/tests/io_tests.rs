use matrix_util::common_io::create_temp_dir_file;
use matrix_util::mtx_io::{read_mtx_csr, write_mtx_csr};
use matrix_util::sparse_util::from_dense;
use matrix_util::traits::{IoOps, SampleOps};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn dmatrix_io_test() -> anyhow::Result<()> {
    let xx = nalgebra::DMatrix::<f32>::runif_with(50, 50, &mut StdRng::seed_from_u64(0));

    let tsv_file = create_temp_dir_file("txt.gz")?;
    xx.to_tsv(tsv_file.to_str().unwrap())?;

    let yy = nalgebra::DMatrix::<f32>::read_file_delim(tsv_file.to_str().unwrap(), "\t", None)?;

    approx::assert_abs_diff_eq!(xx, yy);

    Ok(())
}

#[test]
fn mtx_io_test() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(1);
    let xx = nalgebra::DMatrix::<f32>::runif_with(30, 20, &mut rng).map(|x| {
        if x < 0.7 {
            0.
        } else {
            (x * 10.).round()
        }
    });
    let csr = from_dense(&xx);

    let mtx_file = create_temp_dir_file("mtx.gz")?;
    write_mtx_csr(&csr, mtx_file.to_str().unwrap())?;
    let back = read_mtx_csr(mtx_file.to_str().unwrap())?;

    assert_eq!(nalgebra::DMatrix::from(&back), xx);

    Ok(())
}
