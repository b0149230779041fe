use crate::common_io::*;
use crate::traits::MatTriplets;
use nalgebra_sparse::CsrMatrix;
use std::io::Write;

/// Write the triplets into a MatrixMarket file with 1-based indices
/// * `triplets` - the triplets to write
/// * `nrow` - number of rows
/// * `ncol` - number of columns
/// * `mtx_file` - the output file (e.g., "matrix.mtx.gz")
pub fn write_mtx_triplets(
    triplets: &[(usize, usize, f32)],
    nrow: usize,
    ncol: usize,
    mtx_file: &str,
) -> anyhow::Result<()> {
    if let Some(parent_dir) = std::path::Path::new(mtx_file).parent() {
        std::fs::create_dir_all(parent_dir)?;
    }

    let mut buf = open_buf_writer(mtx_file)?;

    // write the header
    let nnz = triplets.len();
    writeln!(buf, "%%MatrixMarket matrix coordinate real general")?;
    writeln!(buf, "{}\t{}\t{}", nrow, ncol, nnz)?;

    // write them with 1-based indices
    for (row, col, val) in triplets {
        writeln!(buf, "{}\t{}\t{}", row + 1, col + 1, val)?;
    }

    buf.flush()?;
    Ok(())
}

/// Read a matrix market file and return a vector of triplets (row, col, val)
/// together with the `(nrow, ncol, nnz)` shape in the header
/// * `mtx_file` - Path to the matrix market file
pub fn read_mtx_triplets(
    mtx_file: &str,
) -> anyhow::Result<(Vec<(usize, usize, f32)>, (usize, usize, usize))> {
    let mtx_hdr_position = 0;
    let ReadLinesOut {
        lines: mtx_data_lines,
        header: mtx_data_hdr,
    } = read_lines_of_words(mtx_file, mtx_hdr_position)?;

    // Convert a triplet of strings to a triplet of usize, usize, f32
    fn parse_row_col_val(triplet: &[Box<str>]) -> Option<(usize, usize, f32)> {
        if triplet.len() != 3 {
            return None;
        }

        // f32 should be enough for most cases
        let val = triplet[2].parse::<f32>().ok()?;

        // convert 1-based to 0-based
        let row = triplet[0].parse::<usize>().ok()?.checked_sub(1)?;
        let col = triplet[1].parse::<usize>().ok()?.checked_sub(1)?;

        Some((row, col, val))
    }

    if mtx_data_hdr.len() != 3 {
        return Err(anyhow::anyhow!("Failed to parse mtx header in {}", mtx_file));
    }

    let nrow = mtx_data_hdr[0].parse::<usize>()?;
    let ncol = mtx_data_hdr[1].parse::<usize>()?;
    let nnz = mtx_data_hdr[2].parse::<usize>()?;

    let mut mtx_triplets = mtx_data_lines
        .iter()
        .filter_map(|x| parse_row_col_val(x))
        .collect::<Vec<_>>();

    if mtx_triplets.len() != nnz {
        log::warn!(
            "{}: header says {} non-zeros, found {}",
            mtx_file,
            nnz,
            mtx_triplets.len()
        );
    }

    mtx_triplets.sort_by_key(|&(row, col, _)| (row, col));
    Ok((mtx_triplets, (nrow, ncol, nnz)))
}

/// Read a MatrixMarket file into a CSR matrix
pub fn read_mtx_csr(mtx_file: &str) -> anyhow::Result<CsrMatrix<f32>> {
    let (triplets, (nrow, ncol, _)) = read_mtx_triplets(mtx_file)?;
    CsrMatrix::<f32>::from_nonzero_triplets(nrow, ncol, triplets)
}

/// Write a CSR matrix into a MatrixMarket file
pub fn write_mtx_csr(csr: &CsrMatrix<f32>, mtx_file: &str) -> anyhow::Result<()> {
    let (nrow, ncol, triplets) = csr.to_nonzero_triplets()?;
    write_mtx_triplets(&triplets, nrow, ncol, mtx_file)
}
