use crate::common_io::{read_lines_of_types, read_lines_of_words_delim, write_lines, Delimiter};
use crate::traits::*;
pub use nalgebra::{DMatrix, DVector};

use std::fmt::{Debug, Display};
use std::str::FromStr;

impl<T> IoOps for DMatrix<T>
where
    T: nalgebra::Scalar + FromStr + Display + Copy,
    <T as FromStr>::Err: Debug,
{
    type Scalar = T;
    type Mat = Self;

    fn read_file_delim(
        tsv_file: &str,
        delim: impl Into<Delimiter>,
        skip: Option<usize>,
    ) -> anyhow::Result<Self::Mat> {
        let hdr_line = match skip {
            Some(skip) => skip as i64,
            None => -1, // no skipping
        };

        let data = read_lines_of_types::<T>(tsv_file, delim, hdr_line)?.lines;

        if data.is_empty() {
            return Err(anyhow::anyhow!("No data in file"));
        }

        let ncols = data[0].len();
        let nrows = data.len();

        if let Some(bad) = data.iter().position(|row| row.len() != ncols) {
            anyhow::bail!(
                "{}: row {} has {} columns, expected {}",
                tsv_file,
                bad,
                data[bad].len(),
                ncols
            );
        }

        let data = data.into_iter().flatten().collect::<Vec<_>>();

        Ok(DMatrix::<T>::from_row_iterator(nrows, ncols, data))
    }

    fn write_file_delim(&self, tsv_file: &str, delim: &str) -> anyhow::Result<()> {
        let lines = self
            .row_iter()
            .map(|row| {
                row.iter()
                    .map(|x| format!("{}", *x))
                    .collect::<Vec<String>>()
                    .join(delim)
                    .into_boxed_str()
            })
            .collect::<Vec<_>>();

        write_lines(&lines, tsv_file)?;
        Ok(())
    }
}

/// A matrix with row and column names
pub struct MatWithNames<M> {
    pub rows: Vec<Box<str>>,
    pub cols: Vec<Box<str>>,
    pub mat: M,
}

/// Write a tab-separated matrix with a header line of column names and
/// the row name as the first field of every line
pub fn write_tsv_with_names(
    xx: &DMatrix<f32>,
    row_names: &[Box<str>],
    column_names: &[Box<str>],
    tsv_file: &str,
) -> anyhow::Result<()> {
    if row_names.len() != xx.nrows() || column_names.len() != xx.ncols() {
        anyhow::bail!(
            "names ({} x {}) do not match the matrix ({} x {})",
            row_names.len(),
            column_names.len(),
            xx.nrows(),
            xx.ncols()
        );
    }

    let mut lines = Vec::with_capacity(xx.nrows() + 1);
    let header = std::iter::once("name")
        .chain(column_names.iter().map(|c| c.as_ref()))
        .collect::<Vec<_>>()
        .join("\t");
    lines.push(header.into_boxed_str());

    for (name, row) in row_names.iter().zip(xx.row_iter()) {
        let fields = row.iter().map(|x| format!("{}", x)).collect::<Vec<_>>();
        lines.push(format!("{}\t{}", name, fields.join("\t")).into_boxed_str());
    }

    write_lines(&lines, tsv_file)
}

/// Read a tab-separated matrix whose first line names the columns and
/// whose first field on every line names the row
pub fn read_tsv_with_names(tsv_file: &str) -> anyhow::Result<MatWithNames<DMatrix<f32>>> {
    let out = read_lines_of_words_delim(tsv_file, "\t", 0)?;

    let cols: Vec<Box<str>> = out.header.into_iter().skip(1).collect();
    let ncols = cols.len();
    let mut rows = Vec::with_capacity(out.lines.len());
    let mut data = Vec::with_capacity(out.lines.len() * ncols);

    for (i, words) in out.lines.iter().enumerate() {
        if words.len() != ncols + 1 {
            anyhow::bail!(
                "{}: line {} has {} fields, expected {}",
                tsv_file,
                i + 1,
                words.len(),
                ncols + 1
            );
        }
        rows.push(words[0].clone());
        for w in &words[1..] {
            data.push(w.trim().parse::<f32>()?);
        }
    }

    let mat = DMatrix::from_row_iterator(rows.len(), ncols, data);
    Ok(MatWithNames { rows, cols, mat })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_io::create_temp_dir_file;

    #[test]
    fn named_tsv_round_trip() -> anyhow::Result<()> {
        let file = create_temp_dir_file(".tsv.gz")?;
        let file = file.to_str().ok_or(anyhow::anyhow!("path"))?;

        let xx = DMatrix::from_row_slice(2, 3, &[1.5_f32, 0., -2., 3., 4., 5.25]);
        let rows: Vec<Box<str>> = vec!["AAAC".into(), "TTGA".into()];
        let cols: Vec<Box<str>> = vec!["x".into(), "y".into(), "z".into()];

        write_tsv_with_names(&xx, &rows, &cols, file)?;
        let back = read_tsv_with_names(file)?;

        assert_eq!(back.rows, rows);
        assert_eq!(back.cols, cols);
        assert_eq!(back.mat, xx);
        Ok(())
    }

    #[test]
    fn plain_tsv_round_trip() -> anyhow::Result<()> {
        let file = create_temp_dir_file(".tsv")?;
        let file = file.to_str().ok_or(anyhow::anyhow!("path"))?;

        let xx = DMatrix::from_row_slice(3, 2, &[1_f32, 2., 3., 4., 5., 6.]);
        xx.to_tsv(file)?;
        let back = DMatrix::<f32>::from_tsv(file, None)?;
        assert_eq!(back, xx);
        Ok(())
    }
}
