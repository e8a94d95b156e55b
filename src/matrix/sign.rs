use crate::matrix::{Dim, MatrixError};

/// Sparse {-1,+1} matrix stored both row-wise and column-wise. This is the
/// shape the recogniser consumes: zeros are absent and every stored entry is
/// a sign.
#[derive(Debug, Clone)]
pub struct SignMatrix {
    pub dim: Dim,

    row_start: Vec<usize>,
    row_cols: Vec<usize>,
    row_signs: Vec<i8>,

    col_start: Vec<usize>,
    col_rows: Vec<usize>,
    col_signs: Vec<i8>,
}

impl SignMatrix {
    pub fn nnz(&self) -> usize {
        self.row_cols.len()
    }

    /// Return (column indices, signs) of row i.
    pub fn row(&self, i: usize) -> (&[usize], &[i8]) {
        let (s, e) = (self.row_start[i], self.row_start[i + 1]);
        (&self.row_cols[s..e], &self.row_signs[s..e])
    }

    /// Return (row indices, signs) of column j.
    pub fn col(&self, j: usize) -> (&[usize], &[i8]) {
        let (s, e) = (self.col_start[j], self.col_start[j + 1]);
        (&self.col_rows[s..e], &self.col_signs[s..e])
    }

    /// The transposed matrix. Used by the detection driver, which also tries
    /// to recognise the transpose of every block.
    pub fn transposed(&self) -> SignMatrix {
        SignMatrix {
            dim: Dim {
                nrows: self.dim.ncols,
                ncols: self.dim.nrows,
            },
            row_start: self.col_start.clone(),
            row_cols: self.col_rows.clone(),
            row_signs: self.col_signs.clone(),
            col_start: self.row_start.clone(),
            col_rows: self.row_cols.clone(),
            col_signs: self.row_signs.clone(),
        }
    }

    /// Build from whitespace-separated `+1/-1/0` tokens in row-major order.
    /// This is the grid format the regression scenarios are written in.
    pub fn parse(text: &str, nrows: usize, ncols: usize) -> Result<SignMatrix, MatrixError> {
        let mut entries: Vec<(usize, usize, i8)> = Vec::new();
        let mut i = 0usize;
        for token in text.split_whitespace() {
            if i >= nrows * ncols {
                break;
            }
            let sign = match token {
                "0" | "+0" | "-0" => 0i8,
                "1" | "+1" => 1,
                "-1" => -1,
                _ => {
                    return Err(MatrixError::GridBadToken {
                        token: token.to_string(),
                    });
                }
            };
            if sign != 0 {
                entries.push((i / ncols, i % ncols, sign));
            }
            i += 1;
        }
        if i != nrows * ncols {
            return Err(MatrixError::GridShapeMismatch {
                expected: nrows * ncols,
                actual: i,
            });
        }
        Ok(Self::from_entries(nrows, ncols, entries))
    }

    fn from_entries(nrows: usize, ncols: usize, mut entries: Vec<(usize, usize, i8)>) -> SignMatrix {
        entries.sort_by_key(|&(r, c, _)| (r, c));
        let nnz = entries.len();

        let mut row_start = vec![0usize; nrows + 1];
        let mut col_start = vec![0usize; ncols + 1];
        for &(r, c, _) in &entries {
            row_start[r + 1] += 1;
            col_start[c + 1] += 1;
        }
        for i in 0..nrows {
            row_start[i + 1] += row_start[i];
        }
        for j in 0..ncols {
            col_start[j + 1] += col_start[j];
        }

        let mut row_cols = vec![0usize; nnz];
        let mut row_signs = vec![0i8; nnz];
        let mut col_rows = vec![0usize; nnz];
        let mut col_signs = vec![0i8; nnz];
        let mut next_row = row_start.clone();
        let mut next_col = col_start.clone();
        for &(r, c, s) in &entries {
            row_cols[next_row[r]] = c;
            row_signs[next_row[r]] = s;
            next_row[r] += 1;
            col_rows[next_col[c]] = r;
            col_signs[next_col[c]] = s;
            next_col[c] += 1;
        }

        SignMatrix {
            dim: Dim { nrows, ncols },
            row_start,
            row_cols,
            row_signs,
            col_start,
            col_rows,
            col_signs,
        }
    }
}
