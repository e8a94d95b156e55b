use crate::matrix::builder::ProblemMatrix;
use crate::union_find::UnionFind;

/// Partition of the candidate-column submatrix into connected blocks,
/// in a flat CSR-like layout so a caller can iterate one block at a time.
///
/// Rows and columns share one disjoint-set index space of size
/// `ncols + nrows`: columns first, rows offset by `ncols`. A row with no
/// nonzero in any candidate column belongs to no block and keeps -1.
#[derive(Debug)]
pub struct ComponentPartition {
    pub ncomponents: usize,

    /// Maps a row to the block it belongs to, -1 if none.
    pub row_component: Vec<isize>,
    /// Maps a column to the block it belongs to, -1 if not a candidate.
    pub col_component: Vec<isize>,

    /// Flattened per-block row lists; block k owns
    /// `component_rows[row_start[k]..row_start[k + 1]]`.
    pub component_rows: Vec<usize>,
    pub component_cols: Vec<usize>,
    pub row_start: Vec<usize>,
    pub col_start: Vec<usize>,
}

impl ComponentPartition {
    pub fn rows(&self, component: usize) -> &[usize] {
        &self.component_rows[self.row_start[component]..self.row_start[component + 1]]
    }

    pub fn cols(&self, component: usize) -> &[usize] {
        &self.component_cols[self.col_start[component]..self.col_start[component + 1]]
    }
}

/// Split the submatrix induced by `candidate` columns into connected blocks.
/// One union per nonzero, so the whole pass is O(nnz * alpha(nnz)).
pub fn split_components(matrix: &ProblemMatrix, candidate: &[bool]) -> ComponentPartition {
    let nrows = matrix.dim.nrows;
    let ncols = matrix.dim.ncols;
    debug_assert_eq!(candidate.len(), ncols);

    let mut disjoint = UnionFind::new(ncols + nrows);
    for col in 0..ncols {
        if !candidate[col] {
            continue;
        }
        let (rows, _) = matrix.col(col);
        for &row in rows {
            disjoint.union(col, row + ncols);
        }
    }

    // Number the blocks in column order so the output is deterministic.
    let mut representative_component = vec![-1isize; ncols + nrows];
    let mut row_component = vec![-1isize; nrows];
    let mut col_component = vec![-1isize; ncols];
    let mut ncomponents = 0usize;

    let mut col_count: Vec<usize> = Vec::new();
    let mut row_count: Vec<usize> = Vec::new();
    for col in 0..ncols {
        if !candidate[col] {
            continue;
        }
        let root = disjoint.find(col);
        let component = if representative_component[root] < 0 {
            representative_component[root] = ncomponents as isize;
            col_count.push(0);
            row_count.push(0);
            ncomponents += 1;
            ncomponents - 1
        } else {
            representative_component[root] as usize
        };
        col_component[col] = component as isize;
        col_count[component] += 1;
    }
    for row in 0..nrows {
        let root = disjoint.find(row + ncols);
        let component = representative_component[root];
        // rows whose root was never seen touch no candidate column
        if component < 0 {
            continue;
        }
        row_component[row] = component;
        row_count[component as usize] += 1;
    }

    let mut row_start = vec![0usize; ncomponents + 1];
    let mut col_start = vec![0usize; ncomponents + 1];
    for k in 0..ncomponents {
        row_start[k + 1] = row_start[k] + row_count[k];
        col_start[k + 1] = col_start[k] + col_count[k];
    }

    let mut component_rows = vec![0usize; row_start[ncomponents]];
    let mut component_cols = vec![0usize; col_start[ncomponents]];
    let mut next_row = row_start.clone();
    let mut next_col = col_start.clone();
    for col in 0..ncols {
        if col_component[col] >= 0 {
            let k = col_component[col] as usize;
            component_cols[next_col[k]] = col;
            next_col[k] += 1;
        }
    }
    for row in 0..nrows {
        if row_component[row] >= 0 {
            let k = row_component[row] as usize;
            component_rows[next_row[k]] = row;
            next_row[k] += 1;
        }
    }

    #[cfg(debug_assertions)]
    for k in 0..ncomponents {
        debug_assert_eq!(next_row[k], row_start[k + 1]);
        debug_assert_eq!(next_col[k], col_start[k + 1]);
    }

    ComponentPartition {
        ncomponents,
        row_component,
        col_component,
        component_rows,
        component_cols,
        row_start,
        col_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::builder::ProblemMatrixBuilder;

    fn matrix_from_triplets(
        nrows: usize,
        ncols: usize,
        entries: &[(usize, usize, f64)],
    ) -> ProblemMatrix {
        let mut b = ProblemMatrixBuilder::new(nrows, ncols);
        for &(r, c, v) in entries {
            b.push(r, c, v).unwrap();
        }
        b.build().unwrap()
    }

    #[test]
    fn two_independent_blocks() {
        // rows 0,1 touch cols 0,1; row 2 touches col 2
        let m = matrix_from_triplets(
            3,
            3,
            &[(0, 0, 1.0), (1, 0, -1.0), (1, 1, 1.0), (2, 2, 1.0)],
        );
        let partition = split_components(&m, &[true, true, true]);

        assert_eq!(partition.ncomponents, 2);
        assert_eq!(partition.cols(0), &[0, 1]);
        assert_eq!(partition.rows(0), &[0, 1]);
        assert_eq!(partition.cols(1), &[2]);
        assert_eq!(partition.rows(1), &[2]);
    }

    #[test]
    fn non_candidate_columns_do_not_connect() {
        // col 1 would bridge rows 0 and 1, but it is not a candidate
        let m = matrix_from_triplets(
            2,
            3,
            &[(0, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0), (1, 2, 1.0)],
        );
        let partition = split_components(&m, &[true, false, true]);

        assert_eq!(partition.ncomponents, 2);
        assert_eq!(partition.col_component[1], -1);
        assert_ne!(partition.row_component[0], partition.row_component[1]);
    }

    #[test]
    fn rows_without_candidates_stay_unassigned() {
        let m = matrix_from_triplets(2, 2, &[(0, 0, 1.0), (1, 1, 2.0)]);
        let partition = split_components(&m, &[true, false]);

        assert_eq!(partition.ncomponents, 1);
        assert_eq!(partition.row_component[1], -1);
        assert_eq!(partition.rows(0), &[0]);
    }

    #[test]
    fn snapshot_banded_partition() {
        // 6x6 band split in the middle: two 3x3 blocks
        let mut b = ProblemMatrixBuilder::new(6, 6);
        for i in 0..6 {
            b.push(i, i, 1.0).unwrap();
            if i % 3 != 2 {
                b.push(i, i + 1, -1.0).unwrap();
            }
        }
        let m = b.build().unwrap();
        let partition = split_components(&m, &[true; 6]);

        insta::assert_debug_snapshot!(
            (
                partition.ncomponents,
                partition.rows(0).to_vec(),
                partition.cols(1).to_vec(),
            ),
            @r"
        (
            2,
            [
                0,
                1,
                2,
            ],
            [
                3,
                4,
                5,
            ],
        )
        "
        );
    }
}
