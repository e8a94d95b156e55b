mod col_addition;
mod cycle;
mod digraph;
mod row_addition;
mod store;

pub use digraph::{Digraph, DigraphArc};

use thiserror::Error;

pub(crate) const EMPTY: isize = -1;

#[derive(Debug, Error)]
pub enum DecompositionError {
    #[error("row index {row} out of range (max rows: {max})")]
    RowOutOfRange { row: usize, max: usize },

    #[error("column index {col} out of range (max columns: {max})")]
    ColOutOfRange { col: usize, max: usize },

    #[error("row {row} was already added")]
    RowAlreadyPresent { row: usize },

    #[error("column {col} was already added")]
    ColAlreadyPresent { col: usize },

    #[error("index {index} appears twice in one addition")]
    DuplicateIndex { index: usize },

    #[error("entry for index {index} is not +1 or -1: {value}")]
    NotUnitValue { index: usize, value: i8 },
}

pub type DecompositionResult<T> = Result<T, DecompositionError>;

/// Row or column of the matrix, as carried by an exported arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixElement {
    Row(usize),
    Col(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Series,
    Parallel,
    Rigid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArcElement {
    Row(usize),
    Col(usize),
    /// Virtual edge; `twin` is the arc on the other side of the 2-sum.
    Marker { twin: usize },
}

impl ArcElement {
    pub(crate) fn is_marker(&self) -> bool {
        matches!(self, ArcElement::Marker { .. })
    }

    pub(crate) fn is_row(&self) -> bool {
        matches!(self, ArcElement::Row(_))
    }
}

/// One directed edge of a member's internal graph. `tail`/`head` are node
/// ids local to the owning member; the direction of the arc carries its
/// sign, there is no separate sign bit.
#[derive(Debug, Clone)]
pub(crate) struct Arc {
    pub(crate) element: ArcElement,
    /// Member slot at the time of the last move; resolve through the
    /// union-find before use.
    pub(crate) member: usize,
    pub(crate) tail: usize,
    pub(crate) head: usize,
    pub(crate) alive: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub(crate) kind: MemberKind,
    pub(crate) arcs: Vec<usize>,
    pub(crate) num_nodes: usize,
    pub(crate) alive: bool,
}

/// Reusable mark storage for the DFS/BFS walks. The arrays are stamped with
/// an epoch instead of being cleared, so a walk costs only what it touches.
#[derive(Debug, Default)]
pub(crate) struct StampedMap {
    stamp: Vec<u64>,
    value: Vec<isize>,
    epoch: u64,
}

impl StampedMap {
    pub(crate) fn begin(&mut self, len: usize) {
        if self.stamp.len() < len {
            self.stamp.resize(len, 0);
            self.value.resize(len, 0);
        }
        self.epoch += 1;
    }

    pub(crate) fn get(&self, index: usize) -> Option<isize> {
        if index < self.stamp.len() && self.stamp[index] == self.epoch {
            Some(self.value[index])
        } else {
            None
        }
    }

    pub(crate) fn set(&mut self, index: usize, value: isize) {
        self.stamp[index] = self.epoch;
        self.value[index] = value;
    }
}

/// Online decomposition of a network matrix into series, parallel and rigid
/// members joined by twin markers (an SPQR-style t-decomposition of the
/// underlying graphic matroid).
///
/// Capacities are fixed at creation; arenas only grow through accepted
/// additions. Allocation failure aborts through the global allocator.
#[derive(Debug)]
pub struct Decomposition {
    max_rows: usize,
    max_cols: usize,

    /// row id -> arc id, EMPTY while the row is absent
    row_arc: Vec<isize>,
    col_arc: Vec<isize>,

    pub(crate) arcs: Vec<Arc>,
    pub(crate) members: Vec<Member>,
    /// Union-find over member slots; a negative entry marks a representative
    /// and stores its rank.
    representative: Vec<isize>,

    pub(crate) member_mark: StampedMap,
    pub(crate) node_mark: StampedMap,
}

impl Decomposition {
    pub fn new(max_rows: usize, max_cols: usize) -> Self {
        Decomposition {
            max_rows,
            max_cols,
            row_arc: vec![EMPTY; max_rows],
            col_arc: vec![EMPTY; max_cols],
            arcs: Vec::new(),
            members: Vec::new(),
            representative: Vec::new(),
            member_mark: StampedMap::default(),
            node_mark: StampedMap::default(),
        }
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn max_cols(&self) -> usize {
        self.max_cols
    }

    pub fn contains_row(&self, row: usize) -> bool {
        row < self.max_rows && self.row_arc[row] != EMPTY
    }

    pub fn contains_col(&self, col: usize) -> bool {
        col < self.max_cols && self.col_arc[col] != EMPTY
    }

    pub(crate) fn row_arc_id(&self, row: usize) -> Option<usize> {
        if self.contains_row(row) {
            Some(self.row_arc[row] as usize)
        } else {
            None
        }
    }

    pub(crate) fn col_arc_id(&self, col: usize) -> Option<usize> {
        if self.contains_col(col) {
            Some(self.col_arc[col] as usize)
        } else {
            None
        }
    }

    pub(crate) fn link_element(&mut self, element: ArcElement, arc: usize) {
        match element {
            ArcElement::Row(r) => self.row_arc[r] = arc as isize,
            ArcElement::Col(c) => self.col_arc[c] = arc as isize,
            ArcElement::Marker { .. } => {}
        }
    }

    /// Validate one addition call: ids in range, new primary id, entries in
    /// range, no duplicate entry ids, unit values only.
    fn check_entries(
        &self,
        entries: &[(usize, i8)],
        entries_are_rows: bool,
    ) -> DecompositionResult<()> {
        let limit = if entries_are_rows {
            self.max_rows
        } else {
            self.max_cols
        };
        for (i, &(index, value)) in entries.iter().enumerate() {
            if index >= limit {
                return Err(if entries_are_rows {
                    DecompositionError::RowOutOfRange {
                        row: index,
                        max: limit,
                    }
                } else {
                    DecompositionError::ColOutOfRange {
                        col: index,
                        max: limit,
                    }
                });
            }
            if value != 1 && value != -1 {
                return Err(DecompositionError::NotUnitValue { index, value });
            }
            if entries[..i].iter().any(|&(other, _)| other == index) {
                return Err(DecompositionError::DuplicateIndex { index });
            }
        }
        Ok(())
    }

    /// Attempt to add a row. `Ok(false)` means the enlarged matrix would no
    /// longer be a network matrix; the decomposition is then unchanged.
    /// Columns referenced by the row may be absent; they are co-added.
    pub fn try_add_row(
        &mut self,
        row: usize,
        entries: &[(usize, i8)],
    ) -> DecompositionResult<bool> {
        if row >= self.max_rows {
            return Err(DecompositionError::RowOutOfRange {
                row,
                max: self.max_rows,
            });
        }
        if self.contains_row(row) {
            return Err(DecompositionError::RowAlreadyPresent { row });
        }
        self.check_entries(entries, false)?;
        Ok(self.add_row_checked(row, entries))
    }

    /// Attempt to add a column; symmetric to [`Self::try_add_row`].
    pub fn try_add_col(
        &mut self,
        col: usize,
        entries: &[(usize, i8)],
    ) -> DecompositionResult<bool> {
        if col >= self.max_cols {
            return Err(DecompositionError::ColOutOfRange {
                col,
                max: self.max_cols,
            });
        }
        if self.contains_col(col) {
            return Err(DecompositionError::ColAlreadyPresent { col });
        }
        self.check_entries(entries, true)?;
        Ok(self.add_col_checked(col, entries))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_out_of_range_is_invalid_input() {
        let mut dec = Decomposition::new(2, 2);
        assert!(matches!(
            dec.try_add_row(2, &[]),
            Err(DecompositionError::RowOutOfRange { row: 2, max: 2 })
        ));
    }

    #[test]
    fn entry_out_of_range_is_invalid_input() {
        let mut dec = Decomposition::new(2, 2);
        assert!(matches!(
            dec.try_add_row(0, &[(5, 1)]),
            Err(DecompositionError::ColOutOfRange { col: 5, max: 2 })
        ));
    }

    #[test]
    fn adding_a_row_twice_is_invalid_input() {
        let mut dec = Decomposition::new(2, 2);
        assert!(dec.try_add_row(0, &[(0, 1)]).unwrap());
        assert!(matches!(
            dec.try_add_row(0, &[(1, 1)]),
            Err(DecompositionError::RowAlreadyPresent { row: 0 })
        ));
    }

    #[test]
    fn duplicate_entry_is_invalid_input() {
        let mut dec = Decomposition::new(2, 2);
        assert!(matches!(
            dec.try_add_row(0, &[(1, 1), (1, -1)]),
            Err(DecompositionError::DuplicateIndex { index: 1 })
        ));
    }

    #[test]
    fn non_unit_value_is_invalid_input() {
        let mut dec = Decomposition::new(2, 2);
        assert!(matches!(
            dec.try_add_col(0, &[(0, 2)]),
            Err(DecompositionError::NotUnitValue { index: 0, value: 2 })
        ));
    }

    #[test]
    fn empty_row_and_column_are_accepted() {
        let mut dec = Decomposition::new(2, 2);
        assert!(dec.try_add_row(0, &[]).unwrap());
        assert!(dec.try_add_col(0, &[]).unwrap());
        assert!(dec.is_minimal());
        assert!(dec.verify_cycle(0, &[]));
    }

    #[test]
    fn rejected_addition_leaves_the_decomposition_unchanged() {
        // the second column of this matrix has a sign conflict
        let mut dec = Decomposition::new(3, 2);
        assert!(dec.try_add_col(0, &[(0, 1), (1, 1), (2, -1)]).unwrap());
        assert!(!dec.try_add_col(1, &[(0, 1), (2, 1)]).unwrap());

        assert!(!dec.contains_col(1));
        assert!(dec.is_minimal());
        assert!(dec.verify_cycle(0, &[(0, 1), (1, 1), (2, -1)]));
        // the rejected column can be retried with a fixed sign
        assert!(dec.try_add_col(1, &[(0, 1), (2, -1)]).unwrap());
        assert!(dec.verify_cycle(1, &[(0, 1), (2, -1)]));
    }

    #[test]
    fn single_entry_row_makes_a_series_member() {
        let mut dec = Decomposition::new(1, 1);
        assert!(dec.try_add_row(0, &[(0, 1)]).unwrap());
        assert!(dec.is_minimal());
        assert!(dec.verify_cycle(0, &[(0, 1)]));
    }

    #[test]
    fn acceptance_is_order_independent() {
        // swapping two individually acceptable additions accepts the same set
        let columns = [
            (0usize, vec![(0usize, 1i8), (1, 1)]),
            (1, vec![(1, 1), (2, 1)]),
            (2, vec![(0, -1), (2, 1)]),
        ];
        for order in [[0usize, 1, 2], [1, 0, 2], [2, 1, 0]] {
            let mut dec = Decomposition::new(3, 3);
            for &i in &order {
                let (col, entries) = &columns[i];
                assert!(dec.try_add_col(*col, entries).unwrap(), "column {col}");
                assert!(dec.is_minimal());
            }
            for (col, entries) in &columns {
                assert!(dec.verify_cycle(*col, entries));
            }
        }
    }

    #[test]
    fn remove_component_frees_rows_and_columns() {
        let mut dec = Decomposition::new(4, 4);
        assert!(dec.try_add_col(0, &[(0, 1), (1, 1)]).unwrap());
        assert!(dec.try_add_col(1, &[(2, 1), (3, 1)]).unwrap());

        dec.remove_component(&[0, 1], &[0]);
        assert!(!dec.contains_col(0));
        assert!(!dec.contains_row(0));
        assert!(!dec.contains_row(1));
        // the untouched component survives
        assert!(dec.contains_col(1));
        assert!(dec.verify_cycle(1, &[(2, 1), (3, 1)]));

        // removed ids can be added again
        assert!(dec.try_add_col(0, &[(0, 1), (2, 1)]).unwrap());
        assert!(dec.verify_cycle(0, &[(0, 1), (2, 1)]));
    }
}
