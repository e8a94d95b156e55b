use crate::components::split_components;
use crate::decomposition::{Decomposition, DecompositionResult};
use crate::matrix::builder::ProblemMatrix;

/// Variable kind of a column, as the surrounding solver classifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Integer,
    ImpliedInteger,
    Continuous,
}

/// Entries larger than this make a row numerically unreliable; such rows
/// disqualify their whole block.
const BAD_NUMERICS_LIMIT: f64 = 1e7;

#[derive(Debug, Clone)]
pub struct ImplintConfig {
    /// Use the row addition algorithm when the column to row ratio of a
    /// block becomes larger than this threshold. Otherwise, use the column
    /// addition algorithm.
    pub columnrowratio: f64,
    /// Should implied integrality also be detected for integer columns?
    pub convertintegers: bool,
}

impl Default for ImplintConfig {
    fn default() -> Self {
        ImplintConfig {
            columnrowratio: 50.0,
            convertintegers: false,
        }
    }
}

/// Summary counters of one detection run, one bump per block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DetectionStats {
    pub components: usize,
    pub accepted: usize,
    /// Blocks whose matrix and transpose are both network matrices.
    pub planar: usize,
    pub rejected_integrality: usize,
    pub rejected_numerics: usize,
    pub rejected_not_network: usize,
}

#[derive(Debug)]
pub struct DetectionResult {
    /// Per column: was the column detected to be implied integer?
    pub implied_integer: Vec<bool>,
    pub stats: DetectionStats,
}

#[derive(Debug, Clone, Copy)]
struct RowStatistics {
    /// All non-candidate coefficients and both sides are integral.
    integral: bool,
    bad_numerics: bool,
    /// Every candidate-column nonzero of the row is +1 or -1.
    candidates_unit: bool,
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value == value.trunc()
}

/// Detect continuous (and optionally integer) columns that are implied
/// integer: a block of candidate columns qualifies when every row passes
/// the integrality filter and the block (or its transpose) is a network
/// matrix.
pub fn find_implied_integers(
    matrix: &ProblemMatrix,
    kinds: &[VarKind],
    config: &ImplintConfig,
) -> DecompositionResult<DetectionResult> {
    let nrows = matrix.dim.nrows;
    let ncols = matrix.dim.ncols;
    debug_assert_eq!(kinds.len(), ncols);

    let candidate: Vec<bool> = kinds
        .iter()
        .map(|&kind| {
            kind == VarKind::Continuous
                || (config.convertintegers
                    && matches!(kind, VarKind::Integer | VarKind::Binary))
        })
        .collect();

    // row filter, computed once for the whole matrix
    let row_ok: Vec<RowStatistics> = (0..nrows)
        .map(|row| {
            let lhs = matrix.lhs(row);
            let rhs = matrix.rhs(row);
            let mut integral = (lhs == f64::NEG_INFINITY || is_integral(lhs))
                && (rhs == f64::INFINITY || is_integral(rhs));
            let mut bad_numerics = false;
            let mut candidates_unit = true;
            let (cols, vals) = matrix.row(row);
            for (&col, &value) in cols.iter().zip(vals.iter()) {
                if candidate[col] {
                    candidates_unit = candidates_unit && value.abs() == 1.0;
                } else {
                    integral = integral && is_integral(value);
                }
                if value.abs() > BAD_NUMERICS_LIMIT {
                    bad_numerics = true;
                }
            }
            RowStatistics {
                integral,
                bad_numerics,
                candidates_unit,
            }
        })
        .collect();

    let partition = split_components(matrix, &candidate);

    let mut dec = Decomposition::new(nrows, ncols);
    let mut transdec = Decomposition::new(ncols, nrows);

    let mut implied = vec![false; ncols];
    let mut stats = DetectionStats {
        components: partition.ncomponents,
        ..DetectionStats::default()
    };

    // scratch for the candidate entries of one row
    let mut entries: Vec<(usize, i8)> = Vec::with_capacity(ncols);

    'component: for component in 0..partition.ncomponents {
        let rows = partition.rows(component);
        let cols = partition.cols(component);

        for &row in rows {
            let ok = &row_ok[row];
            if !ok.candidates_unit || !ok.integral {
                stats.rejected_integrality += 1;
                continue 'component;
            }
            if ok.bad_numerics {
                stats.rejected_numerics += 1;
                continue 'component;
            }
        }

        // The column-wise algorithm is generally faster; fall back to
        // row-wise streaming only for blocks that are much wider than tall.
        let mut network = true;
        if (rows.len() as f64) * config.columnrowratio < cols.len() as f64 {
            for &row in rows {
                candidate_row_entries(matrix, &candidate, row, &mut entries);
                if !dec.try_add_row(row, &entries)? {
                    network = false;
                    break;
                }
            }
        } else {
            for &col in cols {
                column_entries(matrix, col, &mut entries);
                if !dec.try_add_col(col, &entries)? {
                    network = false;
                    break;
                }
            }
        }
        if !network {
            dec.remove_component(rows, cols);
        }

        // the transposed block swaps the roles of the two algorithms
        let mut transposed_network = true;
        if (rows.len() as f64) < (cols.len() as f64) * config.columnrowratio {
            for &row in rows {
                candidate_row_entries(matrix, &candidate, row, &mut entries);
                if !transdec.try_add_col(row, &entries)? {
                    transposed_network = false;
                    break;
                }
            }
        } else {
            for &col in cols {
                column_entries(matrix, col, &mut entries);
                if !transdec.try_add_row(col, &entries)? {
                    transposed_network = false;
                    break;
                }
            }
        }
        if !transposed_network {
            transdec.remove_component(cols, rows);
        }

        if !network && !transposed_network {
            stats.rejected_not_network += 1;
            continue;
        }
        stats.accepted += 1;
        if network && transposed_network {
            stats.planar += 1;
        }
        for &col in cols {
            implied[col] = true;
        }
    }

    Ok(DetectionResult {
        implied_integer: implied,
        stats,
    })
}

fn candidate_row_entries(
    matrix: &ProblemMatrix,
    candidate: &[bool],
    row: usize,
    entries: &mut Vec<(usize, i8)>,
) {
    entries.clear();
    let (cols, vals) = matrix.row(row);
    for (&col, &value) in cols.iter().zip(vals.iter()) {
        if candidate[col] {
            debug_assert!(value.abs() == 1.0);
            entries.push((col, if value > 0.0 { 1 } else { -1 }));
        }
    }
}

fn column_entries(matrix: &ProblemMatrix, col: usize, entries: &mut Vec<(usize, i8)>) {
    entries.clear();
    let (rows, vals) = matrix.col(col);
    for (&row, &value) in rows.iter().zip(vals.iter()) {
        debug_assert!(value.abs() == 1.0);
        entries.push((row, if value > 0.0 { 1 } else { -1 }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::builder::ProblemMatrixBuilder;

    fn network_block() -> ProblemMatrixBuilder {
        // x0 - x1 = 0, x1 - x2 <= 1: a 2x3 network block
        let mut b = ProblemMatrixBuilder::new(2, 3);
        b.push(0, 0, 1.0).unwrap();
        b.push(0, 1, -1.0).unwrap();
        b.push(1, 1, 1.0).unwrap();
        b.push(1, 2, -1.0).unwrap();
        b.set_row_sides(0, 0.0, 0.0).unwrap();
        b.set_row_sides(1, f64::NEG_INFINITY, 1.0).unwrap();
        b
    }

    #[test]
    fn continuous_network_block_is_implied_integer() {
        let matrix = network_block().build().unwrap();
        let kinds = [VarKind::Continuous; 3];
        let result =
            find_implied_integers(&matrix, &kinds, &ImplintConfig::default()).unwrap();

        assert_eq!(result.implied_integer, vec![true, true, true]);
        assert_eq!(result.stats.accepted, 1);
        assert_eq!(result.stats.planar, 1);
    }

    #[test]
    fn fractional_side_disqualifies_the_block() {
        let mut b = network_block();
        b.set_row_sides(0, 0.5, 0.5).unwrap();
        let matrix = b.build().unwrap();
        let kinds = [VarKind::Continuous; 3];
        let result =
            find_implied_integers(&matrix, &kinds, &ImplintConfig::default()).unwrap();

        assert_eq!(result.implied_integer, vec![false, false, false]);
        assert_eq!(result.stats.rejected_integrality, 1);
    }

    #[test]
    fn fractional_integer_coefficient_disqualifies_the_block() {
        // the continuous columns are fine, but the integer column has a
        // fractional coefficient in a shared row
        let mut b = ProblemMatrixBuilder::new(1, 3);
        b.push(0, 0, 1.0).unwrap();
        b.push(0, 1, -1.0).unwrap();
        b.push(0, 2, 2.5).unwrap();
        b.set_row_sides(0, 0.0, 0.0).unwrap();
        let matrix = b.build().unwrap();
        let kinds = [VarKind::Continuous, VarKind::Continuous, VarKind::Integer];
        let result =
            find_implied_integers(&matrix, &kinds, &ImplintConfig::default()).unwrap();

        assert_eq!(result.implied_integer, vec![false, false, false]);
        assert_eq!(result.stats.rejected_integrality, 1);
    }

    #[test]
    fn huge_coefficient_disqualifies_the_block() {
        let mut b = ProblemMatrixBuilder::new(1, 2);
        b.push(0, 0, 1.0).unwrap();
        b.push(0, 1, 2.0e7).unwrap();
        b.set_row_sides(0, 0.0, 0.0).unwrap();
        let matrix = b.build().unwrap();
        let kinds = [VarKind::Continuous, VarKind::Integer];
        let result =
            find_implied_integers(&matrix, &kinds, &ImplintConfig::default()).unwrap();

        assert_eq!(result.implied_integer, vec![false, false]);
        assert_eq!(result.stats.rejected_numerics, 1);
    }

    #[test]
    fn independent_blocks_are_judged_independently(){
        // block 0 is a network block; block 1 has a non-unit continuous entry
        let mut b = ProblemMatrixBuilder::new(2, 3);
        b.push(0, 0, 1.0).unwrap();
        b.push(0, 1, -1.0).unwrap();
        b.push(1, 2, 2.0).unwrap();
        b.set_row_sides(0, 0.0, 3.0).unwrap();
        b.set_row_sides(1, 0.0, 1.0).unwrap();
        let matrix = b.build().unwrap();
        let kinds = [VarKind::Continuous; 3];
        let result =
            find_implied_integers(&matrix, &kinds, &ImplintConfig::default()).unwrap();

        assert_eq!(result.implied_integer, vec![true, true, false]);
        assert_eq!(result.stats.components, 2);
        assert_eq!(result.stats.accepted, 1);
        assert_eq!(result.stats.rejected_integrality, 1);
    }

    #[test]
    fn integer_columns_only_count_with_convertintegers() {
        let mut b = ProblemMatrixBuilder::new(1, 2);
        b.push(0, 0, 1.0).unwrap();
        b.push(0, 1, -1.0).unwrap();
        b.set_row_sides(0, 0.0, 0.0).unwrap();
        let matrix = b.build().unwrap();
        let kinds = [VarKind::Integer, VarKind::Integer];

        let off = find_implied_integers(&matrix, &kinds, &ImplintConfig::default()).unwrap();
        assert_eq!(off.implied_integer, vec![false, false]);
        assert_eq!(off.stats.components, 0);

        let config = ImplintConfig {
            convertintegers: true,
            ..ImplintConfig::default()
        };
        let on = find_implied_integers(&matrix, &kinds, &config).unwrap();
        assert_eq!(on.implied_integer, vec![true, true]);
    }

    #[test]
    fn snapshot_detection_stats() {
        let matrix = network_block().build().unwrap();
        let kinds = [VarKind::Continuous; 3];
        let result =
            find_implied_integers(&matrix, &kinds, &ImplintConfig::default()).unwrap();

        insta::assert_debug_snapshot!(result.stats, @r"
        DetectionStats {
            components: 1,
            accepted: 1,
            planar: 1,
            rejected_integrality: 0,
            rejected_numerics: 0,
            rejected_not_network: 0,
        }
        ");
    }

    #[test]
    fn non_network_block_is_left_alone() {
        // the rejection witness of the second column: a sign conflict that
        // neither the matrix nor its transpose survives
        let mut b = ProblemMatrixBuilder::new(3, 3);
        for (row, col, value) in [
            (0, 0, 1.0),
            (1, 0, 1.0),
            (2, 0, -1.0),
            (0, 1, 1.0),
            (2, 1, 1.0),
            (0, 2, 1.0),
            (1, 2, -1.0),
        ] {
            b.push(row, col, value).unwrap();
        }
        for row in 0..3 {
            b.set_row_sides(row, 0.0, 0.0).unwrap();
        }
        let matrix = b.build().unwrap();
        let kinds = [VarKind::Continuous; 3];
        let result =
            find_implied_integers(&matrix, &kinds, &ImplintConfig::default()).unwrap();

        assert_eq!(result.stats.components, 1);
        assert_eq!(
            result.stats.accepted + result.stats.rejected_not_network,
            1
        );
    }
}
