//! Row simplification of the stamped MNA matrix.
//!
//! Ideal wires, voltage sources between rails and identical-node
//! couplings produce rows that pin an unknown to a constant or make two
//! unknowns equal. Eliminating those rows before factorization shrinks
//! the matrix, and LU cost is cubic in its size.
//!
//! Two row shapes are recognized:
//! 1. A row whose only nonzero entry (outside already-constant columns)
//!    sits in column `qp`: unknown `qp` is the constant
//!    `(rhs + rsadd) / q`.
//! 2. A row with exactly two entries `q` and `-q` and a zero right side:
//!    the two unknowns are equal.
//!
//! Rows whose left or right side changes between Newton sub-iterations
//! are never simplified; their values are not final at analysis time.

use log::debug;

use crate::error::{BreadboardError, Result};
use crate::solver::matrix::{Matrix, RowKind};
use crate::solver::MnaSystem;

/// Simplify the freshly stamped system in place: classify rows, resolve
/// equality chains, and compact the matrix and right side.
pub fn simplify(mna: &mut MnaSystem) -> Result<()> {
    let n = mna.full_size;

    let mut i = 0;
    while i < n {
        match examine_row(mna, i)? {
            RowAction::Restart => i = 0,
            RowAction::Next => i += 1,
        }
    }

    resolve_chains(mna);
    compact(mna);

    debug!("simplified matrix {} -> {} rows", n, mna.size);
    Ok(())
}

enum RowAction {
    Next,
    /// A new constant column was discovered; rescan from the start.
    Restart,
}

fn examine_row(mna: &mut MnaSystem, i: usize) -> Result<RowAction> {
    let n = mna.full_size;
    let info = &mna.row_info[i];
    if info.ls_changes || info.rs_changes || info.drop_row {
        return Ok(RowAction::Next);
    }

    // Scan the row: constant columns fold into rs_add, and at most two
    // free entries (the second negating the first) may survive.
    let mut rs_add = 0.0;
    let mut qp = None;
    let mut qm = None;
    let mut qv = 0.0;
    let mut j = 0;
    while j < n {
        let q = mna.matrix.get(i, j);
        if mna.row_info[j].kind == RowKind::Const {
            rs_add -= mna.row_info[j].value * q;
        } else if q != 0.0 {
            if qp.is_none() {
                qp = Some(j);
                qv = q;
            } else if qm.is_none() && q == -qv {
                qm = Some(j);
            } else {
                break;
            }
        }
        j += 1;
    }
    if j != n {
        return Ok(RowAction::Next);
    }

    let Some(mut qp) = qp else {
        // Every entry sat in a constant column; the equation has no free
        // unknown left.
        return Err(BreadboardError::MatrixError);
    };

    match qm {
        None => {
            // Follow equality chains to the representative unknown.
            let mut hops = 0;
            while mna.row_info[qp].kind == RowKind::Equal && hops < 100 {
                qp = mna.row_info[qp].node_eq;
                hops += 1;
            }
            if mna.row_info[qp].kind == RowKind::Equal {
                // Chain did not terminate; break the cycle.
                mna.row_info[qp].kind = RowKind::Normal;
                return Ok(RowAction::Next);
            }
            if mna.row_info[qp].kind != RowKind::Normal {
                return Ok(RowAction::Next);
            }
            mna.row_info[qp].kind = RowKind::Const;
            mna.row_info[qp].value = (mna.right_side[i] + rs_add) / qv;
            mna.row_info[i].drop_row = true;
            Ok(RowAction::Restart)
        }
        Some(mut qm) if mna.right_side[i] + rs_add == 0.0 => {
            if mna.row_info[qp].kind != RowKind::Normal {
                std::mem::swap(&mut qp, &mut qm);
                if mna.row_info[qp].kind != RowKind::Normal {
                    return Ok(RowAction::Next);
                }
            }
            mna.row_info[qp].kind = RowKind::Equal;
            mna.row_info[qp].node_eq = qm;
            mna.row_info[i].drop_row = true;
            Ok(RowAction::Next)
        }
        Some(_) => Ok(RowAction::Next),
    }
}

/// Assign compacted column indices and short-circuit equality chains.
fn resolve_chains(mna: &mut MnaSystem) {
    let n = mna.full_size;
    let mut nn = 0;
    for i in 0..n {
        match mna.row_info[i].kind {
            RowKind::Normal => {
                mna.row_info[i].map_col = Some(nn);
                nn += 1;
            }
            RowKind::Equal => {
                // 100 steps max to avoid chasing a cycle forever.
                for _ in 0..100 {
                    let eq = mna.row_info[i].node_eq;
                    if mna.row_info[eq].kind != RowKind::Equal {
                        break;
                    }
                    if i == mna.row_info[eq].node_eq {
                        break;
                    }
                    mna.row_info[i].node_eq = mna.row_info[eq].node_eq;
                }
            }
            RowKind::Const => {
                mna.row_info[i].map_col = None;
            }
        }
    }
    for i in 0..n {
        if mna.row_info[i].kind == RowKind::Equal {
            let eq = mna.row_info[i].node_eq;
            if mna.row_info[eq].kind == RowKind::Const {
                // Equal to a constant is itself a constant.
                mna.row_info[i].kind = RowKind::Const;
                mna.row_info[i].value = mna.row_info[eq].value;
                mna.row_info[i].map_col = None;
            } else {
                mna.row_info[i].map_col = mna.row_info[eq].map_col;
            }
        }
    }
    mna.size = nn;
}

/// Build the compacted matrix: surviving rows are renumbered densely,
/// surviving columns are summed by representative, constant columns fold
/// into the new right side.
fn compact(mna: &mut MnaSystem) {
    let n = mna.full_size;
    let newsize = mna.size;
    let mut newmat = Matrix::new(newsize);
    let mut newrs = vec![0.0; newsize];

    let mut ii = 0;
    for i in 0..n {
        if mna.row_info[i].drop_row {
            mna.row_info[i].map_row = None;
            continue;
        }
        newrs[ii] = mna.right_side[i];
        mna.row_info[i].map_row = Some(ii);
        for j in 0..n {
            let x = mna.matrix.get(i, j);
            if x == 0.0 {
                continue;
            }
            match mna.row_info[j].kind {
                RowKind::Const => newrs[ii] -= mna.row_info[j].value * x,
                _ => {
                    if let Some(c) = mna.row_info[j].map_col {
                        newmat.add(ii, c, x);
                    }
                }
            }
        }
        ii += 1;
    }

    mna.matrix = newmat;
    mna.right_side = newrs;
    mna.permute = vec![0; newsize];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(size_nodes: usize, sources: usize) -> MnaSystem {
        let mut mna = MnaSystem::new(5e-6);
        mna.alloc(size_nodes, sources, false);
        mna
    }

    #[test]
    fn test_constant_row_detected() {
        // Unknown 0 pinned to 2.0 by row 1; row 0 couples both unknowns.
        let mut mna = system(3, 0);
        mna.matrix.set(0, 0, 1.0);
        mna.matrix.set(0, 1, 1.0);
        mna.right_side[0] = 5.0;
        mna.matrix.set(1, 0, 2.0);
        mna.right_side[1] = 4.0;

        simplify(&mut mna).unwrap();
        // The fixpoint rescan then pins x1 through row 0 as well, so the
        // whole system folds away: x0 = 2, x1 = 5 - 2 = 3.
        assert_eq!(mna.size, 0);
        assert_eq!(mna.row_info[0].kind, RowKind::Const);
        assert_eq!(mna.row_info[0].value, 2.0);
        assert_eq!(mna.row_info[0].map_col, None);
        assert_eq!(mna.row_info[1].kind, RowKind::Const);
        assert_eq!(mna.row_info[1].value, 3.0);
        assert!(mna.row_info[1].drop_row);
    }

    #[test]
    fn test_equal_row_detected() {
        // Row 2 says x0 == x1; rows 0 and 1 are regular equations.
        let mut mna = system(4, 0);
        mna.matrix.set(0, 0, 2.0);
        mna.matrix.set(0, 2, 1.0);
        mna.right_side[0] = 1.0;
        mna.matrix.set(1, 1, 3.0);
        mna.matrix.set(1, 2, 1.0);
        mna.right_side[1] = 2.0;
        mna.matrix.set(2, 0, 1.0);
        mna.matrix.set(2, 1, -1.0);

        simplify(&mut mna).unwrap();
        assert_eq!(mna.size, 2);
        assert_eq!(mna.row_info[0].kind, RowKind::Equal);
        assert_eq!(mna.row_info[0].node_eq, 1);
        assert!(mna.row_info[2].drop_row);
        // Both unknowns land in the same compacted column.
        assert_eq!(mna.row_info[0].map_col, mna.row_info[1].map_col);
    }

    #[test]
    fn test_changing_rows_left_alone() {
        let mut mna = system(3, 0);
        mna.matrix.set(0, 0, 2.0);
        mna.right_side[0] = 4.0;
        mna.row_info[0].rs_changes = true;
        mna.matrix.set(1, 1, 1.0);
        mna.row_info[1].ls_changes = true;

        simplify(&mut mna).unwrap();
        // Nothing was eliminated.
        assert_eq!(mna.size, 2);
        assert_eq!(mna.row_info[0].kind, RowKind::Normal);
        assert_eq!(mna.row_info[1].kind, RowKind::Normal);
    }

    #[test]
    fn test_equal_chain_inherits_const() {
        // x2 pinned to 3; x1 == x2; x0 == x1. All three collapse to the
        // constant.
        let mut mna = system(4, 0);
        mna.matrix.set(0, 0, 1.0);
        mna.matrix.set(0, 1, -1.0);
        mna.matrix.set(1, 1, 1.0);
        mna.matrix.set(1, 2, -1.0);
        mna.matrix.set(2, 2, 2.0);
        mna.right_side[2] = 6.0;

        simplify(&mut mna).unwrap();
        assert_eq!(mna.size, 0);
        for i in 0..3 {
            assert_eq!(mna.row_info[i].kind, RowKind::Const, "unknown {i}");
            assert_eq!(mna.row_info[i].value, 3.0);
        }
    }

    #[test]
    fn test_all_const_row_is_matrix_error() {
        // Row 1 pins x0; row 2's only entry then sits in a constant
        // column, leaving it no unknown.
        let mut mna = system(3, 0);
        mna.matrix.set(0, 0, 1.0);
        mna.right_side[0] = 1.0;
        mna.matrix.set(1, 0, 1.0);
        mna.right_side[1] = 2.0;

        assert_eq!(simplify(&mut mna), Err(BreadboardError::MatrixError));
    }
}
