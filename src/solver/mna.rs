//! The MNA system and its stamp kernel.
//!
//! [`MnaSystem`] owns the working and pristine matrices, the right-side
//! vectors, and the per-row simplification records. Elements contribute
//! to it exclusively through the stamp primitives below.
//!
//! All row/column arguments of the stamp primitives are 1-based node
//! indices: `0` is ground (silently discarded), `1..node_count` address
//! circuit nodes, and `node_count + vs` addresses the row of voltage
//! source `vs`. Once the matrix has been simplified (`needs_map` set),
//! indices are translated through [`RowInfo`] row/column maps, and writes
//! into a constant column are folded into the right side instead.

use crate::solver::matrix::{Matrix, RowInfo, RowKind};

/// The assembled linear system plus the state elements interact with.
#[derive(Debug, Clone, Default)]
pub struct MnaSystem {
    /// Working matrix; LU factorization happens in place.
    pub matrix: Matrix,
    /// Working right side.
    pub right_side: Vec<f64>,
    /// Pristine matrix captured after analysis.
    pub orig_matrix: Matrix,
    /// Pristine right side captured after analysis.
    pub orig_right_side: Vec<f64>,
    /// Simplification record per row of the full system.
    pub row_info: Vec<RowInfo>,
    /// Pivot permutation from the last factorization.
    pub permute: Vec<usize>,
    /// Size before simplification.
    pub full_size: usize,
    /// Size of the compacted system.
    pub size: usize,
    /// Translate stamp indices through the row maps.
    pub needs_map: bool,
    /// Any element re-stamps its left side each sub-iteration.
    pub nonlinear: bool,
    /// Number of circuit nodes including ground.
    pub node_count: usize,
    /// Number of voltage sources.
    pub vs_count: usize,
    /// Cleared by elements whose local Newton residual is still moving.
    pub converged: bool,
    /// Simulation time in seconds.
    pub time: f64,
    /// Time step in seconds.
    pub time_step: f64,
}

impl MnaSystem {
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            ..Self::default()
        }
    }

    /// Allocate a fresh system for `node_count` nodes and `vs_count`
    /// voltage sources. Previous matrices are discarded.
    pub fn alloc(&mut self, node_count: usize, vs_count: usize, nonlinear: bool) {
        let size = node_count - 1 + vs_count;
        self.matrix = Matrix::new(size);
        self.right_side = vec![0.0; size];
        self.orig_matrix = Matrix::new(0);
        self.orig_right_side = Vec::new();
        self.row_info = vec![RowInfo::new(); size];
        self.permute = vec![0; size];
        self.full_size = size;
        self.size = size;
        self.needs_map = false;
        self.nonlinear = nonlinear;
        self.node_count = node_count;
        self.vs_count = vs_count;
        self.converged = true;
    }

    /// Drop the assembled system. Used when analysis or stepping fails;
    /// the engine idles until the circuit is edited.
    pub fn clear_system(&mut self) {
        self.matrix = Matrix::new(0);
        self.right_side.clear();
        self.orig_matrix = Matrix::new(0);
        self.orig_right_side.clear();
        self.row_info.clear();
        self.permute.clear();
        self.full_size = 0;
        self.size = 0;
        self.needs_map = false;
    }

    /// Restore the working right side from the pristine copy.
    pub fn restore_right_side(&mut self) {
        self.right_side.copy_from_slice(&self.orig_right_side);
    }

    /// Restore the working matrix from the pristine copy.
    pub fn restore_matrix(&mut self) {
        self.matrix.copy_from(&self.orig_matrix);
    }

    /// Matrix row of voltage source `vs`, as a 1-based stamp index.
    fn vs_row(&self, vs: usize) -> usize {
        self.node_count + vs
    }

    // ============ Stamp kernel ============

    /// Add `x` at (`i`, `j`). Ground rows and columns are discarded;
    /// after simplification, writes into a constant column turn into a
    /// right-side correction.
    pub fn stamp_matrix(&mut self, i: usize, j: usize, x: f64) {
        if i == 0 || j == 0 {
            return;
        }
        let (row, col);
        if self.needs_map {
            let Some(r) = self.row_info[i - 1].map_row else {
                return;
            };
            row = r;
            let info = &self.row_info[j - 1];
            if info.kind == RowKind::Const {
                self.right_side[row] -= x * info.value;
                return;
            }
            let Some(c) = info.map_col else {
                return;
            };
            col = c;
        } else {
            row = i - 1;
            col = j - 1;
        }
        self.matrix.add(row, col, x);
    }

    /// Add `x` to the right side of row `i`.
    pub fn stamp_right_side(&mut self, i: usize, x: f64) {
        if i == 0 {
            return;
        }
        let row = if self.needs_map {
            let Some(r) = self.row_info[i - 1].map_row else {
                return;
            };
            r
        } else {
            i - 1
        };
        self.right_side[row] += x;
    }

    /// Mark row `i` as having a right side that changes every
    /// sub-iteration, which exempts it from simplification.
    pub fn stamp_right_side_changes(&mut self, i: usize) {
        if i > 0 {
            self.row_info[i - 1].rs_changes = true;
        }
    }

    /// Mark row `i` as nonlinear: its left side is re-stamped every
    /// sub-iteration and must not be simplified.
    pub fn stamp_nonlinear(&mut self, i: usize) {
        if i > 0 {
            self.row_info[i - 1].ls_changes = true;
        }
    }

    /// Stamp a resistor of `r` ohms between nodes `n1` and `n2`.
    pub fn stamp_resistor(&mut self, n1: usize, n2: usize, r: f64) {
        self.stamp_conductance(n1, n2, 1.0 / r);
    }

    /// Stamp a conductance of `g` siemens between nodes `n1` and `n2`.
    pub fn stamp_conductance(&mut self, n1: usize, n2: usize, g: f64) {
        self.stamp_matrix(n1, n1, g);
        self.stamp_matrix(n2, n2, g);
        self.stamp_matrix(n1, n2, -g);
        self.stamp_matrix(n2, n1, -g);
    }

    /// Stamp an independent voltage source of `v` volts as source `vs`
    /// between `n1` and `n2`. Terminal `n2` is the positive terminal:
    /// the source row reads `v(n2) - v(n1) = v`.
    pub fn stamp_voltage_source(&mut self, n1: usize, n2: usize, vs: usize, v: f64) {
        let vn = self.vs_row(vs);
        self.stamp_matrix(vn, n1, -1.0);
        self.stamp_matrix(vn, n2, 1.0);
        self.stamp_right_side(vn, v);
        self.stamp_matrix(n1, vn, 1.0);
        self.stamp_matrix(n2, vn, -1.0);
    }

    /// Stamp a time-varying voltage source; the value is supplied each
    /// sub-iteration through [`update_voltage_source`](Self::update_voltage_source).
    pub fn stamp_voltage_source_varying(&mut self, n1: usize, n2: usize, vs: usize) {
        let vn = self.vs_row(vs);
        self.stamp_matrix(vn, n1, -1.0);
        self.stamp_matrix(vn, n2, 1.0);
        self.stamp_right_side_changes(vn);
        self.stamp_matrix(n1, vn, 1.0);
        self.stamp_matrix(n2, vn, -1.0);
    }

    /// Set the value of voltage source `vs` for the current sub-iteration.
    pub fn update_voltage_source(&mut self, _n1: usize, _n2: usize, vs: usize, v: f64) {
        let vn = self.vs_row(vs);
        self.stamp_right_side(vn, v);
    }

    /// Stamp the control side of a voltage-controlled voltage source:
    /// source row `vs` gains `coef * (v(n1) - v(n2))`.
    pub fn stamp_vcvs(&mut self, n1: usize, n2: usize, coef: f64, vs: usize) {
        let vn = self.vs_row(vs);
        self.stamp_matrix(vn, n1, coef);
        self.stamp_matrix(vn, n2, -coef);
    }

    /// Stamp a voltage-controlled current source: a current of
    /// `g * (v(vn1) - v(vn2))` flows from `cn1` to `cn2`.
    pub fn stamp_vc_current_source(
        &mut self,
        cn1: usize,
        cn2: usize,
        vn1: usize,
        vn2: usize,
        g: f64,
    ) {
        self.stamp_matrix(cn1, vn1, g);
        self.stamp_matrix(cn2, vn2, g);
        self.stamp_matrix(cn1, vn2, -g);
        self.stamp_matrix(cn2, vn1, -g);
    }

    /// Stamp a current-controlled current source: `gain` times the
    /// current through voltage source `vs` flows from `n1` to `n2`.
    pub fn stamp_cccs(&mut self, n1: usize, n2: usize, vs: usize, gain: f64) {
        let vn = self.vs_row(vs);
        self.stamp_matrix(n1, vn, gain);
        self.stamp_matrix(n2, vn, -gain);
    }

    /// Stamp an independent current source of `i` amps flowing from `n1`
    /// to `n2` through the element.
    pub fn stamp_current_source(&mut self, n1: usize, n2: usize, i: f64) {
        self.stamp_right_side(n1, -i);
        self.stamp_right_side(n2, i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(nodes: usize, sources: usize) -> MnaSystem {
        let mut mna = MnaSystem::new(5e-6);
        mna.alloc(nodes, sources, false);
        mna
    }

    #[test]
    fn test_conductance_stamp_pattern() {
        let mut mna = system(3, 0);
        mna.stamp_resistor(1, 2, 100.0);
        let g = 0.01;
        assert_eq!(mna.matrix.get(0, 0), g);
        assert_eq!(mna.matrix.get(1, 1), g);
        assert_eq!(mna.matrix.get(0, 1), -g);
        assert_eq!(mna.matrix.get(1, 0), -g);
    }

    #[test]
    fn test_ground_entries_discarded() {
        let mut mna = system(2, 0);
        mna.stamp_resistor(0, 1, 50.0);
        // Only the diagonal entry of the live node survives.
        assert_eq!(mna.matrix.get(0, 0), 0.02);
        assert_eq!(mna.right_side[0], 0.0);
    }

    #[test]
    fn test_voltage_source_row_placement() {
        let mut mna = system(3, 1);
        mna.stamp_voltage_source(1, 2, 0, 9.0);
        // node_count = 3, so source 0 occupies row index 2.
        assert_eq!(mna.matrix.get(2, 0), -1.0);
        assert_eq!(mna.matrix.get(2, 1), 1.0);
        assert_eq!(mna.matrix.get(0, 2), 1.0);
        assert_eq!(mna.matrix.get(1, 2), -1.0);
        assert_eq!(mna.right_side[2], 9.0);
    }

    #[test]
    fn test_current_source_right_side() {
        let mut mna = system(3, 0);
        mna.stamp_current_source(1, 2, 0.25);
        assert_eq!(mna.right_side[0], -0.25);
        assert_eq!(mna.right_side[1], 0.25);
    }

    #[test]
    fn test_vcvs_control_row() {
        let mut mna = system(3, 1);
        mna.stamp_vcvs(1, 2, 0.5, 0);
        // The control voltage enters source 0's row, index 2.
        assert_eq!(mna.matrix.get(2, 0), 0.5);
        assert_eq!(mna.matrix.get(2, 1), -0.5);
        assert_eq!(mna.right_side[2], 0.0);
    }

    #[test]
    fn test_cccs_couples_source_current_column() {
        let mut mna = system(3, 1);
        mna.stamp_cccs(1, 2, 0, 2.0);
        // The sensed current (column 2) feeds both node rows, scaled by
        // the gain.
        assert_eq!(mna.matrix.get(0, 2), 2.0);
        assert_eq!(mna.matrix.get(1, 2), -2.0);
        // A ground terminal drops its entry.
        mna.stamp_cccs(0, 1, 0, 3.0);
        assert_eq!(mna.matrix.get(0, 2), -1.0);
    }

    #[test]
    fn test_mapped_stamp_folds_const_column() {
        let mut mna = system(3, 0);
        mna.needs_map = true;
        mna.row_info[0].map_row = Some(0);
        mna.row_info[0].map_col = Some(0);
        mna.row_info[1].kind = RowKind::Const;
        mna.row_info[1].value = 4.0;
        mna.row_info[1].map_row = None;
        mna.row_info[1].map_col = None;

        // A write into the constant column becomes a right-side correction.
        mna.stamp_matrix(1, 2, 0.5);
        assert_eq!(mna.right_side[0], -2.0);
        // A write into a dropped row disappears.
        mna.stamp_right_side(2, 1.0);
        assert_eq!(mna.right_side[0], -2.0);
    }

    #[test]
    fn test_rs_changes_marks_row() {
        let mut mna = system(2, 1);
        mna.stamp_right_side_changes(2);
        assert!(mna.row_info[1].rs_changes);
        mna.stamp_nonlinear(1);
        assert!(mna.row_info[0].ls_changes);
    }
}
