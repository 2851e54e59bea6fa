//! Dense matrix storage and per-row bookkeeping for the MNA system.

/// A dense square matrix stored row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix {
    size: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a zeroed `size` x `size` matrix.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.size + col]
    }

    /// Set element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] = value;
    }

    /// Add to element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.size + col] += value;
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for j in 0..self.size {
            self.data.swap(a * self.size + j, b * self.size + j);
        }
    }

    /// Overwrite this matrix with `other`'s contents. Sizes must match.
    pub fn copy_from(&mut self, other: &Matrix) {
        debug_assert_eq!(self.size, other.size);
        self.data.copy_from_slice(&other.data);
    }

    /// Raw storage, row-major.
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

/// Classification of an unknown after row simplification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowKind {
    /// Stays in the compacted system.
    #[default]
    Normal,
    /// Known constant; folded into right sides.
    Const,
    /// Equal to another unknown (`node_eq`).
    Equal,
}

/// Simplification record for one row/unknown of the full system.
///
/// Row `i` of the full matrix and unknown `i` share one record: a row that
/// pins unknown `q` to a constant marks `q` as `Const` and drops itself.
#[derive(Debug, Clone, Default)]
pub struct RowInfo {
    /// What became of this unknown.
    pub kind: RowKind,
    /// Known value when `kind == Const`.
    pub value: f64,
    /// Index of the unknown this one equals when `kind == Equal`.
    pub node_eq: usize,
    /// The row's equation is redundant and is left out of the compacted
    /// system.
    pub drop_row: bool,
    /// Left side changes between Newton sub-iterations, so the row must
    /// not be simplified away.
    pub ls_changes: bool,
    /// Right side changes between Newton sub-iterations.
    pub rs_changes: bool,
    /// Row index in the compacted matrix, `None` when dropped.
    pub map_row: Option<usize>,
    /// Column index in the compacted matrix, `None` for `Const`.
    pub map_col: Option<usize>,
}

impl RowInfo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_accumulates() {
        let mut m = Matrix::new(3);
        m.add(1, 2, 2.5);
        m.add(1, 2, 0.5);
        assert_eq!(m.get(1, 2), 3.0);
        assert_eq!(m.get(2, 1), 0.0);
    }

    #[test]
    fn test_swap_rows() {
        let mut m = Matrix::new(2);
        m.set(0, 0, 1.0);
        m.set(0, 1, 2.0);
        m.set(1, 0, 3.0);
        m.set(1, 1, 4.0);
        m.swap_rows(0, 1);
        assert_eq!(m.get(0, 0), 3.0);
        assert_eq!(m.get(0, 1), 4.0);
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.get(1, 1), 2.0);
    }
}
