//! LU factorization with partial pivoting.
//!
//! Crout's method with implicit row scaling: each row's pivot candidates
//! are weighted by the reciprocal of the row's largest entry, which keeps
//! pivot selection meaningful for badly scaled circuit matrices (a system
//! can mix conductances of 1e-8 and voltage-source rows of 1).
//!
//! Both routines are pure functions of their arguments so they can be
//! exercised in isolation from the rest of the engine.

use super::matrix::Matrix;

/// Factor `a` in place into L and U with partial pivoting.
///
/// Row permutations are recorded in `ipvt`. Returns `false` when the
/// matrix is singular (a row with no nonzero entry). An exactly zero
/// pivot is replaced by `1e-18` so that nearly-singular systems still
/// produce a (large but finite) solution instead of a division by zero.
pub fn lu_factor(a: &mut Matrix, ipvt: &mut [usize]) -> bool {
    let n = a.size();

    // Implicit scaling: remember each row's largest magnitude.
    let mut scale = vec![0.0; n];
    for i in 0..n {
        let mut largest = 0.0;
        for j in 0..n {
            let x = a.get(i, j).abs();
            if x > largest {
                largest = x;
            }
        }
        if largest == 0.0 {
            return false;
        }
        scale[i] = 1.0 / largest;
    }

    for j in 0..n {
        // Upper triangular part of this column.
        for i in 0..j {
            let mut q = a.get(i, j);
            for k in 0..i {
                q -= a.get(i, k) * a.get(k, j);
            }
            a.set(i, j, q);
        }

        // Lower triangular part, tracking the scaled pivot candidate.
        let mut largest = 0.0;
        let mut largest_row = j;
        for i in j..n {
            let mut q = a.get(i, j);
            for k in 0..j {
                q -= a.get(i, k) * a.get(k, j);
            }
            a.set(i, j, q);
            let x = q.abs() * scale[i];
            if x >= largest {
                largest = x;
                largest_row = i;
            }
        }

        if j != largest_row {
            a.swap_rows(j, largest_row);
            scale.swap(j, largest_row);
        }
        ipvt[j] = largest_row;

        if a.get(j, j) == 0.0 {
            a.set(j, j, 1e-18);
        }

        if j != n - 1 {
            let mult = 1.0 / a.get(j, j);
            for i in (j + 1)..n {
                a.set(i, j, a.get(i, j) * mult);
            }
        }
    }
    true
}

/// Solve `a * x = b` given a factorization from [`lu_factor`].
///
/// The result overwrites `b`. Leading zeros in the permuted right side
/// are skipped before forward substitution.
pub fn lu_solve(a: &Matrix, ipvt: &[usize], b: &mut [f64]) {
    let n = a.size();

    // Find the first nonzero element of the permuted right side.
    let mut bi = n;
    let mut i = 0;
    while i < n {
        let row = ipvt[i];
        let swap = b[row];
        b[row] = b[i];
        b[i] = swap;
        if swap != 0.0 {
            bi = i;
            break;
        }
        i += 1;
    }

    if bi < n {
        // Forward substitution through the unit lower triangle.
        for i in (bi + 1)..n {
            let row = ipvt[i];
            let mut tot = b[row];
            b[row] = b[i];
            for j in bi..i {
                tot -= a.get(i, j) * b[j];
            }
            b[i] = tot;
        }
    }

    // Back substitution through the upper triangle.
    for i in (0..n).rev() {
        let mut tot = b[i];
        for j in (i + 1)..n {
            tot -= a.get(i, j) * b[j];
        }
        b[i] = tot / a.get(i, i);
    }
}
