//! Dense complex LU factorization on scratch-buffer storage.

use nalgebra::{DMatrixView, DMatrixViewMut, DVectorViewMut};
use num_complex::Complex64;

/// Factors the column-major `n`×`n` matrix in `a` in place with partial
/// pivoting, recording the pivot row of each column in `piv`.
///
/// Returns the index of the first zero pivot if the matrix is singular.
pub(crate) fn lu_factor(a: &mut [Complex64], n: usize, piv: &mut [i32]) -> Result<(), usize> {
    let mut m = DMatrixViewMut::from_slice(a, n, n);
    for k in 0..n {
        let mut p = k;
        let mut max = m[(k, k)].norm_sqr();
        for i in k + 1..n {
            let v = m[(i, k)].norm_sqr();
            if v > max {
                max = v;
                p = i;
            }
        }
        piv[k] = p as i32;
        if max == 0.0 {
            return Err(k);
        }
        if p != k {
            m.swap_rows(p, k);
        }
        let pivot = m[(k, k)];
        for i in k + 1..n {
            let l = m[(i, k)] / pivot;
            m[(i, k)] = l;
            for j in k + 1..n {
                let u = m[(k, j)];
                m[(i, j)] -= l * u;
            }
        }
    }
    Ok(())
}

/// Solves `A x = b` in place using the factors produced by [`lu_factor`].
pub(crate) fn lu_solve(a: &[Complex64], n: usize, piv: &[i32], b: &mut [Complex64]) {
    let m = DMatrixView::from_slice(a, n, n);
    let mut x = DVectorViewMut::from_slice(b, n);
    for k in 0..n {
        let p = piv[k] as usize;
        if p != k {
            x.swap_rows(p, k);
        }
    }
    // Forward substitution with the unit lower factor.
    for i in 0..n {
        let mut s = x[i];
        for j in 0..i {
            s -= m[(i, j)] * x[j];
        }
        x[i] = s;
    }
    for i in (0..n).rev() {
        let mut s = x[i];
        for j in i + 1..n {
            s -= m[(i, j)] * x[j];
        }
        x[i] = s / m[(i, i)];
    }
}
