//! Implicit Euler steps with local Richardson extrapolation, used for the
//! stiff method class.
//!
//! Each step solves the implicit Euler equations once over the full step and
//! twice over half steps with a simplified Newton iteration. The difference
//! between the two solutions estimates the local error, and their
//! extrapolation `2 * z_half - z_full` is the second order solution carried
//! forward.
//!
//! Complex scratch layout for `n` equations: eight work vectors of length `n`,
//! the iteration matrix (`n * n`, column-major, overwritten by its LU factors)
//! and the Jacobian (`n * n`).

use crate::builtin::{tick, Problem};
use crate::constants::limits;
use crate::controller::Controller;
use crate::linalg::{lu_factor, lu_solve};

use num_complex::Complex64;

/// Order of the local error estimate.
pub(crate) const ORDER: u32 = 1;

/// Weighted norm a Newton correction must fall below to be converged.
const NEWTON_TOL: f64 = 0.01;

/// Factor applied to the step size after a convergence failure.
const CONV_FAIL_FACTOR: f64 = 0.25;

/// Approximates the Jacobian at `(t, y)` by difference quotients, column by
/// column. The vector field is assumed analytic in `y`, so a real increment
/// suffices.
#[allow(clippy::too_many_arguments)]
fn jacobian(
    p: &mut Problem<'_>,
    t: f64,
    y: &[Complex64],
    f0: &[Complex64],
    h: f64,
    ewt: &[f64],
    jac: &mut [Complex64],
    yp: &mut [Complex64],
    fp: &mut [Complex64],
) {
    let n = p.n;
    let srur = f64::EPSILON.sqrt();
    let fac = p.norm(f0, ewt);
    let mut r0 = 1000.0 * h.abs() * f64::EPSILON * n as f64 * fac;
    if r0 == 0.0 {
        r0 = 1.0;
    }
    yp.copy_from_slice(y);
    for j in 0..n {
        let r = (srur * y[j].norm()).max(r0 * ewt[j]);
        yp[j] = y[j] + r;
        p.eval(t, yp, fp);
        for i in 0..n {
            jac[j * n + i] = (fp[i] - f0[i]) / r;
        }
        yp[j] = y[j];
    }
    tick(&mut p.counters.nje);
}

/// Forms `I - hh * J` in `a` and factors it.
fn factor(
    p: &mut Problem<'_>,
    jac: &[Complex64],
    hh: f64,
    a: &mut [Complex64],
    piv: &mut [i32],
) -> bool {
    let n = p.n;
    for (a_ij, j_ij) in a.iter_mut().zip(jac.iter()) {
        *a_ij = -*j_ij * hh;
    }
    for i in 0..n {
        a[i * n + i] += 1.0;
    }
    tick(&mut p.counters.nlu);
    match lu_factor(a, n, piv) {
        Ok(()) => true,
        Err(col) => {
            log::debug!("iteration matrix singular at column {}", col);
            false
        }
    }
}

/// Solves `z = yb + hh * f(tb + hh, z)` by simplified Newton iteration,
/// starting from the explicit Euler predictor. Returns false if the
/// iteration fails to converge.
#[allow(clippy::too_many_arguments)]
fn newton(
    p: &mut Problem<'_>,
    tb: f64,
    yb: &[Complex64],
    fb: &[Complex64],
    hh: f64,
    lu: &[Complex64],
    piv: &[i32],
    ewt: &[f64],
    z: &mut [Complex64],
    del: &mut [Complex64],
    fz: &mut [Complex64],
) -> bool {
    let n = p.n;
    for i in 0..n {
        z[i] = yb[i] + fb[i] * hh;
    }
    let mut del_old = 0.0;
    for m in 0..limits::MAXCOR {
        p.eval(tb + hh, z, fz);
        for i in 0..n {
            del[i] = yb[i] + fz[i] * hh - z[i];
        }
        lu_solve(lu, n, piv, del);
        for i in 0..n {
            z[i] += del[i];
        }
        tick(&mut p.counters.nni);

        let del_norm = p.norm(del, ewt);
        if !del_norm.is_finite() {
            return false;
        }
        if del_norm <= NEWTON_TOL {
            return true;
        }
        if m > 0 {
            let rate = del_norm / del_old;
            if rate > 2.0 {
                return false;
            }
            if rate < 1.0 && del_norm * rate / (1.0 - rate) <= NEWTON_TOL {
                return true;
            }
        }
        del_old = del_norm;
    }
    false
}

/// Takes one accepted step, retrying with smaller steps after convergence
/// or error test failures.
///
/// On success `t` and `y` are advanced, `h` holds the next step size to try,
/// and the step actually taken is returned. On failure the status code is
/// returned and `t`, `y` are left at the last accepted point.
#[allow(clippy::too_many_arguments)]
pub(crate) fn step(
    p: &mut Problem<'_>,
    ctl: &mut Controller,
    t: &mut f64,
    y: &mut [Complex64],
    h: &mut f64,
    tout: f64,
    ewt: &[f64],
    zwork: &mut [Complex64],
    piv: &mut [i32],
) -> Result<f64, i32> {
    let n = p.n;
    let (vectors, matrices) = zwork.split_at_mut(8 * n);
    let (a, rest) = matrices.split_at_mut(n * n);
    let jac = &mut rest[..n * n];
    let (f0, vectors) = vectors.split_at_mut(n);
    let (z_full, vectors) = vectors.split_at_mut(n);
    let (z1, vectors) = vectors.split_at_mut(n);
    let (z2, vectors) = vectors.split_at_mut(n);
    let (f1, vectors) = vectors.split_at_mut(n);
    let (del, vectors) = vectors.split_at_mut(n);
    let (fz, vectors) = vectors.split_at_mut(n);
    let yp = &mut vectors[..n];

    p.eval(*t, y, f0);
    jacobian(p, *t, y, f0, *h, ewt, jac, yp, fz);

    let mut n_conv_fail = 0;
    let mut n_err_fail = 0;
    let mut h_new = 0.0;

    loop {
        let (h_try, last) = p.clamp(*t, *h, tout);
        if h_try == 0.0 {
            log::warn!("at t = {}, step size is zero", t);
            return Err(-3);
        }
        let half = 0.5 * h_try;

        let converged = factor(p, jac, h_try, a, piv)
            && newton(p, *t, y, f0, h_try, a, piv, ewt, z_full, del, fz)
            && factor(p, jac, half, a, piv)
            && newton(p, *t, y, f0, half, a, piv, ewt, z1, del, fz)
            && {
                p.eval(*t + half, z1, f1);
                newton(p, *t + half, z1, f1, half, a, piv, ewt, z2, del, fz)
            };

        if !converged {
            tick(&mut p.counters.ncfn);
            n_conv_fail += 1;
            *h = h_try * CONV_FAIL_FACTOR;
            if n_conv_fail >= limits::MXNCF || h.abs() < p.hmin {
                log::warn!(
                    "at t = {}, corrector convergence failed repeatedly or with |h| = hmin",
                    t
                );
                return Err(-5);
            }
            continue;
        }

        for i in 0..n {
            del[i] = z2[i] - z_full[i];
        }
        let err = p.norm(del, ewt);

        if ctl.accept(err, h_try, &mut h_new) {
            for i in 0..n {
                y[i] = z2[i] * 2.0 - z_full[i];
            }
            *t = if last { tout } else { *t + h_try };
            tick(&mut p.counters.nst);
            *h = if h_new.abs() < p.hmin {
                p.posneg * p.hmin
            } else {
                h_new
            };
            return Ok(h_try);
        }

        tick(&mut p.counters.netf);
        n_err_fail += 1;
        *h = h_new;
        if n_err_fail >= limits::MXNEF || h_new.abs() < p.hmin {
            log::warn!(
                "at t = {}, error test failed repeatedly or with |h| = hmin",
                t
            );
            return Err(-4);
        }
    }
}
