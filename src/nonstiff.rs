//! Explicit Runge-Kutta method with Dormand-Prince coefficients of order 5(4),
//! used for the non-stiff method class.
//!
//! The complex scratch buffer holds the seven stages followed by the
//! candidate solution; the first stage is the derivative at the current point.

use crate::builtin::{tick, Problem};
use crate::controller::Controller;
use crate::constants::limits;

use num_complex::Complex64;

/// Order of the embedded error estimate.
pub(crate) const ORDER: u32 = 4;

mod dopri54 {
    pub const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

    pub const A: [[f64; 6]; 7] = [
        [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
        [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
        [
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
            0.0,
            0.0,
        ],
        [
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
            0.0,
        ],
        [
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
        ],
    ];

    /// Difference between the fifth and fourth order weights.
    pub const E: [f64; 7] = [
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ];
}

/// Evaluates the first stage at the current point.
pub(crate) fn begin(p: &mut Problem<'_>, t: f64, y: &[Complex64], zwork: &mut [Complex64]) {
    let n = p.n;
    p.eval(t, y, &mut zwork[..n]);
}

/// Takes one accepted step, retrying with smaller steps after rejections.
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
) -> Result<f64, i32> {
    let n = p.n;
    let (k, rest) = zwork.split_at_mut(7 * n);
    let y_next = &mut rest[..n];
    let mut n_fail = 0;
    let mut h_new = 0.0;

    loop {
        let (h_try, last) = p.clamp(*t, *h, tout);
        if h_try == 0.0 {
            log::warn!("at t = {}, step size is zero", t);
            return Err(-3);
        }

        // 6 Stages
        for s in 1..7 {
            let (done, todo) = k.split_at_mut(s * n);
            for i in 0..n {
                let mut acc = Complex64::new(0.0, 0.0);
                for j in 0..s {
                    acc += done[j * n + i] * dopri54::A[s][j];
                }
                y_next[i] = y[i] + acc * h_try;
            }
            p.eval(*t + h_try * dopri54::C[s], y_next, &mut todo[..n]);
        }

        // Compute error estimate
        let mut err = 0.0;
        for i in 0..n {
            let mut est = Complex64::new(0.0, 0.0);
            for (s, e) in dopri54::E.iter().enumerate() {
                est += k[s * n + i] * *e;
            }
            err += (est.norm() * h_try.abs() / ewt[i]).powi(2);
        }
        err = (err / n as f64).sqrt();

        // Step size control
        if ctl.accept(err, h_try, &mut h_new) {
            y.copy_from_slice(y_next);
            *t = if last { tout } else { *t + h_try };
            // First same as last
            k.copy_within(6 * n..7 * n, 0);
            tick(&mut p.counters.nst);
            *h = if h_new.abs() < p.hmin {
                p.posneg * p.hmin
            } else {
                h_new
            };
            return Ok(h_try);
        }

        tick(&mut p.counters.netf);
        n_fail += 1;
        if n_fail >= limits::MXNEF || h_new.abs() < p.hmin {
            log::warn!(
                "at t = {}, error test failed repeatedly or with |h| = hmin",
                t
            );
            *h = h_new;
            return Err(-4);
        }
        *h = h_new;
    }
}
