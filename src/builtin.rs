//! Pure-Rust solver honouring the ZVODE calling contract.
//!
//! Method flag 10 advances with an embedded Dormand-Prince 5(4) pair and
//! method flag 22 with extrapolated implicit Euler steps (see [`crate::nonstiff`]
//! and [`crate::stiff`]). All state needed to resume is kept in the scratch
//! buffers, so a session can be stepped any number of times.

use crate::constants::{flags, int, limits, real};
use crate::controller::Controller;
use crate::solver::{Solver, SolverCall, Task};
use crate::status::{CONTINUE, FIRST_CALL};
use crate::workspace::{MethodClass, WorkspaceSizes};
use crate::zvode_shared::{AuxParams, VectorField};
use crate::{nonstiff, stiff};

use num_complex::Complex64;

/// The default solver of a session.
#[derive(Clone, Copy, Debug, Default)]
pub struct Builtin;

/// Counters published as optional outputs.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Counters {
    pub nst: i32,
    pub nfe: i32,
    pub nje: i32,
    pub nlu: i32,
    pub nni: i32,
    pub ncfn: i32,
    pub netf: i32,
}

impl Counters {
    fn load(iwork: &[i32]) -> Self {
        Counters {
            nst: iwork[int::NST],
            nfe: iwork[int::NFE],
            nje: iwork[int::NJE],
            nlu: iwork[int::NLU],
            nni: iwork[int::NNI],
            ncfn: iwork[int::NCFN],
            netf: iwork[int::NETF],
        }
    }

    fn store(&self, iwork: &mut [i32]) {
        iwork[int::NST] = self.nst;
        iwork[int::NFE] = self.nfe;
        iwork[int::NJE] = self.nje;
        iwork[int::NLU] = self.nlu;
        iwork[int::NNI] = self.nni;
        iwork[int::NCFN] = self.ncfn;
        iwork[int::NETF] = self.netf;
    }
}

/// The problem being integrated, shared by both method classes during one call.
pub(crate) struct Problem<'a> {
    f: &'a dyn VectorField,
    aux: &'a AuxParams,
    pub n: usize,
    pub rtol: f64,
    pub atol: f64,
    pub posneg: f64,
    pub hmin: f64,
    pub counters: Counters,
}

impl Problem<'_> {
    /// Evaluates the vector field and counts the evaluation.
    pub fn eval(&mut self, t: f64, x: &[Complex64], dx: &mut [Complex64]) {
        self.f.field(t, x, dx, self.aux);
        tick(&mut self.counters.nfe);
    }

    /// Recomputes the error weights. Returns false if one of them is not positive.
    pub fn error_weights(&self, y: &[Complex64], ewt: &mut [f64]) -> bool {
        let mut positive = true;
        for (w, yi) in ewt.iter_mut().zip(y.iter()) {
            *w = self.rtol * yi.norm() + self.atol;
            positive &= *w > 0.0;
        }
        positive
    }

    /// Root-mean-square norm of `v` weighted by `ewt`.
    pub fn norm(&self, v: &[Complex64], ewt: &[f64]) -> f64 {
        let sum: f64 = v
            .iter()
            .zip(ewt.iter())
            .map(|(vi, wi)| (vi.norm() / wi).powi(2))
            .sum();
        (sum / self.n as f64).sqrt()
    }

    /// Adjusts `h` so the step does not pass `tout`. Returns the step to try
    /// and whether it lands on `tout`.
    pub fn clamp(&self, t: f64, h: f64, tout: f64) -> (f64, bool) {
        if (t + 1.01 * h - tout) * self.posneg > 0.0 {
            (tout - t, true)
        } else {
            (h, false)
        }
    }
}

/// Initial step size guess, for a method whose error estimate is of order `order`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn hinit(
    p: &mut Problem<'_>,
    t: f64,
    y: &[Complex64],
    tout: f64,
    h_max: f64,
    order: u32,
    ewt: &[f64],
    f0: &mut [Complex64],
    y1: &mut [Complex64],
    f1: &mut [Complex64],
) -> f64 {
    p.eval(t, y, f0);

    // Compute the norm of y0 and f0
    let d0 = p.norm(y, ewt);
    let d1 = p.norm(f0, ewt);

    let h_max = h_max.min((tout - t).abs());
    let mut h0 = if d0 < 1.0E-5 || d1 < 1.0E-5 {
        1.0E-6
    } else {
        0.01 * (d0 / d1)
    };
    h0 = sign(h0.min(h_max), p.posneg);

    for ((y1_i, y_i), f0_i) in y1.iter_mut().zip(y.iter()).zip(f0.iter()) {
        *y1_i = *y_i + *f0_i * h0;
    }
    p.eval(t + h0, y1, f1);

    // Norm of f1 - f0 divided by h0
    for (f1_i, f0_i) in f1.iter_mut().zip(f0.iter()) {
        *f1_i -= *f0_i;
    }
    let d2 = p.norm(f1, ewt) / h0.abs();

    let h1 = if d1.max(d2) <= 1.0E-15 {
        (1.0E-6_f64).max(h0.abs() * 1.0E-3)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / (order as f64 + 1.0))
    };

    sign((100.0 * h0.abs()).min(h1.min(h_max)), p.posneg)
}

/// Counts one event, saturating at `i32::MAX`.
pub(crate) fn tick(counter: &mut i32) {
    *counter = counter.saturating_add(1);
}

pub(crate) fn sign(a: f64, b: f64) -> f64 {
    if b > 0.0 {
        a.abs()
    } else {
        -a.abs()
    }
}

fn illegal(istate: &mut i32, reason: &str) {
    log::warn!("illegal input: {}", reason);
    *istate = -3;
}

impl Solver for Builtin {
    fn call(&mut self, call: SolverCall<'_>) {
        let SolverCall {
            f,
            neq,
            y,
            t,
            tout,
            itol,
            rtol,
            atol,
            itask,
            istate,
            iopt,
            zwork,
            rwork,
            iwork,
            mf,
            aux,
        } = call;

        // Block A: check the inputs of every call.
        if *istate != FIRST_CALL && *istate != CONTINUE && *istate != 3 {
            return illegal(istate, "ISTATE out of range");
        }
        let method = match MethodClass::try_from(mf) {
            Ok(method) => method,
            Err(_) => return illegal(istate, "MF out of range"),
        };
        let sizes = match WorkspaceSizes::new(neq, method) {
            Ok(sizes) => sizes,
            Err(_) => return illegal(istate, "NEQ out of range"),
        };
        if y.len() != neq {
            return illegal(istate, "length of Y differs from NEQ");
        }
        if zwork.len() < sizes.complex || rwork.len() < sizes.real || iwork.len() < sizes.int {
            return illegal(istate, "work arrays too short");
        }
        if itol != flags::ITOL_SCALAR {
            return illegal(istate, "ITOL out of range");
        }
        if !(rtol >= 0.0 && rtol.is_finite()) || !(atol >= 0.0 && atol.is_finite()) {
            return illegal(istate, "RTOL or ATOL negative or not finite");
        }
        let task = match itask {
            1 => Task::Normal,
            2 => Task::OneStep,
            _ => return illegal(istate, "ITASK out of range"),
        };
        if iopt != 0 && iopt != 1 {
            return illegal(istate, "IOPT out of range");
        }
        if !tout.is_finite() || !t.is_finite() {
            return illegal(istate, "T or TOUT not finite");
        }

        // Block B: optional inputs, re-read when parameters may have changed.
        if *istate != CONTINUE {
            if iopt == 1 {
                if rwork[real::HMAX] < 0.0 || rwork[real::HMIN] < 0.0 {
                    return illegal(istate, "HMAX or HMIN negative");
                }
                if iwork[int::MXSTEP] < 0 || iwork[int::MXHNIL] < 0 {
                    return illegal(istate, "MXSTEP or MXHNIL negative");
                }
                if iwork[int::MXSTEP] == 0 {
                    iwork[int::MXSTEP] = limits::MXSTEP;
                }
                if iwork[int::MXHNIL] == 0 {
                    iwork[int::MXHNIL] = limits::MXHNIL;
                }
            } else {
                rwork[real::H0] = 0.0;
                rwork[real::HMAX] = 0.0;
                rwork[real::HMIN] = 0.0;
                iwork[int::MXSTEP] = limits::MXSTEP;
                iwork[int::MXHNIL] = limits::MXHNIL;
            }
        }

        let order = match method {
            MethodClass::NonStiff => nonstiff::ORDER,
            MethodClass::Stiff => stiff::ORDER,
        };
        let (head, ewt) = rwork.split_at_mut(real::EWT);
        let ewt = &mut ewt[..neq];

        let mut p = Problem {
            f,
            aux,
            n: neq,
            rtol,
            atol,
            posneg: head[real::POSNEG],
            hmin: head[real::HMIN],
            counters: Counters::default(),
        };

        // Block C: first call initialization.
        if *istate == FIRST_CALL {
            let h0 = head[real::H0];
            if tout == *t
                || (h0 == 0.0
                    && (tout - *t).abs() < 2.0 * f64::EPSILON * t.abs().max(tout.abs()))
            {
                return illegal(istate, "TOUT too close to T to start integration");
            }
            if h0 != 0.0 && (tout - *t) * h0 < 0.0 {
                return illegal(istate, "TOUT behind T relative to H0");
            }
            p.posneg = sign(1.0, tout - *t);
            if !p.error_weights(y, ewt) {
                return illegal(istate, "EWT(I) is <= 0");
            }
            let tolsf = f64::EPSILON * p.norm(y, ewt);
            if tolsf > 1.0 {
                head[real::TOLSF] = tolsf * 2.0;
                return illegal(istate, "at start of problem, too much accuracy requested");
            }

            iwork[int::NHNIL] = 0;
            iwork[int::NQU] = 0;
            iwork[int::NQCUR] = order as i32 + 1;
            iwork[int::LENRW] = sizes.real as i32;
            iwork[int::LENIW] = sizes.int as i32;
            head[real::POSNEG] = p.posneg;
            head[real::FAC_OLD] = 0.0;
            head[real::REJECT] = 0.0;
            head[real::HU] = 0.0;
            head[real::TOLSF] = tolsf;

            let h_max = if head[real::HMAX] > 0.0 {
                head[real::HMAX]
            } else {
                f64::INFINITY
            };
            head[real::HCUR] = if h0 != 0.0 {
                sign(h0.abs().min(h_max), p.posneg)
            } else {
                let (f0, rest) = zwork.split_at_mut(neq);
                let (y1, rest) = rest.split_at_mut(neq);
                let f1 = &mut rest[..neq];
                hinit(&mut p, *t, y, tout, h_max, order, ewt, f0, y1, f1)
            };
        } else {
            if tout == *t {
                // Nothing to integrate; the solution at TOUT is the current one.
                *istate = CONTINUE;
                return;
            }
            if (tout - *t) * p.posneg < 0.0 {
                return illegal(istate, "TOUT behind T in the direction of integration");
            }
            p.counters = Counters::load(iwork);
        }

        // Block D: integrate.
        let mxstep = iwork[int::MXSTEP];
        let mxhnil = iwork[int::MXHNIL];
        let mut nhnil = iwork[int::NHNIL];
        let mut ctl = Controller::load(head, order);
        let mut h = head[real::HCUR];
        let mut nst_call = 0;
        let (stiff_piv, _) = iwork[int::PIVOTS..].split_at_mut(
            if method == MethodClass::Stiff { neq } else { 0 },
        );

        if method == MethodClass::NonStiff {
            nonstiff::begin(&mut p, *t, y, zwork);
        }

        let code = loop {
            if nst_call >= mxstep {
                log::warn!("at t = {}, mxstep = {} steps taken on this call before reaching tout", t, mxstep);
                break -1;
            }
            if !p.error_weights(y, ewt) {
                break if p.counters.nst == 0 { -3 } else { -6 };
            }
            let tolsf = f64::EPSILON * p.norm(y, ewt);
            head[real::TOLSF] = tolsf;
            if tolsf > 1.0 {
                head[real::TOLSF] = tolsf * 2.0;
                break if p.counters.nst == 0 { -3 } else { -2 };
            }
            if *t + h == *t {
                tick(&mut nhnil);
                if nhnil <= mxhnil {
                    log::warn!("t (= {}) and h (= {}) are such that t + h = t on the next step", t, h);
                    if nhnil == mxhnil {
                        log::warn!("above warning has been issued {} times and will not be issued again", nhnil);
                    }
                }
            }

            let result = match method {
                MethodClass::NonStiff => {
                    nonstiff::step(&mut p, &mut ctl, t, y, &mut h, tout, ewt, zwork)
                }
                MethodClass::Stiff => {
                    stiff::step(&mut p, &mut ctl, t, y, &mut h, tout, ewt, zwork, stiff_piv)
                }
            };
            nst_call += 1;
            match result {
                Ok(hu) => {
                    head[real::HU] = hu;
                    if *t == tout || task == Task::OneStep {
                        break CONTINUE;
                    }
                }
                Err(code) => break code,
            }
        };

        // Block E: save the continuation state and report.
        ctl.store(head);
        head[real::HCUR] = h;
        head[real::TCUR] = *t;
        p.counters.store(iwork);
        iwork[int::NHNIL] = nhnil;
        if p.counters.nst > 0 {
            iwork[int::NQU] = order as i32 + 1;
        }
        *istate = code;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;

    fn decay(_t: f64, x: &[Complex64], dx: &mut [Complex64], _aux: &AuxParams) {
        dx[0] = -x[0];
    }

    fn call_once(ws: &mut Workspace, y: &mut [Complex64], t: &mut f64, tout: f64, istate: &mut i32) {
        let aux = AuxParams::default();
        Builtin.call(SolverCall {
            f: &decay,
            neq: 1,
            y,
            t,
            tout,
            itol: flags::ITOL_SCALAR,
            rtol: 1e-6,
            atol: 1e-6,
            itask: Task::Normal.code(),
            istate,
            iopt: 0,
            zwork: &mut ws.zwork[..],
            rwork: &mut ws.rwork[..],
            iwork: &mut ws.iwork[..],
            mf: flags::MF_NON_STIFF,
            aux: &aux,
        });
    }

    #[test]
    fn counters_saturate() {
        let sizes = WorkspaceSizes::new(1, MethodClass::NonStiff).unwrap();
        let mut ws = Workspace::allocate(sizes).unwrap();
        let mut y = [Complex64::new(1.0, 0.0)];
        let mut t = 0.0;
        let mut istate = FIRST_CALL;
        call_once(&mut ws, &mut y, &mut t, 0.5, &mut istate);
        assert_eq!(istate, CONTINUE);

        ws.iwork[int::NFE] = i32::MAX - 2;
        ws.iwork[int::NST] = i32::MAX;
        call_once(&mut ws, &mut y, &mut t, 1.0, &mut istate);
        assert_eq!(istate, CONTINUE);
        assert_eq!(t, 1.0);
        assert_eq!(ws.iwork[int::NFE], i32::MAX);
        assert_eq!(ws.iwork[int::NST], i32::MAX);
    }

    #[test]
    fn tick_stops_at_the_largest_count() {
        let mut n = i32::MAX - 1;
        tick(&mut n);
        assert_eq!(n, i32::MAX);
        tick(&mut n);
        assert_eq!(n, i32::MAX);
    }
}
