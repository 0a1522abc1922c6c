//! Binding to the Fortran ZVODE solver (feature `zvode-ffi`).
//!
//! Requires `libzvode` on the linker search path. The Fortran callback cannot
//! carry a Rust closure, so the real parameter array handed to ZVODE points to
//! a context holding the vector field and the caller's auxiliary parameters;
//! ZVODE passes it back to the callback unmodified.

use crate::solver::{Solver, SolverCall};
use crate::zvode_shared::{AuxParams, VectorField};

use num_complex::Complex64;
use std::os::raw::{c_int, c_void};
use std::ptr;

type FieldFn = extern "C" fn(
    *const c_int,
    *const f64,
    *const Complex64,
    *mut Complex64,
    *mut f64,
    *mut c_int,
);

#[link(name = "zvode")]
extern "C" {
    fn zvode_(
        f: FieldFn,
        neq: *mut c_int,
        y: *mut Complex64,
        t: *mut f64,
        tout: *mut f64,
        itol: *mut c_int,
        rtol: *mut f64,
        atol: *mut f64,
        itask: *mut c_int,
        istate: *mut c_int,
        iopt: *mut c_int,
        zwork: *mut Complex64,
        lzw: *mut c_int,
        rwork: *mut f64,
        lrw: *mut c_int,
        iwork: *mut c_int,
        liw: *mut c_int,
        jac: *mut c_void,
        mf: *mut c_int,
        rpar: *mut f64,
        ipar: *mut c_int,
    );
}

struct Context<'a> {
    f: &'a dyn VectorField,
    aux: &'a AuxParams,
    n: usize,
}

/// Vector field callback handed to ZVODE. A panic in the user's vector field
/// aborts the process, since it cannot unwind through Fortran frames.
extern "C" fn field(
    _neq: *const c_int,
    t: *const f64,
    y: *const Complex64,
    ydot: *mut Complex64,
    rpar: *mut f64,
    _ipar: *mut c_int,
) {
    // SAFETY: `rpar` is the `Context` passed by `Zvode::call`, alive for the
    // duration of the solver call, and `y`/`ydot` hold `n` values each.
    unsafe {
        let ctx = &*(rpar as *const Context<'_>);
        let x = std::slice::from_raw_parts(y, ctx.n);
        let dx = std::slice::from_raw_parts_mut(ydot, ctx.n);
        ctx.f.field(*t, x, dx, ctx.aux);
    }
}

/// The Fortran ZVODE solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct Zvode;

impl Solver for Zvode {
    fn call(&mut self, call: SolverCall<'_>) {
        let lengths = (
            c_int::try_from(call.neq),
            c_int::try_from(call.zwork.len()),
            c_int::try_from(call.rwork.len()),
            c_int::try_from(call.iwork.len()),
        );
        let (mut neq, mut lzw, mut lrw, mut liw) = match lengths {
            (Ok(neq), Ok(lzw), Ok(lrw), Ok(liw)) if call.y.len() == call.neq => {
                (neq, lzw, lrw, liw)
            }
            _ => {
                log::warn!("illegal input: lengths do not fit the ZVODE interface");
                *call.istate = -3;
                return;
            }
        };
        let ctx = Context {
            f: call.f,
            aux: call.aux,
            n: call.neq,
        };
        let mut tout = call.tout;
        let mut itol = call.itol;
        let mut rtol = call.rtol;
        let mut atol = call.atol;
        let mut itask = call.itask;
        let mut iopt = call.iopt;
        let mut mf = call.mf;

        // SAFETY: every pointer refers to live, correctly sized storage for
        // the duration of the call; the lengths passed match the buffers.
        unsafe {
            zvode_(
                field,
                &mut neq,
                call.y.as_mut_ptr(),
                call.t,
                &mut tout,
                &mut itol,
                &mut rtol,
                &mut atol,
                &mut itask,
                call.istate,
                &mut iopt,
                call.zwork.as_mut_ptr(),
                &mut lzw,
                call.rwork.as_mut_ptr(),
                &mut lrw,
                call.iwork.as_mut_ptr(),
                &mut liw,
                ptr::null_mut(),
                &mut mf,
                &ctx as *const Context<'_> as *mut f64,
                ptr::null_mut(),
            );
        }
    }
}
