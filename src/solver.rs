//! Boundary to the adaptive multistep solver.

use crate::zvode_shared::{AuxParams, VectorField};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Task requested from the solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// Integrate up to the target time.
    #[default]
    Normal,
    /// Take one internal step toward the target time and return.
    OneStep,
}

impl Task {
    pub fn code(&self) -> i32 {
        match self {
            Task::Normal => 1,
            Task::OneStep => 2,
        }
    }
}

/// Arguments of one solver call, in the order of the ZVODE entry point.
///
/// `t`, `y`, `istate` and the three scratch buffers are read and written by
/// the solver. Everything else is input.
pub struct SolverCall<'a> {
    pub f: &'a dyn VectorField,
    pub neq: usize,
    pub y: &'a mut [Complex64],
    pub t: &'a mut f64,
    pub tout: f64,
    pub itol: i32,
    pub rtol: f64,
    pub atol: f64,
    pub itask: i32,
    pub istate: &'a mut i32,
    pub iopt: i32,
    pub zwork: &'a mut [Complex64],
    pub rwork: &'a mut [f64],
    pub iwork: &'a mut [i32],
    pub mf: i32,
    pub aux: &'a AuxParams,
}

/// An adaptive integrator callable through the ZVODE calling contract.
///
/// One call advances `y` from `t` toward `tout` and reports the result in
/// `istate`. Implementations keep all continuation state in the scratch
/// buffers, which the session never resizes or resets between calls.
pub trait Solver {
    fn call(&mut self, call: SolverCall<'_>);
}

impl<S: Solver + ?Sized> Solver for Box<S> {
    fn call(&mut self, call: SolverCall<'_>) {
        (**self).call(call)
    }
}
