//! Integration sessions: creation, stepping and teardown.

use crate::builtin::Builtin;
use crate::constants::{flags, int, real};
use crate::solver::{Solver, SolverCall, Task};
use crate::status::{classify, StepOutcome, CONTINUE, FIRST_CALL};
use crate::workspace::{MethodClass, Workspace, WorkspaceSizes};
use crate::zvode_shared::{
    AuxParams, ConfigError, IntegrationError, SessionError, Stats, Tolerances, VectorField,
};
use crate::State;

use serde::{Deserialize, Serialize};

/// Optional settings of a session. The defaults reproduce a plain solver call
/// without optional inputs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// Task requested on every call. Default is `Task::Normal`.
    pub task: Task,
    /// Initial step size. None lets the solver choose it.
    pub h0: Option<f64>,
    /// Maximal absolute step size.
    pub h_max: Option<f64>,
    /// Minimal absolute step size.
    pub h_min: Option<f64>,
    /// Maximum number of internal steps per call. Default is 500.
    pub max_steps: Option<u32>,
    /// Maximum number of "t + h = t" warnings. Default is 10.
    pub max_warnings: Option<u32>,
}

impl Options {
    fn has_optional_inputs(&self) -> bool {
        self.h0.is_some()
            || self.h_max.is_some()
            || self.h_min.is_some()
            || self.max_steps.is_some()
            || self.max_warnings.is_some()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.h0, Some(h) if !h.is_finite()) {
            return Err(ConfigError::InvalidOption("h0 must be finite"));
        }
        for h in [self.h_max, self.h_min].iter().flatten() {
            if !(h.is_finite() && *h >= 0.0) {
                return Err(ConfigError::InvalidOption(
                    "h_max and h_min must be finite and non-negative",
                ));
            }
        }
        for n in [self.max_steps, self.max_warnings].iter().flatten() {
            if i32::try_from(*n).is_err() {
                return Err(ConfigError::InvalidOption(
                    "max_steps and max_warnings must fit a 32-bit integer",
                ));
            }
        }
        Ok(())
    }

    /// Writes the optional inputs into their scratch slots.
    fn write(&self, ws: &mut Workspace) {
        let count = |n: Option<u32>| n.and_then(|n| i32::try_from(n).ok()).unwrap_or(0);
        ws.rwork[real::H0] = self.h0.unwrap_or(0.0);
        ws.rwork[real::HMAX] = self.h_max.unwrap_or(0.0);
        ws.rwork[real::HMIN] = self.h_min.unwrap_or(0.0);
        ws.iwork[int::MXSTEP] = count(self.max_steps);
        ws.iwork[int::MXHNIL] = count(self.max_warnings);
    }
}

/// One ongoing integration of dx/dt = F(x, t).
///
/// The session owns the current time, the tolerances, the auxiliary
/// parameters and the scratch workspace. The caller owns the state vector and
/// lends it to every [`Session::step`] call; modifying it between calls
/// perturbs the solver's continuation state.
///
/// Stepping takes `&mut self`, so calls on one session are sequential.
/// [`Session::finish`] consumes the session.
pub struct Session<F, S = Builtin> {
    f: F,
    solver: S,
    method: MethodClass,
    neq: usize,
    t: f64,
    tolerances: Tolerances,
    task: Task,
    iopt: i32,
    istate: i32,
    started: bool,
    workspace: Workspace,
    aux: AuxParams,
}

impl<F: VectorField> Session<F> {
    /// Creates a session with the built-in solver and default options.
    ///
    /// # Arguments
    ///
    /// * `neq`         - Number of equations
    /// * `method`      - Method class, fixed for the session
    /// * `tolerances`  - Relative and absolute tolerance
    /// * `f`           - Structure implementing the VectorField trait
    /// * `t0`          - Initial time
    ///
    pub fn new(
        neq: usize,
        method: MethodClass,
        tolerances: Tolerances,
        f: F,
        t0: f64,
    ) -> Result<Self, SessionError> {
        Self::with_solver(
            Builtin,
            neq,
            method,
            tolerances,
            f,
            t0,
            Options::default(),
            AuxParams::default(),
        )
    }

    /// Creates a session with the built-in solver.
    ///
    /// # Arguments
    ///
    /// * `options` - Task and optional inputs of the solver
    /// * `aux`     - Auxiliary parameters forwarded to every evaluation of `f`
    ///
    pub fn with_options(
        neq: usize,
        method: MethodClass,
        tolerances: Tolerances,
        f: F,
        t0: f64,
        options: Options,
        aux: AuxParams,
    ) -> Result<Self, SessionError> {
        Self::with_solver(Builtin, neq, method, tolerances, f, t0, options, aux)
    }
}

impl<F: VectorField, S: Solver> Session<F, S> {
    /// Creates a session driving `solver`.
    #[allow(clippy::too_many_arguments)]
    pub fn with_solver(
        solver: S,
        neq: usize,
        method: MethodClass,
        tolerances: Tolerances,
        f: F,
        t0: f64,
        options: Options,
        aux: AuxParams,
    ) -> Result<Self, SessionError> {
        tolerances.validate()?;
        options.validate()?;
        if !t0.is_finite() {
            return Err(ConfigError::InvalidOption("initial time must be finite").into());
        }
        let sizes = WorkspaceSizes::new(neq, method)?;
        let mut workspace = Workspace::allocate(sizes)?;
        let iopt = if options.has_optional_inputs() {
            options.write(&mut workspace);
            1
        } else {
            0
        };
        log::debug!(
            "new session: {} equations, method flag {}, workspace {:?}",
            neq,
            method.flag(),
            sizes
        );

        Ok(Session {
            f,
            solver,
            method,
            neq,
            t: t0,
            tolerances,
            task: options.task,
            iopt,
            istate: FIRST_CALL,
            started: false,
            workspace,
            aux,
        })
    }

    /// Advances the state by `dt` with one solver call.
    ///
    /// Returns the time reached. On error, `x` and the session time hold the
    /// last point the solver accepted, and the session status keeps the
    /// failure code until [`Session::restart`] or [`Session::resume`] is called.
    pub fn step(&mut self, x: &mut State, dt: f64) -> Result<f64, IntegrationError> {
        if !dt.is_finite() {
            let err = IntegrationError::NonFiniteIncrement { dt };
            log::warn!("{}", err);
            return Err(err);
        }
        if x.len() != self.neq {
            let err = IntegrationError::StateLength {
                expected: self.neq,
                actual: x.len(),
            };
            log::warn!("{}", err);
            return Err(err);
        }

        let tout = self.t + dt;
        log::trace!("step from t = {} to t = {} (status {})", self.t, tout, self.istate);
        let ws = &mut self.workspace;
        self.solver.call(SolverCall {
            f: &self.f,
            neq: self.neq,
            y: x.as_mut_slice(),
            t: &mut self.t,
            tout,
            itol: flags::ITOL_SCALAR,
            rtol: self.tolerances.rtol,
            atol: self.tolerances.atol,
            itask: self.task.code(),
            istate: &mut self.istate,
            iopt: self.iopt,
            zwork: &mut ws.zwork[..],
            rwork: &mut ws.rwork[..],
            iwork: &mut ws.iwork[..],
            mf: self.method.flag(),
            aux: &self.aux,
        });

        match IntegrationError::from_outcome(classify(self.istate), self.t) {
            None => {
                self.started = true;
                Ok(self.t)
            }
            Some(err) => {
                log::warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Makes the next step a fresh start from the current time and state,
    /// discarding the solver's step size and history.
    pub fn restart(&mut self) {
        self.istate = FIRST_CALL;
    }

    /// Lets the next step continue from the solver's saved state after a
    /// failed call. A session that never completed a call starts afresh.
    pub fn resume(&mut self) {
        self.istate = if self.started { CONTINUE } else { FIRST_CALL };
    }

    /// Current time.
    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn equation_count(&self) -> usize {
        self.neq
    }

    pub fn method(&self) -> MethodClass {
        self.method
    }

    pub fn tolerances(&self) -> Tolerances {
        self.tolerances
    }

    pub fn aux(&self) -> &AuxParams {
        &self.aux
    }

    /// Raw status code of the most recent call, or the first-call sentinel.
    pub fn status(&self) -> i32 {
        self.istate
    }

    /// Classification of the most recent call. None before the first call.
    pub fn outcome(&self) -> Option<StepOutcome> {
        if self.istate == FIRST_CALL {
            None
        } else {
            Some(classify(self.istate))
        }
    }

    /// The solver driven by this session.
    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn sizes(&self) -> WorkspaceSizes {
        self.workspace.sizes()
    }

    /// Statistics reported by the solver so far.
    pub fn stats(&self) -> Stats {
        Stats::from_workspace(&self.workspace)
    }

    /// Ends the session, releasing its scratch buffers, and returns the final statistics.
    pub fn finish(self) -> Stats {
        let stats = self.stats();
        log::debug!("session finished at t = {}", self.t);
        stats
    }
}
