//! Shared traits and structures for the session driver and its solvers.

use crate::constants::{int, real};
use crate::status::StepOutcome;
use crate::workspace::Workspace;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::TryReserveError;
use std::fmt;
use thiserror::Error;

/// Right-hand side F(x, t) of the system dx/dt = F(x, t). Implemented by the user.
///
/// The evaluator must be a pure function of its arguments. The stiff class
/// differentiates it numerically and assumes it is analytic in `x`.
pub trait VectorField {
    /// Writes F(x, t) into `dx`. `aux` holds the auxiliary parameters given at
    /// session creation, forwarded unmodified on every evaluation.
    fn field(&self, t: f64, x: &[Complex64], dx: &mut [Complex64], aux: &AuxParams);
}

impl<F> VectorField for F
where
    F: Fn(f64, &[Complex64], &mut [Complex64], &AuxParams),
{
    fn field(&self, t: f64, x: &[Complex64], dx: &mut [Complex64], aux: &AuxParams) {
        self(t, x, dx, aux)
    }
}

/// Auxiliary real and integer parameters handed to the vector field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxParams {
    pub real: Vec<f64>,
    pub int: Vec<i32>,
}

impl AuxParams {
    pub fn new(real: Vec<f64>, int: Vec<i32>) -> Self {
        Self { real, int }
    }
}

/// Scalar relative and absolute tolerances.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub rtol: f64,
    pub atol: f64,
}

impl Tolerances {
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self { rtol, atol }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let ok = |v: f64| v.is_finite() && v >= 0.0;
        if ok(self.rtol) && ok(self.atol) {
            Ok(())
        } else {
            Err(ConfigError::InvalidTolerance {
                rtol: self.rtol,
                atol: self.atol,
            })
        }
    }
}

/// Reasons a session configuration is rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("The number of equations must be positive.")]
    ZeroEquations,
    #[error("Method flag must be 'A' or 'B' (or 10 or 22), got {0}.")]
    UnknownMethod(String),
    #[error("Tolerances must be finite and non-negative (rtol = {rtol}, atol = {atol}).")]
    InvalidTolerance { rtol: f64, atol: f64 },
    #[error("Workspace for {neq} equations exceeds the solver's integer lengths.")]
    WorkspaceTooLarge { neq: usize },
    #[error("Invalid option: {0}.")]
    InvalidOption(&'static str),
}

/// Enumeration of the errors that prevent a session from being created.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    #[error("Could not allocate {len} elements for the {buffer} scratch buffer.")]
    AllocationFailure {
        buffer: &'static str,
        len: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Enumeration of the errors that may arise during a step call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("Stopped at t = {t}. Excess work done on this call. (Perhaps wrong method class.)")]
    ExcessWork { t: f64 },
    #[error("Stopped at t = {t}. Excess accuracy requested. (Tolerances too small.)")]
    ExcessAccuracyRequested { t: f64 },
    #[error("Illegal input detected at t = {t}.")]
    IllegalInput { t: f64 },
    #[error("Stopped at t = {t}. Repeated error test failures. (Check all input.)")]
    RepeatedErrorTestFailure { t: f64 },
    #[error("Stopped at t = {t}. Repeated convergence failures.")]
    RepeatedConvergenceFailure { t: f64 },
    #[error("Stopped at t = {t}. Error weight became zero. (A solution component vanished and atol = 0.)")]
    VanishingErrorWeight { t: f64 },
    #[error("Solver returned unrecognized status {code} at t = {t}.")]
    UnrecognizedStatus { code: i32, t: f64 },
    #[error("Time increment must be finite, got {dt}.")]
    NonFiniteIncrement { dt: f64 },
    #[error("State vector has {actual} components, the session expects {expected}.")]
    StateLength { expected: usize, actual: usize },
}

impl IntegrationError {
    /// Builds the error for a non-success outcome reached at time `t`.
    pub(crate) fn from_outcome(outcome: StepOutcome, t: f64) -> Option<Self> {
        match outcome {
            StepOutcome::Success => None,
            StepOutcome::ExcessWork => Some(Self::ExcessWork { t }),
            StepOutcome::ExcessAccuracyRequested => Some(Self::ExcessAccuracyRequested { t }),
            StepOutcome::IllegalInput => Some(Self::IllegalInput { t }),
            StepOutcome::RepeatedErrorTestFailure => Some(Self::RepeatedErrorTestFailure { t }),
            StepOutcome::RepeatedConvergenceFailure => {
                Some(Self::RepeatedConvergenceFailure { t })
            }
            StepOutcome::VanishingErrorWeight => Some(Self::VanishingErrorWeight { t }),
            StepOutcome::Unrecognized(code) => Some(Self::UnrecognizedStatus { code, t }),
        }
    }

    /// Classification of the error. Inputs rejected before the solver was
    /// called are reported as illegal input.
    pub fn outcome(&self) -> StepOutcome {
        match self {
            Self::ExcessWork { .. } => StepOutcome::ExcessWork,
            Self::ExcessAccuracyRequested { .. } => StepOutcome::ExcessAccuracyRequested,
            Self::IllegalInput { .. }
            | Self::NonFiniteIncrement { .. }
            | Self::StateLength { .. } => StepOutcome::IllegalInput,
            Self::RepeatedErrorTestFailure { .. } => StepOutcome::RepeatedErrorTestFailure,
            Self::RepeatedConvergenceFailure { .. } => StepOutcome::RepeatedConvergenceFailure,
            Self::VanishingErrorWeight { .. } => StepOutcome::VanishingErrorWeight,
            Self::UnrecognizedStatus { code, .. } => StepOutcome::Unrecognized(*code),
        }
    }
}

/// Contains some statistics of the integration, read from the solver's optional outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub num_steps: u32,
    pub num_eval: u32,
    pub num_jac: u32,
    pub num_lu: u32,
    pub num_nonlinear_iter: u32,
    pub convergence_failures: u32,
    pub error_test_failures: u32,
    pub last_order: u32,
    pub next_order: u32,
    /// Step size last used successfully.
    pub last_step: f64,
    /// Step size to be attempted next.
    pub next_step: f64,
    /// Time reached internally by the solver.
    pub current_time: f64,
    /// Tolerance scale factor, greater than 1 when too much accuracy was requested.
    pub tolerance_scale: f64,
}

impl Stats {
    pub(crate) fn from_workspace(ws: &Workspace) -> Stats {
        let count = |slot: usize| u32::try_from(ws.iwork[slot]).unwrap_or(0);
        Stats {
            num_steps: count(int::NST),
            num_eval: count(int::NFE),
            num_jac: count(int::NJE),
            num_lu: count(int::NLU),
            num_nonlinear_iter: count(int::NNI),
            convergence_failures: count(int::NCFN),
            error_test_failures: count(int::NETF),
            last_order: count(int::NQU),
            next_order: count(int::NQCUR),
            last_step: ws.rwork[real::HU],
            next_step: ws.rwork[real::HCUR],
            current_time: ws.rwork[real::TCUR],
            tolerance_scale: ws.rwork[real::TOLSF],
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Number of steps: {}", self.num_steps)?;
        writeln!(f, "Number of function evaluations: {}", self.num_eval)?;
        writeln!(f, "Number of Jacobian evaluations: {}", self.num_jac)?;
        writeln!(f, "Number of LU decompositions: {}", self.num_lu)?;
        writeln!(f, "Number of error test failures: {}", self.error_test_failures)?;
        write!(f, "Number of convergence failures: {}", self.convergence_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_vector_fields() {
        let f = |_t: f64, x: &[Complex64], dx: &mut [Complex64], aux: &AuxParams| {
            dx[0] = x[0] * aux.real[0];
        };
        let aux = AuxParams::new(vec![2.0], vec![]);
        let mut dx = [Complex64::new(0.0, 0.0)];
        f.field(0.0, &[Complex64::new(1.0, -1.0)], &mut dx, &aux);
        assert_eq!(dx[0], Complex64::new(2.0, -2.0));
    }

    #[test]
    fn tolerances_must_be_finite_and_non_negative() {
        assert!(Tolerances::new(1e-6, 0.0).validate().is_ok());
        assert!(Tolerances::new(-1e-6, 1e-6).validate().is_err());
        assert!(Tolerances::new(1e-6, f64::NAN).validate().is_err());
        assert!(Tolerances::new(f64::INFINITY, 1e-6).validate().is_err());
    }

    #[test]
    fn errors_map_back_to_their_outcome() {
        let err = IntegrationError::from_outcome(StepOutcome::RepeatedConvergenceFailure, 1.5);
        assert_eq!(
            err,
            Some(IntegrationError::RepeatedConvergenceFailure { t: 1.5 })
        );
        assert_eq!(
            err.map(|e| e.outcome()),
            Some(StepOutcome::RepeatedConvergenceFailure)
        );
        assert!(IntegrationError::from_outcome(StepOutcome::Success, 0.0).is_none());
        assert_eq!(
            IntegrationError::StateLength {
                expected: 2,
                actual: 3
            }
            .outcome(),
            StepOutcome::IllegalInput
        );
    }
}
