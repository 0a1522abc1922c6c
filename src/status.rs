//! Status codes exchanged with the solver and their classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status passed on the first call of a session.
pub const FIRST_CALL: i32 = 1;
/// Status returned after a successful call, usable unchanged on the next one.
pub const CONTINUE: i32 = 2;

/// Outcome of a step call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepOutcome {
    Success,
    ExcessWork,
    ExcessAccuracyRequested,
    IllegalInput,
    RepeatedErrorTestFailure,
    RepeatedConvergenceFailure,
    VanishingErrorWeight,
    /// A code outside the documented set. Never treated as success.
    Unrecognized(i32),
}

/// Classifies a status code returned by the solver.
pub fn classify(code: i32) -> StepOutcome {
    match code {
        CONTINUE => StepOutcome::Success,
        -1 => StepOutcome::ExcessWork,
        -2 => StepOutcome::ExcessAccuracyRequested,
        -3 => StepOutcome::IllegalInput,
        -4 => StepOutcome::RepeatedErrorTestFailure,
        -5 => StepOutcome::RepeatedConvergenceFailure,
        -6 => StepOutcome::VanishingErrorWeight,
        other => StepOutcome::Unrecognized(other),
    }
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        *self == StepOutcome::Success
    }

    /// The status code this outcome is reported with.
    pub fn code(&self) -> i32 {
        match self {
            StepOutcome::Success => CONTINUE,
            StepOutcome::ExcessWork => -1,
            StepOutcome::ExcessAccuracyRequested => -2,
            StepOutcome::IllegalInput => -3,
            StepOutcome::RepeatedErrorTestFailure => -4,
            StepOutcome::RepeatedConvergenceFailure => -5,
            StepOutcome::VanishingErrorWeight => -6,
            StepOutcome::Unrecognized(code) => *code,
        }
    }

    /// Human readable diagnostic.
    pub fn description(&self) -> &'static str {
        match self {
            StepOutcome::Success => "Integration reached the requested time.",
            StepOutcome::ExcessWork => "Excess work done on this call. (Perhaps wrong MF.)",
            StepOutcome::ExcessAccuracyRequested => {
                "Excess accuracy requested. (Tolerances too small.)"
            }
            StepOutcome::IllegalInput => "Illegal input detected. (See printed message.)",
            StepOutcome::RepeatedErrorTestFailure => {
                "Repeated error test failures. (Check all input.)"
            }
            StepOutcome::RepeatedConvergenceFailure => "Repeated convergence failures.",
            StepOutcome::VanishingErrorWeight => {
                "Error weight became zero during problem. (Solution component i vanished, and ATOL or ATOL(i) = 0.)"
            }
            StepOutcome::Unrecognized(_) => "Unrecognized status returned by the solver.",
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepOutcome::Unrecognized(code) => write!(f, "{} (status {})", self.description(), code),
            _ => write!(f, "{}", self.description()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_codes_round_trip() {
        for code in [2, -1, -2, -3, -4, -5, -6] {
            assert_eq!(classify(code).code(), code);
        }
    }

    #[test]
    fn only_continue_is_success() {
        assert!(classify(CONTINUE).is_success());
        assert!(!classify(FIRST_CALL).is_success());
        assert_eq!(classify(FIRST_CALL), StepOutcome::Unrecognized(1));
        assert_eq!(classify(3), StepOutcome::Unrecognized(3));
        assert_eq!(classify(-7), StepOutcome::Unrecognized(-7));
    }

    #[test]
    fn failures_have_distinct_messages() {
        let failures = [
            StepOutcome::ExcessWork,
            StepOutcome::ExcessAccuracyRequested,
            StepOutcome::IllegalInput,
            StepOutcome::RepeatedErrorTestFailure,
            StepOutcome::RepeatedConvergenceFailure,
            StepOutcome::VanishingErrorWeight,
        ];
        for (i, a) in failures.iter().enumerate() {
            for b in &failures[i + 1..] {
                assert_ne!(a.description(), b.description());
            }
        }
        assert!(StepOutcome::Unrecognized(7).to_string().contains("status 7"));
    }
}
