//! # ZODEs Solvers
//! `zode-solvers` drives the adaptive integration of complex-valued ODE systems
//! dx/dt = F(x, t) one call at a time, in the manner of ZVODE: a session owns
//! the solver workspace, each step advances the caller's state to a requested
//! time, and every solver status is reported as a typed outcome.

// Re-export from external crates
pub use nalgebra::DVector;
pub use num_complex::Complex64;

/// State vector of a session.
pub type State = DVector<Complex64>;

// Declare modules
pub mod builtin;
mod constants;
mod controller;
#[cfg(feature = "zvode-ffi")]
pub mod ffi;
mod linalg;
mod nonstiff;
pub mod session;
pub mod solver;
pub mod status;
mod stiff;
pub mod workspace;
pub mod zvode_shared;

pub use builtin::Builtin;
pub use session::{Options, Session};
pub use solver::{Solver, SolverCall, Task};
pub use status::{classify, StepOutcome};
pub use workspace::{MethodClass, WorkspaceSizes};

pub use zvode_shared::{
    AuxParams, ConfigError, IntegrationError, SessionError, Stats, Tolerances, VectorField,
};
