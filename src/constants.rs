//! Scratch-buffer layout and solver limits.
//!
//! Slot numbers follow the optional input/output layout of ZVODE, shifted to
//! zero-based indices. Slots the reference solver keeps in common blocks are
//! placed in the unused head of the buffers by the built-in solver.

/// Sentinels and method flags exchanged with the solver.
pub mod flags {
    /// Method flag for the non-stiff (Adams) class.
    pub const MF_NON_STIFF: i32 = 10;
    /// Method flag for the stiff (BDF, internal difference-quotient Jacobian) class.
    pub const MF_STIFF: i32 = 22;
    /// Scalar relative and absolute tolerance.
    pub const ITOL_SCALAR: i32 = 1;
}

/// Slots of the real scratch buffer.
pub mod real {
    /// Length of the fixed head preceding the per-equation error weights.
    pub const HEAD: usize = 20;

    pub const H0: usize = 4;
    pub const HMAX: usize = 5;
    pub const HMIN: usize = 6;
    /// Memory of the PI controller (previous error ratio).
    pub const FAC_OLD: usize = 7;
    /// Direction of integration (+1 or -1), fixed by the first call.
    pub const POSNEG: usize = 8;
    /// Non-zero when the last attempted step was rejected.
    pub const REJECT: usize = 9;
    pub const HU: usize = 10;
    pub const HCUR: usize = 11;
    pub const TCUR: usize = 12;
    pub const TOLSF: usize = 13;
    /// First error weight.
    pub const EWT: usize = HEAD;
}

/// Slots of the integer scratch buffer.
pub mod int {
    /// Length of the fixed head; the stiff class appends one pivot per equation.
    pub const HEAD: usize = 30;

    pub const MXSTEP: usize = 5;
    pub const MXHNIL: usize = 6;
    /// Number of "t + h = t" warnings issued so far.
    pub const NHNIL: usize = 7;
    pub const NST: usize = 10;
    pub const NFE: usize = 11;
    pub const NJE: usize = 12;
    pub const NQU: usize = 13;
    pub const NQCUR: usize = 14;
    pub const LENRW: usize = 16;
    pub const LENIW: usize = 17;
    pub const NLU: usize = 18;
    pub const NNI: usize = 19;
    pub const NCFN: usize = 20;
    pub const NETF: usize = 21;
    /// First LU pivot (stiff class only).
    pub const PIVOTS: usize = HEAD;
}

/// Default limits of the stepping algorithm.
pub mod limits {
    /// Maximum number of internal steps per call.
    pub const MXSTEP: i32 = 500;
    /// Maximum number of "t + h = t" warnings.
    pub const MXHNIL: i32 = 10;
    /// Consecutive error-test failures tolerated on one step.
    pub const MXNEF: u32 = 7;
    /// Consecutive convergence failures tolerated on one step.
    pub const MXNCF: u32 = 10;
    /// Corrector iterations per Newton solve.
    pub const MAXCOR: u32 = 3;
}

/// Step size controller coefficients.
pub mod controller {
    pub const BETA: f64 = 0.04;
    pub const FAC_MIN: f64 = 0.2;
    pub const FAC_MAX: f64 = 10.0;
    pub const SAFETY_FACTOR: f64 = 0.9;
    /// Initial memory of the PI controller.
    pub const FAC_OLD_INIT: f64 = 1.0E-4;
}
