//! Scratch workspace sizing and allocation.

use crate::constants::{flags, int, real};
use crate::zvode_shared::{ConfigError, SessionError};

use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Class of integration method, fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodClass {
    /// Adams methods, for non-stiff systems.
    NonStiff,
    /// BDF methods with an internally generated Jacobian, for stiff systems.
    Stiff,
}

impl MethodClass {
    /// Method flag passed to the solver.
    pub fn flag(&self) -> i32 {
        match self {
            MethodClass::NonStiff => flags::MF_NON_STIFF,
            MethodClass::Stiff => flags::MF_STIFF,
        }
    }
}

/// Accepts the character flags 'A' (Adams) and 'B' (BDF).
impl TryFrom<char> for MethodClass {
    type Error = ConfigError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            'A' => Ok(MethodClass::NonStiff),
            'B' => Ok(MethodClass::Stiff),
            other => Err(ConfigError::UnknownMethod(format!("{:?}", other))),
        }
    }
}

/// Accepts the solver's method flags 10 and 22.
impl TryFrom<i32> for MethodClass {
    type Error = ConfigError;

    fn try_from(mf: i32) -> Result<Self, Self::Error> {
        match mf {
            flags::MF_NON_STIFF => Ok(MethodClass::NonStiff),
            flags::MF_STIFF => Ok(MethodClass::Stiff),
            other => Err(ConfigError::UnknownMethod(other.to_string())),
        }
    }
}

/// Lengths of the three scratch buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSizes {
    pub complex: usize,
    pub real: usize,
    pub int: usize,
}

impl WorkspaceSizes {
    /// Computes the buffer lengths required for `neq` equations.
    ///
    /// * NonStiff: complex `15 * neq`, integer `30`
    /// * Stiff: complex `(8 + 2 * neq) * neq`, integer `30 + neq`
    /// * both: real `20 + neq`
    pub fn new(neq: usize, method: MethodClass) -> Result<Self, ConfigError> {
        if neq == 0 {
            return Err(ConfigError::ZeroEquations);
        }
        let too_large = || ConfigError::WorkspaceTooLarge { neq };
        let (complex, int) = match method {
            MethodClass::NonStiff => (neq.checked_mul(15), Some(int::HEAD)),
            MethodClass::Stiff => (
                neq.checked_mul(2)
                    .and_then(|n2| n2.checked_add(8))
                    .and_then(|m| m.checked_mul(neq)),
                int::HEAD.checked_add(neq),
            ),
        };
        let sizes = WorkspaceSizes {
            complex: complex.ok_or_else(too_large)?,
            real: real::HEAD.checked_add(neq).ok_or_else(too_large)?,
            int: int.ok_or_else(too_large)?,
        };
        // Lengths travel through the solver as 32-bit integers.
        let max = i32::MAX as usize;
        if sizes.complex > max || sizes.real > max || sizes.int > max {
            return Err(too_large());
        }
        Ok(sizes)
    }
}

/// The three scratch buffers of a session.
///
/// Buffers are boxed slices: their length is fixed at allocation and the
/// solver may rely on a stable layout across calls.
#[derive(Debug)]
pub struct Workspace {
    pub(crate) zwork: Box<[Complex64]>,
    pub(crate) rwork: Box<[f64]>,
    pub(crate) iwork: Box<[i32]>,
}

impl Workspace {
    /// Allocates zeroed buffers, reporting allocation failure instead of aborting.
    pub fn allocate(sizes: WorkspaceSizes) -> Result<Self, SessionError> {
        Ok(Workspace {
            zwork: zeroed("complex", sizes.complex)?,
            rwork: zeroed("real", sizes.real)?,
            iwork: zeroed("integer", sizes.int)?,
        })
    }

    pub fn sizes(&self) -> WorkspaceSizes {
        WorkspaceSizes {
            complex: self.zwork.len(),
            real: self.rwork.len(),
            int: self.iwork.len(),
        }
    }
}

fn zeroed<T: Zero + Clone>(buffer: &'static str, len: usize) -> Result<Box<[T]>, SessionError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|source| SessionError::AllocationFailure {
            buffer,
            len,
            source,
        })?;
    v.resize(len, T::zero());
    Ok(v.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_stiff_sizes() {
        for neq in 1..50 {
            let sizes = WorkspaceSizes::new(neq, MethodClass::NonStiff).unwrap();
            assert_eq!(sizes.complex, 15 * neq);
            assert_eq!(sizes.real, 20 + neq);
            assert_eq!(sizes.int, 30);
        }
    }

    #[test]
    fn stiff_sizes() {
        for neq in 1..50 {
            let sizes = WorkspaceSizes::new(neq, MethodClass::Stiff).unwrap();
            assert_eq!(sizes.complex, (8 + 2 * neq) * neq);
            assert_eq!(sizes.real, 20 + neq);
            assert_eq!(sizes.int, 30 + neq);
        }
    }

    #[test]
    fn zero_equations_are_rejected() {
        assert_eq!(
            WorkspaceSizes::new(0, MethodClass::Stiff),
            Err(ConfigError::ZeroEquations)
        );
    }

    #[test]
    fn oversized_workspaces_are_rejected() {
        let neq = 1 << 20;
        assert_eq!(
            WorkspaceSizes::new(neq, MethodClass::Stiff),
            Err(ConfigError::WorkspaceTooLarge { neq })
        );
        assert_eq!(
            WorkspaceSizes::new(usize::MAX, MethodClass::NonStiff),
            Err(ConfigError::WorkspaceTooLarge { neq: usize::MAX })
        );
    }

    #[test]
    fn method_flags() {
        assert_eq!(MethodClass::try_from('A'), Ok(MethodClass::NonStiff));
        assert_eq!(MethodClass::try_from('B'), Ok(MethodClass::Stiff));
        assert!(MethodClass::try_from('C').is_err());
        assert_eq!(MethodClass::try_from(10_i32), Ok(MethodClass::NonStiff));
        assert_eq!(MethodClass::try_from(22_i32), Ok(MethodClass::Stiff));
        assert!(MethodClass::try_from(21_i32).is_err());
        assert_eq!(MethodClass::Stiff.flag(), 22);
        assert_eq!(MethodClass::NonStiff.flag(), 10);
    }

    #[test]
    fn allocation_matches_sizes() {
        let sizes = WorkspaceSizes::new(3, MethodClass::Stiff).unwrap();
        let ws = Workspace::allocate(sizes).unwrap();
        assert_eq!(ws.sizes(), sizes);
        assert!(ws.rwork.iter().all(|v| *v == 0.0));
    }
}
