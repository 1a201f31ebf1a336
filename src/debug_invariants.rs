//! Structural self-checks for immutable topology types.

use crate::amr_error::AmrReduceError;

/// Types that can verify their own structural invariants.
pub trait DebugInvariants {
    /// Validate invariants and return the first violation encountered.
    fn validate_invariants(&self) -> Result<(), AmrReduceError>;

    /// Panic on the first violation in debug builds or with the
    /// `check-invariants` feature; a no-op otherwise.
    #[inline]
    fn debug_assert_invariants(&self) {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = self.validate_invariants() {
            panic!("[invariants] {e}");
        }
    }
}
