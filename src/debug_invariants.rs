//! Consistency checks of the graph types.
//!
//! [`Graph`](crate::graph::Graph), [`Dgraph`](crate::dgraph::Dgraph) and
//! [`Bgraph`](crate::bgraph::Bgraph) validate their derived fields (frontier,
//! part loads, ghost tables) on demand. The strategy interpreter and the
//! multilevel methods also assert them after every step in debug builds, or
//! when the `strict-invariants` or `check-invariants` feature is enabled.

use crate::bipart_error::BipartError;

const ASSERTED: bool = cfg!(any(
    debug_assertions,
    feature = "strict-invariants",
    feature = "check-invariants"
));

pub trait DebugInvariants {
    /// Type name shown in assertion messages.
    const KIND: &'static str;

    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), BipartError>;

    /// Panic on the first broken invariant when checks are compiled in.
    #[track_caller]
    fn debug_assert_invariants(&self) {
        if ASSERTED {
            if let Err(e) = self.validate_invariants() {
                panic!("[invariants] {}: {e}", Self::KIND);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Loads {
        parts: [u8; 3],
        load0: i64,
    }

    impl DebugInvariants for Loads {
        const KIND: &'static str = "Loads";

        fn validate_invariants(&self) -> Result<(), BipartError> {
            let actual = self.parts.iter().filter(|&&p| p == 0).count() as i64;
            if actual != self.load0 {
                return Err(BipartError::Internal(format!("part 0 load {} != {actual}", self.load0)));
            }
            Ok(())
        }
    }

    #[test]
    fn consistent_state_passes() {
        let s = Loads { parts: [0, 1, 0], load0: 2 };
        s.validate_invariants().unwrap();
        s.debug_assert_invariants();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "[invariants] Loads: internal error: part 0 load 3 != 2")]
    fn broken_state_panics_in_debug_builds() {
        Loads { parts: [0, 1, 0], load0: 3 }.debug_assert_invariants();
    }
}
