//! Frame table
//!
//! Per the §9 redesign note ("global mutable state → explicit session
//! object"), the set of declared frames and what has been asserted about
//! them is tracked as an explicit struct rather than reconstructed from a
//! driver loop's counters. Both `bmc` and `induction` thread a `FrameTable`
//! through their unrolling; `witness`/`locator`/`freevals` read
//! `highest_declared` to know how far the table currently extends.

#![allow(missing_docs)]

use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct FrameState {
    constrained: bool,
    committed: bool,
}

/// Tracks, for every step declared to the solver so far, whether the
/// "fully constrained" and "commit asserts" invariants (§3) have been
/// established.
#[derive(Clone, Debug, Default)]
pub struct FrameTable {
    frames: BTreeMap<u32, FrameState>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("step {0} was already declared")]
    AlreadyDeclared(u32),
    #[error("step {0} was never declared")]
    NotDeclared(u32),
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `s_step` has been declared to the solver. Declaring an
    /// already-declared step is a logic error (it should be unreachable
    /// through the public driver API; guarded here so it fails loudly if a
    /// future driver change breaks the invariant).
    pub fn declare(&mut self, step: u32) -> Result<(), FrameError> {
        if self.frames.insert(step, FrameState::default()).is_some() {
            return Err(FrameError::AlreadyDeclared(step));
        }
        Ok(())
    }

    pub fn is_declared(&self, step: u32) -> bool {
        self.frames.contains_key(&step)
    }

    pub fn mark_constrained(&mut self, step: u32) -> Result<(), FrameError> {
        self.frames.get_mut(&step).ok_or(FrameError::NotDeclared(step))?.constrained = true;
        Ok(())
    }

    pub fn is_constrained(&self, step: u32) -> bool {
        self.frames.get(&step).map(|f| f.constrained).unwrap_or(false)
    }

    pub fn mark_committed(&mut self, step: u32) -> Result<(), FrameError> {
        self.frames.get_mut(&step).ok_or(FrameError::NotDeclared(step))?.committed = true;
        Ok(())
    }

    pub fn is_committed(&self, step: u32) -> bool {
        self.frames.get(&step).map(|f| f.committed).unwrap_or(false)
    }

    pub fn highest_declared(&self) -> Option<u32> {
        self.frames.keys().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_constrain_then_commit() {
        let mut t = FrameTable::new();
        t.declare(0).unwrap();
        assert!(t.is_declared(0));
        assert!(!t.is_constrained(0));
        t.mark_constrained(0).unwrap();
        assert!(t.is_constrained(0));
        assert!(!t.is_committed(0));
        t.mark_committed(0).unwrap();
        assert!(t.is_committed(0));
    }

    #[test]
    fn redeclaring_a_step_is_an_error() {
        let mut t = FrameTable::new();
        t.declare(3).unwrap();
        assert!(matches!(t.declare(3), Err(FrameError::AlreadyDeclared(3))));
    }

    #[test]
    fn constraining_undeclared_step_is_an_error() {
        let mut t = FrameTable::new();
        assert!(matches!(t.mark_constrained(5), Err(FrameError::NotDeclared(5))));
    }

    #[test]
    fn highest_declared_tracks_monotonic_growth() {
        let mut t = FrameTable::new();
        assert_eq!(t.highest_declared(), None);
        t.declare(0).unwrap();
        t.declare(1).unwrap();
        t.declare(5).unwrap();
        assert_eq!(t.highest_declared(), Some(5));
    }
}
