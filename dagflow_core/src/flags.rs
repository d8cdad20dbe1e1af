// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`FlagsDescriptor`]: the taint/freeze/invalid/closed/allocated state machine (spec §4.2).
//!
//! Ported from `examples/original_source/dagflow/core/node.py` and `output.py`'s flag handling;
//! unlike the teacher's `understory_dirty` crate (a generic single-bit dirty tracker), this state
//! machine tracks five independent bits per node/output and the specific freeze-suppression rule
//! that `seti`/`set` need, so it is modeled by hand rather than wrapped around that dependency
//! (see `DESIGN.md`).

/// Per-node/per-output flag bits (spec §4.2).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FlagsDescriptor {
    tainted: bool,
    frozen: bool,
    frozen_tainted: bool,
    invalid: bool,
    closed: bool,
    allocated: bool,
    /// Output descriptors may have changed since the last `close()`; `Graph::close` only reruns
    /// `type_function` for nodes where this is set (spec §4.4 diff-based two-phase close).
    types_tainted: bool,
    /// Buffers may need (re)allocating since the last `close()`; gates the allocation pass the
    /// same way `types_tainted` gates the type-resolution pass.
    needs_reallocation: bool,
    /// Set once allocation actually replaced a buffer this `close()`, so `close()` knows to call
    /// `NodeKernel::post_allocate` for this node (spec §4.2 `_post_allocate`).
    needs_post_allocate: bool,
    /// Set for the duration of a `touch_inner` call to this node's own `eval`, guarding against a
    /// kernel re-entering its own evaluation (spec §4.2).
    being_evaluated: bool,
}

impl Default for FlagsDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagsDescriptor {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tainted: true,
            frozen: false,
            frozen_tainted: false,
            invalid: false,
            closed: false,
            allocated: false,
            types_tainted: true,
            needs_reallocation: true,
            needs_post_allocate: false,
            being_evaluated: false,
        }
    }

    #[must_use]
    #[inline]
    pub const fn tainted(&self) -> bool {
        self.tainted
    }

    #[must_use]
    #[inline]
    pub const fn frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    #[inline]
    pub const fn invalid(&self) -> bool {
        self.invalid
    }

    #[must_use]
    #[inline]
    pub const fn closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    #[inline]
    pub const fn allocated(&self) -> bool {
        self.allocated
    }

    #[must_use]
    #[inline]
    pub const fn types_tainted(&self) -> bool {
        self.types_tainted
    }

    #[must_use]
    #[inline]
    pub const fn needs_reallocation(&self) -> bool {
        self.needs_reallocation
    }

    #[must_use]
    #[inline]
    pub const fn needs_post_allocate(&self) -> bool {
        self.needs_post_allocate
    }

    #[must_use]
    #[inline]
    pub const fn being_evaluated(&self) -> bool {
        self.being_evaluated
    }

    #[inline]
    pub fn set_allocated(&mut self, allocated: bool) {
        self.allocated = allocated;
    }

    #[inline]
    pub fn set_closed(&mut self, closed: bool) {
        self.closed = closed;
    }

    #[inline]
    pub fn set_types_tainted(&mut self, types_tainted: bool) {
        self.types_tainted = types_tainted;
    }

    #[inline]
    pub fn set_needs_reallocation(&mut self, needs_reallocation: bool) {
        self.needs_reallocation = needs_reallocation;
    }

    #[inline]
    pub fn set_needs_post_allocate(&mut self, needs_post_allocate: bool) {
        self.needs_post_allocate = needs_post_allocate;
    }

    #[inline]
    pub fn set_being_evaluated(&mut self, being_evaluated: bool) {
        self.being_evaluated = being_evaluated;
    }

    /// Marks tainted unless frozen, in which case the taint is parked in `frozen_tainted` and
    /// applied by [`Self::unfreeze`] (spec §4.2 "freeze suppresses taint propagation").
    ///
    /// `force` bypasses the freeze suppression entirely (spec §9 supplement (1), used by
    /// `Output::seti(..., force=true)`).
    pub fn taint(&mut self, force: bool) -> bool {
        if self.invalid {
            return false;
        }
        if self.frozen && !force {
            self.frozen_tainted = true;
            return false;
        }
        let changed = !self.tainted;
        self.tainted = true;
        changed
    }

    /// Clears the taint bit after a successful evaluation.
    pub fn mark_fresh(&mut self) {
        self.tainted = false;
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Lifts the freeze; if a taint arrived while frozen, it is now applied (spec §4.2).
    pub fn unfreeze(&mut self) {
        self.frozen = false;
        if self.frozen_tainted {
            self.frozen_tainted = false;
            self.tainted = true;
        }
    }

    /// Marks invalid; invalid nodes never evaluate and never propagate taint further
    /// (spec §4.2, §7).
    pub fn set_invalid(&mut self, invalid: bool) {
        self.invalid = invalid;
        if invalid {
            self.tainted = false;
        }
    }

    /// `open()`: clears `closed`/`allocated` and re-taints, refusing if frozen (spec §4.4).
    /// Also re-arms `types_tainted`/`needs_reallocation` so the next `close()` reruns both passes
    /// for this node rather than trusting stale descriptors from before the reopen.
    pub fn open(&mut self) -> Result<(), ()> {
        if self.frozen {
            return Err(());
        }
        self.closed = false;
        self.allocated = false;
        self.tainted = true;
        self.types_tainted = true;
        self.needs_reallocation = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_descriptor_starts_tainted_and_unclosed() {
        let f = FlagsDescriptor::new();
        assert!(f.tainted());
        assert!(!f.closed());
        assert!(!f.frozen());
    }

    #[test]
    fn taint_is_suppressed_while_frozen_and_applied_on_unfreeze() {
        let mut f = FlagsDescriptor::new();
        f.mark_fresh();
        f.freeze();
        assert!(!f.taint(false));
        assert!(!f.tainted());
        f.unfreeze();
        assert!(f.tainted());
    }

    #[test]
    fn forced_taint_bypasses_freeze() {
        let mut f = FlagsDescriptor::new();
        f.mark_fresh();
        f.freeze();
        assert!(f.taint(true));
        assert!(f.tainted());
    }

    #[test]
    fn invalid_nodes_refuse_taint_and_clear_it() {
        let mut f = FlagsDescriptor::new();
        f.set_invalid(true);
        assert!(!f.tainted());
        assert!(!f.taint(false));
        assert!(!f.taint(true));
    }

    #[test]
    fn open_refuses_when_frozen() {
        let mut f = FlagsDescriptor::new();
        f.set_closed(true);
        f.set_allocated(true);
        f.freeze();
        assert!(f.open().is_err());
        f.unfreeze();
        assert!(f.open().is_ok());
        assert!(!f.closed());
        assert!(!f.allocated());
    }

    #[test]
    fn fresh_descriptor_needs_types_and_reallocation() {
        let f = FlagsDescriptor::new();
        assert!(f.types_tainted());
        assert!(f.needs_reallocation());
        assert!(!f.needs_post_allocate());
        assert!(!f.being_evaluated());
    }

    #[test]
    fn open_rearms_types_tainted_and_needs_reallocation() {
        let mut f = FlagsDescriptor::new();
        f.set_types_tainted(false);
        f.set_needs_reallocation(false);
        f.open().unwrap();
        assert!(f.types_tainted());
        assert!(f.needs_reallocation());
    }
}
