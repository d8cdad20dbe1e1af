// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`InputStrategy`]: what a connection operator does when a node runs out of free inputs
//! (spec §4.3, §4.5 Connection operators).

use alloc::boxed::Box;

/// Policy applied when `>>`/`<<` connect a value to a node with no unbound positional input
/// left (spec §4.5).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InputStrategy {
    /// Refuse the connection (the default for most nodes).
    Fail,
    /// Always add a fresh input; never add an output.
    AddNewInput,
    /// Add a fresh input and a fresh output for each new input (1:1 fan-out).
    AddNewInputAddNewOutput,
    /// Add a fresh input per connection, but route every one of them to the single existing
    /// output (spec §9 supplement: accumulating sum/product style nodes).
    AddNewInputAddAndKeepSingleOutput,
    /// Like [`Self::AddNewInputAddNewOutput`], but inputs made within one "block" (see
    /// [`crate::node::Node::open_input_scope`]) share one output instead of getting one each.
    AddNewInputAddNewOutputForBlock,
    /// Adds a new input/output pair only every `n` inputs; the first `n-1` share the pending
    /// output of the current group.
    AddNewInputAddNewOutputForNInputs { n: u32 },
    /// The new input grows a shared, concatenated view over one ever-widening output buffer
    /// (spec §9 supplement (7), Scenario S3).
    ViewConcat,
    /// Delegates to the strategy named on `from`, letting a wrapper node transparently forward
    /// its connection behaviour to a wrapped one.
    Inherit { from: Box<str> },
}

impl Default for InputStrategy {
    fn default() -> Self {
        Self::Fail
    }
}

impl InputStrategy {
    /// Whether this strategy ever manufactures inputs on demand.
    #[must_use]
    pub const fn allows_growth(&self) -> bool {
        !matches!(self, Self::Fail | Self::Inherit { .. })
    }

    /// Whether every newly grown input gets its own freshly allocated output.
    #[must_use]
    pub const fn grows_output_per_input(&self) -> bool {
        matches!(self, Self::AddNewInputAddNewOutput)
    }

    /// Whether every newly grown input routes into one pre-existing output rather than minting a
    /// new one (spec §9 supplement (1) and (7): accumulating and view-concatenating nodes build
    /// their single output at construction time, so growth only needs to validate it exists).
    #[must_use]
    pub const fn routes_into_existing_output(&self) -> bool {
        matches!(self, Self::AddNewInputAddAndKeepSingleOutput | Self::ViewConcat)
    }

    /// The group size for [`Self::AddNewInputAddNewOutputForNInputs`], if this is that strategy.
    #[must_use]
    pub const fn n_inputs_per_output(&self) -> Option<u32> {
        match self {
            Self::AddNewInputAddNewOutputForNInputs { n } => Some(*n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_and_inherit_never_allow_growth() {
        assert!(!InputStrategy::Fail.allows_growth());
        assert!(!InputStrategy::Inherit { from: "parent".into() }.allows_growth());
    }

    #[test]
    fn add_new_input_add_new_output_grows_an_output_per_input() {
        assert!(InputStrategy::AddNewInputAddNewOutput.grows_output_per_input());
        assert!(!InputStrategy::AddNewInput.grows_output_per_input());
    }
}
