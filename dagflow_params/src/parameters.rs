// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Parameters`]: many scalar parameters addressed by index into one shared value array
//! (spec §4.9), grounded in `examples/original_source/dagflow/parameters.py`'s `Parameters`/
//! `Parameter` pair.
//!
//! Unlike [`crate::parameter::Parameter`] (one private [`dagflow_core::Array`]-backed node per
//! parameter), a [`Parameters`] group owns exactly one multi-element `Array` node and hands out
//! [`GroupParameter`] views that each address a single index into it — the shape `Parameters.
//! from_numbers` builds for an array-valued block of parameters sharing one name hierarchy
//! (`"detector.energy_scale"`, `"detector.resolution"`, ...).

use dagflow_core::{Array, Graph, NodeId, OutputRef};

use crate::error::ParamsError;

/// A view onto one element of a [`Parameters`] group's shared value array (spec §4.9
/// `parameters.py::Parameter`, distinct from the standalone [`crate::parameter::Parameter`]).
#[derive(Clone, Debug)]
pub struct GroupParameter {
    value: Array,
    idx: usize,
}

impl GroupParameter {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.value.node()
    }

    #[must_use]
    pub fn output(&self) -> OutputRef {
        self.value.output()
    }

    pub fn value(&self) -> Result<f64, ParamsError> {
        Ok(self.value.get(self.idx)?)
    }

    pub fn set_value(&self, value: f64) -> Result<(), ParamsError> {
        Ok(self.value.set_element(self.idx, value)?)
    }
}

/// A named group of parameters backed by one shared value array (spec §4.9 `Parameters`).
///
/// `is_variable` mirrors the original's `variable`/`fixed` constructor pair: it is bookkeeping a
/// caller (a minimizer driving `parameters()` over every variable group, skipping fixed ones) is
/// expected to read and respect, not an enforced lock — nothing here refuses `set_value` on a
/// fixed group, matching the original (`fixed=True` documents a parameter as held constant by
/// convention, it does not remove its setter).
#[derive(Clone, Debug)]
pub struct Parameters {
    value: Array,
    names: Vec<Box<str>>,
    pars: Vec<GroupParameter>,
    is_variable: bool,
}

impl Parameters {
    /// Builds a group of `values.len()` parameters named by `names` (must be the same length),
    /// backed by one shared `Array` node (spec §4.9 `Parameters.from_numbers`).
    pub fn from_numbers(
        graph: &Graph,
        name: impl Into<Box<str>>,
        values: Vec<f64>,
        names: Vec<Box<str>>,
        is_variable: bool,
    ) -> Result<Self, ParamsError> {
        if values.len() != names.len() {
            return Err(ParamsError::construction(format!(
                "Parameters: {} names but {} values",
                names.len(),
                values.len()
            )));
        }
        let value = Array::new(graph, name, values)?;
        let pars = (0..names.len())
            .map(|idx| GroupParameter {
                value: value.clone(),
                idx,
            })
            .collect();
        Ok(Self {
            value,
            names,
            pars,
            is_variable,
        })
    }

    #[must_use]
    pub fn value_output(&self) -> OutputRef {
        self.value.output()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pars.is_empty()
    }

    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.is_variable
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        !self.is_variable
    }

    #[must_use]
    pub fn parameters(&self) -> &[GroupParameter] {
        &self.pars
    }

    #[must_use]
    pub fn names(&self) -> &[Box<str>] {
        &self.names
    }

    /// Pairs each parameter with its name, in the order the group was built (spec §4.9
    /// `Parameters.iteritems`).
    pub fn iteritems(&self) -> impl Iterator<Item = (&str, &GroupParameter)> {
        self.names.iter().map(AsRef::as_ref).zip(self.pars.iter())
    }

    /// Replaces every value in the shared array at once and taints every downstream consumer
    /// (spec §4.9; `Array::set`'s all-at-once replacement, generalized from
    /// `crate::parameter::Parameter::set_value`'s single-scalar case).
    pub fn set_values(&self, values: Vec<f64>) -> Result<(), ParamsError> {
        if values.len() != self.pars.len() {
            return Err(ParamsError::construction(format!(
                "Parameters::set_values: expected {} values, got {}",
                self.pars.len(),
                values.len()
            )));
        }
        Ok(self.value.set(values)?)
    }
}
