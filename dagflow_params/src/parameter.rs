// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Parameter`] and the `GaussianParameter`/`NormalizedGaussianParameter` pair (spec §4.9),
//! grounded in `examples/original_source/dagflow/parameters/parameter.py` and
//! `gaussian_parameter.py`.
//!
//! Each `Parameter` owns a private single-element [`ScalarSource`] node rather than reaching
//! into someone else's output: the teacher's own leaf nodes (`execution_tape::reg_value`) are
//! likewise tiny one-purpose kernels rather than generic "settable cell" wrappers, so a settable
//! scalar gets its own small kernel here too.

use std::any::Any;

use dagflow_core::{
    DType, DagflowError, EvalContext, Graph, GraphOptions, NodeId, NodeKernel, OutputRef,
    TypeFunctionContext,
};

use crate::error::ParamsError;

/// A single settable `f64` scalar, shape `[1]` (spec §4.9 "a single element of an owned Output
/// buffer").
#[derive(Debug)]
pub(crate) struct ScalarSource {
    value: f64,
}

impl NodeKernel for ScalarSource {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        let out = ctx.outputs.get_index_mut(0).expect("ScalarSource has exactly one output");
        out.descriptor_mut().set_dtype(DType::F64);
        out.descriptor_mut().set_shape(Some(vec![1]));
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        let out = ctx.outputs.get_index_mut(0).expect("ScalarSource has exactly one output");
        out.seti(0, self.value, true);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A scalar view into a connectible Output (spec §4.9 `Parameter`). Reading/writing proxies a
/// single buffer element through the owning node's `seti`, which triggers standard taint
/// propagation to every downstream consumer.
#[derive(Clone, Debug)]
pub struct Parameter {
    graph: Graph,
    node: NodeId,
    output: OutputRef,
}

impl Parameter {
    /// Creates a new variable parameter node holding `initial`, closes nothing itself — the
    /// caller closes the graph once the whole model is wired (spec §4.4 two-phase close).
    pub fn new(graph: &Graph, name: impl Into<Box<str>>, initial: f64) -> Result<Self, ParamsError> {
        let node = graph.add_node(name, Box::new(ScalarSource { value: initial }))?;
        let output = graph.add_output(node, "value", true, true)?;
        Ok(Self {
            graph: graph.clone(),
            node,
            output,
        })
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn output(&self) -> OutputRef {
        self.output
    }

    /// Reads the current value, pulling the node up to date first (spec §4.9).
    pub fn value(&self) -> Result<f64, ParamsError> {
        Ok(self.graph.read(self.output, 0)?)
    }

    /// Sets the value in place and taints every downstream consumer (spec §4.9: "triggering
    /// standard taint").
    pub fn set_value(&self, value: f64) -> Result<(), ParamsError> {
        self.graph.with_kernel_mut(self.node, |kernel| {
            let src = kernel
                .as_any_mut()
                .downcast_mut::<ScalarSource>()
                .expect("Parameter always wraps a ScalarSource kernel");
            src.value = value;
        })?;
        self.graph.taint(self.node);
        log::debug!("parameter node {} set to {value}", self.node.index());
        Ok(())
    }
}

/// Common surface both [`GaussianParameter`] and [`NormalizedGaussianParameter`] expose to the
/// Jacobian/covariance layer (spec §4.8: "an ordered list of Gaussian parameters").
pub trait GaussianParameterLike {
    fn node(&self) -> NodeId;
    fn value(&self) -> Result<f64, ParamsError>;
    fn set_value(&self, value: f64) -> Result<(), ParamsError>;
    fn central(&self) -> Result<f64, ParamsError>;
    fn sigma(&self) -> Result<f64, ParamsError>;
    fn normvalue(&self) -> Result<f64, ParamsError>;
    fn set_normvalue(&self, value: f64) -> Result<(), ParamsError>;
}

/// A Parameter with a Gaussian prior: `central`, `sigma`, and an internal `normvalue`, each its
/// own settable scalar output (spec §4.9).
#[derive(Clone, Debug)]
pub struct GaussianParameter {
    value: Parameter,
    central: Parameter,
    sigma: Parameter,
    normvalue: Parameter,
}

impl GaussianParameter {
    pub fn new(
        graph: &Graph,
        name: &str,
        central: f64,
        sigma: f64,
    ) -> Result<Self, ParamsError> {
        let value = Parameter::new(graph, format!("{name}.value"), central)?;
        let central_p = Parameter::new(graph, format!("{name}.central"), central)?;
        let sigma_p = Parameter::new(graph, format!("{name}.sigma"), sigma)?;
        let normvalue = Parameter::new(graph, format!("{name}.normvalue"), 0.0)?;
        Ok(Self {
            value,
            central: central_p,
            sigma: sigma_p,
            normvalue,
        })
    }

    #[must_use]
    pub fn value_output(&self) -> OutputRef {
        self.value.output()
    }

    pub fn sigma_relative(&self) -> Result<f64, ParamsError> {
        Ok(self.sigma.value()? / self.central.value()?)
    }

    pub fn sigma_percent(&self) -> Result<f64, ParamsError> {
        Ok(self.sigma_relative()? * 100.0)
    }
}

impl GaussianParameterLike for GaussianParameter {
    fn node(&self) -> NodeId {
        self.value.node()
    }

    fn value(&self) -> Result<f64, ParamsError> {
        self.value.value()
    }

    fn set_value(&self, value: f64) -> Result<(), ParamsError> {
        self.value.set_value(value)
    }

    fn central(&self) -> Result<f64, ParamsError> {
        self.central.value()
    }

    fn sigma(&self) -> Result<f64, ParamsError> {
        self.sigma.value()
    }

    fn normvalue(&self) -> Result<f64, ParamsError> {
        self.normvalue.value()
    }

    fn set_normvalue(&self, value: f64) -> Result<(), ParamsError> {
        self.normvalue.set_value(value)
    }
}

/// A Gaussian parameter already expressed in normalized space: `central = 0`, `sigma = 1`, and
/// `normvalue` is simply an alias for `value` (spec §4.9: "`_norm_pars` ... project onto the
/// normalized space").
#[derive(Clone, Debug)]
pub struct NormalizedGaussianParameter {
    value: Parameter,
}

impl NormalizedGaussianParameter {
    pub fn new(graph: &Graph, name: &str) -> Result<Self, ParamsError> {
        let value = Parameter::new(graph, format!("{name}.normvalue"), 0.0)?;
        Ok(Self { value })
    }
}

impl GaussianParameterLike for NormalizedGaussianParameter {
    fn node(&self) -> NodeId {
        self.value.node()
    }

    fn value(&self) -> Result<f64, ParamsError> {
        self.value.value()
    }

    fn set_value(&self, value: f64) -> Result<(), ParamsError> {
        self.value.set_value(value)
    }

    fn central(&self) -> Result<f64, ParamsError> {
        Ok(0.0)
    }

    fn sigma(&self) -> Result<f64, ParamsError> {
        Ok(1.0)
    }

    fn normvalue(&self) -> Result<f64, ParamsError> {
        self.value.value()
    }

    fn set_normvalue(&self, value: f64) -> Result<(), ParamsError> {
        self.value.set_value(value)
    }
}

/// Either flavor of Gaussian parameter, so a [`crate::jacobian::Jacobian`] can hold one ordered
/// list regardless of whether its entries came from `Parameters._pars` or `_norm_pars`
/// (spec §4.9).
#[derive(Clone, Debug)]
pub enum AnyGaussianParameter {
    Gaussian(GaussianParameter),
    Normalized(NormalizedGaussianParameter),
}

impl GaussianParameterLike for AnyGaussianParameter {
    fn node(&self) -> NodeId {
        match self {
            Self::Gaussian(p) => p.node(),
            Self::Normalized(p) => p.node(),
        }
    }

    fn value(&self) -> Result<f64, ParamsError> {
        match self {
            Self::Gaussian(p) => p.value(),
            Self::Normalized(p) => p.value(),
        }
    }

    fn set_value(&self, value: f64) -> Result<(), ParamsError> {
        match self {
            Self::Gaussian(p) => p.set_value(value),
            Self::Normalized(p) => p.set_value(value),
        }
    }

    fn central(&self) -> Result<f64, ParamsError> {
        match self {
            Self::Gaussian(p) => p.central(),
            Self::Normalized(p) => p.central(),
        }
    }

    fn sigma(&self) -> Result<f64, ParamsError> {
        match self {
            Self::Gaussian(p) => p.sigma(),
            Self::Normalized(p) => p.sigma(),
        }
    }

    fn normvalue(&self) -> Result<f64, ParamsError> {
        match self {
            Self::Gaussian(p) => p.normvalue(),
            Self::Normalized(p) => p.normvalue(),
        }
    }

    fn set_normvalue(&self, value: f64) -> Result<(), ParamsError> {
        match self {
            Self::Gaussian(p) => p.set_normvalue(value),
            Self::Normalized(p) => p.set_normvalue(value),
        }
    }
}

impl From<GaussianParameter> for AnyGaussianParameter {
    fn from(p: GaussianParameter) -> Self {
        Self::Gaussian(p)
    }
}

impl From<NormalizedGaussianParameter> for AnyGaussianParameter {
    fn from(p: NormalizedGaussianParameter) -> Self {
        Self::Normalized(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_set_value_propagates_through_a_downstream_read() {
        let g = Graph::new(GraphOptions::default());
        let p = Parameter::new(&g, "x", 2.0).unwrap();
        g.close().unwrap();
        assert_eq!(p.value().unwrap(), 2.0);
        p.set_value(5.0).unwrap();
        assert_eq!(p.value().unwrap(), 5.0);
    }

    #[test]
    fn gaussian_parameter_tracks_central_and_sigma_independently_of_value() {
        let g = Graph::new(GraphOptions::default());
        let gp = GaussianParameter::new(&g, "a", 2.3, 0.1).unwrap();
        g.close().unwrap();
        assert_eq!(gp.central().unwrap(), 2.3);
        assert_eq!(gp.sigma().unwrap(), 0.1);
        gp.set_value(9.9).unwrap();
        assert_eq!(gp.value().unwrap(), 9.9);
        assert_eq!(gp.central().unwrap(), 2.3);
    }

    #[test]
    fn normalized_gaussian_parameter_aliases_normvalue_to_value() {
        let g = Graph::new(GraphOptions::default());
        let np = NormalizedGaussianParameter::new(&g, "z").unwrap();
        g.close().unwrap();
        assert_eq!(np.central().unwrap(), 0.0);
        assert_eq!(np.sigma().unwrap(), 1.0);
        np.set_value(1.5).unwrap();
        assert_eq!(np.normvalue().unwrap(), 1.5);
    }
}
