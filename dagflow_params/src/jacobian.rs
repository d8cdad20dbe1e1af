// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Jacobian`]: finite-difference derivative node (spec §4.8), grounded in
//! `examples/original_source/dagflow/lib/calculus/jacobian.py`.
//!
//! Unlike every other kernel in this workspace, `Jacobian::eval` calls back into its own
//! [`Graph`] — perturbing a parameter then re-pulling the function output — from inside a single
//! `eval()` invocation. That is exactly the re-entrancy `dagflow_core::graph::Graph`'s per-node
//! `Rc<RefCell<Node>>` arena is built to allow: this node's own cell stays borrowed while the
//! parameter and function nodes (always *different* cells) are visited.
//!
//! The node also keeps a real `function`-named input bound to the watched output, even though
//! `eval` never reads that input's snapshot directly (it re-pulls through the graph instead).
//! That connection is what gets the function node's shape resolved before `Jacobian`'s own
//! `type_function` runs, via the ordinary topological-order guarantee `Graph::close` already
//! gives every other node (spec §4.8 calls `y` "a vector output", not an ad-hoc side reference).

use std::any::Any;

use dagflow_core::{DType, DagflowError, EvalContext, Graph, NodeId, NodeKernel, OutputRef, TypeFunctionContext};

use crate::error::ParamsError;
use crate::parameter::{AnyGaussianParameter, GaussianParameterLike};

const C1: f64 = 4.0 / 3.0;
const C2: f64 = 1.0 / 6.0;

fn dagflow_err(e: ParamsError) -> DagflowError {
    match e {
        ParamsError::Graph(e) => e,
        other => DagflowError::critical(std::format!("{other}")),
    }
}

/// Perturbs `param` by `delta` relative to `x0`, force-taints the watched function node, and
/// reads back `m` elements of its output (spec §4.8: "set the parameter's value output,
/// force-touch the upstream input to propagate taint").
fn do_step(
    graph: &Graph,
    function_output: OutputRef,
    param: &AnyGaussianParameter,
    x0: f64,
    delta: f64,
    m: usize,
) -> Result<std::vec::Vec<f64>, DagflowError> {
    param.set_value(x0 + delta).map_err(dagflow_err)?;
    graph.taint(function_output.node);
    let mut column = std::vec::Vec::with_capacity(m);
    for i in 0..m {
        column.push(graph.read(function_output, i)?);
    }
    Ok(column)
}

/// Immutable parameters of the node, kept separate from the [`Graph`] handle its `eval` needs
/// (see [`BoundJacobianKernel`]).
#[derive(Debug)]
struct JacobianKernel {
    function_output: OutputRef,
    parameters: std::vec::Vec<AnyGaussianParameter>,
    scale: f64,
}

/// The actual [`NodeKernel`]; holds a cloned [`Graph`] handle alongside [`JacobianKernel`]'s
/// static configuration so `eval` can re-enter the graph.
#[derive(Debug)]
struct BoundJacobianKernel {
    graph: Graph,
    inner: JacobianKernel,
}

impl NodeKernel for BoundJacobianKernel {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        dagflow_core::typefunc::require_all_resolved(ctx.node, ctx.inputs)?;
        let m = ctx.inputs[0].shape().expect("checked above")[0];
        let n = self.inner.parameters.len();
        let out = ctx.outputs.get_index_mut(0).expect("Jacobian has exactly one output");
        out.descriptor_mut().set_dtype(DType::F64);
        out.descriptor_mut().set_shape(Some(std::vec![m, n]));
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        if self.inner.parameters.is_empty() {
            return Err(DagflowError::Calculation {
                node: ctx.node,
                message: "jacobian has no declared parameters".into(),
            });
        }
        let (m, n) = {
            let out = ctx.outputs.get_index(0).expect("Jacobian has exactly one output");
            let shape = out.descriptor().shape().expect("resolved during close");
            (shape[0], shape[1])
        };

        let mut columns: std::vec::Vec<std::vec::Vec<f64>> = std::vec::Vec::with_capacity(n);
        for param in &self.inner.parameters {
            let sigma = param.sigma().map_err(dagflow_err)?;
            let x0 = param.value().map_err(dagflow_err)?;
            let delta = sigma * self.inner.scale;

            let y_plus_half = do_step(&self.graph, self.inner.function_output, param, x0, delta / 2.0, m)?;
            let y_minus_half = do_step(&self.graph, self.inner.function_output, param, x0, -delta / 2.0, m)?;
            let y_minus = do_step(&self.graph, self.inner.function_output, param, x0, -delta, m)?;
            let y_plus = do_step(&self.graph, self.inner.function_output, param, x0, delta, m)?;

            // Restore and retouch so the function node's cached value reflects the unperturbed
            // parameter again once the Jacobian is done with it (spec §4.8: "finally restore the
            // parameter and retouch").
            param.set_value(x0).map_err(dagflow_err)?;
            self.graph.taint(self.inner.function_output.node);
            let _ = self.graph.read(self.inner.function_output, 0)?;

            let mut column = std::vec::Vec::with_capacity(m);
            for i in 0..m {
                let d1 = y_plus_half[i] - y_minus_half[i];
                let d2 = y_minus[i] - y_plus[i];
                column.push((C1 / delta) * d1 + (C2 / delta) * d2);
            }
            columns.push(column);
        }

        let out = ctx.outputs.get_index_mut(0).expect("Jacobian has exactly one output");
        for (k, column) in columns.into_iter().enumerate() {
            for (i, value) in column.into_iter().enumerate() {
                out.seti(i * n + k, value, false);
            }
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A declared Jacobian node (spec §4.8): `m x n` matrix with columns `∂y/∂p_k . σ_k`, estimated
/// by a centered 4-point finite-difference stencil. Created `auto_freeze`: after one
/// [`Self::compute`] it freezes, so ordinary downstream reads are served from cache until the
/// next explicit `compute()`.
#[derive(Clone, Debug)]
pub struct Jacobian {
    graph: Graph,
    node: NodeId,
    output: OutputRef,
}

impl Jacobian {
    /// Declares a Jacobian of `function_output` with respect to `parameters`, in that order.
    /// `scale` multiplies each parameter's `sigma` to produce the stencil step `delta` (pass
    /// `1.0` for the spec's default).
    pub fn new(
        graph: &Graph,
        name: impl Into<std::boxed::Box<str>>,
        function_output: OutputRef,
        parameters: std::vec::Vec<AnyGaussianParameter>,
        scale: f64,
    ) -> Result<Self, ParamsError> {
        if parameters.is_empty() {
            return Err(ParamsError::EmptyParameterList);
        }
        let kernel = BoundJacobianKernel {
            graph: graph.clone(),
            inner: JacobianKernel {
                function_output,
                parameters,
                scale,
            },
        };
        let node = graph.add_node(name, std::boxed::Box::new(kernel))?;
        let function_input = graph.add_input(node, "function", true, false)?;
        let output = graph.add_output(node, "result", true, true)?;
        graph.connect(function_output, function_input)?;
        Ok(Self {
            graph: graph.clone(),
            node,
            output,
        })
    }

    #[must_use]
    pub fn output(&self) -> OutputRef {
        self.output
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Reads element `(row, col)` of the last-computed Jacobian, pulling the node up to date
    /// first.
    pub fn get(&self, row: usize, col: usize) -> Result<f64, ParamsError> {
        let shape = self.graph.output_shape(self.output)?;
        let n = shape
            .ok_or_else(|| ParamsError::matrix("jacobian shape is not resolved yet"))?[1];
        Ok(self.graph.read(self.output, row * n + col)?)
    }

    /// Forces a recompute even if the node is frozen (spec §4.8: "`compute()` unfreezes and
    /// recomputes on demand").
    pub fn compute(&self) -> Result<(), ParamsError> {
        log::debug!("recomputing jacobian node {}", self.node.index());
        self.graph.unfreeze(self.node)?;
        self.graph.taint(self.node);
        let _ = self.graph.read(self.output, 0)?;
        self.graph.freeze(self.node)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagflow_core::{DagflowError as DE, Graph as Gr, GraphOptions};

    use crate::parameter::GaussianParameter;

    /// `y = a^2 * x + b * x + c`, with `x` held as a fixed constant closed over by the kernel
    /// and `a`/`b`/`c` arriving as ordinary bound inputs (Scenario S4).
    #[derive(Debug)]
    struct AffineOfA {
        x: std::vec::Vec<f64>,
    }

    impl NodeKernel for AffineOfA {
        fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DE> {
            let out = ctx.outputs.get_index_mut(0).unwrap();
            out.descriptor_mut().set_dtype(DType::F64);
            out.descriptor_mut().set_shape(Some(std::vec![self.x.len()]));
            Ok(())
        }

        fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DE> {
            let a = ctx.inputs[0].with_f64(|s| s[0]).unwrap();
            let b = ctx.inputs[1].with_f64(|s| s[0]).unwrap();
            let c = ctx.inputs[2].with_f64(|s| s[0]).unwrap();
            let out = ctx.outputs.get_index_mut(0).unwrap();
            for (i, &xi) in self.x.iter().enumerate() {
                out.seti(i, a * a * xi + b * xi + c, false);
            }
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn jacobian_matches_analytic_derivative_for_a_quadratic_function() {
        let g = Gr::new(GraphOptions::default());
        let a = GaussianParameter::new(&g, "a", 2.3, 1e-3).unwrap();
        let b = GaussianParameter::new(&g, "b", -3.2, 1e-3).unwrap();
        let c = GaussianParameter::new(&g, "c", 1.1, 1e-3).unwrap();

        let x: std::vec::Vec<f64> = (0..10).map(|i| i as f64).collect();
        let f = g.add_node("f", Box::new(AffineOfA { x: x.clone() })).unwrap();
        let in_a = g.add_input(f, "a", true, false).unwrap();
        let in_b = g.add_input(f, "b", true, false).unwrap();
        let in_c = g.add_input(f, "c", true, false).unwrap();
        let f_out = g.add_output(f, "y", true, true).unwrap();
        g.connect(a.value_output(), in_a).unwrap();
        g.connect(b.value_output(), in_b).unwrap();
        g.connect(c.value_output(), in_c).unwrap();

        let jac = Jacobian::new(
            &g,
            "jac",
            f_out,
            std::vec![a.clone().into(), b.clone().into(), c.clone().into()],
            1.0,
        )
        .unwrap();

        g.close().unwrap();
        jac.compute().unwrap();

        for (i, &xi) in x.iter().enumerate() {
            let expected_da = 2.0 * 2.3 * xi;
            let got_da = jac.get(i, 0).unwrap();
            assert!((got_da - expected_da).abs() < 1e-3, "{got_da} vs {expected_da}");

            let expected_db = xi;
            let got_db = jac.get(i, 1).unwrap();
            assert!((got_db - expected_db).abs() < 1e-3);

            let got_dc = jac.get(i, 2).unwrap();
            assert!((got_dc - 1.0).abs() < 1e-3);
        }
    }
}
