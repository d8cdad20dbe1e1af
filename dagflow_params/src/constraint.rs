// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Cholesky`], [`NormalizeCorrelatedVarsTwoWays`], and [`GaussianConstraint`] (spec §4.9),
//! grounded in `examples/original_source/dagflow/lib/linalg/cholesky.py` and
//! `.../lib/statistics/normalize_correlated_vars_two_ways.py`.
//!
//! The original `NormalizeCorrelatedVarsTwoWays` dispatches forward/backward on which `Input`
//! object called `taint()` (`_on_taint`'s `caller` parameter) — a shape this crate's
//! `NodeKernel::eval` has no equivalent for (`EvalContext` carries no "who tainted me" history,
//! by design: see `dagflow_core::graph`). The direction is resolved here the same way
//! [`crate::parameter::Parameter::set_value`] already resolves kernel-internal mutation: an
//! explicit setter (`set_value`/`set_normvalue`) records which side is authoritative before
//! tainting, rather than inferring it from graph structure. See `DESIGN.md` Open Questions.

use std::any::Any;

use dagflow_core::{
    DType, DagflowError, EvalContext, Graph, NodeId, NodeKernel, OutputRef, TypeFunctionContext,
};

use crate::error::ParamsError;
use crate::linalg;

/// A fixed, never-reconnected vector output, used for the constant matrices/central values a
/// `GaussianConstraint` builds at construction time (spec §4.9: "`central`, `sigma` (or a
/// `covariance` matrix)").
#[derive(Debug)]
struct VectorSource {
    data: Vec<f64>,
    shape: Vec<usize>,
}

impl NodeKernel for VectorSource {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        let out = ctx.outputs.get_index_mut(0).expect("VectorSource has exactly one output");
        out.descriptor_mut().set_dtype(DType::F64);
        out.descriptor_mut().set_shape(Some(self.shape.clone()));
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        let out = ctx.outputs.get_index_mut(0).expect("VectorSource has exactly one output");
        for (i, &v) in self.data.iter().enumerate() {
            out.seti(i, v, true);
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn vector_source_node(
    graph: &Graph,
    name: impl Into<Box<str>>,
    data: Vec<f64>,
    shape: Vec<usize>,
) -> Result<OutputRef, DagflowError> {
    let node = graph.add_node(name, Box::new(VectorSource { data, shape }))?;
    graph.add_output(node, "value", true, true)
}

/// `Cholesky`: `V = L L^T` for a square `n x n` matrix input, or elementwise `sqrt` for a
/// diagonal (1-D) input (spec §9 supplement (4), grounded in `cholesky.py`'s `_fcn_square` /
/// `_fcn_diagonal` dispatch on input rank).
#[derive(Debug)]
struct CholeskyKernel {
    n: usize,
    square: bool,
}

impl NodeKernel for CholeskyKernel {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        dagflow_core::typefunc::check_node_has_inputs(ctx.node, ctx.inputs)?;
        let (n, square) = dagflow_core::typefunc::check_inputs_are_matrices_or_diagonals(ctx.node, ctx.inputs)?;
        self.n = n;
        self.square = square;
        let shape = ctx.inputs[0].shape().expect("checked above").to_vec();
        let out = ctx.outputs.get_index_mut(0).expect("Cholesky has exactly one output");
        out.descriptor_mut().set_dtype(DType::F64);
        out.descriptor_mut().set_shape(Some(shape));
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        let input = ctx.inputs[0]
            .with_f64(<[f64]>::to_vec)
            .ok_or_else(|| DagflowError::Calculation {
                node: ctx.node,
                message: "matrix input is not bound".into(),
            })?;
        let l = if self.square {
            linalg::cholesky_lower(&input, self.n).map_err(|e| DagflowError::Calculation {
                node: ctx.node,
                message: format!("{e}"),
            })?
        } else {
            linalg::cholesky_diagonal(&input)
        };
        let out = ctx.outputs.get_index_mut(0).expect("Cholesky has exactly one output");
        for (i, v) in l.into_iter().enumerate() {
            out.seti(i, v, false);
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn alloc_format(shape: &[usize]) -> String {
    format!("matrix input must be 1-D (diagonal) or square 2-D, got {shape:?}")
}

/// Declares a `Cholesky` node over `matrix_output` (either a flat `n x n` covariance or an
/// `n`-long diagonal of variances) and returns its `L` output.
pub fn cholesky_node(
    graph: &Graph,
    name: impl Into<Box<str>>,
    matrix_output: OutputRef,
) -> Result<OutputRef, DagflowError> {
    let node = graph.add_node(name, Box::new(CholeskyKernel { n: 0, square: false }))?;
    let input = graph.add_input(node, "matrix", true, false)?;
    let output = graph.add_output(node, "l", true, true)?;
    graph.connect(matrix_output, input)?;
    Ok(output)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// `z = L^{-1}(x - mu)` forward / `x = L z + mu` backward (spec §9 supplement (5)). `matrix` is
/// either a lower-triangular Cholesky factor (`ndim == 2`) or a diagonal of standard deviations
/// (`ndim == 1`), matching [`CholeskyKernel`]'s two output shapes.
#[derive(Debug)]
struct NormalizeKernel {
    n: usize,
    square: bool,
    value: Vec<f64>,
    normvalue: Vec<f64>,
    direction: Direction,
}

impl NodeKernel for NormalizeKernel {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        dagflow_core::typefunc::require_all_resolved(ctx.node, ctx.inputs)?;
        let matrix_shape = ctx.inputs[0].shape().expect("checked above");
        let central_shape = ctx.inputs[1].shape().expect("checked above");
        let n = match matrix_shape {
            [n] => {
                self.square = false;
                *n
            }
            [n, m] if n == m => {
                self.square = true;
                *n
            }
            other => {
                return Err(DagflowError::TypeFunction {
                    node: ctx.node,
                    message: alloc_format(other),
                });
            }
        };
        if central_shape.len() != 1 || central_shape[0] != n {
            return Err(DagflowError::TypeFunction {
                node: ctx.node,
                message: format!(
                    "central shape {central_shape:?} does not match matrix dimension {n}"
                ),
            });
        }
        self.n = n;
        if self.value.len() != n {
            self.value = vec![0.0; n];
        }
        if self.normvalue.len() != n {
            self.normvalue = vec![0.0; n];
        }
        for out in ctx.outputs.iter_all_mut() {
            out.descriptor_mut().set_dtype(DType::F64);
            out.descriptor_mut().set_shape(Some(vec![n]));
        }
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        let matrix = ctx.inputs[0].with_f64(<[f64]>::to_vec).ok_or_else(|| {
            DagflowError::Calculation {
                node: ctx.node,
                message: "matrix input is not bound".into(),
            }
        })?;
        let central = ctx.inputs[1].with_f64(<[f64]>::to_vec).ok_or_else(|| {
            DagflowError::Calculation {
                node: ctx.node,
                message: "central input is not bound".into(),
            }
        })?;

        match self.direction {
            Direction::Forward => {
                let diff: Vec<f64> = self
                    .value
                    .iter()
                    .zip(&central)
                    .map(|(v, c)| v - c)
                    .collect();
                self.normvalue = if self.square {
                    linalg::solve_lower_triangular(&matrix, self.n, &diff)
                } else {
                    diff.iter().zip(&matrix).map(|(d, m)| d / m).collect()
                };
            }
            Direction::Backward => {
                let projected = if self.square {
                    linalg::matvec_lower(&matrix, self.n, &self.normvalue)
                } else {
                    self.normvalue
                        .iter()
                        .zip(&matrix)
                        .map(|(z, m)| z * m)
                        .collect()
                };
                self.value = projected
                    .iter()
                    .zip(&central)
                    .map(|(p, c)| p + c)
                    .collect();
            }
        }

        let value = self.value.clone();
        let normvalue = self.normvalue.clone();
        let value_out = ctx.outputs.get_index_mut(0).expect("value output present");
        for (i, v) in value.iter().enumerate() {
            value_out.seti(i, *v, false);
        }
        let normvalue_out = ctx.outputs.get_index_mut(1).expect("normvalue output present");
        for (i, v) in normvalue.iter().enumerate() {
            normvalue_out.seti(i, *v, false);
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Wraps a declared `NormalizeCorrelatedVarsTwoWays` node.
#[derive(Clone, Debug)]
pub struct NormalizeCorrelatedVarsTwoWays {
    graph: Graph,
    node: NodeId,
    n: usize,
    value_output: OutputRef,
    normvalue_output: OutputRef,
}

impl NormalizeCorrelatedVarsTwoWays {
    fn new(
        graph: &Graph,
        name: impl Into<Box<str>>,
        matrix_output: OutputRef,
        central_output: OutputRef,
        n: usize,
    ) -> Result<Self, ParamsError> {
        let kernel = NormalizeKernel {
            n: 0,
            square: false,
            value: Vec::new(),
            normvalue: Vec::new(),
            direction: Direction::Forward,
        };
        let node = graph.add_node(name, Box::new(kernel))?;
        let matrix_in = graph.add_input(node, "matrix", true, false)?;
        let central_in = graph.add_input(node, "central", true, false)?;
        let value_output = graph.add_output(node, "value", true, true)?;
        let normvalue_output = graph.add_output(node, "normvalue", true, true)?;
        graph.connect(matrix_output, matrix_in)?;
        graph.connect(central_output, central_in)?;
        Ok(Self {
            graph: graph.clone(),
            node,
            n,
            value_output,
            normvalue_output,
        })
    }

    #[must_use]
    pub fn value_output(&self) -> OutputRef {
        self.value_output
    }

    #[must_use]
    pub fn normvalue_output(&self) -> OutputRef {
        self.normvalue_output
    }

    /// Sets `value`, marking the forward direction (`normvalue` recomputed on next touch).
    pub fn set_value(&self, x: &[f64]) -> Result<(), ParamsError> {
        self.graph.with_kernel_mut(self.node, |kernel| {
            let k = kernel
                .as_any_mut()
                .downcast_mut::<NormalizeKernel>()
                .expect("wraps a NormalizeKernel");
            k.value = x.to_vec();
            k.direction = Direction::Forward;
        })?;
        self.graph.taint(self.node);
        Ok(())
    }

    /// Sets `normvalue`, marking the backward direction (`value` recomputed on next touch).
    pub fn set_normvalue(&self, z: &[f64]) -> Result<(), ParamsError> {
        self.graph.with_kernel_mut(self.node, |kernel| {
            let k = kernel
                .as_any_mut()
                .downcast_mut::<NormalizeKernel>()
                .expect("wraps a NormalizeKernel");
            k.normvalue = z.to_vec();
            k.direction = Direction::Backward;
        })?;
        self.graph.taint(self.node);
        Ok(())
    }

    pub fn value(&self) -> Result<Vec<f64>, ParamsError> {
        (0..self.n)
            .map(|i| self.graph.read(self.value_output, i).map_err(Into::into))
            .collect()
    }

    pub fn normvalue(&self) -> Result<Vec<f64>, ParamsError> {
        (0..self.n)
            .map(|i| self.graph.read(self.normvalue_output, i).map_err(Into::into))
            .collect()
    }
}

/// A Gaussian prior over a vector of correlated variables (spec §4.9): `central`, `sigma` or a
/// full `covariance`, and the `NormalizeCorrelatedVarsTwoWays` subgraph that projects to/from
/// normalized space.
#[derive(Clone, Debug)]
pub struct GaussianConstraint {
    normalize: NormalizeCorrelatedVarsTwoWays,
    central: Vec<f64>,
    sigma: Vec<f64>,
}

impl GaussianConstraint {
    /// Covariance-given path: builds a Cholesky node over `covariance` (flat row-major `n x n`).
    pub fn from_covariance(
        graph: &Graph,
        name: &str,
        central: Vec<f64>,
        covariance: Vec<f64>,
    ) -> Result<Self, ParamsError> {
        let n = central.len();
        if covariance.len() != n * n {
            return Err(ParamsError::construction(
                "covariance matrix size does not match the number of central values",
            ));
        }
        let sigma = (0..n).map(|i| covariance[i * n + i].sqrt()).collect();
        Self::build(graph, name, central, sigma, Some((covariance, n, n)))
    }

    /// Correlation + sigma path: derives the covariance as `diag(sigma) . C . diag(sigma)` before
    /// handing off to the same Cholesky construction as [`Self::from_covariance`].
    pub fn from_correlation(
        graph: &Graph,
        name: &str,
        central: Vec<f64>,
        sigma: Vec<f64>,
        correlation: Vec<f64>,
    ) -> Result<Self, ParamsError> {
        let n = central.len();
        if sigma.len() != n || correlation.len() != n * n {
            return Err(ParamsError::construction(
                "sigma/correlation sizes do not match the number of central values",
            ));
        }
        let covariance = linalg::covariance_from_correlation(&correlation, &sigma);
        Self::build(graph, name, central, sigma, Some((covariance, n, n)))
    }

    /// Sigma-only path: no cross-correlation, so the normalization matrix is the diagonal of
    /// `sigma` directly and no `Cholesky` node is built (spec §9 supplement (4)).
    pub fn from_sigma(graph: &Graph, name: &str, central: Vec<f64>, sigma: Vec<f64>) -> Result<Self, ParamsError> {
        if sigma.len() != central.len() {
            return Err(ParamsError::construction(
                "sigma size does not match the number of central values",
            ));
        }
        Self::build(graph, name, central, sigma, None)
    }

    fn build(
        graph: &Graph,
        name: &str,
        central: Vec<f64>,
        sigma: Vec<f64>,
        covariance: Option<(Vec<f64>, usize, usize)>,
    ) -> Result<Self, ParamsError> {
        let n = central.len();
        let central_output = vector_source_node(graph, format!("{name}.central"), central.clone(), vec![n])?;
        let matrix_output = match covariance {
            Some((covariance, rows, cols)) => {
                let v_output =
                    vector_source_node(graph, format!("{name}.covariance"), covariance, vec![rows, cols])?;
                cholesky_node(graph, format!("{name}.cholesky"), v_output)?
            }
            None => vector_source_node(graph, format!("{name}.sigma"), sigma.clone(), vec![n])?,
        };
        let normalize =
            NormalizeCorrelatedVarsTwoWays::new(graph, format!("{name}.normalize"), matrix_output, central_output, n)?;
        Ok(Self {
            normalize,
            central,
            sigma,
        })
    }

    #[must_use]
    pub fn central(&self) -> &[f64] {
        &self.central
    }

    #[must_use]
    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    #[must_use]
    pub fn value_output(&self) -> OutputRef {
        self.normalize.value_output()
    }

    #[must_use]
    pub fn normvalue_output(&self) -> OutputRef {
        self.normalize.normvalue_output()
    }

    pub fn set_value(&self, x: &[f64]) -> Result<(), ParamsError> {
        self.normalize.set_value(x)
    }

    pub fn set_normvalue(&self, z: &[f64]) -> Result<(), ParamsError> {
        self.normalize.set_normvalue(z)
    }

    pub fn value(&self) -> Result<Vec<f64>, ParamsError> {
        self.normalize.value()
    }

    pub fn normvalue(&self) -> Result<Vec<f64>, ParamsError> {
        self.normalize.normvalue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagflow_core::GraphOptions;

    #[test]
    fn sigma_only_constraint_normalizes_without_cholesky() {
        let g = Graph::new(GraphOptions::default());
        let gc = GaussianConstraint::from_sigma(&g, "x", vec![1.0, 2.0], vec![0.5, 4.0]).unwrap();
        g.close().unwrap();
        gc.set_value(&[1.5, 10.0]).unwrap();
        let z = gc.normvalue().unwrap();
        assert!((z[0] - 1.0).abs() < 1e-12);
        assert!((z[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn covariance_constraint_round_trips_through_cholesky() {
        let g = Graph::new(GraphOptions::default());
        // V = [[4, 2], [2, 3]]
        let gc = GaussianConstraint::from_covariance(
            &g,
            "y",
            vec![0.0, 0.0],
            vec![4.0, 2.0, 2.0, 3.0],
        )
        .unwrap();
        g.close().unwrap();
        gc.set_normvalue(&[1.0, -1.0]).unwrap();
        let x = gc.value().unwrap();
        gc.set_value(&x).unwrap();
        let z = gc.normvalue().unwrap();
        assert!((z[0] - 1.0).abs() < 1e-8);
        assert!((z[1] - (-1.0)).abs() < 1e-8);
    }

    #[test]
    fn correlation_and_sigma_path_matches_explicit_covariance() {
        let g1 = Graph::new(GraphOptions::default());
        let sigma = vec![2.0, 3.0];
        let correlation = vec![1.0, 0.5, 0.5, 1.0];
        let gc1 =
            GaussianConstraint::from_correlation(&g1, "c1", vec![0.0, 0.0], sigma.clone(), correlation.clone())
                .unwrap();
        g1.close().unwrap();

        let covariance = linalg::covariance_from_correlation(&correlation, &sigma);
        let g2 = Graph::new(GraphOptions::default());
        let gc2 = GaussianConstraint::from_covariance(&g2, "c2", vec![0.0, 0.0], covariance).unwrap();
        g2.close().unwrap();

        gc1.set_value(&[1.0, 1.0]).unwrap();
        gc2.set_value(&[1.0, 1.0]).unwrap();
        let z1 = gc1.normvalue().unwrap();
        let z2 = gc2.normvalue().unwrap();
        for (a, b) in z1.iter().zip(z2.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }
}
