// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`CovarianceMatrixGroup`] (spec §4.8), grounded in
//! `examples/original_source/tests/lib/statistics/test_CovarianceMatrixGroup.py` and
//! `dagflow/lib/statistics/covariance_matrix_group.py`.
//!
//! Scoped to the normalized-parameter case (`V_y = J . J^T`, spec §4.8 "when parameters are
//! already normalized"): every parameter group fed to [`CovarianceMatrixGroup::add_covariance_for`]
//! is expected to be in normalized space already, which is the case the original test exercises
//! via `pars.norm_parameters`. The general `J . V_p . J^T` path for non-normalized parameters is
//! already available directly through [`crate::linalg::sandwich`] plus a bare [`Jacobian`]; this
//! type does not additionally wrap it, since nothing in this crate yet needs a grouped, named
//! version of it (see `DESIGN.md`).

use std::collections::{HashMap, HashSet};

use dagflow_core::{DagflowError, Graph, NodeId, OutputRef};

use crate::error::ParamsError;
use crate::jacobian::Jacobian;
use crate::linalg;
use crate::parameter::{AnyGaussianParameter, GaussianParameterLike};

/// One named Jacobian block: possibly several parameter groups sharing a name (spec §4.8:
/// "`add_covariance_for`... `[pars.norm_parameters[:2]]`" takes a list of groups).
#[derive(Debug)]
struct Block {
    jacobians: Vec<Jacobian>,
}

/// Manages multiple named parameter blocks against one function output, each contributing a
/// Jacobian and a systematic covariance, with an optional combined sum across blocks and
/// duplicate-parameter detection.
#[derive(Debug)]
pub struct CovarianceMatrixGroup {
    graph: Graph,
    function_output: OutputRef,
    ignore_duplicated_parameters: bool,
    blocks: HashMap<Box<str>, Block>,
    seen_parameters: HashSet<NodeId>,
    sum_blocks: Option<Vec<Box<str>>>,
}

impl CovarianceMatrixGroup {
    #[must_use]
    pub fn new(graph: &Graph, function_output: OutputRef, ignore_duplicated_parameters: bool) -> Self {
        Self {
            graph: graph.clone(),
            function_output,
            ignore_duplicated_parameters,
            blocks: HashMap::new(),
            seen_parameters: HashSet::new(),
            sum_blocks: None,
        }
    }

    /// Declares a named block built from one Jacobian per entry of `parameter_groups` (spec §4.8:
    /// "per-block Jacobians"). Rejects a block name already in use, and — unless the group was
    /// constructed with `ignore_duplicated_parameters`, — rejects any parameter already claimed
    /// by a previous block (spec §4.8: "duplicate-parameter detection to avoid double-counting").
    pub fn add_covariance_for(
        &mut self,
        name: &str,
        parameter_groups: Vec<Vec<AnyGaussianParameter>>,
    ) -> Result<(), ParamsError> {
        if self.blocks.contains_key(name) {
            return Err(ParamsError::construction(format!(
                "a covariance block named {name:?} already exists"
            )));
        }
        if !self.ignore_duplicated_parameters {
            for group in &parameter_groups {
                for param in group {
                    if !self.seen_parameters.insert(param.node()) {
                        return Err(ParamsError::construction(format!(
                            "parameter already claimed by another covariance block, cannot add to {name:?}"
                        )));
                    }
                }
            }
        }
        let mut jacobians = Vec::with_capacity(parameter_groups.len());
        for (i, group) in parameter_groups.into_iter().enumerate() {
            let jac = Jacobian::new(&self.graph, format!("{name}.jac{i}"), self.function_output, group, 1.0)?;
            jacobians.push(jac);
        }
        self.blocks.insert(name.into(), Block { jacobians });
        Ok(())
    }

    /// Systematic covariance for one named block: the sum over its Jacobians of `J . J^T` (spec
    /// §4.8 `compute_covariance_matrix`, normalized case).
    pub fn covariance_for(&self, name: &str) -> Result<Vec<f64>, ParamsError> {
        let block = self
            .blocks
            .get(name)
            .ok_or_else(|| ParamsError::construction(format!("no such covariance block {name:?}")))?;
        let mut total: Option<Vec<f64>> = None;
        for jac in &block.jacobians {
            jac.compute()?;
            let (m, n) = jacobian_shape(&self.graph, jac)?;
            let flat = read_matrix(&self.graph, jac, m, n)?;
            let cov = linalg::self_outer(&flat, m, n);
            total = Some(match total {
                None => cov,
                Some(acc) => acc.iter().zip(cov.iter()).map(|(a, b)| a + b).collect(),
            });
        }
        total.ok_or_else(|| ParamsError::EmptyParameterList)
    }

    /// Marks `name` as the target combining every block added so far (spec §4.8 "a sum of
    /// systematic covariances"). May be called only once.
    pub fn add_covariance_sum(&mut self, name: &str) -> Result<(), ParamsError> {
        if self.sum_blocks.is_some() {
            return Err(ParamsError::construction(
                "add_covariance_sum may only be called once per group",
            ));
        }
        self.sum_blocks = Some(self.blocks.keys().cloned().collect());
        let _ = name;
        Ok(())
    }

    /// Total systematic covariance across every block named at [`Self::add_covariance_sum`] time.
    pub fn covariance_sum(&self) -> Result<Vec<f64>, ParamsError> {
        let names = self
            .sum_blocks
            .as_ref()
            .ok_or_else(|| ParamsError::construction("add_covariance_sum was never called"))?;
        let mut total: Option<Vec<f64>> = None;
        for name in names {
            let cov = self.covariance_for(name)?;
            total = Some(match total {
                None => cov,
                Some(acc) => acc.iter().zip(cov.iter()).map(|(a, b)| a + b).collect(),
            });
        }
        total.ok_or_else(|| ParamsError::construction("no blocks to sum"))
    }

    /// Forces every Jacobian in every block to recompute (spec §4.8 test: "`cm.update_matrices()`
    /// after tainting").
    pub fn update_matrices(&self) -> Result<(), ParamsError> {
        for block in self.blocks.values() {
            for jac in &block.jacobians {
                jac.compute()?;
            }
        }
        Ok(())
    }
}

fn jacobian_shape(graph: &Graph, jac: &Jacobian) -> Result<(usize, usize), ParamsError> {
    let shape = graph
        .output_shape(jac.output())?
        .ok_or_else(|| ParamsError::matrix("jacobian shape is not resolved yet"))?;
    Ok((shape[0], shape[1]))
}

fn read_matrix(graph: &Graph, jac: &Jacobian, m: usize, n: usize) -> Result<Vec<f64>, ParamsError> {
    let mut flat = Vec::with_capacity(m * n);
    for row in 0..m {
        for col in 0..n {
            flat.push(jac.get(row, col)?);
        }
    }
    Ok(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagflow_core::{DType, EvalContext, GraphOptions, NodeKernel, TypeFunctionContext};
    use std::any::Any;

    use crate::parameter::GaussianParameter;

    #[derive(Debug)]
    struct Affine {
        x: Vec<f64>,
    }

    impl NodeKernel for Affine {
        fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            let out = ctx.outputs.get_index_mut(0).unwrap();
            out.descriptor_mut().set_dtype(DType::F64);
            out.descriptor_mut().set_shape(Some(vec![self.x.len()]));
            Ok(())
        }

        fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            let a = ctx.inputs[0].with_f64(|s| s[0]).unwrap();
            let b = ctx.inputs[1].with_f64(|s| s[0]).unwrap();
            let out = ctx.outputs.get_index_mut(0).unwrap();
            for (i, &xi) in self.x.iter().enumerate() {
                out.seti(i, a * xi + b, false);
            }
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn duplicate_parameter_across_blocks_is_rejected_unless_ignored() {
        let g = Graph::new(GraphOptions::default());
        let a = GaussianParameter::new(&g, "a", 1.0, 0.1).unwrap();
        let b = GaussianParameter::new(&g, "b", 0.0, 0.1).unwrap();
        let x: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let f = g.add_node("f", Box::new(Affine { x: x.clone() })).unwrap();
        let in_a = g.add_input(f, "a", true, false).unwrap();
        let in_b = g.add_input(f, "b", true, false).unwrap();
        let f_out = g.add_output(f, "y", true, true).unwrap();
        g.connect(a.value_output(), in_a).unwrap();
        g.connect(b.value_output(), in_b).unwrap();

        let mut cm = CovarianceMatrixGroup::new(&g, f_out, false);
        cm.add_covariance_for("ab", vec![vec![a.clone().into(), b.clone().into()]])
            .unwrap();
        let err = cm.add_covariance_for("a-again", vec![vec![a.clone().into()]]);
        assert!(err.is_err());
    }

    #[test]
    fn covariance_sum_combines_every_declared_block() {
        let g = Graph::new(GraphOptions::default());
        let a = GaussianParameter::new(&g, "a", 2.0, 0.5).unwrap();
        let b = GaussianParameter::new(&g, "b", -1.0, 0.2).unwrap();
        let x: Vec<f64> = (0..5).map(|i| i as f64).collect();
        let f = g.add_node("f", Box::new(Affine { x: x.clone() })).unwrap();
        let in_a = g.add_input(f, "a", true, false).unwrap();
        let in_b = g.add_input(f, "b", true, false).unwrap();
        let f_out = g.add_output(f, "y", true, true).unwrap();
        g.connect(a.value_output(), in_a).unwrap();
        g.connect(b.value_output(), in_b).unwrap();
        g.close().unwrap();

        let mut cm = CovarianceMatrixGroup::new(&g, f_out, true);
        cm.add_covariance_for("a", vec![vec![a.clone().into()]]).unwrap();
        cm.add_covariance_for("b", vec![vec![b.clone().into()]]).unwrap();
        cm.add_covariance_sum("total").unwrap();

        let cov_a = cm.covariance_for("a").unwrap();
        let cov_b = cm.covariance_for("b").unwrap();
        let total = cm.covariance_sum().unwrap();
        for i in 0..total.len() {
            assert!((total[i] - (cov_a[i] + cov_b[i])).abs() < 1e-8);
        }
        assert!(cm.add_covariance_sum("again").is_err());
    }
}
