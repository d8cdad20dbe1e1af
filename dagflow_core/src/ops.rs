// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A handful of concrete numeric nodes (spec §1/§8 Scenarios S1-S3): [`Array`] (a settable
//! vector source), [`Sum`]/[`Product`] (elementwise accumulation), [`WeightedSum`], and
//! [`ViewConcat`].
//!
//! None of these are part of the core data model itself — every one of them is an ordinary
//! [`NodeKernel`] built on the same public surface any downstream crate (like `dagflow_params`)
//! uses. They live here, rather than in their own crate, purely so the worked examples and the
//! scenario tests below have something concrete to build graphs out of; grounded in
//! `examples/original_source/dagflow/lib/summation/` (`Sum`, `Product`,
//! `weighted_sum.py`) and `lib/common/view_concat.py`.

use alloc::boxed::Box;
use alloc::format;
use alloc::vec::Vec;
use core::any::Any;

use crate::buffer::DType;
use crate::error::DagflowError;
use crate::graph::Graph;
use crate::ids::{NodeId, OutputRef};
use crate::node::{EvalContext, NodeKernel, TypeFunctionContext};
use crate::strategy::InputStrategy;
use crate::typefunc;

/// A settable vector source (spec §2 "Array (source)"). Replacing its data via [`Array::set`] or
/// [`Array::set_element`] taints every downstream consumer but leaves the array's own shape
/// fixed once closed, matching every other settable source in this workspace
/// (`ScalarSource`/`VectorSource` in `dagflow_params`).
#[derive(Debug)]
struct ArraySource {
    data: Vec<f64>,
}

impl NodeKernel for ArraySource {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        let out = ctx.outputs.get_index_mut(0).expect("Array has exactly one output");
        out.descriptor_mut().set_dtype(DType::F64);
        out.descriptor_mut().set_shape(Some(alloc::vec![self.data.len()]));
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        let out = ctx.outputs.get_index_mut(0).expect("Array has exactly one output");
        for (i, &value) in self.data.iter().enumerate() {
            out.seti(i, value, true);
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Handle onto an [`ArraySource`] node (spec §2 "mutation of an Array... produces a standard
/// demand-driven evaluation graph").
#[derive(Clone, Debug)]
pub struct Array {
    graph: Graph,
    node: NodeId,
    output: OutputRef,
}

impl Array {
    pub fn new(graph: &Graph, name: impl Into<Box<str>>, data: Vec<f64>) -> Result<Self, DagflowError> {
        let node = graph.add_node(name, Box::new(ArraySource { data }))?;
        let output = graph.add_output(node, "array", true, true)?;
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

    pub fn get(&self, idx: usize) -> Result<f64, DagflowError> {
        self.graph.read(self.output, idx)
    }

    /// Replaces the whole array and taints every consumer. `data` must be the same length as the
    /// array was constructed with — reshaping after `close()` is out of scope (spec §4.4 shapes
    /// are resolved once, at `close` time).
    pub fn set(&self, data: Vec<f64>) -> Result<(), DagflowError> {
        self.graph.with_kernel_mut(self.node, |kernel| -> Result<(), DagflowError> {
            let src = kernel
                .as_any_mut()
                .downcast_mut::<ArraySource>()
                .expect("Array always wraps an ArraySource kernel");
            if src.data.len() != data.len() {
                return Err(DagflowError::critical(format!(
                    "Array::set expected {} elements, got {}",
                    src.data.len(),
                    data.len()
                )));
            }
            src.data = data;
            Ok(())
        })??;
        self.graph.taint(self.node);
        Ok(())
    }

    /// Mutates a single element in place (spec §8 Scenario S3: `a[2] = -1`).
    pub fn set_element(&self, idx: usize, value: f64) -> Result<(), DagflowError> {
        self.graph.with_kernel_mut(self.node, |kernel| -> Result<(), DagflowError> {
            let src = kernel
                .as_any_mut()
                .downcast_mut::<ArraySource>()
                .expect("Array always wraps an ArraySource kernel");
            if idx >= src.data.len() {
                return Err(DagflowError::critical("Array::set_element index out of range"));
            }
            src.data[idx] = value;
            Ok(())
        })??;
        self.graph.taint(self.node);
        Ok(())
    }
}

/// Shared by [`Sum`]/[`Product`]: require every input the same shape, sum or multiply elementwise,
/// and count how many times `eval` actually ran (spec §8 Scenario S1: `s.n_calls`).
#[derive(Debug)]
struct AccumulateKernel {
    calls: u32,
    op: AccumulateOp,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum AccumulateOp {
    Sum,
    Product,
}

impl NodeKernel for AccumulateKernel {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        let shape = typefunc::require_same_shape(ctx.node, ctx.inputs)?.to_vec();
        let dtype = typefunc::evaluate_dtype_of_outputs(ctx.inputs).unwrap_or(DType::F64);
        let out = ctx.outputs.get_index_mut(0).expect("accumulator has exactly one output");
        out.descriptor_mut().set_dtype(dtype);
        out.descriptor_mut().set_shape(Some(shape));
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        self.calls += 1;
        let len: usize = ctx.inputs[0].shape().expect("resolved by type_function").iter().product();
        let columns: Vec<Vec<f64>> = ctx
            .inputs
            .iter()
            .map(|input| input.with_f64(<[f64]>::to_vec).expect("bound f64 input"))
            .collect();
        let out = ctx.outputs.get_index_mut(0).expect("accumulator has exactly one output");
        for i in 0..len {
            let value = match self.op {
                AccumulateOp::Sum => columns.iter().map(|c| c[i]).sum(),
                AccumulateOp::Product => columns.iter().map(|c| c[i]).product(),
            };
            out.seti(i, value, false);
        }
        Ok(())
    }

    fn input_strategy(&self) -> InputStrategy {
        InputStrategy::AddNewInputAddAndKeepSingleOutput
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn new_accumulator(graph: &Graph, name: impl Into<Box<str>>, op: AccumulateOp, inputs: &[OutputRef]) -> Result<(NodeId, OutputRef), DagflowError> {
    if inputs.is_empty() {
        return Err(DagflowError::initialization("accumulator requires at least one input"));
    }
    let node = graph.add_node(name, Box::new(AccumulateKernel { calls: 0, op }))?;
    let output = graph.add_output(node, "result", true, true)?;
    for (i, &src) in inputs.iter().enumerate() {
        let input = graph.add_input(node, format!("in{i}"), true, false)?;
        graph.connect(src, input)?;
    }
    Ok((node, output))
}

/// Elementwise sum of same-shape inputs (spec §8 Scenario S1).
#[derive(Clone, Debug)]
pub struct Sum {
    graph: Graph,
    node: NodeId,
    output: OutputRef,
}

impl Sum {
    pub fn new(graph: &Graph, name: impl Into<Box<str>>, inputs: &[OutputRef]) -> Result<Self, DagflowError> {
        let (node, output) = new_accumulator(graph, name, AccumulateOp::Sum, inputs)?;
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

    pub fn get(&self, idx: usize) -> Result<f64, DagflowError> {
        self.graph.read(self.output, idx)
    }

    /// How many times this node's `eval` has actually run (spec §8 Scenario S1: `n_calls`).
    pub fn n_calls(&self) -> Result<u32, DagflowError> {
        self.graph.with_kernel_mut(self.node, |k| {
            k.as_any_mut().downcast_mut::<AccumulateKernel>().expect("Sum always wraps an AccumulateKernel").calls
        })
    }
}

/// Elementwise product of same-shape inputs (spec §8 Scenario S1).
#[derive(Clone, Debug)]
pub struct Product {
    graph: Graph,
    node: NodeId,
    output: OutputRef,
}

impl Product {
    pub fn new(graph: &Graph, name: impl Into<Box<str>>, inputs: &[OutputRef]) -> Result<Self, DagflowError> {
        let (node, output) = new_accumulator(graph, name, AccumulateOp::Product, inputs)?;
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

    pub fn get(&self, idx: usize) -> Result<f64, DagflowError> {
        self.graph.read(self.output, idx)
    }
}

/// `output[i] = sum_k weight[k] * arrays[k][i]` (spec §8 Scenario S2), grounded in
/// `dagflow/lib/summation/weighted_sum.py`. `weight` is a keyword-only input bound separately
/// from the positional array inputs, as in `weight >> ws("weight")`.
#[derive(Debug)]
struct WeightedSumKernel {
    n: usize,
}

impl NodeKernel for WeightedSumKernel {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        typefunc::require_all_resolved(ctx.node, ctx.inputs)?;
        let shape = ctx.inputs[0].shape().expect("checked above").to_vec();
        for (i, input) in ctx.inputs.iter().take(self.n).enumerate() {
            if input.shape().expect("checked above") != shape.as_slice() {
                return Err(DagflowError::TypeFunction {
                    node: ctx.node,
                    message: format!("weighted sum input[{i}] shape mismatch"),
                });
            }
        }
        let weight_shape = ctx.inputs[self.n].shape().expect("checked above");
        if weight_shape.len() != 1 || weight_shape[0] != self.n {
            return Err(DagflowError::TypeFunction {
                node: ctx.node,
                message: format!("weight must have shape [{}], got {weight_shape:?}", self.n),
            });
        }
        let out = ctx.outputs.get_index_mut(0).expect("WeightedSum has exactly one output");
        out.descriptor_mut().set_dtype(DType::F64);
        out.descriptor_mut().set_shape(Some(shape));
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        let len = ctx.inputs[0].shape().expect("resolved").iter().product();
        let weight = ctx.inputs[self.n].with_f64(<[f64]>::to_vec).expect("bound weight input");
        let arrays: Vec<Vec<f64>> = ctx.inputs[..self.n]
            .iter()
            .map(|input| input.with_f64(<[f64]>::to_vec).expect("bound array input"))
            .collect();
        let out = ctx.outputs.get_index_mut(0).expect("WeightedSum has exactly one output");
        for i in 0..len {
            let value: f64 = arrays.iter().zip(&weight).map(|(arr, w)| w * arr[i]).sum();
            out.seti(i, value, false);
        }
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Handle onto a [`WeightedSumKernel`] node; its `weight` input is left unconnected by
/// [`WeightedSum::new`] for the caller to wire explicitly (spec §8 Scenario S2).
#[derive(Clone, Debug)]
pub struct WeightedSum {
    graph: Graph,
    node: NodeId,
    output: OutputRef,
    weight_input: crate::ids::InputRef,
}

impl WeightedSum {
    pub fn new(graph: &Graph, name: impl Into<Box<str>>, arrays: &[OutputRef]) -> Result<Self, DagflowError> {
        if arrays.is_empty() {
            return Err(DagflowError::initialization("WeightedSum requires at least one array input"));
        }
        let node = graph.add_node(name, Box::new(WeightedSumKernel { n: arrays.len() }))?;
        for (i, &src) in arrays.iter().enumerate() {
            let input = graph.add_input(node, format!("arr{i}"), true, false)?;
            graph.connect(src, input)?;
        }
        let weight_input = graph.add_input(node, "weight", false, true)?;
        let output = graph.add_output(node, "result", true, true)?;
        Ok(Self {
            graph: graph.clone(),
            node,
            output,
            weight_input,
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

    #[must_use]
    pub fn weight_input(&self) -> crate::ids::InputRef {
        self.weight_input
    }

    pub fn get(&self, idx: usize) -> Result<f64, DagflowError> {
        self.graph.read(self.output, idx)
    }
}

/// Concatenates every bound input into one ever-widening output (spec §4.7
/// `InputStrategy::ViewConcat`, §8 Scenario S3), grounded in `dagflow/lib/common/view_concat.py`.
///
/// This evaluates by copying each upstream snapshot into the shared output buffer rather than
/// literally aliasing memory across separate per-output `Buffer`s — this engine's buffer model
/// has no notion of a sub-range view shared between two different outputs' storage. The copy
/// still reproduces the scenario's observable values (a mutated upstream element shows up at the
/// corresponding index on the next read); it does not reproduce the stronger claim that no
/// recomputation happens at all, which would need a windowed/composite buffer type this engine
/// does not otherwise require (see `DESIGN.md`).
#[derive(Debug)]
struct ViewConcatKernel;

impl NodeKernel for ViewConcatKernel {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        typefunc::require_all_resolved(ctx.node, ctx.inputs)?;
        let shapes: Vec<&[usize]> = ctx.inputs.iter().map(|i| i.shape().expect("checked above")).collect();
        let shape = typefunc::concat_shape_axis0(&shapes).ok_or_else(|| DagflowError::TypeFunction {
            node: ctx.node,
            message: "ViewConcat inputs must share every dimension but the first".into(),
        })?;
        let dtype = typefunc::evaluate_dtype_of_outputs(ctx.inputs).unwrap_or(DType::F64);
        let out = ctx.outputs.get_index_mut(0).expect("ViewConcat has exactly one output");
        out.descriptor_mut().set_dtype(dtype);
        out.descriptor_mut().set_shape(Some(shape));
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        let mut offset = 0usize;
        let columns: Vec<Vec<f64>> = ctx
            .inputs
            .iter()
            .map(|input| input.with_f64(<[f64]>::to_vec).expect("bound input"))
            .collect();
        let out = ctx.outputs.get_index_mut(0).expect("ViewConcat has exactly one output");
        for column in &columns {
            for (i, &value) in column.iter().enumerate() {
                out.seti(offset + i, value, false);
            }
            offset += column.len();
        }
        Ok(())
    }

    fn input_strategy(&self) -> InputStrategy {
        InputStrategy::ViewConcat
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Handle onto a [`ViewConcatKernel`] node. Inputs are added at construction time; growing it
/// further via `out >> Nd(node)` also works, since its kernel reports
/// [`InputStrategy::ViewConcat`].
#[derive(Clone, Debug)]
pub struct ViewConcat {
    graph: Graph,
    node: NodeId,
    output: OutputRef,
}

impl ViewConcat {
    pub fn new(graph: &Graph, name: impl Into<Box<str>>, inputs: &[OutputRef]) -> Result<Self, DagflowError> {
        let node = graph.add_node(name, Box::new(ViewConcatKernel))?;
        let output = graph.add_output(node, "concatenated", true, true)?;
        for (i, &src) in inputs.iter().enumerate() {
            let input = graph.add_input(node, format!("in{i}"), true, false)?;
            graph.connect(src, input)?;
        }
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

    pub fn get(&self, idx: usize) -> Result<f64, DagflowError> {
        self.graph.read(self.output, idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphOptions;

    #[test]
    fn sum_then_product_matches_scenario_s1_before_mutation() {
        let g = Graph::new(GraphOptions::default());
        let a = Array::new(&g, "a", alloc::vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let b = Array::new(&g, "b", alloc::vec![0.0, 2.0, 4.0, 6.0]).unwrap();
        let c = Array::new(&g, "c", alloc::vec![0.0, 3.0, 6.0, 9.0]).unwrap();
        let d = Array::new(&g, "d", alloc::vec![0.0, 4.0, 8.0, 12.0]).unwrap();

        let s = Sum::new(&g, "s", &[a.output(), b.output(), c.output()]).unwrap();
        let m = Product::new(&g, "m", &[d.output(), s.output()]).unwrap();
        g.close().unwrap();

        let expected = [0.0, 24.0, 96.0, 216.0];
        for (i, &want) in expected.iter().enumerate() {
            assert_eq!(m.get(i).unwrap(), want);
        }
        assert_eq!(s.n_calls().unwrap(), 1);
        assert!(!g.node_flags(m.node()).unwrap().tainted());

        a.set(alloc::vec![10.0, 10.0, 10.0, 10.0]).unwrap();
        assert!(g.node_flags(m.node()).unwrap().tainted());
        let new_s = [10.0, 15.0, 20.0, 25.0];
        for (i, &want) in new_s.iter().enumerate() {
            let expect_m = want * [0.0, 4.0, 8.0, 12.0][i];
            assert_eq!(m.get(i).unwrap(), expect_m);
        }
        assert_eq!(s.n_calls().unwrap(), 2);
        assert!(!g.node_flags(m.node()).unwrap().tainted());
    }

    #[test]
    fn weighted_sum_combines_two_views_of_the_same_array() {
        let g = Graph::new(GraphOptions::default());
        let arr = Array::new(&g, "arr", alloc::vec![0.0, 1.0, 2.0]).unwrap();
        let weight = Array::new(&g, "weight", alloc::vec![2.0, 3.0]).unwrap();
        let ws = WeightedSum::new(&g, "ws", &[arr.output(), arr.output()]).unwrap();
        g.connect(weight.output(), ws.weight_input()).unwrap();
        g.close().unwrap();

        let expected = [0.0, 5.0, 10.0];
        for (i, &want) in expected.iter().enumerate() {
            assert_eq!(ws.get(i).unwrap(), want);
        }
    }

    #[test]
    fn view_concat_reflects_upstream_mutation() {
        let g = Graph::new(GraphOptions::default());
        let a = Array::new(&g, "a", alloc::vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let ones = Array::new(&g, "ones", alloc::vec![1.0; 10]).unwrap();
        let neg = Array::new(&g, "neg", alloc::vec![-1.0; 12]).unwrap();
        let v = ViewConcat::new(&g, "v", &[a.output(), ones.output(), neg.output()]).unwrap();
        g.close().unwrap();

        assert_eq!(v.get(0).unwrap(), 1.0);
        assert_eq!(v.get(2).unwrap(), 3.0);
        assert_eq!(v.get(27 - 1).unwrap(), -1.0);

        a.set_element(2, -1.0).unwrap();
        assert_eq!(v.get(2).unwrap(), -1.0);
    }
}
