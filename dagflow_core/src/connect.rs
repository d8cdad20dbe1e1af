// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `out >> input` / `input << out` connection syntax (spec §4.5 Connection operators).
//!
//! Each wrapper holds a cloned [`Graph`] handle rather than a borrow, so `a.output(0) >>
//! b.input(0)` never needs two simultaneous `&mut Graph` borrows — the handle's `Rc<RefCell<_>>`
//! takes care of that internally. `Nd` additionally implements the "grow a new input on demand"
//! behaviour from [`crate::strategy::InputStrategy`] so `a >> b` works even when `b` has no free
//! positional input left.

use core::ops::Shr;

use crate::error::DagflowError;
use crate::graph::Graph;
use crate::ids::{InputRef, NodeId, OutputRef};
use crate::strategy::InputStrategy;

/// A single output, addressable with `>>` (spec §4.5 `Output.__rshift__`).
#[derive(Clone, Debug)]
pub struct Out {
    pub graph: Graph,
    pub output: OutputRef,
}

/// A single input, addressable with `<<` (spec §4.5 `Input.__lshift__`).
#[derive(Clone, Debug)]
pub struct In {
    pub graph: Graph,
    pub input: InputRef,
}

/// A whole node, connected to by its next free positional input (spec §4.5 `Node.__rshift__`,
/// the "grow a new input" entry point for [`InputStrategy`]).
#[derive(Clone, Debug)]
pub struct Nd {
    pub graph: Graph,
    pub node: NodeId,
}

impl Out {
    #[must_use]
    pub fn new(graph: Graph, output: OutputRef) -> Self {
        Self { graph, output }
    }
}

impl In {
    #[must_use]
    pub fn new(graph: Graph, input: InputRef) -> Self {
        Self { graph, input }
    }
}

impl Nd {
    #[must_use]
    pub fn new(graph: Graph, node: NodeId) -> Self {
        Self { graph, node }
    }

    /// Finds (or, per [`InputStrategy`], grows) the next input this node should receive a
    /// connection on. Does not itself open a new `ForBlock` scope — callers that want several
    /// grown inputs to share one output (Scenario S6) open the scope once, then call this
    /// repeatedly; [`Shr<Nd> for Out`] opens its own single-input scope around one call.
    pub(crate) fn next_input(&self) -> Result<InputRef, DagflowError> {
        let existing = self.graph.with_node(self.node, |n| {
            n.inputs()
                .iter_all()
                .position(|i| !i.is_bound())
                .map(|idx| InputRef::new(self.node, idx as u32))
        })?;
        if let Some(input) = existing {
            return Ok(input);
        }

        let strategy = self.graph.with_node(self.node, crate::node::Node::input_strategy)?;

        if let InputStrategy::Inherit { from } = &strategy {
            let target = self
                .graph
                .find_node_by_name(from)
                .ok_or_else(|| DagflowError::connection("Inherit strategy names an unknown node"))?;
            return Self::new(self.graph.clone(), target).next_input();
        }

        if !strategy.allows_growth() {
            return Err(DagflowError::connection(
                "node has no free input and its strategy forbids growing one",
            ));
        }

        let new_input = self
            .graph
            .add_input(self.node, alloc::format!("_grown_{}", grown_index(&self.graph, self.node)?), true, false)?;

        if strategy.grows_output_per_input() {
            self.graph
                .add_output(self.node, alloc::format!("_grown_out_{}", new_input.index), true, false)?;
        } else if matches!(strategy, InputStrategy::AddNewInputAddNewOutputForBlock) {
            let output_index = self.block_output_for_current_scope()?;
            self.graph.with_node_mut(self.node, |n| {
                n.inputs_mut()
                    .get_index_mut(new_input.index as usize)
                    .expect("just inserted")
                    .set_block_output(output_index);
            })?;
        } else if strategy.routes_into_existing_output() {
            let has_output = self.graph.with_node(self.node, |n| n.outputs().len_pos() > 0)?;
            if !has_output {
                return Err(DagflowError::connection(
                    "node's strategy routes grown inputs into an existing output, but it has none",
                ));
            }
            self.graph.with_node_mut(self.node, |n| {
                let out_index = n.outputs().positional_indices()[0] as u32;
                n.inputs_mut()
                    .get_index_mut(new_input.index as usize)
                    .expect("just inserted")
                    .set_block_output(out_index);
            })?;
        } else if let Some(n_per_group) = strategy.n_inputs_per_output() {
            let output_index = self.output_for_n_group(n_per_group)?;
            self.graph.with_node_mut(self.node, |n| {
                n.inputs_mut()
                    .get_index_mut(new_input.index as usize)
                    .expect("just inserted")
                    .set_block_output(output_index);
            })?;
        }
        Ok(new_input)
    }

    /// The output index the current [`InputStrategy::AddNewInputAddNewOutputForNInputs`] group
    /// should route into, minting a fresh output every `n` inputs and otherwise returning the
    /// still-filling group's output (spec §4.3).
    fn output_for_n_group(&self, n: u32) -> Result<u32, DagflowError> {
        let state = self.graph.with_node(self.node, |node| node.ngroup_state)?;
        if let Some((out_index, filled)) = state {
            if filled < n {
                self.graph
                    .with_node_mut(self.node, |node| node.ngroup_state = Some((out_index, filled + 1)))?;
                return Ok(out_index);
            }
        }
        let out = self
            .graph
            .add_output(self.node, alloc::format!("_ngroup_out_{}", grown_index(&self.graph, self.node)?), true, false)?;
        self.graph
            .with_node_mut(self.node, |node| node.ngroup_state = Some((out.index, 1)))?;
        Ok(out.index)
    }

    /// The output index the current scope should grow its inputs into, minting a fresh output
    /// the first time a given scope asks (spec §9 supplement, Scenario S6).
    fn block_output_for_current_scope(&self) -> Result<u32, DagflowError> {
        let (scope, existing) = self.graph.with_node(self.node, |n| (n.scope_id, n.scope_output))?;
        if let Some((s, idx)) = existing {
            if s == scope {
                return Ok(idx);
            }
        }
        let out = self
            .graph
            .add_output(self.node, alloc::format!("_block_out_{scope}"), true, false)?;
        self.graph
            .with_node_mut(self.node, |n| n.scope_output = Some((scope, out.index)))?;
        Ok(out.index)
    }
}

fn grown_index(graph: &Graph, node: NodeId) -> Result<usize, DagflowError> {
    graph.with_node(node, |n| n.inputs().len_all())
}

/// Opens a fresh `ForBlock` scope on `node` if (and only if) its kernel actually uses that
/// strategy; a no-op counter bump otherwise.
fn open_scope_if_block_strategy(graph: &Graph, node: NodeId) -> Result<(), DagflowError> {
    graph.with_node_mut(node, |n| {
        if matches!(n.input_strategy(), InputStrategy::AddNewInputAddNewOutputForBlock) {
            n.open_input_scope();
        }
    })
}

/// `output >> input`: connects a specific output to a specific input.
impl Shr<In> for Out {
    type Output = Result<(), DagflowError>;

    fn shr(self, rhs: In) -> Self::Output {
        self.graph.connect(self.output, rhs.input)
    }
}

/// `output >> node`: connects into the node's next free (or newly grown) input. Each such call is
/// its own `ForBlock` scope (one grown input, one grown output); to group several connections
/// into one shared output, use the tuple form below (Scenario S6).
impl Shr<Nd> for Out {
    type Output = Result<InputRef, DagflowError>;

    fn shr(self, rhs: Nd) -> Self::Output {
        open_scope_if_block_strategy(&rhs.graph, rhs.node)?;
        let input = rhs.next_input()?;
        self.graph.connect(self.output, input)?;
        Ok(input)
    }
}

/// `(a, b, c) >> node`: connects three outputs into `node` as one `ForBlock` group, so all three
/// grown inputs share a single grown output (spec §9 supplement, Scenario S6).
impl Shr<Nd> for (Out, Out, Out) {
    type Output = Result<[InputRef; 3], DagflowError>;

    fn shr(self, rhs: Nd) -> Self::Output {
        open_scope_if_block_strategy(&rhs.graph, rhs.node)?;
        let a = rhs.next_input()?;
        self.0.graph.connect(self.0.output, a)?;
        let b = rhs.next_input()?;
        self.1.graph.connect(self.1.output, b)?;
        let c = rhs.next_input()?;
        self.2.graph.connect(self.2.output, c)?;
        Ok([a, b, c])
    }
}

/// `a >> b`: connects `a`'s sole/primary output into `b`'s next free input.
impl Shr<Nd> for Nd {
    type Output = Result<InputRef, DagflowError>;

    fn shr(self, rhs: Nd) -> Self::Output {
        let output = self.graph.with_node(self.node, |n| {
            n.outputs()
                .positional_index_at(0)
                .map(|_| OutputRef::new(self.node, n.outputs().positional_indices()[0] as u32))
        })?;
        let output = output.ok_or_else(|| DagflowError::connection("node has no positional output"))?;
        let input = rhs.next_input()?;
        self.graph.connect(output, input)?;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphOptions;
    use crate::node::{EvalContext, NodeKernel, TypeFunctionContext};
    use alloc::boxed::Box;

    #[derive(Debug)]
    struct PassThrough;
    impl NodeKernel for PassThrough {
        fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            crate::typefunc::copy_input_zero_to_outputs(ctx.node, ctx.inputs, ctx.outputs)
        }
        fn eval(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn input_strategy(&self) -> InputStrategy {
            InputStrategy::AddNewInput
        }
        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    #[test]
    fn shr_connects_output_to_input_directly() {
        let g = Graph::new(GraphOptions::default());
        let a = g.add_node("a", Box::new(PassThrough)).unwrap();
        let a_out = g.add_output(a, "out", true, true).unwrap();
        let b = g.add_node("b", Box::new(PassThrough)).unwrap();
        let b_in = g.add_input(b, "in", true, true).unwrap();

        let out = Out::new(g.clone(), a_out);
        let inp = In::new(g.clone(), b_in);
        (out >> inp).unwrap();

        assert!(g.with_node(b, |n| n.inputs().get_index(0).unwrap().is_bound()).unwrap());
    }

    #[test]
    fn shr_into_node_grows_an_input_when_none_is_free() {
        let g = Graph::new(GraphOptions::default());
        let a = g.add_node("a", Box::new(PassThrough)).unwrap();
        let a_out = g.add_output(a, "out", true, true).unwrap();
        let b = g.add_node("b", Box::new(PassThrough)).unwrap();

        let nd = Nd::new(g.clone(), b);
        let first = (Out::new(g.clone(), a_out) >> nd.clone()).unwrap();
        assert_eq!(first.index, 0);

        let second = (Out::new(g.clone(), a_out) >> nd).unwrap();
        assert_eq!(second.index, 1);
    }

    #[derive(Debug)]
    struct KeepSingleOutput;
    impl NodeKernel for KeepSingleOutput {
        fn type_function(&mut self, _ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn eval(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn input_strategy(&self) -> InputStrategy {
            InputStrategy::AddNewInputAddAndKeepSingleOutput
        }
        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    #[test]
    fn keep_single_output_routes_every_grown_input_into_the_one_output() {
        let g = Graph::new(GraphOptions::default());
        let acc = g.add_node("acc", Box::new(KeepSingleOutput)).unwrap();
        g.add_output(acc, "out", true, true).unwrap();
        let a = g.add_node("a", Box::new(PassThrough)).unwrap();
        let a_out = g.add_output(a, "out", true, true).unwrap();

        let nd = Nd::new(g.clone(), acc);
        let first = (Out::new(g.clone(), a_out) >> nd.clone()).unwrap();
        let second = (Out::new(g.clone(), a_out) >> nd).unwrap();

        let blocks = g
            .with_node(acc, |n| {
                (
                    n.inputs().get_index(first.index as usize).unwrap().block_output(),
                    n.inputs().get_index(second.index as usize).unwrap().block_output(),
                )
            })
            .unwrap();
        assert_eq!(blocks.0, blocks.1);
        assert!(blocks.0.is_some());
    }

    #[test]
    fn keep_single_output_refuses_growth_with_no_output_yet() {
        let g = Graph::new(GraphOptions::default());
        let acc = g.add_node("acc", Box::new(KeepSingleOutput)).unwrap();
        let nd = Nd::new(g.clone(), acc);
        assert!(nd.next_input().is_err());
    }

    #[derive(Debug)]
    struct NGroup;
    impl NodeKernel for NGroup {
        fn type_function(&mut self, _ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn eval(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn input_strategy(&self) -> InputStrategy {
            InputStrategy::AddNewInputAddNewOutputForNInputs { n: 2 }
        }
        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    #[test]
    fn n_group_strategy_shares_one_output_per_n_inputs() {
        let g = Graph::new(GraphOptions::default());
        let node = g.add_node("pairs", Box::new(NGroup)).unwrap();
        let a = g.add_node("a", Box::new(PassThrough)).unwrap();
        let a_out = g.add_output(a, "out", true, true).unwrap();

        let nd = Nd::new(g.clone(), node);
        let i0 = (Out::new(g.clone(), a_out) >> nd.clone()).unwrap();
        let i1 = (Out::new(g.clone(), a_out) >> nd.clone()).unwrap();
        let i2 = (Out::new(g.clone(), a_out) >> nd).unwrap();

        let outs = g
            .with_node(node, |n| {
                [
                    n.inputs().get_index(i0.index as usize).unwrap().block_output(),
                    n.inputs().get_index(i1.index as usize).unwrap().block_output(),
                    n.inputs().get_index(i2.index as usize).unwrap().block_output(),
                ]
            })
            .unwrap();
        assert_eq!(outs[0], outs[1]);
        assert_ne!(outs[0], outs[2]);
    }

    #[derive(Debug)]
    struct Inheriting {
        from: alloc::boxed::Box<str>,
    }
    impl NodeKernel for Inheriting {
        fn type_function(&mut self, _ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn eval(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn input_strategy(&self) -> InputStrategy {
            InputStrategy::Inherit { from: self.from.clone() }
        }
        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    #[test]
    fn inherit_strategy_redirects_growth_to_the_named_node() {
        let g = Graph::new(GraphOptions::default());
        let target = g.add_node("target", Box::new(PassThrough)).unwrap();
        let wrapper = g
            .add_node(
                "wrapper",
                Box::new(Inheriting {
                    from: "target".into(),
                }),
            )
            .unwrap();
        let a = g.add_node("a", Box::new(PassThrough)).unwrap();
        let a_out = g.add_output(a, "out", true, true).unwrap();

        let nd = Nd::new(g.clone(), wrapper);
        let grown = (Out::new(g.clone(), a_out) >> nd).unwrap();
        assert_eq!(grown.node, target);
    }
}
