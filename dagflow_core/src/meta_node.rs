// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`MetaNode`]: a facade exposing selected ports of several inner nodes as if they belonged to
//! one node (spec §4.11), grounded in
//! `examples/original_source/dagflow/core/meta_node.py`.
//!
//! A `MetaNode` owns no ports of its own; [`ExposedInput`]/[`ExposedOutput`] are thin named
//! aliases resolving to a real [`InputRef`]/[`OutputRef`] elsewhere in the same [`Graph`], so
//! connecting through a `MetaNode` is exactly connecting through the port it names.
//!
//! [`MetaNodeStrategy`] governs what happens when the facade itself is asked to grow a new
//! positional input: `LeadingNode` grows one on a designated member, `NewNode` fabricates a fresh
//! member node per call, `Disable` refuses outright (mirrors the Python `_call_leading_node`/
//! `_call_new_node`/`_call_disabled` trio).

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::ToString;
use alloc::vec::Vec;

use crate::connect::{In, Nd, Out};
use crate::error::DagflowError;
use crate::graph::Graph;
use crate::ids::{InputRef, NodeId, OutputRef};
use crate::port::{Named, PortContainer};

#[derive(Clone, Debug)]
pub struct ExposedInput {
    name: Box<str>,
    target: InputRef,
}

impl Named for ExposedInput {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Debug)]
pub struct ExposedOutput {
    name: Box<str>,
    target: OutputRef,
}

impl Named for ExposedOutput {
    fn name(&self) -> &str {
        &self.name
    }
}

/// How a [`MetaNode`] reacts to being asked for a new positional input it has no room for
/// (spec §4.11 `MetaNodeStrategies`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetaNodeStrategy {
    /// Grow the input on the first member added (the "leading" node).
    LeadingNode,
    /// Construct a brand-new member node (via [`MetaNode::with_new_node_factory`]) per call.
    NewNode,
    /// Refuse; this facade's arity is fixed.
    Disable,
}

type NodeFactory = Rc<dyn Fn(&Graph, usize) -> Result<NodeId, DagflowError>>;

/// A named group of inner nodes, exposing a subset of their ports as its own (spec §4.11).
#[derive(Clone)]
pub struct MetaNode {
    graph: Graph,
    members: Vec<NodeId>,
    inputs: PortContainer<ExposedInput>,
    outputs: PortContainer<ExposedOutput>,
    strategy: MetaNodeStrategy,
    leading_node: Option<NodeId>,
    /// The member whose positional inputs were imported with [`Self::import_pos_inputs`], if any;
    /// a second import is refused the same way the Python `_node_inputs_pos` guard refuses it.
    node_inputs_pos: Option<NodeId>,
    node_outputs_pos: Option<NodeId>,
    new_node_factory: Option<NodeFactory>,
}

impl core::fmt::Debug for MetaNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MetaNode")
            .field("members", &self.members)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("strategy", &self.strategy)
            .field("leading_node", &self.leading_node)
            .finish()
    }
}

impl MetaNode {
    #[must_use]
    pub fn new(graph: Graph, strategy: MetaNodeStrategy) -> Self {
        Self {
            graph,
            members: Vec::new(),
            inputs: PortContainer::new(),
            outputs: PortContainer::new(),
            strategy,
            leading_node: None,
            node_inputs_pos: None,
            node_outputs_pos: None,
            new_node_factory: None,
        }
    }

    /// Installs the factory [`MetaNodeStrategy::NewNode`] calls to fabricate a fresh member
    /// (spec §4.11 `new_node_cls`); `idx` is the member's ordinal, for disambiguating names.
    #[must_use]
    pub fn with_new_node_factory(
        mut self,
        factory: impl Fn(&Graph, usize) -> Result<NodeId, DagflowError> + 'static,
    ) -> Self {
        self.new_node_factory = Some(Rc::new(factory));
        self
    }

    /// Adds `node` as a member; under [`MetaNodeStrategy::LeadingNode`] the first member added
    /// becomes the leading node (spec §4.11 `_add_node`).
    pub fn add_member(&mut self, node: NodeId) -> Result<(), DagflowError> {
        if self.members.contains(&node) {
            return Err(DagflowError::initialization(
                "node is already a member of this MetaNode",
            ));
        }
        self.members.push(node);
        if self.strategy == MetaNodeStrategy::LeadingNode && self.leading_node.is_none() {
            self.leading_node = Some(node);
        }
        Ok(())
    }

    #[must_use]
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    #[must_use]
    pub fn strategy(&self) -> MetaNodeStrategy {
        self.strategy
    }

    #[must_use]
    pub fn leading_node(&self) -> Option<NodeId> {
        self.leading_node
    }

    /// Exposes an inner node's input under `name` (spec §4.11 `_add_input`).
    pub fn expose_input(
        &mut self,
        name: impl Into<Box<str>>,
        target: InputRef,
        positional: bool,
        keyword: bool,
    ) -> Result<(), DagflowError> {
        let name = name.into();
        self.inputs
            .add(ExposedInput { name, target }, positional, keyword, false)?;
        Ok(())
    }

    /// Exposes an inner node's output under `name` (spec §4.11 `_add_output`).
    pub fn expose_output(
        &mut self,
        name: impl Into<Box<str>>,
        target: OutputRef,
        positional: bool,
        keyword: bool,
    ) -> Result<(), DagflowError> {
        let name = name.into();
        self.outputs
            .add(ExposedOutput { name, target }, positional, keyword, false)?;
        Ok(())
    }

    /// Imports every positional input of `node` into this facade's own positional inputs
    /// (spec §4.11 `_import_pos_inputs`). Once a leading node is known, later imports are
    /// exposed positional-only (`keyword = false`); otherwise only one member's positional
    /// inputs may ever be imported.
    pub fn import_pos_inputs(&mut self, node: NodeId) -> Result<(), DagflowError> {
        let keyword = !(self.strategy == MetaNodeStrategy::LeadingNode && self.leading_node.is_some());
        if keyword {
            if self.node_inputs_pos.is_some() {
                return Err(DagflowError::initialization(
                    "positional inputs already inherited from another member",
                ));
            }
            self.node_inputs_pos = Some(node);
        }
        let entries = self.graph.with_node(node, |n| {
            n.inputs()
                .positional_indices()
                .iter()
                .map(|&idx| {
                    let name: Box<str> = n
                        .inputs()
                        .get_index(idx)
                        .expect("positional index in range")
                        .name()
                        .into();
                    (name, idx as u32)
                })
                .collect::<Vec<_>>()
        })?;
        for (name, idx) in entries {
            self.expose_input(name, InputRef::new(node, idx), true, keyword)?;
        }
        Ok(())
    }

    /// Imports every positional output of `node` into this facade's own positional outputs
    /// (spec §4.11 `_import_pos_outputs`), optionally prefixing each exposed name.
    pub fn import_pos_outputs(
        &mut self,
        node: NodeId,
        name_prefix: Option<&str>,
    ) -> Result<(), DagflowError> {
        let keyword = !(self.strategy == MetaNodeStrategy::LeadingNode && self.leading_node.is_some());
        if keyword {
            if self.node_outputs_pos.is_some() {
                return Err(DagflowError::initialization(
                    "positional outputs already inherited from another member",
                ));
            }
            self.node_outputs_pos = Some(node);
        }
        let entries = self.graph.with_node(node, |n| {
            n.outputs()
                .positional_indices()
                .iter()
                .map(|&idx| {
                    let name: Box<str> = n
                        .outputs()
                        .get_index(idx)
                        .expect("positional index in range")
                        .name()
                        .into();
                    (name, idx as u32)
                })
                .collect::<Vec<_>>()
        })?;
        for (name, idx) in entries {
            let exposed = match name_prefix {
                Some(prefix) => alloc::format!("{prefix}{name}"),
                None => name.to_string(),
            };
            self.expose_output(exposed, OutputRef::new(node, idx), true, keyword)?;
        }
        Ok(())
    }

    /// Imports a named subset of `node`'s keyword inputs under possibly-renamed target names
    /// (spec §4.11 `_import_kw_inputs`); `merge` lists target names that accept more than one
    /// source input grouped under it, `optional` skips (rather than errors on) sources `node`
    /// turns out not to have.
    pub fn import_kw_inputs(
        &mut self,
        node: NodeId,
        names: &[(&str, &str)],
        merge: &[&str],
        optional: bool,
    ) -> Result<(), DagflowError> {
        for &(source, target) in names {
            let found = self
                .graph
                .with_node(node, |n| n.inputs().index_of_name(source).map(|i| i as u32))?;
            let Some(idx) = found else {
                if optional {
                    continue;
                }
                return Err(DagflowError::initialization(alloc::format!(
                    "input {source} not found"
                )));
            };
            let do_merge = merge.contains(&target);
            self.inputs.add(
                ExposedInput {
                    name: target.into(),
                    target: InputRef::new(node, idx),
                },
                false,
                true,
                do_merge,
            )?;
        }
        Ok(())
    }

    /// Imports a named subset of `node`'s keyword outputs under possibly-renamed target names
    /// (spec §4.11 `_import_kw_outputs`); outputs are never merged, unlike keyword inputs.
    pub fn import_kw_outputs(
        &mut self,
        node: NodeId,
        names: &[(&str, &str)],
        optional: bool,
    ) -> Result<(), DagflowError> {
        for &(source, target) in names {
            let found = self
                .graph
                .with_node(node, |n| n.outputs().index_of_name(source).map(|i| i as u32))?;
            let Some(idx) = found else {
                if optional {
                    continue;
                }
                return Err(DagflowError::initialization(alloc::format!(
                    "output {source} not found"
                )));
            };
            self.outputs.add(
                ExposedOutput {
                    name: target.into(),
                    target: OutputRef::new(node, idx),
                },
                false,
                true,
                false,
            )?;
        }
        Ok(())
    }

    /// Grows a new positional input per [`MetaNodeStrategy`] (spec §4.11 `MetaNode.__call__`).
    pub fn grow_input(&mut self, name: impl Into<Box<str>>) -> Result<In, DagflowError> {
        match self.strategy {
            MetaNodeStrategy::Disable => Err(DagflowError::critical(
                "MetaNode cannot create a new input: not scalable (Disable strategy)",
            )),
            MetaNodeStrategy::LeadingNode => {
                let leading = self.leading_node.ok_or_else(|| {
                    DagflowError::critical(
                        "MetaNode cannot create a new input: the leading node is unknown",
                    )
                })?;
                let input = Nd::new(self.graph.clone(), leading).next_input()?;
                self.expose_input(name, input, true, false)?;
                Ok(In::new(self.graph.clone(), input))
            }
            MetaNodeStrategy::NewNode => {
                let factory = self.new_node_factory.clone().ok_or_else(|| {
                    DagflowError::critical(
                        "MetaNode cannot create a new input: no node factory configured",
                    )
                })?;
                let idx = self.members.len();
                let node = factory(&self.graph, idx)?;
                self.add_member(node)?;
                let input = Nd::new(self.graph.clone(), node).next_input()?;
                self.expose_input(name, input, true, false)?;
                Ok(In::new(self.graph.clone(), input))
            }
        }
    }

    #[must_use]
    pub fn input(&self, name: &str) -> Option<In> {
        self.inputs
            .get_named(name)
            .map(|e| In::new(self.graph.clone(), e.target))
    }

    #[must_use]
    pub fn output(&self, name: &str) -> Option<Out> {
        self.outputs
            .get_named(name)
            .map(|e| Out::new(self.graph.clone(), e.target))
    }

    #[must_use]
    pub fn input_at(&self, pos: usize) -> Option<In> {
        self.inputs
            .get_positional(pos)
            .map(|e| In::new(self.graph.clone(), e.target))
    }

    #[must_use]
    pub fn output_at(&self, pos: usize) -> Option<Out> {
        self.outputs
            .get_positional(pos)
            .map(|e| Out::new(self.graph.clone(), e.target))
    }

    #[must_use]
    pub fn len_inputs(&self) -> usize {
        self.inputs.len_all()
    }

    #[must_use]
    pub fn len_outputs(&self) -> usize {
        self.outputs.len_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphOptions;
    use crate::node::{EvalContext, NodeKernel, TypeFunctionContext};
    use crate::strategy::InputStrategy;

    #[derive(Debug)]
    struct NoOp;
    impl NodeKernel for NoOp {
        fn type_function(&mut self, _ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn eval(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }
        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    #[derive(Debug)]
    struct Growable;
    impl NodeKernel for Growable {
        fn type_function(&mut self, _ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            Ok(())
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
    fn exposed_ports_resolve_to_the_wrapped_node() {
        let g = Graph::new(GraphOptions::default());
        let inner = g.add_node("inner", Box::new(NoOp)).unwrap();
        let in_ref = g.add_input(inner, "in", true, true).unwrap();
        let out_ref = g.add_output(inner, "out", true, true).unwrap();

        let mut meta = MetaNode::new(g.clone(), MetaNodeStrategy::LeadingNode);
        meta.add_member(inner).unwrap();
        meta.expose_input("x", in_ref, true, true).unwrap();
        meta.expose_output("y", out_ref, true, true).unwrap();

        assert_eq!(meta.members(), &[inner]);
        assert!(meta.input("x").is_some());
        assert!(meta.output("y").is_some());
        assert!(meta.input("missing").is_none());
    }

    #[test]
    fn adding_the_same_member_twice_is_rejected() {
        let g = Graph::new(GraphOptions::default());
        let inner = g.add_node("inner", Box::new(NoOp)).unwrap();
        let mut meta = MetaNode::new(g.clone(), MetaNodeStrategy::LeadingNode);
        meta.add_member(inner).unwrap();
        assert!(meta.add_member(inner).is_err());
    }

    #[test]
    fn leading_node_strategy_tracks_the_first_member() {
        let g = Graph::new(GraphOptions::default());
        let a = g.add_node("a", Box::new(NoOp)).unwrap();
        let b = g.add_node("b", Box::new(NoOp)).unwrap();
        let mut meta = MetaNode::new(g.clone(), MetaNodeStrategy::LeadingNode);
        meta.add_member(a).unwrap();
        meta.add_member(b).unwrap();
        assert_eq!(meta.leading_node(), Some(a));
    }

    #[test]
    fn disable_strategy_refuses_to_grow_an_input() {
        let g = Graph::new(GraphOptions::default());
        let inner = g.add_node("inner", Box::new(Growable)).unwrap();
        let mut meta = MetaNode::new(g.clone(), MetaNodeStrategy::Disable);
        meta.add_member(inner).unwrap();
        assert!(meta.grow_input("x").is_err());
    }

    #[test]
    fn leading_node_strategy_grows_an_input_on_the_leading_member() {
        let g = Graph::new(GraphOptions::default());
        let inner = g.add_node("inner", Box::new(Growable)).unwrap();
        let mut meta = MetaNode::new(g.clone(), MetaNodeStrategy::LeadingNode);
        meta.add_member(inner).unwrap();
        let grown = meta.grow_input("x").unwrap();
        assert_eq!(grown.input.node, inner);
        assert!(meta.input("x").is_some());
    }

    #[test]
    fn new_node_strategy_fabricates_a_fresh_member_per_call() {
        let g = Graph::new(GraphOptions::default());
        let mut meta = MetaNode::new(g.clone(), MetaNodeStrategy::NewNode).with_new_node_factory(
            |graph, idx| graph.add_node(alloc::format!("member_{idx}"), Box::new(Growable)),
        );
        let first = meta.grow_input("a").unwrap();
        let second = meta.grow_input("b").unwrap();
        assert_eq!(meta.members().len(), 2);
        assert_ne!(first.input.node, second.input.node);
    }

    #[test]
    fn import_pos_inputs_exposes_every_positional_input_of_a_member() {
        let g = Graph::new(GraphOptions::default());
        let inner = g.add_node("inner", Box::new(NoOp)).unwrap();
        g.add_input(inner, "a", true, true).unwrap();
        g.add_input(inner, "b", true, true).unwrap();

        let mut meta = MetaNode::new(g.clone(), MetaNodeStrategy::NewNode);
        meta.add_member(inner).unwrap();
        meta.import_pos_inputs(inner).unwrap();

        assert_eq!(meta.len_inputs(), 2);
        assert!(meta.input("a").is_some());
        assert!(meta.input("b").is_some());
        assert!(meta.import_pos_inputs(inner).is_err());
    }

    #[test]
    fn import_kw_outputs_renames_and_skips_missing_when_optional() {
        let g = Graph::new(GraphOptions::default());
        let inner = g.add_node("inner", Box::new(NoOp)).unwrap();
        g.add_output(inner, "raw", false, true).unwrap();

        let mut meta = MetaNode::new(g.clone(), MetaNodeStrategy::NewNode);
        meta.add_member(inner).unwrap();
        meta.import_kw_outputs(inner, &[("raw", "result"), ("missing", "ignored")], true)
            .unwrap();

        assert!(meta.output("result").is_some());
        assert!(meta.output("ignored").is_none());
        assert!(meta
            .import_kw_outputs(inner, &[("also_missing", "x")], false)
            .is_err());
    }
}
