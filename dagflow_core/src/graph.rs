// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Graph`]: the owning arena, plus the two-phase close and the touch/taint/freeze/invalidate
//! walks that drive pull-based incremental evaluation (spec §4.5, §4.6).
//!
//! `Graph` is a thin `Rc<RefCell<GraphInner>>` handle rather than a bare `Vec<Node>`, the same
//! shape `execution_graph::graph::Graph` uses internally for its bytecode arena. The handle is
//! what lets `dagflow_core::connect`'s `>>`/`<<` operators borrow "the graph" twice in one
//! expression (once per side of the operator) without fighting the borrow checker.
//!
//! Each arena slot is its own `Rc<RefCell<Node>>` rather than a plain `Node` inside one big
//! `RefCell<Vec<Node>>`: a kernel's `eval` is free to call back into the graph (a `Jacobian`
//! perturbing a parameter node and re-pulling a downstream one, spec §9 supplement) while its own
//! node is still borrowed, as long as it never reaches back into itself. A single shared
//! `RefCell` around the whole arena could not allow that re-entrancy at all.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use hashbrown::HashSet;

use crate::error::DagflowError;
use crate::ids::{InputRef, NodeId, OutputRef};
use crate::node::{EvalContext, InputSnapshot, Node, NodeKernel, OnTaintContext, PostAllocateContext, TypeFunctionContext};

/// Construction-time knobs (spec §9 "Configuration" ambient concern), passed once to
/// [`Graph::new`] rather than threaded through every call, mirroring `execution_graph::Vm::new`'s
/// `Limits` argument.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Reject `connect` calls that would leave any input unbound at `close` time.
    pub strict: bool,
    /// Upper bound on node count; `None` means unbounded. A defensive limit for graphs built
    /// from untrusted configuration, analogous to `execution_graph::Limits::max_instructions`.
    pub max_nodes: Option<usize>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            strict: true,
            max_nodes: None,
        }
    }
}

type NodeCell = Rc<RefCell<Node>>;

struct GraphInner {
    nodes: Vec<NodeCell>,
    options: GraphOptions,
    closed: bool,
}

/// Cloneable handle onto a dataflow graph (spec §4.5 `Graph`).
#[derive(Clone)]
pub struct Graph(Rc<RefCell<GraphInner>>);

impl core::fmt::Debug for Graph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Graph")
            .field("nodes", &inner.nodes.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl Graph {
    #[must_use]
    pub fn new(options: GraphOptions) -> Self {
        Self(Rc::new(RefCell::new(GraphInner {
            nodes: Vec::new(),
            options,
            closed: false,
        })))
    }

    #[must_use]
    pub fn closed(&self) -> bool {
        self.0.borrow().closed
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.0.borrow().nodes.len()
    }

    fn cell(&self, id: NodeId) -> Result<NodeCell, DagflowError> {
        self.0
            .borrow()
            .nodes
            .get(id.index())
            .cloned()
            .ok_or(DagflowError::BadId)
    }

    /// Adds a node carrying `kernel`, returning its handle (spec §4.5 `Graph.add_node`). If a
    /// [`crate::context::current_storage`] is open, the new node is also registered there under
    /// its own name (spec §4.10's `Node.replicate`/`NodeStorage.update_current` auto-registration,
    /// simplified here to "register under the node's name" rather than a caller-supplied path).
    pub fn add_node(&self, name: impl Into<Box<str>>, kernel: Box<dyn NodeKernel>) -> Result<NodeId, DagflowError> {
        let name: Box<str> = name.into();
        let id = {
            let mut inner = self.0.borrow_mut();
            if inner.closed {
                return Err(DagflowError::ClosedGraph {
                    node: NodeId::new(0),
                    message: "may not add nodes to a closed graph".into(),
                });
            }
            if let Some(max) = inner.options.max_nodes {
                if inner.nodes.len() >= max {
                    return Err(DagflowError::critical("graph node limit exceeded"));
                }
            }
            let id = NodeId::new(inner.nodes.len() as u32);
            inner.nodes.push(Rc::new(RefCell::new(Node::new(name.clone(), kernel))));
            id
        };
        #[cfg(feature = "std")]
        if let Some(storage) = crate::context::current_storage() {
            // A name collision with something already registered under this path is not fatal:
            // plenty of nodes share a bare name across different storages, and failing graph
            // construction over a registry convenience would be the wrong tradeoff.
            let _ = storage.insert(name, crate::storage::StorageEntry::Node(id));
        }
        Ok(id)
    }

    pub fn add_input(
        &self,
        node: NodeId,
        name: impl Into<Box<str>>,
        positional: bool,
        keyword: bool,
    ) -> Result<InputRef, DagflowError> {
        let cell = self.cell(node)?;
        let mut n = cell.borrow_mut();
        let idx = n
            .inputs
            .add(crate::node::InputPort::new(name), positional, keyword, false)?;
        n.flags.set_types_tainted(true);
        n.flags.set_needs_reallocation(true);
        Ok(InputRef::new(node, idx as u32))
    }

    pub fn add_output(
        &self,
        node: NodeId,
        name: impl Into<Box<str>>,
        positional: bool,
        keyword: bool,
    ) -> Result<OutputRef, DagflowError> {
        let cell = self.cell(node)?;
        let mut n = cell.borrow_mut();
        let idx = n
            .outputs
            .add(crate::node::OutputPort::new(name), positional, keyword, false)?;
        n.flags.set_types_tainted(true);
        n.flags.set_needs_reallocation(true);
        Ok(OutputRef::new(node, idx as u32))
    }

    /// Finds a node by its exact name; the first match in arena order wins if more than one node
    /// shares a name (spec §4.11: `MetaNode`'s `Inherit` strategy resolves a wrapped member by
    /// name).
    #[must_use]
    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.0
            .borrow()
            .nodes
            .iter()
            .position(|n| n.borrow().name() == name)
            .map(|i| NodeId::new(i as u32))
    }

    /// Binds `input` to `output`, registering the consumer link both ways (spec §4.5
    /// `Connection` operators' common implementation).
    pub fn connect(&self, output: OutputRef, input: InputRef) -> Result<(), DagflowError> {
        if self.0.borrow().closed {
            return Err(DagflowError::ClosedGraph {
                node: input.node,
                message: "may not connect inputs on a closed graph".into(),
            });
        }
        {
            let src = self.cell(output.node)?;
            let mut src = src.borrow_mut();
            let out = src
                .outputs
                .get_index_mut(output.index as usize)
                .ok_or(DagflowError::BadId)?;
            out.add_consumer(input);
        }
        let dst = self.cell(input.node)?;
        let mut dst = dst.borrow_mut();
        let inp = dst
            .inputs
            .get_index_mut(input.index as usize)
            .ok_or(DagflowError::BadId)?;
        inp.bind(output).map_err(|_| DagflowError::Reconnection { input })?;
        dst.flags.taint(false);
        dst.flags.set_types_tainted(true);
        dst.flags.set_needs_reallocation(true);
        let mut ctx = OnTaintContext {
            node: input.node,
            input: Some(input.index),
        };
        dst.kernel.on_taint(&mut ctx);
        Ok(())
    }

    /// Topological node order by input→output dependency (Kahn's algorithm). Errors on a cycle,
    /// which cannot occur through [`Self::connect`] alone but is checked defensively.
    fn topo_order(&self) -> Result<Vec<NodeId>, DagflowError> {
        let inner = self.0.borrow();
        let n = inner.nodes.len();
        let mut indeg = alloc::vec![0u32; n];
        let mut consumers: Vec<Vec<usize>> = alloc::vec![Vec::new(); n];
        for (i, node) in inner.nodes.iter().enumerate() {
            for input in node.borrow().inputs.iter_all() {
                if let Some(src) = input.connected() {
                    indeg[i] += 1;
                    consumers[src.node.index()].push(i);
                }
            }
        }
        let mut queue: Vec<usize> = (0..n).filter(|&i| indeg[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop() {
            order.push(NodeId::new(i as u32));
            for &j in &consumers[i] {
                indeg[j] -= 1;
                if indeg[j] == 0 {
                    queue.push(j);
                }
            }
        }
        if order.len() != n {
            return Err(DagflowError::critical("graph contains a connection cycle"));
        }
        Ok(order)
    }

    fn snapshot_inputs(&self, node: NodeId) -> Result<Vec<InputSnapshot>, DagflowError> {
        let cell = self.cell(node)?;
        let sources: Vec<Option<OutputRef>> = cell
            .borrow()
            .inputs
            .iter_all()
            .map(crate::node::InputPort::connected)
            .collect();
        sources
            .into_iter()
            .map(|src| match src {
                None => Ok(InputSnapshot {
                    descriptor: crate::descriptor::DataDescriptor::new(),
                    buffer: None,
                }),
                Some(src) => {
                    let src_cell = self.cell(src.node)?;
                    let src_node = src_cell.borrow();
                    let out = src_node
                        .outputs
                        .get_index(src.index as usize)
                        .ok_or(DagflowError::BadId)?;
                    Ok(InputSnapshot {
                        descriptor: out.descriptor().clone(),
                        buffer: out.buffer_handle(),
                    })
                }
            })
            .collect()
    }

    /// Runs the type-resolution pass, then allocates every output, then marks the graph closed
    /// (spec §4.5 `Graph.close`). Each pass only touches nodes whose `types_tainted`/
    /// `needs_reallocation` flag is still set, so a `close()` after `open()`/reconnection redoes
    /// work only where something could plausibly have changed (spec §4.4 diff-based close).
    pub fn close(&self) -> Result<(), DagflowError> {
        if self.0.borrow().closed {
            return Ok(());
        }
        let order = self.topo_order()?;
        log::debug!("closing graph: {} nodes in topological order", order.len());
        let strict = self.0.borrow().options.strict;

        for &node in &order {
            let cell = self.cell(node)?;
            if strict {
                let n = cell.borrow();
                for (i, input) in n.inputs.iter_all().enumerate() {
                    if !input.is_bound() {
                        return Err(DagflowError::Closing {
                            node,
                            message: alloc::format!("input[{i}] is unbound"),
                        });
                    }
                }
            }
            if !cell.borrow().flags().types_tainted() {
                continue;
            }
            let inputs = self.snapshot_inputs(node)?;
            let mut n = cell.borrow_mut();
            let mut ctx = TypeFunctionContext {
                node,
                inputs: &inputs,
                outputs: &mut n.outputs,
            };
            let result = n.kernel.type_function(&mut ctx).map_err(|e| wrap_closing(node, e));
            n.set_exception(result.as_ref().err().cloned());
            result?;
            n.flags.set_types_tainted(false);
        }

        for &node in &order {
            let cell = self.cell(node)?;
            let needs_realloc = cell.borrow().flags().needs_reallocation();
            if needs_realloc {
                let mut n = cell.borrow_mut();
                let result: Result<(), DagflowError> = (|| {
                    for out in n.outputs.iter_all_mut() {
                        out.allocate().map_err(|e| wrap_closing(node, e))?;
                    }
                    Ok(())
                })();
                n.set_exception(result.as_ref().err().cloned());
                result?;
                n.flags.set_needs_reallocation(false);
                n.flags.set_needs_post_allocate(true);
            }
            let mut n = cell.borrow_mut();
            n.flags.set_allocated(true);
            n.flags.set_closed(true);
            for out in n.outputs.iter_all_mut() {
                out.flags_mut().set_allocated(true);
                out.flags_mut().set_closed(true);
            }
            if n.flags().needs_post_allocate() {
                let mut ctx = PostAllocateContext {
                    node,
                    outputs: &mut n.outputs,
                };
                let result = n.kernel.post_allocate(&mut ctx).map_err(|e| wrap_closing(node, e));
                n.set_exception(result.as_ref().err().cloned());
                result?;
                n.flags.set_needs_post_allocate(false);
            }
        }

        self.0.borrow_mut().closed = true;
        log::debug!("graph closed");
        Ok(())
    }

    /// Reopens `node` and every downstream consumer, refusing if any of them is frozen
    /// (spec §4.4 `open`).
    pub fn open(&self, node: NodeId) -> Result<(), DagflowError> {
        let consumers = self.downstream(node)?;
        for &n in core::iter::once(&node).chain(consumers.iter()) {
            let cell = self.cell(n)?;
            cell.borrow_mut()
                .flags_mut()
                .open()
                .map_err(|()| {
                    log::warn!("open refused: node {} is frozen", n.index());
                    DagflowError::Opening { node: n }
                })?;
        }
        self.0.borrow_mut().closed = false;
        Ok(())
    }

    fn downstream(&self, node: NodeId) -> Result<Vec<NodeId>, DagflowError> {
        let mut seen = HashSet::new();
        let mut stack = alloc::vec![node];
        let mut out = Vec::new();
        while let Some(n) = stack.pop() {
            let cell = self.cell(n)?;
            let consumers: Vec<NodeId> = cell
                .borrow()
                .outputs
                .iter_all()
                .flat_map(|o| o.consumers().iter().map(|c| c.node).collect::<Vec<_>>())
                .collect();
            for consumer in consumers {
                if seen.insert(consumer) {
                    out.push(consumer);
                    stack.push(consumer);
                }
            }
        }
        Ok(out)
    }

    fn upstream(&self, node: NodeId) -> Result<Vec<NodeId>, DagflowError> {
        let mut seen = HashSet::new();
        let mut stack = alloc::vec![node];
        let mut out = Vec::new();
        while let Some(n) = stack.pop() {
            let cell = self.cell(n)?;
            let parents: Vec<NodeId> = cell
                .borrow()
                .inputs
                .iter_all()
                .filter_map(|i| i.connected().map(|o| o.node))
                .collect();
            for parent in parents {
                if seen.insert(parent) {
                    out.push(parent);
                    stack.push(parent);
                }
            }
        }
        Ok(out)
    }

    /// Marks `node` (and its outputs) tainted, then propagates the taint to every downstream
    /// consumer (spec §4.2). This is the entry point external mutators (e.g. a changed parameter
    /// value) use to invalidate cached results.
    pub fn taint(&self, node: NodeId) {
        let mut stack = alloc::vec![(node, None::<u32>)];
        let mut seen: HashSet<NodeId> = HashSet::new();
        while let Some((n, origin_input)) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            let Ok(cell) = self.cell(n) else { continue };
            let mut rec = cell.borrow_mut();
            rec.flags_mut().taint(false);
            let consumers: Vec<(NodeId, Option<u32>)> = rec
                .outputs
                .iter_all_mut()
                .flat_map(|o| {
                    o.flags_mut().taint(false);
                    o.consumers()
                        .iter()
                        .map(|c| (c.node, Some(c.index)))
                        .collect::<Vec<_>>()
                })
                .collect();
            let mut ctx = OnTaintContext {
                node: n,
                input: origin_input,
            };
            rec.kernel.on_taint(&mut ctx);
            drop(rec);
            stack.extend(consumers);
        }
    }

    /// Marks `node` invalid and propagates invalidity downstream (spec §4.2).
    pub fn invalidate(&self, node: NodeId) -> Result<(), DagflowError> {
        let downstream = self.downstream(node)?;
        for n in core::iter::once(node).chain(downstream) {
            let cell = self.cell(n)?;
            let mut rec = cell.borrow_mut();
            rec.flags_mut().set_invalid(true);
            for out in rec.outputs.iter_all_mut() {
                out.flags_mut().set_invalid(true);
            }
        }
        Ok(())
    }

    /// Marks every ancestor of `node` invalid (spec §9 supplement (2)); distinct from
    /// [`Self::invalidate`], which walks downstream.
    pub fn invalidate_parents(&self, node: NodeId) -> Result<(), DagflowError> {
        let ancestors = self.upstream(node)?;
        for n in ancestors {
            self.cell(n)?.borrow_mut().flags_mut().set_invalid(true);
        }
        Ok(())
    }

    pub fn freeze(&self, node: NodeId) -> Result<(), DagflowError> {
        let cell = self.cell(node)?;
        let mut rec = cell.borrow_mut();
        rec.flags_mut().freeze();
        for out in rec.outputs.iter_all_mut() {
            out.flags_mut().freeze();
        }
        Ok(())
    }

    pub fn unfreeze(&self, node: NodeId) -> Result<(), DagflowError> {
        let cell = self.cell(node)?;
        let mut rec = cell.borrow_mut();
        rec.flags_mut().unfreeze();
        for out in rec.outputs.iter_all_mut() {
            out.flags_mut().unfreeze();
        }
        Ok(())
    }

    /// Pulls `node` up to date: recursively touches its upstream dependencies first, then
    /// evaluates it if (and only if) it is still tainted afterward (spec §4.4 `touch`).
    pub fn touch(&self, node: NodeId) -> Result<(), DagflowError> {
        if !self.0.borrow().closed {
            return Err(DagflowError::UnclosedGraph {
                node,
                message: "touch requires a closed graph".into(),
            });
        }
        self.touch_inner(node, &mut HashSet::new())
    }

    fn touch_inner(&self, node: NodeId, visited: &mut HashSet<NodeId>) -> Result<(), DagflowError> {
        if !visited.insert(node) {
            return Ok(());
        }
        let cell = self.cell(node)?;

        let upstream: Vec<NodeId> = cell
            .borrow()
            .inputs
            .iter_all()
            .filter_map(|i| i.connected().map(|o| o.node))
            .collect();
        for up in upstream {
            self.touch_inner(up, visited)?;
        }

        let (invalid, tainted) = {
            let flags = cell.borrow().flags();
            (flags.invalid(), flags.tainted())
        };
        if invalid || !tainted {
            return Ok(());
        }

        let inputs = self.snapshot_inputs(node)?;
        let mut n = cell.borrow_mut();
        log::trace!("evaluating node {} ({})", node.index(), n.name());
        n.flags_mut().set_being_evaluated(true);
        let mut ctx = EvalContext {
            node,
            inputs: &inputs,
            outputs: &mut n.outputs,
        };
        let result = n.kernel.eval(&mut ctx).map_err(|e| wrap_calculation(node, e));
        n.flags_mut().set_being_evaluated(false);
        n.set_exception(result.as_ref().err().cloned());
        result?;
        n.flags_mut().mark_fresh();
        for out in n.outputs.iter_all_mut() {
            out.flags_mut().mark_fresh();
        }
        Ok(())
    }

    /// Touches every node in the graph in dependency order (spec §4.5 `Graph.run_all`/`eval_all`).
    pub fn touch_all(&self) -> Result<(), DagflowError> {
        let order = self.topo_order()?;
        let mut visited = HashSet::new();
        for node in order {
            self.touch_inner(node, &mut visited)?;
        }
        Ok(())
    }

    /// Reads one `f64` scalar out of `output`, pulling the owning node up to date first
    /// (spec §4.4).
    pub fn read(&self, output: OutputRef, idx: usize) -> Result<f64, DagflowError> {
        self.touch(output.node)?;
        let cell = self.cell(output.node)?;
        let n = cell.borrow();
        let out = n
            .outputs
            .get_index(output.index as usize)
            .ok_or(DagflowError::BadId)?;
        Ok(out.get(idx))
    }

    pub(crate) fn with_node_mut<R>(&self, node: NodeId, f: impl FnOnce(&mut Node) -> R) -> Result<R, DagflowError> {
        let cell = self.cell(node)?;
        let mut n = cell.borrow_mut();
        Ok(f(&mut n))
    }

    pub(crate) fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&Node) -> R) -> Result<R, DagflowError> {
        let cell = self.cell(node)?;
        let n = cell.borrow();
        Ok(f(&n))
    }

    /// Reaches into a node's kernel for downcasting (spec §9 supplement: used by
    /// `dagflow_params`'s settable parameter nodes, which are not otherwise part of this crate's
    /// public surface).
    pub fn with_kernel_mut<R>(
        &self,
        node: NodeId,
        f: impl FnOnce(&mut dyn NodeKernel) -> R,
    ) -> Result<R, DagflowError> {
        let cell = self.cell(node)?;
        let mut n = cell.borrow_mut();
        Ok(f(&mut *n.kernel))
    }

    /// The current taint/freeze/invalid/closed/allocated bits for `node` (spec §4.2), without
    /// touching it first.
    pub fn node_flags(&self, node: NodeId) -> Result<crate::flags::FlagsDescriptor, DagflowError> {
        self.with_node(node, crate::node::Node::flags)
    }

    /// The error from `node`'s last failed `type_function`/`allocate`/`post_allocate`/`eval` call,
    /// if any (spec §3 "exception" slot); `None` if its last attempt succeeded or it has not run
    /// yet.
    pub fn node_exception(&self, node: NodeId) -> Result<Option<DagflowError>, DagflowError> {
        self.with_node(node, |n| n.exception().cloned())
    }

    /// How many positional inputs/outputs `node` currently has (spec §9 supplement, Scenario S6:
    /// asserting exact grown input/output counts from outside the crate).
    pub fn positional_port_counts(&self, node: NodeId) -> Result<(usize, usize), DagflowError> {
        self.with_node(node, |n| (n.inputs().len_pos(), n.outputs().len_pos()))
    }

    /// Which of `input`'s owning node's own outputs it was grouped into by
    /// `InputStrategy::AddNewInputAddNewOutputForBlock` growth, if it was grown that way
    /// (spec §9 supplement, Scenario S6).
    pub fn input_block_output(&self, input: InputRef) -> Result<Option<u32>, DagflowError> {
        self.with_node(input.node, |n| {
            n.inputs()
                .get_index(input.index as usize)
                .and_then(crate::node::InputPort::block_output)
        })
    }

    /// Resolved shape of `output`, if its descriptor has one yet (spec §9 supplement: downstream
    /// crates like `dagflow_params` need this to size reads without holding their own copy of a
    /// node's descriptor).
    pub fn output_shape(&self, output: OutputRef) -> Result<Option<Vec<usize>>, DagflowError> {
        self.with_node(output.node, |n| {
            n.outputs
                .get_index(output.index as usize)
                .and_then(|o| o.descriptor().shape().map(|s| s.to_vec()))
        })
    }
}

fn wrap_closing(node: NodeId, err: DagflowError) -> DagflowError {
    match err {
        DagflowError::TypeFunction { message, .. } => DagflowError::Closing { node, message },
        other => other,
    }
}

fn wrap_calculation(node: NodeId, err: DagflowError) -> DagflowError {
    match err {
        DagflowError::Critical { message } => DagflowError::Calculation { node, message },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DType;
    use crate::strategy::InputStrategy;

    #[derive(Debug)]
    struct Const {
        value: f64,
        shape: Vec<usize>,
    }
    impl NodeKernel for Const {
        fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            let out = ctx.outputs.get_index_mut(0).unwrap();
            out.descriptor_mut().set_dtype(DType::F64);
            out.descriptor_mut().set_shape(Some(self.shape.clone()));
            Ok(())
        }
        fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            let out = ctx.outputs.get_index_mut(0).unwrap();
            for i in 0..out.descriptor().size().unwrap() {
                out.seti(i, self.value, false);
            }
            Ok(())
        }
        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    #[derive(Debug)]
    struct AddOne;
    impl NodeKernel for AddOne {
        fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            crate::typefunc::copy_input_zero_to_outputs(ctx.node, ctx.inputs, ctx.outputs)
        }
        fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            let n = ctx.inputs[0].shape().unwrap()[0];
            let src: Vec<f64> = (0..n)
                .map(|i| ctx.inputs[0].with_f64(|s| s[i]).unwrap())
                .collect();
            let out = ctx.outputs.get_index_mut(0).unwrap();
            for (i, v) in src.into_iter().enumerate() {
                out.seti(i, v + 1.0, false);
            }
            Ok(())
        }
        fn input_strategy(&self) -> InputStrategy {
            InputStrategy::Fail
        }
        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    fn wire_const_into_addone() -> (Graph, OutputRef) {
        let g = Graph::new(GraphOptions::default());
        let c = g
            .add_node(
                "const",
                Box::new(Const {
                    value: 1.0,
                    shape: alloc::vec![3],
                }),
            )
            .unwrap();
        let c_out = g.add_output(c, "out", true, true).unwrap();
        let a = g.add_node("add_one", Box::new(AddOne)).unwrap();
        let a_in = g.add_input(a, "in", true, true).unwrap();
        let a_out = g.add_output(a, "out", true, true).unwrap();
        g.connect(c_out, a_in).unwrap();
        (g, a_out)
    }

    #[test]
    fn close_then_read_produces_expected_value() {
        let (g, a_out) = wire_const_into_addone();
        g.close().unwrap();
        assert_eq!(g.read(a_out, 0).unwrap(), 2.0);
    }

    #[test]
    fn touch_before_close_is_rejected() {
        let (g, a_out) = wire_const_into_addone();
        assert!(g.touch(a_out.node).is_err());
    }

    #[test]
    fn strict_close_rejects_unbound_inputs() {
        let g = Graph::new(GraphOptions::default());
        let a = g.add_node("add_one", Box::new(AddOne)).unwrap();
        let _a_in = g.add_input(a, "in", true, true).unwrap();
        g.add_output(a, "out", true, true).unwrap();
        assert!(g.close().is_err());
    }

    #[test]
    fn taint_propagates_downstream_and_touch_recomputes() {
        let (g, a_out) = wire_const_into_addone();
        g.close().unwrap();
        assert_eq!(g.read(a_out, 0).unwrap(), 2.0);
        g.taint(a_out.node);
        // re-reading after taint re-runs eval (idempotent here, but exercises the touch path).
        assert_eq!(g.read(a_out, 0).unwrap(), 2.0);
    }

    #[test]
    fn open_refuses_a_frozen_downstream_node() {
        let (g, a_out) = wire_const_into_addone();
        g.close().unwrap();
        g.freeze(a_out.node).unwrap();
        assert!(g.open(NodeId::new(0)).is_err());
    }
}
