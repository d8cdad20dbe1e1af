// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Node`], its ports, and the [`NodeKernel`] trait a concrete computation implements
//! (spec §4.3, §4.4).
//!
//! A node never reaches across the graph on its own: [`crate::graph::Graph`] resolves each bound
//! input's upstream [`OutputPort`] into a read-only [`InputSnapshot`] (a cheap `Rc` clone of the
//! shared buffer) before calling into the kernel, so a kernel only ever sees its own node's
//! arena slot plus snapshots of its inputs — never a second live borrow into the arena.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::buffer::{Buffer, DType};
use crate::descriptor::DataDescriptor;
use crate::error::DagflowError;
use crate::flags::FlagsDescriptor;
use crate::ids::{InputRef, NodeId, OutputRef};
use crate::labels::Labels;
use crate::port::{Named, PortContainer};
use crate::strategy::InputStrategy;

/// One bound or unbound input slot (spec §4.3).
#[derive(Clone, Debug)]
pub struct InputPort {
    name: Box<str>,
    descriptor: DataDescriptor,
    connected: Option<OutputRef>,
    /// Whether this input is permitted to become the "allocating child" that adopts its
    /// upstream output's buffer directly, rather than requiring a private copy (spec §4.4).
    allocatable: bool,
    /// The index of this node's own output this input was grouped into by
    /// `InputStrategy::AddNewInputAddNewOutputForBlock` growth, if any (spec §9 supplement,
    /// Scenario S6).
    block_output: Option<u32>,
}

impl InputPort {
    #[must_use]
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            descriptor: DataDescriptor::new(),
            connected: None,
            allocatable: true,
            block_output: None,
        }
    }

    /// Which of the node's own outputs this input was grouped into by block-growth, if it was
    /// grown that way (spec §9 supplement, Scenario S6).
    #[must_use]
    pub fn block_output(&self) -> Option<u32> {
        self.block_output
    }

    pub(crate) fn set_block_output(&mut self, output: u32) {
        self.block_output = Some(output);
    }

    #[must_use]
    pub fn connected(&self) -> Option<OutputRef> {
        self.connected
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.connected.is_some()
    }

    #[must_use]
    pub fn descriptor(&self) -> &DataDescriptor {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut DataDescriptor {
        &mut self.descriptor
    }

    #[must_use]
    pub fn allocatable(&self) -> bool {
        self.allocatable
    }

    pub fn set_allocatable(&mut self, allocatable: bool) {
        self.allocatable = allocatable;
    }

    pub(crate) fn bind(&mut self, output: OutputRef) -> Result<(), DagflowError> {
        if self.connected.is_some() {
            return Err(DagflowError::Connection {
                message: alloc::format!("input '{}' is already bound", self.name),
            });
        }
        self.connected = Some(output);
        Ok(())
    }
}

impl Named for InputPort {
    fn name(&self) -> &str {
        &self.name
    }
}

/// One produced value slot (spec §4.4).
#[derive(Clone, Debug)]
pub struct OutputPort {
    name: Box<str>,
    descriptor: DataDescriptor,
    flags: FlagsDescriptor,
    buffer: Option<Rc<RefCell<Buffer>>>,
    consumers: Vec<InputRef>,
    /// At most one connected input may adopt this output's buffer directly instead of copying
    /// it (spec §4.4 "at most one allocating child per output").
    allocating_child: Option<InputRef>,
    /// If set, no child may become the allocating child of this output (spec §3 Output
    /// invariant); used by outputs whose buffer must never be handed off, e.g. a constant source
    /// shared by several consumers.
    forbid_reallocation: bool,
}

impl OutputPort {
    #[must_use]
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            descriptor: DataDescriptor::new(),
            flags: FlagsDescriptor::new(),
            buffer: None,
            consumers: Vec::new(),
            allocating_child: None,
            forbid_reallocation: false,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &DataDescriptor {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut DataDescriptor {
        &mut self.descriptor
    }

    #[must_use]
    pub fn flags(&self) -> FlagsDescriptor {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut FlagsDescriptor {
        &mut self.flags
    }

    #[must_use]
    pub fn consumers(&self) -> &[InputRef] {
        &self.consumers
    }

    pub(crate) fn add_consumer(&mut self, input: InputRef) {
        self.consumers.push(input);
    }

    #[must_use]
    pub fn allocating_child(&self) -> Option<InputRef> {
        self.allocating_child
    }

    #[must_use]
    pub fn forbid_reallocation(&self) -> bool {
        self.forbid_reallocation
    }

    pub fn set_forbid_reallocation(&mut self, forbid: bool) {
        self.forbid_reallocation = forbid;
    }

    /// Claims this output's allocating-child slot for `input`, refusing if already taken by a
    /// different input (spec §4.4 invariant), or if this output forbids allocating children
    /// altogether (spec §3 Output invariant).
    pub(crate) fn claim_allocating_child(&mut self, input: InputRef) -> Result<(), DagflowError> {
        if self.forbid_reallocation {
            return Err(DagflowError::connection(
                "output forbids reallocation: no child may become its allocating child",
            ));
        }
        match self.allocating_child {
            None => {
                self.allocating_child = Some(input);
                Ok(())
            }
            Some(existing) if existing == input => Ok(()),
            Some(_) => Err(DagflowError::connection(
                "output already has an allocating child",
            )),
        }
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        self.buffer.is_some()
    }

    #[must_use]
    pub fn buffer_handle(&self) -> Option<Rc<RefCell<Buffer>>> {
        self.buffer.clone()
    }

    /// Allocates (or replaces, if shape/dtype changed) this output's buffer from its descriptor
    /// (spec §4.4 `allocate`).
    pub fn allocate(&mut self) -> Result<(), DagflowError> {
        let dtype = self.descriptor.dtype().ok_or_else(|| {
            DagflowError::connection("cannot allocate output with unresolved dtype")
        })?;
        let size = self.descriptor.size().ok_or_else(|| {
            DagflowError::connection("cannot allocate output with unresolved shape")
        })?;
        let needs_new = match &self.buffer {
            Some(b) => !self.descriptor.consistent_with(&b.borrow()),
            None => true,
        };
        if needs_new {
            self.buffer = Some(Rc::new(RefCell::new(Buffer::zeroed(dtype, size))));
        }
        Ok(())
    }

    /// Adopts an externally-allocated buffer directly, e.g. from an allocating child's own
    /// output (buffer sharing, spec §4.4).
    pub fn adopt_buffer(&mut self, buffer: Rc<RefCell<Buffer>>) {
        self.buffer = Some(buffer);
    }

    /// Reads element `idx` without marking anything (spec §4.4 `get`).
    ///
    /// # Panics
    /// Panics if no buffer has been allocated yet, or `idx` is out of range.
    #[must_use]
    pub fn get(&self, idx: usize) -> f64 {
        self.buffer
            .as_ref()
            .expect("output read before allocation")
            .borrow()
            .get_f64(idx)
    }

    /// Writes element `idx` in place without tainting consumers (spec §4.4 `seti`, `force=false`
    /// by default).
    ///
    /// Returns whether the output actually re-tainted (always `false` here; taint propagation to
    /// consumers is the graph's job once it knows which nodes own them).
    pub fn seti(&mut self, idx: usize, value: f64, force: bool) -> bool {
        self.buffer
            .as_ref()
            .expect("output written before allocation")
            .borrow_mut()
            .set_f64(idx, value);
        self.flags.taint(force)
    }
}

impl Named for OutputPort {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A read-only view of one bound input, assembled by the graph before a kernel call
/// (spec §4.4: a kernel never reaches across the arena itself).
#[derive(Debug)]
pub struct InputSnapshot {
    pub descriptor: DataDescriptor,
    pub buffer: Option<Rc<RefCell<Buffer>>>,
}

impl InputSnapshot {
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        self.descriptor.dtype()
    }

    #[must_use]
    pub fn shape(&self) -> Option<&[usize]> {
        self.descriptor.shape()
    }

    /// Borrows the upstream buffer as an `f64` slice, if bound and allocated.
    pub fn with_f64<R>(&self, f: impl FnOnce(&[f64]) -> R) -> Option<R> {
        let b = self.buffer.as_ref()?;
        let b = b.borrow();
        b.as_f64_slice().map(f)
    }
}

/// Context handed to [`NodeKernel::type_function`]: inputs resolved read-only, outputs mutable.
#[derive(Debug)]
pub struct TypeFunctionContext<'a> {
    pub node: NodeId,
    pub inputs: &'a [InputSnapshot],
    pub outputs: &'a mut PortContainer<OutputPort>,
}

/// Context handed to [`NodeKernel::eval`].
#[derive(Debug)]
pub struct EvalContext<'a> {
    pub node: NodeId,
    pub inputs: &'a [InputSnapshot],
    pub outputs: &'a mut PortContainer<OutputPort>,
}

/// Context handed to [`NodeKernel::post_allocate`]: every output, freshly (re)allocated this
/// `close()` (spec §4.2 `_post_allocate`, e.g. caching a raw buffer pointer once it is stable).
#[derive(Debug)]
pub struct PostAllocateContext<'a> {
    pub node: NodeId,
    pub outputs: &'a mut PortContainer<OutputPort>,
}

/// Context handed to [`NodeKernel::on_taint`]: identifies which of this node's own bound inputs
/// (if any) was the immediate origin of the taint call, for kernels whose behavior depends on
/// which side of a bidirectional relationship changed (spec §4.2 `_on_taint(caller)`).
#[derive(Debug)]
pub struct OnTaintContext {
    pub node: NodeId,
    pub input: Option<u32>,
}

/// The computation a [`Node`] performs (spec §4.4: "type function" + "eval function").
///
/// Mirrors the teacher's instruction-level `eval`/dispatch split (`execution_graph::node`):
/// a type pass that only ever touches shapes/dtypes, and a data pass that only runs once the
/// former has succeeded for every node in the graph.
pub trait NodeKernel: fmt::Debug {
    /// Resolves this node's output descriptors from its input descriptors. Called once per
    /// node during `Graph::close`'s type-resolution pass (spec §4.5).
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError>;

    /// Computes this node's output data from its input data. Called by `Graph::touch`/`eval`
    /// whenever the node is tainted (spec §4.4).
    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError>;

    /// Input strategy override; nodes that do not grow new inputs can leave this at the
    /// default (`InputStrategy::Fail`).
    fn input_strategy(&self) -> InputStrategy {
        InputStrategy::Fail
    }

    /// Called once per node, after `Graph::close`'s allocation pass actually (re)allocated at
    /// least one of its outputs (spec §4.2 `_post_allocate`). The default does nothing; kernels
    /// that need to cache something buffer-address-dependent (a raw pointer, a stride) override
    /// it rather than recomputing that on every `eval`.
    fn post_allocate(&mut self, _ctx: &mut PostAllocateContext<'_>) -> Result<(), DagflowError> {
        Ok(())
    }

    /// Called whenever this node is tainted, before the default taint bookkeeping runs (spec
    /// §4.2 `_on_taint(caller)`). The default does nothing; a kernel whose behavior genuinely
    /// depends on which bound input changed most recently (rather than merely "something
    /// upstream changed") overrides it instead of routing that distinction through an ad hoc
    /// explicit setter.
    fn on_taint(&mut self, _ctx: &mut OnTaintContext) {}

    /// Downcasting hook for callers that need to reach into a specific kernel's own state (e.g.
    /// `dagflow_params`'s `Parameter::set_value` poking a source node's stored value directly).
    /// Default implementations just return `self`.
    fn as_any_mut(&mut self) -> &mut dyn core::any::Any;
}

/// One node's full record: identity, ports, flags, and kernel (spec §4.3 `Node`).
pub struct Node {
    pub(crate) name: Box<str>,
    pub(crate) labels: Labels,
    pub(crate) flags: FlagsDescriptor,
    pub(crate) inputs: PortContainer<InputPort>,
    pub(crate) outputs: PortContainer<OutputPort>,
    pub(crate) kernel: Box<dyn NodeKernel>,
    /// Counter incremented by `InputStrategy::AddNewInputAddNewOutputForBlock`'s scope guard
    /// (spec §9 supplement), identifying which "block" a grown input belongs to.
    pub(crate) scope_id: u32,
    /// The `(scope_id, output index)` most recently grown under `ForBlock`, so growth within the
    /// same scope reuses one output instead of minting a fresh one per input.
    pub(crate) scope_output: Option<(u32, u32)>,
    /// `(output index, members assigned so far)` for the currently-open
    /// `InputStrategy::AddNewInputAddNewOutputForNInputs` group, if this node grows that way.
    pub(crate) ngroup_state: Option<(u32, u32)>,
    /// The last error this node's `type_function`/`allocate`/`eval` raised, if any (spec §3
    /// "exception slot"); cleared on the next successful run of whichever pass failed.
    pub(crate) exception: Option<DagflowError>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("inputs", &self.inputs.len_all())
            .field("outputs", &self.outputs.len_all())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub(crate) fn new(name: impl Into<Box<str>>, kernel: Box<dyn NodeKernel>) -> Self {
        let name = name.into();
        Self {
            labels: Labels::from_text(name.clone()),
            name,
            flags: FlagsDescriptor::new(),
            inputs: PortContainer::new(),
            outputs: PortContainer::new(),
            kernel,
            scope_id: 0,
            scope_output: None,
            ngroup_state: None,
            exception: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut Labels {
        &mut self.labels
    }

    #[must_use]
    pub fn flags(&self) -> FlagsDescriptor {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut FlagsDescriptor {
        &mut self.flags
    }

    #[must_use]
    pub fn inputs(&self) -> &PortContainer<InputPort> {
        &self.inputs
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut PortContainer<InputPort> {
        &mut self.inputs
    }

    #[must_use]
    pub fn outputs(&self) -> &PortContainer<OutputPort> {
        &self.outputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut PortContainer<OutputPort> {
        &mut self.outputs
    }

    #[must_use]
    pub fn input_strategy(&self) -> InputStrategy {
        self.kernel.input_strategy()
    }

    /// The last error this node's `type_function`/`allocate`/`eval` raised, if it has not since
    /// succeeded (spec §3 "exception slot").
    #[must_use]
    pub fn exception(&self) -> Option<&DagflowError> {
        self.exception.as_ref()
    }

    pub(crate) fn set_exception(&mut self, exception: Option<DagflowError>) {
        self.exception = exception;
    }

    /// Starts a new `ForBlock` scope: the next inputs grown by
    /// `InputStrategy::AddNewInputAddNewOutputForBlock` share one freshly minted output, until the
    /// next call to this method starts the following scope (spec §9 supplement, Scenario S6).
    /// Returns the new scope id.
    pub fn open_input_scope(&mut self) -> u32 {
        self.scope_id += 1;
        self.scope_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Identity;
    impl NodeKernel for Identity {
        fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            if let (Some(first), Some(out)) = (ctx.inputs.first(), ctx.outputs.get_index_mut(0)) {
                if let Some(dt) = first.dtype() {
                    out.descriptor_mut().set_dtype(dt);
                }
                if let Some(shape) = first.shape() {
                    out.descriptor_mut().set_shape(Some(shape.to_vec()));
                }
            }
            Ok(())
        }

        fn eval(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
            self
        }
    }

    #[test]
    fn output_allocates_only_when_descriptor_is_resolved() {
        let mut out = OutputPort::new("result");
        assert!(out.allocate().is_err());
        out.descriptor_mut().set_dtype(DType::F64);
        out.descriptor_mut().set_shape(Some(alloc::vec![3]));
        out.allocate().unwrap();
        assert!(out.has_data());
    }

    #[test]
    fn seti_taints_unless_frozen() {
        let mut out = OutputPort::new("result");
        out.descriptor_mut().set_dtype(DType::F64);
        out.descriptor_mut().set_shape(Some(alloc::vec![1]));
        out.allocate().unwrap();
        out.flags_mut().mark_fresh();
        out.flags_mut().freeze();
        assert!(!out.seti(0, 1.0, false));
        assert!(out.seti(0, 2.0, true));
    }

    #[test]
    fn allocating_child_slot_is_exclusive() {
        let mut out = OutputPort::new("result");
        let a = InputRef::new(NodeId::new(1), 0);
        let b = InputRef::new(NodeId::new(2), 0);
        out.claim_allocating_child(a).unwrap();
        out.claim_allocating_child(a).unwrap();
        assert!(out.claim_allocating_child(b).is_err());
    }

    #[test]
    fn node_constructs_with_default_kernel_strategy() {
        let n = Node::new("id", Box::new(Identity));
        assert_eq!(n.input_strategy(), InputStrategy::Fail);
        assert!(n.flags().tainted());
    }

    #[test]
    fn forbid_reallocation_refuses_an_allocating_child() {
        let mut out = OutputPort::new("result");
        out.set_forbid_reallocation(true);
        let a = InputRef::new(NodeId::new(1), 0);
        assert!(out.claim_allocating_child(a).is_err());
    }

    #[test]
    fn node_exception_slot_starts_empty_and_is_settable() {
        let mut n = Node::new("id", Box::new(Identity));
        assert!(n.exception().is_none());
        n.set_exception(Some(DagflowError::critical("boom")));
        assert!(n.exception().is_some());
        n.set_exception(None);
        assert!(n.exception().is_none());
    }

    #[test]
    fn default_kernel_hooks_are_no_ops() {
        let mut k = Identity;
        let mut outputs: PortContainer<OutputPort> = PortContainer::new();
        outputs.add(OutputPort::new("out"), true, true, false).unwrap();
        let mut ctx = PostAllocateContext {
            node: NodeId::new(0),
            outputs: &mut outputs,
        };
        assert!(k.post_allocate(&mut ctx).is_ok());
        k.on_taint(&mut OnTaintContext {
            node: NodeId::new(0),
            input: Some(0),
        });
    }
}
