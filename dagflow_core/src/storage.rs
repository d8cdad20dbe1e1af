// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`NodeStorage`]: a dotted-path directory over nodes/ports (spec §4.10), grounded in
//! `examples/original_source/dagflow/core/storage.py`'s `NodeStorage`.
//!
//! Like [`crate::graph::Graph`], this is a cloneable `Rc<RefCell<_>>` handle: the thread-local
//! "current storage" context (spec §6) needs to hand out independent handles to the same
//! directory, not clone the directory itself. Unlike the original's `NestedMKDict`, which stores
//! live node/port objects and therefore carries no graph of its own, entries here are bare
//! [`NodeId`]/[`OutputRef`]/[`InputRef`] handles, so the storage keeps a [`Graph`] alongside them
//! to resolve bulk connections against (spec §4.10 `NodeStorage.__rshift__`).

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::ops::{Shl, Shr};

use hashbrown::HashMap;

use crate::connect::{In, Nd, Out};
use crate::error::DagflowError;
use crate::graph::{Graph, GraphOptions};
use crate::ids::{InputRef, NodeId, OutputRef};
use crate::labels::Labels;

/// What a storage entry points at.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageEntry {
    Node(NodeId),
    Output(OutputRef),
    Input(InputRef),
}

struct StorageInner {
    entries: HashMap<Box<str>, StorageEntry>,
    labels: HashMap<Box<str>, Labels>,
}

/// A dotted-key directory of node/port handles (spec §4.10).
#[derive(Clone)]
pub struct NodeStorage {
    graph: Graph,
    inner: Rc<RefCell<StorageInner>>,
}

impl core::fmt::Debug for NodeStorage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeStorage")
            .field("entries", &self.inner.borrow().entries.len())
            .finish()
    }
}

impl Default for NodeStorage {
    fn default() -> Self {
        Self::new(Graph::new(GraphOptions::default()))
    }
}

impl NodeStorage {
    /// Creates an empty storage bound to `graph` — every entry it holds is assumed to live on
    /// that graph, which is what lets [`Self::connect_into`] resolve `>>`/`<<` without the caller
    /// threading a `&Graph` through every bulk-connect call.
    #[must_use]
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            inner: Rc::new(RefCell::new(StorageInner {
                entries: HashMap::new(),
                labels: HashMap::new(),
            })),
        }
    }

    #[must_use]
    pub fn graph(&self) -> Graph {
        self.graph.clone()
    }

    /// Registers `entry` under `path` (e.g. `"detector.channel1.signal"`), refusing to overwrite
    /// an existing path (spec §4.10 invariant: paths are unique within one storage).
    pub fn insert(&self, path: impl Into<Box<str>>, entry: StorageEntry) -> Result<(), DagflowError> {
        let path = path.into();
        let mut inner = self.inner.borrow_mut();
        if inner.entries.contains_key(&path) {
            return Err(DagflowError::initialization(alloc::format!(
                "storage path already in use: {path}"
            )));
        }
        inner.entries.insert(path, entry);
        Ok(())
    }

    pub fn insert_labels(&self, path: impl Into<Box<str>>, labels: Labels) {
        self.inner.borrow_mut().labels.insert(path.into(), labels);
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<StorageEntry> {
        self.inner.borrow().entries.get(path).copied()
    }

    /// Returns a handle to the sub-directory rooted at `prefix`: every path in the result is the
    /// corresponding `prefix.*` path in `self` with the `prefix.` stripped, sharing the same graph
    /// (spec §4.10 `NestedMKDict.child`/`NodeStorage("prefix")`). Writes to the child are not
    /// reflected back into `self` — this is a snapshot view, not a live one, since the flat
    /// dotted-key map underneath has no addressable sub-tree to alias.
    #[must_use]
    pub fn child(&self, prefix: &str) -> Self {
        let child = Self::new(self.graph.clone());
        let full_prefix = alloc::format!("{prefix}.");
        let inner = self.inner.borrow();
        let mut child_inner = child.inner.borrow_mut();
        for (path, entry) in &inner.entries {
            if let Some(rest) = path.strip_prefix(full_prefix.as_str()) {
                child_inner.entries.insert(rest.into(), *entry);
            }
        }
        for (path, labels) in &inner.labels {
            if let Some(rest) = path.strip_prefix(full_prefix.as_str()) {
                child_inner.labels.insert(rest.into(), labels.clone());
            }
        }
        drop(child_inner);
        drop(inner);
        child
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// All `(path, entry)` pairs in the storage, sorted by path for deterministic iteration
    /// (`walkitems`, spec §4.10), grounded in `storage.py`'s `NestedMKDict.walkitems`.
    #[must_use]
    pub fn walkitems(&self) -> Vec<(Box<str>, StorageEntry)> {
        let mut items: Vec<(Box<str>, StorageEntry)> =
            self.inner.borrow().entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items
    }

    /// All dotted paths this entry is registered under (`read_paths`, spec §4.10); an entry can
    /// be reachable from more than one path if it was inserted multiple times under aliases.
    #[must_use]
    pub fn read_paths(&self, entry: StorageEntry) -> Vec<Box<str>> {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|&(_, v)| *v == entry)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Merges labels from every registered prefix group of `path`, longest prefix first
    /// (`read_labels`, spec §4.10): `"a.b.c"` picks up defaults from `"a.b"` then `"a"` for any
    /// field `"a.b.c"` itself leaves unset.
    #[must_use]
    pub fn read_labels(&self, path: &str) -> Labels {
        let inner = self.inner.borrow();
        let mut labels = inner.labels.get(path).cloned().unwrap_or_default();
        let mut prefix: &str = path;
        while let Some(dot) = prefix.rfind('.') {
            prefix = &prefix[..dot];
            if let Some(group) = inner.labels.get(prefix) {
                labels.merge_missing(group);
            }
        }
        labels
    }

    /// Splits a dotted path into its components, for callers building a path incrementally.
    #[must_use]
    pub fn split_path(path: &str) -> Vec<&str> {
        path.split('.').collect()
    }

    #[must_use]
    pub fn join_path(parts: &[&str]) -> String {
        parts.join(".")
    }

    /// Bulk-connects every path `self` shares with `other`, treating `self`'s entry as the source
    /// (`Output` or `Node`) and `other`'s as the destination (`Input` or `Node`); errors if nothing
    /// matched (spec §4.10 `NodeStorage.__rshift__`).
    ///
    /// Grounded in `storage.py`'s `match_keys(left_in_right=True, right_in_left=False)` bulk
    /// connect, simplified to exact dotted-path equality — the original additionally matches paths
    /// of unequal length by common suffix, which has no clean analogue over this flat key space.
    /// When `remove_connected_inputs` is set, every matched path is removed from `other` afterward
    /// (`storage.py`'s `_remove_connected_inputs` option), so a storage of spare inputs can be
    /// drained as it's wired up.
    pub fn connect_into(&self, other: &Self, remove_connected_inputs: bool) -> Result<usize, DagflowError> {
        let left_paths: Vec<Box<str>> = self.inner.borrow().entries.keys().cloned().collect();
        let mut connected = 0usize;
        let mut consumed = Vec::new();
        for path in left_paths {
            let left_entry = self.inner.borrow().entries.get(&path).copied();
            let right_entry = other.inner.borrow().entries.get(&path).copied();
            let (Some(left_entry), Some(right_entry)) = (left_entry, right_entry) else {
                continue;
            };
            self.connect_pair(left_entry, right_entry).map_err(|e| {
                DagflowError::connection(alloc::format!("bulk connect failed at `{path}`: {e}"))
            })?;
            connected += 1;
            if remove_connected_inputs {
                consumed.push(path);
            }
        }
        if connected == 0 {
            return Err(DagflowError::connection("bulk connect matched zero paths between the two storages"));
        }
        if remove_connected_inputs {
            let mut inner = other.inner.borrow_mut();
            for path in consumed {
                inner.entries.remove(&path);
            }
        }
        Ok(connected)
    }

    fn connect_pair(&self, left: StorageEntry, right: StorageEntry) -> Result<(), DagflowError> {
        let graph = &self.graph;
        match (left, right) {
            (StorageEntry::Output(o), StorageEntry::Input(i)) => {
                Out::new(graph.clone(), o) >> In::new(graph.clone(), i)
            }
            (StorageEntry::Output(o), StorageEntry::Node(n)) => {
                (Out::new(graph.clone(), o) >> Nd::new(graph.clone(), n)).map(|_| ())
            }
            (StorageEntry::Node(a), StorageEntry::Node(b)) => {
                (Nd::new(graph.clone(), a) >> Nd::new(graph.clone(), b)).map(|_| ())
            }
            (StorageEntry::Node(a), StorageEntry::Input(i)) => {
                let output = graph
                    .with_node(a, |n| {
                        n.outputs()
                            .positional_indices()
                            .first()
                            .map(|&idx| OutputRef::new(a, idx as u32))
                    })?
                    .ok_or_else(|| DagflowError::connection("node has no positional output"))?;
                graph.connect(output, i)
            }
            _ => Err(DagflowError::connection(
                "storage entry kinds are not connectable (need an output/node source and an input/node destination)",
            )),
        }
    }
}

/// `left >> right`: bulk-connects every path `left` shares with `right`, `left`'s entries as
/// sources (spec §4.10).
impl Shr<&NodeStorage> for &NodeStorage {
    type Output = Result<usize, DagflowError>;

    fn shr(self, rhs: &NodeStorage) -> Self::Output {
        self.connect_into(rhs, false)
    }
}

/// `left << right`: bulk-connects every path `left` shares with `right`, `right`'s entries as
/// sources (spec §4.10 `NodeStorage.__lshift__`, simplified here to the mirror image of `>>` —
/// the original additionally dispatches per left-hand entry's own `__lshift__`, which has no
/// analogue over this flat, type-erased entry model).
impl Shl<&NodeStorage> for &NodeStorage {
    type Output = Result<usize, DagflowError>;

    fn shl(self, rhs: &NodeStorage) -> Self::Output {
        rhs.connect_into(self, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{EvalContext, NodeKernel, TypeFunctionContext};
    use alloc::boxed::Box as StdBox;

    struct PassThrough;
    impl NodeKernel for PassThrough {
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

    fn graph() -> Graph {
        Graph::new(GraphOptions::default())
    }

    #[test]
    fn insert_then_get_round_trips() {
        let s = NodeStorage::new(graph());
        let id = NodeId::new(3);
        s.insert("a.b.node", StorageEntry::Node(id)).unwrap();
        assert_eq!(s.get("a.b.node"), Some(StorageEntry::Node(id)));
    }

    #[test]
    fn duplicate_path_is_rejected() {
        let s = NodeStorage::new(graph());
        s.insert("x", StorageEntry::Node(NodeId::new(0))).unwrap();
        assert!(s.insert("x", StorageEntry::Node(NodeId::new(1))).is_err());
    }

    #[test]
    fn read_labels_merges_longest_prefix_first() {
        let s = NodeStorage::new(graph());
        let mut group = Labels::new();
        group.axis = Some("shared-axis".into());
        s.insert_labels("a.b", group);

        let mut leaf = Labels::new();
        leaf.text = Some("leaf".into());
        s.insert_labels("a.b.c", leaf);

        let merged = s.read_labels("a.b.c");
        assert_eq!(merged.text.as_deref(), Some("leaf"));
        assert_eq!(merged.axis.as_deref(), Some("shared-axis"));
    }

    #[test]
    fn walkitems_returns_every_entry_in_path_order() {
        let s = NodeStorage::new(graph());
        s.insert("b", StorageEntry::Node(NodeId::new(1))).unwrap();
        s.insert("a", StorageEntry::Node(NodeId::new(0))).unwrap();
        let paths: Vec<StdBox<str>> = s.walkitems().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths.as_ref(), [StdBox::from("a"), StdBox::from("b")]);
    }

    #[test]
    fn child_strips_the_shared_prefix() {
        let s = NodeStorage::new(graph());
        s.insert("detector.signal", StorageEntry::Node(NodeId::new(0))).unwrap();
        s.insert("detector.background", StorageEntry::Node(NodeId::new(1))).unwrap();
        s.insert("unrelated", StorageEntry::Node(NodeId::new(2))).unwrap();

        let detector = s.child("detector");
        assert_eq!(detector.len(), 2);
        assert_eq!(detector.get("signal"), Some(StorageEntry::Node(NodeId::new(0))));
        assert!(detector.get("unrelated").is_none());
    }

    #[test]
    fn bulk_connect_wires_every_shared_path() {
        let g = graph();
        let a = g.add_node("a", StdBox::new(PassThrough)).unwrap();
        let b = g.add_node("b", StdBox::new(PassThrough)).unwrap();
        let out_a = g.add_output(a, "out", true, false).unwrap();
        let in_b = g.add_input(b, "in", true, false).unwrap();

        let left = NodeStorage::new(g.clone());
        left.insert("signal", StorageEntry::Output(out_a)).unwrap();
        let right = NodeStorage::new(g.clone());
        right.insert("signal", StorageEntry::Input(in_b)).unwrap();

        let n = (&left >> &right).unwrap();
        assert_eq!(n, 1);
        assert!(g.with_node(b, |n| n.inputs().get_positional(0).unwrap().is_bound()).unwrap());
    }

    #[test]
    fn bulk_connect_with_no_shared_paths_errors() {
        let g = graph();
        let left = NodeStorage::new(g.clone());
        left.insert("a", StorageEntry::Node(NodeId::new(0))).unwrap();
        let right = NodeStorage::new(g);
        right.insert("b", StorageEntry::Node(NodeId::new(0))).unwrap();
        assert!((&left >> &right).is_err());
    }

    #[test]
    fn bulk_connect_can_drain_consumed_inputs_from_the_rhs() {
        let g = graph();
        let a = g.add_node("a", StdBox::new(PassThrough)).unwrap();
        let b = g.add_node("b", StdBox::new(PassThrough)).unwrap();
        let out_a = g.add_output(a, "out", true, false).unwrap();
        let in_b = g.add_input(b, "in", true, false).unwrap();

        let left = NodeStorage::new(g.clone());
        left.insert("signal", StorageEntry::Output(out_a)).unwrap();
        let right = NodeStorage::new(g);
        right.insert("signal", StorageEntry::Input(in_b)).unwrap();

        left.connect_into(&right, true).unwrap();
        assert!(right.get("signal").is_none());
    }

    #[test]
    fn left_shift_treats_the_right_hand_side_as_the_source() {
        let g = graph();
        let a = g.add_node("a", StdBox::new(PassThrough)).unwrap();
        let b = g.add_node("b", StdBox::new(PassThrough)).unwrap();
        let out_a = g.add_output(a, "out", true, false).unwrap();
        let in_b = g.add_input(b, "in", true, false).unwrap();

        let sources = NodeStorage::new(g.clone());
        sources.insert("signal", StorageEntry::Output(out_a)).unwrap();
        let sinks = NodeStorage::new(g.clone());
        sinks.insert("signal", StorageEntry::Input(in_b)).unwrap();

        let n = (&sinks << &sources).unwrap();
        assert_eq!(n, 1);
        assert!(g.with_node(b, |n| n.inputs().get_positional(0).unwrap().is_bound()).unwrap());
    }

    #[test]
    fn add_node_auto_registers_into_the_current_storage() {
        let g = graph();
        let storage = NodeStorage::new(g.clone());
        #[cfg(feature = "std")]
        {
            let _scope = crate::context::push_storage(storage.clone());
            let id = g.add_node("my_node", StdBox::new(PassThrough)).unwrap();
            assert_eq!(storage.get("my_node"), Some(StorageEntry::Node(id)));
        }
        #[cfg(not(feature = "std"))]
        {
            let _ = storage;
        }
    }
}
