// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread-local "current graph" / "current storage" context stacks (spec §6 `with Graph(...)`,
//! `with NodeStorage(...)`), available only with the `std` feature since `thread_local!` needs an
//! allocator-backed TLS slot the `no_std` build does not provide.

extern crate std;

use core::cell::RefCell;
use std::thread_local;

use crate::graph::Graph;
use crate::storage::NodeStorage;

thread_local! {
    static GRAPH_STACK: RefCell<alloc::vec::Vec<Graph>> = const { RefCell::new(alloc::vec::Vec::new()) };
    static STORAGE_STACK: RefCell<alloc::vec::Vec<NodeStorage>> = const { RefCell::new(alloc::vec::Vec::new()) };
}

/// RAII guard pushed by [`push_graph`]; popping happens on drop, so a panic mid-scope still
/// restores the previous context (spec §6's `with`-block semantics).
#[must_use]
#[derive(Debug)]
pub struct GraphScope(());

impl Drop for GraphScope {
    fn drop(&mut self) {
        GRAPH_STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// Pushes `graph` as the current graph for the lifetime of the returned guard.
pub fn push_graph(graph: Graph) -> GraphScope {
    GRAPH_STACK.with(|s| s.borrow_mut().push(graph));
    GraphScope(())
}

/// Returns the innermost currently-active graph, if any (used by node-constructor helpers that
/// omit an explicit `&Graph` argument, as in Python's `with Graph(): Array(...)` idiom).
#[must_use]
pub fn current_graph() -> Option<Graph> {
    GRAPH_STACK.with(|s| s.borrow().last().cloned())
}

/// RAII guard pushed by [`push_storage`].
#[must_use]
#[derive(Debug)]
pub struct StorageScope(());

impl Drop for StorageScope {
    fn drop(&mut self) {
        STORAGE_STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

pub fn push_storage(storage: NodeStorage) -> StorageScope {
    STORAGE_STACK.with(|s| s.borrow_mut().push(storage));
    StorageScope(())
}

#[must_use]
pub fn current_storage() -> Option<NodeStorage> {
    STORAGE_STACK.with(|s| s.borrow().last().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphOptions;

    #[test]
    fn graph_scope_restores_previous_context_on_drop() {
        assert!(current_graph().is_none());
        let g1 = Graph::new(GraphOptions::default());
        {
            let _scope1 = push_graph(g1.clone());
            assert!(current_graph().is_some());
            let g2 = Graph::new(GraphOptions::default());
            {
                let _scope2 = push_graph(g2);
                assert_eq!(current_graph().unwrap().node_count(), 0);
            }
            // scope2 dropped: back to g1.
            assert!(current_graph().is_some());
        }
        assert!(current_graph().is_none());
    }
}
