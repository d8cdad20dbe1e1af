// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena handles used in place of the shared-object references a dynamic host would use.
//!
//! The graph owns every [`crate::node::NodeRecord`] in a single arena (`Vec`); everything else
//! (ports, edges, parameters) refers to nodes and ports through these small `Copy` ids rather than
//! through pointers. This mirrors the "arena with integer handles" alternative noted for
//! `MetaNode`'s weak back-reference in the design notes, applied uniformly to the whole graph.

/// Identifies a node within a [`crate::graph::Graph`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw arena index backing this id.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifies an output port: the owning node plus its index within that node's output
/// [`crate::port::PortContainer`] (insertion order, i.e. the "all" ordering).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct OutputRef {
    pub node: NodeId,
    pub index: u32,
}

impl OutputRef {
    #[inline]
    pub const fn new(node: NodeId, index: u32) -> Self {
        Self { node, index }
    }
}

/// Identifies an input port: the owning node plus its index within that node's input
/// [`crate::port::PortContainer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InputRef {
    pub node: NodeId,
    pub index: u32,
}

impl InputRef {
    #[inline]
    pub const fn new(node: NodeId, index: u32) -> Self {
        Self { node, index }
    }
}
