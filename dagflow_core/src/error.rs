// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error kinds for graph construction, closing, and evaluation.
//!
//! One flat enum carrying optional node/port context, with a hand-written [`core::fmt::Display`]
//! and [`core::error::Error`] impl, matching `execution_graph::graph::GraphError`'s shape rather
//! than pulling in a derive macro crate.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use crate::ids::{InputRef, NodeId, OutputRef};

/// All failure modes exposed by `dagflow_core` (spec §7).
#[derive(Clone, Debug, PartialEq)]
pub enum DagflowError {
    /// Bad constructor arguments.
    Initialization { message: String },
    /// A type-function constraint was violated during close.
    TypeFunction { node: NodeId, message: String },
    /// Buffer allocation conflict, or reallocation forbidden.
    Allocation { node: NodeId, message: String },
    /// A wiring violation (shape-agnostic).
    Connection { message: String },
    /// An input was already bound and may not be reconnected.
    Reconnection { input: InputRef },
    /// `close()` failed to resolve types/allocate for some node.
    Closing { node: NodeId, message: String },
    /// An output/node was read or closed while not closed.
    UnclosedGraph { node: NodeId, message: String },
    /// A mutation was attempted on an already-closed node/graph.
    ClosedGraph { node: NodeId, message: String },
    /// `open()` failed because a downstream node refused to reopen.
    Opening { node: NodeId },
    /// A kernel raised during `touch`/`eval`.
    Calculation { node: NodeId, message: String },
    /// An unrecoverable invariant violation.
    Critical { message: String },
    /// The node id or port ref did not resolve within the graph.
    BadId,
}

impl DagflowError {
    #[inline]
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization {
            message: message.into(),
        }
    }

    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[inline]
    pub fn critical(message: impl Into<String>) -> Self {
        Self::Critical {
            message: message.into(),
        }
    }
}

impl fmt::Display for DagflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization { message } => write!(f, "initialization error: {message}"),
            Self::TypeFunction { node, message } => {
                write!(f, "type function error: node={} {message}", node.index())
            }
            Self::Allocation { node, message } => {
                write!(f, "allocation error: node={} {message}", node.index())
            }
            Self::Connection { message } => write!(f, "connection error: {message}"),
            Self::Reconnection { input } => {
                write!(
                    f,
                    "reconnection error: input node={} index={} is already bound",
                    input.node.index(),
                    input.index
                )
            }
            Self::Closing { node, message } => {
                write!(f, "closing error: node={} {message}", node.index())
            }
            Self::UnclosedGraph { node, message } => {
                write!(f, "unclosed graph error: node={} {message}", node.index())
            }
            Self::ClosedGraph { node, message } => {
                write!(f, "closed graph error: node={} {message}", node.index())
            }
            Self::Opening { node } => {
                write!(f, "opening error: node={} refused to reopen", node.index())
            }
            Self::Calculation { node, message } => {
                write!(f, "calculation error: node={} {message}", node.index())
            }
            Self::Critical { message } => write!(f, "critical error: {message}"),
            Self::BadId => write!(f, "bad node or port id"),
        }
    }
}

impl core::error::Error for DagflowError {}

/// Ergonomic conversion for helpers that only have an output context at hand.
impl DagflowError {
    pub(crate) fn output_context(node: NodeId, output: OutputRef, message: impl Into<String>) -> Self {
        let message: String = message.into();
        debug_assert_eq!(output.node, node);
        Self::Allocation {
            node,
            message: {
                let mut s = String::from("output[");
                s.push_str(&itoa(output.index));
                s.push_str("]: ");
                s.push_str(&message);
                s
            },
        }
    }
}

fn itoa(v: u32) -> Box<str> {
    alloc::format!("{v}").into_boxed_str()
}
