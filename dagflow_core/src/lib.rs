// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A directed acyclic dataflow engine for numerical computation.
//!
//! A [`graph::Graph`] owns an arena of [`node::Node`]s connected by typed ports. Closing the
//! graph runs a two-phase pass — type resolution, then buffer allocation — after which the graph
//! supports pull-based incremental evaluation: [`graph::Graph::touch`] recomputes only the nodes
//! whose [`flags::FlagsDescriptor`] is tainted, walking upstream first.
//!
//! `no_std` by default (`alloc` is required); enable the `std` feature for the thread-local
//! [`context`] module and for `log`'s `std` backend.

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(not(test), forbid(unsafe_code))]

extern crate alloc;

pub mod buffer;
pub mod connect;
pub mod descriptor;
pub mod error;
pub mod flags;
pub mod ids;
pub mod labels;
pub mod meta_node;
pub mod node;
pub mod ops;
pub mod port;
pub mod storage;
pub mod strategy;
pub mod typefunc;

pub mod graph;

#[cfg(feature = "std")]
pub mod context;

pub use buffer::{Buffer, DType};
pub use connect::{In, Nd, Out};
pub use descriptor::{AxisKind, DataDescriptor};
pub use error::DagflowError;
pub use flags::FlagsDescriptor;
pub use graph::{Graph, GraphOptions};
pub use ids::{InputRef, NodeId, OutputRef};
pub use labels::Labels;
pub use meta_node::{MetaNode, MetaNodeStrategy};
pub use node::{
    EvalContext, InputPort, InputSnapshot, Node, NodeKernel, OnTaintContext, OutputPort,
    PostAllocateContext, TypeFunctionContext,
};
pub use ops::{Array, Product, Sum, ViewConcat, WeightedSum};
pub use port::{Named, PortContainer, PortKey};
pub use storage::{NodeStorage, StorageEntry};
pub use strategy::InputStrategy;
