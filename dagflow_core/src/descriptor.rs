// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`DataDescriptor`]: dtype + shape + axis metadata for one port (spec §3, §4.1).

use alloc::vec::Vec;

use crate::buffer::{Buffer, DType};
use crate::ids::OutputRef;

/// Which axis-metadata kind a caller is asking about (spec §4.1 `axis_label`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AxisKind {
    Any,
    Edges,
    Mesh,
}

/// dtype + shape + axis-edges + axis-meshes metadata for one port.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataDescriptor {
    dtype: Option<DType>,
    shape: Option<Vec<usize>>,
    axes_edges: Vec<Option<OutputRef>>,
    axes_meshes: Vec<Option<OutputRef>>,
}

impl DataDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    #[inline]
    pub fn dtype(&self) -> Option<DType> {
        self.dtype
    }

    #[inline]
    pub fn set_dtype(&mut self, dtype: DType) {
        self.dtype = Some(dtype);
    }

    #[must_use]
    #[inline]
    pub fn shape(&self) -> Option<&[usize]> {
        self.shape.as_deref()
    }

    /// Coerces `shape` into the resolved form, or clears it when `None` (unresolved).
    pub fn set_shape(&mut self, shape: Option<Vec<usize>>) {
        self.shape = shape;
    }

    /// Rank of the shape (`None` while unresolved).
    #[must_use]
    pub fn dim(&self) -> Option<usize> {
        self.shape.as_ref().map(Vec::len)
    }

    /// Product of the shape's dimensions (`None` while unresolved).
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        self.shape.as_ref().map(|s| s.iter().product())
    }

    #[must_use]
    pub fn axes_edges(&self) -> &[Option<OutputRef>] {
        &self.axes_edges
    }

    pub fn set_axes_edges(&mut self, edges: Vec<Option<OutputRef>>) {
        self.axes_edges = edges;
    }

    #[must_use]
    pub fn axes_meshes(&self) -> &[Option<OutputRef>] {
        &self.axes_meshes
    }

    pub fn set_axes_meshes(&mut self, meshes: Vec<Option<OutputRef>>) {
        self.axes_meshes = meshes;
    }

    /// `edges_arrays()`/`meshes_arrays()` (spec §4.1): the referenced edge/mesh output refs,
    /// skipping axes that have none assigned.
    #[must_use]
    pub fn edges_arrays(&self) -> Vec<OutputRef> {
        self.axes_edges.iter().filter_map(|o| *o).collect()
    }

    #[must_use]
    pub fn meshes_arrays(&self) -> Vec<OutputRef> {
        self.axes_meshes.iter().filter_map(|o| *o).collect()
    }

    /// Shape-AND-dtype match against a concrete buffer (spec §4.1 `consistent_with`).
    #[must_use]
    pub fn consistent_with(&self, buf: &Buffer) -> bool {
        let Some(dtype) = self.dtype else {
            return false;
        };
        let Some(size) = self.size() else {
            return false;
        };
        dtype == buf.dtype() && size == buf.len()
    }

    /// Histogram-edges invariant (spec §3): an edges array on axis `i` must be 1-D with
    /// `shape[i] + 1` elements.
    #[must_use]
    pub fn edges_len_for_axis(&self, axis: usize) -> Option<usize> {
        self.shape.as_ref().and_then(|s| s.get(axis)).map(|n| n + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistent_with_checks_shape_and_dtype() {
        let mut dd = DataDescriptor::new();
        dd.set_dtype(DType::F64);
        dd.set_shape(Some(alloc::vec![2, 3]));
        assert_eq!(dd.size(), Some(6));

        let ok = Buffer::zeroed(DType::F64, 6);
        let wrong_dtype = Buffer::zeroed(DType::F32, 6);
        let wrong_size = Buffer::zeroed(DType::F64, 5);

        assert!(dd.consistent_with(&ok));
        assert!(!dd.consistent_with(&wrong_dtype));
        assert!(!dd.consistent_with(&wrong_size));
    }

    #[test]
    fn unresolved_shape_is_never_consistent() {
        let mut dd = DataDescriptor::new();
        dd.set_dtype(DType::F64);
        assert!(!dd.consistent_with(&Buffer::zeroed(DType::F64, 0)));
    }
}
