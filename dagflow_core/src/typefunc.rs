// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reusable type-function building blocks (spec §4.4), ported from the small helper functions
//! scattered across `examples/original_source/dagflow/lib/common/` (`check_input_dimension`,
//! `evaluate_dtype_of_outputs`, `copy_from_input_to_output`) rather than one specific file.

use alloc::vec::Vec;

use crate::buffer::DType;
use crate::error::DagflowError;
use crate::ids::NodeId;
use crate::node::{InputSnapshot, OutputPort};
use crate::port::PortContainer;

/// Every input must be bound and shape-resolved before a type function can run; this returns the
/// first one that is not, for a uniform error message.
pub fn require_all_resolved(node: NodeId, inputs: &[InputSnapshot]) -> Result<(), DagflowError> {
    for (i, input) in inputs.iter().enumerate() {
        if input.buffer.is_none() {
            return Err(DagflowError::TypeFunction {
                node,
                message: alloc::format!("input[{i}] is not bound"),
            });
        }
        if input.shape().is_none() {
            return Err(DagflowError::TypeFunction {
                node,
                message: alloc::format!("input[{i}] has unresolved shape"),
            });
        }
    }
    Ok(())
}

/// Promotes all input dtypes to their common numpy-style supertype (spec §4.4
/// `evaluate_dtype_of_outputs`).
#[must_use]
pub fn evaluate_dtype_of_outputs(inputs: &[InputSnapshot]) -> Option<DType> {
    inputs
        .iter()
        .filter_map(InputSnapshot::dtype)
        .reduce(DType::promote)
}

/// Requires every input to share one exact shape, returning it (spec §4.4: elementwise nodes
/// like `Sum`/`Product`).
pub fn require_same_shape<'a>(
    node: NodeId,
    inputs: &'a [InputSnapshot],
) -> Result<&'a [usize], DagflowError> {
    require_all_resolved(node, inputs)?;
    let first = inputs[0].shape().expect("checked above");
    for (i, input) in inputs.iter().enumerate().skip(1) {
        let shape = input.shape().expect("checked above");
        if shape != first {
            return Err(DagflowError::TypeFunction {
                node,
                message: alloc::format!(
                    "input[{i}] shape {shape:?} does not match input[0] shape {first:?}"
                ),
            });
        }
    }
    Ok(first)
}

/// Copies dtype+shape from input 0 onto every output (spec §4.4 `copy_from_input_to_output`,
/// used by identity-shaped nodes such as `Identity`/`Jacobian`'s central value pass-through).
pub fn copy_input_zero_to_outputs(
    node: NodeId,
    inputs: &[InputSnapshot],
    outputs: &mut PortContainer<OutputPort>,
) -> Result<(), DagflowError> {
    require_all_resolved(node, inputs)?;
    let dtype = inputs[0].dtype().expect("checked above");
    let shape = inputs[0].shape().expect("checked above").to_vec();
    for out in outputs.iter_all_mut() {
        out.descriptor_mut().set_dtype(dtype);
        out.descriptor_mut().set_shape(Some(shape.clone()));
    }
    Ok(())
}

/// Requires exactly `expected` inputs (spec §4.4 `check_inputs_number`, ported from
/// `examples/original_source/dagflow/core/type_functions/input_type_functions.py`'s
/// `check_inputs_number`).
pub fn check_inputs_number(
    node: NodeId,
    inputs: &[InputSnapshot],
    expected: usize,
) -> Result<(), DagflowError> {
    if inputs.len() != expected {
        return Err(DagflowError::TypeFunction {
            node,
            message: alloc::format!("expected {expected} inputs, got {}", inputs.len()),
        });
    }
    Ok(())
}

/// Requires at least one input (spec §4.4 `check_node_has_inputs`/`check_has_inputs`).
pub fn check_node_has_inputs(node: NodeId, inputs: &[InputSnapshot]) -> Result<(), DagflowError> {
    if inputs.is_empty() {
        return Err(DagflowError::TypeFunction {
            node,
            message: "node has no inputs".into(),
        });
    }
    Ok(())
}

/// Requires every input's shape to have exactly `dim` axes (spec §4.4 `check_dimension_of_inputs`/
/// `check_input_dimension`).
pub fn check_dimension_of_inputs(
    node: NodeId,
    inputs: &[InputSnapshot],
    dim: usize,
) -> Result<(), DagflowError> {
    require_all_resolved(node, inputs)?;
    for (i, input) in inputs.iter().enumerate() {
        let shape = input.shape().expect("checked above");
        if shape.len() != dim {
            return Err(DagflowError::TypeFunction {
                node,
                message: alloc::format!(
                    "input[{i}] has {}d shape {shape:?}, expected {dim}d",
                    shape.len()
                ),
            });
        }
    }
    Ok(())
}

/// Requires every input to have exactly `shape` (spec §4.4 `check_shape_of_inputs`/
/// `check_input_shape`).
pub fn check_shape_of_inputs(
    node: NodeId,
    inputs: &[InputSnapshot],
    shape: &[usize],
) -> Result<(), DagflowError> {
    require_all_resolved(node, inputs)?;
    for (i, input) in inputs.iter().enumerate() {
        let got = input.shape().expect("checked above");
        if got != shape {
            return Err(DagflowError::TypeFunction {
                node,
                message: alloc::format!("input[{i}] shape {got:?} does not match expected {shape:?}"),
            });
        }
    }
    Ok(())
}

/// Requires every input to have exactly `dtype` (spec §4.4 `check_dtype_of_inputs`/
/// `check_input_dtype`).
pub fn check_dtype_of_inputs(
    node: NodeId,
    inputs: &[InputSnapshot],
    dtype: DType,
) -> Result<(), DagflowError> {
    for (i, input) in inputs.iter().enumerate() {
        let got = input.dtype().ok_or_else(|| DagflowError::TypeFunction {
            node,
            message: alloc::format!("input[{i}] has unresolved dtype"),
        })?;
        if got != dtype {
            return Err(DagflowError::TypeFunction {
                node,
                message: alloc::format!("input[{i}] dtype {got:?} does not match expected {dtype:?}"),
            });
        }
    }
    Ok(())
}

/// Requires every input's dtype to promote into `dtype` without narrowing it (spec §4.4
/// `check_subtype_of_inputs`/`check_input_subtype`: a looser check than
/// [`check_dtype_of_inputs`], accepting e.g. an `I32` input against an `F64` expectation).
pub fn check_subtype_of_inputs(
    node: NodeId,
    inputs: &[InputSnapshot],
    dtype: DType,
) -> Result<(), DagflowError> {
    for (i, input) in inputs.iter().enumerate() {
        let got = input.dtype().ok_or_else(|| DagflowError::TypeFunction {
            node,
            message: alloc::format!("input[{i}] has unresolved dtype"),
        })?;
        if got.promote(dtype) != dtype {
            return Err(DagflowError::TypeFunction {
                node,
                message: alloc::format!(
                    "input[{i}] dtype {got:?} is not a subtype of expected {dtype:?}"
                ),
            });
        }
    }
    Ok(())
}

/// Requires every input to share the same dtype and shape as input 0 (spec §4.4
/// `check_inputs_equivalence`); combines [`evaluate_dtype_of_outputs`]-style dtype agreement with
/// [`require_same_shape`].
pub fn check_inputs_equivalence(node: NodeId, inputs: &[InputSnapshot]) -> Result<(), DagflowError> {
    check_node_has_inputs(node, inputs)?;
    require_same_shape(node, inputs)?;
    let first = inputs[0].dtype().expect("checked by require_same_shape");
    for (i, input) in inputs.iter().enumerate().skip(1) {
        let dtype = input.dtype().expect("checked by require_same_shape");
        if dtype != first {
            return Err(DagflowError::TypeFunction {
                node,
                message: alloc::format!(
                    "input[{i}] dtype {dtype:?} does not match input[0] dtype {first:?}"
                ),
            });
        }
    }
    Ok(())
}

/// Requires every input to be a square 2-D matrix, returning the shared side length (spec §4.4
/// `check_inputs_are_square_matrices`/`check_input_square`).
pub fn check_inputs_are_square_matrices(
    node: NodeId,
    inputs: &[InputSnapshot],
) -> Result<usize, DagflowError> {
    check_node_has_inputs(node, inputs)?;
    require_all_resolved(node, inputs)?;
    let mut side = None;
    for (i, input) in inputs.iter().enumerate() {
        let shape = input.shape().expect("checked above");
        match shape {
            [n, m] if n == m => match side {
                None => side = Some(*n),
                Some(expected) if expected == *n => {}
                Some(expected) => {
                    return Err(DagflowError::TypeFunction {
                        node,
                        message: alloc::format!(
                            "input[{i}] is {n}x{n}, does not match earlier {expected}x{expected}"
                        ),
                    })
                }
            },
            other => {
                return Err(DagflowError::TypeFunction {
                    node,
                    message: alloc::format!("input[{i}] shape {other:?} is not a square matrix"),
                })
            }
        }
    }
    Ok(side.expect("checked has_inputs above"))
}

/// Requires every input to be either an `n x n` square matrix or its `n`-element diagonal (spec
/// §4.4 `check_inputs_are_matrices_or_diagonals`/`check_input_matrix_or_diag`), returning `n` and
/// whether any input was a full matrix rather than purely diagonals (mirrors `cholesky.py`'s
/// `ndim == 2` dispatch between `_fcn_square`/`_fcn_diagonal`).
pub fn check_inputs_are_matrices_or_diagonals(
    node: NodeId,
    inputs: &[InputSnapshot],
) -> Result<(usize, bool), DagflowError> {
    check_node_has_inputs(node, inputs)?;
    require_all_resolved(node, inputs)?;
    let mut side = None;
    let mut any_square = false;
    for (i, input) in inputs.iter().enumerate() {
        let shape = input.shape().expect("checked above");
        let n = match shape {
            [n] => *n,
            [n, m] if n == m => {
                any_square = true;
                *n
            }
            other => {
                return Err(DagflowError::TypeFunction {
                    node,
                    message: alloc::format!(
                        "input[{i}] shape {other:?} is neither a square matrix nor a diagonal"
                    ),
                })
            }
        };
        match side {
            None => side = Some(n),
            Some(expected) if expected == n => {}
            Some(expected) => {
                return Err(DagflowError::TypeFunction {
                    node,
                    message: alloc::format!("input[{i}] size {n} does not match earlier size {expected}"),
                })
            }
        }
    }
    Ok((side.expect("checked has_inputs above"), any_square))
}

/// Requires `a`'s column count to match `b`'s row count, as `A @ B` needs (spec §4.4
/// `check_inputs_are_matrix_multipliable`/`check_inputs_multiplicable_mat`), returning the
/// resulting `(rows, cols)` shape.
pub fn check_inputs_are_matrix_multipliable(
    node: NodeId,
    a: &InputSnapshot,
    b: &InputSnapshot,
) -> Result<(usize, usize), DagflowError> {
    require_all_resolved(node, core::slice::from_ref(a))?;
    require_all_resolved(node, core::slice::from_ref(b))?;
    let shape_a = a.shape().expect("checked above");
    let shape_b = b.shape().expect("checked above");
    let (&[ra, ca], &[rb, cb]) = (shape_a, shape_b) else {
        return Err(DagflowError::TypeFunction {
            node,
            message: alloc::format!(
                "matrix multiplication needs two 2d inputs, got {shape_a:?} and {shape_b:?}"
            ),
        });
    };
    if ca != rb {
        return Err(DagflowError::TypeFunction {
            node,
            message: alloc::format!(
                "cannot multiply a {ra}x{ca} matrix by a {rb}x{cb} matrix: inner dimensions disagree"
            ),
        });
    }
    Ok((ra, cb))
}

/// Copies axis metadata (edges, meshes, or both) from input 0 onto every output (spec §4.4
/// `assign_axes_from_inputs_to_outputs`, ported from
/// `examples/original_source/dagflow/core/type_functions/axes_type_functions.py`'s
/// `assign_axes_from_inputs_to_outputs`).
pub fn assign_axes_from_inputs_to_outputs(
    inputs: &[InputSnapshot],
    outputs: &mut PortContainer<OutputPort>,
    assign_edges: bool,
    assign_meshes: bool,
) {
    let Some(first) = inputs.first() else {
        return;
    };
    let edges = first.descriptor.axes_edges().to_vec();
    let meshes = first.descriptor.axes_meshes().to_vec();
    for out in outputs.iter_all_mut() {
        if assign_edges {
            out.descriptor_mut().set_axes_edges(edges.clone());
        }
        if assign_meshes {
            out.descriptor_mut().set_axes_meshes(meshes.clone());
        }
    }
}

/// Concatenated shape along axis 0 for [`crate::strategy::InputStrategy::ViewConcat`]-grown
/// inputs sharing one output (spec §9 supplement (7)).
#[must_use]
pub fn concat_shape_axis0(shapes: &[&[usize]]) -> Option<Vec<usize>> {
    let first = shapes.first()?;
    if first.is_empty() {
        return None;
    }
    let tail = &first[1..];
    let mut total = first[0];
    for s in &shapes[1..] {
        if &s[1..] != tail {
            return None;
        }
        total += s[0];
    }
    let mut out = Vec::with_capacity(first.len());
    out.push(total);
    out.extend_from_slice(tail);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DataDescriptor;

    fn snapshot(dtype: DType, shape: &[usize]) -> InputSnapshot {
        let mut d = DataDescriptor::new();
        d.set_dtype(dtype);
        d.set_shape(Some(shape.to_vec()));
        InputSnapshot {
            descriptor: d,
            buffer: Some(alloc::rc::Rc::new(core::cell::RefCell::new(
                crate::buffer::Buffer::zeroed(dtype, shape.iter().product()),
            ))),
        }
    }

    #[test]
    fn dtype_promotion_picks_the_widest_input() {
        let inputs = [snapshot(DType::I32, &[2]), snapshot(DType::F64, &[2])];
        assert_eq!(evaluate_dtype_of_outputs(&inputs), Some(DType::F64));
    }

    #[test]
    fn require_same_shape_rejects_a_mismatch() {
        let node = NodeId::new(0);
        let inputs = [snapshot(DType::F64, &[2, 2]), snapshot(DType::F64, &[3])];
        assert!(require_same_shape(node, &inputs).is_err());
    }

    #[test]
    fn concat_shape_axis0_sums_leading_dimension() {
        let shapes: [&[usize]; 2] = [&[2, 3], &[5, 3]];
        assert_eq!(concat_shape_axis0(&shapes), Some(alloc::vec![7, 3]));
    }

    #[test]
    fn check_inputs_number_rejects_wrong_count() {
        let node = NodeId::new(0);
        let inputs = [snapshot(DType::F64, &[2])];
        assert!(check_inputs_number(node, &inputs, 1).is_ok());
        assert!(check_inputs_number(node, &inputs, 2).is_err());
    }

    #[test]
    fn check_node_has_inputs_rejects_empty() {
        let node = NodeId::new(0);
        assert!(check_node_has_inputs(node, &[]).is_err());
    }

    #[test]
    fn check_dimension_of_inputs_enforces_rank() {
        let node = NodeId::new(0);
        let inputs = [snapshot(DType::F64, &[2, 2])];
        assert!(check_dimension_of_inputs(node, &inputs, 2).is_ok());
        assert!(check_dimension_of_inputs(node, &inputs, 1).is_err());
    }

    #[test]
    fn check_shape_of_inputs_enforces_exact_shape() {
        let node = NodeId::new(0);
        let inputs = [snapshot(DType::F64, &[2, 3])];
        assert!(check_shape_of_inputs(node, &inputs, &[2, 3]).is_ok());
        assert!(check_shape_of_inputs(node, &inputs, &[3, 2]).is_err());
    }

    #[test]
    fn check_dtype_of_inputs_rejects_a_mismatch() {
        let node = NodeId::new(0);
        let inputs = [snapshot(DType::F32, &[2])];
        assert!(check_dtype_of_inputs(node, &inputs, DType::F32).is_ok());
        assert!(check_dtype_of_inputs(node, &inputs, DType::F64).is_err());
    }

    #[test]
    fn check_subtype_of_inputs_accepts_a_narrower_dtype() {
        let node = NodeId::new(0);
        let inputs = [snapshot(DType::I32, &[2])];
        assert!(check_subtype_of_inputs(node, &inputs, DType::F64).is_ok());
        let wrong = [snapshot(DType::F64, &[2])];
        assert!(check_subtype_of_inputs(node, &wrong, DType::I32).is_err());
    }

    #[test]
    fn check_inputs_equivalence_requires_matching_dtype_and_shape() {
        let node = NodeId::new(0);
        let inputs = [snapshot(DType::F64, &[2]), snapshot(DType::F64, &[2])];
        assert!(check_inputs_equivalence(node, &inputs).is_ok());
        let mismatched = [snapshot(DType::F64, &[2]), snapshot(DType::I32, &[2])];
        assert!(check_inputs_equivalence(node, &mismatched).is_err());
    }

    #[test]
    fn check_inputs_are_square_matrices_rejects_non_square() {
        let node = NodeId::new(0);
        let square = [snapshot(DType::F64, &[3, 3])];
        assert_eq!(check_inputs_are_square_matrices(node, &square).unwrap(), 3);
        let rect = [snapshot(DType::F64, &[3, 4])];
        assert!(check_inputs_are_square_matrices(node, &rect).is_err());
    }

    #[test]
    fn check_inputs_are_matrices_or_diagonals_accepts_either_shape() {
        let node = NodeId::new(0);
        let diag = [snapshot(DType::F64, &[3])];
        assert_eq!(check_inputs_are_matrices_or_diagonals(node, &diag).unwrap(), (3, false));
        let square = [snapshot(DType::F64, &[3, 3])];
        assert_eq!(check_inputs_are_matrices_or_diagonals(node, &square).unwrap(), (3, true));
        let bad = [snapshot(DType::F64, &[3, 4])];
        assert!(check_inputs_are_matrices_or_diagonals(node, &bad).is_err());
    }

    #[test]
    fn check_inputs_are_matrix_multipliable_validates_inner_dimensions() {
        let node = NodeId::new(0);
        let a = snapshot(DType::F64, &[2, 3]);
        let b = snapshot(DType::F64, &[3, 4]);
        assert_eq!(check_inputs_are_matrix_multipliable(node, &a, &b).unwrap(), (2, 4));
        let c = snapshot(DType::F64, &[5, 4]);
        assert!(check_inputs_are_matrix_multipliable(node, &a, &c).is_err());
    }

    #[test]
    fn assign_axes_from_inputs_to_outputs_copies_edges() {
        use crate::node::OutputPort;

        let mut input = snapshot(DType::F64, &[2]);
        input
            .descriptor
            .set_axes_edges(alloc::vec![Some(crate::ids::OutputRef::new(NodeId::new(0), 0))]);
        let inputs = [input];
        let mut outputs: PortContainer<OutputPort> = PortContainer::new();
        outputs.add(OutputPort::new("out".into()), true, true, false).unwrap();

        assign_axes_from_inputs_to_outputs(&inputs, &mut outputs, true, false);
        assert_eq!(outputs.get_index(0).unwrap().descriptor().axes_edges().len(), 1);
    }
}
