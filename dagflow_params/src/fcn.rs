// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `make_fcn`: a closure mapping parameter overrides to a scalar/vector output (spec §1 row 14).

use dagflow_core::{Graph, OutputRef};

use crate::error::ParamsError;
use crate::parameter::{AnyGaussianParameter, GaussianParameterLike};

/// Binds an ordered parameter list to a function output, so repeated evaluation at different
/// parameter points is a single [`Self::call`].
#[derive(Clone, Debug)]
pub struct Fcn {
    graph: Graph,
    parameters: Vec<AnyGaussianParameter>,
    output: OutputRef,
}

impl Fcn {
    /// Sets `values[k]` onto `parameters[k]` (positional, same order both were declared in), then
    /// reads back every element of the watched output.
    pub fn call(&self, values: &[f64]) -> Result<Vec<f64>, ParamsError> {
        if values.len() != self.parameters.len() {
            return Err(ParamsError::construction(format!(
                "fcn expected {} parameter values, got {}",
                self.parameters.len(),
                values.len()
            )));
        }
        for (param, &value) in self.parameters.iter().zip(values) {
            param.set_value(value)?;
        }
        let shape = self
            .graph
            .output_shape(self.output)?
            .ok_or_else(|| ParamsError::matrix("fcn output shape is not resolved yet"))?;
        let len: usize = shape.iter().product();
        (0..len)
            .map(|i| self.graph.read(self.output, i).map_err(ParamsError::from))
            .collect()
    }

    #[must_use]
    pub fn output(&self) -> OutputRef {
        self.output
    }
}

/// Builds a [`Fcn`] over `output`, driven by `parameters` in declaration order.
#[must_use]
pub fn make_fcn(graph: &Graph, parameters: Vec<AnyGaussianParameter>, output: OutputRef) -> Fcn {
    Fcn {
        graph: graph.clone(),
        parameters,
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagflow_core::{DType, DagflowError, EvalContext, GraphOptions, NodeKernel, TypeFunctionContext};
    use std::any::Any;

    use crate::parameter::GaussianParameter;

    #[derive(Debug)]
    struct Affine {
        x: Vec<f64>,
    }

    impl NodeKernel for Affine {
        fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
            let out = ctx.outputs.get_index_mut(0).unwrap();
            out.descriptor_mut().set_dtype(DType::F64);
            out.descriptor_mut().set_shape(Some(vec![self.x.len()]));
            Ok(())
        }

        fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
            let a = ctx.inputs[0].with_f64(|s| s[0]).unwrap();
            let b = ctx.inputs[1].with_f64(|s| s[0]).unwrap();
            let out = ctx.outputs.get_index_mut(0).unwrap();
            for (i, &xi) in self.x.iter().enumerate() {
                out.seti(i, a * xi + b, false);
            }
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn fcn_evaluates_at_each_override_point() {
        let g = Graph::new(GraphOptions::default());
        let a = GaussianParameter::new(&g, "a", 1.0, 0.1).unwrap();
        let b = GaussianParameter::new(&g, "b", 0.0, 0.1).unwrap();
        let x = vec![0.0, 1.0, 2.0];
        let f = g.add_node("f", Box::new(Affine { x: x.clone() })).unwrap();
        let in_a = g.add_input(f, "a", true, false).unwrap();
        let in_b = g.add_input(f, "b", true, false).unwrap();
        let f_out = g.add_output(f, "y", true, true).unwrap();
        g.connect(a.value_output(), in_a).unwrap();
        g.connect(b.value_output(), in_b).unwrap();
        g.close().unwrap();

        let fcn = make_fcn(&g, vec![a.into(), b.into()], f_out);
        let y1 = fcn.call(&[2.0, 1.0]).unwrap();
        assert_eq!(y1, vec![1.0, 3.0, 5.0]);
        let y2 = fcn.call(&[0.0, 0.0]).unwrap();
        assert_eq!(y2, vec![0.0, 0.0, 0.0]);
    }
}
