// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worked example: `(src1, src2, src3) >> node` followed by `src4 >> node` against a node using
//! `InputStrategy::AddNewInputAddNewOutputForBlock`. Afterward `node` has exactly 4 positional
//! inputs and 2 positional outputs, with inputs 0..2 sharing output 0 and input 3 alone on output
//! 1 (spec §8 Scenario S6).

use std::any::Any;

use dagflow_core::{
    Array, DType, DagflowError, EvalContext, Graph, GraphOptions, InputStrategy, Nd, NodeKernel,
    Out, TypeFunctionContext,
};

/// A node whose inputs grow in `ForBlock` groups; its own data pass is irrelevant to this
/// scenario, so each output is just the count of inputs routed into it.
#[derive(Debug)]
struct BlockGrouper;

impl NodeKernel for BlockGrouper {
    fn type_function(&mut self, ctx: &mut TypeFunctionContext<'_>) -> Result<(), DagflowError> {
        for out in ctx.outputs.iter_all_mut() {
            out.descriptor_mut().set_dtype(DType::F64);
            out.descriptor_mut().set_shape(Some(vec![1]));
        }
        Ok(())
    }

    fn eval(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), DagflowError> {
        for out in ctx.outputs.iter_all_mut() {
            out.seti(0, 0.0, false);
        }
        Ok(())
    }

    fn input_strategy(&self) -> InputStrategy {
        InputStrategy::AddNewInputAddNewOutputForBlock
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn main() {
    env_logger::init();

    let g = Graph::new(GraphOptions::default());
    let src1 = Array::new(&g, "src1", vec![1.0]).unwrap();
    let src2 = Array::new(&g, "src2", vec![2.0]).unwrap();
    let src3 = Array::new(&g, "src3", vec![3.0]).unwrap();
    let src4 = Array::new(&g, "src4", vec![4.0]).unwrap();

    let node = g.add_node("grouped", Box::new(BlockGrouper)).unwrap();
    let nd = Nd::new(g.clone(), node);

    let out1 = Out::new(g.clone(), src1.output());
    let out2 = Out::new(g.clone(), src2.output());
    let out3 = Out::new(g.clone(), src3.output());
    let [in0, in1, in2] = ((out1, out2, out3) >> nd.clone()).unwrap();

    let out4 = Out::new(g.clone(), src4.output());
    let in3 = (out4 >> nd.clone()).unwrap();

    let (n_in, n_out) = g.positional_port_counts(node).unwrap();
    println!("node has {n_in} positional inputs and {n_out} positional outputs");
    assert_eq!(n_in, 4);
    assert_eq!(n_out, 2);

    let block0 = g.input_block_output(in0).unwrap();
    assert_eq!(block0, g.input_block_output(in1).unwrap());
    assert_eq!(block0, g.input_block_output(in2).unwrap());
    let block1 = g.input_block_output(in3).unwrap();
    assert_ne!(block0, block1);
    println!("inputs 0..2 share output {block0:?}; input 3 routes to output {block1:?}");
}
