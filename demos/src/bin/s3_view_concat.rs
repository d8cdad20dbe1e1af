// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worked example: three arrays concatenated through one `ViewConcat` node, with a single-element
//! mutation of the first array observed at the matching concatenated index (spec §8 Scenario S3).

use dagflow_core::{Array, Graph, GraphOptions, ViewConcat};

fn main() {
    env_logger::init();

    let g = Graph::new(GraphOptions::default());
    let a = Array::new(&g, "a", vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let ones = Array::new(&g, "ones", vec![1.0; 10]).unwrap();
    let neg_ones = Array::new(&g, "neg_ones", vec![-1.0; 12]).unwrap();

    let v = ViewConcat::new(&g, "v", &[a.output(), ones.output(), neg_ones.output()]).unwrap();
    g.close().unwrap();

    let total: usize = (0..27).map(|i| v.get(i).unwrap()).count();
    println!("concatenated length: {total}");
    assert_eq!(v.get(2).unwrap(), 3.0);

    a.set_element(2, -1.0).unwrap();
    println!("v[2] after a[2] := -1: {}", v.get(2).unwrap());
    assert_eq!(v.get(2).unwrap(), -1.0);
}
