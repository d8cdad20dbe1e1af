// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worked example: a weighted sum of one array against itself through a keyword-bound `weight`
//! input (spec §8 Scenario S2).

use dagflow_core::{Array, Graph, GraphOptions, WeightedSum};

fn main() {
    env_logger::init();

    let g = Graph::new(GraphOptions::default());
    let arr = Array::new(&g, "arr", vec![0.0, 1.0, 2.0]).unwrap();
    let weight = Array::new(&g, "weight", vec![2.0, 3.0]).unwrap();

    let ws = WeightedSum::new(&g, "ws", &[arr.output(), arr.output()]).unwrap();
    g.connect(weight.output(), ws.weight_input()).unwrap();
    g.close().unwrap();

    let result: Vec<f64> = (0..3).map(|i| ws.get(i).unwrap()).collect();
    println!("weighted sum: {result:?}");
    assert_eq!(result, [0.0, 5.0, 10.0]);
}
