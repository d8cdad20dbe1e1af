// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worked example: `close()` then `open()`/`close()` again with nothing changed in between
//! reproduces the exact same bits (spec §8 Scenario S5).

use dagflow_core::{Array, Graph, GraphOptions, Sum};

fn main() {
    env_logger::init();

    let g = Graph::new(GraphOptions::default());
    let a = Array::new(&g, "a", vec![0.1, 0.2, 0.3]).unwrap();
    let b = Array::new(&g, "b", vec![1.0, 2.0, 3.0]).unwrap();
    let s = Sum::new(&g, "s", &[a.output(), b.output()]).unwrap();

    g.close().unwrap();
    let before: Vec<f64> = (0..3).map(|i| s.get(i).unwrap()).collect();
    println!("before reopen: {before:?}");

    g.open(s.node()).unwrap();
    g.close().unwrap();
    let after: Vec<f64> = (0..3).map(|i| s.get(i).unwrap()).collect();
    println!("after reopen+reclose: {after:?}");

    assert_eq!(before, after);
    for (x, y) in before.iter().zip(&after) {
        assert_eq!(x.to_bits(), y.to_bits(), "expected bit-exact reproduction");
    }
}
