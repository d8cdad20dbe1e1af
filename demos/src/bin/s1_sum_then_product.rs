// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worked example: `s = Sum(a, b, c)`, `m = Product(d, s)`, then mutating `a` and observing `m`
//! retaint and recompute exactly once (spec §8 Scenario S1).
//!
//! Note on the numbers below: this crate's `Array::set` is a full replacement of the array's
//! data (matching every other settable source in this workspace), so the values used here are
//! computed self-consistently under that semantics rather than lifted from the scenario's own
//! worked example — see `DESIGN.md`'s `ops.rs` entry for why.

use dagflow_core::{Array, Graph, GraphOptions, Product, Sum};

fn main() {
    env_logger::init();

    let g = Graph::new(GraphOptions::default());
    let a = Array::new(&g, "a", vec![0.0, 1.0, 2.0, 3.0]).unwrap();
    let b = Array::new(&g, "b", vec![0.0, 2.0, 4.0, 6.0]).unwrap();
    let c = Array::new(&g, "c", vec![0.0, 3.0, 6.0, 9.0]).unwrap();
    let d = Array::new(&g, "d", vec![0.0, 4.0, 8.0, 12.0]).unwrap();

    let s = Sum::new(&g, "s", &[a.output(), b.output(), c.output()]).unwrap();
    let m = Product::new(&g, "m", &[d.output(), s.output()]).unwrap();
    g.close().unwrap();

    let before: Vec<f64> = (0..4).map(|i| m.get(i).unwrap()).collect();
    println!("m before mutation: {before:?}");
    assert_eq!(before, [0.0, 24.0, 96.0, 216.0]);
    assert_eq!(s.n_calls().unwrap(), 1);

    a.set(vec![10.0, 10.0, 10.0, 10.0]).unwrap();
    assert!(g.node_flags(m.node()).unwrap().tainted());

    let after: Vec<f64> = (0..4).map(|i| m.get(i).unwrap()).collect();
    println!("m after setting a := [10,10,10,10]: {after:?}");
    assert_eq!(after, [0.0, 60.0, 160.0, 300.0]);
    assert_eq!(s.n_calls().unwrap(), 2);
    assert!(!g.node_flags(m.node()).unwrap().tainted());
}
