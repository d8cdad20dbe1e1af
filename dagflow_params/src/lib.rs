// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parameter, constraint, and covariance-propagation layer on top of `dagflow_core` (spec §4.8,
//! §4.9): settable scalar [`Parameter`]s, array-valued [`Parameters`] groups addressed by index,
//! Gaussian priors ([`GaussianParameter`]/[`GaussianConstraint`]), finite-difference [`Jacobian`]s,
//! grouped systematic covariances ([`CovarianceMatrixGroup`]), and [`make_fcn`] for
//! minimizer-facing closures.
//!
//! This crate is `std`-only (see `SPEC_FULL.md` "Workspace layout"): its Cholesky and
//! finite-difference kernels rely on `f64` transcendental functions not available in `core`
//! without a `libm` dependency, and the teacher's own `execution_tape_profiling` crate is
//! likewise `std`-only for the collaborator it layers on top of `execution_tape`.

mod constraint;
mod covariance;
mod error;
mod fcn;
mod jacobian;
mod linalg;
mod parameter;
mod parameters;

pub use constraint::{cholesky_node, GaussianConstraint, NormalizeCorrelatedVarsTwoWays};
pub use covariance::CovarianceMatrixGroup;
pub use error::ParamsError;
pub use fcn::{make_fcn, Fcn};
pub use jacobian::Jacobian;
pub use parameter::{
    AnyGaussianParameter, GaussianParameter, GaussianParameterLike, NormalizedGaussianParameter,
    Parameter,
};
pub use parameters::{GroupParameter, Parameters};
