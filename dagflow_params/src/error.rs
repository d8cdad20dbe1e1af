// Copyright 2026 the dagflow-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error kind for this crate, in the same flat-enum-plus-hand-written-`Display` shape as
//! `dagflow_core::DagflowError` (`execution_graph::graph::GraphError`'s style, see
//! `SPEC_FULL.md` "Ambient stack").

use std::fmt;

use dagflow_core::DagflowError;

/// All failure modes exposed by `dagflow_params`.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamsError {
    /// Propagated unchanged from the underlying graph.
    Graph(DagflowError),
    /// A covariance/correlation matrix was not square, not symmetric, or not positive-definite.
    Matrix { message: String },
    /// A `GaussianConstraint` was asked to build from an inconsistent combination of
    /// covariance/correlation/sigma.
    Construction { message: String },
    /// `Jacobian::compute` was asked to run with zero declared parameters.
    EmptyParameterList,
}

impl ParamsError {
    #[inline]
    pub fn matrix(message: impl Into<String>) -> Self {
        Self::Matrix {
            message: message.into(),
        }
    }

    #[inline]
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction {
            message: message.into(),
        }
    }
}

impl From<DagflowError> for ParamsError {
    fn from(e: DagflowError) -> Self {
        Self::Graph(e)
    }
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(e) => write!(f, "{e}"),
            Self::Matrix { message } => write!(f, "matrix error: {message}"),
            Self::Construction { message } => write!(f, "construction error: {message}"),
            Self::EmptyParameterList => write!(f, "jacobian has no declared parameters"),
        }
    }
}

impl std::error::Error for ParamsError {}
