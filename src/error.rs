// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Watch failed: {0}")]
    WatchError(#[from] kube_runtime::wait::Error),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Ensemble scaling failed: {message}")]
    EnsembleScaling {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Invalid credentials: {0}")]
    Credentials(String),
}

impl OperatorError {
    /// Wrap a lower-level failure with scaling context
    pub fn scaling(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        OperatorError::EnsembleScaling {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// True for a bounded wait that ran out, including one wrapped by a scaling failure
    pub fn is_timeout(&self) -> bool {
        match self {
            OperatorError::Timeout(_) => true,
            OperatorError::EnsembleScaling {
                source: Some(source),
                ..
            } => source
                .downcast_ref::<OperatorError>()
                .is_some_and(OperatorError::is_timeout),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
