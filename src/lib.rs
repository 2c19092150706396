// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation building blocks for an operator managing replicated
//! coordination-service ensembles on Kubernetes.

pub mod config;
pub mod constants;
pub mod ensemble;
pub mod error;
pub mod resources;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::OperatorConfig;
pub use error::{OperatorError, Result};
