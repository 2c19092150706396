// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic reconciliation of Kubernetes resources towards a desired state.

pub mod crd;
pub mod diff;
pub mod operator;
pub mod readiness;
pub mod result;
pub mod store;

pub use crd::CrdOperator;
pub use diff::{default_ignorable_paths, ResourceDiff};
pub use operator::ResourceOperator;
pub use readiness::Readiness;
pub use result::ReconcileResult;
pub use store::{Cascade, DeletionConfirmation, KubeStore, ManagedResource, ResourceStore};
