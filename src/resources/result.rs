// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Outcome of a single reconciliation step.

/// What a reconcile call did to the store
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileResult<K> {
    /// The resource did not exist and was created
    Created(K),
    /// The resource existed and the patch produced a new revision
    Patched(K),
    /// The resource existed, was deleted, and its absence was observed
    Deleted,
    /// Nothing observable changed; carries the current resource if there is one
    NoOp(Option<K>),
}

impl<K> ReconcileResult<K> {
    /// The resulting resource, if any
    pub fn resource(&self) -> Option<&K> {
        match self {
            ReconcileResult::Created(r) | ReconcileResult::Patched(r) => Some(r),
            ReconcileResult::NoOp(r) => r.as_ref(),
            ReconcileResult::Deleted => None,
        }
    }

    pub fn into_resource(self) -> Option<K> {
        match self {
            ReconcileResult::Created(r) | ReconcileResult::Patched(r) => Some(r),
            ReconcileResult::NoOp(r) => r,
            ReconcileResult::Deleted => None,
        }
    }

    /// True if the store was mutated
    pub fn is_change(&self) -> bool {
        !matches!(self, ReconcileResult::NoOp(_))
    }
}
