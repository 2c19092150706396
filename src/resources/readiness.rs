// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Readiness predicates for kinds that have one.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;

/// A resource kind whose observed status says whether it is ready
pub trait Readiness {
    fn is_ready(&self) -> bool;
}

impl Readiness for Pod {
    /// Ready when the `Ready` condition is `True`
    fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
    }
}

impl Readiness for Deployment {
    /// Ready when every desired replica exists and is available
    fn is_ready(&self) -> bool {
        let desired = self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        self.status.as_ref().is_some_and(|s| {
            s.replicas.unwrap_or(0) == desired && s.available_replicas.unwrap_or(0) >= desired
        })
    }
}

impl Readiness for StatefulSet {
    fn is_ready(&self) -> bool {
        let desired = self.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        self.status
            .as_ref()
            .is_some_and(|s| s.ready_replicas.unwrap_or(0) == desired)
    }
}
