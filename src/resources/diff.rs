// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Structural difference between a current and a desired resource.
//!
//! Both sides are serialized to JSON and compared with a JSON patch. Operations
//! whose path matches the ignorable pattern (server-managed fields) are dropped
//! before emptiness is evaluated, so they never make a patch look necessary.

use crate::error::{OperatorError, Result};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

const DEFAULT_IGNORABLE_PATHS: &str = concat!(
    "^(/status",
    "|/metadata/managedFields",
    "|/metadata/creationTimestamp",
    "|/metadata/deletionTimestamp",
    "|/metadata/deletionGracePeriodSeconds",
    "|/metadata/resourceVersion",
    "|/metadata/generation",
    "|/metadata/uid",
    "|/metadata/selfLink",
    ")(/.*)?$"
);

static DEFAULT_IGNORABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_IGNORABLE_PATHS).expect("default ignorable paths are a valid regex"));

/// Paths that are server-managed for every Kubernetes kind
pub fn default_ignorable_paths() -> &'static Regex {
    &DEFAULT_IGNORABLE
}

#[derive(Debug, Clone)]
pub struct ResourceDiff {
    changed_paths: Vec<String>,
}

impl ResourceDiff {
    /// Compute the difference from `current` to `desired`, skipping paths matching `ignorable`
    pub fn new<K: Serialize>(
        kind: &str,
        name: &str,
        current: &K,
        desired: &K,
        ignorable: &Regex,
    ) -> Result<Self> {
        let current = to_json(kind, name, current)?;
        let desired = to_json(kind, name, desired)?;

        let changed_paths: Vec<String> = json_patch::diff(&current, &desired)
            .0
            .iter()
            .map(|op| op.path().to_string())
            .filter(|path| !ignorable.is_match(path))
            .collect();

        for path in &changed_paths {
            debug!("{} {} differs at {}", kind, name, path);
        }

        Ok(Self { changed_paths })
    }

    /// True if no non-ignorable path changed
    pub fn is_empty(&self) -> bool {
        self.changed_paths.is_empty()
    }

    pub fn changed_paths(&self) -> &[String] {
        &self.changed_paths
    }
}

fn to_json<K: Serialize>(kind: &str, name: &str, resource: &K) -> Result<serde_json::Value> {
    serde_json::to_value(resource).map_err(|e| {
        OperatorError::InvalidRequest(format!("{} {} cannot be serialized: {}", kind, name, e))
    })
}
