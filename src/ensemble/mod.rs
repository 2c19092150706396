// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Live membership scaling of a coordination-service ensemble.

pub mod admin;
pub mod credentials;
pub mod membership;
pub mod provider;
pub mod scaler;

pub use admin::{AdminClientConfig, AdminClientFactory, AdminError, EnsembleAdmin};
pub use credentials::{CaBundle, ClientIdentity, CredentialStores};
pub use provider::{ensemble_connect_string, ensemble_pod_address, EnsembleScalerProvider};
pub use scaler::{AddressFn, EnsembleScaler};
