// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The operator name used for server-side apply
pub const OPERATOR_NAME: &str = "quorum-operator";

/// Default bounds for waits, in milliseconds
pub mod timeouts {
    pub const OPERATION_TIMEOUT_MS: u64 = 300_000;
    pub const DELETION_POLL_INTERVAL_MS: u64 = 1_000;
    pub const CONNECT_POLL_INTERVAL_MS: u64 = 100;
}

/// Fixed ports and roles of ensemble members
pub mod ensemble {
    /// Port used by followers to talk to the leader
    pub const CLUSTERING_PORT: u16 = 2888;
    /// Port used for leader election
    pub const LEADER_ELECTION_PORT: u16 = 3888;
    /// Client port every member exposes on loopback only
    pub const LOOPBACK_CLIENT_PORT: u16 = 12181;
    pub const LOOPBACK_HOST: &str = "127.0.0.1";
    pub const ROLE: &str = "participant";
    /// Prefix of member keys in the dynamic configuration
    pub const SERVER_KEY_PREFIX: &str = "server.";
    /// Port the admin client connects to on the ensemble's client service
    pub const CLIENT_TLS_PORT: u16 = 2181;
}

/// Secret names and keys holding ensemble credential material
pub mod secrets {
    pub const CA_CERT_KEY: &str = "ca.crt";
    pub const OPERATOR_IDENTITY: &str = "cluster-operator";

    pub fn cluster_ca_cert(cluster: &str) -> String {
        format!("{}-cluster-ca-cert", cluster)
    }

    pub fn operator_certs(cluster: &str) -> String {
        format!("{}-cluster-operator-certs", cluster)
    }
}
