// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ensemble membership configuration: parsing, generation and comparison.
//!
//! A membership maps `server.<id>` keys to member descriptors of the form
//! `host:peerPort:electionPort:role;clientHost:clientPort`. Pod ordinal `i`
//! is member id `i + 1`.

use crate::constants::ensemble::{
    CLUSTERING_PORT, LEADER_ELECTION_PORT, LOOPBACK_CLIENT_PORT, LOOPBACK_HOST, ROLE,
    SERVER_KEY_PREFIX,
};
use std::collections::BTreeMap;

pub type Membership = BTreeMap<String, String>;

/// Parse a `key=value` configuration response, keeping only member entries
pub fn parse_config(raw: &[u8]) -> Membership {
    String::from_utf8_lossy(raw)
        .lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| key.starts_with(SERVER_KEY_PREFIX))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Membership for `scale` members, addressing pod ordinal `i` through `address`
pub fn generate_config(scale: usize, address: impl Fn(usize) -> String) -> Membership {
    (0..scale)
        .map(|ordinal| (member_key(ordinal + 1), member_descriptor(&address(ordinal))))
        .collect()
}

pub fn member_key(id: usize) -> String {
    format!("{}{}", SERVER_KEY_PREFIX, id)
}

fn member_descriptor(host: &str) -> String {
    format!(
        "{}:{}:{}:{};{}:{}",
        host, CLUSTERING_PORT, LEADER_ELECTION_PORT, ROLE, LOOPBACK_HOST, LOOPBACK_CLIENT_PORT
    )
}

/// `server.<id>=<descriptor>` lines as accepted by a reconfigure request
pub fn servers_map_to_list(members: &Membership) -> Vec<String> {
    members
        .iter()
        .map(|(key, descriptor)| format!("{}={}", key, descriptor))
        .collect()
}

/// Plain map inequality; descriptors are compared verbatim
pub fn is_different(current: &Membership, desired: &Membership) -> bool {
    current != desired
}
