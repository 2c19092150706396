// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Credential material for the ensemble admin connection.
//!
//! The CA bundle becomes a PKCS#12 trust store holding only the CA
//! certificates. The client identity archive is opened with its supplied
//! password and written back as a PKCS#12 key store. Each store is protected
//! by its own passphrase generated in process. Both files are temporary and
//! owned by one [`CredentialStores`] value.

use crate::constants::secrets::{CA_CERT_KEY, OPERATOR_IDENTITY};
use crate::ensemble::admin::StoreLocation;
use crate::error::{OperatorError, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use openssl::pkcs12::{ParsedPkcs12_2, Pkcs12};
use openssl::stack::Stack;
use openssl::x509::X509;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::Write;
use tempfile::TempPath;
use tracing::{debug, warn};

const PASSWORD_LENGTH: usize = 32;

/// PEM encoded CA certificates trusted for the ensemble's TLS endpoint
#[derive(Clone)]
pub struct CaBundle {
    pem: Vec<u8>,
}

impl CaBundle {
    pub fn new(pem: Vec<u8>) -> Self {
        Self { pem }
    }

    /// Read the `ca.crt` entry of a cluster CA secret
    pub fn from_secret(secret: &Secret) -> Result<Self> {
        Ok(Self::new(secret_entry(secret, CA_CERT_KEY)?))
    }
}

/// Password protected PKCS#12 archive identifying the operator to the ensemble
#[derive(Clone)]
pub struct ClientIdentity {
    archive: Vec<u8>,
    password: String,
}

impl ClientIdentity {
    pub fn new(archive: Vec<u8>, password: String) -> Self {
        Self { archive, password }
    }

    /// Read `<identity>.p12` and `<identity>.password` from a certificate secret
    pub fn from_secret(secret: &Secret, identity: &str) -> Result<Self> {
        let archive = secret_entry(secret, &format!("{}.p12", identity))?;
        let password = String::from_utf8(secret_entry(secret, &format!("{}.password", identity))?)
            .map_err(|e| {
                OperatorError::Credentials(format!(
                    "password of {} in secret {} is not valid UTF-8: {}",
                    identity,
                    secret.name_any(),
                    e
                ))
            })?;
        Ok(Self::new(archive, password))
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("archive_len", &self.archive.len())
            .finish_non_exhaustive()
    }
}

fn secret_entry(secret: &Secret, key: &str) -> Result<Vec<u8>> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|value| value.0.clone())
        .ok_or_else(|| {
            OperatorError::Credentials(format!(
                "secret {} does not contain '{}'",
                secret.name_any(),
                key
            ))
        })
}

/// Temporary trust store and key store files
pub struct CredentialStores {
    trust_store: TempPath,
    trust_password: String,
    key_store: TempPath,
    key_password: String,
}

impl CredentialStores {
    /// Write both stores to temporary files, each under a fresh random passphrase
    pub fn materialize(ca: &CaBundle, identity: &ClientIdentity) -> Result<Self> {
        let certificates = ca_certificates(&ca.pem)?;
        let certificate_count = certificates.len();

        let trust_password = random_password();
        let trust_der = Pkcs12::builder()
            .ca(certificates)
            .build2(&trust_password)
            .and_then(|store| store.to_der())
            .map_err(|e| OperatorError::Credentials(format!("failed to build trust store: {}", e)))?;

        let key_password = random_password();
        let key_der = reencrypt_identity(identity, &key_password)?;

        let trust_store = write_temp("truststore-", ".p12", &trust_der)?;
        let key_store = write_temp("keystore-", ".p12", &key_der)?;
        debug!(
            "Created trust store {} with {} certificate(s) and key store {}",
            trust_store.display(),
            certificate_count,
            key_store.display()
        );

        Ok(Self {
            trust_store,
            trust_password,
            key_store,
            key_password,
        })
    }

    pub fn trust_store(&self) -> StoreLocation {
        StoreLocation {
            path: self.trust_store.to_path_buf(),
            password: self.trust_password.clone(),
        }
    }

    pub fn key_store(&self) -> StoreLocation {
        StoreLocation {
            path: self.key_store.to_path_buf(),
            password: self.key_password.clone(),
        }
    }

    /// Delete both files. Failures are logged, not returned.
    pub fn close(self) {
        for path in [self.trust_store, self.key_store] {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                warn!("Failed to delete credential store {}: {}", shown, e);
            }
        }
    }
}

/// Every `CERTIFICATE` block of a PEM bundle; other block types are skipped
fn ca_certificates(bundle: &[u8]) -> Result<Stack<X509>> {
    let invalid = |e: &dyn std::fmt::Display| {
        OperatorError::Credentials(format!("CA bundle is not valid: {}", e))
    };

    let blocks = pem::parse_many(bundle).map_err(|e| invalid(&e))?;
    let mut certificates = Stack::new().map_err(|e| invalid(&e))?;
    for block in blocks.iter().filter(|b| b.tag() == "CERTIFICATE") {
        let certificate = X509::from_der(block.contents()).map_err(|e| invalid(&e))?;
        certificates.push(certificate).map_err(|e| invalid(&e))?;
    }

    if certificates.is_empty() {
        return Err(OperatorError::Credentials(
            "CA bundle contains no certificates".to_string(),
        ));
    }
    Ok(certificates)
}

/// Open the identity archive with its own password and seal it again under `password`
fn reencrypt_identity(identity: &ClientIdentity, password: &str) -> Result<Vec<u8>> {
    if identity.archive.is_empty() {
        return Err(OperatorError::Credentials(
            "client identity archive is empty".to_string(),
        ));
    }
    if identity.password.contains('\0') {
        return Err(OperatorError::Credentials(
            "client identity password must not contain NUL".to_string(),
        ));
    }

    let ParsedPkcs12_2 { pkey, cert, ca } = Pkcs12::from_der(&identity.archive)
        .and_then(|archive| archive.parse2(&identity.password))
        .map_err(|e| {
            OperatorError::Credentials(format!("client identity archive cannot be opened: {}", e))
        })?;
    let (Some(key), Some(certificate)) = (pkey, cert) else {
        return Err(OperatorError::Credentials(
            "client identity archive must hold a private key and a certificate".to_string(),
        ));
    };

    let mut builder = Pkcs12::builder();
    builder.name(OPERATOR_IDENTITY).pkey(&key).cert(&certificate);
    if let Some(chain) = ca {
        builder.ca(chain);
    }
    builder
        .build2(password)
        .and_then(|store| store.to_der())
        .map_err(|e| OperatorError::Credentials(format!("failed to build key store: {}", e)))
}

fn write_temp(prefix: &str, suffix: &str, contents: &[u8]) -> Result<TempPath> {
    let io_error = |e: std::io::Error| {
        OperatorError::Credentials(format!("failed to write credential store: {}", e))
    };

    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile()
        .map_err(io_error)?;
    file.write_all(contents).map_err(io_error)?;
    file.flush().map_err(io_error)?;
    Ok(file.into_temp_path())
}

fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}
