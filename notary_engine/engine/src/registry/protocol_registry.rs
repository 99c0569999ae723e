//! This module will:
//!     Track which protocol versions a notary can still verify
//!     Map each version to a keyless trusted module
//!     Resolve artifacts to a verifier by the version or digest algorithm they record

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{NotaryError, Result};
use crate::protocol::Protocol;
use crate::security::{ProtocolVerifier, TrustedModule};

/// Ordered registry of verifiers (thread-safe), keyed by protocol version.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    verifiers: Arc<RwLock<BTreeMap<String, Arc<dyn TrustedModule>>>>,
}

impl ProtocolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every built-in protocol version. The map is
    /// filled before it is shared, so no lock is involved.
    pub fn with_defaults() -> Self {
        let verifiers: BTreeMap<String, Arc<dyn TrustedModule>> = Protocol::ALL
            .into_iter()
            .map(|protocol| {
                let verifier: Arc<dyn TrustedModule> = Arc::new(ProtocolVerifier::new(protocol));
                (protocol.version().to_string(), verifier)
            })
            .collect();
        Self {
            verifiers: Arc::new(RwLock::new(verifiers)),
        }
    }

    /// Register a verifier for a version not yet known.
    pub fn register(&self, verifier: Arc<dyn TrustedModule>) -> Result<()> {
        let mut verifiers = self
            .verifiers
            .write()
            .map_err(|_| NotaryError::Storage("Registry lock poisoned".into()))?;
        let version = verifier.protocol().to_string();
        if verifiers.contains_key(&version) {
            return Err(NotaryError::Precondition(format!("protocol {version} is already registered")));
        }
        verifiers.insert(version, verifier);
        Ok(())
    }

    /// Verifier for a protocol version; unknown versions are a protocol mismatch.
    pub fn get(&self, version: &str) -> Result<Arc<dyn TrustedModule>> {
        let verifiers = self
            .verifiers
            .read()
            .map_err(|_| NotaryError::Storage("Registry lock poisoned".into()))?;
        verifiers
            .get(version)
            .cloned()
            .ok_or_else(|| NotaryError::ProtocolMismatch(format!("no verifier registered for protocol {version}")))
    }

    /// Verifier whose digest algorithm matches; the newest version wins on ties.
    pub fn by_digest_algorithm(&self, algorithm: &str) -> Result<Arc<dyn TrustedModule>> {
        let verifiers = self
            .verifiers
            .read()
            .map_err(|_| NotaryError::Storage("Registry lock poisoned".into()))?;
        verifiers
            .values()
            .rev()
            .find(|v| v.digest_algorithm() == algorithm)
            .cloned()
            .ok_or_else(|| NotaryError::ProtocolMismatch(format!("no verifier registered for digest algorithm {algorithm}")))
    }

    pub fn versions(&self) -> Vec<String> {
        self.verifiers
            .read()
            .map(|verifiers| verifiers.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, version: &str) -> bool {
        self.verifiers
            .read()
            .map(|verifiers| verifiers.contains_key(version))
            .unwrap_or(false)
    }
}
