//! Protocol versions: which digest and signature algorithms a notary speaks.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::crypto::digest::DigestAlgorithm;
use crate::crypto::signing::{self, SignatureScheme};
use crate::error::{NotaryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    /// BLAKE3 digests, Ed25519ph signatures.
    V1,
    /// SHA-512 digests, Ed25519 signatures.
    V2,
}

impl Protocol {
    pub const CURRENT: Protocol = Protocol::V2;
    pub const ALL: [Protocol; 2] = [Protocol::V1, Protocol::V2];

    pub fn version(&self) -> &'static str {
        match self {
            Protocol::V1 => "v1",
            Protocol::V2 => "v2",
        }
    }

    pub fn from_version(version: &str) -> Result<Self> {
        Protocol::ALL
            .into_iter()
            .find(|p| p.version() == version)
            .ok_or_else(|| NotaryError::ProtocolMismatch(format!("unsupported protocol version: {version}")))
    }

    pub fn from_digest_algorithm(algorithm: &str) -> Result<Self> {
        Protocol::ALL
            .into_iter()
            .find(|p| p.digest_algorithm() == algorithm)
            .ok_or_else(|| NotaryError::ProtocolMismatch(format!("unsupported digest algorithm: {algorithm}")))
    }

    fn digest_kind(&self) -> DigestAlgorithm {
        match self {
            Protocol::V1 => DigestAlgorithm::Blake3,
            Protocol::V2 => DigestAlgorithm::Sha512,
        }
    }

    fn scheme(&self) -> SignatureScheme {
        match self {
            Protocol::V1 => SignatureScheme::Prehashed,
            Protocol::V2 => SignatureScheme::Pure,
        }
    }

    pub fn digest_algorithm(&self) -> &'static str {
        self.digest_kind().name()
    }

    pub fn signature_algorithm(&self) -> &'static str {
        match self.scheme() {
            SignatureScheme::Pure => "ed25519",
            SignatureScheme::Prehashed => "ed25519ph",
        }
    }

    pub fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        self.digest_kind().digest(bytes)
    }

    pub fn sign(&self, key: &SigningKey, bytes: &[u8]) -> Result<Vec<u8>> {
        signing::sign(self.scheme(), key, bytes)
    }

    pub fn verify(&self, public_key: &[u8], signature: &[u8], bytes: &[u8]) -> Result<bool> {
        signing::verify_signature(self.scheme(), public_key, bytes, signature)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.version())
    }
}

impl FromStr for Protocol {
    type Err = NotaryError;

    fn from_str(s: &str) -> Result<Self> {
        Protocol::from_version(s)
    }
}

impl TryFrom<String> for Protocol {
    type Error = NotaryError;

    fn try_from(version: String) -> Result<Self> {
        Protocol::from_version(&version)
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> String {
        protocol.version().to_string()
    }
}
