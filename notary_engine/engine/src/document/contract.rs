//! Signed wrappers attributing a document to an account and a certificate.

use serde::{Deserialize, Serialize};

use crate::document::{Citation, Document, canonical_bytes, parse};
use crate::error::{NotaryError, Result};
use crate::types::{Tag, b64, now_rfc3339};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Contract {
    pub document: Document,
    pub timestamp: String,
    pub account: Tag,
    pub protocol: String,
    pub certificate: Citation,
    #[serde(with = "b64::option", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

/// A short-lived contract whose document is a timestamped proof of possession.
pub type Credential = Contract;

/// The contract as it is signed: every field except the signature, same order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnsignedContract<'a> {
    document: &'a Document,
    timestamp: &'a str,
    account: &'a Tag,
    protocol: &'a str,
    certificate: &'a Citation,
}

impl Contract {
    pub const CREDENTIAL_TYPE: &'static str = "credential";

    /// Unsigned contract, timestamped now.
    pub fn new(document: Document, account: Tag, protocol: impl Into<String>, certificate: Citation) -> Self {
        Contract {
            document,
            timestamp: now_rfc3339(),
            account,
            protocol: protocol.into(),
            certificate,
            signature: None,
        }
    }

    /// Bytes covered by the signature. Leaves the contract itself untouched.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        canonical_bytes(&UnsignedContract {
            document: &self.document,
            timestamp: &self.timestamp,
            account: &self.account,
            protocol: &self.protocol,
            certificate: &self.certificate,
        })
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonical_bytes(self)
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn is_credential(&self) -> bool {
        self.document.kind() == Self::CREDENTIAL_TYPE
    }

    pub fn parse(text: &str) -> Result<Self> {
        let contract: Contract = parse(text, "contract")?;
        contract
            .document
            .parameters
            .validate()
            .map_err(|e| NotaryError::malformed(e.to_string(), text))?;
        Ok(contract)
    }
}
