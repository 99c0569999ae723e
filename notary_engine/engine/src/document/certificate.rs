//! Certificates bind a public key to one version of an identity's lineage.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Citation, Document, PUBLIC, Parameters};
use crate::error::{NotaryError, Result};
use crate::types::{Tag, Version, b64, now_rfc3339};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub protocol: String,
    pub timestamp: String,
    /// Signature algorithm the key belongs to.
    pub algorithm: String,
    pub public_key: Vec<u8>,
    pub parameters: Parameters,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CertificateContent {
    protocol: String,
    timestamp: String,
    tag: Tag,
    version: Version,
    algorithm: String,
    #[serde(with = "b64")]
    public_key: Vec<u8>,
}

impl Certificate {
    pub const TYPE: &'static str = "certificate";

    pub fn new(
        protocol: impl Into<String>,
        algorithm: impl Into<String>,
        public_key: Vec<u8>,
        tag: Tag,
        version: Version,
        previous: Option<Citation>,
    ) -> Result<Self> {
        Ok(Certificate {
            protocol: protocol.into(),
            timestamp: now_rfc3339(),
            algorithm: algorithm.into(),
            public_key,
            parameters: Parameters::new(Self::TYPE, tag, version, PUBLIC, previous)?,
        })
    }

    pub fn tag(&self) -> &Tag {
        &self.parameters.tag
    }

    pub fn version(&self) -> Version {
        self.parameters.version
    }

    pub fn previous(&self) -> Option<&Citation> {
        self.parameters.previous.as_ref()
    }

    pub fn to_document(&self) -> Result<Document> {
        let content = CertificateContent {
            protocol: self.protocol.clone(),
            timestamp: self.timestamp.clone(),
            tag: self.parameters.tag.clone(),
            version: self.parameters.version,
            algorithm: self.algorithm.clone(),
            public_key: self.public_key.clone(),
        };
        match serde_json::to_value(content) {
            Ok(Value::Object(content)) => Ok(Document::new(content, self.parameters.clone())),
            Ok(_) => Err(NotaryError::malformed("certificate content is not an object", "")),
            Err(e) => Err(NotaryError::malformed(format!("certificate encoding failed: {e}"), "")),
        }
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        let source = || serde_json::to_string(document).unwrap_or_default();

        if document.kind() != Self::TYPE {
            return Err(NotaryError::malformed(
                format!("expected a certificate, found type {:?}", document.kind()),
                source(),
            ));
        }
        document
            .parameters
            .validate()
            .map_err(|e| NotaryError::malformed(e.to_string(), source()))?;

        let content: CertificateContent = serde_json::from_value(Value::Object(document.content.clone()))
            .map_err(|e| NotaryError::malformed(format!("invalid certificate content: {e}"), source()))?;

        if content.tag != document.parameters.tag || content.version != document.parameters.version {
            return Err(NotaryError::malformed(
                "certificate content disagrees with its parameters",
                source(),
            ));
        }

        Ok(Certificate {
            protocol: content.protocol,
            timestamp: content.timestamp,
            algorithm: content.algorithm,
            public_key: content.public_key,
            parameters: document.parameters.clone(),
        })
    }

    /// Structural chain check: `next` continues this lineage at the next version
    /// and cites this version. Digest and signature checks are the notary's job.
    pub fn is_successor(&self, next: &Certificate) -> bool {
        let Some(previous) = next.previous() else {
            return false;
        };
        next.tag() == self.tag()
            && previous.tag == *self.tag()
            && previous.version == self.version()
            && self.version().next().is_ok_and(|expected| expected == next.version())
    }
}
