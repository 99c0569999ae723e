//! Content-addressed references to one version of one document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::{Document, parse};
use crate::error::{NotaryError, Result};
use crate::types::{Tag, Version, b64};

const SCHEME: &str = "notary:/";

/// `{tag, version, algorithm, digest}`; equal iff all four match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Citation {
    pub tag: Tag,
    pub version: Version,
    pub algorithm: String,
    #[serde(with = "b64")]
    pub digest: Vec<u8>,
}

/// Which kind of lineage a citation points into (the URI path segment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKind {
    Certificate,
    Credential,
    Document,
}

impl ChainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Certificate => "certificate",
            ChainKind::Credential => "credential",
            ChainKind::Document => "document",
        }
    }

    /// Derived from the document type; anything unrecognised is a plain document.
    pub fn of(document: &Document) -> Self {
        match document.kind() {
            "certificate" => ChainKind::Certificate,
            "credential" => ChainKind::Credential,
            _ => ChainKind::Document,
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainKind {
    type Err = NotaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "certificate" => Ok(ChainKind::Certificate),
            "credential" => Ok(ChainKind::Credential),
            "document" => Ok(ChainKind::Document),
            other => Err(NotaryError::malformed(format!("unknown chain kind {other:?}"), s)),
        }
    }
}

impl Citation {
    pub fn new(tag: Tag, version: Version, algorithm: impl Into<String>, digest: Vec<u8>) -> Self {
        Citation {
            tag,
            version,
            algorithm: algorithm.into(),
            digest,
        }
    }

    /// Compact form: `notary:/{kind}/{tag}:v{version}?{algorithm}={digest}`.
    pub fn to_uri(&self, kind: ChainKind) -> String {
        format!(
            "{SCHEME}{kind}/{}:{}?{}={}",
            self.tag,
            self.version,
            self.algorithm,
            b64::encode(&self.digest)
        )
    }

    pub fn from_uri(uri: &str) -> Result<(ChainKind, Citation)> {
        let malformed = |reason: &str| NotaryError::malformed(format!("citation uri {reason}"), uri);

        let path = uri.strip_prefix(SCHEME).ok_or_else(|| malformed("must start with notary:/"))?;
        let (kind, rest) = path.split_once('/').ok_or_else(|| malformed("is missing the chain kind"))?;
        let (resource, query) = rest.split_once('?').ok_or_else(|| malformed("is missing the digest query"))?;
        let (tag, version) = resource
            .split_once(':')
            .ok_or_else(|| malformed("must name {tag}:{version}"))?;
        let (algorithm, digest) = query
            .split_once('=')
            .ok_or_else(|| malformed("query must be {algorithm}={digest}"))?;

        if algorithm.is_empty() || !algorithm.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(malformed("has an invalid algorithm name"));
        }
        if digest.is_empty() {
            return Err(malformed("has an empty digest"));
        }

        let citation = Citation {
            tag: tag.parse()?,
            version: version.parse()?,
            algorithm: algorithm.to_string(),
            digest: b64::decode(digest)?,
        };
        Ok((kind.parse()?, citation))
    }

    pub fn parse(text: &str) -> Result<Self> {
        parse(text, "citation")
    }

    /// True when this citation names the given document's lineage and version.
    pub fn names(&self, document: &Document) -> bool {
        &self.tag == document.tag() && self.version == document.version()
    }
}
