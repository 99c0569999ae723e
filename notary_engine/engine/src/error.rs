//! Centralized notary error types.

use thiserror::Error;

use crate::security::lifecycle::{KeyEvent, KeyLifecycle};

pub type Result<T> = std::result::Result<T, NotaryError>;

#[derive(Error, Debug)]
pub enum NotaryError {
    /// A required argument was missing or unusable; nothing was mutated.
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// The key lifecycle does not permit the requested event.
    #[error("Illegal transition: {event:?} is not permitted in state {state:?}")]
    IllegalTransition { state: KeyLifecycle, event: KeyEvent },
    /// The operation needs a certificate and none exists yet.
    #[error("Uninitialized: {0}")]
    Uninitialized(String),
    /// The artifact names a protocol, algorithm or pairing the verifier does not support.
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),
    /// A persisted or supplied document failed to parse or validate.
    #[error("Malformed document: {reason}")]
    Malformed { reason: String, source_text: String },
    /// Vault backend failure (I/O, lock poisoning).
    #[error("Storage error: {0}")]
    Storage(String),
    /// Sealing or key material failure.
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    /// A lower level failure annotated with the public operation that hit it.
    #[error("{operation} failed: {description}")]
    Operation {
        operation: &'static str,
        description: String,
        #[source]
        source: Box<NotaryError>,
    },
}

impl NotaryError {
    pub fn malformed(reason: impl Into<String>, source_text: impl Into<String>) -> Self {
        NotaryError::Malformed {
            reason: reason.into(),
            source_text: source_text.into(),
        }
    }

    pub fn illegal(state: KeyLifecycle, event: KeyEvent) -> Self {
        NotaryError::IllegalTransition { state, event }
    }

    /// Walk the operation annotations down to the originating cause.
    pub fn root(&self) -> &NotaryError {
        let mut current = self;
        while let NotaryError::Operation { source, .. } = current {
            current = source;
        }
        current
    }
}

/// Annotates a failure with the public operation it escaped from.
pub trait OperationContext<T> {
    fn in_operation(self, operation: &'static str, description: &str) -> Result<T>;
}

impl<T> OperationContext<T> for Result<T> {
    fn in_operation(self, operation: &'static str, description: &str) -> Result<T> {
        self.map_err(|e| {
            tracing::warn!(operation, error = %e, "{description}");
            NotaryError::Operation {
                operation,
                description: description.to_string(),
                source: Box::new(e),
            }
        })
    }
}
