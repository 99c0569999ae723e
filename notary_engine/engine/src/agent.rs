//! The digital notary: one hardened module for signing, a registry of
//! trusted modules for verifying what older protocol versions produced.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit::{AuditEventType, AuditRecord, AuditTracker};
use crate::config::NotaryConfig;
use crate::document::{Certificate, Citation, Contract, Credential, Document, PRIVATE};
use crate::error::{NotaryError, OperationContext, Result};
use crate::registry::ProtocolRegistry;
use crate::security::{HardenedModule, KeyEvent, KeyLifecycle, SoftwareModule, TrustedModule};
use crate::types::{Tag, Version, now_rfc3339};
use crate::vault::{SealingKey, VaultBackend};

pub struct DigitalNotary {
    account: Tag,
    module: Arc<dyn HardenedModule>,
    registry: ProtocolRegistry,
    backend: Arc<dyn VaultBackend>,
    citation_record: String,
    // Unsigned successor contract, written before the previous key endorses it.
    pending_record: String,
    audit: Arc<AuditTracker>,
    // Citation to the current certificate. Held for the whole of every
    // operation that signs or changes keys, so those never interleave.
    citation: Mutex<Option<Citation>>,
}

impl DigitalNotary {
    pub fn new(
        account: Tag,
        module: Arc<dyn HardenedModule>,
        registry: ProtocolRegistry,
        backend: Arc<dyn VaultBackend>,
        citation_record: impl Into<String>,
        audit: Arc<AuditTracker>,
    ) -> Result<Self> {
        let citation_record = citation_record.into();
        let pending_record = format!("{citation_record}.pending");
        let citation = load_citation(backend.as_ref(), &citation_record)
            .in_operation("new", "Unable to load the current certificate citation")?;

        info!(
            account = %account,
            protocol = module.protocol(),
            initialized = citation.is_some(),
            "digital notary ready"
        );

        Ok(DigitalNotary {
            account,
            module,
            registry,
            backend,
            citation_record,
            pending_record,
            audit,
            citation: Mutex::new(citation),
        })
    }

    /// Software-module notary over `backend`, named and versioned by `config`.
    pub fn open(
        config: &NotaryConfig,
        backend: Arc<dyn VaultBackend>,
        sealing_key: SealingKey,
        account: Tag,
    ) -> Result<Self> {
        config.validate().in_operation("open", "Invalid notary configuration")?;
        let module = SoftwareModule::open(config.protocol, backend.clone(), sealing_key, config.keys_record())?;
        Self::new(
            account,
            Arc::new(module),
            ProtocolRegistry::with_defaults(),
            backend,
            config.citation_record(),
            Arc::new(AuditTracker::default()),
        )
    }

    pub fn account(&self) -> &Tag {
        &self.account
    }

    pub fn audit(&self) -> &AuditTracker {
        &self.audit
    }

    /// Every protocol version this notary can verify, ascending.
    pub fn protocols(&self) -> Vec<String> {
        let mut versions = self.registry.versions();
        versions.push(self.module.protocol().to_string());
        versions.sort();
        versions.dedup();
        versions
    }

    /// Citation to the current certificate.
    pub fn citation(&self) -> Result<Citation> {
        let result = (|| -> Result<Citation> {
            self.lock()?
                .clone()
                .ok_or_else(|| NotaryError::Uninitialized("the notary has no certificate yet".into()))
        })();
        self.finish(result, "citation", "Unable to retrieve the certificate citation")
    }

    /// Bootstrap the identity: version 1 certificate, self-signed.
    pub fn generate_key(&self) -> Result<Contract> {
        let result = (|| -> Result<Contract> {
            let mut current = self.lock()?;
            if let Some(existing) = current.as_ref() {
                return Err(NotaryError::Precondition(format!(
                    "a certificate already exists ({}:{}); forget it or refresh it instead",
                    existing.tag, existing.version
                )));
            }

            if self.module.lifecycle()? != KeyLifecycle::Keyless {
                warn!("erasing keys that were never certified");
                self.module.erase_keys()?;
            }

            let public_key = self.module.generate_keys()?;
            let (certificate, contract, citation) = match self.self_certify(public_key) {
                Ok(certified) => certified,
                Err(e) => {
                    // Back to Keyless, so the next attempt starts clean.
                    if let Err(rollback) = self.module.erase_keys() {
                        warn!(error = %rollback, "unable to discard the uncertified keys");
                    }
                    return Err(e);
                }
            };
            *current = Some(citation);

            self.audit.log(AuditRecord::new(
                AuditEventType::Keygen,
                certificate.tag().to_string(),
                Some(1),
                "generated a self-signed certificate",
            ));
            Ok(contract)
        })();
        self.finish(result, "generate_key", "Unable to generate a new notary key")
    }

    /// Rotate the key pair and certify the new key with the old one.
    ///
    /// The returned contract wraps certificate version n+1 and verifies
    /// against certificate version n.
    pub fn refresh_key(&self) -> Result<Contract> {
        let result = (|| -> Result<Contract> {
            let mut current = self.lock()?;
            let previous = current
                .clone()
                .ok_or_else(|| NotaryError::Uninitialized("the notary has no certificate to refresh".into()))?;

            let mut contract = match self.module.lifecycle()? {
                KeyLifecycle::TwoKeys => {
                    warn!(tag = %previous.tag, "completing an interrupted rotation");
                    self.resume_refresh(&previous)?
                }
                _ => {
                    let public_key = self.module.rotate_keys()?;
                    self.successor_contract(&previous, public_key)?
                }
            };
            let endorsing = contract.certificate.clone();
            let certificate = Certificate::from_document(&contract.document)?;
            let citation = self.cite(&contract.document)?;

            // Both records land before the previous key is spent, so a
            // failure up to the signature leaves a rotation that can resume.
            self.stage_refresh(&contract)?;
            self.store_citation(&citation)?;

            // Nothing else may sign between the rotation and this call: it is
            // the one use of the previous key, and it endorses the successor.
            if let Err(e) = self.sign(&mut contract) {
                if let Err(restore) = self.store_citation(&endorsing) {
                    warn!(error = %restore, "unable to restore the previous citation");
                }
                return Err(e);
            }
            *current = Some(citation);
            if let Err(e) = self.backend.delete_record(&self.pending_record) {
                warn!(error = %e, "unable to clear the staged refresh");
            }

            self.audit.log(AuditRecord::new(
                AuditEventType::Rotation,
                certificate.tag().to_string(),
                Some(certificate.version().ordinal()),
                format!("refreshed certificate, endorsed by {}", endorsing.version),
            ));
            Ok(contract)
        })();
        self.finish(result, "refresh_key", "Unable to refresh the notary key")
    }

    /// Destroy the identity. Safe to call when there is nothing to forget.
    pub fn forget_key(&self) -> Result<()> {
        let result = (|| -> Result<()> {
            let mut current = self.lock()?;
            // Records first: keys without a citation are discarded by the next
            // generate_key, a citation without keys would be stuck.
            self.backend.delete_record(&self.pending_record)?;
            self.backend.delete_record(&self.citation_record)?;
            let forgotten = current.take();
            self.module.erase_keys()?;
            if let Some(forgotten) = forgotten {
                self.audit.log(AuditRecord::new(
                    AuditEventType::Erasure,
                    forgotten.tag.to_string(),
                    Some(forgotten.version.ordinal()),
                    "forgot the notary key",
                ));
            }
            Ok(())
        })();
        self.finish(result, "forget_key", "Unable to forget the notary key")
    }

    /// Short-lived signed proof of possession of the current key. An optional
    /// salt lets a verifier bind the credential to its own challenge.
    pub fn generate_credential(&self, salt: Option<&str>) -> Result<Credential> {
        let result = (|| -> Result<Credential> {
            let current = self.lock()?;
            let certificate = current
                .clone()
                .ok_or_else(|| NotaryError::Uninitialized("the notary has no certificate yet".into()))?;
            self.refuse_pending_rotation()?;

            let mut content = json!({ "timestamp": now_rfc3339() });
            if let Some(salt) = salt {
                content["salt"] = json!(salt);
            }
            let document = Document::draft(Contract::CREDENTIAL_TYPE, PRIVATE, content)?;
            let tag = document.tag().clone();

            let mut credential = Contract::new(document, self.account.clone(), self.module.protocol(), certificate);
            self.sign(&mut credential)?;

            self.audit
                .log(AuditRecord::new(AuditEventType::Signing, tag.to_string(), Some(1), "generated a credential"));
            Ok(credential)
        })();
        self.finish(result, "generate_credential", "Unable to generate a credential")
    }

    /// Wrap a caller-supplied draft in a contract signed under the current certificate.
    pub fn notarize_document(&self, draft: Document) -> Result<Contract> {
        let result = (|| -> Result<Contract> {
            draft.parameters.validate()?;
            let current = self.lock()?;
            let certificate = current
                .clone()
                .ok_or_else(|| NotaryError::Uninitialized("the notary has no certificate yet".into()))?;
            self.refuse_pending_rotation()?;

            let tag = draft.tag().to_string();
            let version = draft.version().ordinal();
            let mut contract = Contract::new(draft, self.account.clone(), self.module.protocol(), certificate);
            self.sign(&mut contract)?;

            self.audit
                .log(AuditRecord::new(AuditEventType::Signing, tag, Some(version), "notarized a document"));
            Ok(contract)
        })();
        self.finish(result, "notarize_document", "Unable to notarize the document")
    }

    /// Citation to `document` under the active protocol's digest algorithm.
    pub fn cite_document(&self, document: &Document) -> Result<Citation> {
        let result = (|| -> Result<Citation> {
            let citation = self.cite(document)?;
            self.audit.log(AuditRecord::new(
                AuditEventType::Citation,
                citation.tag.to_string(),
                Some(citation.version.ordinal()),
                format!("cited document under {}", citation.algorithm),
            ));
            Ok(citation)
        })();
        self.finish(result, "cite_document", "Unable to cite the document")
    }

    /// Recompute the digest under the algorithm the citation names.
    pub fn citation_matches(&self, citation: &Citation, document: &Document) -> Result<bool> {
        let result = (|| -> Result<bool> {
            let bytes = document.canonical_bytes()?;
            self.with_digester(&citation.algorithm, |digester| {
                let digest = digester.digest_bytes(&bytes)?;
                let matches = digester.digest_algorithm() == citation.algorithm && digest == citation.digest;
                debug!(tag = %citation.tag, version = %citation.version, matches, "checked citation");
                Ok(matches)
            })
        })();
        self.finish(result, "citation_matches", "Unable to check the citation")
    }

    /// Verify the contract's signature against the certificate's public key,
    /// using the protocol version recorded on the contract.
    pub fn signature_matches(&self, contract: &Contract, certificate: &Certificate) -> Result<bool> {
        let result = (|| -> Result<bool> {
            let signature = contract
                .signature
                .as_deref()
                .ok_or_else(|| NotaryError::Precondition("the contract carries no signature".into()))?;
            let bytes = contract.signing_bytes()?;

            let matches = self.with_verifier(&contract.protocol, |verifier| {
                if certificate.algorithm != verifier.signature_algorithm() {
                    return Err(NotaryError::ProtocolMismatch(format!(
                        "certificate key algorithm {} cannot verify a {} signature made under protocol {}",
                        certificate.algorithm,
                        verifier.signature_algorithm(),
                        contract.protocol
                    )));
                }
                verifier.valid_signature(&certificate.public_key, signature, &bytes)
            })?;

            self.audit.log(AuditRecord::new(
                AuditEventType::Verification,
                contract.document.tag().to_string(),
                Some(contract.document.version().ordinal()),
                format!(
                    "signature {} certificate {}:{}",
                    if matches { "matches" } else { "does not match" },
                    certificate.tag(),
                    certificate.version()
                ),
            ));
            Ok(matches)
        })();
        self.finish(result, "signature_matches", "Unable to check the signature")
    }

    /// Check that `next` is a valid link after `previous` in a certificate
    /// chain: structurally chained, citing exactly the previous certificate,
    /// and signed by the previous key.
    pub fn chain_matches(&self, previous: &Contract, next: &Contract) -> Result<bool> {
        let result = (|| -> Result<bool> {
            let previous_certificate = Certificate::from_document(&previous.document)?;
            let next_certificate = Certificate::from_document(&next.document)?;

            if !previous_certificate.is_successor(&next_certificate) {
                warn!(
                    tag = %next_certificate.tag(),
                    version = %next_certificate.version(),
                    "certificate does not continue the previous lineage"
                );
                return Ok(false);
            }
            let Some(cited) = next_certificate.previous() else {
                return Ok(false);
            };
            if next.certificate != *cited || !self.citation_matches(cited, &previous.document)? {
                warn!(tag = %cited.tag, version = %cited.version, "previous certificate citation does not match");
                return Ok(false);
            }
            self.signature_matches(next, &previous_certificate)
        })();
        self.finish(result, "chain_matches", "Unable to check the certificate chain")
    }

    // ==============================
    // Internals
    // ==============================

    /// Audit a failure, then annotate it with the operation it escaped from.
    fn finish<T>(&self, result: Result<T>, operation: &'static str, description: &str) -> Result<T> {
        if let Err(e) = &result {
            self.audit.log(AuditRecord::new(
                AuditEventType::Error,
                self.account.to_string(),
                None,
                format!("{operation} failed: {e}"),
            ));
        }
        result.in_operation(operation, description)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Citation>>> {
        self.citation
            .lock()
            .map_err(|_| NotaryError::Storage("Notary lock poisoned".into()))
    }

    fn cite(&self, document: &Document) -> Result<Citation> {
        let digest = self.module.digest_bytes(&document.canonical_bytes()?)?;
        Ok(Citation::new(
            document.tag().clone(),
            document.version(),
            self.module.digest_algorithm(),
            digest,
        ))
    }

    /// Version 1 certificate for `public_key`, signed by that same key, with
    /// its citation persisted.
    fn self_certify(&self, public_key: Vec<u8>) -> Result<(Certificate, Contract, Citation)> {
        let certificate = Certificate::new(
            self.module.protocol(),
            self.module.signature_algorithm(),
            public_key,
            self.module.tag()?,
            Version::FIRST,
            None,
        )?;
        let document = certificate.to_document()?;
        let citation = self.cite(&document)?;

        // The very first signature: the new key endorses its own certificate.
        let mut contract = Contract::new(document, certificate.tag().clone(), self.module.protocol(), citation.clone());
        self.sign(&mut contract)?;
        self.store_citation(&citation)?;
        Ok((certificate, contract, citation))
    }

    /// Unsigned contract carrying the certificate that follows `previous`.
    fn successor_contract(&self, previous: &Citation, public_key: Vec<u8>) -> Result<Contract> {
        let certificate = Certificate::new(
            self.module.protocol(),
            self.module.signature_algorithm(),
            public_key,
            previous.tag.clone(),
            previous.version.next()?,
            Some(previous.clone()),
        )?;
        let document = certificate.to_document()?;
        Ok(Contract::new(document, previous.tag.clone(), self.module.protocol(), previous.clone()))
    }

    /// Successor for a rotation that never got its endorsement. The staged
    /// contract is reused when it still certifies the module's new key; the
    /// stored citation may name either side of it.
    fn resume_refresh(&self, current: &Citation) -> Result<Contract> {
        let public_key = self.module.public_key()?;
        if let Some(staged) = self.load_staged_refresh()? {
            let certificate = Certificate::from_document(&staged.document)?;
            let continues = staged.certificate == *current || self.cite(&staged.document)? == *current;
            if certificate.public_key == public_key && continues {
                debug!(tag = %certificate.tag(), version = %certificate.version(), "resuming the staged refresh");
                return Ok(staged);
            }
            warn!(tag = %certificate.tag(), "discarding a staged refresh for another key");
        }
        self.successor_contract(current, public_key)
    }

    fn stage_refresh(&self, contract: &Contract) -> Result<()> {
        let bytes = serde_json::to_vec(contract)
            .map_err(|e| NotaryError::malformed(format!("contract encoding failed: {e}"), ""))?;
        self.backend.store_record(&self.pending_record, &bytes)
    }

    fn load_staged_refresh(&self) -> Result<Option<Contract>> {
        let Some(bytes) = self.backend.load_record(&self.pending_record)? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| {
            NotaryError::malformed(format!("staged refresh {} is not UTF-8", self.pending_record), format!("{e:?}"))
        })?;
        Contract::parse(&text).map(Some)
    }

    fn sign(&self, contract: &mut Contract) -> Result<()> {
        let bytes = contract.signing_bytes()?;
        contract.signature = Some(self.module.sign_bytes(&bytes)?);
        Ok(())
    }

    /// While a rotation is pending, the previous key may only endorse the
    /// successor certificate.
    fn refuse_pending_rotation(&self) -> Result<()> {
        let state = self.module.lifecycle()?;
        if state == KeyLifecycle::TwoKeys {
            warn!("refusing to sign while a key rotation awaits its endorsement; refresh the key first");
            return Err(NotaryError::illegal(state, KeyEvent::SignBytes));
        }
        Ok(())
    }

    /// Run `f` with the module for `version`: the hardened module for the
    /// active version, otherwise the registered trusted module.
    fn with_verifier<R>(&self, version: &str, f: impl FnOnce(&dyn TrustedModule) -> Result<R>) -> Result<R> {
        if version == self.module.protocol() {
            return f(self.module.as_trusted());
        }
        let verifier = self.registry.get(version)?;
        f(verifier.as_ref())
    }

    fn with_digester<R>(&self, algorithm: &str, f: impl FnOnce(&dyn TrustedModule) -> Result<R>) -> Result<R> {
        if algorithm == self.module.digest_algorithm() {
            return f(self.module.as_trusted());
        }
        let digester = self.registry.by_digest_algorithm(algorithm)?;
        f(digester.as_ref())
    }

    fn store_citation(&self, citation: &Citation) -> Result<()> {
        let bytes = serde_json::to_vec(citation)
            .map_err(|e| NotaryError::malformed(format!("citation encoding failed: {e}"), ""))?;
        self.backend.store_record(&self.citation_record, &bytes)
    }
}

fn load_citation(backend: &dyn VaultBackend, record: &str) -> Result<Option<Citation>> {
    let Some(bytes) = backend.load_record(record)? else {
        return Ok(None);
    };
    let text = String::from_utf8(bytes)
        .map_err(|e| NotaryError::malformed(format!("citation record {record} is not UTF-8"), format!("{e:?}")))?;
    Citation::parse(&text).map(Some)
}
