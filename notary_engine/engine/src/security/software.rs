//! Software-only hardened module. Keys live in a sealed vault record; suitable
//! for tests and physically trusted hosts.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::{NotaryError, OperationContext, Result};
use crate::protocol::Protocol;
use crate::security::lifecycle::{KeyLifecycle, KeyRecord, KeyState};
use crate::security::{HardenedModule, TrustedModule};
use crate::types::Tag;
use crate::vault::{SealingKey, VaultBackend};

struct ModuleState {
    tag: Tag,
    keys: KeyState,
}

pub struct SoftwareModule {
    protocol: Protocol,
    record_name: String,
    backend: Arc<dyn VaultBackend>,
    sealing_key: SealingKey,
    // Held across the state check, key mutation and persistence write.
    inner: Mutex<ModuleState>,
}

impl SoftwareModule {
    /// Open the module stored under `record_name`, or start keyless with a
    /// fresh tag when no record exists.
    pub fn open(
        protocol: Protocol,
        backend: Arc<dyn VaultBackend>,
        sealing_key: SealingKey,
        record_name: impl Into<String>,
    ) -> Result<Self> {
        let record_name = record_name.into();
        let state = Self::load_state(protocol, backend.as_ref(), &sealing_key, &record_name)
            .in_operation("open", "Unable to load the security module configuration")?;

        info!(
            tag = %state.tag,
            state = ?state.keys.lifecycle(),
            protocol = %protocol,
            "security module opened"
        );

        Ok(SoftwareModule {
            protocol,
            record_name,
            backend,
            sealing_key,
            inner: Mutex::new(state),
        })
    }

    fn load_state(
        protocol: Protocol,
        backend: &dyn VaultBackend,
        sealing_key: &SealingKey,
        record_name: &str,
    ) -> Result<ModuleState> {
        let Some(sealed) = backend.load_record(record_name)? else {
            return Ok(ModuleState {
                tag: Tag::generate(),
                keys: KeyState::keyless(),
            });
        };

        let plaintext = sealing_key.unseal(&sealed)?;
        let record: KeyRecord = serde_json::from_slice(&plaintext).map_err(|e| {
            NotaryError::malformed(format!("key record {record_name} does not parse: {e}"), record_name)
        })?;

        if record.protocol != protocol.version() {
            return Err(NotaryError::ProtocolMismatch(format!(
                "key record {record_name} was written under protocol {} but the module speaks {}",
                record.protocol, protocol
            )));
        }

        Ok(ModuleState {
            tag: record.tag.clone(),
            keys: KeyState::from_record(&record)?,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ModuleState>> {
        self.inner
            .lock()
            .map_err(|_| NotaryError::Storage("Security module lock poisoned".into()))
    }

    /// Persist `keys` and only then make them current.
    fn commit(&self, state: &mut ModuleState, keys: KeyState) -> Result<()> {
        let record = keys.to_record(&state.tag, self.protocol);
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&record).map_err(|e| NotaryError::CryptoError(format!("key record encoding failed: {e}")))?,
        );
        let sealed = self.sealing_key.seal(&plaintext)?;
        self.backend.store_record(&self.record_name, &sealed)?;
        state.keys = keys;
        Ok(())
    }
}

impl TrustedModule for SoftwareModule {
    fn protocol(&self) -> &str {
        self.protocol.version()
    }

    fn digest_algorithm(&self) -> &str {
        self.protocol.digest_algorithm()
    }

    fn digest_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(self.protocol.digest(bytes))
    }

    fn signature_algorithm(&self) -> &str {
        self.protocol.signature_algorithm()
    }

    fn valid_signature(&self, public_key: &[u8], signature: &[u8], bytes: &[u8]) -> Result<bool> {
        self.protocol
            .verify(public_key, signature, bytes)
            .in_operation("valid_signature", "Unable to validate the signature")
    }
}

impl HardenedModule for SoftwareModule {
    fn as_trusted(&self) -> &dyn TrustedModule {
        self
    }

    fn tag(&self) -> Result<Tag> {
        Ok(self.lock()?.tag.clone())
    }

    fn lifecycle(&self) -> Result<KeyLifecycle> {
        Ok(self.lock()?.keys.lifecycle())
    }

    fn public_key(&self) -> Result<Vec<u8>> {
        let state = self.lock()?;
        state
            .keys
            .public_key()
            .ok_or_else(|| NotaryError::Uninitialized("the security module holds no keys".into()))
    }

    fn generate_keys(&self) -> Result<Vec<u8>> {
        let result = (|| -> Result<Vec<u8>> {
            let mut state = self.lock()?;
            let next = state.keys.generate_keys()?;
            self.commit(&mut state, next)?;
            info!(tag = %state.tag, "generated initial key pair");
            state.keys.public_key().ok_or_else(|| NotaryError::CryptoError("no public key after generation".into()))
        })();
        result.in_operation("generate_keys", "Unable to generate a new key pair")
    }

    fn rotate_keys(&self) -> Result<Vec<u8>> {
        let result = (|| -> Result<Vec<u8>> {
            let mut state = self.lock()?;
            let next = state.keys.rotate_keys()?;
            self.commit(&mut state, next)?;
            info!(tag = %state.tag, "rotated key pair, previous key pending endorsement");
            state.keys.public_key().ok_or_else(|| NotaryError::CryptoError("no public key after rotation".into()))
        })();
        result.in_operation("rotate_keys", "Unable to rotate the key pair")
    }

    fn sign_bytes(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let result = (|| -> Result<Vec<u8>> {
            let mut state = self.lock()?;
            let consumed_previous = state.keys.lifecycle() == KeyLifecycle::TwoKeys;
            let (next, signature) = state.keys.sign_bytes(self.protocol, bytes)?;
            if consumed_previous {
                // The previous key must be gone from storage before the signature leaves.
                self.commit(&mut state, next)?;
                info!(tag = %state.tag, "signed with previous key, previous key erased");
            } else {
                debug!(tag = %state.tag, length = bytes.len(), "signed bytes with current key");
            }
            Ok(signature)
        })();
        result.in_operation("sign_bytes", "Unable to digitally sign the bytes")
    }

    fn erase_keys(&self) -> Result<()> {
        let result = (|| -> Result<()> {
            let mut state = self.lock()?;
            self.backend.delete_record(&self.record_name)?;
            let retired = std::mem::replace(&mut state.tag, Tag::generate());
            state.keys = KeyState::keyless();
            info!(retired_tag = %retired, tag = %state.tag, "erased all key material");
            Ok(())
        })();
        result.in_operation("erase_keys", "Unable to erase the keys")
    }
}
