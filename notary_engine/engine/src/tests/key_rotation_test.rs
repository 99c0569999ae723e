use std::sync::Arc;

use crate::error::NotaryError;
use crate::protocol::Protocol;
use crate::security::{HardenedModule, KeyEvent, KeyLifecycle, SoftwareModule, TrustedModule};
use crate::tests::{FlakyBackend, sealing_key, software_module};
use crate::vault::{MemoryVaultBackend, SealingKey, VaultBackend};

fn memory_module() -> (Arc<SoftwareModule>, Arc<MemoryVaultBackend>) {
    let backend = Arc::new(MemoryVaultBackend::new());
    (software_module(Protocol::V2, backend.clone()), backend)
}

#[test]
fn test_fresh_module_is_keyless() {
    let (module, backend) = memory_module();
    assert_eq!(module.lifecycle().unwrap(), KeyLifecycle::Keyless);
    assert!(matches!(module.public_key().unwrap_err(), NotaryError::Uninitialized(_)));
    // Nothing is written until keys exist.
    assert!(backend.record_names().is_empty());
}

#[test]
fn test_generate_keys_only_once() {
    let (module, _) = memory_module();
    let public_key = module.generate_keys().expect("first generate");
    assert_eq!(public_key.len(), 32);
    assert_eq!(module.public_key().unwrap(), public_key);

    let err = module.generate_keys().unwrap_err();
    assert!(matches!(
        err.root(),
        NotaryError::IllegalTransition {
            state: KeyLifecycle::LoneKey,
            event: KeyEvent::GenerateKeys
        }
    ));
    assert_eq!(module.public_key().unwrap(), public_key);
}

#[test]
fn test_rotation_signs_once_with_previous_key() {
    let (module, _) = memory_module();
    let old_public = module.generate_keys().unwrap();
    let new_public = module.rotate_keys().unwrap();
    assert_ne!(old_public, new_public);
    assert_eq!(module.lifecycle().unwrap(), KeyLifecycle::TwoKeys);

    let endorsement = module.sign_bytes(b"certificate v2").unwrap();
    assert!(module.valid_signature(&old_public, &endorsement, b"certificate v2").unwrap());
    assert!(!module.valid_signature(&new_public, &endorsement, b"certificate v2").unwrap());
    assert_eq!(module.lifecycle().unwrap(), KeyLifecycle::LoneKey);

    let ordinary = module.sign_bytes(b"document").unwrap();
    assert!(module.valid_signature(&new_public, &ordinary, b"document").unwrap());
}

#[test]
fn test_second_rotation_refused_while_pending() {
    let (module, _) = memory_module();
    module.generate_keys().unwrap();
    let pending = module.rotate_keys().unwrap();

    let err = module.rotate_keys().unwrap_err();
    assert!(matches!(
        err.root(),
        NotaryError::IllegalTransition {
            state: KeyLifecycle::TwoKeys,
            event: KeyEvent::RotateKeys
        }
    ));
    assert_eq!(module.public_key().unwrap(), pending);
}

#[test]
fn test_keyless_module_refuses_to_sign_or_rotate() {
    let (module, _) = memory_module();
    assert!(matches!(
        module.sign_bytes(b"x").unwrap_err().root(),
        NotaryError::IllegalTransition {
            state: KeyLifecycle::Keyless,
            ..
        }
    ));
    assert!(matches!(
        module.rotate_keys().unwrap_err().root(),
        NotaryError::IllegalTransition {
            state: KeyLifecycle::Keyless,
            ..
        }
    ));
}

#[test]
fn test_erase_is_idempotent_and_retires_tag() {
    let (module, backend) = memory_module();
    let first_tag = module.tag().unwrap();
    module.generate_keys().unwrap();
    assert_eq!(backend.record_names(), vec!["test.keys".to_string()]);

    module.erase_keys().unwrap();
    assert_eq!(module.lifecycle().unwrap(), KeyLifecycle::Keyless);
    assert!(backend.record_names().is_empty());
    let second_tag = module.tag().unwrap();
    assert_ne!(first_tag, second_tag);

    module.erase_keys().expect("erasing a keyless module");
    assert_eq!(module.lifecycle().unwrap(), KeyLifecycle::Keyless);

    // A new identity can be bootstrapped afterwards.
    module.generate_keys().unwrap();
    assert_eq!(module.lifecycle().unwrap(), KeyLifecycle::LoneKey);
}

#[test]
fn test_reopen_restores_pending_rotation() {
    let backend = Arc::new(MemoryVaultBackend::new());
    let (tag, old_public, new_public) = {
        let module = software_module(Protocol::V2, backend.clone());
        let old_public = module.generate_keys().unwrap();
        let new_public = module.rotate_keys().unwrap();
        (module.tag().unwrap(), old_public, new_public)
    };

    let reopened = software_module(Protocol::V2, backend.clone());
    assert_eq!(reopened.tag().unwrap(), tag);
    assert_eq!(reopened.lifecycle().unwrap(), KeyLifecycle::TwoKeys);
    assert_eq!(reopened.public_key().unwrap(), new_public);

    let endorsement = reopened.sign_bytes(b"resume").unwrap();
    assert!(reopened.valid_signature(&old_public, &endorsement, b"resume").unwrap());

    // The consumed previous key stays consumed across another restart.
    let again = software_module(Protocol::V2, backend);
    assert_eq!(again.lifecycle().unwrap(), KeyLifecycle::LoneKey);
}

#[test]
fn test_failed_persist_leaves_state_unchanged() {
    let backend = Arc::new(FlakyBackend::default());
    let module = software_module(Protocol::V2, backend.clone());

    backend.fail_writes(true);
    let err = module.generate_keys().unwrap_err();
    assert!(matches!(err.root(), NotaryError::Storage(_)));
    assert_eq!(module.lifecycle().unwrap(), KeyLifecycle::Keyless);

    backend.fail_writes(false);
    let old_public = module.generate_keys().unwrap();
    module.rotate_keys().unwrap();

    // The previous key must not be spent unless its erasure is durable.
    backend.fail_writes(true);
    assert!(module.sign_bytes(b"endorse").is_err());
    assert_eq!(module.lifecycle().unwrap(), KeyLifecycle::TwoKeys);

    backend.fail_writes(false);
    let endorsement = module.sign_bytes(b"endorse").unwrap();
    assert!(module.valid_signature(&old_public, &endorsement, b"endorse").unwrap());
}

#[test]
fn test_wrong_sealing_key_cannot_open() {
    let backend = Arc::new(MemoryVaultBackend::new());
    software_module(Protocol::V2, backend.clone()).generate_keys().unwrap();

    let result = SoftwareModule::open(Protocol::V2, backend.clone(), SealingKey::generate(), "test.keys");
    let err = result.err().expect("opened with the wrong key");
    assert!(matches!(err.root(), NotaryError::CryptoError(_)));

    assert!(SoftwareModule::open(Protocol::V2, backend, sealing_key(), "test.keys").is_ok());
}

#[test]
fn test_record_from_other_protocol_is_refused() {
    let backend = Arc::new(MemoryVaultBackend::new());
    software_module(Protocol::V1, backend.clone()).generate_keys().unwrap();

    let result = SoftwareModule::open(Protocol::V2, backend, sealing_key(), "test.keys");
    let err = result.err().expect("opened a v1 record as v2");
    assert!(matches!(err.root(), NotaryError::ProtocolMismatch(_)));
}

#[test]
fn test_record_is_sealed_at_rest() {
    let (module, backend) = memory_module();
    let public_key = module.generate_keys().unwrap();
    let stored = backend.load_record("test.keys").unwrap().unwrap();
    let encoded = crate::types::b64::encode(&public_key);
    assert!(!String::from_utf8_lossy(&stored).contains(&encoded));
    assert!(serde_json::from_slice::<serde_json::Value>(&stored).is_err());
}

#[test]
fn test_protocol_versions_sign_differently() {
    let v1 = software_module(Protocol::V1, Arc::new(MemoryVaultBackend::new()));
    let public_key = v1.generate_keys().unwrap();
    let signature = v1.sign_bytes(b"same bytes").unwrap();

    assert_eq!(v1.signature_algorithm(), "ed25519ph");
    assert!(Protocol::V1.verify(&public_key, &signature, b"same bytes").unwrap());
    assert!(!Protocol::V2.verify(&public_key, &signature, b"same bytes").unwrap());
    assert_eq!(v1.digest_bytes(b"abc").unwrap().len(), 32);
    assert_eq!(Protocol::V2.digest(b"abc").len(), 64);
}
