use std::sync::Arc;

use tempfile::TempDir;

use crate::error::NotaryError;
use crate::vault::{self, FileVaultBackend, MemoryVaultBackend, SealingKey, VaultBackend, VaultMode};

fn exercise_backend(backend: &dyn VaultBackend) {
    assert!(backend.load_record("notary.citation").unwrap().is_none());

    backend.store_record("notary.citation", b"first").expect("store failed");
    assert_eq!(backend.load_record("notary.citation").unwrap().unwrap(), b"first");

    backend.store_record("notary.citation", b"second").expect("overwrite failed");
    assert_eq!(backend.load_record("notary.citation").unwrap().unwrap(), b"second");

    backend.delete_record("notary.citation").expect("delete failed");
    assert!(backend.load_record("notary.citation").unwrap().is_none());

    // Deleting what is already gone is not an error.
    backend.delete_record("notary.citation").expect("second delete failed");
}

#[test]
fn test_memory_backend_store_load_delete() {
    let backend = MemoryVaultBackend::new();
    exercise_backend(&backend);

    backend.store_record("b.keys", b"x").unwrap();
    backend.store_record("a.keys", b"y").unwrap();
    assert_eq!(backend.record_names(), vec!["a.keys".to_string(), "b.keys".to_string()]);
}

#[test]
fn test_memory_backend_clones_share_records() {
    let backend = MemoryVaultBackend::new();
    let clone = backend.clone();
    backend.store_record("shared", b"value").unwrap();
    assert_eq!(clone.load_record("shared").unwrap().unwrap(), b"value");
}

#[test]
fn test_file_backend_store_load_delete() {
    let dir = TempDir::new().unwrap();
    let backend = FileVaultBackend::open(dir.path().join("records")).expect("open failed");
    assert!(backend.directory().is_dir());
    exercise_backend(&backend);
}

#[test]
fn test_file_backend_survives_reopen() {
    let dir = TempDir::new().unwrap();
    FileVaultBackend::open(dir.path())
        .unwrap()
        .store_record("notary.keys", b"sealed bytes")
        .unwrap();

    let reopened = FileVaultBackend::open(dir.path()).unwrap();
    assert_eq!(reopened.load_record("notary.keys").unwrap().unwrap(), b"sealed bytes");
    assert!(!dir.path().join("notary.keys.tmp").exists());
}

#[test]
fn test_file_backend_rejects_unsafe_names() {
    let dir = TempDir::new().unwrap();
    let backend = FileVaultBackend::open(dir.path()).unwrap();

    for name in ["", ".", "..", "../escape", "a/b", "with space"] {
        let err = backend.store_record(name, b"x").unwrap_err();
        assert!(matches!(err, NotaryError::Precondition(_)), "{name:?} gave {err}");
        assert!(backend.load_record(name).is_err());
        assert!(backend.delete_record(name).is_err());
    }
}

#[test]
fn test_vault_mode_opens_matching_backend() {
    let dir = TempDir::new().unwrap();
    let backends: Vec<Arc<dyn VaultBackend>> = vec![
        vault::open(&VaultMode::Memory).unwrap(),
        vault::open(&VaultMode::Directory(dir.path().to_path_buf())).unwrap(),
    ];
    for backend in backends {
        exercise_backend(backend.as_ref());
    }
}

#[test]
fn test_seal_unseal_round_trip() {
    let key = SealingKey::generate();
    let sealed = key.seal(b"private key material").unwrap();
    assert_ne!(&sealed[12..], b"private key material".as_slice());
    assert_eq!(key.unseal(&sealed).unwrap().as_slice(), b"private key material");

    // Fresh nonce per seal.
    assert_ne!(key.seal(b"same").unwrap(), key.seal(b"same").unwrap());
}

#[test]
fn test_unseal_rejects_tampering_and_wrong_key() {
    let key = SealingKey::generate();
    let mut sealed = key.seal(b"secret").unwrap();

    assert!(matches!(SealingKey::generate().unseal(&sealed), Err(NotaryError::CryptoError(_))));
    assert!(matches!(key.unseal(&sealed[..8]), Err(NotaryError::CryptoError(_))));

    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;
    assert!(matches!(key.unseal(&sealed), Err(NotaryError::CryptoError(_))));
}

#[test]
fn test_sealing_key_hex_round_trip() {
    let key = SealingKey::generate();
    let restored = SealingKey::from_hex(&key.to_hex()).unwrap();
    let sealed = key.seal(b"payload").unwrap();
    assert_eq!(restored.unseal(&sealed).unwrap().as_slice(), b"payload");

    assert!(SealingKey::from_hex("not hex").is_err());
    assert!(SealingKey::from_bytes(&[0u8; 16]).is_err());
    assert!(!format!("{key:?}").contains(key.to_hex().as_str()));
}
