mod citation_test;
mod key_rotation_test;
mod vault_test;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::agent::DigitalNotary;
use crate::audit::AuditTracker;
use crate::error::{NotaryError, Result};
use crate::protocol::Protocol;
use crate::registry::ProtocolRegistry;
use crate::security::SoftwareModule;
use crate::types::Tag;
use crate::vault::{MemoryVaultBackend, SealingKey, VaultBackend};

pub(crate) const SEALING_KEY: [u8; 32] = [7u8; 32];

pub(crate) fn sealing_key() -> SealingKey {
    SealingKey::from_bytes(&SEALING_KEY).expect("32 byte key")
}

pub(crate) fn software_module(protocol: Protocol, backend: Arc<dyn VaultBackend>) -> Arc<SoftwareModule> {
    Arc::new(SoftwareModule::open(protocol, backend, sealing_key(), "test.keys").expect("module opens"))
}

/// Notary over `backend` speaking `protocol`, with its module exposed.
pub(crate) fn notary_with(
    protocol: Protocol,
    backend: Arc<dyn VaultBackend>,
    account: Tag,
) -> (DigitalNotary, Arc<SoftwareModule>) {
    let module = software_module(protocol, backend.clone());
    let notary = DigitalNotary::new(
        account,
        module.clone(),
        ProtocolRegistry::with_defaults(),
        backend,
        "test.citation",
        Arc::new(AuditTracker::new(100)),
    )
    .expect("notary opens");
    (notary, module)
}

pub(crate) fn memory_notary() -> (DigitalNotary, Arc<SoftwareModule>, Arc<MemoryVaultBackend>) {
    let backend = Arc::new(MemoryVaultBackend::new());
    let (notary, module) = notary_with(Protocol::CURRENT, backend.clone(), Tag::generate());
    (notary, module, backend)
}

/// Memory backend whose writes can be made to fail on demand, either all of
/// them or only those to records ending in a given suffix.
#[derive(Default)]
pub(crate) struct FlakyBackend {
    inner: MemoryVaultBackend,
    fail_writes: AtomicBool,
    failing_suffix: Mutex<Option<String>>,
}

impl FlakyBackend {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes_to(&self, suffix: Option<&str>) {
        *self.failing_suffix.lock().unwrap() = suffix.map(str::to_string);
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.inner.load_record(name).unwrap().is_some()
    }

    fn check_write(&self, name: &str) -> Result<()> {
        let failing = self.fail_writes.load(Ordering::SeqCst)
            || matches!(self.failing_suffix.lock().unwrap().as_deref(), Some(suffix) if name.ends_with(suffix));
        if failing {
            return Err(NotaryError::Storage("disk full".into()));
        }
        Ok(())
    }
}

impl VaultBackend for FlakyBackend {
    fn store_record(&self, name: &str, record: &[u8]) -> Result<()> {
        self.check_write(name)?;
        self.inner.store_record(name, record)
    }

    fn load_record(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.inner.load_record(name)
    }

    fn delete_record(&self, name: &str) -> Result<()> {
        self.check_write(name)?;
        self.inner.delete_record(name)
    }
}
