//! Keyed attestation storage with tombstone-based replacement.
//!
//! Records are never removed. A superseded EAS record (same identifier hash,
//! different key) has its collection id overwritten with [`DELETE_KEY`] and is
//! skipped by every live lookup from then on.

use crate::attestation::Attestation;
use crate::error::StoreError;
use crate::status::AttestationValidationStatus;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const DELETE_KEY: &str = "DELETE";

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRecord {
    pub key: String,
    pub name: String,
    pub chains: String,
    pub members: Value,
    pub collection_id: String,
    pub attestation: String,
    pub identifier_hash: String,
    #[serde(default)]
    pub status: Option<AttestationValidationStatus>,
    pub stored_at: DateTime<Utc>,
}

impl AttestationRecord {
    pub fn from_attestation(att: &Attestation, stored_at: DateTime<Utc>) -> Self {
        Self {
            key: att.database_key(),
            name: att.token.name.clone(),
            chains: att.chain_id().to_string(),
            members: att.members_json(),
            collection_id: att.collection_id(),
            attestation: att.raw_text(),
            identifier_hash: att.identifier_hash(),
            status: att.status(),
            stored_at,
        }
    }

    pub fn is_live(&self) -> bool {
        self.collection_id != DELETE_KEY
    }
}

pub trait AttestationStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<AttestationRecord>>;
    /// Live records carrying `identifier_hash`.
    fn find_by_identifier(&self, identifier_hash: &str) -> StoreResult<Vec<AttestationRecord>>;
    fn upsert(&self, record: AttestationRecord) -> StoreResult<()>;
    /// Tombstone `superseded` and write `record` as one change: either both
    /// land or neither does.
    fn replace(&self, superseded: &[String], record: AttestationRecord) -> StoreResult<()>;
    fn list(&self) -> StoreResult<Vec<AttestationRecord>>;
}

fn live_with_identifier<'a>(
    records: impl Iterator<Item = &'a AttestationRecord>,
    identifier_hash: &str,
) -> Vec<AttestationRecord> {
    records
        .filter(|r| r.is_live() && r.identifier_hash.eq_ignore_ascii_case(identifier_hash))
        .cloned()
        .collect()
}

fn apply_replace(
    records: &mut BTreeMap<String, AttestationRecord>,
    superseded: &[String],
    record: AttestationRecord,
) {
    for key in superseded {
        if let Some(old) = records.get_mut(key) {
            old.collection_id = DELETE_KEY.to_string();
        }
    }
    records.insert(record.key.clone(), record);
}

// ── In-memory ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, AttestationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttestationStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<AttestationRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn find_by_identifier(&self, identifier_hash: &str) -> StoreResult<Vec<AttestationRecord>> {
        Ok(live_with_identifier(self.records.read().values(), identifier_hash))
    }

    fn upsert(&self, record: AttestationRecord) -> StoreResult<()> {
        self.records.write().insert(record.key.clone(), record);
        Ok(())
    }

    fn replace(&self, superseded: &[String], record: AttestationRecord) -> StoreResult<()> {
        apply_replace(&mut self.records.write(), superseded, record);
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<AttestationRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }
}

// ── JSON file ───────────────────────────────────────────────────────────────

/// Whole-file JSON store. Every write replaces the file atomically and the
/// in-memory view only changes once the file has been replaced.
pub struct FileStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, AttestationRecord>>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let data = fs::read(&path)?;
            if data.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&data)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), count = records.len(), "attestation store opened");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, records: &BTreeMap<String, AttestationRecord>) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    fn commit(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, AttestationRecord>),
    ) -> StoreResult<()> {
        let mut records = self.records.write();
        let mut next = records.clone();
        change(&mut next);
        self.flush(&next)?;
        *records = next;
        Ok(())
    }
}

impl AttestationStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<AttestationRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn find_by_identifier(&self, identifier_hash: &str) -> StoreResult<Vec<AttestationRecord>> {
        Ok(live_with_identifier(self.records.read().values(), identifier_hash))
    }

    fn upsert(&self, record: AttestationRecord) -> StoreResult<()> {
        self.commit(|records| {
            records.insert(record.key.clone(), record);
        })
    }

    fn replace(&self, superseded: &[String], record: AttestationRecord) -> StoreResult<()> {
        self.commit(|records| apply_replace(records, superseded, record))
    }

    fn list(&self) -> StoreResult<Vec<AttestationRecord>> {
        Ok(self.records.read().values().cloned().collect())
    }
}

// ── Dedup / replacement ─────────────────────────────────────────────────────

pub struct PersistenceManager {
    store: Arc<dyn AttestationStore>,
    write_lock: Mutex<()>,
}

impl PersistenceManager {
    pub fn new(store: Arc<dyn AttestationStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn AttestationStore> {
        &self.store
    }

    /// Write `record`, tombstoning every live record that carries its
    /// identifier hash under another key, in a single store write. Returns
    /// how many records were replaced.
    pub fn supersede(&self, record: AttestationRecord) -> StoreResult<usize> {
        let _guard = self.write_lock.lock();
        let superseded: Vec<String> = self
            .store
            .find_by_identifier(&record.identifier_hash)?
            .into_iter()
            .map(|old| old.key)
            .filter(|key| *key != record.key)
            .collect();
        for old_key in &superseded {
            info!(old_key = %old_key, new_key = %record.key, "replacing superseded attestation");
        }
        self.store.replace(&superseded, record)?;
        Ok(superseded.len())
    }

    pub fn store_eas(&self, att: &Attestation, now: DateTime<Utc>) -> StoreResult<AttestationRecord> {
        let record = AttestationRecord::from_attestation(att, now);
        self.supersede(record.clone())?;
        Ok(record)
    }

    pub fn store_legacy(
        &self,
        att: &Attestation,
        now: DateTime<Utc>,
    ) -> StoreResult<AttestationRecord> {
        let record = AttestationRecord::from_attestation(att, now);
        let _guard = self.write_lock.lock();
        self.store.upsert(record.clone())?;
        Ok(record)
    }

    /// Bring a stored record's identity up to date. Returns `false` when the
    /// record already carries `identifier_hash`.
    pub fn refresh_identifier(
        &self,
        key: &str,
        identifier_hash: &str,
        collection_id: &str,
    ) -> StoreResult<bool> {
        let _guard = self.write_lock.lock();
        let mut record = self
            .store
            .get(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if record.identifier_hash == identifier_hash {
            return Ok(false);
        }
        debug!(key, from = %record.identifier_hash, to = identifier_hash, "identifier refreshed");
        record.identifier_hash = identifier_hash.to_string();
        if record.is_live() {
            record.collection_id = collection_id.to_lowercase();
        }
        self.store.upsert(record)?;
        Ok(true)
    }
}
