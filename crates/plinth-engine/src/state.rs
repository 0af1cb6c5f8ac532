//! State management for provisioned resources
//!
//! Manages `<state-dir>/state.json`, which remembers every resource the
//! engine has applied, and `<state-dir>/lock.json`, which keeps two runs
//! from touching the same state at once.
//!
//! Every commit rewrites the whole document through a temp file that is
//! fsynced and renamed over `state.json`.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const STATE_VERSION: u32 = 2;
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TEMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";
const STALE_LOCK_HOURS: i64 = 1;

/// Persisted state document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// State file version
    pub version: u32,

    /// Incremented on every commit
    #[serde(default)]
    pub serial: u64,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Records indexed by logical name
    #[serde(default)]
    pub resources: BTreeMap<String, StateRecord>,

    /// Old instances waiting for deletion
    #[serde(default)]
    pub deposed: Vec<DeposedInstance>,
}

/// Point-in-time copy of the state document
pub type StateSnapshot = StateDocument;

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
            deposed: Vec::new(),
        }
    }
}

impl StateDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&StateRecord> {
        self.resources.get(name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.deposed.is_empty()
    }

    /// Deposed instances of one logical resource
    pub fn deposed_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DeposedInstance> {
        self.deposed.iter().filter(move |d| d.name == name)
    }
}

/// Last applied state of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Logical name
    pub name: String,

    pub resource_type: String,

    /// Provider-specific resource ID
    pub provider_id: String,

    /// Properties as last applied, fully resolved
    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Attributes reported by the provider (ids, addresses, ...)
    #[serde(default)]
    pub outputs: Map<String, Value>,

    /// Logical names this resource depended on when last applied
    #[serde(default)]
    pub dependencies: BTreeSet<String>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    pub fn new(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            provider_id: provider_id.into(),
            properties: Map::new(),
            outputs: Map::new(),
            dependencies: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_outputs(mut self, outputs: Map<String, Value>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.outputs.insert(key.into(), value);
        self
    }
}

/// Old instance of a resource replaced with create-before-delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeposedInstance {
    pub name: String,
    pub resource_type: String,
    pub provider_id: String,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    pub deposed_at: DateTime<Utc>,
}

impl DeposedInstance {
    pub fn from_record(record: &StateRecord) -> Self {
        Self {
            name: record.name.clone(),
            resource_type: record.resource_type.clone(),
            provider_id: record.provider_id.clone(),
            dependencies: record.dependencies.clone(),
            deposed_at: Utc::now(),
        }
    }
}

/// State manager: locates the state directory and opens stores
pub struct StateManager {
    state_dir: PathBuf,
}

impl StateManager {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    /// Get the backup file path
    pub fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    /// Get the lock file path
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Read the current state under the lock
    ///
    /// The lock is held only while the file is read, so a read never sees a
    /// run in progress. Fails with [`EngineError::ConcurrentRun`] while
    /// another run holds it.
    pub async fn read(&self, operation: &str) -> Result<StateDocument> {
        if !self.state_dir.exists() {
            tracing::debug!("State directory not found, returning empty state");
            return Ok(StateDocument::new());
        }

        let lock = StateLock::acquire(self.lock_path(), operation).await?;
        let document = self.load().await;
        lock.release().await?;
        document
    }

    /// Load the current state without taking the lock
    pub async fn load(&self) -> Result<StateDocument> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(StateDocument::new());
        }

        let content = fs::read_to_string(&path).await?;
        let mut state: StateDocument = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(EngineError::State(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }
        if state.version < STATE_VERSION {
            tracing::debug!(
                "Migrating state from version {} to {}",
                state.version,
                STATE_VERSION
            );
            state.version = STATE_VERSION;
        }

        tracing::debug!(
            serial = state.serial,
            "Loaded state with {} resources",
            state.resources.len()
        );
        Ok(state)
    }

    /// Lock the state and open it for a run
    ///
    /// `operation` is recorded in the lock file (e.g. "apply").
    pub async fn open(&self, operation: &str) -> Result<StateStore> {
        self.ensure_state_dir().await?;

        let lock = StateLock::acquire(self.lock_path(), operation).await?;
        let document = self.load().await?;

        let path = self.state_path();
        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
            tracing::debug!("Created state backup");
        }

        Ok(StateStore {
            inner: Arc::new(StoreInner {
                state_path: path,
                temp_path: self.state_dir.join(STATE_TEMP),
                document: Mutex::new(document),
                lock: std::sync::Mutex::new(Some(lock)),
            }),
        })
    }
}

/// Open, locked state shared by the tasks of a run
///
/// Cloning is cheap; all clones share the document and the lock. The lock
/// is released by [`StateStore::close`] or when the last clone is dropped.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state_path: PathBuf,
    temp_path: PathBuf,
    document: Mutex<StateDocument>,
    lock: std::sync::Mutex<Option<StateLock>>,
}

enum StateOp {
    Put(StateRecord),
    Remove(String),
    Depose(DeposedInstance),
    ForgetDeposed { name: String, provider_id: String },
}

impl StateStore {
    pub async fn get(&self, name: &str) -> Option<StateRecord> {
        self.inner.document.lock().await.get(name).cloned()
    }

    pub async fn snapshot_all(&self) -> StateSnapshot {
        self.inner.document.lock().await.clone()
    }

    pub async fn serial(&self) -> u64 {
        self.inner.document.lock().await.serial
    }

    /// Stage several changes to be committed as one write
    pub fn begin_transaction(&self) -> Transaction {
        Transaction {
            store: self.clone(),
            ops: Vec::new(),
        }
    }

    /// Insert or replace a record
    pub async fn commit(&self, record: StateRecord) -> Result<()> {
        let mut tx = self.begin_transaction();
        tx.put(record);
        tx.commit().await
    }

    /// Remove a record
    pub async fn remove(&self, name: &str) -> Result<()> {
        let mut tx = self.begin_transaction();
        tx.remove(name);
        tx.commit().await
    }

    /// Release the lock
    pub async fn close(self) -> Result<()> {
        let lock = self
            .inner
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(lock) = lock {
            lock.release().await?;
        }
        Ok(())
    }

    async fn apply(&self, ops: Vec<StateOp>) -> Result<()> {
        let mut document = self.inner.document.lock().await;

        let mut next = document.clone();
        for op in ops {
            match op {
                StateOp::Put(record) => {
                    next.resources.insert(record.name.clone(), record);
                }
                StateOp::Remove(name) => {
                    next.resources.remove(&name);
                }
                StateOp::Depose(instance) => next.deposed.push(instance),
                StateOp::ForgetDeposed { name, provider_id } => next
                    .deposed
                    .retain(|d| !(d.name == name && d.provider_id == provider_id)),
            }
        }
        next.version = STATE_VERSION;
        next.serial += 1;
        next.updated_at = Utc::now();

        self.persist(&next).await?;
        *document = next;

        tracing::debug!(serial = document.serial, "Committed state");
        Ok(())
    }

    async fn persist(&self, document: &StateDocument) -> Result<()> {
        let content = serde_json::to_vec_pretty(document)?;

        let mut file = fs::File::create(&self.inner.temp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&self.inner.temp_path, &self.inner.state_path).await?;
        Ok(())
    }
}

/// Changes staged against a [`StateStore`], written atomically on commit
pub struct Transaction {
    store: StateStore,
    ops: Vec<StateOp>,
}

impl Transaction {
    pub fn put(&mut self, record: StateRecord) -> &mut Self {
        self.ops.push(StateOp::Put(record));
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.ops.push(StateOp::Remove(name.to_string()));
        self
    }

    /// Keep an old instance for deletion in a later phase
    pub fn depose(&mut self, instance: DeposedInstance) -> &mut Self {
        self.ops.push(StateOp::Depose(instance));
        self
    }

    /// Drop a deposed instance once it has been deleted
    pub fn forget_deposed(&mut self, name: &str, provider_id: &str) -> &mut Self {
        self.ops.push(StateOp::ForgetDeposed {
            name: name.to_string(),
            provider_id: provider_id.to_string(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub async fn commit(self) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        self.store.apply(self.ops).await
    }
}

/// Lock information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub holder: String,
    #[serde(default)]
    pub pid: u32,
    #[serde(default)]
    pub operation: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn describe(&self) -> String {
        format!("{} (pid {}, {})", self.holder, self.pid, self.operation)
    }
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    async fn acquire(lock_path: PathBuf, operation: &str) -> Result<Self> {
        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            operation: operation.to_string(),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_vec_pretty(&info)?;

        // second attempt only after a stale lock was removed
        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&content).await?;
                    file.sync_all().await?;
                    tracing::debug!("Acquired state lock");
                    return Ok(Self {
                        lock_path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let existing = read_lock_info(&lock_path).await;
                    let age = Utc::now().signed_duration_since(existing.acquired_at);
                    if age.num_hours() < STALE_LOCK_HOURS {
                        return Err(EngineError::ConcurrentRun {
                            holder: existing.describe(),
                            since: existing.acquired_at,
                        });
                    }

                    tracing::warn!("Removing stale lock from {}", existing.describe());
                    match fs::remove_file(&lock_path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::State(format!(
            "could not acquire lock {}",
            lock_path.display()
        )))
    }

    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            match fs::remove_file(&self.lock_path).await {
                Ok(()) => tracing::debug!("Released state lock"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

/// Read an existing lock file; a file that cannot be parsed (e.g. one being
/// written right now) is dated by its modification time
async fn read_lock_info(lock_path: &Path) -> LockInfo {
    let content = fs::read_to_string(lock_path).await.unwrap_or_default();
    if let Ok(info) = serde_json::from_str::<LockInfo>(&content) {
        return info;
    }

    let acquired_at = match fs::metadata(lock_path).await {
        Ok(meta) => meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now()),
        Err(_) => Utc::now(),
    };
    LockInfo {
        holder: "unknown".to_string(),
        pid: 0,
        operation: String::new(),
        acquired_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn vpc_record() -> StateRecord {
        StateRecord::new("my-vpc", "aws:ec2:Vpc", "vpc-0001")
            .with_output("id", json!("vpc-0001"))
            .with_output("cidr_block", json!("10.0.0.0/16"))
    }

    #[tokio::test]
    async fn test_commit_and_reload() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path().join(".plinth"));

        let store = manager.open("apply").await.unwrap();
        store.commit(vpc_record()).await.unwrap();
        assert_eq!(store.serial().await, 1);
        store.close().await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.serial, 1);
        assert_eq!(loaded.get("my-vpc").unwrap().provider_id, "vpc-0001");
        assert!(!manager.state_dir().join(STATE_TEMP).exists());
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = manager.load().await.unwrap();
        assert!(state.is_empty());
        assert_eq!(state.serial, 0);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let first = manager.open("apply").await.unwrap();
        let second = manager.open("destroy").await;
        assert!(matches!(second, Err(EngineError::ConcurrentRun { .. })));

        first.close().await.unwrap();
        assert!(!manager.lock_path().exists());
        let third = manager.open("apply").await.unwrap();
        third.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_waits_for_no_run() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path().join(".plinth"));
        assert!(manager.read("plan").await.unwrap().is_empty());

        let store = manager.open("apply").await.unwrap();
        store.commit(vpc_record()).await.unwrap();
        let blocked = manager.read("plan").await;
        assert!(matches!(blocked, Err(EngineError::ConcurrentRun { .. })));
        store.close().await.unwrap();

        let state = manager.read("plan").await.unwrap();
        assert_eq!(state.serial, 1);
        assert!(!manager.lock_path().exists());
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        {
            let store = manager.open("apply").await.unwrap();
            let _clone = store.clone();
            assert!(manager.lock_path().exists());
        }
        assert!(!manager.lock_path().exists());
    }

    #[tokio::test]
    async fn test_stale_lock_is_replaced() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let stale = LockInfo {
            holder: "old-host".to_string(),
            pid: 42,
            operation: "apply".to_string(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        std::fs::write(manager.lock_path(), serde_json::to_string(&stale).unwrap()).unwrap();

        let store = manager.open("apply").await.unwrap();
        let content = std::fs::read_to_string(manager.lock_path()).unwrap();
        let info: LockInfo = serde_json::from_str(&content).unwrap();
        assert_eq!(info.pid, std::process::id());
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_applies_all_changes_in_one_commit() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let store = manager.open("apply").await.unwrap();

        store.commit(vpc_record()).await.unwrap();
        let old = store.get("my-vpc").await.unwrap();

        let mut tx = store.begin_transaction();
        tx.depose(DeposedInstance::from_record(&old))
            .put(StateRecord::new("my-vpc", "aws:ec2:Vpc", "vpc-0002"));
        tx.commit().await.unwrap();

        let snapshot = store.snapshot_all().await;
        assert_eq!(snapshot.serial, 2);
        assert_eq!(snapshot.get("my-vpc").unwrap().provider_id, "vpc-0002");
        assert_eq!(snapshot.deposed_of("my-vpc").count(), 1);

        let mut tx = store.begin_transaction();
        tx.forget_deposed("my-vpc", "vpc-0001");
        tx.commit().await.unwrap();
        assert!(store.snapshot_all().await.deposed.is_empty());

        store.remove("my-vpc").await.unwrap();
        assert!(store.get("my-vpc").await.is_none());
        assert_eq!(store.serial().await, 4);
    }

    #[tokio::test]
    async fn test_empty_transaction_does_not_commit() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let store = manager.open("apply").await.unwrap();

        store.begin_transaction().commit().await.unwrap();
        assert_eq!(store.serial().await, 0);
        assert!(!manager.state_path().exists());
    }

    #[tokio::test]
    async fn test_backup_on_open() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let store = manager.open("apply").await.unwrap();
        store.commit(vpc_record()).await.unwrap();
        store.close().await.unwrap();
        assert!(!manager.backup_path().exists());

        let store = manager.open("apply").await.unwrap();
        store.remove("my-vpc").await.unwrap();
        store.close().await.unwrap();

        let backup: StateDocument =
            serde_json::from_str(&std::fs::read_to_string(manager.backup_path()).unwrap())
                .unwrap();
        assert!(backup.get("my-vpc").is_some());
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut document = StateDocument::new();
        document.version = STATE_VERSION + 1;
        std::fs::write(manager.state_path(), serde_json::to_string(&document).unwrap()).unwrap();

        assert!(matches!(manager.load().await, Err(EngineError::State(_))));
        assert!(manager.open("apply").await.is_err());
        assert!(!manager.lock_path().exists());
    }

    #[tokio::test]
    async fn test_older_version_is_migrated() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let legacy = json!({
            "version": 1,
            "updated_at": "2024-01-01T00:00:00Z",
            "resources": {
                "my-vpc": {
                    "name": "my-vpc",
                    "resource_type": "aws:ec2:Vpc",
                    "provider_id": "vpc-0001",
                    "created_at": "2024-01-01T00:00:00Z",
                    "updated_at": "2024-01-01T00:00:00Z",
                    "status": "running"
                }
            }
        });
        std::fs::write(manager.state_path(), legacy.to_string()).unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.version, STATE_VERSION);
        assert_eq!(loaded.serial, 0);
        assert!(loaded.get("my-vpc").unwrap().dependencies.is_empty());
    }
}
