//! File-backed progress tracking shared across provisioning processes.

use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use super::value::StepValue;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct LockOptions {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Durable step-outcome store for one (hub, scratch org, store) triple.
///
/// The backing file holds all triples; every operation loads the whole
/// document, touches one key, and writes the whole document back while
/// holding the advisory lock. Concurrent provisioning runs against
/// different stores share the file safely only because the lock spans the
/// entire read-modify-write cycle.
pub struct ProgressStore {
    path: PathBuf,
    hub: String,
    scratch: String,
    store_name: String,
    lock: LockOptions,
}

impl ProgressStore {
    pub fn new(
        path: impl Into<PathBuf>,
        hub: impl Into<String>,
        scratch: impl Into<String>,
        store_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            hub: hub.into(),
            scratch: scratch.into(),
            store_name: store_name.into(),
            lock: LockOptions::default(),
        }
    }

    pub fn with_lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Record `value` under this store's identity path, creating the
    /// intermediate levels on first write.
    pub async fn set_value(&self, key: &str, value: StepValue) -> Result<()> {
        let _guard = self.acquire_lock().await?;
        let mut doc = self.load();
        let leaf = Self::leaf_mut(&mut doc, &self.hub, &self.scratch, &self.store_name);
        leaf.insert(key.to_string(), value.to_json());
        self.persist(&doc)
    }

    /// Read back a recorded step outcome. An identity path that was never
    /// written reads the same as one never touched: `None`.
    pub async fn get_value(&self, key: &str) -> Result<Option<StepValue>> {
        let _guard = self.acquire_lock().await?;
        let doc = self.load();
        Ok(doc
            .get(&self.hub)
            .and_then(Value::as_object)
            .and_then(|hub| hub.get(&self.scratch))
            .and_then(Value::as_object)
            .and_then(|scratch| scratch.get(&self.store_name))
            .and_then(Value::as_object)
            .and_then(|store| store.get(key))
            .and_then(StepValue::from_json))
    }

    fn leaf_mut<'a>(
        doc: &'a mut Map<String, Value>,
        hub: &str,
        scratch: &str,
        store_name: &str,
    ) -> &'a mut Map<String, Value> {
        let hub_level = Self::child_object(doc, hub);
        let scratch_level = Self::child_object(hub_level, scratch);
        Self::child_object(scratch_level, store_name)
    }

    fn child_object<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
        let entry = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(child) => child,
            _ => unreachable!(),
        }
    }

    fn load(&self) -> Map<String, Value> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    tracing::warn!(
                        "Status file {} is not a valid record, starting from empty",
                        self.path.display()
                    );
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        }
    }

    fn persist(&self, doc: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Advisory cross-process lock: the lock file's absence means the
    /// store is free. Creation is atomic (`create_new`), acquisition
    /// polls until the deadline.
    async fn acquire_lock(&self) -> Result<LockGuard> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let deadline = Instant::now() + self.lock.max_wait;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    let info = serde_json::json!({
                        "holder": Uuid::new_v4(),
                        "acquiredAt": chrono::Utc::now(),
                    });
                    let _ = writeln!(file, "{info}");
                    return Ok(LockGuard { path: lock_path });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(Error::LockTimeout(lock_path));
                    }
                    sleep(self.lock.poll_interval).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
