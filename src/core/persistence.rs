use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::app_log;
use crate::models::{LogicalPosition, StorageKeys};

const CURRENT_STATE_VERSION: u32 = 2;
const SAVE_DEBOUNCE: Duration = Duration::from_millis(650);
const SAVE_QUIET_GAP: Duration = Duration::from_millis(80);

/// Local string key/value persistence (the webview's `localStorage`).
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Reads a float; a malformed value is logged and treated as missing.
pub fn get_f64(store: &dyn KeyValueStore, key: &str) -> Option<f64> {
    let raw = store.get(key)?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            app_log::warn(
                "storage",
                "malformed_number",
                Some(serde_json::json!({ "key": key, "value": raw })),
            );
            None
        }
    }
}

pub fn set_f64(store: &dyn KeyValueStore, key: &str, value: f64) {
    store.set(key, &value.to_string());
}

/// Reads a boolean stored as `"true"`/`"false"`, falling back to `default`.
pub fn get_bool(store: &dyn KeyValueStore, key: &str, default: bool) -> bool {
    let Some(raw) = store.get(key) else {
        return default;
    };
    match raw.trim() {
        "true" => true,
        "false" => false,
        _ => {
            app_log::warn(
                "storage",
                "malformed_bool",
                Some(serde_json::json!({ "key": key, "value": raw })),
            );
            default
        }
    }
}

pub fn set_bool(store: &dyn KeyValueStore, key: &str, value: bool) {
    store.set(key, if value { "true" } else { "false" });
}

/// Last saved widget position; both coordinates must be present and valid.
pub fn load_position(store: &dyn KeyValueStore, keys: &StorageKeys) -> Option<LogicalPosition> {
    let x = get_f64(store, &keys.widget_x)?;
    let y = get_f64(store, &keys.widget_y)?;
    Some(LogicalPosition::new(x, y))
}

pub fn save_position(store: &dyn KeyValueStore, keys: &StorageKeys, position: LogicalPosition) {
    set_f64(store, &keys.widget_x, position.x);
    set_f64(store, &keys.widget_y, position.y);
}

pub fn clear_position(store: &dyn KeyValueStore, keys: &StorageKeys) {
    store.remove(&keys.widget_x);
    store.remove(&keys.widget_y);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

fn default_state_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    #[serde(default = "default_state_version")]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Key/value store backed by one JSON document. Writes are coalesced on a
/// background thread; `flush` writes synchronously.
pub struct JsonFileStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
    write_lock: Arc<Mutex<()>>,
    path: PathBuf,
    save_tx: Mutex<Option<Sender<()>>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = load(&path)
            .with_context(|| format!("Failed to load store {}", path.display()))?
            .unwrap_or_default();
        let entries = Arc::new(RwLock::new(entries));
        let write_lock = Arc::new(Mutex::new(()));

        let (tx, rx) = mpsc::channel::<()>();
        let thread_entries = Arc::clone(&entries);
        let thread_lock = Arc::clone(&write_lock);
        let thread_path = path.clone();
        std::thread::spawn(move || loop {
            if rx.recv().is_err() {
                break;
            }

            // debounce: a drag persists on every move, write once it settles
            let start = Instant::now();
            while start.elapsed() < SAVE_DEBOUNCE {
                match rx.recv_timeout(SAVE_QUIET_GAP) {
                    Ok(()) => continue,
                    Err(mpsc::RecvTimeoutError::Timeout) => break,
                    // store dropped; its final flush covers this write
                    Err(mpsc::RecvTimeoutError::Disconnected) => return,
                }
            }

            if let Err(e) = write_snapshot(&thread_entries, &thread_lock, &thread_path) {
                app_log::error(
                    "storage",
                    "persist_failed",
                    Some(serde_json::json!({
                        "error": e.to_string(),
                        "path": thread_path.display().to_string()
                    })),
                );
            }
        });

        Ok(Self {
            entries,
            write_lock,
            path,
            save_tx: Mutex::new(Some(tx)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> Result<()> {
        write_snapshot(&self.entries, &self.write_lock, &self.path)
            .with_context(|| format!("Failed to write store {}", self.path.display()))
    }

    fn request_save(&self) {
        if let Some(tx) = self.save_tx.lock().as_ref() {
            let _ = tx.send(());
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
        self.request_save();
    }

    fn remove(&self, key: &str) {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            self.request_save();
        }
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        // Stop the writer thread, then make sure the last state reaches disk.
        self.save_tx.lock().take();
        if let Err(e) = self.flush() {
            app_log::failure("storage", "final_flush_failed", &e);
        }
    }
}

fn load(path: &Path) -> io::Result<Option<BTreeMap<String, String>>> {
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    let mut state: PersistedState =
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    // Best-effort upgrade; a failed rewrite must not block startup.
    if state.version < CURRENT_STATE_VERSION {
        state.version = CURRENT_STATE_VERSION;
        let _ = write_state_atomically(path, &state);
    }

    Ok(Some(state.entries))
}

fn write_state_atomically(path: &Path, state: &PersistedState) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp)?;
    serde_json::to_writer(&mut file, state).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    file.write_all(b"\n")?;
    file.sync_all()?;

    let _ = fs::remove_file(path);
    fs::rename(tmp, path)?;
    Ok(())
}

fn write_snapshot(
    entries: &Arc<RwLock<BTreeMap<String, String>>>,
    write_lock: &Mutex<()>,
    path: &Path,
) -> io::Result<()> {
    // The writer thread and `flush` share the tmp file.
    let _guard = write_lock.lock();
    let state = PersistedState {
        version: CURRENT_STATE_VERSION,
        entries: entries.read().clone(),
    };
    write_state_atomically(path, &state)
}
