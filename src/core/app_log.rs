use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

const LOG_FILE_NAME: &str = "app.log.jsonl";
const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
const MAX_ROTATIONS: usize = 3;
const DEFAULT_TAIL_BYTES: u64 = 2 * 1024 * 1024;

static LOG_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppLogRecord {
    pub ts_ms: i64,
    pub level: String,
    pub scope: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AppLogRecord {
    pub fn new(level: Level, scope: &str, message: &str, data: Option<Value>) -> Self {
        Self {
            ts_ms: Utc::now().timestamp_millis(),
            level: level.as_str().to_string(),
            scope: scope.to_string(),
            message: message.to_string(),
            data,
        }
    }
}

/// Directs process-wide records into `dir`. Until called, records go to stderr.
pub fn init(dir: impl Into<PathBuf>) -> Result<(), String> {
    let dir = dir.into();
    fs::create_dir_all(&dir).map_err(|e| format!("Failed to create log dir: {}", e))?;
    *LOG_DIR.lock() = Some(dir);
    Ok(())
}

pub fn configured_dir() -> Option<PathBuf> {
    LOG_DIR.lock().clone()
}

fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}

fn rotated_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("app.log.{}.jsonl", index))
}

fn rotate_if_needed(dir: &Path, max_bytes: u64) -> Result<(), String> {
    let path = log_path(dir);
    let Ok(meta) = fs::metadata(&path) else {
        return Ok(());
    };
    if meta.len() < max_bytes {
        return Ok(());
    }

    let oldest = rotated_path(dir, MAX_ROTATIONS);
    if oldest.exists() {
        fs::remove_file(&oldest)
            .map_err(|e| format!("Failed to remove old log {}: {}", oldest.display(), e))?;
    }

    for i in (1..MAX_ROTATIONS).rev() {
        let src = rotated_path(dir, i);
        let dst = rotated_path(dir, i + 1);
        if src.exists() {
            fs::rename(&src, &dst).map_err(|e| {
                format!(
                    "Failed to rotate log ({} -> {}): {}",
                    src.display(),
                    dst.display(),
                    e
                )
            })?;
        }
    }

    let first = rotated_path(dir, 1);
    fs::rename(&path, &first)
        .map_err(|e| {
            format!(
                "Failed to rotate log ({} -> {}): {}",
                path.display(),
                first.display(),
                e
            )
        })?;
    Ok(())
}

fn append_with_limit(dir: &Path, record: &AppLogRecord, max_bytes: u64) -> Result<(), String> {
    let _guard = LOG_LOCK.lock();
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create log dir: {}", e))?;
    rotate_if_needed(dir, max_bytes)?;
    let path = log_path(dir);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("Failed to open log file: {}", e))?;

    let line = serde_json::to_string(record)
        .map_err(|e| format!("Failed to serialize log record: {}", e))?;
    file.write_all(line.as_bytes())
        .and_then(|_| file.write_all(b"\n"))
        .map_err(|e| format!("Failed to write log record: {}", e))?;
    Ok(())
}

pub fn append_to(dir: &Path, record: &AppLogRecord) -> Result<(), String> {
    append_with_limit(dir, record, MAX_LOG_BYTES)
}

/// Writes to the configured directory, or stderr when none is configured
/// or the file write fails. Never fails.
pub fn append(record: AppLogRecord) {
    let dir = configured_dir();
    let written = match dir.as_deref() {
        Some(dir) => append_to(dir, &record).map_err(|e| eprintln!("{}", e)).is_ok(),
        None => false,
    };
    if !written {
        let data = record.data.as_ref().map(|d| d.to_string()).unwrap_or_default();
        eprintln!("[{}] {}: {} {}", record.level, record.scope, record.message, data);
    }
}

pub fn info(scope: &str, message: &str) {
    append(AppLogRecord::new(Level::Info, scope, message, None));
}

pub fn warn(scope: &str, message: &str, data: Option<Value>) {
    append(AppLogRecord::new(Level::Warn, scope, message, data));
}

pub fn error(scope: &str, message: &str, data: Option<Value>) {
    append(AppLogRecord::new(Level::Error, scope, message, data));
}

/// Logs a swallowed failure together with its context chain.
pub fn failure(scope: &str, message: &str, err: &anyhow::Error) {
    error(scope, message, Some(serde_json::json!({ "error": format!("{:#}", err) })));
}

fn read_tail(path: &Path, max_bytes: u64) -> Result<String, String> {
    let mut file = File::open(path).map_err(|e| format!("Failed to open log file: {}", e))?;
    let size = file
        .metadata()
        .map_err(|e| format!("Failed to read log metadata: {}", e))?
        .len();

    let start = if size > max_bytes { size - max_bytes } else { 0 };
    file.seek(SeekFrom::Start(start))
        .map_err(|e| format!("Failed to seek log file: {}", e))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|e| format!("Failed to read log file: {}", e))?;

    // The seek may land mid-record (or mid-character); skip to the next full line.
    let bytes = if start > 0 {
        match buf.iter().position(|&b| b == b'\n') {
            Some(idx) => &buf[idx + 1..],
            None => &[][..],
        }
    } else {
        &buf[..]
    };

    Ok(String::from_utf8_lossy(bytes).into_owned())
}

pub fn read(
    dir: &Path,
    limit: usize,
    query: Option<String>,
    tail_bytes: Option<u64>,
) -> Result<Vec<AppLogRecord>, String> {
    let _guard = LOG_LOCK.lock();
    let q = query.map(|s| s.to_lowercase()).filter(|s| !s.trim().is_empty());
    let mut records = Vec::new();

    let mut paths: Vec<PathBuf> = (1..=MAX_ROTATIONS).rev().map(|i| rotated_path(dir, i)).collect();
    paths.push(log_path(dir));

    for path in paths {
        if !path.exists() {
            continue;
        }
        let content = read_tail(&path, tail_bytes.unwrap_or(DEFAULT_TAIL_BYTES))?;
        for line in content.lines() {
            let Ok(rec) = serde_json::from_str::<AppLogRecord>(line) else {
                continue;
            };
            if let Some(q) = &q {
                let hay = format!("{} {} {}", rec.level, rec.scope, rec.message).to_lowercase();
                if !hay.contains(q) {
                    continue;
                }
            }
            records.push(rec);
        }
    }

    if records.len() > limit {
        records.drain(0..records.len().saturating_sub(limit));
    }
    Ok(records)
}

pub fn clear(dir: &Path) -> Result<(), String> {
    let _guard = LOG_LOCK.lock();

    let mut paths = vec![log_path(dir)];
    for i in 1..=MAX_ROTATIONS {
        paths.push(rotated_path(dir, i));
    }

    for p in paths {
        if p.exists() {
            fs::remove_file(&p)
                .map_err(|e| format!("Failed to remove log file {}: {}", p.display(), e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: Level, scope: &str, message: &str) -> AppLogRecord {
        AppLogRecord::new(level, scope, message, None)
    }

    #[test]
    fn append_then_read_back_with_query() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_to(dir.path(), &record(Level::Info, "drag", "restored")).expect("append");
        append_to(
            dir.path(),
            &AppLogRecord::new(
                Level::Error,
                "hdr",
                "toggle_failed",
                Some(serde_json::json!({ "error": "ipc closed" })),
            ),
        )
        .expect("append");

        let all = read(dir.path(), 100, None, None).expect("read");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].scope, "drag");
        assert_eq!(all[1].data.as_ref().and_then(|d| d["error"].as_str()), Some("ipc closed"));

        let hdr_only = read(dir.path(), 100, Some("HDR".to_string()), None).expect("read");
        assert_eq!(hdr_only.len(), 1);
        assert_eq!(hdr_only[0].message, "toggle_failed");
    }

    #[test]
    fn limit_keeps_most_recent() {
        let dir = tempfile::tempdir().expect("tempdir");
        for i in 0..5 {
            append_to(dir.path(), &record(Level::Info, "t", &format!("m{}", i))).expect("append");
        }
        let recs = read(dir.path(), 2, None, None).expect("read");
        let msgs: Vec<_> = recs.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(msgs, vec!["m3", "m4"]);
    }

    #[test]
    fn rotation_moves_full_log_aside() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_with_limit(dir.path(), &record(Level::Info, "t", "first"), 1).expect("append");
        append_with_limit(dir.path(), &record(Level::Info, "t", "second"), 1).expect("append");

        assert!(rotated_path(dir.path(), 1).exists());
        let recs = read(dir.path(), 10, None, None).expect("read");
        let msgs: Vec<_> = recs.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(msgs, vec!["first", "second"]);
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_with_limit(dir.path(), &record(Level::Info, "t", "a"), 1).expect("append");
        append_with_limit(dir.path(), &record(Level::Info, "t", "b"), 1).expect("append");
        clear(dir.path()).expect("clear");
        assert!(read(dir.path(), 10, None, None).expect("read").is_empty());
    }

    #[test]
    fn tail_cut_inside_multibyte_text_still_reads() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_to(
            dir.path(),
            &AppLogRecord::new(
                Level::Info,
                "window",
                "saved_position_invalidated",
                Some(serde_json::json!({ "to": "モニター二" })),
            ),
        )
        .expect("append");
        append_to(dir.path(), &record(Level::Info, "drag", "restored")).expect("append");

        let size = fs::metadata(log_path(dir.path())).expect("metadata").len();
        for tail in 1..=size {
            let recs = read(dir.path(), 10, None, Some(tail))
                .unwrap_or_else(|e| panic!("tail {} failed: {}", tail, e));
            assert!(recs.len() <= 2, "tail {} returned {:?}", tail, recs);
        }

        let all = read(dir.path(), 10, None, Some(size)).expect("read");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].data.as_ref().and_then(|d| d["to"].as_str()), Some("モニター二"));
    }
}
