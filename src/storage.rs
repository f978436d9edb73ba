//! Persisted client session: the upload draft and the last job id.
//!
//! Both live in one small JSON object keyed the way earlier clients keyed
//! them, stored in `session.json` under the platform data directory. Writes
//! go to a temp file in the same directory and are renamed over the old file
//! so a crash never leaves half a session behind.
//!
//! Persistence is best effort. A failed save logs a warning and the session
//! simply is not restored next time; it never fails the operation that
//! triggered it.

use crate::error::DiffClientError;
use crate::model::UploadedFile;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

pub const UPLOAD_STATE_KEY: &str = "pdf-comparison:upload-state";
pub const LAST_JOB_ID_KEY: &str = "pdf-comparison:last-job-id";

const SESSION_FILE: &str = "session.json";
const APP_DIR: &str = "edgequake-pdfdiff";

/// Upload drafts older than this are discarded on load.
pub fn draft_ttl() -> Duration {
    Duration::hours(24)
}

/// Names and sizes of the last selection. File handles are not persisted,
/// so a restored draft tells the user what to reselect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDraft {
    pub file_names: Vec<String>,
    pub file_sizes: Vec<u64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl UploadDraft {
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// JSON-file key/value store for the client session.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl SessionStore {
    /// Open the store in `dir`, or in the platform data directory when `None`.
    pub fn open(dir: Option<&Path>) -> Result<Self, DiffClientError> {
        let dir = match dir {
            Some(d) => d.to_path_buf(),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .ok_or_else(|| {
                    DiffClientError::InvalidConfig(
                        "no platform data directory; pass a storage directory".into(),
                    )
                })?,
        };
        Ok(Self::at(dir.join(SESSION_FILE)))
    }

    /// Use an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Upload draft ─────────────────────────────────────────────────────

    pub fn save_upload_draft(&self, files: &[UploadedFile]) {
        self.save_upload_draft_at(files, Utc::now());
    }

    pub fn save_upload_draft_at(&self, files: &[UploadedFile], now: DateTime<Utc>) {
        let draft = UploadDraft {
            file_names: files.iter().map(|f| f.name.clone()).collect(),
            file_sizes: files.iter().map(|f| f.size).collect(),
            timestamp: now.timestamp_millis(),
        };
        match serde_json::to_value(&draft) {
            Ok(value) => self.set(UPLOAD_STATE_KEY, Some(value)),
            Err(e) => warn!("Failed to encode upload draft: {}", e),
        }
    }

    pub fn load_upload_draft(&self) -> Option<UploadDraft> {
        self.load_upload_draft_at(Utc::now())
    }

    /// Load the draft as of `now`; an expired draft is removed and `None`
    /// returned. A draft stamped in the future counts as expired.
    pub fn load_upload_draft_at(&self, now: DateTime<Utc>) -> Option<UploadDraft> {
        let value = self.get(UPLOAD_STATE_KEY)?;
        let draft: UploadDraft = match serde_json::from_value(value) {
            Ok(d) => d,
            Err(e) => {
                warn!("Discarding unreadable upload draft: {}", e);
                self.set(UPLOAD_STATE_KEY, None);
                return None;
            }
        };
        let age = now.timestamp_millis() - draft.timestamp;
        if age < 0 || age > draft_ttl().num_milliseconds() {
            debug!("Upload draft expired ({} ms old)", age);
            self.set(UPLOAD_STATE_KEY, None);
            return None;
        }
        Some(draft)
    }

    pub fn clear_upload_draft(&self) {
        self.set(UPLOAD_STATE_KEY, None);
    }

    // ── Last job id ──────────────────────────────────────────────────────

    pub fn save_last_job_id(&self, job_id: &str) {
        self.set(LAST_JOB_ID_KEY, Some(Value::String(job_id.to_string())));
    }

    pub fn last_job_id(&self) -> Option<String> {
        match self.get(LAST_JOB_ID_KEY)? {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn clear_last_job_id(&self) {
        self.set(LAST_JOB_ID_KEY, None);
    }

    // ── Raw access ───────────────────────────────────────────────────────

    fn get(&self, key: &str) -> Option<Value> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        self.read_map().remove(key)
    }

    fn set(&self, key: &str, value: Option<Value>) {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut map = self.read_map();
        match value {
            Some(v) => {
                map.insert(key.to_string(), v);
            }
            None => {
                if map.remove(key).is_none() {
                    return;
                }
            }
        }
        if let Err(e) = self.write_map(&map) {
            warn!("Failed to save session state: {}", e);
        }
    }

    fn read_map(&self) -> Map<String, Value> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return Map::new();
            }
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("Ignoring malformed session file {}", self.path.display());
                Map::new()
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), DiffClientError> {
        let write_err = |source| DiffClientError::OutputWriteFailed {
            path: self.path.clone(),
            source,
        };
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(write_err)?;

        let json = serde_json::to_vec_pretty(map)
            .map_err(|e| DiffClientError::Internal(format!("session encode: {e}")))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
