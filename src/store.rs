//! Persistence contract and reference backends.
//!
//! The core consumes persistence through `VoiceprintStore`; deployments
//! supply their own backend. Two reference implementations ship here: an
//! in-memory map and a profile-directory store writing one JSON envelope
//! per user. Replacement goes through a temp file and rename so a
//! re-enrollment is observed either entirely old or entirely new.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// File extension used by the profile-directory store.
const RECORD_EXT: &str = "voiceprint";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no record for user")]
    NotFound,

    #[error("record already exists for user")]
    Conflict,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Encrypted voiceprint envelope as persisted. Self-describing and stable
/// across process versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceprintRecord {
    pub user_id: String,
    pub schema_version: String,
    /// Per-record salt, 32 hex characters.
    pub salt: String,
    /// Authenticated token holding the encrypted voiceprint payload.
    pub ciphertext: String,
    /// SHA-256 feature digest, 64 hex characters.
    pub integrity_hash: String,
    pub quality_score: f64,
    pub enrollment_duration_s: f64,
    /// RFC-3339 UTC.
    pub created_at: String,
}

/// Storage contract the engine operates against.
pub trait VoiceprintStore: Send + Sync {
    fn load_record(&self, user_id: &str) -> Result<VoiceprintRecord, StoreError>;
    fn store_record(&self, record: &VoiceprintRecord) -> Result<(), StoreError>;
    fn replace_record(&self, record: &VoiceprintRecord) -> Result<(), StoreError>;
    fn delete_record(&self, user_id: &str) -> Result<(), StoreError>;
}

/// Validate a user id before it is used as a file name component:
/// 1-64 characters from [A-Za-z0-9._-], no traversal possible.
pub fn validate_user_id(user_id: &str) -> Result<(), StoreError> {
    if user_id.is_empty() {
        return Err(StoreError::Backend("user id cannot be empty".into()));
    }
    if user_id.len() > 64 {
        return Err(StoreError::Backend(format!(
            "user id too long: {} characters (max 64)",
            user_id.len()
        )));
    }
    if !user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(StoreError::Backend(
            "user id may only contain letters, digits, '.', '_' and '-'".into(),
        ));
    }
    if user_id.chars().all(|c| c == '.') {
        return Err(StoreError::Backend("user id cannot be dots only".into()));
    }
    Ok(())
}

/// Mutexed map. One record per user id.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, VoiceprintRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoiceprintStore for MemoryStore {
    fn load_record(&self, user_id: &str) -> Result<VoiceprintRecord, StoreError> {
        let records = self.records.lock().unwrap();
        records.get(user_id).cloned().ok_or(StoreError::NotFound)
    }

    fn store_record(&self, record: &VoiceprintRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.user_id) {
            return Err(StoreError::Conflict);
        }
        records.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    fn replace_record(&self, record: &VoiceprintRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&record.user_id) {
            return Err(StoreError::NotFound);
        }
        records.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    fn delete_record(&self, user_id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        records.remove(user_id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

/// One `<user>.voiceprint` JSON file per record under a profile directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a profile directory.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::Backend(format!("create profile directory: {e}")))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn record_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", user_id, RECORD_EXT))
    }

    fn write_record(&self, record: &VoiceprintRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Backend(format!("serialize record: {e}")))?;
        let final_path = self.record_path(&record.user_id);
        let tmp_path = self.dir.join(format!(
            "{}.{}.tmp",
            record.user_id, RECORD_EXT
        ));
        fs::write(&tmp_path, json)
            .map_err(|e| StoreError::Backend(format!("write record: {e}")))?;
        fs::rename(&tmp_path, &final_path)
            .map_err(|e| StoreError::Backend(format!("commit record: {e}")))?;
        Ok(())
    }

    /// Enumerate enrolled user ids.
    pub fn list_users(&self) -> Result<Vec<String>, StoreError> {
        let mut users = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StoreError::Backend(format!("read profile directory: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some(RECORD_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    users.push(stem.to_string());
                }
            }
        }
        users.sort();
        Ok(users)
    }
}

impl VoiceprintStore for FileStore {
    fn load_record(&self, user_id: &str) -> Result<VoiceprintRecord, StoreError> {
        validate_user_id(user_id)?;
        let path = self.record_path(user_id);
        if !path.exists() {
            return Err(StoreError::NotFound);
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| StoreError::Backend(format!("read record: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| StoreError::Backend(format!("parse record: {e}")))
    }

    fn store_record(&self, record: &VoiceprintRecord) -> Result<(), StoreError> {
        validate_user_id(&record.user_id)?;
        if self.record_path(&record.user_id).exists() {
            return Err(StoreError::Conflict);
        }
        self.write_record(record)
    }

    fn replace_record(&self, record: &VoiceprintRecord) -> Result<(), StoreError> {
        validate_user_id(&record.user_id)?;
        if !self.record_path(&record.user_id).exists() {
            return Err(StoreError::NotFound);
        }
        self.write_record(record)
    }

    fn delete_record(&self, user_id: &str) -> Result<(), StoreError> {
        validate_user_id(user_id)?;
        let path = self.record_path(user_id);
        if !path.exists() {
            return Err(StoreError::NotFound);
        }
        fs::remove_file(&path).map_err(|e| StoreError::Backend(format!("delete record: {e}")))
    }
}
