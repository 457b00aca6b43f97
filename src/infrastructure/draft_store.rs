//! File-based local draft store.
//!
//! Persists three concerns under one base directory: the flat per-field
//! draft arena (`fields.json`), the cached progress record
//! (`progress.json`), and the cached invitation payload
//! (`invitation.json`). All I/O is synchronous; the store is the
//! crash/reload recovery layer, not a database.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{FieldValue, InvitationData, OnboardingProgress};
use crate::error::Result;

pub const FIELDS_FILE: &str = "fields.json";
pub const PROGRESS_FILE: &str = "progress.json";
pub const INVITATION_FILE: &str = "invitation.json";

pub struct LocalDraftStore {
    base_dir: PathBuf,
    field_prefix: String,
}

impl LocalDraftStore {
    pub fn new(base_dir: impl Into<PathBuf>, field_prefix: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            field_prefix: field_prefix.into(),
        }
    }

    fn ensure_base_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }

    fn path(&self, file: &str) -> PathBuf {
        self.base_dir.join(file)
    }

    // ========== Per-field draft arena ==========

    /// Write one field value, keyed as `{prefix}{name}`.
    ///
    /// Values are stored as JSON text (booleans land as literal
    /// "true"/"false"); if serialization fails the raw string
    /// representation is stored instead of failing the update.
    pub fn set_field(&self, name: &str, value: &FieldValue) -> Result<()> {
        let serialized = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(e) => {
                warn!("Falling back to raw string for field '{}': {}", name, e);
                value.to_string()
            }
        };
        let mut map = self.read_field_map();
        map.insert(format!("{}{}", self.field_prefix, name), serialized);
        self.write_json(FIELDS_FILE, &map)
    }

    pub fn get_field(&self, name: &str) -> Option<FieldValue> {
        let map = self.read_field_map();
        let raw = map.get(&format!("{}{}", self.field_prefix, name))?;
        Some(Self::parse_value(raw))
    }

    /// All cached fields, prefix stripped and values deserialized.
    pub fn fields(&self) -> BTreeMap<String, FieldValue> {
        self.read_field_map()
            .into_iter()
            .filter_map(|(key, raw)| {
                let name = key.strip_prefix(&self.field_prefix)?.to_string();
                Some((name, Self::parse_value(&raw)))
            })
            .collect()
    }

    /// Replace the whole field arena with the given step data.
    ///
    /// Used when reconciliation adopts a newer remote record; stale
    /// first-device drafts are superseded wholesale.
    pub fn replace_fields(&self, step_data: &BTreeMap<String, FieldValue>) -> Result<()> {
        let mut map = BTreeMap::new();
        for (name, value) in step_data {
            let serialized =
                serde_json::to_string(value).unwrap_or_else(|_| value.to_string());
            map.insert(format!("{}{}", self.field_prefix, name), serialized);
        }
        self.write_json(FIELDS_FILE, &map)
    }

    fn parse_value(raw: &str) -> FieldValue {
        // Stored values are JSON text; anything unparseable is a legacy
        // raw string and kept as-is.
        serde_json::from_str(raw).unwrap_or_else(|_| FieldValue::from(raw))
    }

    fn read_field_map(&self) -> BTreeMap<String, String> {
        self.read_json(FIELDS_FILE).unwrap_or_default()
    }

    // ========== Cached progress record ==========

    pub fn save_progress(&self, progress: &OnboardingProgress) -> Result<()> {
        self.write_json(PROGRESS_FILE, progress)
    }

    pub fn load_progress(&self) -> Option<OnboardingProgress> {
        self.read_json(PROGRESS_FILE)
    }

    // ========== Cached invitation payload ==========

    pub fn save_invitation(&self, invitation: &InvitationData) -> Result<()> {
        self.write_json(INVITATION_FILE, invitation)
    }

    pub fn load_invitation(&self) -> Option<InvitationData> {
        self.read_json(INVITATION_FILE)
    }

    // ========== JSON file helpers ==========

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        self.ensure_base_dir()?;
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.path(file), json)?;
        Ok(())
    }

    /// Read and parse a JSON file. A missing, empty, or corrupt file
    /// degrades to None with a warning; the caller proceeds without the
    /// cached value.
    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.path(file);
        if !path.exists() {
            return None;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };
        if content.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
                None
            }
        }
    }
}
