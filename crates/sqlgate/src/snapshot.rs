//! Versioned, offline capture of a schema registry.
//!
//! A snapshot lets statements be validated without a database connection.
//! It is plain JSON:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "generated_at": "2026-01-01T00:00:00Z",
//!   "tables": [ { "name": "users", "columns": [...], "constraints": [...] } ]
//! }
//! ```

use crate::error::{GateResult, SchemaError};
use crate::schema::{SchemaBuilder, SchemaRegistry, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format version written by this build.
pub const FORMAT_VERSION: u64 = 1;

/// Format versions this build can read.
pub const SUPPORTED_FORMAT_VERSIONS: &[u64] = &[1];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub format_version: u64,
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<Table>,
}

/// Only the version field, read before anything else so documents from a
/// newer format are rejected even if the rest would not parse.
#[derive(Deserialize)]
struct VersionProbe {
    format_version: u64,
}

impl SchemaSnapshot {
    /// Capture a registry. Tables are ordered by name and the registry's own
    /// generation time is used, so the same registry always serializes to the
    /// same bytes.
    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            generated_at: registry.generated_at(),
            tables: registry.tables().cloned().collect(),
        }
    }

    /// Parse and check a snapshot document.
    pub fn load(bytes: &[u8]) -> Result<Self, SchemaError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| SchemaError::MalformedSnapshot(e.to_string()))?;
        if !SUPPORTED_FORMAT_VERSIONS.contains(&probe.format_version) {
            return Err(SchemaError::SnapshotVersionMismatch {
                found: probe.format_version,
                supported: SUPPORTED_FORMAT_VERSIONS.to_vec(),
            });
        }

        let snapshot: SchemaSnapshot = serde_json::from_slice(bytes)
            .map_err(|e| SchemaError::MalformedSnapshot(e.to_string()))?;
        // surface registration errors now rather than on first use
        snapshot.to_registry()?;
        Ok(snapshot)
    }

    /// Rebuild the registry this snapshot was taken from.
    pub fn to_registry(&self) -> Result<SchemaRegistry, SchemaError> {
        let mut builder = SchemaBuilder::new();
        for table in &self.tables {
            builder.register(table.clone())?;
        }
        builder.freeze_at(self.generated_at)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SchemaError> {
        serde_json::to_string_pretty(self).map_err(|e| SchemaError::MalformedSnapshot(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SchemaError> {
        serde_json::to_vec_pretty(self).map_err(|e| SchemaError::MalformedSnapshot(e.to_string()))
    }

    /// Read and check a snapshot file.
    pub fn read_from(path: impl AsRef<Path>) -> GateResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let snapshot = Self::load(&data)?;
        tracing::info!(
            target: "sqlgate.schema",
            path = %path.display(),
            tables = snapshot.tables.len(),
            "loaded schema snapshot"
        );
        Ok(snapshot)
    }

    /// Write the snapshot atomically (temp file, then rename).
    pub fn write_to(&self, path: impl AsRef<Path>) -> GateResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let data = self.to_bytes()?;
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, path)?;

        tracing::debug!(
            target: "sqlgate.schema",
            path = %path.display(),
            "wrote schema snapshot"
        );
        Ok(())
    }
}
