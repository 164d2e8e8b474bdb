//! Where the schema used for validation comes from.

use crate::error::GateResult;
use crate::schema::SchemaRegistry;
use crate::snapshot::SchemaSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

/// Schema source selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSourceKind {
    /// Validate against a snapshot file; no connection needed.
    Snapshot,
    /// Validate against the live database catalog.
    #[default]
    Database,
}

impl fmt::Display for SchemaSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Snapshot => "snapshot",
            Self::Database => "database",
        })
    }
}

impl FromStr for SchemaSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Ok(Self::Snapshot),
            "database" | "live" => Ok(Self::Database),
            other => Err(format!(
                "unknown schema source '{other}' (expected 'snapshot' or 'database')"
            )),
        }
    }
}

/// Atomically swappable pointer to the published registry.
///
/// Readers get an `Arc` to a complete registry, either the old or the new
/// one, never a mix.
#[derive(Debug, Clone)]
pub struct SharedSchema {
    current: Arc<RwLock<Arc<SchemaRegistry>>>,
}

impl SharedSchema {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Currently published registry.
    pub fn load(&self) -> Arc<SchemaRegistry> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publish a new registry, returning the previous one.
    pub fn publish(&self, registry: SchemaRegistry) -> Arc<SchemaRegistry> {
        let next = Arc::new(registry);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, next);
        drop(guard);

        tracing::info!(
            target: "sqlgate.schema",
            tables = self.load().len(),
            "published schema registry"
        );
        previous
    }
}

/// A schema source: its kind plus the registry it currently publishes.
#[derive(Debug, Clone)]
pub struct SchemaSource {
    kind: SchemaSourceKind,
    snapshot_path: Option<PathBuf>,
    shared: SharedSchema,
}

impl SchemaSource {
    /// Source backed by a registry read from the live database.
    pub fn database(registry: SchemaRegistry) -> Self {
        Self {
            kind: SchemaSourceKind::Database,
            snapshot_path: None,
            shared: SharedSchema::new(registry),
        }
    }

    /// Source backed by an in-memory snapshot.
    pub fn snapshot(snapshot: &SchemaSnapshot) -> GateResult<Self> {
        Ok(Self {
            kind: SchemaSourceKind::Snapshot,
            snapshot_path: None,
            shared: SharedSchema::new(snapshot.to_registry()?),
        })
    }

    /// Source backed by a snapshot file. The file can be re-read with
    /// [`reload_snapshot`](Self::reload_snapshot).
    pub fn snapshot_file(path: impl AsRef<Path>) -> GateResult<Self> {
        let path = path.as_ref();
        let snapshot = SchemaSnapshot::read_from(path)?;
        Ok(Self {
            kind: SchemaSourceKind::Snapshot,
            snapshot_path: Some(path.to_path_buf()),
            shared: SharedSchema::new(snapshot.to_registry()?),
        })
    }

    pub fn kind(&self) -> SchemaSourceKind {
        self.kind
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Registry to validate against right now.
    pub fn registry(&self) -> Arc<SchemaRegistry> {
        self.shared.load()
    }

    pub fn shared(&self) -> &SharedSchema {
        &self.shared
    }

    /// Publish a new registry (after re-introspection, for example).
    pub fn publish(&self, registry: SchemaRegistry) -> Arc<SchemaRegistry> {
        self.shared.publish(registry)
    }

    /// Re-read the snapshot file and publish it. A no-op returning the
    /// current registry when this source has no file.
    pub fn reload_snapshot(&self) -> GateResult<Arc<SchemaRegistry>> {
        let Some(path) = &self.snapshot_path else {
            return Ok(self.registry());
        };
        let registry = SchemaSnapshot::read_from(path)?.to_registry()?;
        self.publish(registry);
        Ok(self.registry())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, SchemaBuilder, Table};

    fn registry(columns: &[&str]) -> SchemaRegistry {
        let table = columns.iter().fold(Table::new("t"), |t, c| {
            t.column(Column::new(*c, ColumnType::Text))
        });
        SchemaBuilder::new()
            .with_table(table)
            .unwrap()
            .freeze()
            .unwrap()
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(
            "snapshot".parse::<SchemaSourceKind>().unwrap(),
            SchemaSourceKind::Snapshot
        );
        assert_eq!(
            " Database ".parse::<SchemaSourceKind>().unwrap(),
            SchemaSourceKind::Database
        );
        assert!("redis".parse::<SchemaSourceKind>().is_err());
        assert_eq!(SchemaSourceKind::default(), SchemaSourceKind::Database);
    }

    #[test]
    fn test_publish_swaps_whole_registry() {
        let source = SchemaSource::database(registry(&["a"]));
        let before = source.registry();

        let previous = source.publish(registry(&["a", "b"]));
        assert!(Arc::ptr_eq(&before, &previous));

        // old readers keep their registry
        assert!(before.resolve("t", "b").is_err());
        assert!(source.registry().resolve("t", "b").is_ok());
    }

    #[test]
    fn test_clones_share_publication() {
        let source = SchemaSource::database(registry(&["a"]));
        let clone = source.clone();
        source.publish(registry(&["a", "b"]));
        assert!(clone.registry().resolve("t", "b").is_ok());
    }

    #[test]
    fn test_snapshot_source() {
        let snapshot = SchemaSnapshot::from_registry(&registry(&["a"]));
        let source = SchemaSource::snapshot(&snapshot).unwrap();
        assert_eq!(source.kind(), SchemaSourceKind::Snapshot);
        assert!(source.snapshot_path().is_none());
        // nothing to reload from
        assert_eq!(*source.reload_snapshot().unwrap(), registry(&["a"]));
    }
}
