//! SQLite-backed record store for the visa slot watch tracker.
//!
//! The entire collection lives as one serialized JSON array under a
//! single storage key in a key-value table, so every read is "load
//! everything" and every write is "replace everything". Known
//! limitation: concurrent writers racing on the load-mutate-save cycle
//! lose updates (last write wins on the whole blob). Single logical
//! writer only.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use slotwatch_core::{format_rfc3339, now_utc, AlertError, AlertStore, VisaAlert};
use tracing::debug;

const STORE_MIGRATION_VERSION: i64 = 1;

/// Storage key the alert blob is persisted under.
pub const STORAGE_KEY: &str = "alerts.json";

const SCHEMA_ALERTS_V1: &str = r"
CREATE TABLE IF NOT EXISTS alert_blobs (
  storage_key TEXT PRIMARY KEY,
  payload TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
";

pub struct SqliteAlertStore {
    conn: Connection,
}

impl SqliteAlertStore {
    /// Opens (or creates) the database file and configures pragmas.
    ///
    /// # Errors
    /// Returns [`AlertError::StorageRead`] when the database cannot be
    /// opened or configured.
    pub fn open(path: &Path) -> Result<Self, AlertError> {
        let conn = Connection::open(path).map_err(|err| {
            AlertError::StorageRead(format!(
                "failed to open sqlite database at {}: {err}",
                path.display()
            ))
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|err| {
            AlertError::StorageRead(format!("failed to configure sqlite pragmas: {err}"))
        })?;

        Ok(Self { conn })
    }

    /// Applies the key-value schema and records the migration.
    ///
    /// The blob itself stays unversioned; only the container schema is
    /// tracked through `schema_migrations`.
    ///
    /// # Errors
    /// Returns [`AlertError::StorageWrite`] when schema creation fails.
    pub fn migrate(&self) -> Result<(), AlertError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TEXT NOT NULL
                );",
            )
            .map_err(|err| {
                AlertError::StorageWrite(format!("failed to ensure schema_migrations exists: {err}"))
            })?;

        self.conn.execute_batch(SCHEMA_ALERTS_V1).map_err(|err| {
            AlertError::StorageWrite(format!("failed to apply alert schema: {err}"))
        })?;

        let now = format_rfc3339(now_utc())
            .map_err(|err| AlertError::StorageWrite(err.to_string()))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
                params![STORE_MIGRATION_VERSION, now],
            )
            .map_err(|err| {
                AlertError::StorageWrite(format!("failed to register schema migration: {err}"))
            })?;

        Ok(())
    }
}

impl AlertStore for SqliteAlertStore {
    fn load(&self) -> Result<Vec<VisaAlert>, AlertError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM alert_blobs WHERE storage_key = ?1",
                params![STORAGE_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| {
                AlertError::StorageRead(format!("failed to read alert blob: {err}"))
            })?;

        let Some(raw) = payload else {
            return Ok(Vec::new());
        };

        let alerts: Vec<VisaAlert> = serde_json::from_str(&raw).map_err(|err| {
            AlertError::StorageCorrupt(format!("alert blob is not well-formed JSON: {err}"))
        })?;
        debug!(alerts = alerts.len(), "loaded alert blob");
        Ok(alerts)
    }

    fn save(&mut self, alerts: &[VisaAlert]) -> Result<(), AlertError> {
        let payload = serde_json::to_string(alerts).map_err(|err| {
            AlertError::StorageWrite(format!("failed to serialize alert blob: {err}"))
        })?;
        let now = format_rfc3339(now_utc())
            .map_err(|err| AlertError::StorageWrite(err.to_string()))?;

        let tx = self.conn.transaction().map_err(|err| {
            AlertError::StorageWrite(format!("failed to start blob transaction: {err}"))
        })?;
        tx.execute(
            "INSERT INTO alert_blobs(storage_key, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(storage_key) DO UPDATE SET
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            params![STORAGE_KEY, payload, now],
        )
        .map_err(|err| {
            AlertError::StorageWrite(format!("failed to replace alert blob: {err}"))
        })?;
        tx.commit().map_err(|err| {
            AlertError::StorageWrite(format!("failed to commit blob transaction: {err}"))
        })?;

        debug!(alerts = alerts.len(), "replaced alert blob");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotwatch_core::{parse_rfc3339_utc, AlertStatus, VisaType};
    use std::fs;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn temp_db_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("slotwatch-{label}-{}.sqlite3", Ulid::new()))
    }

    fn open_migrated(path: &Path) -> SqliteAlertStore {
        let store = must_ok(SqliteAlertStore::open(path));
        must_ok(store.migrate());
        store
    }

    fn fixture_alert(id: &str, country: &str, created_at: &str) -> VisaAlert {
        VisaAlert {
            id: id.to_string(),
            country: country.to_string(),
            city: "Lisbon".to_string(),
            visa_type: VisaType::Business,
            status: AlertStatus::Active,
            created_at: must_ok(parse_rfc3339_utc(created_at)),
        }
    }

    #[test]
    fn load_on_fresh_database_is_empty() {
        let path = temp_db_path("fresh");
        let store = open_migrated(&path);
        assert!(must_ok(store.load()).is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn save_then_load_round_trips_every_field() {
        let path = temp_db_path("roundtrip");
        let mut store = open_migrated(&path);

        let alerts = vec![
            fixture_alert("visa-1", "France", "2026-03-01T10:00:00Z"),
            fixture_alert("visa-2", "Germany", "2026-03-01T11:00:00Z"),
        ];
        must_ok(store.save(&alerts));
        assert_eq!(must_ok(store.load()), alerts);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn save_replaces_the_whole_collection() {
        let path = temp_db_path("replace");
        let mut store = open_migrated(&path);

        must_ok(store.save(&[
            fixture_alert("visa-1", "France", "2026-03-01T10:00:00Z"),
            fixture_alert("visa-2", "Germany", "2026-03-01T11:00:00Z"),
        ]));
        let reduced = vec![fixture_alert("visa-2", "Germany", "2026-03-01T11:00:00Z")];
        must_ok(store.save(&reduced));

        assert_eq!(must_ok(store.load()), reduced);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn persisted_blob_survives_reopening() {
        let path = temp_db_path("reopen");
        let alerts = vec![fixture_alert("visa-1", "France", "2026-03-01T10:00:00Z")];
        {
            let mut store = open_migrated(&path);
            must_ok(store.save(&alerts));
        }

        let store = open_migrated(&path);
        assert_eq!(must_ok(store.load()), alerts);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn malformed_blob_surfaces_storage_corrupt() {
        let path = temp_db_path("corrupt");
        let store = open_migrated(&path);

        must_ok(store.conn.execute(
            "INSERT INTO alert_blobs(storage_key, payload, updated_at)
             VALUES (?1, 'not json', '2026-03-01T10:00:00Z')",
            params![STORAGE_KEY],
        ));

        let err = match store.load() {
            Ok(_) => panic!("expected StorageCorrupt, got Ok"),
            Err(err) => err,
        };
        assert!(matches!(err, AlertError::StorageCorrupt(_)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_schema_surfaces_storage_read() {
        let path = temp_db_path("noschema");
        let store = must_ok(SqliteAlertStore::open(&path));

        let err = match store.load() {
            Ok(_) => panic!("expected StorageRead, got Ok"),
            Err(err) => err,
        };
        assert!(matches!(err, AlertError::StorageRead(_)));
        let _ = fs::remove_file(&path);
    }
}
