use rusqlite::{Connection, OpenFlags, Transaction};
use std::path::Path;
use tracing::{debug, info};

use super::schema_gen::{generate_create_table, generate_indexes};
use crate::error::StoreError;
use crate::schema::DependencyResolver;

/// The relational store the pipeline writes into
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `db_path`. Existing data is kept so
    /// re-runs stay idempotent.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;

        // WAL only applies to file-backed databases
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;

        Self::configure(conn)
    }

    /// Open an existing database for inspection only; nothing is created or
    /// migrated
    pub fn open_read_only(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Create every table and index that does not exist yet, parents first
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let tables = DependencyResolver::new()
            .all_tables_ordered()
            .map_err(StoreError::Schema)?;

        debug!(tables = tables.len(), "ensuring schema");

        for schema in tables {
            self.conn.execute(&generate_create_table(schema), [])?;

            for index_sql in generate_indexes(schema) {
                self.conn.execute(&index_sql, [])?;
            }
        }

        Ok(())
    }

    /// Begin the transaction one pipeline stage writes through
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self.conn.transaction()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn row_count(&self, table: &str) -> Result<u64, StoreError> {
        row_count(&self.conn, table)
    }

    /// Finalize the database after a run
    pub fn finalize(self) -> Result<(), StoreError> {
        info!("optimizing database");
        self.conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}

pub fn row_count(conn: &Connection, table: &str) -> Result<u64, StoreError> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ALL_TABLES;

    #[test]
    fn test_ensure_schema_is_repeatable() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();

        for table in ALL_TABLES {
            assert_eq!(store.row_count(table.name).unwrap(), 0);
        }
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_schema().unwrap();

        let result = store.connection().execute(
            "INSERT INTO stages (stage_code, zone_id, display_code, ap_cost) VALUES ('main_00-01', 42, '0-1', 6)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_file_database_keeps_rows_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gamedata.db");

        {
            let store = Store::open(&path).unwrap();
            store.ensure_schema().unwrap();
            store
                .connection()
                .execute("INSERT INTO tags (tag_name) VALUES ('Healing')", [])
                .unwrap();
        }

        let store = Store::open(&path).unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.row_count("tags").unwrap(), 1);
    }

    #[test]
    fn test_read_only_store_reports_missing_tables_without_creating_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gamedata.db");
        Store::open(&path)
            .unwrap()
            .connection()
            .execute_batch("CREATE TABLE tags (tag_id INTEGER PRIMARY KEY, tag_name TEXT);")
            .unwrap();

        let store = Store::open_read_only(&path).unwrap();
        let report = crate::validate::validate(store.connection()).unwrap();

        assert!(!report.passed());
        assert!(report
            .find(crate::validate::CheckKind::MissingTable, "characters", "*")
            .is_some());
        assert!(store.ensure_schema().is_err());
        assert!(store.row_count("characters").is_err());
    }
}
