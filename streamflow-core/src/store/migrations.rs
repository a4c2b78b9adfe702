use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::sqlite::format_timestamp;

use super::error::{StoreError, StoreResult};

/// When a migration step has work left to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// Idempotent script (`IF NOT EXISTS` statements).
    Always,
    ColumnMissing {
        table: &'static str,
        column: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub applicability: Applicability,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "videos, streams and stream_history tables",
        applicability: Applicability::Always,
        sql: include_str!("../../../sql/001_core.sql"),
    },
    Migration {
        version: 2,
        description: "stream_history.stream_key",
        applicability: Applicability::ColumnMissing {
            table: "stream_history",
            column: "stream_key",
        },
        sql: "ALTER TABLE stream_history ADD COLUMN stream_key TEXT",
    },
    Migration {
        version: 3,
        description: "stream_history.rtmp_url",
        applicability: Applicability::ColumnMissing {
            table: "stream_history",
            column: "rtmp_url",
        },
        sql: "ALTER TABLE stream_history ADD COLUMN rtmp_url TEXT",
    },
    Migration {
        version: 4,
        description: "schedule, owner and history indexes",
        applicability: Applicability::Always,
        sql: include_str!("../../../sql/004_indexes.sql"),
    },
];

const LEDGER_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Applies every pending migration in order; returns the versions that ran.
pub fn apply_migrations(conn: &mut Connection, migrations: &[Migration]) -> StoreResult<Vec<u32>> {
    conn.execute_batch(LEDGER_SCHEMA)?;
    let mut applied = Vec::new();
    for migration in migrations {
        if is_recorded(conn, migration.version)? {
            continue;
        }
        let tx = conn.transaction()?;
        let needed = match migration.applicability {
            Applicability::Always => true,
            Applicability::ColumnMissing { table, column } => !column_exists(&tx, table, column)?,
        };
        if needed {
            tx.execute_batch(migration.sql)
                .map_err(|source| StoreError::Migration {
                    version: migration.version,
                    source,
                })?;
            info!(
                version = migration.version,
                description = migration.description,
                "applied schema migration"
            );
        } else {
            debug!(
                version = migration.version,
                "schema already satisfies migration, recording only"
            );
        }
        tx.execute(
            "INSERT INTO schema_migrations(version, description, applied_at) VALUES (?1, ?2, ?3)",
            params![
                migration.version,
                migration.description,
                format_timestamp(&chrono::Utc::now())
            ],
        )?;
        tx.commit()?;
        applied.push(migration.version);
    }
    Ok(applied)
}

pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.execute_batch(LEDGER_SCHEMA)?;
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

fn is_recorded(conn: &Connection, version: u32) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM schema_migrations WHERE version = ?1",
            [version],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_runs_every_step_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&mut conn, MIGRATIONS).unwrap();
        assert_eq!(applied, vec![1, 2, 3, 4]);
        assert_eq!(current_version(&conn).unwrap(), 4);
        assert!(column_exists(&conn, "stream_history", "stream_key").unwrap());
        assert!(column_exists(&conn, "stream_history", "rtmp_url").unwrap());

        let again = apply_migrations(&mut conn, MIGRATIONS).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn existing_column_is_recorded_without_altering() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).unwrap();
        conn.execute_batch("ALTER TABLE stream_history ADD COLUMN stream_key TEXT")
            .unwrap();

        let applied = apply_migrations(&mut conn, MIGRATIONS).unwrap();
        assert_eq!(applied, vec![1, 2, 3, 4]);
        let recorded: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(recorded, 4);
    }
}
