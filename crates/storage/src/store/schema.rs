#![forbid(unsafe_code)]

use super::StoreError;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

pub(crate) const SCHEMA_VERSION: i64 = 1;

const STORE_TABLES: [&str; 5] = ["store_state", "mains", "tools", "tables", "chairs"];

fn user_tables(conn: &Connection) -> Result<BTreeSet<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(names)
}

/// An empty database passes. Anything else must hold exactly the store's
/// tables at the current schema version.
pub(crate) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let present = user_tables(conn)?;
    if present.is_empty() {
        return Ok(());
    }

    let expected = STORE_TABLES
        .iter()
        .map(|name| name.to_string())
        .collect::<BTreeSet<_>>();
    if present != expected {
        return Err(StoreError::ResetRequired(if present.is_subset(&expected) {
            "RESET_REQUIRED: store tables are missing"
        } else {
            "RESET_REQUIRED: unsupported tables detected"
        }));
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    match version {
        Some(SCHEMA_VERSION) => Ok(()),
        Some(_) => Err(StoreError::ResetRequired(
            "RESET_REQUIRED: schema version mismatch",
        )),
        None => Err(StoreError::ResetRequired(
            "RESET_REQUIRED: store_state row is missing",
        )),
    }
}

// Parent and children are linked only logically: (child_kind, child_id) on the
// parent side, main_id on the child side. No foreign keys.
pub(crate) fn install_schema(conn: &Connection, now_ms: i64) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mains (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          title TEXT NOT NULL,
          child_kind TEXT NOT NULL DEFAULT '',
          child_id INTEGER NOT NULL DEFAULT 0,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          deleted_at_ms INTEGER,
          CHECK(child_kind IN ('', 'TOOL', 'TABLE', 'CHAIR')),
          CHECK(updated_at_ms >= created_at_ms)
        );

        CREATE TABLE IF NOT EXISTS tools (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          title TEXT NOT NULL,
          description TEXT,
          main_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          deleted_at_ms INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_tools_main ON tools(main_id);

        CREATE TABLE IF NOT EXISTS "tables" (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          main_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          deleted_at_ms INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_tables_main ON "tables"(main_id);

        CREATE TABLE IF NOT EXISTS chairs (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          type TEXT NOT NULL CHECK(type IN ('ABC', 'CDE')),
          main_id INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          deleted_at_ms INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_chairs_main ON chairs(main_id);
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}
