#![forbid(unsafe_code)]

use super::StoreError;
use pm_core::{ChildKind, Main, RowId};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const MAIN_COLUMNS: &str =
    "id, title, child_kind, child_id, created_at_ms, updated_at_ms, deleted_at_ms";

// Parent table access. Functions take `&Connection` so they run equally on a
// plain connection or inside a `Transaction`.
//
// Rows still carrying the empty stub linkage belong to an uncommitted creation
// and are never visible to readers.
const LINKED: &str = "child_kind <> ''";

/// Fields of a sparse patch after validation.
#[derive(Debug, Default)]
pub(crate) struct FieldUpdate<'a> {
    pub(crate) title: Option<&'a str>,
    pub(crate) deleted_at_ms: Option<i64>,
}

pub(crate) fn insert_stub(conn: &Connection, title: &str, now_ms: i64) -> Result<RowId, StoreError> {
    conn.execute(
        "INSERT INTO mains(title, child_kind, child_id, created_at_ms, updated_at_ms) \
         VALUES (?1, '', 0, ?2, ?2)",
        params![title, now_ms],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn link_child(
    conn: &Connection,
    main_id: RowId,
    kind: ChildKind,
    child_id: RowId,
    now_ms: i64,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE mains SET child_kind=?2, child_id=?3, updated_at_ms=MAX(?4, updated_at_ms) \
         WHERE id=?1",
        params![main_id, kind.as_str(), child_id, now_ms],
    )?;
    if updated == 0 {
        return Err(StoreError::main_not_found(main_id));
    }
    Ok(())
}

pub(crate) fn fetch_by_id(
    conn: &Connection,
    id: RowId,
    include_deleted: bool,
) -> Result<Option<Main>, StoreError> {
    let mut sql = format!("SELECT {MAIN_COLUMNS} FROM mains WHERE id=?1 AND {LINKED}");
    if !include_deleted {
        sql.push_str(" AND deleted_at_ms IS NULL");
    }

    let row = conn
        .query_row(&sql, params![id], MainRow::read)
        .optional()?;
    row.map(MainRow::into_main).transpose()
}

pub(crate) fn list(conn: &Connection, include_deleted: bool) -> Result<Vec<Main>, StoreError> {
    let mut sql = format!("SELECT {MAIN_COLUMNS} FROM mains WHERE {LINKED}");
    if !include_deleted {
        sql.push_str(" AND deleted_at_ms IS NULL");
    }
    sql.push_str(" ORDER BY id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(MainRow::read(row)?.into_main()?);
    }
    Ok(out)
}

pub(crate) fn exists(conn: &Connection, id: RowId) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT 1 FROM mains WHERE id=?1 AND {LINKED}"),
            params![id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

/// Applies the supplied fields and always advances `updated_at_ms` past its
/// previous value.
pub(crate) fn update_fields(
    conn: &Connection,
    id: RowId,
    update: &FieldUpdate<'_>,
    now_ms: i64,
) -> Result<Main, StoreError> {
    let mut sets = vec!["updated_at_ms=MAX(?1, updated_at_ms + 1)".to_string()];
    let mut values = vec![Value::Integer(now_ms), Value::Integer(id)];

    if let Some(title) = update.title {
        values.push(Value::Text(title.to_string()));
        sets.push(format!("title=?{}", values.len()));
    }
    if let Some(deleted_at_ms) = update.deleted_at_ms {
        values.push(Value::Integer(deleted_at_ms));
        sets.push(format!("deleted_at_ms=?{}", values.len()));
    }

    let sql = format!(
        "UPDATE mains SET {} WHERE id=?2 AND {LINKED}",
        sets.join(", ")
    );
    let updated = conn.execute(&sql, params_from_iter(values))?;
    if updated == 0 {
        return Err(StoreError::main_not_found(id));
    }

    fetch_by_id(conn, id, true)?.ok_or(StoreError::Corrupt("updated main vanished"))
}

/// Returns whether this call performed the deletion.
pub(crate) fn soft_delete(conn: &Connection, id: RowId, now_ms: i64) -> Result<bool, StoreError> {
    let updated = conn.execute(
        &format!(
            "UPDATE mains SET deleted_at_ms=?2, updated_at_ms=MAX(?2, updated_at_ms + 1) \
             WHERE id=?1 AND deleted_at_ms IS NULL AND {LINKED}"
        ),
        params![id, now_ms],
    )?;
    Ok(updated > 0)
}

struct MainRow {
    id: RowId,
    title: String,
    child_kind: String,
    child_id: RowId,
    created_at_ms: i64,
    updated_at_ms: i64,
    deleted_at_ms: Option<i64>,
}

impl MainRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            child_kind: row.get(2)?,
            child_id: row.get(3)?,
            created_at_ms: row.get(4)?,
            updated_at_ms: row.get(5)?,
            deleted_at_ms: row.get(6)?,
        })
    }

    fn into_main(self) -> Result<Main, StoreError> {
        let child_kind = ChildKind::parse(&self.child_kind)
            .ok_or(StoreError::Corrupt("main row carries an unknown child_kind"))?;
        Ok(Main {
            id: self.id,
            title: self.title,
            child_kind,
            child_id: self.child_id,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
            deleted_at_ms: self.deleted_at_ms,
        })
    }
}
