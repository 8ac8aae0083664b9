#![forbid(unsafe_code)]

use super::StoreError;
use pm_core::{Chair, ChairInput, ChairType, ChildKind, RowId, Table, TableInput, Tool, ToolInput};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

/// Bookkeeping columns shared by every child table, always selected first.
const HEADER_COLUMNS: &str = "id, main_id, created_at_ms, updated_at_ms, deleted_at_ms";
const PAYLOAD_OFFSET: usize = 5;

pub(crate) struct ChildHeader {
    pub(crate) id: RowId,
    pub(crate) main_id: RowId,
    pub(crate) created_at_ms: i64,
    pub(crate) updated_at_ms: i64,
    pub(crate) deleted_at_ms: Option<i64>,
}

impl ChildHeader {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            main_id: row.get(1)?,
            created_at_ms: row.get(2)?,
            updated_at_ms: row.get(3)?,
            deleted_at_ms: row.get(4)?,
        })
    }
}

/// Per-kind description of a child table: where it lives, which payload
/// columns it carries, how input is validated and how rows map back.
pub(crate) trait ChildSchema: Sized {
    const KIND: ChildKind;
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    type Input;

    /// Validates `input` and returns values in `COLUMNS` order.
    fn payload(input: &Self::Input) -> Result<Vec<Value>, StoreError>;

    /// `row` holds `COLUMNS` starting at `offset`.
    fn from_row(header: ChildHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;

    fn validate(input: &Self::Input) -> Result<(), StoreError> {
        Self::payload(input).map(drop)
    }
}

impl ChildSchema for Tool {
    const KIND: ChildKind = ChildKind::Tool;
    const TABLE: &'static str = "tools";
    const COLUMNS: &'static [&'static str] = &["title", "description"];

    type Input = ToolInput;

    fn payload(input: &ToolInput) -> Result<Vec<Value>, StoreError> {
        Ok(vec![
            Value::Text(input.title.clone()),
            input
                .description
                .clone()
                .map_or(Value::Null, Value::Text),
        ])
    }

    fn from_row(header: ChildHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: header.id,
            title: row.get(offset)?,
            description: row.get(offset + 1)?,
            main_id: header.main_id,
            created_at_ms: header.created_at_ms,
            updated_at_ms: header.updated_at_ms,
            deleted_at_ms: header.deleted_at_ms,
        })
    }
}

impl ChildSchema for Table {
    const KIND: ChildKind = ChildKind::Table;
    const TABLE: &'static str = "tables";
    const COLUMNS: &'static [&'static str] = &["name"];

    type Input = TableInput;

    fn payload(input: &TableInput) -> Result<Vec<Value>, StoreError> {
        Ok(vec![Value::Text(input.name.clone())])
    }

    fn from_row(header: ChildHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: header.id,
            name: row.get(offset)?,
            main_id: header.main_id,
            created_at_ms: header.created_at_ms,
            updated_at_ms: header.updated_at_ms,
            deleted_at_ms: header.deleted_at_ms,
        })
    }
}

impl ChildSchema for Chair {
    const KIND: ChildKind = ChildKind::Chair;
    const TABLE: &'static str = "chairs";
    const COLUMNS: &'static [&'static str] = &["name", "type"];

    type Input = ChairInput;

    fn payload(input: &ChairInput) -> Result<Vec<Value>, StoreError> {
        let chair_type =
            ChairType::parse(&input.chair_type).map_err(|err| StoreError::invalid(err.message()))?;
        Ok(vec![
            Value::Text(input.name.clone()),
            Value::Text(chair_type.as_str().to_string()),
        ])
    }

    fn from_row(header: ChildHeader, row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        let raw_type = row.get::<_, String>(offset + 1)?;
        let chair_type = ChairType::parse(&raw_type).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(offset + 1, Type::Text, Box::new(err))
        })?;
        Ok(Self {
            id: header.id,
            name: row.get(offset)?,
            chair_type,
            main_id: header.main_id,
            created_at_ms: header.created_at_ms,
            updated_at_ms: header.updated_at_ms,
            deleted_at_ms: header.deleted_at_ms,
        })
    }
}

// Generic child store: the same three operations serve every child kind.

pub(crate) fn insert<S: ChildSchema>(
    conn: &Connection,
    input: &S::Input,
    main_id: RowId,
    now_ms: i64,
) -> Result<RowId, StoreError> {
    let mut values = S::payload(input)?;
    let mut columns = S::COLUMNS.to_vec();
    columns.extend(["main_id", "created_at_ms", "updated_at_ms"]);
    values.extend([
        Value::Integer(main_id),
        Value::Integer(now_ms),
        Value::Integer(now_ms),
    ]);

    let placeholders = (1..=values.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO \"{}\"({}) VALUES ({placeholders})",
        S::TABLE,
        columns.join(", ")
    );
    conn.execute(&sql, params_from_iter(values))?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn fetch_by_id<S: ChildSchema>(
    conn: &Connection,
    id: RowId,
) -> Result<Option<S>, StoreError> {
    let sql = format!(
        "SELECT {HEADER_COLUMNS}, {} FROM \"{}\" WHERE id=?1",
        S::COLUMNS.join(", "),
        S::TABLE
    );
    Ok(conn
        .query_row(&sql, params![id], |row| {
            S::from_row(ChildHeader::read(row)?, row, PAYLOAD_OFFSET)
        })
        .optional()?)
}

/// Marks live rows owned by `main_id` as deleted. `deleted_at_ms` may come
/// from a caller-supplied patch; `updated_at_ms` always follows the clock.
/// Zero matching rows is a normal outcome.
pub(crate) fn soft_delete_by_main_id<S: ChildSchema>(
    conn: &Connection,
    main_id: RowId,
    deleted_at_ms: i64,
    now_ms: i64,
) -> Result<usize, StoreError> {
    let sql = format!(
        "UPDATE \"{}\" SET deleted_at_ms=?2, updated_at_ms=MAX(?3, updated_at_ms + 1) \
         WHERE main_id=?1 AND deleted_at_ms IS NULL",
        S::TABLE
    );
    Ok(conn.execute(&sql, params![main_id, deleted_at_ms, now_ms])?)
}
