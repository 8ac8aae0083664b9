#![forbid(unsafe_code)]

use pm_core::{Chair, Child, Main, RowId, Table, Tool, format_rfc3339_ms};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct MainView {
    id: RowId,
    title: String,
    child_kind: &'static str,
    child_id: RowId,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
    #[serde(flatten)]
    children: Option<ChildrenView>,
}

/// Exactly one key is non-null once resolved; a dangling link renders all
/// three as null.
#[derive(Debug, Default, Serialize)]
struct ChildrenView {
    tool: Option<ToolView>,
    table: Option<TableView>,
    chair: Option<ChairView>,
}

#[derive(Debug, Serialize)]
struct ToolView {
    id: RowId,
    title: String,
    description: Option<String>,
    main_id: RowId,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct TableView {
    id: RowId,
    name: String,
    main_id: RowId,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChairView {
    id: RowId,
    name: String,
    #[serde(rename = "type")]
    chair_type: &'static str,
    main_id: RowId,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

fn ts(ts_ms: i64) -> String {
    format_rfc3339_ms(ts_ms)
}

fn opt_ts(ts_ms: Option<i64>) -> Option<String> {
    ts_ms.map(format_rfc3339_ms)
}

impl MainView {
    pub(crate) fn new(main: Main) -> Self {
        Self {
            id: main.id,
            title: main.title,
            child_kind: main.child_kind.as_str(),
            child_id: main.child_id,
            created_at: ts(main.created_at_ms),
            updated_at: ts(main.updated_at_ms),
            deleted_at: opt_ts(main.deleted_at_ms),
            children: None,
        }
    }

    pub(crate) fn with_child(mut self, child: Option<Child>) -> Self {
        let mut children = ChildrenView::default();
        match child {
            Some(Child::Tool(tool)) => children.tool = Some(tool.into()),
            Some(Child::Table(table)) => children.table = Some(table.into()),
            Some(Child::Chair(chair)) => children.chair = Some(chair.into()),
            None => {}
        }
        self.children = Some(children);
        self
    }
}

impl From<Tool> for ToolView {
    fn from(tool: Tool) -> Self {
        Self {
            id: tool.id,
            title: tool.title,
            description: tool.description,
            main_id: tool.main_id,
            created_at: ts(tool.created_at_ms),
            updated_at: ts(tool.updated_at_ms),
            deleted_at: opt_ts(tool.deleted_at_ms),
        }
    }
}

impl From<Table> for TableView {
    fn from(table: Table) -> Self {
        Self {
            id: table.id,
            name: table.name,
            main_id: table.main_id,
            created_at: ts(table.created_at_ms),
            updated_at: ts(table.updated_at_ms),
            deleted_at: opt_ts(table.deleted_at_ms),
        }
    }
}

impl From<Chair> for ChairView {
    fn from(chair: Chair) -> Self {
        Self {
            id: chair.id,
            name: chair.name,
            chair_type: chair.chair_type.as_str(),
            main_id: chair.main_id,
            created_at: ts(chair.created_at_ms),
            updated_at: ts(chair.updated_at_ms),
            deleted_at: opt_ts(chair.deleted_at_ms),
        }
    }
}
