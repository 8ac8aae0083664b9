#![forbid(unsafe_code)]

use crate::ids::RowId;

/// Discriminator naming the child table that owns a main's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildKind {
    Tool,
    Table,
    Chair,
}

impl ChildKind {
    pub const ALL: [ChildKind; 3] = [ChildKind::Tool, ChildKind::Table, ChildKind::Chair];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "TOOL",
            Self::Table => "TABLE",
            Self::Chair => "CHAIR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TOOL" => Some(Self::Tool),
            "TABLE" => Some(Self::Table),
            "CHAIR" => Some(Self::Chair),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChairType {
    Abc,
    Cde,
}

impl ChairType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abc => "ABC",
            Self::Cde => "CDE",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ModelError> {
        match value {
            "ABC" => Ok(Self::Abc),
            "CDE" => Ok(Self::Cde),
            other => Err(ModelError::UnknownChairType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ChairType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelError {
    UnknownChairType(String),
}

impl ModelError {
    pub fn message(&self) -> String {
        match self {
            Self::UnknownChairType(value) => {
                format!("invalid chair.type: {value} (expected ABC or CDE)")
            }
        }
    }
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ModelError {}

/// The polymorphic parent record. `child_kind` and `child_id` are written once,
/// inside the creation transaction, and never reassigned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Main {
    pub id: RowId,
    pub title: String,
    pub child_kind: ChildKind,
    pub child_id: RowId,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
}

impl Main {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at_ms.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tool {
    pub id: RowId,
    pub title: String,
    pub description: Option<String>,
    pub main_id: RowId,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub id: RowId,
    pub name: String,
    pub main_id: RowId,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chair {
    pub id: RowId,
    pub name: String,
    pub chair_type: ChairType,
    pub main_id: RowId,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub deleted_at_ms: Option<i64>,
}

/// A resolved child row of any kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Child {
    Tool(Tool),
    Table(Table),
    Chair(Chair),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInput {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInput {
    pub name: String,
}

/// `chair_type` stays raw until the chair store validates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChairInput {
    pub name: String,
    pub chair_type: String,
}

/// Payload for the single child created alongside a new main.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildInput {
    Tool(ToolInput),
    Table(TableInput),
    Chair(ChairInput),
}

impl ChildInput {
    pub fn kind(&self) -> ChildKind {
        match self {
            Self::Tool(_) => ChildKind::Tool,
            Self::Table(_) => ChildKind::Table,
            Self::Chair(_) => ChildKind::Chair,
        }
    }
}

/// Sparse update of a main. `deleted_at` is an RFC3339 string and is parsed by
/// the store before anything is written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MainPatch {
    pub title: Option<String>,
    pub deleted_at: Option<String>,
}
