#![forbid(unsafe_code)]

use pm_core::{ChildInput, MainPatch, RowId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateMainRequest {
    pub title: String,
    pub child: ChildInput,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListMainsRequest {
    pub include_deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetMainRequest {
    pub id: RowId,
    pub include_deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateMainRequest {
    pub id: RowId,
    pub patch: MainPatch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteMainRequest {
    pub id: RowId,
}
