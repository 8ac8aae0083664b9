#![forbid(unsafe_code)]

use super::children::{self, ChildSchema};
use super::{CancelToken, SqliteStore, StoreError};
use pm_core::{Chair, Child, Main, Table, Tool};

/// A fetched main plus lazy access to its child. Nothing is read from storage
/// until an accessor is called, so listing mains never loads children.
#[derive(Debug)]
pub struct MainResolver<'a> {
    store: &'a SqliteStore,
    main: Main,
}

impl<'a> MainResolver<'a> {
    pub(crate) fn new(store: &'a SqliteStore, main: Main) -> Self {
        Self { store, main }
    }

    pub fn main(&self) -> &Main {
        &self.main
    }

    pub fn into_main(self) -> Main {
        self.main
    }

    /// `None` unless the main's child kind is TOOL.
    pub fn tool(&self, cancel: &CancelToken) -> Result<Option<Tool>, StoreError> {
        self.fetch::<Tool>(cancel)
    }

    pub fn table(&self, cancel: &CancelToken) -> Result<Option<Table>, StoreError> {
        self.fetch::<Table>(cancel)
    }

    pub fn chair(&self, cancel: &CancelToken) -> Result<Option<Chair>, StoreError> {
        self.fetch::<Chair>(cancel)
    }

    pub fn child(&self, cancel: &CancelToken) -> Result<Option<Child>, StoreError> {
        self.store.resolve_child(cancel, &self.main)
    }

    fn fetch<S: ChildSchema>(&self, cancel: &CancelToken) -> Result<Option<S>, StoreError> {
        if self.main.child_kind != S::KIND {
            return Ok(None);
        }
        self.store
            .guarded_read(cancel, |conn| children::fetch_by_id::<S>(conn, self.main.child_id))
    }
}
