#![forbid(unsafe_code)]

use super::children::{self, ChildSchema};
use super::mains::{self, FieldUpdate};
use super::{
    CancelToken, CreateMainRequest, DeleteMainRequest, GetMainRequest, ListMainsRequest,
    MainResolver, SqliteStore, StoreError, UpdateMainRequest,
};
use pm_core::{
    Chair, Child, ChildInput, ChildKind, Main, RowId, Table, Tool, now_ms, parse_rfc3339_ms,
};
use rusqlite::Connection;
use tracing::{debug, warn};

impl SqliteStore {
    pub fn list_mains(
        &self,
        cancel: &CancelToken,
        request: ListMainsRequest,
    ) -> Result<Vec<Main>, StoreError> {
        self.guarded_read(cancel, |conn| mains::list(conn, request.include_deleted))
    }

    pub fn get_main(
        &self,
        cancel: &CancelToken,
        request: GetMainRequest,
    ) -> Result<Option<Main>, StoreError> {
        self.guarded_read(cancel, |conn| {
            mains::fetch_by_id(conn, request.id, request.include_deleted)
        })
    }

    /// Creates the parent stub, the child row and the discriminator link in one
    /// transaction, then re-reads the committed main regardless of deletion
    /// state.
    pub fn create_main(
        &mut self,
        cancel: &CancelToken,
        request: CreateMainRequest,
    ) -> Result<Main, StoreError> {
        let kind = request.child.kind();
        self.create_main_tx(cancel, &request)
            .inspect(|main| {
                debug!(
                    main_id = main.id,
                    child_id = main.child_id,
                    kind = %kind,
                    "main created"
                )
            })
            .inspect_err(|err| {
                warn!(kind = %kind, code = err.code(), error = %err, "main creation aborted")
            })
    }

    fn create_main_tx(
        &mut self,
        cancel: &CancelToken,
        request: &CreateMainRequest,
    ) -> Result<Main, StoreError> {
        cancel.check()?;
        validate_child_input(&request.child)?;

        self.guarded(cancel, |conn| {
            let now_ms = now_ms();
            let tx = conn.transaction()?;
            let main_id = mains::insert_stub(&tx, &request.title, now_ms)?;
            cancel.check()?;
            let child_id = insert_child(&tx, &request.child, main_id, now_ms)?;
            cancel.check()?;
            mains::link_child(&tx, main_id, request.child.kind(), child_id, now_ms)?;
            cancel.check()?;
            tx.commit()?;

            mains::fetch_by_id(conn, main_id, true)?
                .ok_or(StoreError::Corrupt("created main is not readable"))
        })
    }

    /// Applies a sparse patch. A supplied `deleted_at` must be RFC3339 and also
    /// marks the linked child deleted, in the same transaction.
    pub fn update_main(
        &mut self,
        cancel: &CancelToken,
        request: UpdateMainRequest,
    ) -> Result<Main, StoreError> {
        cancel.check()?;
        let deleted_at_ms = request
            .patch
            .deleted_at
            .as_deref()
            .map(parse_rfc3339_ms)
            .transpose()
            .map_err(|err| StoreError::invalid(err.message()))?;
        let update = FieldUpdate {
            title: request.patch.title.as_deref(),
            deleted_at_ms,
        };

        let main = self.guarded(cancel, |conn| {
            let now_ms = now_ms();
            let tx = conn.transaction()?;
            let main = mains::update_fields(&tx, request.id, &update, now_ms)?;
            if let Some(deleted_at_ms) = deleted_at_ms {
                soft_delete_children(&tx, cancel, main.id, deleted_at_ms, now_ms)?;
            }
            cancel.check()?;
            tx.commit()?;
            Ok(main)
        })?;

        debug!(main_id = main.id, deleted = main.is_deleted(), "main updated");
        Ok(main)
    }

    /// Soft-deletes the main and cascades to every child store. Returns whether
    /// this call performed the deletion; a second call returns `false`.
    pub fn delete_main(
        &mut self,
        cancel: &CancelToken,
        request: DeleteMainRequest,
    ) -> Result<bool, StoreError> {
        let (deleted, cascaded) = self.guarded(cancel, |conn| {
            let now_ms = now_ms();
            let tx = conn.transaction()?;
            let deleted = mains::soft_delete(&tx, request.id, now_ms)?;
            if !deleted && !mains::exists(&tx, request.id)? {
                return Err(StoreError::main_not_found(request.id));
            }
            let cascaded = soft_delete_children(&tx, cancel, request.id, now_ms, now_ms)?;
            cancel.check()?;
            tx.commit()?;
            Ok((deleted, cascaded))
        })?;

        debug!(main_id = request.id, deleted, cascaded, "main delete");
        Ok(deleted)
    }

    /// Fetches the child named by `main.child_kind` / `main.child_id`.
    pub fn resolve_child(
        &self,
        cancel: &CancelToken,
        main: &Main,
    ) -> Result<Option<Child>, StoreError> {
        self.guarded_read(cancel, |conn| {
            let child = match main.child_kind {
                ChildKind::Tool => {
                    children::fetch_by_id::<Tool>(conn, main.child_id)?.map(Child::Tool)
                }
                ChildKind::Table => {
                    children::fetch_by_id::<Table>(conn, main.child_id)?.map(Child::Table)
                }
                ChildKind::Chair => {
                    children::fetch_by_id::<Chair>(conn, main.child_id)?.map(Child::Chair)
                }
            };
            Ok(child)
        })
    }

    /// Wraps a fetched main with on-demand child accessors.
    pub fn resolver(&self, main: Main) -> MainResolver<'_> {
        MainResolver::new(self, main)
    }
}

fn validate_child_input(input: &ChildInput) -> Result<(), StoreError> {
    match input {
        ChildInput::Tool(input) => Tool::validate(input),
        ChildInput::Table(input) => Table::validate(input),
        ChildInput::Chair(input) => Chair::validate(input),
    }
}

fn insert_child(
    conn: &Connection,
    input: &ChildInput,
    main_id: RowId,
    now_ms: i64,
) -> Result<RowId, StoreError> {
    match input {
        ChildInput::Tool(input) => children::insert::<Tool>(conn, input, main_id, now_ms),
        ChildInput::Table(input) => children::insert::<Table>(conn, input, main_id, now_ms),
        ChildInput::Chair(input) => children::insert::<Chair>(conn, input, main_id, now_ms),
    }
}

// Every child store is asked; the ones not owning `main_id` match no rows.
fn soft_delete_children(
    conn: &Connection,
    cancel: &CancelToken,
    main_id: RowId,
    deleted_at_ms: i64,
    now_ms: i64,
) -> Result<usize, StoreError> {
    let mut total = 0;
    for kind in ChildKind::ALL {
        cancel.check()?;
        total += match kind {
            ChildKind::Tool => {
                children::soft_delete_by_main_id::<Tool>(conn, main_id, deleted_at_ms, now_ms)?
            }
            ChildKind::Table => {
                children::soft_delete_by_main_id::<Table>(conn, main_id, deleted_at_ms, now_ms)?
            }
            ChildKind::Chair => {
                children::soft_delete_by_main_id::<Chair>(conn, main_id, deleted_at_ms, now_ms)?
            }
        };
    }
    Ok(total)
}
