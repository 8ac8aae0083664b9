#![forbid(unsafe_code)]

use crate::view::MainView;
use pm_core::{ChairInput, ChildInput, Main, MainPatch, RowId, TableInput, ToolInput, row_id};
use pm_storage::{
    CancelToken, CreateMainRequest, DeleteMainRequest, GetMainRequest, ListMainsRequest,
    SqliteStore, StoreError, UpdateMainRequest,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OpError {
    pub(crate) code: &'static str,
    pub(crate) message: String,
}

impl OpError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: "INVALID_ARGUMENT",
            message: message.into(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        json!({ "code": self.code, "message": self.message })
    }
}

// Engine detail is logged here and never rendered.
impl From<StoreError> for OpError {
    fn from(err: StoreError) -> Self {
        if err.is_storage_failure() {
            error!(code = err.code(), error = %err, "storage failure");
        }
        Self {
            code: err.code(),
            message: err.public_message(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    op: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListArgs {
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetArgs {
    id: i64,
    #[serde(default)]
    include_deleted: bool,
    #[serde(default)]
    resolve: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateArgs {
    title: String,
    tool: Option<ToolArgs>,
    table: Option<TableArgs>,
    chair: Option<ChairArgs>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolArgs {
    title: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChairArgs {
    name: String,
    #[serde(rename = "type")]
    chair_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateArgs {
    id: i64,
    title: Option<String>,
    deleted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteArgs {
    id: i64,
}

impl CreateArgs {
    /// The payload must name exactly one child variant.
    fn into_request(self) -> Result<CreateMainRequest, OpError> {
        let child = match (self.tool, self.table, self.chair) {
            (Some(tool), None, None) => ChildInput::Tool(ToolInput {
                title: tool.title,
                description: tool.description,
            }),
            (None, Some(table), None) => ChildInput::Table(TableInput { name: table.name }),
            (None, None, Some(chair)) => ChildInput::Chair(ChairInput {
                name: chair.name,
                chair_type: chair.chair_type,
            }),
            _ => return Err(OpError::invalid("provide exactly one of tool/table/chair")),
        };
        Ok(CreateMainRequest {
            title: self.title,
            child,
        })
    }
}

pub(crate) struct Server {
    store: SqliteStore,
    op_timeout: Option<Duration>,
}

impl Server {
    pub(crate) fn new(store: SqliteStore, op_timeout: Option<Duration>) -> Self {
        Self { store, op_timeout }
    }

    /// Handles one raw protocol line and always produces a response envelope.
    pub(crate) fn handle_line(&mut self, raw: &str) -> Value {
        match serde_json::from_str::<Request>(raw) {
            Ok(request) => self.handle(request),
            Err(err) => envelope(
                Value::Null,
                Err(OpError::invalid(format!("malformed request: {err}"))),
            ),
        }
    }

    fn handle(&mut self, request: Request) -> Value {
        let cancel = match self.op_timeout {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        };
        debug!(op = %request.op, "request");
        let result = self.dispatch(&cancel, &request.op, request.args);
        if let Err(err) = &result {
            debug!(op = %request.op, code = err.code, "request failed");
        }
        envelope(request.id, result)
    }

    fn dispatch(&mut self, cancel: &CancelToken, op: &str, args: Value) -> Result<Value, OpError> {
        match op {
            "mains.list" => {
                let args: ListArgs = parse_args(args)?;
                let mains = self.store.list_mains(
                    cancel,
                    ListMainsRequest {
                        include_deleted: args.include_deleted,
                    },
                )?;
                let views = mains.into_iter().map(MainView::new).collect::<Vec<_>>();
                Ok(json!({ "mains": views }))
            }
            "main.get" => {
                let args: GetArgs = parse_args(args)?;
                let id = parse_id(args.id)?;
                let found = self.store.get_main(
                    cancel,
                    GetMainRequest {
                        id,
                        include_deleted: args.include_deleted,
                    },
                )?;
                match found {
                    Some(main) if args.resolve => self.render_resolved(cancel, main),
                    Some(main) => to_value(MainView::new(main)),
                    None => Ok(Value::Null),
                }
            }
            "main.create" => {
                let args: CreateArgs = parse_args(args)?;
                let main = self.store.create_main(cancel, args.into_request()?)?;
                self.render_resolved(cancel, main)
            }
            "main.update" => {
                let args: UpdateArgs = parse_args(args)?;
                let id = parse_id(args.id)?;
                let main = self.store.update_main(
                    cancel,
                    UpdateMainRequest {
                        id,
                        patch: MainPatch {
                            title: args.title,
                            deleted_at: args.deleted_at,
                        },
                    },
                )?;
                self.render_resolved(cancel, main)
            }
            "main.delete" => {
                let args: DeleteArgs = parse_args(args)?;
                let id = parse_id(args.id)?;
                let deleted = self.store.delete_main(cancel, DeleteMainRequest { id })?;
                Ok(json!({ "deleted": deleted }))
            }
            other => Err(OpError::invalid(format!("unknown op: {other}"))),
        }
    }

    fn render_resolved(&self, cancel: &CancelToken, main: Main) -> Result<Value, OpError> {
        let child = self.store.resolve_child(cancel, &main)?;
        to_value(MainView::new(main).with_child(child))
    }
}

fn envelope(id: Value, result: Result<Value, OpError>) -> Value {
    match result {
        Ok(result) => json!({
            "id": id,
            "success": true,
            "result": result,
            "error": null,
        }),
        Err(err) => json!({
            "id": id,
            "success": false,
            "result": null,
            "error": err.to_value(),
        }),
    }
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, OpError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|err| OpError::invalid(format!("invalid args: {err}")))
}

fn parse_id(value: i64) -> Result<RowId, OpError> {
    row_id("id", value).map_err(|err| OpError::invalid(err.message()))
}

fn to_value<T: serde::Serialize>(view: T) -> Result<Value, OpError> {
    serde_json::to_value(view).map_err(|err| {
        error!(error = %err, "view serialization failed");
        OpError {
            code: "STORAGE_FAILURE",
            message: "internal storage error".to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server() -> (TempDir, Server) {
        let dir = tempfile::tempdir().expect("temp dir must be creatable");
        let store = SqliteStore::open(dir.path()).expect("fresh storage should open");
        (dir, Server::new(store, None))
    }

    fn call(server: &mut Server, op: &str, args: Value) -> Value {
        server.handle_line(&json!({ "id": 1, "op": op, "args": args }).to_string())
    }

    fn listed_count(server: &mut Server) -> usize {
        let resp = call(server, "mains.list", json!({ "include_deleted": true }));
        resp["result"]["mains"]
            .as_array()
            .expect("mains array")
            .len()
    }

    #[test]
    fn create_requires_exactly_one_variant() {
        let (_dir, mut server) = server();

        let none = call(&mut server, "main.create", json!({ "title": "Empty" }));
        assert_eq!(none["success"], json!(false));
        assert_eq!(none["error"]["code"], json!("INVALID_ARGUMENT"));
        assert_eq!(
            none["error"]["message"],
            json!("provide exactly one of tool/table/chair")
        );

        let both = call(
            &mut server,
            "main.create",
            json!({
                "title": "Both",
                "tool": { "title": "Hammer" },
                "table": { "name": "Bench" },
            }),
        );
        assert_eq!(both["error"]["code"], json!("INVALID_ARGUMENT"));

        assert_eq!(listed_count(&mut server), 0);
    }

    #[test]
    fn create_renders_matching_child_only() {
        let (_dir, mut server) = server();
        let resp = call(
            &mut server,
            "main.create",
            json!({
                "title": "Workshop A",
                "tool": { "title": "Hammer", "description": "steel" },
            }),
        );

        assert_eq!(resp["id"], json!(1));
        assert_eq!(resp["success"], json!(true));
        assert_eq!(resp["error"], json!(null));
        let main = &resp["result"];
        assert_eq!(main["title"], json!("Workshop A"));
        assert_eq!(main["child_kind"], json!("TOOL"));
        assert_eq!(main["deleted_at"], json!(null));
        assert_eq!(main["tool"]["title"], json!("Hammer"));
        assert_eq!(main["tool"]["description"], json!("steel"));
        assert_eq!(main["tool"]["main_id"], main["id"]);
        assert_eq!(main["table"], json!(null));
        assert_eq!(main["chair"], json!(null));
    }

    #[test]
    fn bad_chair_type_surfaces_constraint() {
        let (_dir, mut server) = server();
        let resp = call(
            &mut server,
            "main.create",
            json!({ "title": "Throne room", "chair": { "name": "Throne", "type": "XYZ" } }),
        );
        assert_eq!(resp["error"]["code"], json!("INVALID_ARGUMENT"));
        let message = resp["error"]["message"].as_str().expect("message");
        assert!(message.contains("invalid chair.type: XYZ"), "{message}");
        assert_eq!(listed_count(&mut server), 0);
    }

    #[test]
    fn get_resolves_only_on_request() {
        let (_dir, mut server) = server();
        let created = call(
            &mut server,
            "main.create",
            json!({ "title": "Office", "table": { "name": "Desk" } }),
        );
        let id = created["result"]["id"].as_i64().expect("created id");

        let plain = call(&mut server, "main.get", json!({ "id": id }));
        assert_eq!(plain["result"]["title"], json!("Office"));
        assert!(plain["result"].get("table").is_none());

        let resolved = call(&mut server, "main.get", json!({ "id": id, "resolve": true }));
        assert_eq!(resolved["result"]["table"]["name"], json!("Desk"));
        assert_eq!(resolved["result"]["tool"], json!(null));

        let missing = call(&mut server, "main.get", json!({ "id": 999 }));
        assert_eq!(missing["success"], json!(true));
        assert_eq!(missing["result"], json!(null));
    }

    #[test]
    fn update_and_delete_flow() {
        let (_dir, mut server) = server();
        let created = call(
            &mut server,
            "main.create",
            json!({ "title": "Seating", "chair": { "name": "Stool", "type": "ABC" } }),
        );
        let id = created["result"]["id"].as_i64().expect("created id");

        let bad = call(
            &mut server,
            "main.update",
            json!({ "id": id, "deleted_at": "not-a-date" }),
        );
        assert_eq!(bad["error"]["code"], json!("INVALID_ARGUMENT"));

        let renamed = call(&mut server, "main.update", json!({ "id": id, "title": "X" }));
        assert_eq!(renamed["result"]["title"], json!("X"));
        assert_eq!(renamed["result"]["chair"]["type"], json!("ABC"));

        let first = call(&mut server, "main.delete", json!({ "id": id }));
        assert_eq!(first["result"], json!({ "deleted": true }));
        let second = call(&mut server, "main.delete", json!({ "id": id }));
        assert_eq!(second["result"], json!({ "deleted": false }));

        let hidden = call(&mut server, "main.get", json!({ "id": id }));
        assert_eq!(hidden["result"], json!(null));
        let shown = call(
            &mut server,
            "main.get",
            json!({ "id": id, "include_deleted": true, "resolve": true }),
        );
        assert!(shown["result"]["deleted_at"].is_string());
        assert!(shown["result"]["chair"]["deleted_at"].is_string());
    }

    #[test]
    fn protocol_errors_are_invalid_argument() {
        let (_dir, mut server) = server();

        let garbage = server.handle_line("{not json");
        assert_eq!(garbage["id"], json!(null));
        assert_eq!(garbage["error"]["code"], json!("INVALID_ARGUMENT"));

        let unknown = call(&mut server, "main.explode", json!({}));
        assert_eq!(unknown["error"]["message"], json!("unknown op: main.explode"));

        let extra = call(&mut server, "main.delete", json!({ "id": 1, "force": true }));
        assert_eq!(extra["error"]["code"], json!("INVALID_ARGUMENT"));

        let negative = call(&mut server, "main.delete", json!({ "id": -4 }));
        assert_eq!(
            negative["error"]["message"],
            json!("id must be a positive integer (got -4)")
        );

        let missing = call(&mut server, "main.delete", json!({ "id": 41 }));
        assert_eq!(missing["error"]["code"], json!("NOT_FOUND"));
        assert_eq!(
            missing["error"]["message"],
            json!("resource not found: main 41")
        );

        let listed = server.handle_line(r#"{"id":"abc","op":"mains.list"}"#);
        assert_eq!(listed["id"], json!("abc"));
        assert_eq!(listed["result"], json!({ "mains": [] }));
    }

    #[test]
    fn storage_failures_are_opaque() {
        let err = OpError::from(StoreError::Corrupt("main row carries an unknown child_kind"));
        assert_eq!(err.code, "STORAGE_FAILURE");
        assert_eq!(err.message, "internal storage error");

        let err = OpError::from(StoreError::Cancelled);
        assert_eq!(err.code, "CANCELLED");
    }
}
