#![forbid(unsafe_code)]

use crate::ops::Server;
use serde_json::Value;
use std::io::{BufRead, Write};

fn write_newline_json<W: Write>(writer: &mut W, resp: &Value) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, resp)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// One request per line in, one envelope per line out, until EOF. Blank lines
/// are skipped.
pub(crate) fn run_stdio<R: BufRead, W: Write>(
    server: &mut Server,
    mut reader: R,
    mut writer: W,
) -> std::io::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        let resp = server.handle_line(raw);
        write_newline_json(&mut writer, &resp)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_storage::SqliteStore;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn session_answers_every_request_in_order() {
        let dir = tempfile::tempdir().expect("temp dir must be creatable");
        let store = SqliteStore::open(dir.path()).expect("fresh storage should open");
        let mut server = Server::new(store, None);

        let input = [
            json!({ "id": 1, "op": "main.create", "args": { "title": "Workshop A", "tool": { "title": "Hammer", "description": "steel" } } }).to_string(),
            String::new(),
            json!({ "id": 2, "op": "mains.list" }).to_string(),
            "oops".to_string(),
            json!({ "id": 3, "op": "main.delete", "args": { "id": 1 } }).to_string(),
        ]
        .join("\n");

        let mut output = Vec::new();
        run_stdio(&mut server, Cursor::new(input), &mut output).expect("session should finish");

        let responses = String::from_utf8(output)
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).expect("each line is json"))
            .collect::<Vec<_>>();
        assert_eq!(responses.len(), 4);

        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[0]["result"]["tool"]["title"], json!("Hammer"));
        assert_eq!(responses[1]["result"]["mains"][0]["title"], json!("Workshop A"));
        assert_eq!(responses[2]["success"], json!(false));
        assert_eq!(responses[3]["result"], json!({ "deleted": true }));
    }
}
