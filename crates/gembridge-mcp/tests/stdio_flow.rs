use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};

use serde_json::{json, Value};

fn spawn_server() -> std::process::Child {
    Command::new(env!("CARGO_BIN_EXE_gembridged"))
        .env("GEMINI_API_KEY", "test-key-never-used")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gembridged")
}

#[test]
fn missing_credential_fails_fast_before_serving() {
    let status = Command::new(env!("CARGO_BIN_EXE_gembridged"))
        .env_remove("GEMINI_API_KEY")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run gembridged");
    assert!(!status.success());
}

#[test]
fn line_delimited_initialize_and_tools_list_work() {
    let mut child = spawn_server();
    let mut child_stdin = child.stdin.take().expect("stdin");
    let child_stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(child_stdout);

    let init = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "stdio-test", "version": "1.0.0"}
        }
    });
    writeln!(child_stdin, "{init}").expect("write initialize");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read initialize response");
    let response: Value = serde_json::from_str(&line).expect("parse initialize response");
    assert_eq!(
        response["result"]["serverInfo"]["name"].as_str(),
        Some("gembridge-mcp")
    );
    assert_eq!(
        response["result"]["protocolVersion"].as_str(),
        Some("2024-11-05")
    );

    let list = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {}});
    writeln!(child_stdin, "{list}").expect("write tools/list");

    line.clear();
    reader.read_line(&mut line).expect("read tools/list response");
    let response: Value = serde_json::from_str(&line).expect("parse tools/list response");
    let names = response["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool.get("name").and_then(Value::as_str))
        .collect::<Vec<_>>();
    assert!(names.contains(&"chat_start"));
    assert!(names.contains(&"chat_continue"));
    assert!(names.contains(&"generate_images"));
    assert!(names.contains(&"video_start"));
    assert!(names.contains(&"video_status"));

    drop(child_stdin);
    let status = child.wait().expect("wait child");
    assert!(status.success());
}

fn write_framed(stdin: &mut std::process::ChildStdin, payload: &Value) {
    let body = serde_json::to_vec(payload).expect("serialize payload");
    let frame = format!("Content-Length: {}\r\n\r\n", body.len());
    stdin
        .write_all(frame.as_bytes())
        .expect("write frame header");
    stdin.write_all(&body).expect("write frame body");
    stdin.flush().expect("flush frame");
}

fn read_framed(reader: &mut BufReader<std::process::ChildStdout>) -> Value {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read frame header");
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    }

    let len = content_length.expect("content-length header");
    let mut body = vec![0_u8; len];
    reader.read_exact(&mut body).expect("read frame body");
    serde_json::from_slice(&body).expect("parse framed response")
}

#[test]
fn content_length_framing_round_trips() {
    let mut child = spawn_server();
    let mut child_stdin = child.stdin.take().expect("stdin");
    let child_stdout = child.stdout.take().expect("stdout");
    let mut reader = BufReader::new(child_stdout);

    write_framed(
        &mut child_stdin,
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "chat_continue",
                "arguments": {"conversation_id": "conv-0-1", "prompt": "hi"}
            }
        }),
    );
    let response = read_framed(&mut reader);
    // unknown conversation is a domain error, not a protocol fault
    assert_eq!(response["result"]["isError"].as_bool(), Some(true));

    drop(child_stdin);
    let status = child.wait().expect("wait child");
    assert!(status.success());
}
