use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use gembridge_ai::{
    build_backend_from_env, ChatReply, ChatRequest, ChatRole, ChatTurn, GenerativeBackend,
    ImageAspect, ImageBatchRequest, VideoAspect, VideoPoll, VideoRequest, VideoResolution,
    IMAGE_MODEL_ADVANCED, IMAGE_MODEL_FAST,
};
use gembridge_core::{compose, select_tier, ImageTier, Role, SessionStore, Turn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};

const DEFAULT_MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// The single optional handle to an unlabeled in-flight video job. Cleared
/// on process restart, overwritten by each new start.
#[derive(Debug, Clone)]
struct VideoSlot {
    operation: String,
    started_ms: u64,
}

pub struct McpServer {
    backend: Arc<dyn GenerativeBackend>,
    sessions: Mutex<SessionStore>,
    video_slot: Mutex<Option<VideoSlot>>,
    runtime: tokio::runtime::Runtime,
}

impl McpServer {
    /// Builds the server against the real Gemini backend. The missing-key
    /// configuration error is the only fatal startup failure.
    pub fn from_env() -> Result<Self, String> {
        let backend = build_backend_from_env().map_err(|e| e.to_string())?;
        Self::with_backend(backend)
    }

    pub fn with_backend(backend: Arc<dyn GenerativeBackend>) -> Result<Self, String> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| format!("runtime initialization failed: {e}"))?;
        Ok(Self {
            backend,
            sessions: Mutex::new(SessionStore::new(session_retention_ms())),
            video_slot: Mutex::new(None),
            runtime,
        })
    }

    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        if request.is_notification() && request.method == "notifications/initialized" {
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = request
                    .params
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_MCP_PROTOCOL_VERSION);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {"name": "gembridge-mcp", "version": env!("CARGO_PKG_VERSION")},
                        "capabilities": {
                            "tools": {
                                "listChanged": false
                            }
                        }
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, tools_list_result()),
            "tools/call" => self.handle_tools_call(id, request.params),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "method not found"),
        };

        Some(response)
    }

    fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };

        // Opportunistic eviction: every dispatch cycle starts with a sweep,
        // before any remote call can suspend the cycle.
        if let Ok(mut sessions) = self.sessions.lock() {
            let evicted = sessions.sweep(now_ms());
            if evicted > 0 {
                tracing::debug!(evicted, "swept idle conversations");
            }
        }

        match parsed.name.as_str() {
            "chat_start" => self.exec_chat_start(id, parsed.arguments),
            "chat_continue" => self.exec_chat_continue(id, parsed.arguments),
            "generate_images" => self.exec_generate_images(id, parsed.arguments),
            "video_start" => self.exec_video_start(id, parsed.arguments),
            "video_status" => self.exec_video_status(id, parsed.arguments),
            other => tool_error(id, format!("unknown tool: {other}")),
        }
    }

    fn chat(&self, request: ChatRequest) -> Result<ChatReply, String> {
        self.runtime
            .block_on(self.backend.chat(request))
            .map_err(|e| e.to_string())
    }

    fn exec_chat_start(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: ChatStartInput = match parse_args(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };

        let instruction = compose(
            args.base_instructions.as_deref(),
            args.cwd.as_deref(),
            args.sandbox.as_deref(),
            args.developer_instructions.as_deref(),
        );

        let reply = match self.chat(ChatRequest {
            system_instruction: Some(instruction),
            history: Vec::new(),
            prompt: args.prompt.clone(),
            model: args.model.clone(),
        }) {
            Ok(v) => v,
            // no session is created on remote failure
            Err(msg) => return tool_error(id, msg),
        };

        let mut sessions = match self.sessions.lock() {
            Ok(v) => v,
            Err(_) => return JsonRpcResponse::error(id, INTERNAL_ERROR, "session lock poisoned"),
        };
        let conversation_id = sessions.create(
            now_ms(),
            vec![Turn::user(&args.prompt), Turn::model(&reply.text)],
            args.cwd,
        );

        JsonRpcResponse::success(
            id,
            json!({
                "structuredContent": {
                    "conversation_id": conversation_id,
                    "model": reply.model
                },
                "content": [{"type": "text", "text": reply.text}]
            }),
        )
    }

    fn exec_chat_continue(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: ChatContinueInput = match parse_args(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };

        let (history, working_directory) = {
            let sessions = match self.sessions.lock() {
                Ok(v) => v,
                Err(_) => {
                    return JsonRpcResponse::error(id, INTERNAL_ERROR, "session lock poisoned")
                }
            };
            match sessions.get(&args.conversation_id) {
                Some(session) => (
                    session.history.iter().map(to_chat_turn).collect::<Vec<_>>(),
                    session.working_directory.clone(),
                ),
                None => {
                    return tool_error(
                        id,
                        format!(
                            "conversation not found or expired: {}",
                            args.conversation_id
                        ),
                    )
                }
            }
        };

        // Only the captured working directory is reapplied; per-turn config
        // from the initial call is deliberately not persisted.
        let instruction = compose(None, working_directory.as_deref(), None, None);

        let reply = match self.chat(ChatRequest {
            system_instruction: Some(instruction),
            history,
            prompt: args.prompt.clone(),
            model: None,
        }) {
            Ok(v) => v,
            Err(msg) => return tool_error(id, msg),
        };

        let mut sessions = match self.sessions.lock() {
            Ok(v) => v,
            Err(_) => return JsonRpcResponse::error(id, INTERNAL_ERROR, "session lock poisoned"),
        };
        let turns = match sessions.append_turn(&args.conversation_id, &args.prompt, &reply.text, now_ms())
        {
            Some(session) => session.history.len(),
            None => {
                return tool_error(
                    id,
                    format!("conversation disappeared mid-call: {}", args.conversation_id),
                )
            }
        };

        JsonRpcResponse::success(
            id,
            json!({
                "structuredContent": {
                    "conversation_id": args.conversation_id,
                    "turns": turns
                },
                "content": [{"type": "text", "text": reply.text}]
            }),
        )
    }

    fn exec_generate_images(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: GenerateImagesInput = match parse_args(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };

        // out-of-range counts clamp rather than reject
        let count = args.number_of_images.unwrap_or(1).clamp(1, 4) as u8;
        let aspect = match args.aspect_ratio.as_deref() {
            Some(raw) => match ImageAspect::parse(raw) {
                Some(v) => v,
                None => {
                    return JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("invalid aspect_ratio: {raw} (expected 1:1, 3:4, 4:3, 9:16 or 16:9)"),
                    )
                }
            },
            None => ImageAspect::Square,
        };

        let tier = select_tier(&args.prompt, args.use_pro);
        let model = match tier {
            ImageTier::Fast => IMAGE_MODEL_FAST,
            ImageTier::Advanced => IMAGE_MODEL_ADVANCED,
        };

        let batch = match self.runtime.block_on(self.backend.generate_images(ImageBatchRequest {
            prompt: args.prompt.clone(),
            count,
            aspect,
            model: model.to_string(),
        })) {
            Ok(v) => v,
            Err(err) => return tool_error(id, err.to_string()),
        };

        let saved_paths = match &args.output_path {
            Some(dir) => match save_images(Path::new(dir), &args.prompt, &batch.images) {
                Ok(paths) => paths,
                Err(msg) => return tool_error(id, msg),
            },
            None => Vec::new(),
        };

        let mut summary = format!(
            "generated {} image(s) with {} ({} tier)",
            batch.images.len(),
            batch.model,
            tier.as_label()
        );
        if !saved_paths.is_empty() {
            let listed = saved_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            summary.push_str(&format!("\nsaved: {listed}"));
        }

        let mut content = vec![json!({"type": "text", "text": summary})];
        for image in &batch.images {
            content.push(json!({
                "type": "image",
                "data": image.data,
                "mimeType": image.mime_type
            }));
        }

        JsonRpcResponse::success(
            id,
            json!({
                "structuredContent": {
                    "model": batch.model,
                    "tier": tier.as_label(),
                    "count": batch.images.len(),
                    "saved_paths": saved_paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                },
                "content": content
            }),
        )
    }

    fn exec_video_start(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: VideoStartInput = match parse_args(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };

        let aspect = match args.aspect_ratio.as_deref() {
            Some(raw) => match VideoAspect::parse(raw) {
                Some(v) => v,
                None => {
                    return JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("invalid aspect_ratio: {raw} (expected 16:9 or 9:16)"),
                    )
                }
            },
            None => VideoAspect::Landscape16x9,
        };
        let resolution = match args.resolution.as_deref() {
            Some(raw) => match VideoResolution::parse(raw) {
                Some(v) => v,
                None => {
                    return JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("invalid resolution: {raw} (expected 480p or 720p)"),
                    )
                }
            },
            None => VideoResolution::P720,
        };

        let operation = match self.runtime.block_on(self.backend.start_video(VideoRequest {
            prompt: args.prompt,
            aspect,
            resolution,
            first_frame: args
                .first_frame_base64
                .map(|data| (data, "image/png".to_string())),
        })) {
            Ok(v) => v,
            Err(err) => return tool_error(id, err.to_string()),
        };

        if let Ok(mut slot) = self.video_slot.lock() {
            *slot = Some(VideoSlot {
                operation: operation.name.clone(),
                started_ms: now_ms(),
            });
        }

        JsonRpcResponse::success(
            id,
            json!({
                "structuredContent": {"operation_id": operation.name},
                "content": [{
                    "type": "text",
                    "text": format!("video generation started: {}", operation.name)
                }]
            }),
        )
    }

    fn exec_video_status(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        let args: VideoStatusInput = match parse_args_optional(arguments) {
            Ok(v) => v,
            Err(resp) => return with_id(resp, id),
        };

        let slot = self.video_slot.lock().ok().and_then(|s| s.clone());
        let operation = match args.operation_id.or_else(|| slot.as_ref().map(|s| s.operation.clone()))
        {
            Some(v) => v,
            None => return tool_error(id, "no video operation to check"),
        };

        let poll = match self.runtime.block_on(self.backend.poll_video(&operation)) {
            Ok(v) => v,
            Err(err) => return tool_error(id, err.to_string()),
        };

        match poll {
            VideoPoll::Processing => {
                // elapsed only known for the slot-tracked operation
                let elapsed_secs = slot
                    .as_ref()
                    .filter(|s| s.operation == operation)
                    .map(|s| now_ms().saturating_sub(s.started_ms) / 1000);
                let text = match elapsed_secs {
                    Some(secs) => format!("video still processing ({secs}s elapsed)"),
                    None => "video still processing".to_string(),
                };
                JsonRpcResponse::success(
                    id,
                    json!({
                        "structuredContent": {
                            "operation_id": operation,
                            "status": "processing",
                            "elapsed_secs": elapsed_secs
                        },
                        "content": [{"type": "text", "text": text}]
                    }),
                )
            }
            VideoPoll::Complete { data, mime_type } => {
                let saved_path = match &args.output_path {
                    Some(path) => match save_video(Path::new(path), &data) {
                        Ok(p) => Some(p.display().to_string()),
                        Err(msg) => return tool_error(id, msg),
                    },
                    None => None,
                };
                let video_base64 = saved_path.is_none().then(|| BASE64.encode(&data));
                let text = match &saved_path {
                    Some(p) => format!("video generation complete, saved to {p}"),
                    None => "video generation complete".to_string(),
                };
                JsonRpcResponse::success(
                    id,
                    json!({
                        "structuredContent": {
                            "operation_id": operation,
                            "status": "complete",
                            "mime_type": mime_type,
                            "saved_path": saved_path,
                            "video_base64": video_base64
                        },
                        "content": [{"type": "text", "text": text}]
                    }),
                )
            }
        }
    }

    pub fn serve_stdio(&self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut reader = io::BufReader::new(stdin.lock());
        let mut stdout = io::stdout();
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }

            let trimmed = line.trim_end_matches(['\r', '\n']).trim_start();
            if trimmed.is_empty() {
                continue;
            }

            let (payload, frame) = if is_stdio_header_line(trimmed) {
                let content_length = match read_stdio_content_length(&mut reader, trimmed) {
                    Ok(v) => v,
                    Err(err) => {
                        let response = JsonRpcResponse::error(
                            Value::Null,
                            PARSE_ERROR,
                            format!("invalid stdio frame: {err}"),
                        );
                        write_stdio_response(&mut stdout, &response, StdioFrame::LineDelimited)?;
                        continue;
                    }
                };

                let mut body = vec![0_u8; content_length];
                if let Err(err) = reader.read_exact(&mut body) {
                    let response = JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("invalid stdio frame body: {err}"),
                    );
                    write_stdio_response(&mut stdout, &response, StdioFrame::ContentLength)?;
                    continue;
                }
                (body, StdioFrame::ContentLength)
            } else {
                (trimmed.as_bytes().to_vec(), StdioFrame::LineDelimited)
            };

            let request: JsonRpcRequest = match serde_json::from_slice(&payload) {
                Ok(v) => v,
                Err(err) => {
                    let response = JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("parse error: {err}"),
                    );
                    write_stdio_response(&mut stdout, &response, frame)?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(request) {
                write_stdio_response(&mut stdout, &response, frame)?;
            }
        }

        Ok(())
    }
}

fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": "chat_start",
                "description": "Start a new Gemini conversation; returns the reply and a conversation_id for follow-ups.",
                "inputSchema": {
                    "type": "object",
                    "required": ["prompt"],
                    "properties": {
                        "prompt": {"type": "string"},
                        "cwd": {"type": "string"},
                        "sandbox": {"type": "string", "enum": ["read-only", "workspace-write", "danger-full-access"]},
                        "base_instructions": {"type": "string"},
                        "developer_instructions": {"type": "string"},
                        "model": {"type": "string"}
                    }
                }
            },
            {
                "name": "chat_continue",
                "description": "Continue a server-held conversation by id with the full prior history replayed.",
                "inputSchema": {
                    "type": "object",
                    "required": ["conversation_id", "prompt"],
                    "properties": {
                        "conversation_id": {"type": "string"},
                        "prompt": {"type": "string"}
                    }
                }
            },
            {
                "name": "generate_images",
                "description": "Generate 1-4 images with Imagen; the model tier is picked from the prompt unless use_pro is set.",
                "inputSchema": {
                    "type": "object",
                    "required": ["prompt"],
                    "properties": {
                        "prompt": {"type": "string"},
                        "number_of_images": {"type": "integer", "minimum": 1, "maximum": 4},
                        "aspect_ratio": {"type": "string", "enum": ["1:1", "3:4", "4:3", "9:16", "16:9"]},
                        "use_pro": {"type": "boolean"},
                        "output_path": {"type": "string"}
                    }
                }
            },
            {
                "name": "video_start",
                "description": "Start asynchronous Veo video generation; returns an operation id immediately.",
                "inputSchema": {
                    "type": "object",
                    "required": ["prompt"],
                    "properties": {
                        "prompt": {"type": "string"},
                        "aspect_ratio": {"type": "string", "enum": ["16:9", "9:16"]},
                        "resolution": {"type": "string", "enum": ["480p", "720p"]},
                        "first_frame_base64": {"type": "string"}
                    }
                }
            },
            {
                "name": "video_status",
                "description": "Poll a video operation (defaults to the most recently started) and fetch the result when done.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "operation_id": {"type": "string"},
                        "output_path": {"type": "string"}
                    }
                }
            }
        ]
    })
}

/// Domain failures render as a normal result with `isError`, so the
/// transport never sees a fault for a well-formed call.
fn tool_error(id: Value, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "isError": true,
            "content": [{"type": "text", "text": message.into()}]
        }),
    )
}

fn to_chat_turn(turn: &Turn) -> ChatTurn {
    ChatTurn {
        role: match turn.role {
            Role::User => ChatRole::User,
            Role::Model => ChatRole::Model,
        },
        text: turn.text.clone(),
    }
}

fn session_retention_ms() -> u64 {
    std::env::var("GEMBRIDGE_SESSION_TTL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(gembridge_core::DEFAULT_RETENTION_MS)
        .clamp(1_000, 86_400_000)
}

/// Derives a filesystem-safe stem from the prompt: non-alphanumeric runs
/// collapse to a single dash, truncated to 40 chars.
fn sanitize_prompt_stem(prompt: &str) -> String {
    let mut stem = String::new();
    let mut last_dash = true;
    for ch in prompt.chars() {
        if stem.len() >= 40 {
            break;
        }
        if ch.is_ascii_alphanumeric() {
            stem.extend(ch.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            stem.push('-');
            last_dash = true;
        }
    }
    let stem = stem.trim_end_matches('-').to_string();
    if stem.is_empty() {
        "image".to_string()
    } else {
        stem
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

fn save_images(
    dir: &Path,
    prompt: &str,
    images: &[gembridge_ai::GeneratedImage],
) -> Result<Vec<PathBuf>, String> {
    fs::create_dir_all(dir).map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
    let stem = sanitize_prompt_stem(prompt);
    let mut paths = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let bytes = BASE64
            .decode(&image.data)
            .map_err(|e| format!("image payload is not valid base64: {e}"))?;
        let path = dir.join(format!(
            "{stem}-{}.{}",
            index + 1,
            extension_for_mime(&image.mime_type)
        ));
        fs::write(&path, bytes).map_err(|e| format!("cannot write {}: {e}", path.display()))?;
        paths.push(path);
    }
    Ok(paths)
}

fn save_video(path: &Path, data: &[u8]) -> Result<PathBuf, String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
    }
    fs::write(path, data).map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    Ok(path.to_path_buf())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn with_id(mut response: JsonRpcResponse, id: Value) -> JsonRpcResponse {
    response.id = id;
    response
}

fn parse_args<T: for<'de> Deserialize<'de>>(
    arguments: Option<Value>,
) -> Result<T, JsonRpcResponse> {
    let args = match arguments {
        Some(v) => v,
        None => {
            return Err(JsonRpcResponse::error(
                Value::Null,
                INVALID_PARAMS,
                "missing tool arguments",
            ))
        }
    };

    serde_json::from_value(args).map_err(|err| {
        JsonRpcResponse::error(
            Value::Null,
            INVALID_PARAMS,
            format!("invalid tool arguments: {err}"),
        )
    })
}

fn parse_args_optional<T: for<'de> Deserialize<'de> + Default>(
    arguments: Option<Value>,
) -> Result<T, JsonRpcResponse> {
    match arguments {
        Some(v) => serde_json::from_value(v).map_err(|err| {
            JsonRpcResponse::error(
                Value::Null,
                INVALID_PARAMS,
                format!("invalid tool arguments: {err}"),
            )
        }),
        None => Ok(T::default()),
    }
}

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatStartInput {
    prompt: String,
    cwd: Option<String>,
    sandbox: Option<String>,
    base_instructions: Option<String>,
    developer_instructions: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatContinueInput {
    conversation_id: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct GenerateImagesInput {
    prompt: String,
    number_of_images: Option<u32>,
    aspect_ratio: Option<String>,
    use_pro: Option<bool>,
    output_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoStartInput {
    prompt: String,
    aspect_ratio: Option<String>,
    resolution: Option<String>,
    first_frame_base64: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatusInput {
    operation_id: Option<String>,
    output_path: Option<String>,
}

enum StdioFrame {
    LineDelimited,
    ContentLength,
}

fn write_stdio_response(
    stdout: &mut io::Stdout,
    response: &JsonRpcResponse,
    frame: StdioFrame,
) -> io::Result<()> {
    match frame {
        StdioFrame::LineDelimited => {
            let serialized = serde_json::to_string(response)?;
            writeln!(stdout, "{serialized}")?;
        }
        StdioFrame::ContentLength => {
            let serialized = serde_json::to_vec(response)?;
            write!(stdout, "Content-Length: {}\r\n\r\n", serialized.len())?;
            stdout.write_all(&serialized)?;
        }
    }
    stdout.flush()
}

fn is_stdio_header_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("content-length:") || lower.starts_with("content-type:")
}

fn read_stdio_content_length<R: BufRead>(reader: &mut R, first_line: &str) -> io::Result<usize> {
    let mut content_length = parse_content_length(first_line);
    let mut header_line = String::new();
    loop {
        header_line.clear();
        if reader.read_line(&mut header_line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected eof while reading frame headers",
            ));
        }
        let trimmed = header_line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(v) = parse_content_length(trimmed) {
            content_length = Some(v);
        }
    }
    content_length
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing content-length header"))
}

fn parse_content_length(line: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_prompt_stem_collapses_and_truncates() {
        assert_eq!(sanitize_prompt_stem("A cute cat!!"), "a-cute-cat");
        assert_eq!(sanitize_prompt_stem("***"), "image");
        let long = sanitize_prompt_stem(&"x".repeat(100));
        assert_eq!(long.len(), 40);
    }

    #[test]
    fn extension_follows_mime_type() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
    }

    #[test]
    fn content_length_header_parsing() {
        assert!(is_stdio_header_line("Content-Length: 12"));
        assert!(is_stdio_header_line("content-type: application/json"));
        assert!(!is_stdio_header_line("{\"jsonrpc\":\"2.0\"}"));
        assert_eq!(parse_content_length("Content-Length: 42"), Some(42));
        assert_eq!(parse_content_length("X-Other: 42"), None);
    }
}
