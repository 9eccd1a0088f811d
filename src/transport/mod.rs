//! Stdio JSON-RPC 2.0 server exposing the pipeline operations as tools
//!
//! One JSON-RPC message per line on stdin, one response per line on stdout.
//! Tool results carry the typed reports serialized as JSON, so clients never
//! scrape log output.

use crate::{
    agent::GenerationProvider,
    core::{validate_relative_path, PipelineError, ALLOWED_CONFIG_KEYS},
    execution::{RunOptions, StepPipeline},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SPEC_SCHEME: &str = "spec://";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const RESOURCE_NOT_FOUND: i32 = -32002;

// ---------------------------------------------------------------------------
// JSON-RPC types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ToolContent {
    r#type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ToolCallResult {
    content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl ToolCallResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent { r#type: "text", text }],
            is_error,
        }
    }
}

// ---------------------------------------------------------------------------
// Tool arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct InitializeArgs {
    problem_description: String,
    #[serde(default)]
    template_dir: Option<PathBuf>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateArgs {
    #[serde(default)]
    step: Option<String>,
    #[serde(default)]
    apply: bool,
    #[serde(default)]
    target_dir: Option<PathBuf>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetConfigArgs {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SetConfigArgs {
    key: String,
    value: String,
}

/// Why a tool call produced no result
enum ToolFailure {
    Unknown(String),
    InvalidArguments(String),
    Failed(PipelineError),
}

impl From<PipelineError> for ToolFailure {
    fn from(err: PipelineError) -> Self {
        ToolFailure::Failed(err)
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T, ToolFailure> {
    serde_json::from_value(args).map_err(|e| ToolFailure::InvalidArguments(e.to_string()))
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "initialize_project",
            "description": "Create the .agent directory, generate the step specifications and write config.json",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "problem_description": { "type": "string", "description": "What the project should solve" },
                    "template_dir": { "type": "string", "description": "Directory holding <template>.md guideline files" },
                    "model": { "type": "string" },
                    "force": { "type": "boolean", "description": "Replace an existing project" }
                },
                "required": ["problem_description"]
            }
        },
        {
            "name": "generate_step",
            "description": "Generate the plan for a step, extract its file actions and materialize them; returns the run report",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "step": { "type": "string", "description": "Step id; defaults to the step after current_step" },
                    "apply": { "type": "boolean", "description": "Write missing files instead of listing them for review" },
                    "target_dir": { "type": "string" },
                    "model": { "type": "string" }
                }
            }
        },
        {
            "name": "list_config",
            "description": "Return the project configuration",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "get_config_value",
            "description": "Return one configuration value",
            "inputSchema": {
                "type": "object",
                "properties": { "key": { "type": "string" } },
                "required": ["key"]
            }
        },
        {
            "name": "set_config_value",
            "description": format!("Set a configuration value (allowed: {})", ALLOWED_CONFIG_KEYS.join(", ")),
            "inputSchema": {
                "type": "object",
                "properties": {
                    "key": { "type": "string", "enum": ALLOWED_CONFIG_KEYS },
                    "value": { "type": "string" }
                },
                "required": ["key", "value"]
            }
        }
    ])
}

/// Extract a spec file name from a `spec://` URI
///
/// Only a single plain file name is accepted.
fn spec_file_name(uri: &str) -> Result<&str, String> {
    let name = uri
        .strip_prefix(SPEC_SCHEME)
        .ok_or_else(|| format!("unsupported resource uri: {}", uri))?;
    validate_relative_path(name).map_err(|e| e.to_string())?;

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(format!("invalid spec file name: {}", name)),
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// JSON-RPC front end over one pipeline
pub struct StdioServer<P> {
    pipeline: StepPipeline<P>,
}

impl<P: GenerationProvider> StdioServer<P> {
    pub fn new(pipeline: StepPipeline<P>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &StepPipeline<P> {
        &self.pipeline
    }

    /// Serve requests from stdin until it closes
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        info!(
            "Serving {} over stdio",
            self.pipeline.layout().root().display()
        );

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Answer one input line; `None` for notifications
    ///
    /// A message is a notification only when it has no `id` key at all, so
    /// an explicit `"id": null` still gets a response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let raw = match serde_json::from_str::<Value>(line) {
            Ok(raw) => raw,
            Err(e) => {
                return Some(JsonRpcResponse::err(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {}", e),
                ))
            }
        };

        let has_id = raw.as_object().is_some_and(|o| o.contains_key("id"));
        let id = raw.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(raw) {
            Err(e) => Some(JsonRpcResponse::err(
                id,
                INVALID_REQUEST,
                format!("invalid request: {}", e),
            )),
            Ok(req) if !has_id => {
                debug!("Notification: {}", req.method);
                None
            }
            Ok(req) => Some(self.handle_request(req).await),
        }
    }

    /// Dispatch one request
    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.unwrap_or(Value::Null);
        if req.jsonrpc != "2.0" {
            return JsonRpcResponse::err(id, INVALID_REQUEST, "jsonrpc must be \"2.0\"");
        }
        debug!("Request: {}", req.method);

        match req.method.as_str() {
            "initialize" => JsonRpcResponse::ok(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {}, "resources": {} },
                    "serverInfo": {
                        "name": "stepgen",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),

            "tools/list" => JsonRpcResponse::ok(id, json!({ "tools": tool_definitions() })),

            "tools/call" => {
                let Some(params) = req.params else {
                    return JsonRpcResponse::err(id, INVALID_PARAMS, "missing params");
                };
                let Some(name) = params.get("name").and_then(Value::as_str) else {
                    return JsonRpcResponse::err(id, INVALID_PARAMS, "missing tool name");
                };
                let args = params
                    .get("arguments")
                    .cloned()
                    .filter(|a| !a.is_null())
                    .unwrap_or_else(|| json!({}));

                let result = match self.call_tool(name, args).await {
                    Ok(value) => {
                        let text = serde_json::to_string_pretty(&value).unwrap_or_default();
                        ToolCallResult::text(text, false)
                    }
                    Err(ToolFailure::Unknown(name)) => {
                        return JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown tool: {}", name));
                    }
                    Err(ToolFailure::InvalidArguments(msg)) => {
                        return JsonRpcResponse::err(id, INVALID_PARAMS, format!("invalid arguments: {}", msg));
                    }
                    Err(ToolFailure::Failed(e)) => {
                        warn!("Tool {} failed: {}", name, e);
                        ToolCallResult::text(e.to_string(), true)
                    }
                };

                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::ok(id, value),
                    Err(e) => JsonRpcResponse::err(id, INVALID_REQUEST, e.to_string()),
                }
            }

            "resources/list" => self.list_resources(id),

            "resources/read" => {
                let Some(uri) = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("uri"))
                    .and_then(Value::as_str)
                else {
                    return JsonRpcResponse::err(id, INVALID_PARAMS, "missing uri");
                };
                self.read_resource(id, uri)
            }

            other => JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("method not found: {}", other)),
        }
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<Value, ToolFailure> {
        match name {
            "initialize_project" => {
                let args: InitializeArgs = parse_args(args)?;
                let report = self
                    .pipeline
                    .initialize(
                        &args.problem_description,
                        args.template_dir.as_deref(),
                        args.model.as_deref(),
                        args.force,
                    )
                    .await?;
                Ok(serde_json::to_value(report).map_err(PipelineError::from)?)
            }
            "generate_step" => {
                let args: GenerateArgs = parse_args(args)?;
                let options = RunOptions {
                    auto_apply: args.apply,
                    target_dir: args.target_dir,
                    model: args.model,
                };
                let report = self.pipeline.run_step(args.step.as_deref(), &options).await?;
                Ok(serde_json::to_value(report).map_err(PipelineError::from)?)
            }
            "list_config" => {
                let entries = self.pipeline.config_entries()?;
                Ok(Value::Object(
                    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                ))
            }
            "get_config_value" => {
                let args: GetConfigArgs = parse_args(args)?;
                let value = self
                    .pipeline
                    .config_entries()?
                    .into_iter()
                    .find(|(k, _)| *k == args.key)
                    .map(|(_, v)| v)
                    .ok_or_else(|| ToolFailure::InvalidArguments(format!("unknown config key '{}'", args.key)))?;
                Ok(json!({ "key": args.key, "value": value }))
            }
            "set_config_value" => {
                let args: SetConfigArgs = parse_args(args)?;
                let config = self.pipeline.set_config_value(&args.key, &args.value)?;
                Ok(json!({ "key": args.key, "value": config.get(&args.key) }))
            }
            other => Err(ToolFailure::Unknown(other.to_string())),
        }
    }

    fn list_resources(&self, id: Value) -> JsonRpcResponse {
        let spec_dir = self.pipeline.layout().spec_dir();
        let mut names: Vec<String> = match std::fs::read_dir(&spec_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();

        let resources: Vec<Value> = names
            .iter()
            .map(|name| {
                json!({
                    "uri": format!("{}{}", SPEC_SCHEME, name),
                    "name": name,
                    "mimeType": "text/markdown"
                })
            })
            .collect();
        JsonRpcResponse::ok(id, json!({ "resources": resources }))
    }

    fn read_resource(&self, id: Value, uri: &str) -> JsonRpcResponse {
        let name = match spec_file_name(uri) {
            Ok(name) => name,
            Err(msg) => return JsonRpcResponse::err(id, INVALID_PARAMS, msg),
        };

        let spec_dir = self.pipeline.layout().spec_dir();
        if !spec_dir.is_dir() {
            return JsonRpcResponse::err(
                id,
                RESOURCE_NOT_FOUND,
                format!("project not initialized: {} not found", spec_dir.display()),
            );
        }

        match std::fs::read_to_string(spec_dir.join(name)) {
            Ok(text) => JsonRpcResponse::ok(
                id,
                json!({
                    "contents": [{ "uri": uri, "mimeType": "text/markdown", "text": text }]
                }),
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                JsonRpcResponse::err(id, RESOURCE_NOT_FOUND, format!("spec file '{}' not found", name))
            }
            Err(e) => JsonRpcResponse::err(id, RESOURCE_NOT_FOUND, format!("error reading '{}': {}", name, e)),
        }
    }
}
