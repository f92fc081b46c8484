use std::io::{self, BufReader};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use perf_index_core::{Feature, FeatureVector, ModelState, Scorer, Tier};
use perf_index_guide::{
    default_features, form_fields, resource_text as guide_resource_text,
    resources as guide_resources, FieldKind, MODEL_MISSING_MESSAGE,
};
use perf_index_model::{load_scorer, LazyScorer};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{ServerConfig, DEFAULT_HTTP_TIMEOUT};
use crate::http::{HttpRequest, HttpResponse};
use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    MODEL_UNAVAILABLE, PARSE_ERROR,
};
use crate::render::{prediction_json, render_report};
use crate::wire::{read_stdio_frame, write_stdio_frame, FrameError, Framing, MAX_BODY_BYTES};

const DEFAULT_MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub struct PerfIndexServer {
    scorer: LazyScorer,
    stats: Mutex<ServeStats>,
    io_timeout: Duration,
}

#[derive(Debug, Default, Clone)]
struct ServeStats {
    excellent: u64,
    good: u64,
    needs_improvement: u64,
    unavailable: u64,
    invalid: u64,
}

impl ServeStats {
    fn record_tier(&mut self, tier: Tier) {
        match tier {
            Tier::Excellent => self.excellent += 1,
            Tier::Good => self.good += 1,
            Tier::NeedsImprovement => self.needs_improvement += 1,
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "predictions": self.excellent + self.good + self.needs_improvement,
            "by_tier": {
                "Excellent": self.excellent,
                "Good": self.good,
                "NeedsImprovement": self.needs_improvement
            },
            "model_unavailable": self.unavailable,
            "invalid_requests": self.invalid
        })
    }
}

/// Why a prediction request produced no score.
enum PredictError {
    Invalid(String),
    Unavailable(String),
}

impl PerfIndexServer {
    pub fn new(config: &ServerConfig) -> Self {
        let scorer = if config.lazy_load {
            LazyScorer::from_path(config.model_path.clone())
        } else {
            LazyScorer::ready(
                config.model_path.display().to_string(),
                load_scorer(&config.model_path),
            )
        };
        Self::with_lazy_scorer(scorer).with_io_timeout(config.http_timeout)
    }

    pub fn with_model_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let scorer = load_scorer(&path);
        Self::with_lazy_scorer(LazyScorer::ready(path.display().to_string(), scorer))
    }

    pub fn with_scorer(scorer: Scorer) -> Self {
        Self::with_lazy_scorer(LazyScorer::ready("inline", scorer))
    }

    pub fn with_lazy_scorer(scorer: LazyScorer) -> Self {
        Self {
            scorer,
            stats: Mutex::new(ServeStats::default()),
            io_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Read and write deadline applied to every HTTP connection.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "notification ignored");
            return None;
        };

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
                        "serverInfo": {"name": "perf-index-mcp", "version": env!("CARGO_PKG_VERSION")},
                        "capabilities": {
                            "tools": {"listChanged": false},
                            "resources": {"subscribe": false, "listChanged": false}
                        }
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, tools_list_result()),
            "tools/call" => self.handle_tools_call(id, request.params),
            "resources/list" => JsonRpcResponse::success(id, resources_list_result()),
            "resources/read" => handle_resources_read(id, request.params),
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

        let start = Instant::now();
        let response = match parsed.name.as_str() {
            "predict_performance" => self.exec_predict(id, parsed.arguments),
            "describe_features" => exec_describe_features(id),
            "model_status" => self.exec_model_status(id),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "unknown tool"),
        };
        tracing::debug!(
            tool = %parsed.name,
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            is_error = response.error.is_some(),
            "tool call handled"
        );
        response
    }

    fn exec_predict(&self, id: Value, arguments: Option<Value>) -> JsonRpcResponse {
        match self.predict_value(arguments.unwrap_or(Value::Null)) {
            Ok((structured, report)) => JsonRpcResponse::success(
                id,
                json!({
                    "structuredContent": structured,
                    "content": [{"type": "text", "text": report}]
                }),
            ),
            Err(PredictError::Invalid(message)) => {
                JsonRpcResponse::error(id, INVALID_PARAMS, message)
            }
            Err(PredictError::Unavailable(reason)) => JsonRpcResponse::error_with_data(
                id,
                MODEL_UNAVAILABLE,
                MODEL_MISSING_MESSAGE,
                Some(json!({"reason": reason})),
            ),
        }
    }

    /// Shared by the `predict_performance` tool and `POST /predict`.
    fn predict_value(&self, arguments: Value) -> Result<(Value, String), PredictError> {
        let features = match parse_features(arguments) {
            Ok(v) => v,
            Err(message) => {
                self.stats.lock().invalid += 1;
                return Err(PredictError::Invalid(message));
            }
        };

        match self.scorer.get().evaluate(&features) {
            Ok(result) => {
                self.stats.lock().record_tier(result.tier);
                Ok((
                    prediction_json(&features, &result),
                    render_report(&features, &result),
                ))
            }
            Err(err) => {
                self.stats.lock().unavailable += 1;
                tracing::warn!(error = %err, "prediction requested without a model");
                Err(PredictError::Unavailable(err.reason))
            }
        }
    }

    fn exec_model_status(&self, id: Value) -> JsonRpcResponse {
        let status = self.model_status_json();
        let text = if status["available"].as_bool().unwrap_or(false) {
            "model ready"
        } else {
            "model unavailable"
        };
        JsonRpcResponse::success(
            id,
            json!({
                "structuredContent": status,
                "content": [{"type": "text", "text": text}]
            }),
        )
    }

    fn model_status_json(&self) -> Value {
        let source = self.scorer.source().to_string();
        match self.scorer.get().state() {
            ModelState::Ready(model) => {
                let coefficients = Feature::ALL
                    .iter()
                    .zip(model.weights())
                    .map(|(feature, weight)| (feature.key().to_string(), json!(weight)))
                    .collect::<serde_json::Map<_, _>>();
                json!({
                    "available": true,
                    "source": source,
                    "coefficients": coefficients,
                    "intercept": model.intercept()
                })
            }
            ModelState::Unavailable { reason } => json!({
                "available": false,
                "source": source,
                "reason": reason
            }),
        }
    }

    fn model_health(&self) -> &'static str {
        if !self.scorer.is_loaded() {
            "pending"
        } else if self.scorer.get().is_available() {
            "ready"
        } else {
            "unavailable"
        }
    }

    pub fn serve_stdio(&self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut reader = BufReader::new(stdin.lock());
        let mut stdout = io::stdout().lock();

        loop {
            let frame = match read_stdio_frame(&mut reader, MAX_BODY_BYTES) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(FrameError::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::warn!(error = %err, "stdin closed inside a frame");
                    write_stdio_frame(&mut stdout, &frame_error_response(&err), Framing::Line)?;
                    break;
                }
                Err(FrameError::Io(err)) if err.kind() == io::ErrorKind::InvalidData => {
                    write_stdio_frame(&mut stdout, &frame_error_response(&err), Framing::Line)?;
                    continue;
                }
                Err(FrameError::Io(err)) => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, "stdio frame rejected");
                    write_stdio_frame(&mut stdout, &frame_error_response(&err), Framing::Line)?;
                    continue;
                }
            };

            let request: JsonRpcRequest = match serde_json::from_slice(&frame.payload) {
                Ok(v) => v,
                Err(err) => {
                    let response =
                        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {err}"));
                    write_stdio_frame(&mut stdout, &response, frame.framing)?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(request) {
                write_stdio_frame(&mut stdout, &response, frame.framing)?;
            }
        }

        Ok(())
    }

    /// Serves each connection on its own scoped thread so a slow client does
    /// not hold up the others.
    pub fn serve_http(&self, addr: &str) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        tracing::info!(
            addr = %listener.local_addr()?,
            timeout = ?self.io_timeout,
            "perf-index http listening"
        );
        thread::scope(|scope| {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(err) => {
                        tracing::error!(error = %err, "http accept error");
                        continue;
                    }
                };
                let spawned = thread::Builder::new()
                    .name("perf-index-http".to_string())
                    .spawn_scoped(scope, move || {
                        let peer = stream.peer_addr().ok();
                        if let Err(err) = self.handle_http_connection(stream) {
                            tracing::warn!(error = %err, ?peer, "http connection failed");
                        }
                    });
                if let Err(err) = spawned {
                    tracing::error!(error = %err, "could not start http connection thread");
                }
            }
        });
        Ok(())
    }

    fn handle_http_connection(&self, stream: TcpStream) -> io::Result<()> {
        stream.set_read_timeout(Some(self.io_timeout))?;
        stream.set_write_timeout(Some(self.io_timeout))?;

        let mut reader = BufReader::new(&stream);
        let response = match HttpRequest::read_from(&mut reader, MAX_BODY_BYTES) {
            Ok(Some(req)) => self.dispatch_http_request(&req),
            Ok(None) => return Ok(()),
            Err(err) => {
                let Some(response) = HttpResponse::for_frame_error(&err) else {
                    return match err {
                        FrameError::Io(err) => Err(err),
                        _ => Ok(()),
                    };
                };
                if err.is_timeout() {
                    tracing::warn!(timeout = ?self.io_timeout, "http request timed out");
                } else {
                    self.stats.lock().invalid += 1;
                    tracing::warn!(error = %err, status = response.status, "http request rejected");
                }
                response
            }
        };
        response.write_to(&mut &stream)
    }

    fn dispatch_http_request(&self, req: &HttpRequest) -> HttpResponse {
        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/health") => {
                HttpResponse::json(200, json!({"status": "ok", "model": self.model_health()}))
            }
            ("GET", "/metrics/summary") => HttpResponse::json(200, self.stats.lock().to_json()),
            ("POST", "/mcp") => {
                let rpc: JsonRpcRequest = match serde_json::from_slice(&req.body) {
                    Ok(v) => v,
                    Err(err) => {
                        let response = JsonRpcResponse::error(
                            Value::Null,
                            PARSE_ERROR,
                            format!("parse error: {err}"),
                        );
                        return HttpResponse::rpc(400, &response);
                    }
                };
                match self.handle_request(rpc) {
                    Some(response) => HttpResponse::rpc(200, &response),
                    None => HttpResponse::empty(202),
                }
            }
            ("POST", "/predict") => {
                let body = if req.body.is_empty() {
                    Ok(Value::Null)
                } else {
                    serde_json::from_slice::<Value>(&req.body)
                };
                let arguments = match body {
                    Ok(v) => v,
                    Err(err) => {
                        self.stats.lock().invalid += 1;
                        return HttpResponse::failure(
                            400,
                            "invalid_request",
                            format!("parse error: {err}"),
                        );
                    }
                };
                match self.predict_value(arguments) {
                    Ok((structured, _)) => HttpResponse::json(200, structured),
                    Err(PredictError::Invalid(message)) => {
                        HttpResponse::failure(400, "invalid_request", message)
                    }
                    Err(PredictError::Unavailable(reason)) => HttpResponse::json(
                        503,
                        json!({
                            "error": "model_unavailable",
                            "message": MODEL_MISSING_MESSAGE,
                            "reason": reason
                        }),
                    ),
                }
            }
            (_, "/health" | "/metrics/summary" | "/mcp" | "/predict") => HttpResponse::failure(
                405,
                "method_not_allowed",
                format!("{} not allowed", req.method),
            ),
            _ => HttpResponse::failure(404, "not_found", format!("no route for {}", req.path)),
        }
    }
}

fn tools_list_result() -> Value {
    let properties = form_fields()
        .iter()
        .map(|field| {
            let schema = match field.kind {
                FieldKind::Slider { min, max, .. } => {
                    let kind = if matches!(
                        field.feature,
                        Feature::PreviousScores | Feature::SamplePapers
                    ) {
                        "integer"
                    } else {
                        "number"
                    };
                    json!({"type": kind, "minimum": min, "maximum": max, "description": field.help})
                }
                FieldKind::Choice { options, .. } => json!({
                    "oneOf": [{"type": "boolean"}, {"type": "string", "enum": options}],
                    "description": field.help
                }),
            };
            (field.feature.key().to_string(), schema)
        })
        .collect::<serde_json::Map<_, _>>();

    json!({
        "tools": [
            {
                "name": "predict_performance",
                "description": "Predict a student's Performance Index (10-100) with tier and study advice. Omitted inputs use the form defaults.",
                "inputSchema": {
                    "type": "object",
                    "properties": properties
                }
            },
            {
                "name": "describe_features",
                "description": "List the prediction form inputs with labels, help text, bounds and defaults.",
                "inputSchema": {"type": "object", "properties": {}}
            },
            {
                "name": "model_status",
                "description": "Report whether the fitted model is loaded and its coefficients.",
                "inputSchema": {"type": "object", "properties": {}}
            }
        ]
    })
}

fn exec_describe_features(id: Value) -> JsonRpcResponse {
    let fields = form_fields()
        .iter()
        .map(|field| {
            let control = match field.kind {
                FieldKind::Slider {
                    min,
                    max,
                    default,
                    step,
                } => json!({"kind": "slider", "min": min, "max": max, "default": default, "step": step}),
                FieldKind::Choice { options, default } => {
                    json!({"kind": "choice", "options": options, "default": default})
                }
            };
            json!({
                "key": field.feature.key(),
                "label": field.label,
                "help": field.help,
                "control": control
            })
        })
        .collect::<Vec<_>>();
    let summary = format!("{} form fields", fields.len());

    JsonRpcResponse::success(
        id,
        json!({
            "structuredContent": {"fields": fields},
            "content": [{"type": "text", "text": summary}]
        }),
    )
}

fn resources_list_result() -> Value {
    let resources = guide_resources()
        .iter()
        .map(|resource| {
            json!({
                "uri": resource.uri,
                "name": resource.name,
                "description": resource.description,
                "mimeType": resource.mime_type
            })
        })
        .collect::<Vec<_>>();
    json!({ "resources": resources })
}

fn handle_resources_read(id: Value, params: Value) -> JsonRpcResponse {
    let parsed: ResourceReadParams = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(err) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
        }
    };

    let Some(text) = guide_resource_text(&parsed.uri) else {
        return JsonRpcResponse::error(id, INVALID_PARAMS, "unknown resource uri");
    };

    JsonRpcResponse::success(
        id,
        json!({
            "contents": [{
                "uri": parsed.uri,
                "mimeType": "text/markdown",
                "text": text
            }]
        }),
    )
}

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PredictInput {
    hours_studied: Option<f64>,
    previous_scores: Option<u32>,
    extracurricular: Option<ChoiceValue>,
    sleep_hours: Option<f64>,
    sample_papers: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChoiceValue {
    Flag(bool),
    Label(String),
}

impl ChoiceValue {
    fn as_flag(&self) -> Result<bool, String> {
        match self {
            Self::Flag(flag) => Ok(*flag),
            Self::Label(label) => match label.trim().to_ascii_lowercase().as_str() {
                "yes" => Ok(true),
                "no" => Ok(false),
                _ => Err(format!(
                    "extracurricular must be true, false, \"Yes\" or \"No\", got \"{label}\""
                )),
            },
        }
    }
}

/// Fills omitted inputs from the form defaults and enforces the form bounds.
fn parse_features(arguments: Value) -> Result<FeatureVector, String> {
    let input: PredictInput = if arguments.is_null() {
        PredictInput::default()
    } else {
        serde_json::from_value(arguments).map_err(|err| format!("invalid tool arguments: {err}"))?
    };

    let defaults = default_features();
    let extracurricular = match &input.extracurricular {
        Some(choice) => choice.as_flag()?,
        None => defaults.extracurricular,
    };
    let features = FeatureVector::new(
        input.hours_studied.unwrap_or(defaults.hours_studied),
        input.previous_scores.unwrap_or(defaults.previous_scores),
        extracurricular,
        input.sleep_hours.unwrap_or(defaults.sleep_hours),
        input.sample_papers.unwrap_or(defaults.sample_papers),
    );

    for field in form_fields() {
        let value = features.value(field.feature);
        if !field.contains(value) {
            if let FieldKind::Slider { min, max, .. } = field.kind {
                return Err(format!(
                    "{} must be within {min}..={max}, got {value}",
                    field.feature.key()
                ));
            }
        }
    }
    Ok(features)
}

fn frame_error_response(err: &dyn std::fmt::Display) -> JsonRpcResponse {
    JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("invalid stdio frame: {err}"))
}
