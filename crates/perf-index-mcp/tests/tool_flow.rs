use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use perf_index_core::{LinearModel, Scorer};
use perf_index_mcp::protocol::{JsonRpcRequest, JsonRpcResponse, MODEL_UNAVAILABLE};
use perf_index_mcp::{PerfIndexServer, ServerConfig};
use serde_json::{json, Value};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(1);

fn temp_model_path() -> std::path::PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    std::env::temp_dir().join(format!("perf-index-tool-{pid}-{now}-{seq}.json"))
}

fn reference_server() -> PerfIndexServer {
    let model = LinearModel::new(vec![2.0, 0.5, 1.0, 0.3, 1.5], 10.0).expect("valid model");
    PerfIndexServer::with_scorer(Scorer::new(model))
}

fn call(server: &PerfIndexServer, id: u64, method: &str, params: Value) -> JsonRpcResponse {
    server
        .handle_request(JsonRpcRequest::call(json!(id), method, params))
        .expect("response")
}

fn predict(server: &PerfIndexServer, arguments: Value) -> JsonRpcResponse {
    call(
        server,
        7,
        "tools/call",
        json!({"name": "predict_performance", "arguments": arguments}),
    )
}

#[test]
fn reference_example_predicts_good_and_balanced() {
    let server = reference_server();
    let response = predict(
        &server,
        json!({
            "hours_studied": 5.0,
            "previous_scores": 75,
            "extracurricular": true,
            "sleep_hours": 7.0,
            "sample_papers": 5
        }),
    );
    let result = response.result.expect("predict result");
    let out = &result["structuredContent"];
    assert_eq!(out["score"], 68);
    assert_eq!(out["tier"], "Good");
    assert_eq!(out["balanced"], true);
    assert_eq!(out["tips"], json!([]));
    let raw = out["raw_score"].as_f64().expect("raw score");
    assert!((raw - 68.1).abs() < 1e-9);

    let text = result["content"][0]["text"].as_str().expect("report text");
    assert!(text.contains("68 / 100"));
    assert!(text.contains("Balanced inputs"));
}

#[test]
fn struggling_student_gets_all_tips_in_order() {
    let server = reference_server();
    let response = predict(
        &server,
        json!({
            "hours_studied": 3.0,
            "previous_scores": 50,
            "extracurricular": "No",
            "sleep_hours": 5.0,
            "sample_papers": 1
        }),
    );
    let result = response.result.expect("predict result");
    let tips = result["structuredContent"]["tips"]
        .as_array()
        .expect("tips array")
        .iter()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>();
    assert_eq!(
        tips,
        vec![
            "Increase study hours to 4-6 per day for better coverage.",
            "Aim for 7-8 hours of sleep to improve focus and memory.",
            "Practice more full-length sample papers to build exam stamina.",
            "Review foundational topics and revise regularly.",
        ]
    );
    // 10 + 6 + 25 + 0 + 1.5 + 1.5 = 44
    assert_eq!(result["structuredContent"]["score"], 44);
    assert_eq!(result["structuredContent"]["tier"], "NeedsImprovement");
}

#[test]
fn missing_model_never_returns_a_score() {
    let server = PerfIndexServer::with_model_path(temp_model_path());
    for id in 0..3 {
        let response = call(
            &server,
            id,
            "tools/call",
            json!({"name": "predict_performance", "arguments": {}}),
        );
        assert!(response.result.is_none());
        assert_eq!(response.error_code(), Some(MODEL_UNAVAILABLE));
        let message = &response.error.as_ref().expect("error").message;
        assert!(message.starts_with("Model not found"));
    }

    let status = call(
        &server,
        9,
        "tools/call",
        json!({"name": "model_status", "arguments": {}}),
    );
    let status = status.result.expect("status result");
    assert_eq!(status["structuredContent"]["available"], false);
}

#[test]
fn lazy_config_loads_on_first_prediction() {
    let path = temp_model_path();
    std::fs::write(
        &path,
        r#"{"coef":[2,0.5,1,0.3,1.5],"intercept":10,"feature_names":["hours_studied","previous_scores","extracurricular","sleep_hours","sample_papers"]}"#,
    )
    .expect("write model");
    let config = ServerConfig {
        model_path: path.clone(),
        lazy_load: true,
        ..ServerConfig::default()
    };
    let server = PerfIndexServer::new(&config);
    let response = predict(&server, json!({}));
    assert_eq!(response.result.expect("result")["structuredContent"]["score"], 68);

    let status = call(
        &server,
        2,
        "tools/call",
        json!({"name": "model_status"}),
    )
    .result
    .expect("status");
    assert_eq!(status["structuredContent"]["coefficients"]["previous_scores"], 0.5);
    assert_eq!(status["structuredContent"]["intercept"], 10.0);
    let _ = std::fs::remove_file(path);
}

#[test]
fn invalid_inputs_are_params_errors() {
    let server = reference_server();
    let response = predict(&server, json!({"hours_studied": 12.5}));
    assert_eq!(response.error_code(), Some(-32602));

    let response = call(&server, 3, "tools/call", json!({"name": "no_such_tool"}));
    assert_eq!(response.error_code(), Some(-32601));
}

#[test]
fn lists_tools_and_guide_resources() {
    let server = reference_server();
    let tools = call(&server, 1, "tools/list", json!({})).result.expect("tools");
    let names = tools["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["predict_performance", "describe_features", "model_status"]
    );
    let schema = &tools["tools"][0]["inputSchema"]["properties"];
    assert_eq!(schema["sample_papers"]["maximum"], 20.0);

    let resources = call(&server, 2, "resources/list", json!({}))
        .result
        .expect("resources");
    assert_eq!(resources["resources"].as_array().map(Vec::len), Some(2));

    let about = call(
        &server,
        3,
        "resources/read",
        json!({"uri": "perf-index://guide/about.md"}),
    )
    .result
    .expect("about");
    let text = about["contents"][0]["text"].as_str().expect("about text");
    assert!(text.contains("Multiple Linear Regression"));

    let missing = call(
        &server,
        4,
        "resources/read",
        json!({"uri": "perf-index://guide/missing.md"}),
    );
    assert_eq!(missing.error_code(), Some(-32602));
}

#[test]
fn describe_features_returns_form_in_display_order() {
    let server = reference_server();
    let result = call(
        &server,
        1,
        "tools/call",
        json!({"name": "describe_features"}),
    )
    .result
    .expect("fields");
    let fields = result["structuredContent"]["fields"]
        .as_array()
        .expect("fields array");
    let keys = fields
        .iter()
        .filter_map(|f| f["key"].as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        keys,
        vec![
            "hours_studied",
            "previous_scores",
            "sample_papers",
            "sleep_hours",
            "extracurricular"
        ]
    );
    assert_eq!(fields[0]["control"]["step"], 0.5);
    assert_eq!(fields[4]["control"]["default"], "Yes");
}

#[test]
fn protocol_edges() {
    let server = reference_server();

    let init = call(&server, 1, "initialize", json!({"protocolVersion": "2025-03-26"}));
    let init = init.result.expect("initialize");
    assert_eq!(init["protocolVersion"], "2025-03-26");
    assert_eq!(init["serverInfo"]["name"], "perf-index-mcp");

    let notification = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: None,
        method: "notifications/initialized".to_string(),
        params: Value::Null,
    };
    assert!(server.handle_request(notification).is_none());

    let bad_version = JsonRpcRequest {
        jsonrpc: "1.0".to_string(),
        id: Some(json!(5)),
        method: "ping".to_string(),
        params: Value::Null,
    };
    let response = server.handle_request(bad_version).expect("response");
    assert_eq!(response.error_code(), Some(-32600));

    let unknown = call(&server, 6, "prompts/list", json!({}));
    assert_eq!(unknown.error_code(), Some(-32601));
}
