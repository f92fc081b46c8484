use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const SHIPPED_MODEL: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../models/linear_regression_model.json"
);

fn reserve_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("reserve addr");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr.to_string()
}

fn wait_for_http(addr: &str) {
    for _ in 0..80 {
        if TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    panic!("http server not ready on {addr}");
}

fn send_http(addr: &str, method: &str, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect http");
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).expect("write request");
    stream.flush().expect("flush");
    let mut buf = String::new();
    stream.read_to_string(&mut buf).expect("read response");
    buf
}

fn response_body(response: &str) -> &str {
    response.split("\r\n\r\n").nth(1).unwrap_or("")
}

fn spawn_http(addr: &str, model: &str, lazy: bool) -> Child {
    spawn_http_with_timeout(addr, model, lazy, 5_000)
}

fn spawn_http_with_timeout(addr: &str, model: &str, lazy: bool, timeout_ms: u64) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_perf-indexd"))
        .env("PERF_INDEXD_TRANSPORT", "http")
        .env("PERF_INDEX_HTTP_ADDR", addr)
        .env("PERF_INDEX_MODEL", model)
        .env("PERF_INDEX_LAZY_LOAD", if lazy { "1" } else { "0" })
        .env("PERF_INDEX_HTTP_TIMEOUT_MS", timeout_ms.to_string())
        .env("PERF_INDEX_LOG", "off")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn perf-indexd");
    wait_for_http(addr);
    child
}

#[test]
fn http_health_predict_and_metrics_work() {
    let addr = reserve_addr();
    let mut child = spawn_http(&addr, SHIPPED_MODEL, false);

    let health = send_http(&addr, "GET", "/health", "");
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(response_body(&health).contains("\"model\":\"ready\""));

    let predict = send_http(
        &addr,
        "POST",
        "/predict",
        r#"{"hours_studied":2.0,"previous_scores":45,"extracurricular":false,"sleep_hours":4.5,"sample_papers":1}"#,
    );
    assert!(predict.starts_with("HTTP/1.1 200"));
    let body: serde_json::Value =
        serde_json::from_str(response_body(&predict)).expect("predict json");
    assert_eq!(body["score"], 20);
    assert_eq!(body["tier"], "NeedsImprovement");
    assert_eq!(body["tips"].as_array().map(Vec::len), Some(4));

    let invalid = send_http(&addr, "POST", "/predict", r#"{"sleep_hours":30}"#);
    assert!(invalid.starts_with("HTTP/1.1 400"));

    let rpc = send_http(
        &addr,
        "POST",
        "/mcp",
        r#"{"jsonrpc":"2.0","id":1,"method":"ping","params":{}}"#,
    );
    assert!(rpc.starts_with("HTTP/1.1 200"));
    assert!(response_body(&rpc).contains("\"result\":{}"));

    let metrics = send_http(&addr, "GET", "/metrics/summary", "");
    let metrics: serde_json::Value =
        serde_json::from_str(response_body(&metrics)).expect("metrics json");
    assert_eq!(metrics["predictions"], 1);
    assert_eq!(metrics["by_tier"]["NeedsImprovement"], 1);
    assert_eq!(metrics["invalid_requests"], 1);

    let missing = send_http(&addr, "GET", "/nope", "");
    assert!(missing.starts_with("HTTP/1.1 404"));

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn http_reports_unavailable_model() {
    let addr = reserve_addr();
    let missing = std::env::temp_dir()
        .join(format!("perf-index-http-missing-{}.json", std::process::id()))
        .display()
        .to_string();
    let mut child = spawn_http(&addr, &missing, true);

    let health = send_http(&addr, "GET", "/health", "");
    assert!(response_body(&health).contains("\"model\":\"pending\""));

    let predict = send_http(&addr, "POST", "/predict", "{}");
    assert!(predict.starts_with("HTTP/1.1 503"));
    let body = response_body(&predict);
    assert!(body.contains("\"error\":\"model_unavailable\""));
    assert!(!body.contains("\"score\""));

    let health = send_http(&addr, "GET", "/health", "");
    assert!(response_body(&health).contains("\"model\":\"unavailable\""));

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn oversized_content_length_gets_413_and_server_survives() {
    let addr = reserve_addr();
    let mut child = spawn_http(&addr, SHIPPED_MODEL, false);

    let mut stream = TcpStream::connect(&addr).expect("connect http");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("client timeout");
    stream
        .write_all(
            b"POST /predict HTTP/1.1\r\nHost: x\r\nContent-Length: 18446744073709551615\r\n\r\n",
        )
        .expect("write request");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    assert!(response.starts_with("HTTP/1.1 413"), "{response}");
    assert!(response_body(&response).contains("\"error\":\"payload_too_large\""));

    let health = send_http(&addr, "GET", "/health", "");
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(child.try_wait().expect("poll child").is_none());

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn stalled_clients_do_not_block_other_requests() {
    let addr = reserve_addr();
    let mut child = spawn_http_with_timeout(&addr, SHIPPED_MODEL, false, 30_000);

    let _idle = TcpStream::connect(&addr).expect("connect idle client");
    let mut short = TcpStream::connect(&addr).expect("connect short-body client");
    short
        .write_all(b"POST /predict HTTP/1.1\r\nContent-Length: 100\r\n\r\n{}")
        .expect("write partial request");

    let start = Instant::now();
    let health = send_http(&addr, "GET", "/health", "");
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(start.elapsed() < Duration::from_secs(5));

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn idle_connection_times_out_with_408() {
    let addr = reserve_addr();
    let mut child = spawn_http_with_timeout(&addr, SHIPPED_MODEL, false, 200);

    let mut idle = TcpStream::connect(&addr).expect("connect idle client");
    idle.set_read_timeout(Some(Duration::from_secs(5)))
        .expect("client timeout");
    let mut response = String::new();
    idle.read_to_string(&mut response).expect("read timeout reply");
    assert!(response.starts_with("HTTP/1.1 408"), "{response}");

    let health = send_http(&addr, "GET", "/health", "");
    assert!(health.starts_with("HTTP/1.1 200"));

    let _ = child.kill();
    let _ = child.wait();
}
