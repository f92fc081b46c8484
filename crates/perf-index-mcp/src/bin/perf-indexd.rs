use std::io;

use perf_index_mcp::config::DEFAULT_LOG_FILTER;
use perf_index_mcp::{PerfIndexServer, ServerConfig, Transport};

fn main() -> io::Result<()> {
    // stdout carries the stdio transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("PERF_INDEX_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        )
        .with_writer(io::stderr)
        .init();

    let config = ServerConfig::from_env()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?config.transport,
        model = %config.model_path.display(),
        lazy = config.lazy_load,
        "perf-indexd starting"
    );

    let server = PerfIndexServer::new(&config);
    match config.transport {
        Transport::Stdio => server.serve_stdio(),
        Transport::Http => server.serve_http(&config.http_addr),
    }
}
