pub mod config;
pub mod http;
pub mod protocol;
pub mod render;
pub mod server;
pub mod wire;

pub use config::{ConfigError, ServerConfig, Transport};
pub use server::PerfIndexServer;
