use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

use crate::protocol::JsonRpcResponse;
use crate::wire::{checked_body_len, read_body, read_bounded_line, FrameError, MAX_HEADER_LINE};

const MAX_HEADERS: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Parses one request. `Ok(None)` when the peer closed without sending
    /// anything. The body length is checked against `limit` before reading.
    pub fn read_from<R: BufRead>(reader: &mut R, limit: usize) -> Result<Option<Self>, FrameError> {
        let mut line = String::new();
        if !read_bounded_line(reader, &mut line, MAX_HEADER_LINE)? {
            return Ok(None);
        }
        let request_line = line.trim_end_matches(['\r', '\n']).to_string();
        if request_line.is_empty() {
            return Ok(None);
        }
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
            return Err(FrameError::Malformed("request line needs a method and a path"));
        };
        let path = target.split_once('?').map_or(target, |(path, _)| path);

        let mut body_len = 0;
        let mut headers = 0;
        loop {
            if !read_bounded_line(reader, &mut line, MAX_HEADER_LINE)? {
                break;
            }
            let header = line.trim_end_matches(['\r', '\n']);
            if header.is_empty() {
                break;
            }
            headers += 1;
            if headers > MAX_HEADERS {
                return Err(FrameError::Malformed("too many headers"));
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    body_len = checked_body_len(value, limit)?;
                }
            }
        }

        Ok(Some(Self {
            method: method.to_string(),
            path: path.to_string(),
            body: read_body(reader, body_len)?,
        }))
    }
}

pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            body: serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec()),
        }
    }

    pub fn rpc(status: u16, response: &JsonRpcResponse) -> Self {
        Self {
            status,
            body: serde_json::to_vec(response).unwrap_or_else(|_| b"{}".to_vec()),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// `{"error": code, "message": ...}` body used by every non-JSON-RPC failure.
    pub fn failure(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self::json(status, json!({"error": code, "message": message.into()}))
    }

    /// Maps a request that could not be read to the reply sent before closing.
    pub fn for_frame_error(err: &FrameError) -> Option<Self> {
        match err {
            FrameError::TooLarge { .. } => {
                Some(Self::failure(413, "payload_too_large", err.to_string()))
            }
            FrameError::Malformed(reason) => Some(Self::failure(400, "invalid_request", *reason)),
            FrameError::Io(_) if err.is_timeout() => Some(Self::failure(
                408,
                "request_timeout",
                "request not received in time",
            )),
            FrameError::Io(_) => None,
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(
            out,
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            reason_phrase(self.status),
            self.body.len()
        )?;
        out.write_all(&self.body)?;
        out.flush()
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}
