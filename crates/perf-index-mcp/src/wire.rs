use std::io::{self, BufRead, Read, Write};

use thiserror::Error;

use crate::protocol::JsonRpcResponse;

/// Largest message body either transport will buffer.
pub const MAX_BODY_BYTES: usize = 1 << 20;
/// Longest single header or request line accepted before the body.
pub const MAX_HEADER_LINE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
    #[error("declared body of {declared} bytes exceeds the limit of {limit} bytes")]
    TooLarge { declared: u64, limit: usize },
}

impl FrameError {
    /// Socket read/write deadline expired (`WouldBlock` on unix, `TimedOut` on windows).
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
        )
    }
}

/// Reads one `\n`-terminated line of at most `max` bytes into `buf`.
/// Returns `Ok(false)` at end of input. An over-long line is skipped up to its
/// terminator so the next read starts on a fresh line.
pub fn read_bounded_line<R: BufRead>(
    reader: &mut R,
    buf: &mut String,
    max: usize,
) -> Result<bool, FrameError> {
    buf.clear();
    let read = reader.by_ref().take(max as u64 + 1).read_line(buf)?;
    if read == 0 {
        return Ok(false);
    }
    if buf.len() > max && !buf.ends_with('\n') {
        discard_line(reader)?;
        return Err(FrameError::TooLarge {
            declared: buf.len() as u64,
            limit: max,
        });
    }
    Ok(true)
}

fn discard_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let chunk = reader.fill_buf()?;
        if chunk.is_empty() {
            return Ok(());
        }
        if let Some(pos) = chunk.iter().position(|b| *b == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = chunk.len();
        reader.consume(len);
    }
}

/// Parses a `Content-Length` value and checks it against `limit` before any
/// buffer is sized from it.
pub fn checked_body_len(raw: &str, limit: usize) -> Result<usize, FrameError> {
    let declared = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| FrameError::Malformed("content-length is not a byte count"))?;
    if declared > limit as u64 {
        return Err(FrameError::TooLarge { declared, limit });
    }
    usize::try_from(declared).map_err(|_| FrameError::TooLarge { declared, limit })
}

pub fn read_body<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError> {
    let mut body = vec![0_u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// How a stdio message arrived; the reply uses the same framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Line,
    ContentLength,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    pub payload: Vec<u8>,
    pub framing: Framing,
}

fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    key.trim().eq_ignore_ascii_case(name).then_some(value)
}

fn is_header_line(line: &str) -> bool {
    header_value(line, "content-length").is_some() || header_value(line, "content-type").is_some()
}

/// Consumes the remaining header lines of a stdio frame and returns the body
/// length. `first_line` is the header line already read.
pub fn read_stdio_content_length<R: BufRead>(
    reader: &mut R,
    first_line: &str,
    limit: usize,
) -> Result<usize, FrameError> {
    let mut declared = header_value(first_line, "content-length").map(str::to_string);
    let mut line = String::new();
    loop {
        if !read_bounded_line(reader, &mut line, MAX_HEADER_LINE)? {
            return Err(FrameError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "eof inside frame headers",
            )));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = header_value(trimmed, "content-length") {
            declared = Some(value.to_string());
        }
    }
    let Some(raw) = declared else {
        return Err(FrameError::Malformed("missing content-length header"));
    };
    checked_body_len(&raw, limit)
}

/// Next message from a stdio stream, either one JSON line or a
/// `Content-Length` framed body. `Ok(None)` at end of input.
///
/// An oversized framed body is drained from the stream before the error is
/// returned, so the following frame still parses.
pub fn read_stdio_frame<R: BufRead>(
    reader: &mut R,
    limit: usize,
) -> Result<Option<Frame>, FrameError> {
    let mut line = String::new();
    loop {
        if !read_bounded_line(reader, &mut line, limit)? {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).trim_start();
        if trimmed.is_empty() {
            continue;
        }
        if !is_header_line(trimmed) {
            return Ok(Some(Frame {
                payload: trimmed.as_bytes().to_vec(),
                framing: Framing::Line,
            }));
        }

        let first = trimmed.to_string();
        let len = match read_stdio_content_length(reader, &first, limit) {
            Ok(len) => len,
            Err(FrameError::TooLarge { declared, limit }) => {
                io::copy(&mut reader.by_ref().take(declared), &mut io::sink())?;
                return Err(FrameError::TooLarge { declared, limit });
            }
            Err(err) => return Err(err),
        };
        return Ok(Some(Frame {
            payload: read_body(reader, len)?,
            framing: Framing::ContentLength,
        }));
    }
}

pub fn write_stdio_frame<W: Write>(
    out: &mut W,
    response: &JsonRpcResponse,
    framing: Framing,
) -> io::Result<()> {
    let body = serde_json::to_vec(response)?;
    match framing {
        Framing::Line => {
            out.write_all(&body)?;
            out.write_all(b"\n")?;
        }
        Framing::ContentLength => {
            write!(out, "Content-Length: {}\r\n\r\n", body.len())?;
            out.write_all(&body)?;
        }
    }
    out.flush()
}
