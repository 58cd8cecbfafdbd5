//! STOMP 1.2 frame model and codec for the dashboard push channel.
//!
//! This crate owns the wire representation spoken between `boxboard` and the
//! workshop backend's message broker. A frame is a command line, a block of
//! `name:value` headers, a blank line, an opaque body and a trailing NUL.
//!
//! DESIGN
//! ======
//! - Headers keep wire order. Repeated headers are legal; lookups return the
//!   first occurrence, which is the one STOMP says wins.
//! - Header values are escaped on every command except `CONNECT` and
//!   `CONNECTED`, which the protocol exempts for 1.0 compatibility.
//! - A `content-length` header, when present, bounds the body so it may carry
//!   NUL bytes. Without it the body runs to the first NUL.

use std::fmt;
use std::str::FromStr;

/// Header carrying the subscription destination / topic.
pub const HEADER_DESTINATION: &str = "destination";
/// Header carrying the client-chosen subscription id.
pub const HEADER_ID: &str = "id";
/// Header naming the subscription a `MESSAGE` belongs to.
pub const HEADER_SUBSCRIPTION: &str = "subscription";
/// Header carrying the body length in bytes.
pub const HEADER_CONTENT_LENGTH: &str = "content-length";
/// Short error description on `ERROR` frames.
pub const HEADER_MESSAGE: &str = "message";

/// Error returned by [`decode_frame`] and [`Frame::body_text`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Nothing but end-of-line bytes (or nothing at all) was received.
    #[error("empty frame")]
    Empty,
    /// The command line is not a STOMP command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// A header line had no `:` separator.
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    /// A header value used an escape sequence STOMP does not define.
    #[error("invalid header escape sequence: \\{0}")]
    InvalidEscape(char),
    /// The frame was not terminated by a NUL byte.
    #[error("frame is missing its NUL terminator")]
    MissingNul,
    /// `content-length` did not parse or pointed past the end of the input.
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),
    /// Command or header bytes were not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
}

impl CodecError {
    /// Stable, grepable code for logs and error payloads.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_FRAME_EMPTY",
            Self::UnknownCommand(_) => "E_FRAME_COMMAND",
            Self::MalformedHeader(_) | Self::InvalidEscape(_) => "E_FRAME_HEADER",
            Self::MissingNul => "E_FRAME_UNTERMINATED",
            Self::InvalidContentLength(_) => "E_FRAME_CONTENT_LENGTH",
            Self::InvalidUtf8 => "E_FRAME_UTF8",
        }
    }
}

/// STOMP frame command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Wire spelling of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Whether header values of this command are sent without escaping.
    fn raw_headers(self) -> bool {
        matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(CodecError::UnknownCommand(other.to_owned())),
        };
        Ok(command)
    }
}

/// A single STOMP frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: Vec::new() }
    }

    /// `CONNECT` frame for a STOMP 1.2 session against `host`.
    ///
    /// `heart_beat` is `(outgoing_ms, incoming_ms)`; `(0, 0)` disables heart-beats.
    #[must_use]
    pub fn connect(host: &str, heart_beat: (u32, u32)) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", "1.2,1.1,1.0")
            .with_header("host", host)
            .with_header("heart-beat", format!("{},{}", heart_beat.0, heart_beat.1))
    }

    #[must_use]
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header(HEADER_ID, id)
            .with_header(HEADER_DESTINATION, destination)
            .with_header("ack", "auto")
    }

    #[must_use]
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header(HEADER_ID, id)
    }

    #[must_use]
    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    /// Append a header. Earlier headers with the same name keep precedence.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`, if any.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidUtf8`] if the body is not valid UTF-8.
    pub fn body_text(&self) -> Result<&str, CodecError> {
        std::str::from_utf8(&self.body).map_err(|_| CodecError::InvalidUtf8)
    }
}

/// True when `bytes` is a bare heart-beat (only EOLs, or nothing).
#[must_use]
pub fn is_heartbeat(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| matches!(b, b'\n' | b'\r'))
}

/// Encode a frame into wire bytes.
///
/// A `content-length` header is added for non-empty bodies unless the caller
/// already set one.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + frame.body.len());
    out.extend_from_slice(frame.command.as_str().as_bytes());
    out.push(b'\n');

    let raw = frame.command.raw_headers();
    for (name, value) in &frame.headers {
        if raw {
            out.extend_from_slice(name.as_bytes());
            out.push(b':');
            out.extend_from_slice(value.as_bytes());
        } else {
            out.extend_from_slice(escape(name).as_bytes());
            out.push(b':');
            out.extend_from_slice(escape(value).as_bytes());
        }
        out.push(b'\n');
    }
    if !frame.body.is_empty() && frame.header(HEADER_CONTENT_LENGTH).is_none() {
        out.extend_from_slice(format!("{HEADER_CONTENT_LENGTH}:{}\n", frame.body.len()).as_bytes());
    }

    out.push(b'\n');
    out.extend_from_slice(&frame.body);
    out.push(0);
    out
}

/// Decode one frame from wire bytes. Leading heart-beat EOLs are skipped and
/// anything after the terminating NUL is ignored.
///
/// # Errors
///
/// See [`CodecError`] for the individual failure modes.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let start = bytes
        .iter()
        .position(|b| !matches!(b, b'\n' | b'\r'))
        .ok_or(CodecError::Empty)?;
    let mut rest = &bytes[start..];

    let command_line = take_line(&mut rest).ok_or(CodecError::MissingNul)?;
    let command: Command = utf8(command_line)?.parse()?;
    let raw = command.raw_headers();

    let mut headers = Vec::new();
    loop {
        let line = take_line(&mut rest).ok_or(CodecError::MissingNul)?;
        if line.is_empty() {
            break;
        }
        let line = utf8(line)?;
        let Some((name, value)) = line.split_once(':') else {
            return Err(CodecError::MalformedHeader(line.to_owned()));
        };
        if raw {
            headers.push((name.to_owned(), value.to_owned()));
        } else {
            headers.push((unescape(name)?, unescape(value)?));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == HEADER_CONTENT_LENGTH)
        .map(|(_, v)| v.clone());

    let body = if let Some(raw_len) = content_length {
        let len: usize = raw_len
            .trim()
            .parse()
            .map_err(|_| CodecError::InvalidContentLength(raw_len.clone()))?;
        if rest.len() < len {
            return Err(CodecError::InvalidContentLength(raw_len));
        }
        if rest.get(len) != Some(&0) {
            return Err(CodecError::MissingNul);
        }
        rest[..len].to_vec()
    } else {
        let nul = rest.iter().position(|b| *b == 0).ok_or(CodecError::MissingNul)?;
        rest[..nul].to_vec()
    };

    Ok(Frame { command, headers, body })
}

/// Split off one line (without its `\n` / `\r\n`). `None` when no EOL remains.
fn take_line<'a>(rest: &mut &'a [u8]) -> Option<&'a [u8]> {
    let eol = rest.iter().position(|b| *b == b'\n')?;
    let mut line = &rest[..eol];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }
    *rest = &rest[eol + 1..];
    Some(line)
}

fn utf8(bytes: &[u8]) -> Result<&str, CodecError> {
    std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => return Err(CodecError::InvalidEscape(other)),
            None => return Err(CodecError::InvalidEscape(' ')),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
