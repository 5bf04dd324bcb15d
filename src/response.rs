//! Response envelopes, handler replies and the response writer.
//!
//! Handlers return anything that implements [`IntoReply`]. The dispatcher
//! normalises the [`Reply`] into an [`Envelope`], and the envelope is the
//! only thing the writer ever sees.
//!
//! ```text
//! handler → impl IntoReply → Reply::{Raw, Envelope} → Envelope → wire bytes
//! ```

use std::fmt::Display;

use serde_json::{Value, json};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::error::HandlerError;
use crate::options::Options;
use crate::status::{RequiredHeader, Status};

pub const JSON: &str = "application/json";

// ── Envelope ──────────────────────────────────────────────────────────────────

/// The normalised response: status, body and options.
///
/// # Body rendering
///
/// A JSON string body is written verbatim (so `text/html` handlers can
/// return markup). Every other JSON value is serialised.
///
/// ```rust
/// use tsurezure::Envelope;
/// use serde_json::json;
///
/// Envelope::new(201, json!({ "id": 42 }));
/// Envelope::new(301, "").with_option("location", "/new-home");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub status: u16,
    pub body: Value,
    pub options: Options,
}

impl Envelope {
    pub fn new(status: u16, body: impl Into<Value>) -> Self {
        Self { status, body: body.into(), options: Options::default() }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key, value);
        self
    }

    /// The canonical "no endpoint" envelope.
    pub fn not_found() -> Self {
        Self::new(404, json!({ "status": 404, "message": "undefined endpoint" }))
            .with_option("content_type", JSON)
    }

    pub(crate) fn bad_request(detail: impl Display) -> Self {
        Self::new(400, json!({ "status": 400, "message": format!("bad request: {detail}") }))
            .with_option("content_type", JSON)
    }

    pub(crate) fn server_error(detail: impl Display) -> Self {
        Self::new(500, json!({ "status": 500, "message": format!("server error: {detail}") }))
            .with_option("content_type", JSON)
    }

    pub fn render_body(&self) -> Vec<u8> {
        match &self.body {
            Value::String(s) => s.clone().into_bytes(),
            other => other.to_string().into_bytes(),
        }
    }

    /// Writes the envelope to `sink` and closes it.
    ///
    /// `default_content_type` is used unless the envelope carries a
    /// `content_type` option. Status codes outside the table in
    /// [`status`](crate::status) are written as `400 Bad Request`. A `304`
    /// is written with an empty body whatever the envelope holds.
    pub async fn write_to<W: AsyncWrite + Unpin>(
        self,
        mut sink: W,
        default_content_type: &str,
    ) -> std::io::Result<()> {
        let status = Status::resolve(self.status);
        let content_type = self.options.content_type().unwrap_or(default_content_type);
        // 304 never carries content (RFC 9110 §15.4.5).
        let body = match status {
            Status::NotModified => Vec::new(),
            _ => self.render_body(),
        };

        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n",
            status.code(),
            status.reason(),
            body.len(),
        );

        match status.required_header() {
            Some(RequiredHeader::Location) => match self.options.location() {
                Some(location) => head.push_str(&format!("Location: {location}\r\n")),
                None => warn!(status = status.code(), "redirect without a `location` option"),
            },
            Some(RequiredHeader::Allow) => match self.options.allow() {
                Some(allow) => head.push_str(&format!("Allow: {allow}\r\n")),
                None => warn!(status = status.code(), "405 without a `method` option"),
            },
            None => {}
        }
        head.push_str("\r\n");

        sink.write_all(head.as_bytes()).await?;
        sink.write_all(&body).await?;
        sink.flush().await?;
        sink.shutdown().await
    }
}

// ── Reply ─────────────────────────────────────────────────────────────────────

/// What a handler produced, before normalisation.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// A bare value. Normalised to `200` with the value as body.
    Raw(Value),
    /// A full envelope. Kept as-is apart from its options.
    Envelope(Envelope),
}

impl Reply {
    /// A bare `null`, `""`, `{}` or `[]`. Middleware returning one of these
    /// has not answered the request.
    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Self::Raw(Value::Null) => true,
            Self::Raw(Value::String(s)) => s.is_empty(),
            Self::Raw(Value::Object(m)) => m.is_empty(),
            Self::Raw(Value::Array(a)) => a.is_empty(),
            Self::Raw(_) | Self::Envelope(_) => false,
        }
    }

    /// Turns the reply into an envelope, overlaying `options` (those of the
    /// endpoint or middleware that produced it) on the envelope's own.
    pub(crate) fn normalize(self, options: &Options) -> Envelope {
        match self {
            Self::Raw(body) => Envelope { status: 200, body, options: options.clone() },
            Self::Envelope(mut env) => {
                env.options.merge(options);
                env
            }
        }
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion from a handler's return value into a [`Reply`].
///
/// `Err` means the handler failed; the dispatcher answers with a `500`.
///
/// # Example: returning a serde type
///
/// ```rust,ignore
/// async fn get_user(req: Request) -> Result<Value, serde_json::Error> {
///     serde_json::to_value(User { id: 1, name: "alice".into() })
/// }
/// ```
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, HandlerError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(self) }
}

impl IntoReply for Envelope {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Envelope(self)) }
}

impl IntoReply for Value {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Raw(self)) }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Raw(self.into())) }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, HandlerError> { Ok(Reply::Raw(self.into())) }
}

/// Return a [`Status`] directly from a handler: `return Status::NotFound`
impl IntoReply for Status {
    fn into_reply(self) -> Result<Reply, HandlerError> {
        Ok(Reply::Envelope(Envelope::new(self.code(), "")))
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Display,
{
    fn into_reply(self) -> Result<Reply, HandlerError> {
        self.map_err(|e| HandlerError::new(e.to_string()))?.into_reply()
    }
}
