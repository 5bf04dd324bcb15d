//! Incoming HTTP request type and the request parser.
//!
//! The parser reads exactly one request off the stream: the request line,
//! header lines up to the first blank line, then `Content-Length` bytes of
//! body. The body is decoded as JSON; an absent body becomes `{}` so that
//! handlers never branch on "was there a body".

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ParseError;
use crate::options::Options;
use crate::pattern::Params;

/// Largest body [`read_request`] accepts unless told otherwise: 2 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// An incoming HTTP request, parsed from the raw TCP stream.
///
/// `params` and `options` are empty until the dispatcher matches the request
/// against an endpoint or middleware; each handler sees the values bound for
/// its own pattern.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: String,
    pub(crate) url: String,
    pub(crate) path: String,
    pub(crate) protocol: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) raw_body: Bytes,
    pub(crate) body: Value,
    pub(crate) params: Params,
    pub(crate) options: Options,
}

impl Request {
    /// Builds a body-less `HTTP/1.1` request. Handy for exercising handlers
    /// and routers without a socket.
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_owned(),
            url: url.to_owned(),
            path: strip_query(url).to_owned(),
            protocol: "HTTP/1.1".to_owned(),
            query: parse_query(url),
            headers: HashMap::new(),
            raw_body: Bytes::new(),
            body: Value::Object(Map::new()),
            params: Params::new(),
            options: Options::default(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_owned());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.raw_body = Bytes::from(body.to_string());
        self.body = body;
        self
    }

    pub fn method(&self) -> &str { &self.method }
    /// The full request target, query string included.
    pub fn url(&self) -> &str { &self.url }
    /// The routing path: the URL with the query string removed.
    pub fn path(&self) -> &str { &self.path }
    pub fn protocol(&self) -> &str { &self.protocol }
    pub fn query(&self) -> &[(String, String)] { &self.query }
    pub fn headers(&self) -> &HashMap<String, String> { &self.headers }
    pub fn body(&self) -> &Value { &self.body }
    pub fn raw_body(&self) -> &Bytes { &self.raw_body }
    pub fn params(&self) -> &Params { &self.params }
    pub fn options(&self) -> &Options { &self.options }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// First value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parses an already-split request.
///
/// `body` is the raw body as read by the caller; its length is not checked
/// against `Content-Length` here.
pub fn parse<S: AsRef<str>>(
    request_line: &str,
    header_lines: &[S],
    body: Bytes,
) -> Result<Request, ParseError> {
    let (method, url, protocol) = parse_request_line(request_line)?;
    let mut headers = HashMap::new();
    for line in header_lines {
        let line = line.as_ref();
        if line.is_empty() {
            break;
        }
        let (k, v) = parse_header_line(line)?;
        headers.insert(k, v);
    }
    build(method, url, protocol, headers, body)
}

/// Reads one request off `reader`.
///
/// Returns `Ok(None)` when the peer closed the connection before sending a
/// request line. A `Content-Length` above `max_body_size` is malformed and
/// nothing is buffered for it.
pub(crate) async fn read_request<R>(
    reader: &mut R,
    max_body_size: usize,
) -> Result<Option<Request>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let (method, url, protocol) = parse_request_line(trim_eol(&line))?;

    let mut headers = HashMap::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let l = trim_eol(&line);
        if l.is_empty() {
            break;
        }
        let (k, v) = parse_header_line(l)?;
        headers.insert(k, v);
    }

    let len = content_length(&headers)?;
    if len > max_body_size {
        return Err(ParseError::Malformed(format!(
            "content-length {len} exceeds the {max_body_size} byte limit"
        )));
    }

    // `len` is at most `max_body_size` here.
    let mut body = Vec::with_capacity(len);
    let read = (&mut *reader).take(len as u64).read_to_end(&mut body).await?;
    if read < len {
        return Err(ParseError::Malformed(format!(
            "body ended after {read} of {len} declared bytes"
        )));
    }

    build(method, url, protocol, headers, Bytes::from(body)).map(Some)
}

fn build(
    method: String,
    url: String,
    protocol: String,
    headers: HashMap<String, String>,
    raw_body: Bytes,
) -> Result<Request, ParseError> {
    let body = decode_body(&raw_body)?;
    Ok(Request {
        path: strip_query(&url).to_owned(),
        query: parse_query(&url),
        method,
        url,
        protocol,
        headers,
        raw_body,
        body,
        params: Params::new(),
        options: Options::default(),
    })
}

/// Splits `METHOD TARGET PROTOCOL`. Exactly three single-space-separated,
/// non-empty tokens are required.
pub fn parse_request_line(line: &str) -> Result<(String, String, String), ParseError> {
    let tokens: Vec<&str> = line.split(' ').collect();
    match tokens.as_slice() {
        [method, url, protocol] if !method.is_empty() && !url.is_empty() && !protocol.is_empty() => {
            Ok(((*method).to_owned(), (*url).to_owned(), (*protocol).to_owned()))
        }
        _ => Err(ParseError::Malformed(format!("invalid request line `{line}`"))),
    }
}

/// Splits `Name: value` on the first `:`. Names are lower-cased so that a
/// repeated header overwrites regardless of casing.
pub fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    let (k, v) = line.split_once(':')
        .ok_or_else(|| ParseError::Malformed(format!("invalid header line `{line}`")))?;
    Ok((k.trim().to_ascii_lowercase(), v.trim().to_owned()))
}

/// Parses the query string of `url` into ordered key/value pairs.
///
/// Parsing stops at the first pair that has no value (`?a=1&flag&b=2`
/// yields only `a=1`). Pairs before it are kept; duplicates are preserved.
/// Each pair splits on its first `=`, so `a=b=c` binds `a` to `b=c`.
pub fn parse_query(url: &str) -> Vec<(String, String)> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };

    let mut pairs = Vec::new();
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some((k, v)) if !v.is_empty() => pairs.push((k.to_owned(), v.to_owned())),
            _ => break,
        }
    }
    pairs
}

/// Decodes a JSON body; empty input becomes `{}`.
pub fn decode_body(raw: &[u8]) -> Result<Value, ParseError> {
    if raw.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    Ok(serde_json::from_slice(raw)?)
}

fn content_length(headers: &HashMap<String, String>) -> Result<usize, ParseError> {
    match headers.get("content-length") {
        None => Ok(0),
        Some(v) => v.parse()
            .map_err(|_| ParseError::Malformed(format!("invalid content-length `{v}`"))),
    }
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

fn trim_eol(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::BufReader;

    use super::*;

    #[test]
    fn request_line_needs_three_tokens() {
        assert!(parse_request_line("GET / HTTP/1.1").is_ok());
        assert!(matches!(parse_request_line("GET /"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_request_line("GET / HTTP/1.1 extra"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_request_line("GET  HTTP/1.1"), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn headers_are_trimmed_and_last_write_wins() {
        let req = parse(
            "GET / HTTP/1.1",
            &["Host:  example.com ", "X-Token: a", "x-token: b", "", "Ignored: yes"],
            Bytes::new(),
        )
        .unwrap();
        assert_eq!(req.header("host"), Some("example.com"));
        assert_eq!(req.header("X-Token"), Some("b"));
        assert_eq!(req.header("ignored"), None);
    }

    #[test]
    fn header_value_keeps_inner_colons() {
        let (k, v) = parse_header_line("Host: localhost:8888").unwrap();
        assert_eq!(k, "host");
        assert_eq!(v, "localhost:8888");
        assert!(parse_header_line("no delimiter").is_err());
    }

    #[test]
    fn query_pairs_keep_order_and_duplicates() {
        assert_eq!(
            parse_query("/search?q=rust&page=2&q=tokio"),
            vec![
                ("q".to_owned(), "rust".to_owned()),
                ("page".to_owned(), "2".to_owned()),
                ("q".to_owned(), "tokio".to_owned()),
            ]
        );
        assert!(parse_query("/search").is_empty());
    }

    #[test]
    fn query_parsing_stops_at_a_bare_key() {
        assert_eq!(
            parse_query("/s?a=1&flag&b=2"),
            vec![("a".to_owned(), "1".to_owned())]
        );
        assert!(parse_query("/s?flag&b=2").is_empty());
        assert!(parse_query("/s?a=&b=2").is_empty());
    }

    #[test]
    fn query_value_keeps_later_equals_signs() {
        assert_eq!(
            parse_query("/s?token=abc==&a=b=c"),
            vec![
                ("token".to_owned(), "abc==".to_owned()),
                ("a".to_owned(), "b=c".to_owned()),
            ]
        );
    }

    #[test]
    fn routing_path_has_no_query() {
        let req = Request::new("GET", "/users/7?expand=posts");
        assert_eq!(req.path(), "/users/7");
        assert_eq!(req.url(), "/users/7?expand=posts");
        assert_eq!(req.query_param("expand"), Some("posts"));
    }

    #[test]
    fn absent_body_is_an_empty_object() {
        assert_eq!(decode_body(b"").unwrap(), json!({}));
        let req = parse::<&str>("POST /x HTTP/1.1", &[], Bytes::new()).unwrap();
        assert_eq!(req.body(), &json!({}));
    }

    #[test]
    fn undecodable_body_is_an_error() {
        assert!(matches!(decode_body(b"{not json"), Err(ParseError::BodyDecode(_))));
    }

    #[tokio::test]
    async fn reads_a_request_off_a_stream() {
        let raw = "POST /users?src=test HTTP/1.1\r\n\
                   Content-Type: application/json\r\n\
                   Content-Length: 16\r\n\
                   \r\n\
                   {\"name\":\"alice\"}";
        let mut reader = BufReader::new(raw.as_bytes());
        let req = read_request(&mut reader, DEFAULT_MAX_BODY_SIZE).await.unwrap().unwrap();

        assert_eq!(req.method(), "POST");
        assert_eq!(req.path(), "/users");
        assert_eq!(req.protocol(), "HTTP/1.1");
        assert_eq!(req.query_param("src"), Some("test"));
        assert_eq!(req.body(), &json!({ "name": "alice" }));
    }

    #[tokio::test]
    async fn zero_content_length_reads_no_body() {
        let raw = "GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let mut reader = BufReader::new(raw.as_bytes());
        let req = read_request(&mut reader, DEFAULT_MAX_BODY_SIZE).await.unwrap().unwrap();
        assert_eq!(req.body(), &json!({}));
        assert!(req.raw_body().is_empty());
    }

    #[tokio::test]
    async fn closed_stream_yields_no_request() {
        let mut reader = BufReader::new(&b""[..]);
        assert!(read_request(&mut reader, DEFAULT_MAX_BODY_SIZE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_content_length_is_malformed() {
        let raw = "GET / HTTP/1.1\r\nContent-Length: lots\r\n\r\n";
        let mut reader = BufReader::new(raw.as_bytes());
        assert!(matches!(read_request(&mut reader, DEFAULT_MAX_BODY_SIZE).await, Err(ParseError::Malformed(_))));
    }

    #[tokio::test]
    async fn oversized_content_length_is_rejected_before_reading() {
        for declared in ["18446744073709551615", "1000000000000", "17"] {
            let raw = format!("POST / HTTP/1.1\r\nContent-Length: {declared}\r\n\r\n{{}}");
            let mut reader = BufReader::new(raw.as_bytes());
            let err = read_request(&mut reader, 16).await.unwrap_err();
            assert!(matches!(err, ParseError::Malformed(ref m) if m.contains("exceeds")), "{declared}: {err}");
        }
    }

    #[tokio::test]
    async fn body_shorter_than_content_length_is_malformed() {
        let raw = "POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n{}";
        let mut reader = BufReader::new(raw.as_bytes());
        assert!(matches!(
            read_request(&mut reader, DEFAULT_MAX_BODY_SIZE).await,
            Err(ParseError::Malformed(_))
        ));
    }
}
