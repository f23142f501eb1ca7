// Outgoing response model

use crate::streaming::ByteStream;
use crate::{Error, HttpStatus, StatusLine};
use bytes::{Bytes, BytesMut};

pub use crate::cookie::{CookieOptions, Expiry};
use crate::cookie::format_set_cookie;

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Response headers whose canonical spelling is not plain title case.
const CANONICAL_HEADERS: &[&str] = &[
    "Accept-Ranges",
    "Age",
    "Allow",
    "Cache-Control",
    "Connection",
    "Content-Encoding",
    "Content-Language",
    "Content-Length",
    "Content-Location",
    "Content-MD5",
    "Content-Disposition",
    "Content-Range",
    "Content-Type",
    "Date",
    "ETag",
    "Expires",
    "Last-Modified",
    "Link",
    "Location",
    "P3P",
    "Pragma",
    "Proxy-Authenticate",
    "Refresh",
    "Retry-After",
    "Server",
    "Set-Cookie",
    "Strict-Transport-Security",
    "Trailer",
    "Transfer-Encoding",
    "Vary",
    "Via",
    "Warning",
    "WWW-Authenticate",
    "X-Frame-Options",
    "X-XSS-Protection",
    "X-Content-Type-Options",
    "X-Forwarded-Proto",
    "X-Powered-By",
    "X-UA-Compatible",
];

/// Canonical spelling of a header name.
///
/// Well-known names come from a fixed table, anything else is title-cased
/// per dash-separated word.
pub fn canonical_header_name(name: &str) -> String {
    if let Some(known) = CANONICAL_HEADERS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name))
    {
        return (*known).to_string();
    }
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug)]
enum Body {
    Chunks(Vec<Bytes>),
    Stream(ByteStream),
}

/// Response under construction for one request.
#[derive(Debug)]
pub struct Response {
    status: StatusLine,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusLine::default(),
            headers: vec![("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string())],
            cookies: Vec::new(),
            body: Body::Chunks(Vec::new()),
        }
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.code()
    }

    /// Set the status from a numeric code.
    pub fn set_status(&mut self, code: u16) -> Result<(), Error> {
        self.status = StatusLine::from_code(code)?;
        Ok(())
    }

    /// Set a pre-formatted status line such as `"404 Not Found"`.
    pub fn set_status_line(&mut self, line: &str) -> Result<(), Error> {
        self.status = StatusLine::parse(line)?;
        Ok(())
    }

    pub fn set_http_status(&mut self, status: HttpStatus) {
        self.status = status.into();
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.unset_header(name);
        self.headers
            .push((canonical_header_name(name), value.into()));
    }

    /// Add a value without removing existing ones.
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .push((canonical_header_name(name), value.into()));
    }

    pub fn unset_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set_header("Content-Type", content_type);
    }

    /// Queue a cookie. A later call with the same name replaces it.
    pub fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        self.unset_cookie(name);
        self.cookies
            .push((name.to_string(), format_set_cookie(name, value, options)));
    }

    /// Drop a queued cookie from the jar.
    pub fn unset_cookie(&mut self, name: &str) {
        self.cookies.retain(|(n, _)| n != name);
    }

    /// Tell the client to discard `name`.
    pub fn delete_cookie(&mut self, name: &str, options: &CookieOptions) {
        let mut expired = options.clone();
        expired.max_age = None;
        expired.expires = Some(Expiry::Timestamp(0));
        self.set_cookie(name, "", &expired);
    }

    /// Queued `Set-Cookie` values in insertion order.
    pub fn cookies(&self) -> impl Iterator<Item = &str> {
        self.cookies.iter().map(|(_, v)| v.as_str())
    }

    /// Append a chunk to the output buffer. Replaces a streaming body.
    pub fn write(&mut self, chunk: impl Into<Bytes>) {
        match &mut self.body {
            Body::Chunks(chunks) => chunks.push(chunk.into()),
            Body::Stream(_) => self.body = Body::Chunks(vec![chunk.into()]),
        }
    }

    /// Empty the output buffer.
    pub fn reset(&mut self) {
        self.body = Body::Chunks(Vec::new());
    }

    pub fn set_stream(&mut self, stream: ByteStream) {
        self.body = Body::Stream(stream);
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::Stream(_))
    }

    /// Buffered body, or `None` while streaming.
    pub fn body_bytes(&self) -> Option<Bytes> {
        match &self.body {
            Body::Chunks(chunks) => Some(concat(chunks)),
            Body::Stream(_) => None,
        }
    }

    /// Clear status, headers and body ahead of rendering an error. Cookies are kept.
    pub fn reset_for_error(&mut self) {
        self.status = StatusLine::default();
        self.headers = vec![("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string())];
        self.reset();
    }

    /// Hand the finished response to the transport.
    pub fn into_transport(self) -> TransportResponse {
        let mut headers = self.headers;
        headers.extend(
            self.cookies
                .into_iter()
                .map(|(_, value)| ("Set-Cookie".to_string(), value)),
        );
        let body = match self.body {
            Body::Chunks(chunks) => TransportBody::Full(concat(&chunks)),
            Body::Stream(stream) => TransportBody::Stream(stream),
        };
        TransportResponse {
            status: self.status,
            headers,
            body,
        }
    }
}

fn concat(chunks: &[Bytes]) -> Bytes {
    match chunks {
        [] => Bytes::new(),
        [single] => single.clone(),
        many => {
            let mut buffer = BytesMut::with_capacity(many.iter().map(Bytes::len).sum());
            for chunk in many {
                buffer.extend_from_slice(chunk);
            }
            buffer.freeze()
        }
    }
}

/// Body handed to the transport.
#[derive(Debug)]
pub enum TransportBody {
    Full(Bytes),
    Stream(ByteStream),
}

impl TransportBody {
    /// Collect the whole body. Streams are drained.
    pub async fn into_bytes(self) -> Result<Bytes, Error> {
        match self {
            TransportBody::Full(bytes) => Ok(bytes),
            TransportBody::Stream(stream) => stream.collect_bytes().await,
        }
    }
}

/// Status line, header list and body: everything the transport writes.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusLine,
    pub headers: Vec<(String, String)>,
    pub body: TransportBody,
}

impl TransportResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
