// Inbound request model

use crate::cookie::parse_cookie_header;
use crate::form::Input;
use crate::{Error, HttpMethod};
use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::OnceLock;

/// Request exactly as the transport hands it over.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: String,
    /// Request target, `path[?query]`, still percent-encoded.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl RawRequest {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            remote_addr: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

/// Read-only view over one inbound request.
///
/// Headers, cookies and the merged input are computed on first access and
/// cached for the rest of the request.
#[derive(Debug)]
pub struct Request {
    raw: RawRequest,
    raw_path: String,
    query: String,
    headers: OnceLock<HashMap<String, String>>,
    cookies: OnceLock<Vec<(String, String)>>,
    input: OnceLock<Result<Input, String>>,
}

impl Request {
    pub fn new(raw: RawRequest) -> Self {
        let (raw_path, query) = match raw.target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (raw.target.clone(), String::new()),
        };
        let raw_path = if raw_path.is_empty() {
            "/".to_string()
        } else {
            raw_path
        };

        Self {
            raw,
            raw_path,
            query,
            headers: OnceLock::new(),
            cookies: OnceLock::new(),
            input: OnceLock::new(),
        }
    }

    /// Method name, uppercased. Defaults to `GET`.
    pub fn method(&self) -> String {
        if self.raw.method.is_empty() {
            "GET".to_string()
        } else {
            self.raw.method.to_uppercase()
        }
    }

    pub fn http_method(&self) -> Option<HttpMethod> {
        HttpMethod::from_str(&self.method())
    }

    /// Path as sent on the wire.
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// Percent-decoded path.
    pub fn path(&self) -> String {
        urlencoding::decode(&self.raw_path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| self.raw_path.clone())
    }

    pub fn query_string(&self) -> &str {
        &self.query
    }

    fn header_map(&self) -> &HashMap<String, String> {
        self.headers.get_or_init(|| {
            let mut map = HashMap::with_capacity(self.raw.headers.len());
            for (name, value) in &self.raw.headers {
                map.entry(name.to_ascii_lowercase())
                    .or_insert_with(|| value.clone());
            }
            map
        })
    }

    /// Header value, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_map()
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn header_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.header(name).unwrap_or(default)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header_map()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Host` header, empty when absent.
    pub fn host(&self) -> &str {
        self.header_or("host", "")
    }

    /// Peer address, `0.0.0.0` when the transport did not supply one.
    pub fn remote_addr(&self) -> String {
        self.raw
            .remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn cookies(&self) -> &[(String, String)] {
        self.cookies.get_or_init(|| {
            self.header("cookie")
                .map(parse_cookie_header)
                .unwrap_or_default()
        })
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.raw.body
    }

    /// Parse the body as JSON
    pub fn json<T: for<'de> serde::Deserialize<'de>>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.raw.body).map_err(|e| Error::BadRequest(e.to_string()))
    }

    /// Merged body and query parameters. A malformed body is a 400.
    pub fn input(&self) -> Result<&Input, Error> {
        self.input
            .get_or_init(|| {
                Input::parse(&self.query, self.header("content-type"), &self.raw.body)
                    .map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|msg| Error::BadRequest(msg.clone()))
    }

    /// Where the client came from, reduced to a local path.
    ///
    /// A same-host `Referer` becomes its path. A foreign or missing one, or a
    /// path starting with any of `excludes`, becomes `/`.
    pub fn referer(&self, excludes: &[&str]) -> String {
        let target = self
            .header("referer")
            .and_then(|referer| self.local_path(referer))
            .unwrap_or_else(|| "/".to_string());
        apply_excludes(target, excludes)
    }

    /// Post-action redirect target: the `redirect` parameter if it names a
    /// local path, otherwise the referer.
    pub fn redirect_target(&self, excludes: &[&str]) -> String {
        let requested = self
            .input()
            .ok()
            .and_then(|input| input.get("redirect"))
            .filter(|r| !r.is_empty())
            .map(|r| self.local_path(r).unwrap_or_else(|| "/".to_string()));

        match requested {
            Some(target) => apply_excludes(target, excludes),
            None => self.referer(excludes),
        }
    }

    fn local_path(&self, url: &str) -> Option<String> {
        if url.starts_with('/') {
            // Protocol-relative URLs point off-site.
            return (!url.starts_with("//")).then(|| url.to_string());
        }
        let host = self.host();
        if host.is_empty() {
            return None;
        }
        ["http://", "https://"].iter().find_map(|scheme| {
            let rest = url.strip_prefix(scheme)?.strip_prefix(host)?;
            if rest.is_empty() {
                Some("/".to_string())
            } else if rest.starts_with('/') {
                Some(rest.to_string())
            } else {
                None
            }
        })
    }

    pub fn into_raw(self) -> RawRequest {
        self.raw
    }
}

fn apply_excludes(target: String, excludes: &[&str]) -> String {
    if excludes.iter().any(|prefix| target.starts_with(prefix)) {
        "/".to_string()
    } else {
        target
    }
}
