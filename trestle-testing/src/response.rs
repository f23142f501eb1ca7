// Collected responses and parsed Set-Cookie headers

use bytes::Bytes;
use trestle_core::{StatusLine, TransportResponse};

/// Response from a test request, with the body fully collected.
#[derive(Debug)]
pub struct TestResponse {
    status: StatusLine,
    headers: Vec<(String, String)>,
    body: Bytes,
    body_error: Option<String>,
}

impl TestResponse {
    /// Drain a transport response. A stream error is kept for inspection
    /// and leaves the body with what was collected before it.
    pub async fn collect(transport: TransportResponse) -> Self {
        let (body, body_error) = match transport.body.into_bytes().await {
            Ok(body) => (body, None),
            Err(err) => (Bytes::new(), Some(err.to_string())),
        };
        Self {
            status: transport.status,
            headers: transport.headers,
            body,
            body_error,
        }
    }

    pub fn status(&self) -> u16 {
        self.status.code()
    }

    /// Full status line, e.g. `404 Not Found`.
    pub fn status_line(&self) -> &str {
        self.status.as_str()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status())
    }

    /// First header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    /// Every Set-Cookie header that parsed.
    pub fn cookies(&self) -> Vec<SetCookie> {
        self.header_values("Set-Cookie")
            .into_iter()
            .filter_map(SetCookie::parse)
            .collect()
    }

    /// Last Set-Cookie for `name`.
    pub fn cookie(&self, name: &str) -> Option<SetCookie> {
        self.cookies().into_iter().rev().find(|c| c.name == name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_slice(&self.body).map_err(|e| format!("Serialization error: {}", e))
    }

    /// Error raised while draining a streamed body.
    pub fn body_error(&self) -> Option<&str> {
        self.body_error.as_deref()
    }
}

/// A parsed `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetCookie {
    pub name: String,
    /// Url-decoded value
    pub value: String,
    pub max_age: Option<i64>,
    pub expires: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl SetCookie {
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';').map(str::trim);
        let (name, value) = parts.next()?.split_once('=')?;
        let mut cookie = SetCookie {
            name: urlencoding::decode(name).ok()?.into_owned(),
            value: urlencoding::decode(value).ok()?.into_owned(),
            ..Default::default()
        };

        for attribute in parts {
            let (key, value) = match attribute.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (attribute, None),
            };
            match (key.to_ascii_lowercase().as_str(), value) {
                ("max-age", Some(v)) => cookie.max_age = v.parse().ok(),
                ("expires", Some(v)) => cookie.expires = Some(v.to_string()),
                ("path", Some(v)) => cookie.path = Some(v.to_string()),
                ("domain", Some(v)) => cookie.domain = Some(v.to_string()),
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                _ => {}
            }
        }
        Some(cookie)
    }

    /// True when the header tells the client to drop the cookie.
    pub fn is_removal(&self) -> bool {
        self.max_age.is_some_and(|age| age <= 0)
            || self
                .expires
                .as_deref()
                .is_some_and(|e| e.contains("1970"))
    }
}
