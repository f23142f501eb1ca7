// In-process test client

use crate::TestResponse;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use trestle_core::{Dispatcher, Error, HttpMethod, RawRequest};

const MULTIPART_BOUNDARY: &str = "----trestle-test-boundary";

/// Drives a [`Dispatcher`] without a socket.
#[derive(Clone)]
pub struct TestClient {
    dispatcher: Arc<Dispatcher>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            default_headers: Vec::new(),
        }
    }

    /// Header sent with every request, e.g. `Host` for tenant resolution.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::GET, path))
            .await
    }

    pub async fn head(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::HEAD, path))
            .await
    }

    pub async fn post(&self, path: &str, body: impl Into<Bytes>) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::POST, path).body(body))
            .await
    }

    /// POST an urlencoded form.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::POST, path).form(fields))
            .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(HttpMethod::DELETE, path))
            .await
    }

    /// Start a request that is sent with [`TestClient::send`].
    pub fn request(&self, method: HttpMethod, path: &str) -> TestRequestBuilder {
        TestRequestBuilder::new(method, path)
    }

    /// Dispatch a request and collect the whole response.
    pub async fn send(&self, request: TestRequestBuilder) -> TestResponse {
        let mut raw = request.build();
        for (name, value) in &self.default_headers {
            if !raw
                .headers
                .iter()
                .any(|(n, _)| n.eq_ignore_ascii_case(name))
            {
                raw.headers.push((name.clone(), value.clone()));
            }
        }

        let transport = self.dispatcher.dispatch(raw).await;
        TestResponse::collect(transport).await
    }
}

/// Builder for test requests
#[derive(Debug, Clone)]
pub struct TestRequestBuilder {
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Bytes,
    multipart: Vec<MultipartPart>,
    remote_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
struct MultipartPart {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl TestRequestBuilder {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: Vec::new(),
            cookies: Vec::new(),
            query: Vec::new(),
            body: Bytes::new(),
            multipart: Vec::new(),
            remote_addr: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Send a cookie. Values are url-encoded like the response side does.
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Urlencoded form body.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        let encoded = serde_urlencoded::to_string(fields).unwrap_or_default();
        self.body = Bytes::from(encoded);
        self.set_content_type("application/x-www-form-urlencoded")
    }

    pub fn json<T: serde::Serialize>(mut self, data: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(data)
            .map_err(|e| Error::Serialization(e.to_string()))?
            .into();
        Ok(self.set_content_type("application/json"))
    }

    /// Add a text field to a multipart body.
    pub fn multipart_field(mut self, name: &str, value: &str) -> Self {
        self.multipart.push(MultipartPart {
            name: name.to_string(),
            filename: None,
            content_type: None,
            data: Bytes::copy_from_slice(value.as_bytes()),
        });
        self
    }

    /// Add a file upload to a multipart body.
    pub fn multipart_file(
        mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        data: impl Into<Bytes>,
    ) -> Self {
        self.multipart.push(MultipartPart {
            name: name.to_string(),
            filename: Some(filename.to_string()),
            content_type: Some(content_type.to_string()),
            data: data.into(),
        });
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    fn set_content_type(mut self, content_type: &str) -> Self {
        self.headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case("content-type"));
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self
    }

    fn multipart_body(&self) -> Bytes {
        let mut body = Vec::new();
        for part in &self.multipart {
            body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
            let disposition = match &part.filename {
                Some(filename) => format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, filename
                ),
                None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name),
            };
            body.extend_from_slice(disposition.as_bytes());
            if let Some(content_type) = &part.content_type {
                body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(&part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.into()
    }

    /// Build the request
    pub fn build(mut self) -> RawRequest {
        if !self.multipart.is_empty() {
            self.body = self.multipart_body();
            self = self.set_content_type(&format!(
                "multipart/form-data; boundary={}",
                MULTIPART_BOUNDARY
            ));
        }

        let target = if self.query.is_empty() {
            self.path.clone()
        } else {
            let separator = if self.path.contains('?') { '&' } else { '?' };
            format!(
                "{}{}{}",
                self.path,
                separator,
                serde_urlencoded::to_string(&self.query).unwrap_or_default()
            )
        };

        let mut raw = RawRequest::new(self.method.as_str(), target).with_body(self.body);
        raw.headers = self.headers;
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(n, v)| format!("{}={}", urlencoding::encode(n), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("; ");
            raw.headers.push(("Cookie".to_string(), cookie));
        }
        if let Some(addr) = self.remote_addr {
            raw = raw.with_remote_addr(addr);
        }
        raw
    }
}
