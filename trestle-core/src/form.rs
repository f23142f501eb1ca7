//! Form processing and multipart support

use crate::Error;
use bytes::Bytes;
use std::io::Cursor;

/// One value of the merged request input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Text(String),
    File(UploadedFile),
}

impl InputValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InputValue::Text(s) => Some(s),
            InputValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            InputValue::File(f) => Some(f),
            InputValue::Text(_) => None,
        }
    }
}

/// Uploaded file data
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Original filename as sent by the client
    pub filename: String,

    /// Content type (MIME type)
    pub content_type: String,

    data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// A readable stream over the file contents.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get file extension
    pub fn extension(&self) -> Option<&str> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }
}

/// Query-string and body parameters merged into one multi-valued view.
///
/// Body values precede query values for the same key, and blank values are
/// kept. Scalar access returns the first value.
///
/// ```
/// use trestle_core::form::Input;
///
/// let input = Input::parse("tag=a&tag=b&tag=c", None, b"").unwrap();
/// assert_eq!(input.get("tag"), Some("a"));
/// assert_eq!(input.get_all("tag"), vec!["a", "b", "c"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input {
    entries: Vec<(String, InputValue)>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the merged view for one request.
    pub fn parse(query: &str, content_type: Option<&str>, body: &[u8]) -> Result<Self, Error> {
        let mut input = Input::new();

        match content_type.map(media_type) {
            Some(mt) if mt.eq_ignore_ascii_case("application/x-www-form-urlencoded") => {
                for (key, value) in parse_urlencoded(body)? {
                    input.push(key, InputValue::Text(value));
                }
            }
            Some(mt) if mt.eq_ignore_ascii_case("multipart/form-data") => {
                let parser = MultipartParser::from_content_type(content_type.unwrap_or_default())?;
                for (key, value) in parser.parse(body)? {
                    input.push(key, value);
                }
            }
            _ => {}
        }

        if !query.is_empty() {
            for (key, value) in parse_urlencoded(query.as_bytes())? {
                input.push(key, InputValue::Text(value));
            }
        }

        Ok(input)
    }

    pub fn push(&mut self, key: impl Into<String>, value: InputValue) {
        self.entries.push((key.into(), value));
    }

    /// First text value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values(key).find_map(InputValue::as_text)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Every text value for `key`, in order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.values(key).filter_map(InputValue::as_text).collect()
    }

    /// First uploaded file for `key`.
    pub fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.values(key).find_map(InputValue::as_file)
    }

    pub fn files(&self, key: &str) -> Vec<&UploadedFile> {
        self.values(key).filter_map(InputValue::as_file).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Distinct keys in first-seen order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.entries {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn values<'a, 'k>(&'a self, key: &'k str) -> impl Iterator<Item = &'a InputValue> + use<'a, 'k> {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// Parse URL-encoded form data, keeping repeated keys and blank values.
pub fn parse_urlencoded(body: &[u8]) -> Result<Vec<(String, String)>, Error> {
    serde_urlencoded::from_bytes(body)
        .map_err(|e| Error::BadRequest(format!("Failed to parse form data: {}", e)))
}

fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

/// Multipart form data parser
pub struct MultipartParser {
    boundary: String,
}

impl MultipartParser {
    /// Create a new multipart parser from Content-Type header
    pub fn from_content_type(content_type: &str) -> Result<Self, Error> {
        // Example: "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW"
        let boundary = content_type
            .split(';')
            .find_map(|part| {
                part.trim()
                    .strip_prefix("boundary=")
                    .map(|b| b.trim_matches('"').to_string())
            })
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::BadRequest("Missing boundary in Content-Type".to_string()))?;

        Ok(Self { boundary })
    }

    /// Parse a multipart body into named text fields and files.
    pub fn parse(&self, body: &[u8]) -> Result<Vec<(String, InputValue)>, Error> {
        let delimiter = format!("--{}", self.boundary);
        let mut fields = Vec::new();

        let mut parts = split_on(body, delimiter.as_bytes()).into_iter().skip(1);
        for part in parts.by_ref() {
            if part.starts_with(b"--") {
                return Ok(fields);
            }
            let part = part.strip_prefix(b"\r\n").unwrap_or(part);
            let part = part.strip_suffix(b"\r\n").unwrap_or(part);
            if part.is_empty() {
                continue;
            }
            fields.push(self.parse_part(part)?);
        }

        Err(Error::BadRequest(
            "Multipart body is missing its closing boundary".to_string(),
        ))
    }

    /// Parse a single multipart part
    fn parse_part(&self, part: &[u8]) -> Result<(String, InputValue), Error> {
        let split = find(part, b"\r\n\r\n")
            .ok_or_else(|| Error::BadRequest("Malformed multipart part".to_string()))?;
        let head = std::str::from_utf8(&part[..split])
            .map_err(|_| Error::BadRequest("Multipart headers are not UTF-8".to_string()))?;
        let content = &part[split + 4..];

        let mut name = None;
        let mut filename = None;
        let mut content_type = None;

        for line in head.split("\r\n") {
            let Some((header, value)) = line.split_once(':') else {
                continue;
            };
            if header.trim().eq_ignore_ascii_case("content-disposition") {
                for attr in value.split(';') {
                    let attr = attr.trim();
                    if let Some(v) = attr.strip_prefix("name=") {
                        name = Some(v.trim_matches('"').to_string());
                    } else if let Some(v) = attr.strip_prefix("filename=") {
                        filename = Some(v.trim_matches('"').to_string());
                    }
                }
            } else if header.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            }
        }

        let name = name.ok_or_else(|| Error::BadRequest("Missing field name".to_string()))?;

        let value = match filename {
            Some(filename) => InputValue::File(UploadedFile::new(
                filename,
                content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                Bytes::copy_from_slice(content),
            )),
            None => InputValue::Text(String::from_utf8_lossy(content).into_owned()),
        };

        Ok((name, value))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn split_on<'a>(mut haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut pieces = Vec::new();
    while let Some(at) = find(haystack, delimiter) {
        pieces.push(&haystack[..at]);
        haystack = &haystack[at + delimiter.len()..];
    }
    pieces.push(haystack);
    pieces
}
