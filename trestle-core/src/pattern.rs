//! Route pattern compiler.
//!
//! A template is a path with literal text and captures. `<name>` captures one
//! path segment as text; `<type:name>` picks a typed capture:
//!
//! | type                    | matches                      | value  |
//! |-------------------------|------------------------------|--------|
//! | *(none)*, `str`, `unicode` | one segment               | text   |
//! | `path`                  | one or more chars, across `/` | text  |
//! | `int`, `long`           | `-?\d+`                      | `i64`  |
//! | `float`                 | `-?\d+(\.\d+)?`              | `f64`  |
//! | `bool`                  | `true/false/yes/no/on/off/1/0` | `bool` |
//!
//! Templates are validated when compiled. A bad template is a startup error,
//! never a per-request one.
//!
//! ```
//! use trestle_core::pattern::RoutePattern;
//!
//! let pattern = RoutePattern::compile("/static/<path:rest>").unwrap();
//! let params = pattern.matches("/static/css/site.css").unwrap();
//! assert_eq!(params.get_str("rest"), Some("css/site.css"));
//! ```

use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Errors raised while compiling a route template.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("route template must start with '/': {0:?}")]
    MissingLeadingSlash(String),

    #[error("unterminated capture in {0:?}")]
    Unterminated(String),

    #[error("invalid capture <{capture}> in {template:?}")]
    InvalidCapture { template: String, capture: String },

    #[error("capture name required in {0:?}")]
    EmptyName(String),

    #[error("capture type required before ':' in {0:?}")]
    EmptyType(String),

    #[error("capture name {0:?} must not start with a digit")]
    NameStartsWithDigit(String),

    #[error("capture type {0:?} must not start with a digit")]
    TypeStartsWithDigit(String),

    #[error("unknown capture type {0:?}")]
    UnknownType(String),

    #[error("duplicate capture name {0:?}")]
    DuplicateName(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// How a capture matches and converts its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Text,
    Path,
    Int,
    Float,
    Bool,
}

impl CaptureKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "" | "str" | "unicode" => Some(CaptureKind::Text),
            "path" => Some(CaptureKind::Path),
            "int" | "long" => Some(CaptureKind::Int),
            "float" => Some(CaptureKind::Float),
            "bool" => Some(CaptureKind::Bool),
            _ => None,
        }
    }

    fn regex(&self) -> &'static str {
        match self {
            CaptureKind::Text => "([^/]+)",
            CaptureKind::Path => "(.+)",
            CaptureKind::Int => r"(-?\d+)",
            CaptureKind::Float => r"(-?\d+(?:\.\d+)?)",
            CaptureKind::Bool => "((?i:true|false|yes|no|on|off|1|0))",
        }
    }

    fn convert(&self, raw: &str) -> Option<ParamValue> {
        match self {
            CaptureKind::Text | CaptureKind::Path => urlencoding::decode(raw)
                .ok()
                .map(|s| ParamValue::Text(s.into_owned())),
            CaptureKind::Int => raw.parse().ok().map(ParamValue::Int),
            CaptureKind::Float => raw.parse().ok().map(ParamValue::Float),
            CaptureKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(ParamValue::Bool(true)),
                "false" | "no" | "off" | "0" => Some(ParamValue::Bool(false)),
                _ => None,
            },
        }
    }
}

/// A typed capture value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Float(n) => write!(f, "{}", n),
            ParamValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Captured values of one match, in template order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteParams {
    values: Vec<(String, ParamValue)>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Float(n) => Some(*n),
            ParamValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One `<type:name>` in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub name: String,
    pub kind: CaptureKind,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact,
    Regex(Regex),
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    template: String,
    encoded: String,
    matcher: Matcher,
    captures: Vec<Capture>,
    literal_segments: usize,
}

impl RoutePattern {
    /// Compile a template, validating every capture.
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        if !template.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(template.to_string()));
        }

        let mut regex = String::from("^");
        let mut captures: Vec<Capture> = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('<') {
            regex.push_str(&regex::escape(&encode_literal(&rest[..open])));
            let after = &rest[open + 1..];
            let close = after
                .find('>')
                .ok_or_else(|| PatternError::Unterminated(template.to_string()))?;
            let capture = parse_capture(template, &after[..close])?;
            if captures.iter().any(|c| c.name == capture.name) {
                return Err(PatternError::DuplicateName(capture.name));
            }
            regex.push_str(capture.kind.regex());
            captures.push(capture);
            rest = &after[close + 1..];
        }
        regex.push_str(&regex::escape(&encode_literal(rest)));
        regex.push('$');

        let literal_segments = template
            .split('/')
            .filter(|segment| !segment.is_empty() && !segment.contains('<'))
            .count();

        let matcher = if captures.is_empty() {
            Matcher::Exact
        } else {
            Matcher::Regex(Regex::new(&regex)?)
        };

        Ok(Self {
            template: template.to_string(),
            encoded: encode_literal(template),
            matcher,
            captures,
            literal_segments,
        })
    }

    /// Match a raw (still percent-encoded) request path.
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        match &self.matcher {
            Matcher::Exact => (path == self.encoded).then(RouteParams::new),
            Matcher::Regex(regex) => {
                let caps = regex.captures(path)?;
                let mut values = Vec::with_capacity(self.captures.len());
                for (index, capture) in self.captures.iter().enumerate() {
                    let raw = caps.get(index + 1)?.as_str();
                    values.push((capture.name.clone(), capture.kind.convert(raw)?));
                }
                Some(RouteParams { values })
            }
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The template as a client sends it on the wire. Static routes are
    /// keyed by this.
    pub fn encoded_template(&self) -> &str {
        &self.encoded
    }

    /// A capture-free template, looked up by exact key.
    pub fn is_static(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    /// Number of path segments made only of literal text.
    pub fn literal_segments(&self) -> usize {
        self.literal_segments
    }

    /// Number of `path` captures, which match across `/`.
    pub fn greedy_captures(&self) -> usize {
        self.captures
            .iter()
            .filter(|c| c.kind == CaptureKind::Path)
            .count()
    }
}

fn is_path_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@/".contains(&byte)
}

/// Percent-encode literal template text the way clients encode a path.
/// Existing escapes are kept with their hex uppercased.
fn encode_literal(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'%' && is_escape(bytes, i) {
            out.push('%');
            out.push(bytes[i + 1].to_ascii_uppercase() as char);
            out.push(bytes[i + 2].to_ascii_uppercase() as char);
            i += 3;
            continue;
        }
        if is_path_safe(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
        i += 1;
    }
    out
}

fn is_escape(bytes: &[u8], at: usize) -> bool {
    bytes.len() > at + 2 && bytes[at + 1].is_ascii_hexdigit() && bytes[at + 2].is_ascii_hexdigit()
}

/// Uppercase the hex digits of every escape in a raw request path, so
/// `%c3%a9` and `%C3%A9` reach the same route.
pub fn normalize_escapes(path: &str) -> Cow<'_, str> {
    let bytes = path.as_bytes();
    let needs_fix = (0..bytes.len()).any(|i| {
        bytes[i] == b'%'
            && is_escape(bytes, i)
            && (bytes[i + 1].is_ascii_lowercase() || bytes[i + 2].is_ascii_lowercase())
    });
    if !needs_fix {
        return Cow::Borrowed(path);
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && is_escape(bytes, i) {
            out.push(b'%');
            out.push(bytes[i + 1].to_ascii_uppercase());
            out.push(bytes[i + 2].to_ascii_uppercase());
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    // Only ASCII hex digits changed, so the bytes are still UTF-8.
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

fn parse_capture(template: &str, inner: &str) -> Result<Capture, PatternError> {
    let word = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let (type_name, name) = match inner.split_once(':') {
        Some((type_name, name)) => {
            if type_name.is_empty() {
                return Err(PatternError::EmptyType(template.to_string()));
            }
            (type_name, name)
        }
        None => ("", inner),
    };

    if !word(type_name) || !word(name) {
        return Err(PatternError::InvalidCapture {
            template: template.to_string(),
            capture: inner.to_string(),
        });
    }
    if name.is_empty() {
        return Err(PatternError::EmptyName(template.to_string()));
    }
    if type_name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(PatternError::TypeStartsWithDigit(type_name.to_string()));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(PatternError::NameStartsWithDigit(name.to_string()));
    }

    let kind = CaptureKind::from_type_name(type_name)
        .ok_or_else(|| PatternError::UnknownType(type_name.to_string()))?;

    Ok(Capture {
        name: name.to_string(),
        kind,
    })
}
