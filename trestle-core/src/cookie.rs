// Cookie serialization and parsing

use chrono::{DateTime, NaiveDate, Utc};

/// Absolute expiry for a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Seconds since the Unix epoch.
    Timestamp(i64),
    At(DateTime<Utc>),
    /// Midnight UTC at the start of the given day.
    Date(NaiveDate),
}

impl Expiry {
    pub fn to_datetime(&self) -> DateTime<Utc> {
        match self {
            Expiry::Timestamp(secs) => {
                DateTime::from_timestamp(*secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
            }
            Expiry::At(at) => *at,
            Expiry::Date(day) => day
                .and_hms_opt(0, 0, 0)
                .map(|naive| naive.and_utc())
                .unwrap_or(DateTime::UNIX_EPOCH),
        }
    }

    /// `Wdy, DD-Mon-YYYY HH:MM:SS GMT`
    pub fn http_date(&self) -> String {
        self.to_datetime()
            .format("%a, %d-%b-%Y %H:%M:%S GMT")
            .to_string()
    }
}

impl From<DateTime<Utc>> for Expiry {
    fn from(at: DateTime<Utc>) -> Self {
        Expiry::At(at)
    }
}

impl From<NaiveDate> for Expiry {
    fn from(day: NaiveDate) -> Self {
        Expiry::Date(day)
    }
}

/// Attributes of a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub max_age: Option<i64>,
    pub expires: Option<Expiry>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            max_age: None,
            expires: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: false,
        }
    }
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Absolute expiry. Takes precedence over `max_age` when both are set.
    pub fn expires(mut self, expiry: impl Into<Expiry>) -> Self {
        self.expires = Some(expiry.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
}

/// Render the value of a `Set-Cookie` header.
///
/// ```
/// use trestle_core::cookie::{format_set_cookie, CookieOptions};
///
/// let header = format_set_cookie("theme", "dark", &CookieOptions::new().max_age(60).http_only(true));
/// assert_eq!(header, "theme=dark; Max-Age=60; Path=/; HttpOnly");
/// ```
pub fn format_set_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut parts = vec![format!(
        "{}={}",
        urlencoding::encode(name),
        urlencoding::encode(value)
    )];

    if let Some(expires) = &options.expires {
        parts.push(format!("Expires={}", expires.http_date()));
    } else if let Some(max_age) = options.max_age {
        parts.push(format!("Max-Age={}", max_age));
    }
    if !options.path.is_empty() {
        parts.push(format!("Path={}", options.path));
    }
    if let Some(domain) = &options.domain {
        parts.push(format!("Domain={}", domain));
    }
    if options.secure {
        parts.push("Secure".to_string());
    }
    if options.http_only {
        parts.push("HttpOnly".to_string());
    }

    parts.join("; ")
}

/// Parse a `Cookie` request header. Names and values are percent-decoded and
/// the first occurrence of a name wins.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    let mut cookies: Vec<(String, String)> = Vec::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = decode(name.trim());
        if name.is_empty() || cookies.iter().any(|(n, _)| *n == name) {
            continue;
        }
        let value = decode(value.trim().trim_matches('"'));
        cookies.push((name, value));
    }
    cookies
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}
