// HTTP status codes and status lines

use crate::Error;
use std::fmt;

macro_rules! http_statuses {
    ($($(#[$doc:meta])* $variant:ident = $code:literal => $reason:literal,)+) => {
        /// HTTP status codes with a known reason phrase
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HttpStatus {
            $($(#[$doc])* $variant = $code,)+
        }

        impl HttpStatus {
            /// Get the reason phrase for the status code
            pub fn reason(&self) -> &'static str {
                match self {
                    $(HttpStatus::$variant => $reason,)+
                }
            }

            /// Create status from u16 code
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(HttpStatus::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

http_statuses! {
    Continue = 100 => "Continue",
    SwitchingProtocols = 101 => "Switching Protocols",
    Processing = 102 => "Processing",

    Ok = 200 => "OK",
    Created = 201 => "Created",
    Accepted = 202 => "Accepted",
    NonAuthoritativeInformation = 203 => "Non-Authoritative Information",
    NoContent = 204 => "No Content",
    ResetContent = 205 => "Reset Content",
    PartialContent = 206 => "Partial Content",
    MultiStatus = 207 => "Multi Status",
    ImUsed = 226 => "IM Used",

    MultipleChoices = 300 => "Multiple Choices",
    MovedPermanently = 301 => "Moved Permanently",
    Found = 302 => "Found",
    SeeOther = 303 => "See Other",
    NotModified = 304 => "Not Modified",
    UseProxy = 305 => "Use Proxy",
    TemporaryRedirect = 307 => "Temporary Redirect",

    BadRequest = 400 => "Bad Request",
    Unauthorized = 401 => "Unauthorized",
    PaymentRequired = 402 => "Payment Required",
    Forbidden = 403 => "Forbidden",
    NotFound = 404 => "Not Found",
    MethodNotAllowed = 405 => "Method Not Allowed",
    NotAcceptable = 406 => "Not Acceptable",
    ProxyAuthenticationRequired = 407 => "Proxy Authentication Required",
    RequestTimeout = 408 => "Request Timeout",
    Conflict = 409 => "Conflict",
    Gone = 410 => "Gone",
    LengthRequired = 411 => "Length Required",
    PreconditionFailed = 412 => "Precondition Failed",
    PayloadTooLarge = 413 => "Request Entity Too Large",
    UriTooLong = 414 => "Request URI Too Long",
    UnsupportedMediaType = 415 => "Unsupported Media Type",
    RangeNotSatisfiable = 416 => "Requested Range Not Satisfiable",
    ExpectationFailed = 417 => "Expectation Failed",
    ImATeapot = 418 => "I'm a teapot",
    UnprocessableEntity = 422 => "Unprocessable Entity",
    Locked = 423 => "Locked",
    FailedDependency = 424 => "Failed Dependency",
    UpgradeRequired = 426 => "Upgrade Required",

    InternalServerError = 500 => "Internal Server Error",
    NotImplemented = 501 => "Not Implemented",
    BadGateway = 502 => "Bad Gateway",
    ServiceUnavailable = 503 => "Service Unavailable",
    GatewayTimeout = 504 => "Gateway Timeout",
    HttpVersionNotSupported = 505 => "HTTP Version Not Supported",
    InsufficientStorage = 507 => "Insufficient Storage",
    NotExtended = 510 => "Not Extended",
}

impl HttpStatus {
    /// Get the numeric status code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.code())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code())
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.code()
    }
}

/// Matches `^\d\d\d( [\w ]+)?$`.
fn is_valid_status_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return false;
    }
    match line[3..].strip_prefix(' ') {
        None => line.len() == 3,
        Some(text) => {
            !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ' ')
        }
    }
}

/// A validated `NNN Reason` status line as sent to the transport.
///
/// Numeric codes outside the reason table render as the bare number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    code: u16,
    text: String,
}

impl StatusLine {
    /// Build from a numeric code in `100..=999`.
    pub fn from_code(code: u16) -> Result<Self, Error> {
        if !(100..=999).contains(&code) {
            return Err(Error::InvalidStatus(code.to_string()));
        }
        let text = match HttpStatus::from_code(code) {
            Some(status) => status.to_string(),
            None => code.to_string(),
        };
        Ok(Self { code, text })
    }

    /// Parse a pre-formatted status line such as `"404 Not Found"` or `"299"`.
    pub fn parse(line: &str) -> Result<Self, Error> {
        if !is_valid_status_line(line) {
            return Err(Error::InvalidStatus(line.to_string()));
        }
        let code = line[..3]
            .parse()
            .map_err(|_| Error::InvalidStatus(line.to_string()))?;
        Ok(Self {
            code,
            text: line.to_string(),
        })
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        HttpStatus::Ok.into()
    }
}

impl From<HttpStatus> for StatusLine {
    fn from(status: HttpStatus) -> Self {
        Self {
            code: status.code(),
            text: status.to_string(),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
