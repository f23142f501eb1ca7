// HTTP methods and per-route method masks

use std::fmt;
use std::ops::BitOr;

/// HTTP methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::GET,
        HttpMethod::POST,
        HttpMethod::PUT,
        HttpMethod::DELETE,
        HttpMethod::PATCH,
        HttpMethod::HEAD,
        HttpMethod::OPTIONS,
    ];

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of methods a route accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct MethodMask(u8);

impl MethodMask {
    pub const NONE: MethodMask = MethodMask(0);
    pub const GET: MethodMask = MethodMask(1 << HttpMethod::GET as u8);
    pub const POST: MethodMask = MethodMask(1 << HttpMethod::POST as u8);
    pub const PUT: MethodMask = MethodMask(1 << HttpMethod::PUT as u8);
    pub const DELETE: MethodMask = MethodMask(1 << HttpMethod::DELETE as u8);
    pub const PATCH: MethodMask = MethodMask(1 << HttpMethod::PATCH as u8);
    pub const HEAD: MethodMask = MethodMask(1 << HttpMethod::HEAD as u8);
    pub const OPTIONS: MethodMask = MethodMask(1 << HttpMethod::OPTIONS as u8);
    pub const ANY: MethodMask = MethodMask(0b0111_1111);

    pub fn allows(&self, method: HttpMethod) -> bool {
        self.0 & method.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Methods in the mask, in declaration order.
    pub fn methods(&self) -> Vec<HttpMethod> {
        HttpMethod::ALL
            .into_iter()
            .filter(|m| self.allows(*m))
            .collect()
    }

    /// Parse a list like `["GET", "post"]`. Unknown names yield `None`.
    pub fn parse<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        names
            .into_iter()
            .try_fold(MethodMask::NONE, |mask, name| {
                HttpMethod::from_str(name).map(|m| mask | m)
            })
    }
}

impl From<HttpMethod> for MethodMask {
    fn from(method: HttpMethod) -> Self {
        MethodMask(method.bit())
    }
}

impl BitOr for MethodMask {
    type Output = MethodMask;

    fn bitor(self, rhs: MethodMask) -> MethodMask {
        MethodMask(self.0 | rhs.0)
    }
}

impl BitOr<HttpMethod> for MethodMask {
    type Output = MethodMask;

    fn bitor(self, rhs: HttpMethod) -> MethodMask {
        MethodMask(self.0 | rhs.bit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_round_trip() {
        for method in HttpMethod::ALL {
            assert_eq!(HttpMethod::from_str(method.as_str()), Some(method));
        }
        assert_eq!(HttpMethod::from_str("get"), Some(HttpMethod::GET));
        assert_eq!(HttpMethod::from_str("BREW"), None);
    }

    #[test]
    fn test_mask_membership() {
        let mask = MethodMask::GET | MethodMask::HEAD;
        assert!(mask.allows(HttpMethod::GET));
        assert!(mask.allows(HttpMethod::HEAD));
        assert!(!mask.allows(HttpMethod::POST));
        assert_eq!(mask.methods(), vec![HttpMethod::GET, HttpMethod::HEAD]);
        assert!(MethodMask::ANY.allows(HttpMethod::OPTIONS));
    }

    #[test]
    fn test_mask_parse() {
        assert_eq!(
            MethodMask::parse(["GET", "post"]),
            Some(MethodMask::GET | MethodMask::POST)
        );
        assert_eq!(MethodMask::parse(["GET", "BREW"]), None);
    }
}
