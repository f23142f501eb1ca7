//! Locales and Accept-Language parsing

use crate::{I18nError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A language with an optional region, e.g. `pt-BR`.
///
/// ```
/// use trestle_i18n::Locale;
///
/// let locale: Locale = "pt_br".parse().unwrap();
/// assert_eq!(locale.tag(), "pt-BR");
/// assert_eq!(locale.key(), "pt-br");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locale {
    /// Lowercase ISO 639 code
    pub language: String,
    /// Uppercase region, or a UN M.49 number
    pub region: Option<String>,
}

impl Locale {
    pub fn new(language: impl Into<String>, region: Option<&str>) -> Self {
        Self {
            language: language.into().to_ascii_lowercase(),
            region: region.map(str::to_ascii_uppercase),
        }
    }

    /// Parse a BCP 47 tag. Subtags other than the region (scripts,
    /// variants, extensions) are dropped.
    pub fn parse(tag: &str) -> Result<Self> {
        let mut subtags = tag.trim().split(['-', '_']);
        let language = subtags.next().unwrap_or_default();
        if !(2..=3).contains(&language.len()) || !language.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(I18nError::InvalidLocale(tag.to_string()));
        }

        let region = subtags.find(|s| {
            (s.len() == 2 && s.bytes().all(|b| b.is_ascii_alphabetic()))
                || (s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit()))
        });

        Ok(Self::new(language, region))
    }

    /// Canonical tag, e.g. `en-US`.
    pub fn tag(&self) -> String {
        match &self.region {
            Some(region) => format!("{}-{}", self.language, region),
            None => self.language.clone(),
        }
    }

    /// Lowercase tag, the form stored on the request context.
    pub fn key(&self) -> String {
        self.tag().to_ascii_lowercase()
    }

    pub fn language_only(&self) -> Self {
        Self {
            language: self.language.clone(),
            region: None,
        }
    }

    /// Same language; `other` without a region matches any region.
    pub fn matches(&self, other: &Locale) -> bool {
        self.language == other.language && (other.region.is_none() || self.region == other.region)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl FromStr for Locale {
    type Err = I18nError;

    fn from_str(s: &str) -> Result<Self> {
        Locale::parse(s)
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("en", None)
    }
}

/// The first language range exactly as the client wrote it, lowercased.
///
/// Quality values are ignored. Returns `None` for a missing, empty or
/// wildcard-first header.
///
/// ```
/// use trestle_i18n::first_language;
///
/// assert_eq!(first_language("fr-CH, fr;q=0.9, en;q=0.8"), Some("fr-ch".to_string()));
/// assert_eq!(first_language("*"), None);
/// ```
pub fn first_language(header: &str) -> Option<String> {
    let first = header.split(',').next()?;
    let range = first.split(';').next()?.trim();
    if range.is_empty() || range == "*" {
        return None;
    }
    Some(range.to_ascii_lowercase())
}

fn quality(params: Option<&str>) -> Option<f32> {
    let Some(params) = params else {
        return Some(1.0);
    };
    for param in params.split(';') {
        if let Some(q) = param.trim().strip_prefix("q=") {
            return q.trim().parse::<f32>().ok().filter(|q| (0.0..=1.0).contains(q));
        }
    }
    Some(1.0)
}

/// Parse an Accept-Language header into locales, most preferred first.
///
/// Entries with `q=0`, wildcards and unparsable tags are skipped. Ties keep
/// header order.
///
/// ```
/// use trestle_i18n::parse_accept_language;
///
/// let locales = parse_accept_language("en;q=0.5, de-AT, *;q=0.1, fr;q=0");
/// let tags: Vec<String> = locales.iter().map(|l| l.tag()).collect();
/// assert_eq!(tags, ["de-AT", "en"]);
/// ```
pub fn parse_accept_language(header: &str) -> Vec<Locale> {
    let mut entries: Vec<(Locale, f32)> = header
        .split(',')
        .filter_map(|part| {
            let (range, params) = match part.split_once(';') {
                Some((range, params)) => (range.trim(), Some(params)),
                None => (part.trim(), None),
            };
            if range.is_empty() || range == "*" {
                return None;
            }
            let q = quality(params).filter(|q| *q > 0.0)?;
            Some((Locale::parse(range).ok()?, q))
        })
        .collect();

    // Stable, so equal weights stay in header order
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries.into_iter().map(|(locale, _)| locale).collect()
}

/// Pick the supported locale that best serves `requested`.
///
/// Each requested locale in turn is tried for an exact match, then for a
/// supported locale of the same language.
pub fn negotiate_locale<'a>(requested: &[Locale], supported: &'a [Locale]) -> Option<&'a Locale> {
    requested.iter().find_map(|wanted| {
        supported
            .iter()
            .find(|s| *s == wanted)
            .or_else(|| supported.iter().find(|s| s.language == wanted.language))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let locale = Locale::parse("zh-Hans-CN").unwrap();
        assert_eq!(locale.language, "zh");
        assert_eq!(locale.region.as_deref(), Some("CN"));

        assert_eq!(Locale::parse("es-419").unwrap().tag(), "es-419");
        assert_eq!(Locale::parse("EN").unwrap().tag(), "en");
        assert!(Locale::parse("").is_err());
        assert!(Locale::parse("english").is_err());
        assert!(Locale::parse("e1").is_err());
    }

    #[test]
    fn test_matches() {
        let en_us = Locale::parse("en-US").unwrap();
        assert!(en_us.matches(&Locale::parse("en").unwrap()));
        assert!(!en_us.matches(&Locale::parse("en-GB").unwrap()));
        assert!(!Locale::parse("en").unwrap().matches(&en_us));
        assert_eq!(en_us.language_only(), Locale::default());
    }

    #[test]
    fn test_quality_order() {
        let tags: Vec<String> = parse_accept_language("fr;q=0.8, en-US, en;q=0.9, de;q=0.8")
            .iter()
            .map(Locale::tag)
            .collect();
        assert_eq!(tags, ["en-US", "en", "fr", "de"]);
    }

    #[test]
    fn test_bad_quality_skipped() {
        assert!(parse_accept_language("fr;q=abc, de;q=2").is_empty());
        assert_eq!(parse_accept_language("it;level=1").len(), 1);
    }

    #[test]
    fn test_first_language() {
        assert_eq!(first_language("EN-gb;q=0.3, de"), Some("en-gb".to_string()));
        assert_eq!(first_language(""), None);
    }

    #[test]
    fn test_negotiate() {
        let supported = vec![
            Locale::parse("en").unwrap(),
            Locale::parse("fr-FR").unwrap(),
            Locale::parse("de").unwrap(),
        ];

        let requested = parse_accept_language("fr-CA, en;q=0.5");
        assert_eq!(negotiate_locale(&requested, &supported).map(Locale::tag), Some("fr-FR".to_string()));

        let requested = parse_accept_language("ja, de-AT;q=0.4");
        assert_eq!(negotiate_locale(&requested, &supported).map(Locale::tag), Some("de".to_string()));

        let requested = parse_accept_language("ja");
        assert!(negotiate_locale(&requested, &supported).is_none());
    }
}
