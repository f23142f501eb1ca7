//! Locale filter

use crate::locale::{first_language, negotiate_locale, parse_accept_language, Locale};
use crate::{I18nError, Result};
use async_trait::async_trait;
use tracing::trace;
use trestle_core::{Error, Filter, RequestContext};

/// Sets `ctx.locale` from `Accept-Language`.
///
/// Without a supported list the first language range is used as written,
/// lowercased. With one, the header's preferences are negotiated against it.
/// Either way a request with no usable header gets the default, `en`.
#[derive(Debug, Clone)]
pub struct LocaleFilter {
    default: Locale,
    supported: Vec<Locale>,
}

impl Default for LocaleFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl LocaleFilter {
    pub fn new() -> Self {
        Self {
            default: Locale::default(),
            supported: Vec::new(),
        }
    }

    pub fn with_default(mut self, tag: &str) -> Result<Self> {
        self.default = Locale::parse(tag)?;
        Ok(self)
    }

    /// Restrict the result to these tags. The first one becomes the default
    /// unless [`LocaleFilter::with_default`] is called afterwards.
    pub fn with_supported<'a>(mut self, tags: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let supported = tags
            .into_iter()
            .map(Locale::parse)
            .collect::<Result<Vec<_>>>()?;
        let Some(first) = supported.first() else {
            return Err(I18nError::NoSupportedLocales);
        };
        self.default = first.clone();
        self.supported = supported;
        Ok(self)
    }

    /// The lowercase locale key for an `Accept-Language` value.
    pub fn select(&self, accept_language: Option<&str>) -> String {
        let Some(header) = accept_language else {
            return self.default.key();
        };

        if self.supported.is_empty() {
            return first_language(header).unwrap_or_else(|| self.default.key());
        }

        let requested = parse_accept_language(header);
        negotiate_locale(&requested, &self.supported)
            .unwrap_or(&self.default)
            .key()
    }
}

#[async_trait]
impl Filter for LocaleFilter {
    fn name(&self) -> &'static str {
        "locale"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> std::result::Result<(), Error> {
        ctx.locale = self.select(ctx.request.header("accept-language"));
        trace!(locale = %ctx.locale, "Locale selected");
        Ok(())
    }
}
