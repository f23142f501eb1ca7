// Template rendering collaborator

use crate::Error;
use async_trait::async_trait;
use bytes::Bytes;

/// Renders `HandlerResult::Render` results.
///
/// Engines plug in behind this trait; the dispatcher only knows the template
/// id and the JSON model.
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(&self, template: &str, model: &serde_json::Value) -> Result<Bytes, Error>;
}

/// Renderer used when none is configured. Every render fails with a
/// template error, which surfaces as a 500.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRenderer;

#[async_trait]
impl TemplateRenderer for NoRenderer {
    async fn render(&self, template: &str, _model: &serde_json::Value) -> Result<Bytes, Error> {
        Err(Error::Template(format!(
            "no template renderer configured for '{}'",
            template
        )))
    }
}
