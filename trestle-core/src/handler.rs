// Route handlers and their results

use crate::context::RequestContext;
use crate::streaming::ByteStream;
use crate::Error;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// What a handler produced. The dispatcher turns it into the response body.
#[derive(Debug)]
pub enum HandlerResult {
    /// Bytes written to the body verbatim.
    Body(Bytes),
    /// Rendered through the configured `TemplateRenderer`.
    Render {
        template: String,
        model: serde_json::Value,
    },
    /// Passed to the transport chunk by chunk.
    Stream(ByteStream),
}

impl HandlerResult {
    pub fn text(body: impl Into<String>) -> Self {
        HandlerResult::Body(Bytes::from(body.into()))
    }

    pub fn render(template: impl Into<String>, model: serde_json::Value) -> Self {
        HandlerResult::Render {
            template: template.into(),
            model,
        }
    }

    pub fn empty() -> Self {
        HandlerResult::Body(Bytes::new())
    }

    /// Serialize `value` as the body and set a JSON content type.
    pub fn json<T: serde::Serialize>(
        ctx: &mut RequestContext,
        value: &T,
    ) -> Result<Self, Error> {
        let body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        ctx.response.set_content_type("application/json");
        Ok(HandlerResult::Body(body.into()))
    }
}

impl From<Bytes> for HandlerResult {
    fn from(body: Bytes) -> Self {
        HandlerResult::Body(body)
    }
}

impl From<ByteStream> for HandlerResult {
    fn from(stream: ByteStream) -> Self {
        HandlerResult::Stream(stream)
    }
}

/// Code bound to a route.
///
/// Captured path parameters are available as `ctx.params`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut RequestContext) -> Result<HandlerResult, Error>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<HandlerResult, Error>>
        + Send
        + Sync,
{
    async fn call(&self, ctx: &mut RequestContext) -> Result<HandlerResult, Error> {
        (self.0)(ctx).await
    }
}

/// Wrap an async closure as a handler.
///
/// ```
/// use trestle_core::handler::{handler_fn, HandlerResult};
///
/// let hello = handler_fn(|ctx| {
///     Box::pin(async move {
///         let name = ctx.params.get_str("name").unwrap_or("world").to_string();
///         Ok(HandlerResult::text(format!("Hello, {}!", name)))
///     })
/// });
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, Result<HandlerResult, Error>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler(f))
}
