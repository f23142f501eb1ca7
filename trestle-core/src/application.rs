// hyper adapter serving a Dispatcher over HTTP/1.1

use crate::dispatcher::Dispatcher;
use crate::logging::{debug, info, warn};
use crate::request::RawRequest;
use crate::response::{TransportBody, TransportResponse};
use crate::Error;
use bytes::Bytes;
use futures_util::StreamExt;
use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming as IncomingBody};
use hyper::ext::ReasonPhrase;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};

type ResponseBody = BoxBody<Bytes, Error>;

/// Serves a [`Dispatcher`] over plain HTTP/1.1.
///
/// ```no_run
/// use std::sync::Arc;
/// use trestle_core::{Application, Dispatcher};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = Dispatcher::builder().build()?;
/// Application::new(Arc::new(dispatcher)).listen("127.0.0.1:8080").await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    dispatcher: Arc<Dispatcher>,
}

impl Application {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Bind `addr` and serve until the listener fails.
    pub async fn listen(self, addr: impl ToSocketAddrs) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections accepted from `listener`, one task per connection.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        info!(addr = %listener.local_addr()?, "Server listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let dispatcher = self.dispatcher.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let dispatcher = dispatcher.clone();
                    async move { handle_request(req, peer, dispatcher).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(peer = %peer, error = %err, "Error serving connection");
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<IncomingBody>,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> Result<Response<ResponseBody>, hyper::Error> {
    let (parts, body) = req.into_parts();

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    let mut raw = RawRequest::new(parts.method.as_str(), target).with_remote_addr(peer);
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            raw.headers.push((name.as_str().to_string(), value.to_string()));
        }
    }
    raw.body = body.collect().await?.to_bytes();

    Ok(into_hyper(dispatcher.dispatch(raw).await))
}

fn into_hyper(transport: TransportResponse) -> Response<ResponseBody> {
    let body = match transport.body {
        TransportBody::Full(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed(),
        TransportBody::Stream(stream) => {
            BodyExt::boxed(StreamBody::new(stream.map(|chunk| chunk.map(Frame::data))))
        }
    };

    let mut response = Response::new(body);
    let code = transport.status.code();
    *response.status_mut() =
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let standard = response.status().canonical_reason();
    if let Some((_, reason)) = transport.status.as_str().split_once(' ')
        && Some(reason) != standard
        && let Ok(phrase) = ReasonPhrase::try_from(reason.to_string())
    {
        response.extensions_mut().insert(phrase);
    }

    let headers = response.headers_mut();
    for (name, value) in transport.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid response header"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, HandlerResult};
    use crate::routing::RouteTable;
    use crate::streaming::ByteStream;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn exchange(request: &str) -> String {
        let table = RouteTable::builder()
            .get(
                "/hello/<name>",
                handler_fn(|ctx| {
                    Box::pin(async move {
                        let name = ctx.params.get_str("name").unwrap_or_default().to_string();
                        Ok(HandlerResult::text(format!("Hello, {}!", name)))
                    })
                }),
            )
            .get(
                "/stream",
                handler_fn(|_ctx| {
                    Box::pin(async move {
                        Ok(HandlerResult::Stream(ByteStream::iter(vec!["one,", "two"])))
                    })
                }),
            )
            .build()
            .unwrap();
        let dispatcher = Arc::new(Dispatcher::builder().routes(table).build().unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(Application::new(dispatcher).serve(listener));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_full_body() {
        let response =
            exchange("GET /hello/ada HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("content-type: text/html; charset=utf-8"));
        assert!(response.ends_with("Hello, ada!"));
    }

    #[tokio::test]
    async fn test_serves_stream() {
        let response =
            exchange("GET /stream HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
        assert!(response.contains("one,"));
        assert!(response.contains("two"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let response =
            exchange("GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
    }
}
