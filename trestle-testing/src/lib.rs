//! Testing utilities for Trestle applications.
//!
//! [`TestClient`] drives a [`Dispatcher`](trestle_core::Dispatcher) in-process:
//! no socket, no hyper. Streamed bodies are collected and `Set-Cookie`
//! headers parsed so tests can carry a session from one request to the next.
//!
//! ```
//! use trestle_core::{handler_fn, HandlerResult};
//! use trestle_testing::*;
//!
//! # tokio_test::block_on(async {
//! let client = TestAppBuilder::new()
//!     .get(
//!         "/hello/<name>",
//!         handler_fn(|ctx| {
//!             Box::pin(async move {
//!                 let name = ctx.params.get_str("name").unwrap_or_default().to_string();
//!                 Ok(HandlerResult::text(format!("Hello, {}!", name)))
//!             })
//!         }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let response = client.get("/hello/ada").await;
//! assert_status(&response, 200);
//! assert_eq!(response.body_string(), "Hello, ada!");
//! # });
//! ```

pub mod assertions;
pub mod response;
pub mod test_app;
pub mod test_client;

pub use assertions::*;
pub use response::{SetCookie, TestResponse};
pub use test_app::TestAppBuilder;
pub use test_client::{TestClient, TestRequestBuilder};
