// Core library for the Trestle web framework
// Route compilation, dispatch, the request/response model and the per-request context

pub mod application;
pub mod context;
pub mod cookie;
pub mod dispatcher;
pub mod error;
pub mod extensions;
pub mod filter;
pub mod form;
pub mod handler;
pub mod logging;
pub mod method;
pub mod pattern;
pub mod reload;
pub mod request;
pub mod response;
pub mod routing;
pub mod static_assets;
pub mod status;
pub mod streaming;
pub mod template;

// Re-export commonly used types
pub use application::*;
pub use context::*;
pub use dispatcher::*;
pub use error::*;
pub use extensions::*;
pub use filter::*;
pub use form::*;
pub use handler::*;
pub use method::*;
pub use pattern::*;
pub use reload::*;
pub use request::*;
pub use response::*;
pub use routing::*;
pub use static_assets::*;
pub use status::*;
pub use streaming::*;
pub use template::*;
