//! Stateless signed session cookies for Trestle.
//!
//! No session table is kept on the server. The cookie names a subject and
//! carries an HMAC over the subject's current secret, so changing a password
//! or access token signs out every device at once.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trestle_core::{Dispatcher, RouteTable};
//! use trestle_session::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryIdentityStore::new());
//! let auth = Arc::new(SessionAuthenticator::new(
//!     SessionConfig::new("a-long-random-server-key"),
//!     store,
//! )?);
//!
//! let routes = RouteTable::builder()
//!     .post("/signin", Arc::new(LocalSigninHandler::new(auth.clone())))
//!     .get("/signout", Arc::new(SignoutHandler::new(auth.clone())))
//!     .build()?;
//!
//! let dispatcher = Dispatcher::builder()
//!     .routes(routes)
//!     .filter(SessionFilter::new(auth))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod config;
pub mod error;
pub mod handlers;
pub mod password;
pub mod store;
pub mod token;

pub use authenticator::{SessionAuthenticator, SessionFilter, parse_basic_credentials};
pub use config::{DEFAULT_COOKIE_NAME, SessionConfig};
pub use error::{SessionError, SessionResult};
pub use handlers::{LocalSigninHandler, SignoutHandler};
pub use password::PasswordHasher;
pub use store::{IdentityStore, LOCAL_PROVIDER, MemoryIdentityStore, Subject};
pub use token::{SessionToken, TokenSigner};
