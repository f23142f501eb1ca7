// Sign-in and sign-out handlers for local accounts

use crate::authenticator::SessionAuthenticator;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};
use trestle_core::{Error, Handler, HandlerResult, RequestContext};

/// Paths never used as a post-signout destination.
pub const SIGNOUT_REDIRECT_EXCLUDES: &[&str] = &["/admin/", "/signin"];

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "on" | "true" | "yes"
    )
}

/// Checks `email` and `passwd` against the request tenant's local accounts.
///
/// On success the session cookie is set and the redacted subject is
/// returned as JSON. A true `remember` field extends the cookie lifetime.
pub struct LocalSigninHandler {
    auth: Arc<SessionAuthenticator>,
}

impl LocalSigninHandler {
    pub fn new(auth: Arc<SessionAuthenticator>) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl Handler for LocalSigninHandler {
    async fn call(&self, ctx: &mut RequestContext) -> Result<HandlerResult, Error> {
        let (email, password, remember) = {
            let input = ctx.request.input()?;
            (
                input.get_or("email", "").trim().to_lowercase(),
                input.get_or("passwd", "").to_string(),
                is_truthy(input.get_or("remember", "")),
            )
        };
        if email.is_empty() || password.is_empty() {
            return Err(Error::BadRequest("email and password are required".to_string()));
        }

        let tenant_id = ctx.tenant_id().unwrap_or_default().to_string();
        let Some(subject) = self
            .auth
            .check_password(&tenant_id, &email, &password)
            .await?
        else {
            debug!(tenant = %tenant_id, "Sign-in rejected");
            return Err(Error::Unauthorized("invalid credentials".to_string()));
        };

        self.auth.sign_in(ctx, &subject, remember)?;
        info!(subject = %subject.id, tenant = %tenant_id, "Signed in");
        HandlerResult::json(ctx, &subject.redacted())
    }
}

/// Clears the session cookie and redirects back.
pub struct SignoutHandler {
    auth: Arc<SessionAuthenticator>,
}

impl SignoutHandler {
    pub fn new(auth: Arc<SessionAuthenticator>) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl Handler for SignoutHandler {
    async fn call(&self, ctx: &mut RequestContext) -> Result<HandlerResult, Error> {
        self.auth.clear_cookie(&mut ctx.response);
        ctx.identity = None;
        Err(Error::see_other(
            ctx.request.redirect_target(SIGNOUT_REDIRECT_EXCLUDES),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy() {
        for value in ["1", "on", "TRUE", " yes "] {
            assert!(is_truthy(value));
        }
        for value in ["", "0", "off", "no"] {
            assert!(!is_truthy(value));
        }
    }
}
