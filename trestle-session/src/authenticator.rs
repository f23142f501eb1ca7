//! Cookie issuance and verification, and the filter that binds identities.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::password::PasswordHasher;
use crate::store::{IdentityStore, Subject};
use crate::token::{SessionToken, TokenSigner};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};
use trestle_core::{CookieOptions, Error, Filter, RequestContext, Response};

/// Issues and verifies session cookies against an identity store.
pub struct SessionAuthenticator {
    config: SessionConfig,
    signer: TokenSigner,
    store: Arc<dyn IdentityStore>,
    hasher: PasswordHasher,
}

impl std::fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionAuthenticator {
    pub fn new(config: SessionConfig, store: Arc<dyn IdentityStore>) -> SessionResult<Self> {
        config.validate()?;
        let signer = TokenSigner::new(config.secret_key.as_bytes())?;
        Ok(Self {
            config,
            signer,
            store,
            hasher: PasswordHasher::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Encoded token for `subject`, valid from now.
    pub fn issue(&self, subject: &Subject, remember: bool) -> SessionResult<String> {
        self.issue_at(subject, remember, Utc::now().timestamp())
    }

    /// Encoded token for `subject` as if issued at unix time `now`.
    pub fn issue_at(&self, subject: &Subject, remember: bool, now: i64) -> SessionResult<String> {
        let ttl = i64::try_from(self.config.ttl(remember).as_secs())
            .map_err(|e| SessionError::Config(e.to_string()))?;
        let token = self
            .signer
            .sign(&subject.provider, &subject.id, now.saturating_add(ttl), &subject.secret)?;
        Ok(token.encode())
    }

    fn base_cookie_options(&self) -> CookieOptions {
        let mut options = CookieOptions::new()
            .path(self.config.path.clone())
            .secure(self.config.secure)
            .http_only(self.config.http_only);
        if let Some(domain) = &self.config.domain {
            options = options.domain(domain.clone());
        }
        options
    }

    /// Queue the session cookie carrying `token`.
    pub fn set_cookie(&self, response: &mut Response, token: &str, remember: bool) {
        let max_age = self.config.ttl(remember).as_secs() as i64;
        response.set_cookie(
            &self.config.cookie_name,
            token,
            &self.base_cookie_options().max_age(max_age),
        );
    }

    /// Expire the session cookie on the client.
    pub fn clear_cookie(&self, response: &mut Response) {
        response.delete_cookie(&self.config.cookie_name, &self.base_cookie_options());
    }

    /// Issue a cookie for `subject` and bind it to the request.
    pub fn sign_in(
        &self,
        ctx: &mut RequestContext,
        subject: &Subject,
        remember: bool,
    ) -> SessionResult<()> {
        let token = self.issue(subject, remember)?;
        self.set_cookie(&mut ctx.response, &token, remember);
        bind(ctx, subject);
        debug!(
            subject = %subject.id,
            provider = %subject.provider,
            tenant = %subject.tenant_id,
            remember,
            "Session issued"
        );
        Ok(())
    }

    pub async fn verify(&self, cookie: &str) -> SessionResult<Subject> {
        self.verify_at(cookie, Utc::now().timestamp()).await
    }

    /// Decode, check expiry and signature, then load the subject.
    pub async fn verify_at(&self, cookie: &str, now: i64) -> SessionResult<Subject> {
        let token = SessionToken::decode(cookie)?;
        if token.is_expired_at(now) {
            return Err(SessionError::Expired);
        }

        let unknown = || SessionError::UnknownSubject {
            provider: token.provider.clone(),
            subject_id: token.subject_id.clone(),
        };

        let secret = self
            .store
            .get_subject_secret(&token.provider, &token.subject_id)
            .await?
            .ok_or_else(unknown)?;
        self.signer.verify(&token, &secret)?;

        self.store
            .find_subject(&token.provider, &token.subject_id)
            .await?
            .ok_or_else(unknown)
    }

    /// Verify `cookie` and require its subject to belong to `tenant_id`.
    pub async fn verify_for_tenant(&self, cookie: &str, tenant_id: &str) -> SessionResult<Subject> {
        let subject = self.verify(cookie).await?;
        if subject.tenant_id != tenant_id {
            return Err(SessionError::TenantMismatch {
                subject_id: subject.id,
                subject_tenant: subject.tenant_id,
            });
        }
        Ok(subject)
    }

    /// Look up a local account of `tenant_id` and check its password.
    pub async fn check_password(
        &self,
        tenant_id: &str,
        email: &str,
        password: &str,
    ) -> SessionResult<Option<Subject>> {
        let email = email.trim().to_lowercase();
        let Some(subject) = self.store.find_by_email(tenant_id, &email).await? else {
            return Ok(None);
        };
        if !subject.is_local() || subject.tenant_id != tenant_id {
            return Ok(None);
        }
        if self.hasher.verify(password, &subject.secret)? {
            Ok(Some(subject))
        } else {
            Ok(None)
        }
    }

    /// Authenticate an `Authorization: Basic` header value.
    pub async fn authenticate_basic(
        &self,
        tenant_id: &str,
        authorization: &str,
    ) -> SessionResult<Option<Subject>> {
        let Some((email, password)) = parse_basic_credentials(authorization) else {
            return Ok(None);
        };
        self.check_password(tenant_id, &email, &password).await
    }
}

/// Split a Basic credential into user and password.
pub fn parse_basic_credentials(authorization: &str) -> Option<(String, String)> {
    let (scheme, encoded) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn bind(ctx: &mut RequestContext, subject: &Subject) {
    ctx.identity = Some(subject.identity());
    ctx.extensions.insert(subject.redacted());
}

/// Binds the identity named by the session cookie, or leaves the request
/// anonymous.
///
/// A cookie that fails to verify, or that belongs to another tenant, is
/// cleared and never fails the request.
pub struct SessionFilter {
    auth: Arc<SessionAuthenticator>,
}

impl SessionFilter {
    pub fn new(auth: Arc<SessionAuthenticator>) -> Self {
        Self { auth }
    }

    async fn from_cookie(&self, ctx: &mut RequestContext, tenant_id: &str) -> bool {
        let Some(cookie) = ctx
            .request
            .cookie(&self.auth.config.cookie_name)
            .map(str::to_string)
        else {
            return false;
        };

        match self.auth.verify_for_tenant(&cookie, tenant_id).await {
            Ok(subject) => {
                trace!(subject = %subject.id, tenant = %tenant_id, "Session verified");
                bind(ctx, &subject);
                return true;
            }
            Err(SessionError::TenantMismatch {
                subject_id,
                subject_tenant,
            }) => {
                warn!(
                    subject = %subject_id,
                    subject_tenant = %subject_tenant,
                    tenant = %tenant_id,
                    "Session presented to another tenant"
                );
            }
            Err(err) if err.is_tampering() => {
                warn!(error = %err, path = %ctx.request.raw_path(), "Rejected session cookie");
            }
            Err(err @ (SessionError::Store(_) | SessionError::Config(_))) => {
                error!(error = %err, "Session verification failed");
            }
            Err(err) => {
                debug!(error = %err, "Session cookie not accepted");
            }
        }

        self.auth.clear_cookie(&mut ctx.response);
        false
    }

    async fn from_basic(&self, ctx: &mut RequestContext, tenant_id: &str) {
        let Some(authorization) = ctx.request.header("authorization").map(str::to_string) else {
            return;
        };
        match self.auth.authenticate_basic(tenant_id, &authorization).await {
            Ok(Some(subject)) => {
                trace!(subject = %subject.id, tenant = %tenant_id, "Basic credentials accepted");
                bind(ctx, &subject);
            }
            Ok(None) => debug!(tenant = %tenant_id, "Basic credentials rejected"),
            Err(err) => warn!(error = %err, "Basic authentication failed"),
        }
    }
}

#[async_trait]
impl Filter for SessionFilter {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), Error> {
        let tenant_id = ctx.tenant_id().unwrap_or_default().to_string();

        if !self.from_cookie(ctx, &tenant_id).await && self.auth.config.basic_auth {
            self.from_basic(ctx, &tenant_id).await;
        }
        Ok(())
    }
}
