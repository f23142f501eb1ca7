//! Session cookies through a dispatcher

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use trestle_core::{
    handler_fn, Error, Filter, HandlerResult, MethodMask, RequestContext, Role, Tenant,
};
use trestle_session::*;
use trestle_testing::*;

const KEY: &str = "integration-test-server-key";

/// Binds a tenant named after the request host.
struct HostTenant;

#[async_trait]
impl Filter for HostTenant {
    fn name(&self) -> &'static str {
        "host_tenant"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), Error> {
        let host = ctx.request.host().to_string();
        ctx.tenant = Some(Tenant::new(host.clone(), host));
        Ok(())
    }
}

struct Fixture {
    store: Arc<MemoryIdentityStore>,
    auth: Arc<SessionAuthenticator>,
    client: TestClient,
}

fn fixture(config: SessionConfig) -> Fixture {
    let hasher = PasswordHasher::new();
    let store = Arc::new(MemoryIdentityStore::new());
    store.insert(
        Subject::local("7", "a.test", "ada@example.com", hasher.hash("s3cret").unwrap())
            .with_name("Ada")
            .with_role(Role::Editor),
    );
    store.insert(Subject::local(
        "8",
        "b.test",
        "bob@example.com",
        hasher.hash("hunter2").unwrap(),
    ));

    let auth = Arc::new(SessionAuthenticator::new(config, store.clone()).unwrap());
    let client = TestAppBuilder::new()
        .post("/signin", Arc::new(LocalSigninHandler::new(auth.clone())))
        .get("/signout", Arc::new(SignoutHandler::new(auth.clone())))
        .get(
            "/whoami",
            handler_fn(|ctx| {
                Box::pin(async move {
                    let who = ctx
                        .identity
                        .as_ref()
                        .map(|i| i.subject_id.clone())
                        .unwrap_or_else(|| "anonymous".to_string());
                    Ok(HandlerResult::text(who))
                })
            }),
        )
        .routes(|routes| {
            routes.route_with_role(
                MethodMask::GET,
                "/admin/posts",
                Role::Editor,
                handler_fn(|ctx| {
                    Box::pin(async move {
                        let subject = ctx.extensions.get::<Subject>().map(|s| s.secret.clone());
                        Ok(HandlerResult::text(subject.unwrap_or_default()))
                    })
                }),
            )
        })
        .filter(HostTenant)
        .filter(SessionFilter::new(auth.clone()))
        .build()
        .unwrap();

    Fixture {
        store,
        auth,
        client: client.with_header("Host", "a.test"),
    }
}

fn default_fixture() -> Fixture {
    fixture(SessionConfig::new(KEY))
}

async fn whoami(client: &TestClient, cookie: &str) -> TestResponse {
    client
        .send(
            client
                .request(trestle_core::HttpMethod::GET, "/whoami")
                .cookie(DEFAULT_COOKIE_NAME, cookie),
        )
        .await
}

async fn whoami_basic(client: &TestClient, user: &str, password: &str) -> TestResponse {
    use base64::Engine;
    let credentials =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    client
        .send(
            client
                .request(trestle_core::HttpMethod::GET, "/whoami")
                .header("Authorization", &format!("Basic {}", credentials)),
        )
        .await
}

#[tokio::test]
async fn test_signin_sets_cookie_and_returns_redacted_subject() {
    let fx = default_fixture();
    let response = fx
        .client
        .post_form("/signin", &[("email", "  ADA@example.com "), ("passwd", "s3cret")])
        .await;

    assert_status(&response, 200);
    assert_sets_cookie(&response, DEFAULT_COOKIE_NAME);
    let cookie = response.cookie(DEFAULT_COOKIE_NAME).unwrap();
    assert_eq!(cookie.max_age, Some(86400));
    assert!(cookie.http_only);

    let body: serde_json::Value = response.body_json().unwrap();
    assert_eq!(body["id"], "7");
    assert_eq!(body["password"], "******");
    assert!(!response.body_string().contains("argon2"));

    let response = whoami(&fx.client, &cookie.value).await;
    assert_eq!(response.body_string(), "7");
}

#[tokio::test]
async fn test_remember_extends_lifetime() {
    let fx = default_fixture();
    let response = fx
        .client
        .post_form(
            "/signin",
            &[("email", "ada@example.com"), ("passwd", "s3cret"), ("remember", "1")],
        )
        .await;
    let cookie = response.cookie(DEFAULT_COOKIE_NAME).unwrap();
    assert_eq!(cookie.max_age, Some(31_536_000));
}

#[tokio::test]
async fn test_signin_failures() {
    let fx = default_fixture();

    let response = fx
        .client
        .post_form("/signin", &[("email", "ada@example.com"), ("passwd", "wrong")])
        .await;
    assert_status(&response, 401);
    assert!(response.cookie(DEFAULT_COOKIE_NAME).is_none());

    let response = fx.client.post_form("/signin", &[("email", "ada@example.com")]).await;
    assert_status(&response, 400);

    // Bob belongs to b.test
    let response = fx
        .client
        .post_form("/signin", &[("email", "bob@example.com"), ("passwd", "hunter2")])
        .await;
    assert_status(&response, 401);
}

#[tokio::test]
async fn test_tampered_cookie_is_cleared() {
    let fx = default_fixture();
    let subject = fx.store.find_subject(LOCAL_PROVIDER, "7").await.unwrap().unwrap();
    let token = fx.auth.issue(&subject, false).unwrap();

    for i in [0, token.len() / 2, token.len() - 1] {
        let mut bytes = token.clone().into_bytes();
        bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        let response = whoami(&fx.client, &tampered).await;
        assert_status(&response, 200);
        assert_eq!(response.body_string(), "anonymous");
        assert_clears_cookie(&response, DEFAULT_COOKIE_NAME);
    }
}

#[tokio::test]
async fn test_expired_cookie_is_anonymous() {
    let fx = default_fixture();
    let subject = fx.store.find_subject(LOCAL_PROVIDER, "7").await.unwrap().unwrap();
    let issued = Utc::now().timestamp() - 2 * 86400;
    let token = fx.auth.issue_at(&subject, false, issued).unwrap();

    assert!(matches!(
        fx.auth.verify(&token).await,
        Err(SessionError::Expired)
    ));
    let response = whoami(&fx.client, &token).await;
    assert_eq!(response.body_string(), "anonymous");
    assert_clears_cookie(&response, DEFAULT_COOKIE_NAME);
}

#[tokio::test]
async fn test_secret_rotation_invalidates_cookie() {
    let fx = default_fixture();
    let subject = fx.store.find_subject(LOCAL_PROVIDER, "7").await.unwrap().unwrap();
    let token = fx.auth.issue(&subject, true).unwrap();
    assert_eq!(whoami(&fx.client, &token).await.body_string(), "7");

    let new_hash = PasswordHasher::new().hash("n3w-secret").unwrap();
    assert!(fx.store.set_secret(LOCAL_PROVIDER, "7", new_hash));

    assert!(matches!(
        fx.auth.verify(&token).await,
        Err(SessionError::SignatureMismatch)
    ));
    assert_eq!(whoami(&fx.client, &token).await.body_string(), "anonymous");
}

#[tokio::test]
async fn test_cross_tenant_cookie_is_rejected() {
    let fx = default_fixture();
    let bob = fx.store.find_subject(LOCAL_PROVIDER, "8").await.unwrap().unwrap();
    let token = fx.auth.issue(&bob, false).unwrap();

    // Valid on its own tenant
    let response = fx
        .client
        .send(
            fx.client
                .request(trestle_core::HttpMethod::GET, "/whoami")
                .header("Host", "b.test")
                .cookie(DEFAULT_COOKIE_NAME, &token),
        )
        .await;
    assert_eq!(response.body_string(), "8");

    assert_eq!(fx.auth.verify_for_tenant(&token, "b.test").await.unwrap().id, "8");
    match fx.auth.verify_for_tenant(&token, "a.test").await {
        Err(SessionError::TenantMismatch {
            subject_id,
            subject_tenant,
        }) => {
            assert_eq!(subject_id, "8");
            assert_eq!(subject_tenant, "b.test");
        }
        other => panic!("expected tenant mismatch, got {:?}", other),
    }

    let response = whoami(&fx.client, &token).await;
    assert_eq!(response.body_string(), "anonymous");
    assert_clears_cookie(&response, DEFAULT_COOKIE_NAME);
}

#[tokio::test]
async fn test_unknown_subject_is_anonymous() {
    let fx = default_fixture();
    let subject = fx.store.find_subject(LOCAL_PROVIDER, "7").await.unwrap().unwrap();
    let token = fx.auth.issue(&subject, false).unwrap();
    fx.store.remove(LOCAL_PROVIDER, "7");

    assert!(matches!(
        fx.auth.verify(&token).await,
        Err(SessionError::UnknownSubject { .. })
    ));
    assert_eq!(whoami(&fx.client, &token).await.body_string(), "anonymous");
}

#[tokio::test]
async fn test_role_from_session() {
    let fx = default_fixture();
    let ada = fx.store.find_subject(LOCAL_PROVIDER, "7").await.unwrap().unwrap();
    let token = fx.auth.issue(&ada, false).unwrap();

    let response = fx
        .client
        .send(
            fx.client
                .request(trestle_core::HttpMethod::GET, "/admin/posts")
                .cookie(DEFAULT_COOKIE_NAME, &token),
        )
        .await;
    assert_status(&response, 200);
    assert_eq!(response.body_string(), "******");

    assert_status(&fx.client.get("/admin/posts").await, 401);
}

#[tokio::test]
async fn test_signout_clears_cookie_and_redirects() {
    let fx = default_fixture();
    let response = fx
        .client
        .send(
            fx.client
                .request(trestle_core::HttpMethod::GET, "/signout")
                .header("Referer", "http://a.test/blog/hello?x=1"),
        )
        .await;
    assert_status(&response, 303);
    assert_header(&response, "Location", "/blog/hello?x=1");
    assert_clears_cookie(&response, DEFAULT_COOKIE_NAME);

    let response = fx
        .client
        .send(
            fx.client
                .request(trestle_core::HttpMethod::GET, "/signout")
                .header("Referer", "http://a.test/admin/posts"),
        )
        .await;
    assert_redirect(&response, "/");
}

#[tokio::test]
async fn test_basic_auth_fallback() {
    let fx = default_fixture();
    let response = whoami_basic(&fx.client, "ada@example.com", "s3cret").await;
    assert_eq!(response.body_string(), "7");

    let response = whoami_basic(&fx.client, "ada@example.com", "nope").await;
    assert_eq!(response.body_string(), "anonymous");

    let fx = fixture(SessionConfig::new(KEY).with_basic_auth(false));
    let response = whoami_basic(&fx.client, "ada@example.com", "s3cret").await;
    assert_eq!(response.body_string(), "anonymous");
}

#[test]
fn test_authenticator_rejects_weak_key() {
    let store = Arc::new(MemoryIdentityStore::new());
    assert!(matches!(
        SessionAuthenticator::new(SessionConfig::new("short"), store),
        Err(SessionError::Config(_))
    ));
}
