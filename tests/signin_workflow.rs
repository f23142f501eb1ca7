//! Sign-in across the full filter stack: tenant, session, locale.

use std::sync::Arc;
use trestle::prelude::*;
use trestle::trestle_config::{AppSettings, ConfigManager};
use trestle::trestle_session::{
    DEFAULT_COOKIE_NAME, IdentityStore, LOCAL_PROVIDER, LocalSigninHandler, MemoryIdentityStore,
    PasswordHasher, SessionAuthenticator, SessionFilter, SignoutHandler, Subject,
};
use trestle::trestle_tenancy::{HostTenantResolver, MemoryTenantStore, TenantFilter};
use trestle::{Tenant, session_config};
use trestle_testing::*;

struct Site {
    client: TestClient,
    identities: Arc<MemoryIdentityStore>,
    auth: Arc<SessionAuthenticator>,
}

fn site() -> Site {
    let config = ConfigManager::new();
    config.set("session.secret_key", "workflow-test-signing-key").unwrap();
    let settings = AppSettings::from_manager(&config).unwrap();

    let tenants = Arc::new(MemoryTenantStore::with_tenants([
        Tenant::new("t-acme", "acme").with_domain("acme.test"),
        Tenant::new("t-globex", "globex").with_domain("globex.test"),
    ]));

    let hasher = PasswordHasher::new();
    let identities = Arc::new(MemoryIdentityStore::new());
    identities.insert(
        Subject::local("1", "t-acme", "editor@acme.test", hasher.hash("correct horse").unwrap())
            .with_name("Edith")
            .with_role(Role::Editor),
    );
    identities.insert(Subject::local(
        "2",
        "t-globex",
        "reader@globex.test",
        hasher.hash("battery staple").unwrap(),
    ));

    let auth = Arc::new(
        SessionAuthenticator::new(session_config(&settings.session), identities.clone()).unwrap(),
    );

    let me = handler_fn(|ctx| {
        Box::pin(async move {
            let body = serde_json::json!({
                "subject": ctx.identity.as_ref().map(|i| i.subject_id.clone()),
                "tenant": ctx.tenant_id(),
                "locale": ctx.locale,
            });
            HandlerResult::json(ctx, &body)
        })
    });
    let dashboard = handler_fn(|_ctx| Box::pin(async { Ok(HandlerResult::text("dashboard")) }));

    let client = TestAppBuilder::new()
        .post("/signin", Arc::new(LocalSigninHandler::new(auth.clone())))
        .get("/signout", Arc::new(SignoutHandler::new(auth.clone())))
        .get("/me", me)
        .routes(|routes| {
            routes.route_with_role(MethodMask::GET, "/admin/dashboard", Role::Editor, dashboard)
        })
        .filter(TenantFilter::new(Arc::new(HostTenantResolver::new(tenants))))
        .filter(SessionFilter::new(auth.clone()))
        .filter(LocaleFilter::new().with_supported(["en", "fr"]).unwrap())
        .build()
        .unwrap()
        .with_header("Host", "acme.test");

    Site {
        client,
        identities,
        auth,
    }
}

async fn sign_in(site: &Site, email: &str, password: &str) -> TestResponse {
    site.client
        .post_form("/signin", &[("email", email), ("passwd", password)])
        .await
}

async fn me(site: &Site, host: &str, cookie: &str) -> TestResponse {
    site.client
        .send(
            site.client
                .request(HttpMethod::GET, "/me")
                .header("Host", host)
                .header("Accept-Language", "fr-CA, en;q=0.5")
                .cookie(DEFAULT_COOKIE_NAME, cookie),
        )
        .await
}

async fn session_cookie(site: &Site) -> String {
    let response = sign_in(site, "Editor@Acme.test", "correct horse").await;
    assert_status(&response, 200);
    response
        .cookie(DEFAULT_COOKIE_NAME)
        .map(|c| c.value.clone())
        .unwrap()
}

#[tokio::test]
async fn test_signin_then_request_as_subject() {
    let site = site();
    let response = sign_in(&site, " editor@acme.test ", "correct horse").await;

    assert_status(&response, 200);
    assert_json_content_type(&response);
    let cookie = response.cookie(DEFAULT_COOKIE_NAME).unwrap();
    assert_eq!(cookie.max_age, Some(86_400));
    assert_eq!(cookie.path.as_deref(), Some("/"));

    let body: serde_json::Value = response.body_json().unwrap();
    assert_eq!(body["name"], "Edith");
    assert_eq!(body["password"], "******");

    let response = me(&site, "acme.test", &cookie.value).await;
    assert_status(&response, 200);
    let body: serde_json::Value = response.body_json().unwrap();
    assert_eq!(body["subject"], "1");
    assert_eq!(body["tenant"], "t-acme");
    assert_eq!(body["locale"], "fr");
}

#[tokio::test]
async fn test_wrong_tenant_cannot_sign_in() {
    let site = site();
    let response = site
        .client
        .send(
            site.client
                .request(HttpMethod::POST, "/signin")
                .header("Host", "globex.test")
                .form(&[("email", "editor@acme.test"), ("passwd", "correct horse")]),
        )
        .await;
    assert_status(&response, 401);
    assert_no_header(&response, "set-cookie");

    assert_status(&sign_in(&site, "editor@acme.test", "wrong").await, 401);
}

#[tokio::test]
async fn test_cookie_does_not_cross_tenants() {
    let site = site();
    let cookie = session_cookie(&site).await;

    let response = me(&site, "globex.test", &cookie).await;
    assert_status(&response, 200);
    assert_clears_cookie(&response, DEFAULT_COOKIE_NAME);
    let body: serde_json::Value = response.body_json().unwrap();
    assert_eq!(body["subject"], serde_json::Value::Null);
    assert_eq!(body["tenant"], "t-globex");
}

#[tokio::test]
async fn test_tampered_cookie_is_anonymous() {
    let site = site();
    let cookie = session_cookie(&site).await;
    let mut tampered = cookie.into_bytes();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = me(&site, "acme.test", &tampered).await;
    assert_clears_cookie(&response, DEFAULT_COOKIE_NAME);
    let body: serde_json::Value = response.body_json().unwrap();
    assert_eq!(body["subject"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_expired_cookie_is_anonymous() {
    let site = site();
    let subject = site
        .identities
        .find_subject(LOCAL_PROVIDER, "1")
        .await
        .unwrap()
        .unwrap();
    let stale = site.auth.issue_at(&subject, false, 1_000_000).unwrap();

    let response = me(&site, "acme.test", &stale).await;
    assert_clears_cookie(&response, DEFAULT_COOKIE_NAME);
    let body: serde_json::Value = response.body_json().unwrap();
    assert_eq!(body["subject"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_password_change_revokes_sessions() {
    let site = site();
    let cookie = session_cookie(&site).await;
    let new_hash = PasswordHasher::new().hash("new password").unwrap();
    assert!(site.identities.set_secret(LOCAL_PROVIDER, "1", new_hash));

    let body: serde_json::Value = me(&site, "acme.test", &cookie).await.body_json().unwrap();
    assert_eq!(body["subject"], serde_json::Value::Null);

    let cookie = sign_in(&site, "editor@acme.test", "new password")
        .await
        .cookie(DEFAULT_COOKIE_NAME)
        .map(|c| c.value.clone())
        .unwrap();
    let body: serde_json::Value = me(&site, "acme.test", &cookie).await.body_json().unwrap();
    assert_eq!(body["subject"], "1");
}

#[tokio::test]
async fn test_role_protected_route() {
    let site = site();
    assert_status(&site.client.get("/admin/dashboard").await, 401);

    let cookie = session_cookie(&site).await;
    let response = site
        .client
        .send(
            site.client
                .request(HttpMethod::GET, "/admin/dashboard")
                .cookie(DEFAULT_COOKIE_NAME, &cookie),
        )
        .await;
    assert_status(&response, 200);
    assert_eq!(response.body_string(), "dashboard");
}

#[tokio::test]
async fn test_signout() {
    let site = site();
    let cookie = session_cookie(&site).await;
    let response = site
        .client
        .send(
            site.client
                .request(HttpMethod::GET, "/signout")
                .cookie(DEFAULT_COOKIE_NAME, &cookie)
                .header("Referer", "http://acme.test/admin/dashboard"),
        )
        .await;
    assert_redirect(&response, "/");
    assert_clears_cookie(&response, DEFAULT_COOKIE_NAME);
}

#[tokio::test]
async fn test_unknown_site() {
    let site = site();
    let response = site
        .client
        .send(site.client.request(HttpMethod::GET, "/me").header("Host", "nowhere.test"))
        .await;
    assert_status(&response, 404);
}
