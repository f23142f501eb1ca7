//! TestClient against a live dispatcher

use trestle_core::{
    handler_fn, CookieOptions, Error, Filter, HandlerResult, HttpMethod, Identity, MethodMask,
    RequestContext, Role,
};
use trestle_testing::*;

struct AlwaysEditor;

#[async_trait::async_trait]
impl Filter for AlwaysEditor {
    fn name(&self) -> &'static str {
        "always_editor"
    }

    async fn apply(&self, ctx: &mut RequestContext) -> Result<(), Error> {
        ctx.identity = Some(Identity {
            provider: "local".to_string(),
            subject_id: "1".to_string(),
            tenant_id: String::new(),
            name: "Ed".to_string(),
            email: "ed@example.com".to_string(),
            role: Role::Editor,
        });
        Ok(())
    }
}

fn client() -> TestClient {
    TestAppBuilder::new()
        .get(
            "/echo",
            handler_fn(|ctx| {
                Box::pin(async move {
                    let input = ctx.request.input()?;
                    let tags = input.get_all("tag").join(",");
                    let theme = ctx.request.cookie("theme").unwrap_or("none").to_string();
                    let host = ctx.request.host().to_string();
                    Ok(HandlerResult::text(format!("{}|{}|{}", tags, theme, host)))
                })
            }),
        )
        .post(
            "/upload",
            handler_fn(|ctx| {
                Box::pin(async move {
                    let input = ctx.request.input()?;
                    let title = input.get_or("title", "").to_string();
                    let size = input.file("file").map(|f| f.len()).unwrap_or(0);
                    Ok(HandlerResult::text(format!("{}:{}", title, size)))
                })
            }),
        )
        .post(
            "/login",
            handler_fn(|ctx| {
                Box::pin(async move {
                    ctx.response
                        .set_cookie("sid", "abc 123", &CookieOptions::new().max_age(60));
                    HandlerResult::json(ctx, &serde_json::json!({ "ok": true }))
                })
            }),
        )
        .routes(|routes| {
            routes.route_with_role(
                MethodMask::GET,
                "/admin",
                Role::Administrator,
                handler_fn(|_ctx| Box::pin(async move { Ok(HandlerResult::text("admin")) })),
            )
        })
        .filter(AlwaysEditor)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_query_cookie_and_default_headers() {
    let client = client().with_header("Host", "acme.example.com");
    let response = client
        .send(
            client
                .request(HttpMethod::GET, "/echo")
                .query("tag", "a")
                .query("tag", "b")
                .cookie("theme", "dark"),
        )
        .await;

    assert_status(&response, 200);
    assert_eq!(response.body_string(), "a,b|dark|acme.example.com");
    assert_header(&response, "Content-Type", "text/html; charset=utf-8");
}

#[tokio::test]
async fn test_multipart_upload() {
    let client = client();
    let response = client
        .send(
            client
                .request(HttpMethod::POST, "/upload")
                .multipart_field("title", "Logo")
                .multipart_file("file", "logo.png", "image/png", vec![0u8; 10]),
        )
        .await;
    assert_status(&response, 200);
    assert_eq!(response.body_string(), "Logo:10");
}

#[tokio::test]
async fn test_cookies_and_json() {
    let response = client().post_form("/login", &[("user", "ada")]).await;
    assert_status(&response, 200);
    assert_json_content_type(&response);
    assert_json(&response, &serde_json::json!({ "ok": true }));
    assert_sets_cookie(&response, "sid");
    let cookie = response.cookie("sid").unwrap();
    assert_eq!(cookie.value, "abc 123");
    assert_eq!(cookie.max_age, Some(60));
}

#[tokio::test]
async fn test_errors() {
    let client = client();
    let response = client.get("/missing").await;
    assert_status(&response, 404);
    assert_client_error(&response);

    let response = client.delete("/echo").await;
    assert_status(&response, 405);
    assert_header(&response, "Allow", "GET, HEAD");

    let response = client.get("/admin").await;
    assert_status(&response, 403);

    let response = client.head("/echo").await;
    assert_status(&response, 200);
    assert!(response.body().is_empty());
}

#[test]
fn test_builder_rejects_bad_template() {
    let result = TestAppBuilder::new()
        .get("/bad/<1x>", handler_fn(|_ctx| Box::pin(async move { Ok(HandlerResult::empty()) })))
        .build();
    assert!(result.is_err());
}
