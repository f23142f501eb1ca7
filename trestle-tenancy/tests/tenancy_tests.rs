//! TenantFilter through a dispatcher

use std::sync::Arc;
use trestle_core::{handler_fn, HandlerResult, Tenant};
use trestle_tenancy::*;
use trestle_testing::*;

fn client(optional: bool) -> (Arc<MemoryTenantStore>, TestClient) {
    let store = Arc::new(MemoryTenantStore::with_tenants([
        Tenant::new("t-1", "acme").with_domain("acme.example.com"),
        Tenant::new("t-2", "globex")
            .with_domain("globex.example.com")
            .with_active(false),
    ]));
    let resolver = Arc::new(HostTenantResolver::new(store.clone()));

    let client = TestAppBuilder::new()
        .get(
            "/",
            handler_fn(|ctx| {
                Box::pin(async move {
                    let tenant = ctx.tenant_id().unwrap_or("none").to_string();
                    Ok(HandlerResult::text(tenant))
                })
            }),
        )
        .filter(TenantFilter::new(resolver).with_optional(optional))
        .build()
        .unwrap();
    (store, client)
}

async fn get_with_host(client: &TestClient, host: &str) -> TestResponse {
    client
        .send(
            client
                .request(trestle_core::HttpMethod::GET, "/")
                .header("Host", host),
        )
        .await
}

#[tokio::test]
async fn test_binds_tenant_from_host() {
    let (_, client) = client(false);
    let response = get_with_host(&client, "acme.example.com:443").await;
    assert_status(&response, 200);
    assert_eq!(response.body_string(), "t-1");
}

#[tokio::test]
async fn test_unknown_host_is_not_found() {
    let (_, client) = client(false);
    let response = get_with_host(&client, "nobody.example.com").await;
    assert_status(&response, 404);
    assert_json_content_type(&response);
}

#[tokio::test]
async fn test_inactive_tenant_is_forbidden() {
    let (store, client) = client(false);
    assert_status(&get_with_host(&client, "globex.example.com").await, 403);

    store.set_active("t-2", true);
    let response = get_with_host(&client, "globex.example.com").await;
    assert_status(&response, 200);
    assert_eq!(response.body_string(), "t-2");
}

#[tokio::test]
async fn test_optional_resolution() {
    let (_, client) = client(true);
    let response = get_with_host(&client, "nobody.example.com").await;
    assert_status(&response, 200);
    assert_eq!(response.body_string(), "none");

    // Disabled sites stay refused
    assert_status(&get_with_host(&client, "globex.example.com").await, 403);
}
