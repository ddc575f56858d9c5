use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zentral_provider::testing::ProviderTester;
use zentral_provider::{
    ApiError, ClientConfig, HttpClient, ProviderError, ProviderService, ZentralApi,
    ZentralProvider,
};

fn client(server: &MockServer) -> HttpClient {
    HttpClient::new(ClientConfig {
        base_url: Url::parse(&format!("{}/api/", server.uri())).unwrap(),
        token: "s3cr3t".to_string(),
        user_agent: "zentral-provider-tests".to_string(),
        tls_insecure_skip_verify: false,
    })
    .unwrap()
}

// ── Requests ────────────────────────────────────────────────────

#[tokio::test]
async fn sends_token_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/inventory/tags/3/"))
        .and(header("Authorization", "Token s3cr3t"))
        .and(header("User-Agent", "zentral-provider-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3, "name": "laptops"})))
        .expect(1)
        .mount(&server)
        .await;

    let tag = client(&server).get("inventory/tags/3/").await.unwrap();
    assert_eq!(tag["name"], "laptops");
}

#[tokio::test]
async fn posts_and_puts_json_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/inventory/tags/"))
        .and(body_json(json!({"name": "laptops", "color": "0079bf"})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": 1, "name": "laptops", "color": "0079bf"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/inventory/tags/1/"))
        .and(body_json(json!({"name": "desktops", "color": "0079bf"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "name": "desktops", "color": "0079bf"})),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let created = client
        .post("inventory/tags/", &json!({"name": "laptops", "color": "0079bf"}))
        .await
        .unwrap();
    assert_eq!(created["id"], 1);

    let updated = client
        .put("inventory/tags/1/", &json!({"name": "desktops", "color": "0079bf"}))
        .await
        .unwrap();
    assert_eq!(updated["name"], "desktops");
}

#[tokio::test]
async fn delete_accepts_an_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/inventory/tags/1/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete("inventory/tags/1/").await.unwrap();
}

// ── Lists ───────────────────────────────────────────────────────

#[tokio::test]
async fn list_passes_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/inventory/tags/"))
        .and(query_param("name", "laptops & desktops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}])))
        .expect(1)
        .mount(&server)
        .await;

    let items = client(&server)
        .list("inventory/tags/", &[("name", "laptops & desktops".to_string())])
        .await
        .unwrap();
    assert_eq!(items, vec![json!({"id": 7})]);
}

#[tokio::test]
async fn list_follows_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stores/"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": format!("{}/api/stores/?page=2", server.uri()),
            "results": [{"id": "a"}, {"id": "b"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/stores/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": null,
            "results": [{"id": "c"}],
        })))
        .mount(&server)
        .await;

    let items = client(&server).list("stores/", &[]).await.unwrap();
    let ids: Vec<_> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[tokio::test]
async fn list_rejects_unexpected_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stores/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "nope"})))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).list("stores/", &[]).await,
        Err(ApiError::Decode { .. })
    ));
}

// ── Error classification ────────────────────────────────────────

#[tokio::test]
async fn classifies_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(path("/api/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;
    Mock::given(path("/api/invalid/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"inventory_interval": ["Ensure this value is less than or equal to 86400."]})),
        )
        .mount(&server)
        .await;
    Mock::given(path("/api/duplicate/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"name": ["blueprint with this name already exists."]})),
        )
        .mount(&server)
        .await;
    Mock::given(path("/api/forbidden/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Nope."})))
        .mount(&server)
        .await;
    Mock::given(path("/api/busy/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(client.get("missing/").await.unwrap_err().is_not_found());
    match client.post("invalid/", &json!({})).await.unwrap_err() {
        ApiError::BadRequest { fields, .. } => {
            assert!(fields["inventory_interval"].starts_with("Ensure"));
        },
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        client.post("duplicate/", &json!({})).await,
        Err(ApiError::Conflict { .. })
    ));
    assert!(matches!(
        client.get("forbidden/").await,
        Err(ApiError::Unauthorized { status: 403, .. })
    ));
    assert!(matches!(
        client.get("busy/").await,
        Err(ApiError::Transient { .. })
    ));
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = HttpClient::new(ClientConfig {
        base_url: Url::parse(&format!("http://{}/api/", addr)).unwrap(),
        token: "s3cr3t".to_string(),
        user_agent: "zentral-provider-tests".to_string(),
        tls_insecure_skip_verify: false,
    })
    .unwrap();

    assert!(matches!(
        client.get("inventory/tags/1/").await,
        Err(ApiError::Transient { .. })
    ));
}

#[tokio::test]
async fn invalid_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).get("inventory/tags/1/").await,
        Err(ApiError::Decode { .. })
    ));
}

// ── Configure ───────────────────────────────────────────────────

#[tokio::test]
async fn configure_checks_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/inventory/meta_business_units/"))
        .and(header("Authorization", "Token bad"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid token."})))
        .mount(&server)
        .await;

    let provider = ZentralProvider::new();
    let err = provider
        .configure(json!({"base_url": format!("{}/api/", server.uri()), "token": "bad"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::PermissionDenied(_)));
    assert!(!provider.is_configured());
}

#[tokio::test]
async fn configure_then_manage_a_tag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/inventory/meta_business_units/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/inventory/tags/"))
        .and(body_json(json!({
            "name": "laptops",
            "color": "0079bf",
            "taxonomy": null,
            "meta_business_unit": null,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 12,
            "name": "laptops",
            "color": "0079bf",
            "taxonomy": null,
            "meta_business_unit": null,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/inventory/tags/12/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(ZentralProvider::new());
    tester
        .configure(json!({"base_url": format!("{}/api/", server.uri()), "token": "t"}))
        .await
        .unwrap();

    let plan = tester
        .plan_create("zentral_tag", json!({"name": "laptops"}))
        .await
        .unwrap();
    let state = tester
        .create("zentral_tag", plan.planned_state)
        .await
        .unwrap();
    assert_eq!(state["id"], 12);

    // deleted out of band
    let refreshed = tester.read("zentral_tag", state).await.unwrap();
    assert!(refreshed.is_null());
}
