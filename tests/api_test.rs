mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use common::Harness;
use nexapro_core::adapters::in_memory::InMemoryTemplateSource;
use nexapro_core::create_app;
use nexapro_core::health::TemplateChecker;

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    // Extractor rejections answer in plain text.
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_convert(id: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/documents/{}/convert", id))
        .header("content-type", "application/json")
        .body(body)
        .expect("request")
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn test_health_without_dependencies() {
    let harness = Harness::new();
    let (status, body) = send(create_app(harness.app_state()), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_convert_endpoint_creates_invoice() {
    let harness = Harness::new();
    let quote = harness.seed_quote();
    let actor = Uuid::new_v4();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/documents/{}/convert", quote.id))
        .header("content-type", "application/json")
        .header("x-actor-id", actor.to_string())
        .body(Body::from(
            json!({ "issuance_date": "2024-01-01", "notes": "Thanks" }).to_string(),
        ))
        .expect("request");
    let (status, body) = send(create_app(harness.app_state()), request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["derived"]["parent_document_id"], json!(quote.id));
    assert_eq!(body["derived"]["due_on"], "2024-01-31");
    assert_eq!(body["derived"]["kind"], "invoice");
    assert_eq!(body["source"]["reference"], json!(quote.reference));
    assert!(body["metadata"]["transaction_id"]
        .as_str()
        .unwrap()
        .starts_with("TXN-"));
    assert_eq!(harness.audit.records()[0].actor_id, Some(actor));
}

#[tokio::test]
async fn test_convert_endpoint_accepts_empty_body() {
    let harness = Harness::new();
    let quote = harness.seed_quote();

    let (status, body) = send(
        create_app(harness.app_state()),
        post_convert(&quote.id.to_string(), Body::empty()),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_convert_endpoint_maps_failures_to_statuses() {
    let harness = Harness::new();
    let quote = harness.seed_quote();
    let app = create_app(harness.app_state());

    let (status, body) = send(app.clone(), post_convert("not-a-uuid", Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "validation");
    assert!(body["transaction_id"].as_str().unwrap().starts_with("TXN-"));

    let (status, body) = send(
        app.clone(),
        post_convert(&Uuid::new_v4().to_string(), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let quote_id = quote.id.to_string();
    let (status, _) = send(app.clone(), post_convert(&quote_id, Body::empty())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(app.clone(), post_convert(&quote_id, Body::empty())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "integrity");

    let mut empty = common::quote(harness.tenant_id);
    empty.client.name = None;
    harness.store.seed(empty.clone());
    let (status, body) = send(app, post_convert(&empty.id.to_string(), Body::empty())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "business_rule");
}

#[tokio::test]
async fn test_convert_endpoint_rejects_bad_options() {
    let harness = Harness::new();
    let quote = harness.seed_quote();
    let app = create_app(harness.app_state());

    let (status, body) = send(
        app.clone(),
        post_convert(&quote.id.to_string(), Body::from("{ not json")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, _) = send(
        app.clone(),
        post_convert(
            &quote.id.to_string(),
            Body::from(json!({ "issuance": "2024-01-01" }).to_string()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/documents/{}/convert", quote.id))
        .header("x-actor-id", "root")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(harness.audit.records().is_empty());
}

#[tokio::test]
async fn test_conversions_and_integrity_endpoints() {
    let harness = Harness::new();
    let quote = harness.seed_quote();
    let app = create_app(harness.app_state());

    let request = post_convert(&quote.id.to_string(), Body::empty());
    let (_, converted) = send(app.clone(), request).await;
    let derived_id = converted["derived"]["id"].as_str().unwrap().to_string();

    let (status, history) = send(
        app.clone(),
        get(&format!("/documents/{}/conversions", quote.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"], derived_id.as_str());

    let (status, report) = send(
        app.clone(),
        get(&format!("/documents/{}/integrity/{}", quote.id, derived_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["valid"], true);
    assert_eq!(report["checks"]["amounts_match"], true);

    let (status, _) = send(app, get("/documents/not-a-uuid/conversions")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let harness = Harness::new();
    let quote = harness.seed_quote();
    let app = create_app(harness.app_state());
    send(app.clone(), post_convert(&quote.id.to_string(), Body::empty())).await;

    let (status, stats) = send(
        app.clone(),
        get(&format!("/tenants/{}/conversions/stats", harness.tenant_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_conversions"], 1);
    assert_eq!(stats["recent"].as_array().unwrap().len(), 1);

    let (status, stats) = send(
        app.clone(),
        get(&format!(
            "/tenants/{}/conversions/stats?from=2000-01-01&to=2000-12-31",
            harness.tenant_id
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_conversions"], 0);

    let (status, _) = send(
        app,
        get(&format!(
            "/tenants/{}/conversions/stats?from=2024-02-01&to=2024-01-01",
            harness.tenant_id
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_degrades_when_invoice_template_is_missing() {
    let harness = Harness::new();
    let checker = TemplateChecker::new(
        Arc::new(InMemoryTemplateSource::new()),
        "real_estate_invoice_template",
    );
    let state = harness.app_state().with_health_checker(Arc::new(checker));

    let (status, body) = send(create_app(state), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["dependencies"]["templates"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_generate_endpoint() {
    let harness = Harness::new();
    let app = create_app(harness.app_state());
    let uri = format!("/tenants/{}/documents", harness.tenant_id);

    let (status, body) = send(
        app.clone(),
        with_json(
            "POST",
            &uri,
            json!({
                "kind": "invoice",
                "client_name": "Jane Doe",
                "total_excluding_tax": "1000.00",
                "issuance_date": "2024-01-01"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["document"]["status"], "issued");
    assert_eq!(body["document"]["due_on"], "2024-01-31");
    assert_eq!(body["metadata"]["render_strategy"], "stored");

    let (status, body) = send(
        app.clone(),
        with_json("POST", &uri, json!({ "kind": "quote" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("client_name"));

    let (status, _) = send(
        app,
        with_json("POST", &uri, json!({ "kind": "report", "client_name": "Jane" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(harness.store.len(), 1);
}

#[tokio::test]
async fn test_status_endpoint() {
    let harness = Harness::new();
    let quote = harness.seed_quote();
    let app = create_app(harness.app_state());
    let uri = format!("/documents/{}/status", quote.id);

    let (status, body) = send(
        app.clone(),
        with_json("PATCH", &uri, json!({ "status": "accepted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    let (status, body) = send(
        app.clone(),
        with_json("PATCH", &uri, json!({ "status": "converted" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let missing = format!("/documents/{}/status", Uuid::new_v4());
    let (status, _) = send(
        app,
        with_json("PATCH", &missing, json!({ "status": "signed" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_endpoint() {
    let harness = Harness::new();
    let quote = harness.seed_quote();
    let app = create_app(harness.app_state());
    send(app.clone(), post_convert(&quote.id.to_string(), Body::empty())).await;

    let uri = format!("/tenants/{}/documents", harness.tenant_id);
    let (status, body) = send(app.clone(), get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(app.clone(), get(&format!("{}?kind=invoice", uri))).await;
    assert_eq!(status, StatusCode::OK);
    let invoices = body.as_array().unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["parent_document_id"], quote.id.to_string());

    let (status, _) = send(app, get(&format!("{}?status=archived", uri))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
