use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use stockledger_core::{OrderId, ProductId, SystemClock, UserId};
use stockledger_infra::InventoryConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services =
            stockledger_api::app::services::build_services_with(InventoryConfig::default(), Arc::new(SystemClock));
        let app = stockledger_api::app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post_as(client: &reqwest::Client, url: String, actor: UserId, body: Value) -> (StatusCode, Value) {
    let res = client
        .post(url)
        .header("x-actor-id", actor.to_string())
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

async fn get_as(client: &reqwest::Client, url: String, actor: UserId) -> (StatusCode, Value) {
    let res = client
        .get(url)
        .header("x-actor-id", actor.to_string())
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

async fn register(srv: &TestServer, client: &reqwest::Client, actor: UserId, physical: i64, legacy: i64) -> ProductId {
    let product_id = ProductId::new();
    let (status, body) = post_as(
        client,
        srv.url("/products"),
        actor,
        json!({
            "product_id": product_id,
            "sku": format!("SKU-{product_id}"),
            "name": "Widget",
            "initial_physical_stock": physical,
            "thresholds": {
                "min_stock_level": 3,
                "reorder_point": 10,
                "reorder_quantity": 25,
                "max_stock_level": 100
            },
            "unit_cost": 400,
            "unit_price": 650,
            "legacy_stock_quantity": legacy
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    product_id
}

#[tokio::test]
async fn health_is_public_but_domain_routes_need_an_actor() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = client
        .get(srv.url("/products"))
        .header("x-actor-id", "someone")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reserve_fulfill_adjust_lifecycle() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let clerk = UserId::new();
    let supervisor = UserId::new();
    let product_id = register(&srv, &client, clerk, 20, 20).await;
    let order_id = OrderId::new();

    let (status, body) = post_as(
        &client,
        srv.url("/reservations"),
        clerk,
        json!({ "product_id": product_id, "order_id": order_id, "quantity": 8 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "reserve failed: {body}");
    assert_eq!(body["available_after"], 12);

    let (status, body) = post_as(
        &client,
        srv.url("/reservations/fulfill"),
        clerk,
        json!({ "product_id": product_id, "order_id": order_id, "quantity": 8 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "fulfill failed: {body}");
    assert_eq!(body["status"], "fulfilled");

    let (status, adjustment) = post_as(
        &client,
        srv.url("/adjustments"),
        clerk,
        json!({
            "product_id": product_id,
            "adjustment_type": "physical_count",
            "reason_code": "CYCLE-COUNT",
            "quantity_adjusted": -4
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "submit failed: {adjustment}");
    let adjustment_id = adjustment["id"].as_str().unwrap().to_string();

    // Requester cannot approve their own adjustment.
    let (status, body) = post_as(
        &client,
        srv.url(&format!("/adjustments/{adjustment_id}/decision")),
        clerk,
        json!({ "decision": "approved" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = post_as(
        &client,
        srv.url(&format!("/adjustments/{adjustment_id}/decision")),
        supervisor,
        json!({ "decision": "approved", "notes": "recount confirmed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "decide failed: {body}");
    assert_eq!(body["approval_status"], "approved");

    let (status, record) = get_as(&client, srv.url(&format!("/products/{product_id}")), clerk).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["physical_stock"], 8);
    assert_eq!(record["reserved_stock"], 0);
    assert_eq!(record["available_stock"], 8);

    let (status, alerts) = get_as(
        &client,
        srv.url(&format!("/alerts?product_id={product_id}&status=open")),
        clerk,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts["total"], 1);
    assert_eq!(alerts["items"][0]["alert_type"], "low_stock");

    let (status, audit) = get_as(
        &client,
        srv.url(&format!("/audit?product_id={product_id}&sort=version_after&direction=asc")),
        clerk,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let operations: Vec<&str> = audit["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["operation_type"].as_str().unwrap())
        .collect();
    assert_eq!(
        operations,
        vec!["initial_stock", "reservation", "fulfillment", "inventory_adjustment"]
    );
}

#[tokio::test]
async fn domain_errors_map_to_status_codes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = UserId::new();
    let product_id = register(&srv, &client, actor, 5, 5).await;

    let (status, body) = post_as(
        &client,
        srv.url("/reservations"),
        actor,
        json!({ "product_id": product_id, "order_id": OrderId::new(), "quantity": 6 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, body) = post_as(
        &client,
        srv.url("/adjustments"),
        actor,
        json!({
            "product_id": product_id,
            "adjustment_type": "manual_correction",
            "reason_code": "FIX",
            "quantity_adjusted": -1000
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "negative_stock_rejected");

    let (status, body) = get_as(&client, srv.url(&format!("/products/{}", ProductId::new())), actor).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = get_as(&client, srv.url("/products/not-an-id"), actor).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, _) = get_as(&client, srv.url("/reservations?status=shipped"), actor).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn consistency_report_flags_legacy_mismatch() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let actor = UserId::new();
    register(&srv, &client, actor, 12, 12).await;
    let drifted = register(&srv, &client, actor, 7, 9).await;

    let (status, report) = get_as(&client, srv.url("/reports/consistency"), actor).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["products_checked"], 2);
    assert_eq!(report["mismatch_count"], 1);
    assert_eq!(report["mismatches"][0]["product_id"], drifted.to_string());
}
