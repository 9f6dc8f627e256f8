use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode as AxumStatus,
    routing::{get, post},
};
use billing_ledger_server::{
    app::{AppState, build_app_with},
    currency::CurrencyConverter,
    middleware::{
        auth::CallerAuth,
        billing::{MeteredRoute, metered},
    },
    models::account::AccountId,
    services::balance_service::{BalanceService, LedgerLimits},
    store::InMemoryLedgerStore,
};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

const API_KEY: &str = "test-key";
const ADMIN: i64 = 1;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let ledger = BalanceService::new(
            Arc::new(InMemoryLedgerStore::new()),
            CurrencyConverter::default(),
            LedgerLimits::default(),
        );
        let auth = CallerAuth::new([CallerAuth::hash_key(API_KEY)], [AccountId(ADMIN)]);
        let state = AppState::new(ledger, auth);

        // Metered operations standing in for slow downstream work
        let ozon = metered(
            Router::new()
                .route("/ops/ozon", post(|| async { Json(json!({ "report": "ready" })) }))
                .route(
                    "/ops/ozon/broken",
                    post(|| async { (AxumStatus::BAD_GATEWAY, "upstream down") }),
                ),
            MeteredRoute::fixed(state.gate(), "ozon_daily", dec!(50)),
        );
        let ai = metered(
            Router::new().route("/ops/ai", get(|| async { "answer" })),
            MeteredRoute::catalog(state.gate(), "ai_request"),
        );
        let unpriced = metered(
            Router::new().route("/ops/unpriced", get(|| async { "free?" })),
            MeteredRoute::catalog(state.gate(), "not_in_catalog"),
        );

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = build_app_with(state, ozon.merge(ai).merge(unpriced));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_as(&self, user: i64, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .bearer_auth(API_KEY)
            .header("X-User-Id", user.to_string())
    }

    fn post_as(&self, user: i64, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(API_KEY)
            .header("X-User-Id", user.to_string())
    }

    async fn deposit(&self, user: i64, amount: &str) {
        let res = self
            .post_as(ADMIN, "/api/v1/billing/deposit")
            .json(&json!({ "account_id": user, "amount": amount }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    async fn balance(&self, user: i64) -> Decimal {
        let body: serde_json::Value = self
            .get_as(user, "/api/v1/billing/balance")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        decimal(&body["balance"]["amount_primary"])
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn decimal(value: &serde_json::Value) -> Decimal {
    value
        .as_str()
        .expect("amounts are serialized as strings")
        .parse()
        .unwrap()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/api/v1/billing/balance"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/api/v1/billing/balance"))
        .bearer_auth("wrong-key")
        .header("X-User-Id", "5")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/api/v1/billing/balance"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn public_endpoints_need_no_credentials() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url("/api/v1/billing/services"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let services: Vec<serde_json::Value> = res.json().await.unwrap();
    let names: Vec<&str> = services
        .iter()
        .map(|s| s["service_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["ai_request", "ozon_automation", "ozon_daily"]);
}

#[tokio::test]
async fn new_caller_sees_zero_in_both_currencies() {
    let srv = TestServer::spawn().await;

    let body: serde_json::Value = srv
        .get_as(42, "/api/v1/billing/balance")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["account_id"], 42);
    assert_eq!(decimal(&body["balance"]["amount_primary"]), Decimal::ZERO);
    assert_eq!(decimal(&body["balance"]["amount_secondary"]), Decimal::ZERO);
    assert_eq!(body["balance"]["currency_primary"], "RUB");
    assert_eq!(body["balance"]["currency_secondary"], "BT");
}

#[tokio::test]
async fn deposit_charge_and_decline_over_http() {
    let srv = TestServer::spawn().await;
    srv.deposit(7, "100").await;

    let res = srv
        .post_as(7, "/api/v1/billing/charge")
        .json(&json!({ "amount": "30", "service_name": "ai_request" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["transaction"]["kind"], "charge");
    assert_eq!(decimal(&body["transaction"]["amount"]), dec!(-30));
    assert_eq!(body["transaction"]["description"], "Charge for ai_request");

    let res = srv
        .post_as(7, "/api/v1/billing/charge")
        .json(&json!({ "amount": "1000", "service_name": "ai_request" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "payment_required");
    let details = &body["error"]["details"];
    assert_eq!(decimal(&details["balance"]), dec!(70));
    assert_eq!(decimal(&details["required"]), dec!(1000));
    assert_eq!(details["service_name"], "ai_request");
    assert_eq!(details["topup_url"], "/billing/topup");

    assert_eq!(srv.balance(7).await, dec!(70));

    let body: serde_json::Value = srv
        .get_as(7, "/api/v1/billing/transactions")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let kinds: Vec<&str> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["charge", "deposit"]);
    assert_eq!(decimal(&body["balance"]["amount_primary"]), dec!(70));
}

#[tokio::test]
async fn invalid_charges_are_rejected_without_side_effects() {
    let srv = TestServer::spawn().await;
    srv.deposit(8, "10").await;

    for payload in [
        json!({ "amount": "0", "service_name": "ai_request" }),
        json!({ "amount": "-5", "service_name": "ai_request" }),
        json!({ "amount": "1.001", "service_name": "ai_request" }),
        json!({ "amount": "1", "service_name": "  " }),
    ] {
        let res = srv
            .post_as(8, "/api/v1/billing/charge")
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{payload}");
    }

    assert_eq!(srv.balance(8).await, dec!(10));
}

#[tokio::test]
async fn admin_routes_require_admin_caller() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post_as(5, "/api/v1/billing/deposit")
        .json(&json!({ "account_id": 5, "amount": "100" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .get_as(5, "/api/v1/billing/admin/accounts")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    assert_eq!(srv.balance(5).await, Decimal::ZERO);
}

#[tokio::test]
async fn admin_can_deposit_refund_and_list_accounts() {
    let srv = TestServer::spawn().await;
    srv.deposit(11, "40").await;
    srv.deposit(12, "15").await;

    let res = srv
        .post_as(ADMIN, "/api/v1/billing/refund")
        .json(&json!({ "account_id": 11, "amount": "5", "service_name": "ai_request" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["transaction"]["kind"], "refund");

    let accounts: Vec<serde_json::Value> = srv
        .get_as(ADMIN, "/api/v1/billing/admin/accounts")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let balance_of = |id: i64| {
        accounts
            .iter()
            .find(|a| a["account_id"] == id)
            .map(|a| decimal(&a["balance"]["amount_primary"]))
    };
    assert_eq!(balance_of(11), Some(dec!(45)));
    assert_eq!(balance_of(12), Some(dec!(15)));
}

#[tokio::test]
async fn metered_route_charges_only_after_success() {
    let srv = TestServer::spawn().await;
    srv.deposit(20, "70").await;

    let res = srv.post_as(20, "/ops/ozon").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["report"], "ready");
    assert_eq!(srv.balance(20).await, dec!(20));

    // Admission now fails: 20 < 50
    let res = srv.post_as(20, "/ops/ozon").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(decimal(&body["error"]["details"]["required"]), dec!(50));
    assert_eq!(body["error"]["details"]["service_name"], "ozon_daily");
    assert_eq!(srv.balance(20).await, dec!(20));
}

#[tokio::test]
async fn failed_metered_operation_is_not_charged() {
    let srv = TestServer::spawn().await;
    srv.deposit(21, "70").await;

    let res = srv.post_as(21, "/ops/ozon/broken").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.text().await.unwrap(), "upstream down");

    assert_eq!(srv.balance(21).await, dec!(70));
    let body: serde_json::Value = srv
        .get_as(21, "/api/v1/billing/transactions")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn catalog_priced_routes_fail_closed() {
    let srv = TestServer::spawn().await;
    srv.deposit(22, "12").await;

    let res = srv.get_as(22, "/ops/ai").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(srv.balance(22).await, dec!(7));

    let res = srv.get_as(22, "/ops/unpriced").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(srv.balance(22).await, dec!(7));
}
