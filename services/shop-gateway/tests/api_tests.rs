//! End-to-end tests of the HTTP API over the in-memory ledger

use actix_web::{http::StatusCode, test, web, App};
use coin_ledger::{Ledger, MemoryLedger, ShopItem};
use serde_json::{json, Value};
use shop_gateway::{handlers, security_middleware::TokenIssuer, services::ShopService};
use std::sync::Arc;

fn shop() -> (web::Data<ShopService>, TokenIssuer) {
    let store = Arc::new(MemoryLedger::with_catalog(vec![
        ShopItem::new("hoody", 100),
        ShopItem::new("cup", 20),
    ]));
    let ledger = Ledger::with_store(store).unwrap();
    let tokens = TokenIssuer::new("test-secret", 1);
    let service = ShopService::new(Arc::new(ledger), tokens.clone());
    (web::Data::new(service), tokens)
}

macro_rules! init_app {
    () => {{
        let (service, tokens) = shop();
        test::init_service(
            App::new()
                .app_data(service)
                .configure(|cfg| handlers::configure_routes(cfg, tokens)),
        )
        .await
    }};
}

macro_rules! login {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth")
            .set_json(json!({"username": $username, "password": "password"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        body["token"].as_str().unwrap().to_string()
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

#[actix_web::test]
async fn test_end_to_end_transfer_and_purchase() {
    let app = init_app!();
    let a = login!(app, "a");
    let b = login!(app, "b");

    let req = test::TestRequest::post()
        .uri("/api/sendCoin")
        .insert_header(bearer(&a))
        .set_json(json!({"toUser": "b", "amount": 500}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/buy/hoody")
        .insert_header(bearer(&a))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/info")
        .insert_header(bearer(&a))
        .to_request();
    let info: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        info,
        json!({
            "coins": 400,
            "inventory": [{"type": "hoody", "quantity": 1}],
            "coinHistory": {
                "received": [],
                "sent": [{"toUser": "b", "amount": 500}]
            }
        })
    );

    let req = test::TestRequest::get()
        .uri("/api/info")
        .insert_header(bearer(&b))
        .to_request();
    let info: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(info["coins"], 1500);
    assert_eq!(
        info["coinHistory"]["received"],
        json!([{"fromUser": "a", "amount": 500}])
    );
    assert_eq!(info["inventory"], json!([]));
}

#[actix_web::test]
async fn test_new_user_starts_with_initial_balance() {
    let app = init_app!();
    let token = login!(app, "newcomer");

    let req = test::TestRequest::get()
        .uri("/api/info")
        .insert_header(bearer(&token))
        .to_request();
    let info: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(info["coins"], 1000);
    assert_eq!(info["inventory"], json!([]));
    assert_eq!(info["coinHistory"], json!({"received": [], "sent": []}));
}

#[actix_web::test]
async fn test_wrong_password_rejected() {
    let app = init_app!();
    login!(app, "alice");

    let req = test::TestRequest::post()
        .uri("/api/auth")
        .set_json(json!({"username": "alice", "password": "guess"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "invalid credentials"}));
}

#[actix_web::test]
async fn test_malformed_body_is_bad_request() {
    let app = init_app!();

    let req = test::TestRequest::post()
        .uri("/api/auth")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "invalid request body"}));
}

#[actix_web::test]
async fn test_protected_routes_require_token() {
    let app = init_app!();

    let req = test::TestRequest::get().uri("/api/info").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/buy/cup")
        .insert_header(("Authorization", "Bearer not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "unauthorized"}));
}

#[actix_web::test]
async fn test_send_coin_rejections() {
    let app = init_app!();
    let token = login!(app, "alice");
    login!(app, "bob");

    let cases = [
        (json!({"toUser": "bob", "amount": 1001}), "not enough coins"),
        (json!({"toUser": "nobody", "amount": 10}), "invalid username"),
        (json!({"toUser": "bob", "amount": 0}), "invalid amount"),
        (json!({"toUser": "bob"}), "invalid request body"),
    ];

    for (payload, message) in cases {
        let req = test::TestRequest::post()
            .uri("/api/sendCoin")
            .insert_header(bearer(&token))
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": message}));
    }

    let req = test::TestRequest::get()
        .uri("/api/info")
        .insert_header(bearer(&token))
        .to_request();
    let info: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(info["coins"], 1000);
}

#[actix_web::test]
async fn test_buy_rejections() {
    let app = init_app!();
    let token = login!(app, "alice");

    let req = test::TestRequest::get()
        .uri("/api/buy/yacht")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "not found"}));

    for _ in 0..10 {
        let req = test::TestRequest::get()
            .uri("/api/buy/hoody")
            .insert_header(bearer(&token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/api/buy/cup")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "not enough coins"}));
}

#[actix_web::test]
async fn test_health_and_metrics() {
    let app = init_app!();

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");

    let token = login!(app, "alice");
    login!(app, "bob");
    let req = test::TestRequest::post()
        .uri("/api/sendCoin")
        .insert_header(bearer(&token))
        .set_json(json!({"toUser": "bob", "amount": 5}))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("ledger_transfers_total"));
    assert!(text.contains("ledger_transferred_coins_total 5"));
}
