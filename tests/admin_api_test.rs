mod common;

use axum::http::{Method, StatusCode};
use common::{dec_value, read_json, TestApp};
use playvault_api::entities::user::UserRole;
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn dashboard_reflects_store_activity() {
    let app = TestApp::new().await;
    let (_, admin_token) = app
        .seed_user("boss@example.com", dec!(0), UserRole::Admin)
        .await;
    let (_, buyer_token) = app
        .seed_user("spender@example.com", dec!(100), UserRole::Customer)
        .await;
    let game = app
        .seed_game("Metric Mover", dec!(40), true, Some("g2a-900"))
        .await;
    app.seed_game("Shelf Warmer", dec!(10), false, None).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 1 }] })),
            Some(&buyer_token),
        )
        .await;
    read_json(response, StatusCode::CREATED).await;

    let response = app
        .request(Method::GET, "/api/admin/dashboard", None, Some(&admin_token))
        .await;
    let body = read_json(response, StatusCode::OK).await;
    let data = &body["data"];

    assert_eq!(data["users"], 2);
    assert_eq!(data["games"], 2);
    assert_eq!(data["games_in_stock"], 1);
    assert_eq!(data["orders"], 1);
    assert_eq!(data["completed_orders"], 1);
    assert_eq!(data["keys_issued"], 1);
    assert_eq!(dec_value(&data["revenue"]), dec!(40));
}

#[tokio::test]
async fn user_search_filters_by_substring() {
    let app = TestApp::new().await;
    let (_, admin_token) = app
        .seed_user("finder@example.com", dec!(0), UserRole::Admin)
        .await;
    app.seed_user("alice@example.com", dec!(0), UserRole::Customer)
        .await;
    app.seed_user("bob@example.com", dec!(0), UserRole::Customer)
        .await;

    let response = app
        .request(
            Method::GET,
            "/api/admin/users?search=alice",
            None,
            Some(&admin_token),
        )
        .await;
    let body = read_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["users"][0]["email"], "alice@example.com");

    // the password hash never leaves the service layer
    assert!(body["data"]["users"][0].get("password_hash").is_none());
}

#[tokio::test]
async fn transaction_search_filters_by_user_and_kind() {
    let app = TestApp::new().await;
    let (_, admin_token) = app
        .seed_user("auditor@example.com", dec!(0), UserRole::Admin)
        .await;
    let (spender, spender_token) = app
        .seed_user("ledger@example.com", dec!(100), UserRole::Customer)
        .await;
    let game = app.seed_game("Ledger Game", dec!(25), true, None).await;

    let response = app
        .request(
            Method::POST,
            "/api/account/topup",
            Some(json!({ "amount": "50" })),
            Some(&spender_token),
        )
        .await;
    read_json(response, StatusCode::OK).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 1 }] })),
            Some(&spender_token),
        )
        .await;
    read_json(response, StatusCode::CREATED).await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/admin/transactions?user_id={}", spender.id),
            None,
            Some(&admin_token),
        )
        .await;
    let body = read_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], 2);

    let response = app
        .request(
            Method::GET,
            &format!("/api/admin/transactions?user_id={}&kind=top_up", spender.id),
            None,
            Some(&admin_token),
        )
        .await;
    let body = read_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(dec_value(&body["data"]["transactions"][0]["amount"]), dec!(50));
}

#[tokio::test]
async fn admin_surface_is_hidden_from_customers() {
    let app = TestApp::new().await;
    let (_, customer_token) = app
        .seed_user("nosy@example.com", dec!(0), UserRole::Customer)
        .await;

    for uri in [
        "/api/admin/dashboard",
        "/api/admin/users",
        "/api/admin/transactions",
    ] {
        let response = app
            .request(Method::GET, uri, None, Some(&customer_token))
            .await;
        read_json(response, StatusCode::FORBIDDEN).await;
    }
}
