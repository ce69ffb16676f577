mod common;

use axum::http::{Method, StatusCode};
use common::{dec_value, read_json, TestApp, TEST_PASSWORD};
use playvault_api::entities::{transaction, user::UserRole, Transaction};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

#[tokio::test]
async fn register_issues_a_working_token() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({
                "email": "newbie@example.com",
                "password": "a-long-enough-password",
                "display_name": "Newbie",
            })),
            None,
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;

    assert_eq!(body["data"]["user"]["email"], "newbie@example.com");
    assert_eq!(body["data"]["user"]["role"], "customer");
    let token = body["data"]["token"]["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    // the token authenticates /api/auth/me
    let response = app
        .request(Method::GET, "/api/auth/me", None, Some(&token))
        .await;
    let body = read_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["email"], "newbie@example.com");
    assert_eq!(dec_value(&body["data"]["balance"]), Decimal::ZERO);

    // welcome email went out
    assert_eq!(
        app.notifier.welcomes.lock().unwrap().as_slice(),
        ["newbie@example.com"]
    );
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new().await;
    app.seed_user("taken@example.com", dec!(0), UserRole::Customer)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({
                "email": "taken@example.com",
                "password": "a-long-enough-password",
                "display_name": "Copycat",
            })),
            None,
        )
        .await;
    let body = read_json(response, StatusCode::BAD_REQUEST).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("already exists"));
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = TestApp::new().await;
    app.seed_user("login@example.com", dec!(0), UserRole::Customer)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "login@example.com", "password": "wrong" })),
            None,
        )
        .await;
    read_json(response, StatusCode::UNAUTHORIZED).await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "login@example.com", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    let body = read_json(response, StatusCode::OK).await;
    assert!(body["data"]["token"]["access_token"].is_string());
}

#[tokio::test]
async fn top_up_credits_balance_and_ledger_together() {
    let app = TestApp::new().await;
    let (user, token) = app
        .seed_user("wallet@example.com", dec!(5), UserRole::Customer)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/account/topup",
            Some(json!({ "amount": "25.50" })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::OK).await;
    assert_eq!(dec_value(&body["data"]["balance"]), dec!(30.50));

    let rows = Transaction::find()
        .filter(transaction::Column::UserId.eq(user.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, dec!(25.50));
    assert_eq!(rows[0].kind, transaction::TransactionKind::TopUp);
    assert_eq!(rows[0].order_id, None);
}

#[tokio::test]
async fn non_positive_top_up_is_rejected() {
    let app = TestApp::new().await;
    let (user, token) = app
        .seed_user("zero@example.com", dec!(5), UserRole::Customer)
        .await;

    for amount in ["0", "-10"] {
        let response = app
            .request(
                Method::POST,
                "/api/account/topup",
                Some(json!({ "amount": amount })),
                Some(&token),
            )
            .await;
        read_json(response, StatusCode::BAD_REQUEST).await;
    }

    // untouched wallet, empty ledger
    let rows = Transaction::find()
        .filter(transaction::Column::UserId.eq(user.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn transaction_history_is_newest_first() {
    let app = TestApp::new().await;
    let (_, token) = app
        .seed_user("history@example.com", dec!(0), UserRole::Customer)
        .await;

    for amount in ["10", "20", "30"] {
        let response = app
            .request(
                Method::POST,
                "/api/account/topup",
                Some(json!({ "amount": amount })),
                Some(&token),
            )
            .await;
        read_json(response, StatusCode::OK).await;
    }

    let response = app
        .request(
            Method::GET,
            "/api/account/transactions?page=1&limit=2",
            None,
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["transactions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn purchased_keys_show_up_under_the_account() {
    let app = TestApp::new().await;
    let (_, token) = app
        .seed_user("library@example.com", dec!(100), UserRole::Customer)
        .await;
    let game = app
        .seed_game("Vault Runner", dec!(30), true, Some("g2a-7001"))
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 2 }] })),
            Some(&token),
        )
        .await;
    read_json(response, StatusCode::CREATED).await;

    let response = app
        .request(Method::GET, "/api/account/keys", None, Some(&token))
        .await;
    let body = read_json(response, StatusCode::OK).await;
    let keys = body["data"].as_array().unwrap();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0]["game_title"], "Vault Runner");
    assert_eq!(keys[0]["activated"], false);
}
