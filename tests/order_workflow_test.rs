mod common;

use axum::http::{Method, StatusCode};
use common::{dec_value as dec_field, read_json, TestApp};
use playvault_api::entities::{
    game_key, order, transaction, user::UserRole, GameKey, Order, PromoCode, Transaction, User,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use std::str::FromStr;
use std::sync::atomic::Ordering;

async fn balance_of(app: &TestApp, user_id: uuid::Uuid) -> Decimal {
    User::find_by_id(user_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("user exists")
        .balance
}

#[tokio::test]
async fn checkout_deducts_balance_and_writes_ledger() {
    let app = TestApp::new().await;
    let (buyer, token) = app.seed_user("buyer@example.com", dec!(100), UserRole::Customer).await;
    let game = app.seed_game("Hollow Depths", dec!(40), true, Some("g2a-1001")).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 1 }] })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;

    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(dec_field(&data["subtotal"]), dec!(40));
    assert_eq!(dec_field(&data["discount"]), dec!(0));
    assert_eq!(dec_field(&data["total"]), dec!(40));
    assert_eq!(data["status"], "completed");
    assert_eq!(data["payment_status"], "completed");
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["keys"].as_array().unwrap().len(), 1);

    // balance_after == balance_before - total, exactly
    assert_eq!(balance_of(&app, buyer.id).await, dec!(60));

    // exactly one PURCHASE ledger row of -40 linked to the order
    let rows = Transaction::find()
        .filter(transaction::Column::UserId.eq(buyer.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, dec!(-40));
    assert_eq!(
        rows[0].order_id.map(|id| id.to_string()),
        Some(data["id"].as_str().unwrap().to_string())
    );

    // key delivery email went out once
    assert_eq!(app.notifier.deliveries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn valid_promo_discounts_and_increments_usage() {
    let app = TestApp::new().await;
    let (buyer, token) = app.seed_user("promo@example.com", dec!(100), UserRole::Customer).await;
    let game = app.seed_game("Star Harvest", dec!(40), true, Some("g2a-2001")).await;
    let promo = app.seed_promo("SPRING10", dec!(10), true, 3, Some(10), 0).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [{ "game_id": game.id, "quantity": 1 }],
                "promo_code": "SPRING10",
            })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;

    let data = &body["data"];
    assert_eq!(dec_field(&data["subtotal"]), dec!(40));
    assert_eq!(dec_field(&data["discount"]), dec!(4.00));
    assert_eq!(dec_field(&data["total"]), dec!(36.00));
    assert_eq!(balance_of(&app, buyer.id).await, dec!(64.00));

    let reloaded = PromoCode::find_by_id(promo.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.used_count, 4);
}

#[tokio::test]
async fn expired_or_inactive_promo_leaves_full_price() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_user("expired@example.com", dec!(100), UserRole::Customer).await;
    let game = app.seed_game("Dust Rally", dec!(40), true, None).await;
    // window ended well in the past
    let expired = app.seed_promo("OLDCODE", dec!(10), true, 0, None, -30).await;
    let inactive = app.seed_promo("OFFCODE", dec!(10), false, 0, None, 0).await;

    for code in ["OLDCODE", "OFFCODE"] {
        let response = app
            .request(
                Method::POST,
                "/api/orders",
                Some(json!({
                    "items": [{ "game_id": game.id, "quantity": 1 }],
                    "promo_code": code,
                })),
                Some(&token),
            )
            .await;
        let body = read_json(response, StatusCode::CREATED).await;
        assert_eq!(dec_field(&body["data"]["discount"]), dec!(0));
        assert_eq!(
            dec_field(&body["data"]["total"]),
            dec_field(&body["data"]["subtotal"])
        );
    }

    for promo in [expired, inactive] {
        let reloaded = PromoCode::find_by_id(promo.id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.used_count, 0, "usage must not move");
    }
}

#[tokio::test]
async fn exhausted_promo_gives_no_discount() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_user("maxed@example.com", dec!(100), UserRole::Customer).await;
    let game = app.seed_game("Night Circuit", dec!(50), true, None).await;
    app.seed_promo("MAXED", dec!(20), true, 5, Some(5), 0).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [{ "game_id": game.id, "quantity": 1 }],
                "promo_code": "MAXED",
            })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;
    assert_eq!(dec_field(&body["data"]["total"]), dec!(50));
}

#[tokio::test]
async fn out_of_stock_line_rejects_the_whole_order() {
    let app = TestApp::new().await;
    let (buyer, token) = app.seed_user("oos@example.com", dec!(500), UserRole::Customer).await;
    let in_stock = app.seed_game("Deep Vale", dec!(30), true, None).await;
    let sold_out = app.seed_game("Iron Howl", dec!(30), false, None).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [
                    { "game_id": in_stock.id, "quantity": 1 },
                    { "game_id": sold_out.id, "quantity": 1 },
                ]
            })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("out of stock"));

    // no partial order, balance untouched
    let orders = Order::find().count(&*app.state.db).await.unwrap();
    assert_eq!(orders, 0);
    assert_eq!(balance_of(&app, buyer.id).await, dec!(500));
}

#[tokio::test]
async fn unknown_game_is_not_found_and_creates_nothing() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_user("ghost@example.com", dec!(100), UserRole::Customer).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [{ "game_id": uuid::Uuid::new_v4(), "quantity": 1 }]
            })),
            Some(&token),
        )
        .await;
    read_json(response, StatusCode::NOT_FOUND).await;

    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn insufficient_balance_fails_before_any_mutation() {
    let app = TestApp::new().await;
    let (buyer, token) = app.seed_user("broke@example.com", dec!(10), UserRole::Customer).await;
    let game = app.seed_game("Gilded Maze", dec!(40), true, Some("g2a-3001")).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 1 }] })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["error"]["message"], "Insufficient balance");

    assert_eq!(balance_of(&app, buyer.id).await, dec!(10));
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(Transaction::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(app.supplier.purchase_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn supplier_failure_still_completes_the_order() {
    let app = TestApp::new().await;
    let (buyer, token) = app.seed_user("partial@example.com", dec!(100), UserRole::Customer).await;
    let game = app.seed_game("Ember Line", dec!(25), true, Some("g2a-4001")).await;
    app.supplier.fail_purchases.store(true, Ordering::SeqCst);

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 2 }] })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;

    let data = &body["data"];
    assert_eq!(data["status"], "completed");
    assert_eq!(data["payment_status"], "completed");
    assert_eq!(data["keys"].as_array().unwrap().len(), 0);

    // the shortfall is an explicit, inspectable value
    let fulfillment = data["fulfillment"].as_array().unwrap();
    assert_eq!(fulfillment.len(), 1);
    assert_eq!(fulfillment[0]["requested"], 2);
    assert_eq!(fulfillment[0]["issued"], 0);
    assert_eq!(fulfillment[0]["failures"].as_array().unwrap().len(), 2);

    // payment still went through
    assert_eq!(balance_of(&app, buyer.id).await, dec!(50));
    assert_eq!(GameKey::find().count(&*app.state.db).await.unwrap(), 0);
    // nothing to deliver, so no delivery email
    assert_eq!(app.notifier.deliveries.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn unlinked_game_completes_without_keys() {
    let app = TestApp::new().await;
    let (_, token) = app.seed_user("manual@example.com", dec!(100), UserRole::Customer).await;
    let game = app.seed_game("Paper Knights", dec!(15), true, None).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 1 }] })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;

    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["keys"].as_array().unwrap().len(), 0);
    let fulfillment = &body["data"]["fulfillment"][0];
    assert!(fulfillment["failures"][0]
        .as_str()
        .unwrap()
        .contains("not linked"));
    assert_eq!(app.supplier.purchase_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn multi_line_checkout_prices_from_catalog() {
    let app = TestApp::new().await;
    let (buyer, token) = app.seed_user("cart@example.com", dec!(200), UserRole::Customer).await;
    let a = app.seed_game("Alpha Trail", dec!(19.99), true, Some("g2a-5001")).await;
    let b = app.seed_game("Beta Surge", dec!(45.50), true, Some("g2a-5002")).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [
                    { "game_id": a.id, "quantity": 2 },
                    { "game_id": b.id, "quantity": 1 },
                ]
            })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;

    // 2 * 19.99 + 45.50
    assert_eq!(dec_field(&body["data"]["subtotal"]), dec!(85.48));
    assert_eq!(dec_field(&body["data"]["total"]), dec!(85.48));
    assert_eq!(body["data"]["keys"].as_array().unwrap().len(), 3);
    assert_eq!(balance_of(&app, buyer.id).await, dec!(114.52));

    // unit prices are snapshots of the catalog price
    let items = body["data"]["items"].as_array().unwrap();
    let alpha = items
        .iter()
        .find(|i| i["game_id"] == json!(a.id))
        .unwrap();
    assert_eq!(dec_field(&alpha["unit_price"]), dec!(19.99));
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    let (_, owner_token) = app.seed_user("owner@example.com", dec!(100), UserRole::Customer).await;
    let (_, other_token) = app.seed_user("other@example.com", dec!(100), UserRole::Customer).await;
    let game = app.seed_game("Quiet Orbit", dec!(20), true, None).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 1 }] })),
            Some(&owner_token),
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // owner sees it
    let response = app
        .request(
            Method::GET,
            &format!("/api/orders/{order_id}"),
            None,
            Some(&owner_token),
        )
        .await;
    read_json(response, StatusCode::OK).await;

    // another caller gets a 404, not a 403 leak
    let response = app
        .request(
            Method::GET,
            &format!("/api/orders/{order_id}"),
            None,
            Some(&other_token),
        )
        .await;
    read_json(response, StatusCode::NOT_FOUND).await;

    // and the owner's list contains exactly one order
    let response = app
        .request(Method::GET, "/api/orders", None, Some(&owner_token))
        .await;
    let body = read_json(response, StatusCode::OK).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn checkout_requires_authentication() {
    let app = TestApp::new().await;
    let game = app.seed_game("Free Fall", dec!(10), true, None).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 1 }] })),
            None,
        )
        .await;
    read_json(response, StatusCode::UNAUTHORIZED).await;
}

#[tokio::test]
async fn order_rows_match_the_response() {
    let app = TestApp::new().await;
    let (buyer, token) = app.seed_user("rows@example.com", dec!(100), UserRole::Customer).await;
    let game = app.seed_game("Last Signal", dec!(12.50), true, Some("g2a-6001")).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "items": [{ "game_id": game.id, "quantity": 2 }] })),
            Some(&token),
        )
        .await;
    let body = read_json(response, StatusCode::CREATED).await;
    let order_id = uuid::Uuid::from_str(body["data"]["id"].as_str().unwrap()).unwrap();

    let stored = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_id, buyer.id);
    assert_eq!(stored.status, order::OrderStatus::Completed);
    assert_eq!(stored.total, dec!(25.00));
    assert!(stored.completed_at.is_some());

    let keys = GameKey::find()
        .filter(game_key::Column::OrderId.eq(order_id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| !k.activated));
}
