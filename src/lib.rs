//! PlayVault API Library
//!
//! Backend for a digital game key storefront: catalog browsing, wallet
//! checkout, supplier key fulfillment, and the admin back-office.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod jobs;
pub mod migrator;
pub mod notifier;
pub mod openapi;
pub mod services;
pub mod supplier;

use axum::{extract::State, response::Json, routing::get, routing::post, routing::put, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService};
use crate::errors::ErrorBody;

// App state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
    pub jobs: Arc<jobs::SyncJobs>,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// Standard response envelope: `{ success, data?, error? }` on every
/// response body.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                message,
                details: None,
            }),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                message: "Validation failed".to_string(),
                details: Some(errors),
            }),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Full storefront API, mounted under `/api`.
pub fn api_routes(auth: Arc<AuthService>) -> Router<AppState> {
    // Public surface: registration, login, catalog browsing
    let public = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/games", get(handlers::games::list_games))
        .route("/games/:id", get(handlers::games::get_game));

    // Anything touching the caller's account requires a bearer token
    let authenticated = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/account", get(handlers::account::get_profile))
        .route("/account/topup", post(handlers::account::top_up))
        .route(
            "/account/transactions",
            get(handlers::account::list_transactions),
        )
        .route("/account/keys", get(handlers::account::list_keys))
        .route(
            "/promo-codes/validate",
            post(handlers::promos::validate_promo_code),
        )
        .with_auth(auth.clone());

    // Back-office: admin role on top of auth
    let admin = Router::new()
        .route("/admin/dashboard", get(handlers::admin::dashboard))
        .route("/admin/users", get(handlers::admin::search_users))
        .route(
            "/admin/transactions",
            get(handlers::admin::search_transactions),
        )
        .route("/admin/games", post(handlers::games::create_game))
        .route("/admin/games/:id", put(handlers::games::update_game))
        .route(
            "/admin/promo-codes",
            post(handlers::promos::create_promo_code),
        )
        .route("/admin/promo-codes", get(handlers::promos::list_promo_codes))
        .route(
            "/admin/promo-codes/:id/deactivate",
            post(handlers::promos::deactivate_promo_code),
        )
        .route("/admin/g2a/sync", post(handlers::admin::trigger_catalog_sync))
        .route(
            "/admin/g2a/stock-check",
            post(handlers::admin::trigger_stock_check),
        )
        .with_admin(auth);

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(public)
        .merge(authenticated)
        .merge(admin)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "service": "playvault-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data_only() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));
        assert!(response.error.is_none());

        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded, json!({ "success": true, "data": "ok" }));
    }

    #[test]
    fn error_envelope_carries_message_only() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(
            encoded,
            json!({ "success": false, "error": { "message": "oops" } })
        );
    }

    #[test]
    fn validation_envelope_aggregates_field_errors() {
        let response =
            ApiResponse::<()>::validation_errors(vec!["email: invalid".into(), "x".into()]);
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["error"]["message"], "Validation failed");
        assert_eq!(encoded["error"]["details"].as_array().unwrap().len(), 2);
    }
}
