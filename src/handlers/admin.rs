use axum::{
    extract::{Query, State},
    response::Json,
};
use uuid::Uuid;

use crate::jobs::{CatalogSyncSummary, StockCheckSummary};
use crate::services::admin::{
    DashboardResponse, TransactionSearchQuery, TransactionSearchResponse, UserSearchQuery,
    UserSearchResponse,
};
use crate::{errors::ServiceError, ApiResponse, AppState};

/// Back-office dashboard counters
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    summary = "Dashboard",
    responses(
        (status = 200, description = "Counters retrieved", body = ApiResponse<DashboardResponse>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardResponse>>, ServiceError> {
    let data = state.services.admin.dashboard().await?;
    Ok(Json(ApiResponse::success(data)))
}

/// Filtered user search
#[utoipa::path(
    get,
    path = "/api/admin/users",
    summary = "Search users",
    params(
        ("search" = Option<String>, Query, description = "Email/display-name substring"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Users retrieved", body = ApiResponse<UserSearchResponse>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<ApiResponse<UserSearchResponse>>, ServiceError> {
    let result = state.services.admin.search_users(query).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Filtered ledger search
#[utoipa::path(
    get,
    path = "/api/admin/transactions",
    summary = "Search transactions",
    params(
        ("user_id" = Option<Uuid>, Query, description = "Filter by user"),
        ("kind" = Option<String>, Query, description = "purchase | top_up"),
        ("from" = Option<String>, Query, description = "RFC 3339 lower bound"),
        ("to" = Option<String>, Query, description = "RFC 3339 upper bound"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Transactions retrieved", body = ApiResponse<TransactionSearchResponse>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn search_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionSearchQuery>,
) -> Result<Json<ApiResponse<TransactionSearchResponse>>, ServiceError> {
    let result = state.services.admin.search_transactions(query).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Manually trigger a supplier catalog sync. Returns 400 when a run is
/// already in flight (single-flight guard).
#[utoipa::path(
    post,
    path = "/api/admin/g2a/sync",
    summary = "Trigger catalog sync",
    responses(
        (status = 200, description = "Sync finished", body = ApiResponse<CatalogSyncSummary>),
        (status = 400, description = "A sync is already running", body = crate::errors::ErrorBody),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
        (status = 502, description = "Supplier unreachable", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn trigger_catalog_sync(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CatalogSyncSummary>>, ServiceError> {
    let summary = state.jobs.run_catalog_sync().await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Manually trigger a supplier stock re-check.
#[utoipa::path(
    post,
    path = "/api/admin/g2a/stock-check",
    summary = "Trigger stock check",
    responses(
        (status = 200, description = "Stock check finished", body = ApiResponse<StockCheckSummary>),
        (status = 400, description = "A stock check is already running", body = crate::errors::ErrorBody),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn trigger_stock_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StockCheckSummary>>, ServiceError> {
    let summary = state.jobs.run_stock_check().await?;
    Ok(Json(ApiResponse::success(summary)))
}
