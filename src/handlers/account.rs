use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::services::accounts::{
    OwnedKeyResponse, ProfileResponse, TopUpRequest, TransactionListResponse,
};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState, ListQuery};

/// Caller's account profile (including wallet balance)
#[utoipa::path(
    get,
    path = "/api/account",
    summary = "Account profile",
    responses(
        (status = 200, description = "Profile retrieved", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<ProfileResponse>>, ServiceError> {
    let profile = state
        .services
        .accounts
        .get_profile(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// Credit the caller's wallet
#[utoipa::path(
    post,
    path = "/api/account/topup",
    summary = "Top up balance",
    request_body = TopUpRequest,
    responses(
        (status = 200, description = "Balance credited", body = ApiResponse<ProfileResponse>),
        (status = 400, description = "Non-positive amount", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn top_up(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ServiceError> {
    let profile = state
        .services
        .accounts
        .top_up(auth_user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// Caller's ledger history
#[utoipa::path(
    get,
    path = "/api/account/transactions",
    summary = "List transactions",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
    ),
    responses(
        (status = 200, description = "Transactions retrieved", body = ApiResponse<TransactionListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<TransactionListResponse>>, ServiceError> {
    let result = state
        .services
        .accounts
        .list_transactions(auth_user.user_id, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

/// All keys delivered to the caller
#[utoipa::path(
    get,
    path = "/api/account/keys",
    summary = "List owned keys",
    responses(
        (status = 200, description = "Keys retrieved", body = ApiResponse<Vec<OwnedKeyResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn list_keys(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<Vec<OwnedKeyResponse>>>, ServiceError> {
    let keys = state.services.accounts.list_keys(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(keys)))
}
