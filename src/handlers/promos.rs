use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::promo_code;
use crate::services::promos::{CreatePromoCodeInput, PromoCodeListResponse, PromoValidation};
use crate::{errors::ServiceError, ApiResponse, AppState, ListQuery};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidatePromoCodeRequest {
    pub code: String,
    /// Cart subtotal the discount would apply to
    pub subtotal: Decimal,
}

/// Cart-time promo preview. Reports validity without consuming a use.
#[utoipa::path(
    post,
    path = "/api/promo-codes/validate",
    summary = "Validate promo code",
    request_body = ValidatePromoCodeRequest,
    responses(
        (status = 200, description = "Validation result (valid or not)", body = ApiResponse<PromoValidation>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn validate_promo_code(
    State(state): State<AppState>,
    Json(request): Json<ValidatePromoCodeRequest>,
) -> Result<Json<ApiResponse<PromoValidation>>, ServiceError> {
    let validation = state
        .services
        .promos
        .validate(&request.code, request.subtotal)
        .await?;
    Ok(Json(ApiResponse::success(validation)))
}

/// Admin: create a promo code
#[utoipa::path(
    post,
    path = "/api/admin/promo-codes",
    summary = "Create promo code",
    request_body = CreatePromoCodeInput,
    responses(
        (status = 201, description = "Promo code created", body = ApiResponse<promo_code::Model>),
        (status = 400, description = "Invalid input or duplicate code", body = crate::errors::ErrorBody),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn create_promo_code(
    State(state): State<AppState>,
    Json(input): Json<CreatePromoCodeInput>,
) -> Result<(StatusCode, Json<ApiResponse<promo_code::Model>>), ServiceError> {
    let created = state.services.promos.create(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Admin: list promo codes
#[utoipa::path(
    get,
    path = "/api/admin/promo-codes",
    summary = "List promo codes",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
    ),
    responses(
        (status = 200, description = "Promo codes retrieved", body = ApiResponse<PromoCodeListResponse>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn list_promo_codes(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PromoCodeListResponse>>, ServiceError> {
    let result = state.services.promos.list(query.page, query.limit).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Admin: deactivate a promo code
#[utoipa::path(
    post,
    path = "/api/admin/promo-codes/{id}/deactivate",
    summary = "Deactivate promo code",
    params(("id" = Uuid, Path, description = "Promo code id")),
    responses(
        (status = 200, description = "Promo code deactivated", body = ApiResponse<promo_code::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
        (status = 404, description = "Promo code not found", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn deactivate_promo_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<promo_code::Model>>, ServiceError> {
    let updated = state.services.promos.deactivate(id).await?;
    Ok(Json(ApiResponse::success(updated)))
}
