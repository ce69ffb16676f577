use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::services::orders::{
    CheckoutOutcome, CreateOrderRequest, OrderListResponse, OrderResponse,
};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState, ListQuery};

/// Create an order
#[utoipa::path(
    post,
    path = "/api/orders",
    summary = "Checkout",
    description = "Prices the requested games, applies an optional promo code, \
                   pays from the caller's balance, and fulfills keys best-effort",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created and paid", body = ApiResponse<CheckoutOutcome>),
        (status = 400, description = "Out of stock, insufficient balance, or invalid request", body = crate::errors::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "User or game not found", body = crate::errors::ErrorBody),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutOutcome>>), ServiceError> {
    if let Err(validation_errors) = request.validate() {
        let errors: Vec<String> = validation_errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                let field = field.to_string();
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error.message.as_ref().unwrap_or(&"Invalid value".into())
                    )
                })
            })
            .collect();
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::validation_errors(errors)),
        ));
    }

    let outcome = state
        .services
        .orders
        .create_order(auth_user.user_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

/// List the caller's orders
#[utoipa::path(
    get,
    path = "/api/orders",
    summary = "List orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
    ),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<OrderListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let result = state
        .services
        .orders
        .list_orders_for_user(auth_user.user_id, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Fetch one of the caller's orders
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
        (status = 404, description = "Order not found for this caller", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_for_user(auth_user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
