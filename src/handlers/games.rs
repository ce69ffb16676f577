use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::entities::game;
use crate::services::catalog::{CreateGameInput, GameQuery, GameSearchResult, UpdateGameInput};
use crate::{errors::ServiceError, ApiResponse, AppState};

/// Browse the catalog
#[utoipa::path(
    get,
    path = "/api/games",
    summary = "List games",
    params(
        ("search" = Option<String>, Query, description = "Title substring"),
        ("genre" = Option<String>, Query, description = "Exact genre"),
        ("platform" = Option<String>, Query, description = "Exact platform"),
        ("in_stock" = Option<bool>, Query, description = "Stock filter"),
        ("limit" = Option<u64>, Query, description = "Items per page (default 20, max 100)"),
        ("offset" = Option<u64>, Query, description = "Offset into the result set"),
    ),
    responses(
        (status = 200, description = "Games retrieved", body = ApiResponse<GameSearchResult>),
    )
)]
pub async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<GameQuery>,
) -> Result<Json<ApiResponse<GameSearchResult>>, ServiceError> {
    let result = state.services.catalog.list_games(query).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Fetch a single game
#[utoipa::path(
    get,
    path = "/api/games/{id}",
    summary = "Get game",
    params(("id" = Uuid, Path, description = "Game id")),
    responses(
        (status = 200, description = "Game retrieved", body = ApiResponse<game::Model>),
        (status = 404, description = "Game not found", body = crate::errors::ErrorBody),
    )
)]
pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<game::Model>>, ServiceError> {
    let game = state.services.catalog.get_game(id).await?;
    Ok(Json(ApiResponse::success(game)))
}

/// Admin: add a game
#[utoipa::path(
    post,
    path = "/api/admin/games",
    summary = "Create game",
    request_body = CreateGameInput,
    responses(
        (status = 201, description = "Game created", body = ApiResponse<game::Model>),
        (status = 400, description = "Invalid input or duplicate slug", body = crate::errors::ErrorBody),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn create_game(
    State(state): State<AppState>,
    Json(input): Json<CreateGameInput>,
) -> Result<(StatusCode, Json<ApiResponse<game::Model>>), ServiceError> {
    let created = state.services.catalog.create_game(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Admin: update a game
#[utoipa::path(
    put,
    path = "/api/admin/games/{id}",
    summary = "Update game",
    params(("id" = Uuid, Path, description = "Game id")),
    request_body = UpdateGameInput,
    responses(
        (status = 200, description = "Game updated", body = ApiResponse<game::Model>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorBody),
        (status = 404, description = "Game not found", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn update_game(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateGameInput>,
) -> Result<Json<ApiResponse<game::Model>>, ServiceError> {
    let updated = state.services.catalog.update_game(id, input).await?;
    Ok(Json(ApiResponse::success(updated)))
}
