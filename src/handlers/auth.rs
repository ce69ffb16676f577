use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::services::accounts::{ProfileResponse, RegisterRequest};
use crate::{auth::AuthUser, auth::TokenResponse, errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: TokenResponse,
    pub user: ProfileResponse,
}

/// Register a new customer account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    summary = "Register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Invalid input or email already registered", body = crate::errors::ErrorBody),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ServiceError> {
    let user = state.services.accounts.register(request).await?;
    let token = state.auth.generate_token(&user).map_err(ServiceError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AuthResponse {
            token,
            user: user.into(),
        })),
    ))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    summary = "Login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorBody),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let (user, token) = state
        .auth
        .login(&request.email, &request.password)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(ApiResponse::success(AuthResponse {
        token,
        user: user.into(),
    })))
}

/// Profile of the authenticated caller
#[utoipa::path(
    get,
    path = "/api/auth/me",
    summary = "Current user",
    responses(
        (status = 200, description = "Profile retrieved", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorBody),
    ),
    security(("Bearer" = []))
)]
pub async fn me(
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
