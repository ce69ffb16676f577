use std::sync::Arc;
use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::entities::user::{self, Entity as UserEntity, UserRole};
use crate::errors::ServiceError;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // Subject (user ID)
    pub email: String,  // User's email
    pub role: String,   // "customer" | "admin"
    pub jti: String,    // JWT ID
    pub iat: i64,       // Issued at time
    pub exp: i64,       // Expiration time
    pub nbf: i64,       // Not valid before time
    pub iss: String,    // Issuer
    pub aud: String,    // Audience
}

/// Authenticated caller resolved from the bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_expiration,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Admin role required")]
    AdminRequired,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),
}

impl AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAuth
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AdminRequired => StatusCode::FORBIDDEN,
            Self::TokenCreation(_) | Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::TokenCreation(_) | Self::DatabaseError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "error": { "message": message },
        });

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AdminRequired => ServiceError::Forbidden(err.to_string()),
            AuthError::DatabaseError(db) => ServiceError::DatabaseError(db),
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Issued token pair returned by login/register
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Hashes a password with argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {e}")))
}

/// Verifies a password against a stored argon2 hash. A malformed stored
/// hash verifies false rather than erroring.
pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Authentication service: issues and validates bearer tokens.
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Generate an access token for a user
    pub fn generate_token(&self, user: &user::Model) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let expires = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let role = match user.role {
            UserRole::Admin => "admin",
            UserRole::Customer => "customer",
        };

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: role.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        Ok(claims)
    }

    /// Verify credentials against the users table and issue a token.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(user::Model, TokenResponse), AuthError> {
        let user = UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&user.password_hash, password) {
            warn!(email = %email, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.generate_token(&user)?;
        Ok((user, token))
    }
}

fn auth_user_from_claims(claims: &Claims) -> Result<AuthUser, AuthError> {
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
    let role = match claims.role.as_str() {
        "admin" => UserRole::Admin,
        "customer" => UserRole::Customer,
        _ => return Err(AuthError::InvalidToken),
    };

    Ok(AuthUser {
        user_id,
        email: claims.email.clone(),
        role,
    })
}

/// Bearer-token middleware: resolves the caller into request extensions.
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;
    let user = auth_user_from_claims(&claims)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Role middleware: rejects non-admin callers. Must run inside
/// `auth_middleware`.
pub async fn require_admin_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.is_admin() {
        return Err(AuthError::AdminRequired);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self, auth: Arc<AuthService>) -> Self;
    fn with_admin(self, auth: Arc<AuthService>) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self, auth: Arc<AuthService>) -> Self {
        self.layer(axum::middleware::from_fn_with_state(auth, auth_middleware))
    }

    fn with_admin(self, auth: Arc<AuthService>) -> Self {
        // Auth layer is outermost so the admin check sees the resolved user
        self.layer(axum::middleware::from_fn(require_admin_middleware))
            .with_auth(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn test_service() -> AuthService {
        let config = AuthConfig::new(
            "test-secret-that-is-long-enough-for-hs256".to_string(),
            "playvault-auth".to_string(),
            "playvault-api".to_string(),
            Duration::from_secs(3600),
        );
        AuthService::new(config, Arc::new(DatabaseConnection::Disconnected))
    }

    fn test_user(role: UserRole) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            email: "player@example.com".to_string(),
            password_hash: String::new(),
            display_name: "Player".to_string(),
            role,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_round_trip() {
        let service = test_service();
        let user = test_user(UserRole::Customer);

        let token = service.generate_token(&user).expect("token issued");
        assert_eq!(token.token_type, "Bearer");

        let claims = service
            .validate_token(&token.access_token)
            .expect("token valid");
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "customer");

        let auth_user = auth_user_from_claims(&claims).expect("claims map");
        assert_eq!(auth_user.user_id, user.id);
        assert!(!auth_user.is_admin());
    }

    #[test]
    fn admin_role_survives_round_trip() {
        let service = test_service();
        let user = test_user(UserRole::Admin);

        let token = service.generate_token(&user).unwrap();
        let claims = service.validate_token(&token.access_token).unwrap();
        let auth_user = auth_user_from_claims(&claims).unwrap();
        assert!(auth_user.is_admin());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let service = test_service();
        assert!(matches!(
            service.validate_token("not-a-jwt"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2-but-longer").expect("hash");
        assert!(verify_password(&hash, "hunter2-but-longer"));
        assert!(!verify_password(&hash, "wrong-password"));
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
