use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PlayVault API",
        version = "1.0.0",
        description = r#"
# PlayVault Storefront API

Backend for a digital game key storefront: catalog browsing, wallet
checkout, supplier key fulfillment, and the admin back-office.

## Authentication

Authenticated endpoints expect a bearer token from `/api/auth/login`:

```
Authorization: Bearer <token>
```

Admin endpoints additionally require the `admin` role.

## Response envelope

Every response body is wrapped as

```json
{ "success": true, "data": { } }
{ "success": false, "error": { "message": "..." } }
```
        "#,
        contact(name = "PlayVault Backend", email = "backend@playvault.gg"),
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Registration and token issuance"),
        (name = "Games", description = "Catalog browsing"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Account", description = "Wallet and profile"),
        (name = "Promo codes", description = "Discount codes"),
        (name = "Admin", description = "Back-office endpoints")
    ),
    paths(
        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::me,

        // Catalog
        crate::handlers::games::list_games,
        crate::handlers::games::get_game,
        crate::handlers::games::create_game,
        crate::handlers::games::update_game,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,

        // Account
        crate::handlers::account::get_profile,
        crate::handlers::account::top_up,
        crate::handlers::account::list_transactions,
        crate::handlers::account::list_keys,

        // Promo codes
        crate::handlers::promos::validate_promo_code,
        crate::handlers::promos::create_promo_code,
        crate::handlers::promos::list_promo_codes,
        crate::handlers::promos::deactivate_promo_code,

        // Admin
        crate::handlers::admin::dashboard,
        crate::handlers::admin::search_users,
        crate::handlers::admin::search_transactions,
        crate::handlers::admin::trigger_catalog_sync,
        crate::handlers::admin::trigger_stock_check,
    ),
    components(schemas(
        crate::errors::ErrorBody,
        crate::entities::game::Model,
        crate::entities::promo_code::Model,
        crate::entities::transaction::Model,
        crate::entities::transaction::TransactionKind,
        crate::entities::transaction::TransactionStatus,
        crate::entities::user::UserRole,
        crate::entities::order::OrderStatus,
        crate::entities::order::PaymentStatus,
        crate::auth::TokenResponse,
        crate::handlers::auth::LoginRequest,
        crate::handlers::auth::AuthResponse,
        crate::handlers::promos::ValidatePromoCodeRequest,
        crate::services::accounts::RegisterRequest,
        crate::services::accounts::TopUpRequest,
        crate::services::accounts::ProfileResponse,
        crate::services::accounts::OwnedKeyResponse,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::OrderLineRequest,
        crate::services::orders::OrderResponse,
        crate::services::orders::OrderItemResponse,
        crate::services::orders::GameKeyResponse,
        crate::services::orders::LineFulfillment,
        crate::services::orders::CheckoutOutcome,
        crate::services::orders::OrderListResponse,
        crate::services::accounts::TransactionListResponse,
        crate::services::catalog::CreateGameInput,
        crate::services::catalog::UpdateGameInput,
        crate::services::catalog::GameSearchResult,
        crate::services::promos::CreatePromoCodeInput,
        crate::services::promos::PromoValidation,
        crate::services::promos::PromoCodeListResponse,
        crate::services::admin::DashboardResponse,
        crate::services::admin::UserSearchResponse,
        crate::services::admin::TransactionSearchResponse,
        crate::jobs::CatalogSyncSummary,
        crate::jobs::StockCheckSummary,
    ))
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the OpenAPI document at
/// `/api-docs/openapi.json`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
