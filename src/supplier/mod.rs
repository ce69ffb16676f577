//! Wholesale key supplier (G2A) client.
//!
//! The storefront buys activation keys one at a time during checkout and
//! polls supplier stock from the background jobs. All calls go through
//! the [`SupplierClient`] trait so tests and the order workflow never
//! depend on the concrete HTTP client.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::AppConfig;
use crate::errors::ServiceError;

#[derive(Debug, Error)]
pub enum SupplierError {
    #[error("supplier credentials are not configured")]
    NotConfigured,
    #[error("supplier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("supplier returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("supplier response could not be decoded: {0}")]
    Decode(String),
}

impl From<SupplierError> for ServiceError {
    fn from(err: SupplierError) -> Self {
        match err {
            SupplierError::NotConfigured => {
                ServiceError::ServiceUnavailable("supplier is not configured".to_string())
            }
            other => ServiceError::ExternalServiceError(other.to_string()),
        }
    }
}

/// A key bought from the supplier for one unit of one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasedKey {
    pub product_id: String,
    pub key: String,
}

/// Supplier-side availability for one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierStock {
    pub product_id: String,
    pub available: bool,
    pub quantity: i32,
}

/// One product row from the supplier catalog feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: String,
    pub name: String,
    pub platform: Option<String>,
    pub min_price: Decimal,
    pub available: bool,
    pub quantity: i32,
}

/// One page of the supplier catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPage {
    pub page: u32,
    pub total_pages: u32,
    pub entries: Vec<CatalogEntry>,
}

#[async_trait]
pub trait SupplierClient: Send + Sync {
    /// Buy one activation key for the given supplier product.
    async fn purchase_key(&self, product_id: &str) -> Result<PurchasedKey, SupplierError>;

    /// Current supplier-side stock for the given product.
    async fn check_stock(&self, product_id: &str) -> Result<SupplierStock, SupplierError>;

    /// Fetch a page of the supplier catalog (1-based).
    async fn fetch_catalog_page(&self, page: u32) -> Result<CatalogPage, SupplierError>;
}

/// Request signer: `hmac_sha256(secret, api_key + "." + timestamp)`, hex
/// encoded, sent alongside the key in the Authorization header.
pub(crate) fn sign_request(api_key: &str, api_secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let payload = format!("{}.{}", api_key, timestamp);
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Production supplier client over the G2A REST API.
#[derive(Clone)]
pub struct G2aClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    api_secret: String,
}

impl G2aClient {
    pub fn new(base_url: Url, api_key: String, api_secret: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client construction cannot fail with static options"),
            base_url,
            api_key,
            api_secret,
        }
    }

    /// Builds a client from configuration; `None` when credentials are
    /// absent (supplier calls then fail soft as unavailable).
    pub fn from_config(cfg: &AppConfig) -> Option<Result<Self, ServiceError>> {
        let api_key = cfg.g2a_api_key.clone()?;
        let api_secret = cfg.g2a_api_secret.clone()?;

        Some(
            Url::parse(&cfg.g2a_api_url)
                .map(|base_url| Self::new(base_url, api_key, api_secret))
                .map_err(|e| {
                    ServiceError::ValidationError(format!("invalid supplier base URL: {e}"))
                }),
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url, SupplierError> {
        self.base_url
            .join(path)
            .map_err(|e| SupplierError::Decode(format!("invalid endpoint {path}: {e}")))
    }

    fn auth_header(&self) -> (String, String) {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_request(&self.api_key, &self.api_secret, &timestamp);
        (timestamp, format!("{}, {}", self.api_key, signature))
    }

    async fn decode_or_api_error<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SupplierError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SupplierError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SupplierError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct KeyPurchaseResponse {
    key: String,
}

#[derive(Debug, Deserialize)]
struct StockResponse {
    available: bool,
    quantity: i32,
}

#[async_trait]
impl SupplierClient for G2aClient {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn purchase_key(&self, product_id: &str) -> Result<PurchasedKey, SupplierError> {
        let url = self.endpoint("order")?;
        let (timestamp, authorization) = self.auth_header();

        debug!("purchasing supplier key");
        let response = self
            .client
            .post(url)
            .header("Authorization", authorization)
            .header("X-Request-Timestamp", timestamp)
            .json(&serde_json::json!({ "product_id": product_id }))
            .send()
            .await?;

        let body: KeyPurchaseResponse = Self::decode_or_api_error(response).await?;

        Ok(PurchasedKey {
            product_id: product_id.to_string(),
            key: body.key,
        })
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn check_stock(&self, product_id: &str) -> Result<SupplierStock, SupplierError> {
        let url = self.endpoint(&format!("products/{product_id}/stock"))?;
        let (timestamp, authorization) = self.auth_header();

        let response = self
            .client
            .get(url)
            .header("Authorization", authorization)
            .header("X-Request-Timestamp", timestamp)
            .send()
            .await?;

        let body: StockResponse = Self::decode_or_api_error(response).await?;

        Ok(SupplierStock {
            product_id: product_id.to_string(),
            available: body.available,
            quantity: body.quantity,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_catalog_page(&self, page: u32) -> Result<CatalogPage, SupplierError> {
        let url = self.endpoint(&format!("products?page={page}"))?;
        let (timestamp, authorization) = self.auth_header();

        let response = self
            .client
            .get(url)
            .header("Authorization", authorization)
            .header("X-Request-Timestamp", timestamp)
            .send()
            .await?;

        Self::decode_or_api_error(response).await
    }
}

/// Stand-in used when supplier credentials are absent. Checkout stays
/// best-effort: key purchases fail soft and orders still complete.
pub struct UnconfiguredSupplier;

#[async_trait]
impl SupplierClient for UnconfiguredSupplier {
    async fn purchase_key(&self, _product_id: &str) -> Result<PurchasedKey, SupplierError> {
        Err(SupplierError::NotConfigured)
    }

    async fn check_stock(&self, _product_id: &str) -> Result<SupplierStock, SupplierError> {
        Err(SupplierError::NotConfigured)
    }

    async fn fetch_catalog_page(&self, _page: u32) -> Result<CatalogPage, SupplierError> {
        Err(SupplierError::NotConfigured)
    }
}
