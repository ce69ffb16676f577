#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use playvault_api::{
    auth::{hash_password, AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{
        game,
        promo_code,
        user::{self, UserRole},
    },
    events::{self, EventSender},
    handlers::AppServices,
    jobs::SyncJobs,
    notifier::{KeyDelivery, NotificationError, Notifier},
    supplier::{CatalogPage, PurchasedKey, SupplierClient, SupplierError, SupplierStock},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Scriptable supplier double. Keys are sequential; failures and
/// latency are toggled per test.
pub struct MockSupplier {
    pub fail_purchases: AtomicBool,
    pub purchase_calls: AtomicU64,
    key_counter: AtomicU64,
    pub stock: Mutex<HashMap<String, (bool, i32)>>,
    pub catalog_pages: Mutex<Vec<CatalogPage>>,
    pub page_delay_ms: AtomicU64,
}

impl MockSupplier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_purchases: AtomicBool::new(false),
            purchase_calls: AtomicU64::new(0),
            key_counter: AtomicU64::new(0),
            stock: Mutex::new(HashMap::new()),
            catalog_pages: Mutex::new(Vec::new()),
            page_delay_ms: AtomicU64::new(0),
        })
    }

    pub fn set_stock(&self, product_id: &str, available: bool, quantity: i32) {
        self.stock
            .lock()
            .unwrap()
            .insert(product_id.to_string(), (available, quantity));
    }

    pub fn set_catalog_pages(&self, pages: Vec<CatalogPage>) {
        *self.catalog_pages.lock().unwrap() = pages;
    }
}

#[async_trait]
impl SupplierClient for MockSupplier {
    async fn purchase_key(&self, product_id: &str) -> Result<PurchasedKey, SupplierError> {
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_purchases.load(Ordering::SeqCst) {
            return Err(SupplierError::Api {
                status: 500,
                message: "supplier out of keys".into(),
            });
        }
        let n = self.key_counter.fetch_add(1, Ordering::SeqCst);
        Ok(PurchasedKey {
            product_id: product_id.to_string(),
            key: format!("AAAA-BBBB-{:04}", n),
        })
    }

    async fn check_stock(&self, product_id: &str) -> Result<SupplierStock, SupplierError> {
        let stock = self.stock.lock().unwrap();
        match stock.get(product_id) {
            Some((available, quantity)) => Ok(SupplierStock {
                product_id: product_id.to_string(),
                available: *available,
                quantity: *quantity,
            }),
            None => Err(SupplierError::Api {
                status: 404,
                message: format!("unknown product {product_id}"),
            }),
        }
    }

    async fn fetch_catalog_page(&self, page: u32) -> Result<CatalogPage, SupplierError> {
        let delay = self.page_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let pages = self.catalog_pages.lock().unwrap();
        pages
            .get((page as usize).saturating_sub(1))
            .cloned()
            .ok_or(SupplierError::Api {
                status: 404,
                message: format!("no such page {page}"),
            })
    }
}

/// Notifier double that records every send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub welcomes: Mutex<Vec<String>>,
    pub deliveries: Mutex<Vec<(String, String, usize)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn user_registered(
        &self,
        email: &str,
        _display_name: &str,
    ) -> Result<(), NotificationError> {
        self.welcomes.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn keys_delivered(
        &self,
        email: &str,
        order_id: &str,
        keys: &[KeyDelivery],
    ) -> Result<(), NotificationError> {
        self.deliveries
            .lock()
            .unwrap()
            .push((email.to_string(), order_id.to_string(), keys.len()));
        Ok(())
    }
}

/// Helper harness spinning up the real router over a throwaway SQLite
/// database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub supplier: Arc<MockSupplier>,
    pub notifier: Arc<RecordingNotifier>,
    auth_service: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("playvault_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let supplier = MockSupplier::new();
        let notifier = RecordingNotifier::new();

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            "playvault-auth".to_string(),
            "playvault-api".to_string(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        );
        let auth_service = Arc::new(AuthService::new(auth_cfg, db_arc.clone()));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            supplier.clone(),
            notifier.clone(),
        );
        let jobs = SyncJobs::new(
            services.catalog.clone(),
            supplier.clone(),
            Arc::new(event_sender.clone()),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            auth: auth_service.clone(),
            services,
            jobs,
        };

        let router = Router::new()
            .nest("/api", playvault_api::api_routes(auth_service.clone()))
            .with_state(state.clone());

        Self {
            router,
            state,
            supplier,
            notifier,
            auth_service,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Insert a user directly and return (model, bearer token).
    pub async fn seed_user(
        &self,
        email: &str,
        balance: Decimal,
        role: UserRole,
    ) -> (user::Model, String) {
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(hash_password(TEST_PASSWORD).expect("hash test password")),
            display_name: Set(email.split('@').next().unwrap_or("player").to_string()),
            role: Set(role),
            balance: Set(balance),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user");

        let token = self
            .auth_service
            .generate_token(&model)
            .expect("token for seeded user")
            .access_token;

        (model, token)
    }

    /// Insert a game directly.
    pub async fn seed_game(
        &self,
        title: &str,
        price: Decimal,
        in_stock: bool,
        g2a_product_id: Option<&str>,
    ) -> game::Model {
        let now = Utc::now();
        let slug: String = title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        game::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            slug: Set(format!("{}-{}", slug, Uuid::new_v4().simple())),
            description: Set(None),
            price: Set(price),
            genre: Set(None),
            platform: Set(Some("Steam".to_string())),
            cover_url: Set(None),
            in_stock: Set(in_stock),
            g2a_product_id: Set(g2a_product_id.map(str::to_string)),
            g2a_stock: Set(None),
            g2a_synced_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed game")
    }

    /// Insert a promo code directly. The window spans yesterday..tomorrow
    /// unless shifted.
    pub async fn seed_promo(
        &self,
        code: &str,
        percent: Decimal,
        active: bool,
        used_count: i32,
        max_uses: Option<i32>,
        window_shift_days: i64,
    ) -> promo_code::Model {
        let now = Utc::now();
        promo_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            discount_percent: Set(percent),
            active: Set(active),
            used_count: Set(used_count),
            max_uses: Set(max_uses),
            valid_from: Set(now + ChronoDuration::days(window_shift_days - 1)),
            valid_until: Set(now + ChronoDuration::days(window_shift_days + 1)),
            created_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed promo code")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

/// Parse a JSON field as a Decimal whether it was serialized as a
/// string or a bare number (SQLite round-trips can change the scale).
pub fn dec_value(value: &Value) -> Decimal {
    use std::str::FromStr;
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected decimal field, got {other:?}"),
    }
}

/// Decode a response body as JSON, asserting the expected status first.
pub async fn read_json(response: axum::response::Response, expected: StatusCode) -> Value {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let value: Value = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        panic!(
            "non-json response body (status {}): {}",
            status,
            String::from_utf8_lossy(&bytes)
        )
    });
    assert_eq!(status, expected, "unexpected status; body: {value}");
    value
}
