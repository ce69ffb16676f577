pub mod account;
pub mod admin;
pub mod auth;
pub mod games;
pub mod orders;
pub mod promos;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifier::Notifier;
use crate::supplier::SupplierClient;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<crate::services::GameCatalogService>,
    pub orders: Arc<crate::services::OrderService>,
    pub accounts: Arc<crate::services::AccountService>,
    pub promos: Arc<crate::services::PromoCodeService>,
    pub admin: Arc<crate::services::AdminQueryService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        supplier: Arc<dyn SupplierClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let catalog = Arc::new(crate::services::GameCatalogService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(crate::services::OrderService::new(
            db.clone(),
            event_sender.clone(),
            supplier,
            notifier.clone(),
        ));
        let accounts = Arc::new(crate::services::AccountService::new(
            db.clone(),
            event_sender,
            notifier,
        ));
        let promos = Arc::new(crate::services::PromoCodeService::new(db.clone()));
        let admin = Arc::new(crate::services::AdminQueryService::new(db));

        Self {
            catalog,
            orders,
            accounts,
            promos,
            admin,
        }
    }
}
