//! Periodic supplier synchronization.
//!
//! Two independent timers with no coordination between them: the catalog
//! sync upserts the supplier catalog into the local games table, and the
//! stock check re-validates availability for every supplier-linked game.
//! Each job is single-flight: a tick (or manual trigger) that arrives
//! while the previous run is still going is skipped, not queued.

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::GameCatalogService,
    supplier::SupplierClient,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

/// Upper bound on catalog pages per run; a supplier feed reporting more
/// than this is treated as malformed.
const MAX_CATALOG_PAGES: u32 = 500;

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogSyncSummary {
    pub pages: u32,
    pub upserted: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockCheckSummary {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct SyncJobs {
    catalog: Arc<GameCatalogService>,
    supplier: Arc<dyn SupplierClient>,
    event_sender: Arc<EventSender>,
    catalog_guard: Mutex<()>,
    stock_guard: Mutex<()>,
}

impl SyncJobs {
    pub fn new(
        catalog: Arc<GameCatalogService>,
        supplier: Arc<dyn SupplierClient>,
        event_sender: Arc<EventSender>,
    ) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            supplier,
            event_sender,
            catalog_guard: Mutex::new(()),
            stock_guard: Mutex::new(()),
        })
    }

    /// Pages through the supplier catalog and upserts local game rows.
    /// Per-entry failures are counted and skipped.
    #[instrument(skip(self))]
    pub async fn run_catalog_sync(&self) -> Result<CatalogSyncSummary, ServiceError> {
        let _guard = self.catalog_guard.try_lock().map_err(|_| {
            ServiceError::InvalidState("Catalog sync is already running".to_string())
        })?;

        let mut summary = CatalogSyncSummary {
            pages: 0,
            upserted: 0,
            failed: 0,
        };

        let mut page = 1u32;
        loop {
            let catalog_page = self.supplier.fetch_catalog_page(page).await?;
            summary.pages += 1;

            for entry in &catalog_page.entries {
                match self.catalog.upsert_from_supplier(entry).await {
                    Ok(()) => summary.upserted += 1,
                    Err(e) => {
                        warn!(product_id = %entry.product_id, error = %e, "catalog upsert failed; continuing");
                        summary.failed += 1;
                    }
                }
            }

            if page >= catalog_page.total_pages {
                break;
            }
            if page >= MAX_CATALOG_PAGES {
                warn!(
                    total_pages = catalog_page.total_pages,
                    "supplier reports more pages than the per-run cap; stopping early"
                );
                break;
            }
            page += 1;
        }

        info!(
            pages = summary.pages,
            upserted = summary.upserted,
            failed = summary.failed,
            "catalog sync finished"
        );
        if let Err(e) = self
            .event_sender
            .send(Event::CatalogSynced {
                upserted: summary.upserted,
                failed: summary.failed,
                finished_at: Utc::now(),
            })
            .await
        {
            warn!(error = %e, "Failed to send catalog synced event");
        }

        Ok(summary)
    }

    /// Re-validates supplier stock for every in-stock, supplier-linked
    /// game. Per-game failures are logged and do not abort the batch.
    #[instrument(skip(self))]
    pub async fn run_stock_check(&self) -> Result<StockCheckSummary, ServiceError> {
        let _guard = self
            .stock_guard
            .try_lock()
            .map_err(|_| ServiceError::InvalidState("Stock check is already running".to_string()))?;

        let games = self.catalog.supplier_linked_games().await?;
        let mut summary = StockCheckSummary {
            checked: 0,
            updated: 0,
            failed: 0,
        };

        for game in games {
            // supplier_linked_games only returns rows with a product id
            let Some(product_id) = game.g2a_product_id.clone() else {
                continue;
            };
            summary.checked += 1;

            match self.supplier.check_stock(&product_id).await {
                Ok(stock) => {
                    match self
                        .catalog
                        .apply_stock_result(game.id, stock.available, stock.quantity)
                        .await
                    {
                        Ok(_) => summary.updated += 1,
                        Err(e) => {
                            warn!(game_id = %game.id, error = %e, "failed to persist stock result; continuing");
                            summary.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(game_id = %game.id, product_id = %product_id, error = %e, "supplier stock check failed; continuing");
                    summary.failed += 1;
                }
            }
        }

        info!(
            checked = summary.checked,
            updated = summary.updated,
            failed = summary.failed,
            "stock check finished"
        );

        Ok(summary)
    }

    /// Spawns the periodic loops. A period of zero disables a job.
    pub fn spawn_periodic(self: &Arc<Self>, cfg: &AppConfig) {
        if cfg.catalog_sync_interval_secs > 0 {
            let jobs = self.clone();
            let period = Duration::from_secs(cfg.catalog_sync_interval_secs);
            tokio::spawn(async move {
                loop {
                    sleep(period).await;
                    match jobs.run_catalog_sync().await {
                        Ok(_) => {}
                        Err(ServiceError::InvalidState(msg)) => {
                            warn!("catalog sync tick skipped: {}", msg);
                        }
                        Err(e) => error!("catalog sync failed: {}", e),
                    }
                }
            });
            info!(
                period_secs = cfg.catalog_sync_interval_secs,
                "catalog sync job scheduled"
            );
        }

        if cfg.stock_check_interval_secs > 0 {
            let jobs = self.clone();
            let period = Duration::from_secs(cfg.stock_check_interval_secs);
            tokio::spawn(async move {
                loop {
                    sleep(period).await;
                    match jobs.run_stock_check().await {
                        Ok(_) => {}
                        Err(ServiceError::InvalidState(msg)) => {
                            warn!("stock check tick skipped: {}", msg);
                        }
                        Err(e) => error!("stock check failed: {}", e),
                    }
                }
            });
            info!(
                period_secs = cfg.stock_check_interval_secs,
                "stock check job scheduled"
            );
        }
    }
}
