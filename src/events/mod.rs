use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Domain events emitted by the services. The processing loop is the
// audit trail; senders never wait on handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserRegistered(Uuid),
    BalanceToppedUp {
        user_id: Uuid,
        amount: Decimal,
    },

    // Order events
    OrderCreated(Uuid),
    OrderCompleted {
        order_id: Uuid,
        keys_issued: usize,
        keys_requested: usize,
    },
    KeyIssued {
        order_id: Uuid,
        game_id: Uuid,
    },
    KeyIssueFailed {
        order_id: Uuid,
        game_id: Uuid,
        reason: String,
    },

    // Promo events
    PromoRedeemed {
        promo_code_id: Uuid,
        order_id: Uuid,
        discount: Decimal,
    },

    // Catalog events
    GameCreated(Uuid),
    GameUpdated(Uuid),
    StockChecked {
        game_id: Uuid,
        in_stock: bool,
        supplier_stock: Option<i32>,
    },
    CatalogSynced {
        upserted: usize,
        failed: usize,
        finished_at: DateTime<Utc>,
    },
}

/// Event processing loop. Runs for the lifetime of the server; events
/// are logged as the audit stream.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCompleted {
                order_id,
                keys_issued,
                keys_requested,
            } if keys_issued < keys_requested => {
                warn!(
                    order_id = %order_id,
                    keys_issued,
                    keys_requested,
                    "order completed with partial fulfillment"
                );
            }
            Event::KeyIssueFailed {
                order_id,
                game_id,
                reason,
            } => {
                warn!(order_id = %order_id, game_id = %game_id, reason = %reason, "key issuance failed");
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }

    info!("Event processing loop stopped");
}
