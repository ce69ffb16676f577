use crate::{
    entities::{
        game::{self, Entity as GameEntity},
        game_key::{self, Entity as GameKeyEntity},
        order::{self, Entity as OrderEntity, OrderStatus, PaymentStatus},
        order_item::{self, Entity as OrderItemEntity},
        promo_code::{self, Entity as PromoCodeEntity},
        transaction::{self, TransactionKind, TransactionStatus},
        user::{self, Entity as UserEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifier::{KeyDelivery, Notifier},
    supplier::SupplierClient,
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Checkout request: the caller supplies game ids and quantities only;
/// prices always come from the catalog.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderLineRequest>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub game_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub game_id: Uuid,
    pub game_title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GameKeyResponse {
    pub id: Uuid,
    pub game_id: Uuid,
    pub code: String,
    pub activated: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub items: Vec<OrderItemResponse>,
    pub keys: Vec<GameKeyResponse>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-line fulfillment outcome. Key purchases are best-effort: an order
/// completes even when some (or all) lines fall short, and this report is
/// how callers see the shortfall.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LineFulfillment {
    pub game_id: Uuid,
    pub game_title: String,
    pub requested: i32,
    pub issued: i32,
    /// One message per failed key purchase; empty on full success.
    pub failures: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutOutcome {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub fulfillment: Vec<LineFulfillment>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Rounds a percentage discount to cents, away from zero on midpoints.
pub(crate) fn compute_discount(subtotal: Decimal, percent: Decimal) -> Decimal {
    (subtotal * percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Orchestrates pricing, payment, and fulfillment for checkout.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    supplier: Arc<dyn SupplierClient>,
    notifier: Arc<dyn Notifier>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        supplier: Arc<dyn SupplierClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            event_sender,
            supplier,
            notifier,
        }
    }

    /// Creates, pays, and (best-effort) fulfills an order.
    ///
    /// Validation happens before any write. Order insert, the guarded
    /// balance decrement, the ledger row, and the guarded promo
    /// increment commit in a single transaction; key purchases run after
    /// commit and never roll the order back.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for line in &request.items {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity for game {} must be at least 1",
                    line.game_id
                )));
            }
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start checkout transaction");
            ServiceError::DatabaseError(e)
        })?;

        // Step 1: the buyer must exist.
        let buyer = UserEntity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        // Step 2: every requested game must exist (strict count match).
        let mut requested_ids: Vec<Uuid> = request.items.iter().map(|l| l.game_id).collect();
        requested_ids.sort();
        requested_ids.dedup();

        let games: HashMap<Uuid, game::Model> = GameEntity::find()
            .filter(game::Column::Id.is_in(requested_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        if games.len() != requested_ids.len() {
            let missing: Vec<String> = requested_ids
                .iter()
                .filter(|id| !games.contains_key(id))
                .map(|id| id.to_string())
                .collect();
            return Err(ServiceError::NotFound(format!(
                "Game(s) not found: {}",
                missing.join(", ")
            )));
        }

        // Step 3: every line must be purchasable.
        for line in &request.items {
            let game = &games[&line.game_id];
            if !game.in_stock {
                return Err(ServiceError::InvalidState(format!(
                    "Game '{}' is out of stock",
                    game.title
                )));
            }
        }

        // Step 4: price from the catalog, never from the caller.
        let subtotal: Decimal = request
            .items
            .iter()
            .map(|line| games[&line.game_id].price * Decimal::from(line.quantity))
            .sum();

        // Step 5: promo codes discount only while active, unexhausted,
        // and inside their validity window; anything else prices the
        // order in full.
        let promo = match &request.promo_code {
            Some(code) => {
                // codes are stored uppercase
                let code = code.trim().to_uppercase();
                let found = PromoCodeEntity::find()
                    .filter(promo_code::Column::Code.eq(code.clone()))
                    .one(&txn)
                    .await?;
                match found {
                    Some(p) if p.is_redeemable_at(now) => Some(p),
                    Some(p) => {
                        info!(code = %p.code, "promo code not redeemable; charging full price");
                        None
                    }
                    None => {
                        info!(code = %code, "unknown promo code; charging full price");
                        None
                    }
                }
            }
            None => None,
        };

        let discount = promo
            .as_ref()
            .map(|p| compute_discount(subtotal, p.discount_percent))
            .unwrap_or(Decimal::ZERO);

        // Step 6: the wallet must cover the total before anything is written.
        let total = subtotal - discount;
        if buyer.balance < total {
            return Err(ServiceError::InvalidState("Insufficient balance".into()));
        }

        // Step 7: order and items.
        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            status: Set(OrderStatus::Processing),
            payment_status: Set(PaymentStatus::Pending),
            subtotal: Set(subtotal),
            discount: Set(discount),
            total: Set(total),
            promo_code_id: Set(promo.as_ref().map(|p| p.id)),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let game = &games[&line.game_id];
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                game_id: Set(line.game_id),
                quantity: Set(line.quantity),
                unit_price: Set(game.price),
                discount: Set(Decimal::ZERO),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        // Step 8: guarded decrement; a zero-row match means a concurrent
        // checkout spent the balance first.
        let debited = UserEntity::update_many()
            .col_expr(
                user::Column::Balance,
                Expr::col(user::Column::Balance).sub(total),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(user_id))
            .filter(user::Column::Balance.gte(total))
            .exec(&txn)
            .await?;
        if debited.rows_affected == 0 {
            return Err(ServiceError::InvalidState("Insufficient balance".into()));
        }

        // Step 9: immutable ledger row for the purchase.
        transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            order_id: Set(Some(order_id)),
            kind: Set(TransactionKind::Purchase),
            amount: Set(-total),
            status: Set(TransactionStatus::Completed),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        // Guarded promo redemption; losing the race voids the discount,
        // so the checkout is rejected rather than mispriced.
        if let Some(p) = &promo {
            let mut redeem = PromoCodeEntity::update_many()
                .col_expr(
                    promo_code::Column::UsedCount,
                    Expr::col(promo_code::Column::UsedCount).add(1),
                )
                .filter(promo_code::Column::Id.eq(p.id))
                .filter(promo_code::Column::Active.eq(true));
            if let Some(max) = p.max_uses {
                redeem = redeem.filter(promo_code::Column::UsedCount.lt(max));
            }
            let redeemed = redeem.exec(&txn).await?;
            if redeemed.rows_affected == 0 {
                return Err(ServiceError::InvalidState(
                    "Promo code is no longer available".into(),
                ));
            }
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit checkout transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, total = %total, "order created and paid");

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order_id)).await {
            warn!(error = %e, order_id = %order_id, "Failed to send order created event");
        }
        if let Some(p) = &promo {
            if let Err(e) = self
                .event_sender
                .send(Event::PromoRedeemed {
                    promo_code_id: p.id,
                    order_id,
                    discount,
                })
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send promo redeemed event");
            }
        }

        // Step 10: best-effort key purchases, one per unit.
        let (keys, fulfillment) = self.fulfill_order(order_id, &request.items, &games).await;

        if !keys.is_empty() {
            let deliveries: Vec<KeyDelivery> = keys
                .iter()
                .map(|key| KeyDelivery {
                    game_title: games
                        .get(&key.game_id)
                        .map(|g| g.title.clone())
                        .unwrap_or_default(),
                    key: key.code.clone(),
                })
                .collect();
            if let Err(e) = self
                .notifier
                .keys_delivered(&buyer.email, &order_id.to_string(), &deliveries)
                .await
            {
                warn!(error = %e, order_id = %order_id, "Failed to send key delivery email");
            }
        }

        // Step 11: the order completes regardless of fulfillment shortfalls.
        let completed_at = Utc::now();
        let mut completed: order::ActiveModel = order_model.into();
        completed.status = Set(OrderStatus::Completed);
        completed.payment_status = Set(PaymentStatus::Completed);
        completed.updated_at = Set(completed_at);
        completed.completed_at = Set(Some(completed_at));
        let order_model = completed.update(&*self.db).await?;

        let keys_requested: i32 = request
            .items
            .iter()
            .filter(|l| games[&l.game_id].g2a_product_id.is_some())
            .map(|l| l.quantity)
            .sum();
        if let Err(e) = self
            .event_sender
            .send(Event::OrderCompleted {
                order_id,
                keys_issued: keys.len(),
                keys_requested: keys_requested as usize,
            })
            .await
        {
            warn!(error = %e, order_id = %order_id, "Failed to send order completed event");
        }

        // Step 12: hydrated outcome.
        let order = self.hydrate(order_model, items, keys, &games);
        Ok(CheckoutOutcome { order, fulfillment })
    }

    /// Buys keys line by line. Failures are logged, recorded in the
    /// report, and skipped; there is no retry and no rollback.
    async fn fulfill_order(
        &self,
        order_id: Uuid,
        lines: &[OrderLineRequest],
        games: &HashMap<Uuid, game::Model>,
    ) -> (Vec<game_key::Model>, Vec<LineFulfillment>) {
        let mut keys = Vec::new();
        let mut report = Vec::with_capacity(lines.len());

        for line in lines {
            let game = &games[&line.game_id];
            let mut outcome = LineFulfillment {
                game_id: game.id,
                game_title: game.title.clone(),
                requested: line.quantity,
                issued: 0,
                failures: Vec::new(),
            };

            let Some(product_id) = &game.g2a_product_id else {
                outcome
                    .failures
                    .push("game is not linked to the supplier catalog".to_string());
                report.push(outcome);
                continue;
            };

            for _ in 0..line.quantity {
                match self.supplier.purchase_key(product_id).await {
                    Ok(purchased) => {
                        let inserted = game_key::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            game_id: Set(game.id),
                            order_id: Set(order_id),
                            code: Set(purchased.key),
                            activated: Set(false),
                            activation_date: Set(None),
                            created_at: Set(Utc::now()),
                        }
                        .insert(&*self.db)
                        .await;

                        match inserted {
                            Ok(key) => {
                                outcome.issued += 1;
                                let _ = self
                                    .event_sender
                                    .send(Event::KeyIssued {
                                        order_id,
                                        game_id: game.id,
                                    })
                                    .await;
                                keys.push(key);
                            }
                            Err(e) => {
                                error!(error = %e, order_id = %order_id, game_id = %game.id, "Failed to persist purchased key");
                                outcome.failures.push(format!("key persistence failed: {e}"));
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, order_id = %order_id, game_id = %game.id, "Supplier key purchase failed; continuing");
                        let _ = self
                            .event_sender
                            .send(Event::KeyIssueFailed {
                                order_id,
                                game_id: game.id,
                                reason: e.to_string(),
                            })
                            .await;
                        outcome.failures.push(e.to_string());
                    }
                }
            }

            report.push(outcome);
        }

        (keys, report)
    }

    /// Retrieves one of the caller's orders, fully hydrated.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn get_order_for_user(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        let keys = GameKeyEntity::find()
            .filter(game_key::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        let games = self.games_for(&items).await?;
        Ok(self.hydrate(order, items, keys, &games))
    }

    /// Lists the caller's orders, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = page.max(1);
        let paginator = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.eq(order.id))
                .all(&*self.db)
                .await?;
            let keys = GameKeyEntity::find()
                .filter(game_key::Column::OrderId.eq(order.id))
                .all(&*self.db)
                .await?;
            let games = self.games_for(&items).await?;
            responses.push(self.hydrate(order, items, keys, &games));
        }

        Ok(OrderListResponse {
            orders: responses,
            total,
            page,
            per_page,
        })
    }

    async fn games_for(
        &self,
        items: &[order_item::Model],
    ) -> Result<HashMap<Uuid, game::Model>, ServiceError> {
        let ids: Vec<Uuid> = items.iter().map(|i| i.game_id).collect();
        Ok(GameEntity::find()
            .filter(game::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect())
    }

    fn hydrate(
        &self,
        order: order::Model,
        items: Vec<order_item::Model>,
        keys: Vec<game_key::Model>,
        games: &HashMap<Uuid, game::Model>,
    ) -> OrderResponse {
        OrderResponse {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            payment_status: order.payment_status,
            subtotal: order.subtotal,
            discount: order.discount,
            total: order.total,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    id: item.id,
                    game_id: item.game_id,
                    game_title: games
                        .get(&item.game_id)
                        .map(|g| g.title.clone())
                        .unwrap_or_default(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    discount: item.discount,
                })
                .collect(),
            keys: keys
                .into_iter()
                .map(|key| GameKeyResponse {
                    id: key.id,
                    game_id: key.game_id,
                    code: key.code,
                    activated: key.activated,
                })
                .collect(),
            created_at: order.created_at,
            completed_at: order.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn discount_rounds_to_cents() {
        assert_eq!(compute_discount(dec!(40), dec!(10)), dec!(4.00));
        assert_eq!(compute_discount(dec!(19.99), dec!(15)), dec!(3.00));
        assert_eq!(compute_discount(dec!(0.01), dec!(50)), dec!(0.01));
        assert_eq!(compute_discount(dec!(100), dec!(0)), dec!(0));
    }

    #[test]
    fn discount_midpoints_round_away_from_zero() {
        // 0.125 -> 0.13, not banker's 0.12
        assert_eq!(compute_discount(dec!(1.25), dec!(10)), dec!(0.13));
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_subtotal(
            cents in 0u64..10_000_000,
            percent in 0u32..=100,
        ) {
            let subtotal = Decimal::from(cents) / Decimal::ONE_HUNDRED;
            let discount = compute_discount(subtotal, Decimal::from(percent));
            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= subtotal);
            // total stays non-negative and exact
            prop_assert!(subtotal - discount >= Decimal::ZERO);
        }
    }
}
