use crate::{
    auth::hash_password,
    entities::{
        game::{self, Entity as GameEntity},
        game_key::{self, Entity as GameKeyEntity},
        order::{self, Entity as OrderEntity},
        transaction::{self, Entity as TransactionEntity, TransactionKind, TransactionStatus},
        user::{self, Entity as UserEntity, UserRole},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    notifier::Notifier,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TopUpRequest {
    pub amount: Decimal,
}

/// Public view of an account; never exposes the password hash.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub balance: Decimal,
}

impl From<user::Model> for ProfileResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            display_name: model.display_name,
            role: model.role,
            balance: model.balance,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<transaction::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// A delivered key together with the game it unlocks.
#[derive(Debug, Serialize, ToSchema)]
pub struct OwnedKeyResponse {
    pub id: Uuid,
    pub game_id: Uuid,
    pub game_title: String,
    pub order_id: Uuid,
    pub code: String,
    pub activated: bool,
}

/// Account service: registration, wallet top-ups, and the caller-scoped
/// reads behind the profile screens.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn Notifier>,
}

impl AccountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            event_sender,
            notifier,
        }
    }

    /// Creates a customer account with a zero balance.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<user::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let existing = UserEntity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::InvalidState(
                "An account with this email already exists".into(),
            ));
        }

        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(request.email.clone()),
            password_hash: Set(hash_password(&request.password)?),
            display_name: Set(request.display_name.clone()),
            role: Set(UserRole::Customer),
            balance: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = %created.id, "account registered");
        if let Err(e) = self
            .event_sender
            .send(Event::UserRegistered(created.id))
            .await
        {
            warn!(error = %e, "Failed to send user registered event");
        }

        if let Err(e) = self
            .notifier
            .user_registered(&created.email, &created.display_name)
            .await
        {
            warn!(error = %e, user_id = %created.id, "Failed to send welcome email");
        }

        Ok(created)
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<ProfileResponse, ServiceError> {
        let user = UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        Ok(user.into())
    }

    /// Credits the wallet. The balance increment and the `top_up` ledger
    /// row commit together.
    #[instrument(skip(self, request), fields(user_id = %user_id, amount = %request.amount))]
    pub async fn top_up(
        &self,
        user_id: Uuid,
        request: TopUpRequest,
    ) -> Result<ProfileResponse, ServiceError> {
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Top-up amount must be positive".into(),
            ));
        }

        let now = Utc::now();
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start top-up transaction");
            ServiceError::DatabaseError(e)
        })?;

        let credited = UserEntity::update_many()
            .col_expr(
                user::Column::Balance,
                Expr::col(user::Column::Balance).add(request.amount),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(now))
            .filter(user::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;
        if credited.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }

        transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            order_id: Set(None),
            kind: Set(TransactionKind::TopUp),
            amount: Set(request.amount),
            status: Set(TransactionStatus::Completed),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to commit top-up transaction");
            ServiceError::DatabaseError(e)
        })?;

        if let Err(e) = self
            .event_sender
            .send(Event::BalanceToppedUp {
                user_id,
                amount: request.amount,
            })
            .await
        {
            warn!(error = %e, "Failed to send balance topped up event");
        }

        self.get_profile(user_id).await
    }

    /// Ledger history, newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<TransactionListResponse, ServiceError> {
        let page = page.max(1);
        let paginator = TransactionEntity::find()
            .filter(transaction::Column::UserId.eq(user_id))
            .order_by_desc(transaction::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let transactions = paginator.fetch_page(page - 1).await?;

        Ok(TransactionListResponse {
            transactions,
            total,
            page,
            per_page,
        })
    }

    /// All keys delivered to the caller across completed orders.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_keys(&self, user_id: Uuid) -> Result<Vec<OwnedKeyResponse>, ServiceError> {
        let order_ids: Vec<Uuid> = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .select_only()
            .column(order::Column::Id)
            .into_tuple()
            .all(&*self.db)
            .await?;

        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys = GameKeyEntity::find()
            .filter(game_key::Column::OrderId.is_in(order_ids))
            .order_by_desc(game_key::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let game_ids: Vec<Uuid> = keys.iter().map(|k| k.game_id).collect();
        let games: std::collections::HashMap<Uuid, game::Model> = GameEntity::find()
            .filter(game::Column::Id.is_in(game_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();

        Ok(keys
            .into_iter()
            .map(|key| OwnedKeyResponse {
                id: key.id,
                game_id: key.game_id,
                game_title: games
                    .get(&key.game_id)
                    .map(|g| g.title.clone())
                    .unwrap_or_default(),
                order_id: key.order_id,
                code: key.code,
                activated: key.activated,
            })
            .collect())
    }
}
