use crate::{
    entities::{
        game::{self, Entity as GameEntity},
        game_key::Entity as GameKeyEntity,
        order::{self, Entity as OrderEntity, OrderStatus},
        transaction::{self, Entity as TransactionEntity, TransactionKind},
        user::{self, Entity as UserEntity},
    },
    errors::ServiceError,
    services::accounts::ProfileResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub users: u64,
    pub games: u64,
    pub games_in_stock: u64,
    pub orders: u64,
    pub completed_orders: u64,
    pub keys_issued: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserSearchQuery {
    /// Substring match against email and display name
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSearchResponse {
    pub users: Vec<ProfileResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TransactionSearchQuery {
    pub user_id: Option<Uuid>,
    pub kind: Option<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionSearchResponse {
    pub transactions: Vec<transaction::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Read-mostly back-office queries: dashboard counts and filtered
/// searches. No writes happen here.
#[derive(Clone)]
pub struct AdminQueryService {
    db: Arc<DatabaseConnection>,
}

impl AdminQueryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardResponse, ServiceError> {
        let users = UserEntity::find().count(&*self.db).await?;
        let games = GameEntity::find().count(&*self.db).await?;
        let games_in_stock = GameEntity::find()
            .filter(game::Column::InStock.eq(true))
            .count(&*self.db)
            .await?;
        let orders = OrderEntity::find().count(&*self.db).await?;
        let completed_orders = OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::Completed))
            .count(&*self.db)
            .await?;
        let keys_issued = GameKeyEntity::find().count(&*self.db).await?;

        let revenue: Option<Decimal> = OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::Completed))
            .select_only()
            .column_as(order::Column::Total.sum(), "revenue")
            .into_tuple()
            .one(&*self.db)
            .await?
            .flatten();

        Ok(DashboardResponse {
            users,
            games,
            games_in_stock,
            orders,
            completed_orders,
            keys_issued,
            revenue: revenue.unwrap_or(Decimal::ZERO),
        })
    }

    #[instrument(skip(self))]
    pub async fn search_users(
        &self,
        query: UserSearchQuery,
    ) -> Result<UserSearchResponse, ServiceError> {
        let mut db_query = UserEntity::find();
        if let Some(search) = &query.search {
            db_query = db_query.filter(
                user::Column::Email
                    .contains(search)
                    .or(user::Column::DisplayName.contains(search)),
            );
        }

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

        let paginator = db_query
            .order_by_desc(user::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let users = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(ProfileResponse::from)
            .collect();

        Ok(UserSearchResponse {
            users,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn search_transactions(
        &self,
        query: TransactionSearchQuery,
    ) -> Result<TransactionSearchResponse, ServiceError> {
        let mut db_query = TransactionEntity::find();
        if let Some(user_id) = query.user_id {
            db_query = db_query.filter(transaction::Column::UserId.eq(user_id));
        }
        if let Some(kind) = query.kind {
            db_query = db_query.filter(transaction::Column::Kind.eq(kind));
        }
        if let Some(from) = query.from {
            db_query = db_query.filter(transaction::Column::CreatedAt.gte(from));
        }
        if let Some(to) = query.to {
            db_query = db_query.filter(transaction::Column::CreatedAt.lte(to));
        }

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

        let paginator = db_query
            .order_by_desc(transaction::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let transactions = paginator.fetch_page(page - 1).await?;

        Ok(TransactionSearchResponse {
            transactions,
            total,
            page,
            per_page,
        })
    }
}
