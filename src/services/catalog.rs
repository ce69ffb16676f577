use crate::{
    entities::game::{self, Entity as GameEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    supplier::CatalogEntry,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct GameQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub platform: Option<String>,
    pub in_stock: Option<bool>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GameSearchResult {
    pub games: Vec<game::Model>,
    pub total: u64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGameInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 200))]
    pub slug: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub genre: Option<String>,
    pub platform: Option<String>,
    pub cover_url: Option<String>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    pub g2a_product_id: Option<String>,
}

fn default_in_stock() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateGameInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub genre: Option<String>,
    pub platform: Option<String>,
    pub cover_url: Option<String>,
    pub in_stock: Option<bool>,
    pub g2a_product_id: Option<String>,
}

/// Catalog service: storefront browsing plus the admin and supplier-sync
/// write paths.
#[derive(Clone)]
pub struct GameCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl GameCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Paginated, filtered catalog listing.
    #[instrument(skip(self))]
    pub async fn list_games(&self, query: GameQuery) -> Result<GameSearchResult, ServiceError> {
        let mut db_query = GameEntity::find();

        if let Some(search) = &query.search {
            db_query = db_query.filter(game::Column::Title.contains(search));
        }
        if let Some(genre) = &query.genre {
            db_query = db_query.filter(game::Column::Genre.eq(genre.clone()));
        }
        if let Some(platform) = &query.platform {
            db_query = db_query.filter(game::Column::Platform.eq(platform.clone()));
        }
        if let Some(in_stock) = query.in_stock {
            db_query = db_query.filter(game::Column::InStock.eq(in_stock));
        }

        let total = db_query.clone().count(&*self.db).await?;

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let games = db_query
            .order_by_asc(game::Column::Title)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;

        Ok(GameSearchResult { games, total })
    }

    pub async fn get_game(&self, game_id: Uuid) -> Result<game::Model, ServiceError> {
        GameEntity::find_by_id(game_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Game {} not found", game_id)))
    }

    pub async fn get_game_by_slug(&self, slug: &str) -> Result<game::Model, ServiceError> {
        GameEntity::find()
            .filter(game::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Game '{}' not found", slug)))
    }

    /// Admin: add a game to the catalog.
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_game(&self, input: CreateGameInput) -> Result<game::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must be positive".into(),
            ));
        }
        self.ensure_unique_slug(&input.slug, None).await?;

        let now = Utc::now();
        let created = game::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title),
            slug: Set(input.slug),
            description: Set(input.description),
            price: Set(input.price),
            genre: Set(input.genre),
            platform: Set(input.platform),
            cover_url: Set(input.cover_url),
            in_stock: Set(input.in_stock),
            g2a_product_id: Set(input.g2a_product_id),
            g2a_stock: Set(None),
            g2a_synced_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(game_id = %created.id, "game added to catalog");
        if let Err(e) = self.event_sender.send(Event::GameCreated(created.id)).await {
            warn!(error = %e, "Failed to send game created event");
        }

        Ok(created)
    }

    /// Admin: partial update.
    #[instrument(skip(self, input), fields(game_id = %game_id))]
    pub async fn update_game(
        &self,
        game_id: Uuid,
        input: UpdateGameInput,
    ) -> Result<game::Model, ServiceError> {
        let existing = self.get_game(game_id).await?;

        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must be positive".into(),
                ));
            }
        }

        let mut active: game::ActiveModel = existing.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(genre) = input.genre {
            active.genre = Set(Some(genre));
        }
        if let Some(platform) = input.platform {
            active.platform = Set(Some(platform));
        }
        if let Some(cover_url) = input.cover_url {
            active.cover_url = Set(Some(cover_url));
        }
        if let Some(in_stock) = input.in_stock {
            active.in_stock = Set(in_stock);
        }
        if let Some(product_id) = input.g2a_product_id {
            active.g2a_product_id = Set(Some(product_id));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;

        if let Err(e) = self.event_sender.send(Event::GameUpdated(game_id)).await {
            warn!(error = %e, "Failed to send game updated event");
        }

        Ok(updated)
    }

    /// Stock-check write path: overwrite supplier-reported availability.
    #[instrument(skip(self), fields(game_id = %game_id))]
    pub async fn apply_stock_result(
        &self,
        game_id: Uuid,
        available: bool,
        quantity: i32,
    ) -> Result<game::Model, ServiceError> {
        let existing = self.get_game(game_id).await?;

        let mut active: game::ActiveModel = existing.into();
        active.in_stock = Set(available);
        active.g2a_stock = Set(Some(quantity));
        active.g2a_synced_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        if let Err(e) = self
            .event_sender
            .send(Event::StockChecked {
                game_id,
                in_stock: available,
                supplier_stock: Some(quantity),
            })
            .await
        {
            warn!(error = %e, "Failed to send stock checked event");
        }

        Ok(updated)
    }

    /// All in-stock games that are linked to the supplier catalog; the
    /// stock-check job's working set.
    pub async fn supplier_linked_games(&self) -> Result<Vec<game::Model>, ServiceError> {
        Ok(GameEntity::find()
            .filter(game::Column::InStock.eq(true))
            .filter(game::Column::G2aProductId.is_not_null())
            .all(&*self.db)
            .await?)
    }

    /// Catalog-sync write path: upsert one supplier catalog row. Known
    /// products get their supplier stock fields refreshed; unseen ones
    /// enter the catalog at the supplier price.
    #[instrument(skip(self, entry), fields(product_id = %entry.product_id))]
    pub async fn upsert_from_supplier(&self, entry: &CatalogEntry) -> Result<(), ServiceError> {
        let existing = GameEntity::find()
            .filter(game::Column::G2aProductId.eq(entry.product_id.clone()))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        match existing {
            Some(game) => {
                let mut active: game::ActiveModel = game.into();
                active.in_stock = Set(entry.available);
                active.g2a_stock = Set(Some(entry.quantity));
                active.g2a_synced_at = Set(Some(now));
                active.updated_at = Set(now);
                active.update(&*self.db).await?;
            }
            None => {
                let slug = slugify(&entry.name);
                // Slug collisions with unlinked games keep the local row;
                // the supplier product is skipped rather than clobbered.
                if self.get_game_by_slug(&slug).await.is_ok() {
                    warn!(slug = %slug, "supplier product collides with existing slug; skipping");
                    return Ok(());
                }

                game::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    title: Set(entry.name.clone()),
                    slug: Set(slug),
                    description: Set(None),
                    price: Set(entry.min_price),
                    genre: Set(None),
                    platform: Set(entry.platform.clone()),
                    cover_url: Set(None),
                    in_stock: Set(entry.available),
                    g2a_product_id: Set(Some(entry.product_id.clone())),
                    g2a_stock: Set(Some(entry.quantity)),
                    g2a_synced_at: Set(Some(now)),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&*self.db)
                .await?;
            }
        }

        Ok(())
    }

    async fn ensure_unique_slug(
        &self,
        slug: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = GameEntity::find().filter(game::Column::Slug.eq(slug));
        if let Some(id) = exclude_id {
            query = query.filter(game::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::InvalidState(format!(
                "A game with slug '{}' already exists",
                slug
            )));
        }
        Ok(())
    }
}

/// Lowercase, alphanumeric-and-dashes slug.
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
