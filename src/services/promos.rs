use crate::{
    entities::promo_code::{self, Entity as PromoCodeEntity},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::orders::compute_discount;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePromoCodeInput {
    pub code: String,
    pub discount_percent: Decimal,
    pub max_uses: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Cart-time preview of what a code would do to a given subtotal.
#[derive(Debug, Serialize, ToSchema)]
pub struct PromoValidation {
    pub code: String,
    pub valid: bool,
    pub discount_percent: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromoCodeListResponse {
    pub promo_codes: Vec<promo_code::Model>,
    pub total: u64,
}

/// Promo code service: the cart preview endpoint plus the admin surface.
/// The checkout-time redemption itself lives in the order workflow so it
/// shares the checkout transaction.
#[derive(Clone)]
pub struct PromoCodeService {
    db: Arc<DatabaseConnection>,
}

impl PromoCodeService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Admin: create a code.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(
        &self,
        input: CreatePromoCodeInput,
    ) -> Result<promo_code::Model, ServiceError> {
        if input.code.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Promo code must not be empty".into(),
            ));
        }
        if input.discount_percent <= Decimal::ZERO || input.discount_percent > Decimal::ONE_HUNDRED
        {
            return Err(ServiceError::ValidationError(
                "Discount percent must be in (0, 100]".into(),
            ));
        }
        if let Some(max) = input.max_uses {
            if max < 1 {
                return Err(ServiceError::ValidationError(
                    "Max uses must be at least 1".into(),
                ));
            }
        }
        if input.valid_until < input.valid_from {
            return Err(ServiceError::ValidationError(
                "Validity window ends before it starts".into(),
            ));
        }

        let code = input.code.trim().to_uppercase();
        let existing = PromoCodeEntity::find()
            .filter(promo_code::Column::Code.eq(code.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::InvalidState(format!(
                "Promo code '{}' already exists",
                code
            )));
        }

        let created = promo_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            discount_percent: Set(input.discount_percent),
            active: Set(true),
            used_count: Set(0),
            max_uses: Set(input.max_uses),
            valid_from: Set(input.valid_from),
            valid_until: Set(input.valid_until),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(promo_code_id = %created.id, "promo code created");
        Ok(created)
    }

    /// Admin: list codes, newest first.
    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<PromoCodeListResponse, ServiceError> {
        let page = page.max(1);
        let paginator = PromoCodeEntity::find()
            .order_by_desc(promo_code::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let promo_codes = paginator.fetch_page(page - 1).await?;

        Ok(PromoCodeListResponse { promo_codes, total })
    }

    /// Admin: deactivate a code. Deactivation is the only mutation;
    /// codes are never deleted so order history keeps its referent.
    #[instrument(skip(self), fields(promo_code_id = %id))]
    pub async fn deactivate(&self, id: Uuid) -> Result<promo_code::Model, ServiceError> {
        let existing = PromoCodeEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Promo code {} not found", id)))?;

        let mut active: promo_code::ActiveModel = existing.into();
        active.active = Set(false);
        let updated = active.update(&*self.db).await?;

        info!("promo code deactivated");
        Ok(updated)
    }

    /// Cart preview: reports whether `code` would discount `subtotal`
    /// right now, and by how much. Never mutates `used_count`.
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<PromoValidation, ServiceError> {
        let normalized = code.trim().to_uppercase();
        let found = PromoCodeEntity::find()
            .filter(promo_code::Column::Code.eq(normalized.clone()))
            .one(&*self.db)
            .await?;

        let Some(promo) = found else {
            return Ok(PromoValidation {
                code: normalized,
                valid: false,
                discount_percent: None,
                discount: None,
                reason: Some("Unknown promo code".into()),
            });
        };

        let now = Utc::now();
        if promo.is_redeemable_at(now) {
            Ok(PromoValidation {
                code: promo.code.clone(),
                valid: true,
                discount_percent: Some(promo.discount_percent),
                discount: Some(compute_discount(subtotal, promo.discount_percent)),
                reason: None,
            })
        } else {
            let reason = if !promo.active {
                "Promo code is inactive"
            } else if promo
                .max_uses
                .map(|max| promo.used_count >= max)
                .unwrap_or(false)
            {
                "Promo code has been fully redeemed"
            } else if now < promo.valid_from {
                "Promo code is not yet valid"
            } else {
                "Promo code has expired"
            };
            Ok(PromoValidation {
                code: promo.code.clone(),
                valid: false,
                discount_percent: None,
                discount: None,
                reason: Some(reason.to_string()),
            })
        }
    }
}
