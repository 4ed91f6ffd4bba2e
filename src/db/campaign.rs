use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "campaign_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub category: String,
    pub localisation: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for campaign creation. `cover_image` is the raw base64 of the
/// image; the handler exchanges it for a durable URL before insertion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub title: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub target_amount: Decimal,
    pub category: String,
    #[serde(default)]
    pub localisation: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<CampaignStatus>,
}

impl NewCampaign {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("title is required".into()));
        }
        if self.target_amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "targetAmount must be positive".into(),
            ));
        }
        if self.category.trim().is_empty() {
            return Err(AppError::Validation("category is required".into()));
        }
        Ok(())
    }
}

/// Partial update; only present fields are written. `currentAmount` is
/// deliberately absent: the contribution transaction is the sole write
/// path for it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub target_amount: Option<Decimal>,
    pub category: Option<String>,
    pub localisation: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<CampaignStatus>,
}

/// Structured listing filter; replaces the loose query objects of the
/// route layer with explicit optional fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct CampaignFilter {
    pub status: Option<CampaignStatus>,
    pub creator_id: Option<Uuid>,
    pub limit: Option<i64>,
}

fn build_list_query(filter: CampaignFilter) -> QueryBuilder<'static, sqlx::Postgres> {
    let mut query_builder = QueryBuilder::new("SELECT * FROM campaigns WHERE 1 = 1");
    if let Some(status) = filter.status {
        query_builder.push(" AND status = ").push_bind(status);
    }
    if let Some(creator_id) = filter.creator_id {
        query_builder.push(" AND creator_id = ").push_bind(creator_id);
    }
    // newest created first
    query_builder.push(" ORDER BY created_at DESC");
    if let Some(limit) = filter.limit {
        query_builder.push(" LIMIT ").push_bind(limit);
    }
    query_builder
}

// Database repository for the campaign aggregate
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new campaign for `creator_id`. The running total always
    /// starts at zero; status defaults to draft unless the payload says
    /// otherwise. `cover_image` is the already-uploaded URL, if any.
    pub async fn create(
        &self,
        creator_id: Uuid,
        new: &NewCampaign,
        cover_image: Option<String>,
    ) -> Result<Campaign, AppError> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns
                (id, title, description, cover_image, target_amount, current_amount,
                 category, localisation, start_date, end_date, status, creator_id)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(cover_image)
        .bind(new.target_amount)
        .bind(&new.category)
        .bind(&new.localisation)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.status.unwrap_or(CampaignStatus::Draft))
        .bind(creator_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("campaign created: {}", campaign.id);
        Ok(campaign)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Campaign, AppError> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("campaign"))
    }

    pub async fn list(&self, filter: CampaignFilter) -> Result<Vec<Campaign>, AppError> {
        let campaigns = build_list_query(filter)
            .build_query_as::<Campaign>()
            .fetch_all(&self.pool)
            .await?;
        Ok(campaigns)
    }

    /// Applies `patch` on behalf of `caller_id`. The caller must be the
    /// creator; any status may move to any other status.
    pub async fn update(
        &self,
        id: Uuid,
        caller_id: Uuid,
        patch: &CampaignPatch,
    ) -> Result<Campaign, AppError> {
        let existing = self.find_by_id(id).await?;
        if existing.creator_id != caller_id {
            tracing::warn!("unauthorized update of campaign {id} by {caller_id}");
            return Err(AppError::Forbidden);
        }

        let mut query_builder = QueryBuilder::new("UPDATE campaigns SET updated_at = now()");
        if let Some(title) = &patch.title {
            query_builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = &patch.description {
            query_builder.push(", description = ").push_bind(description);
        }
        if let Some(cover_image) = &patch.cover_image {
            query_builder.push(", cover_image = ").push_bind(cover_image);
        }
        if let Some(target_amount) = patch.target_amount {
            query_builder.push(", target_amount = ").push_bind(target_amount);
        }
        if let Some(category) = &patch.category {
            query_builder.push(", category = ").push_bind(category);
        }
        if let Some(localisation) = &patch.localisation {
            query_builder.push(", localisation = ").push_bind(localisation);
        }
        if let Some(start_date) = patch.start_date {
            query_builder.push(", start_date = ").push_bind(start_date);
        }
        if let Some(end_date) = patch.end_date {
            query_builder.push(", end_date = ").push_bind(end_date);
        }
        if let Some(status) = patch.status {
            query_builder.push(", status = ").push_bind(status);
        }
        query_builder.push(" WHERE id = ").push_bind(id);
        query_builder.push(" RETURNING *");

        let campaign = query_builder
            .build_query_as::<Campaign>()
            .fetch_one(&self.pool)
            .await?;

        tracing::info!("campaign updated: {id}");
        Ok(campaign)
    }

    /// Removes the campaign; its contributions go with it via cascade.
    pub async fn delete(&self, id: Uuid, caller_id: Uuid) -> Result<(), AppError> {
        let existing = self.find_by_id(id).await?;
        if existing.creator_id != caller_id {
            tracing::warn!("unauthorized delete of campaign {id} by {caller_id}");
            return Err(AppError::Forbidden);
        }

        sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::info!("campaign deleted: {id}");
        Ok(())
    }

    /// Fail-open ownership predicate: a missing session or an unknown
    /// campaign answers `false`, never an error. This gates UI visibility
    /// only; mutation paths use the strict checks above.
    pub async fn is_owner(&self, id: Uuid, caller_id: Option<Uuid>) -> Result<bool, AppError> {
        let Some(caller_id) = caller_id else {
            return Ok(false);
        };
        let creator: Option<(Uuid,)> =
            sqlx::query_as("SELECT creator_id FROM campaigns WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(creator.map(|(creator_id,)| creator_id == caller_id).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_new_campaign() -> NewCampaign {
        NewCampaign {
            title: "Clean water for Ndiaye".to_string(),
            description: Some("Well construction".to_string()),
            cover_image: None,
            target_amount: dec!(1000),
            category: "community".to_string(),
            localisation: "Dakar".to_string(),
            start_date: None,
            end_date: None,
            status: None,
        }
    }

    #[test]
    fn valid_payload_passes_validation() {
        assert!(valid_new_campaign().validate().is_ok());
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut new = valid_new_campaign();
        new.title = "   ".to_string();
        assert!(matches!(new.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn non_positive_target_is_rejected() {
        let mut new = valid_new_campaign();
        new.target_amount = dec!(0);
        assert!(matches!(new.validate(), Err(AppError::Validation(_))));
        new.target_amount = dec!(-50);
        assert!(matches!(new.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn missing_category_is_rejected() {
        let mut new = valid_new_campaign();
        new.category = String::new();
        assert!(matches!(new.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&CampaignStatus::Draft).unwrap(),
            r#""draft""#
        );
        let status: CampaignStatus = serde_json::from_str(r#""cancelled""#).unwrap();
        assert_eq!(status, CampaignStatus::Cancelled);
    }

    #[test]
    fn any_status_may_be_patched_to_any_other() {
        // permissive transition graph: the patch type accepts all four
        for raw in ["draft", "active", "completed", "cancelled"] {
            let patch: CampaignPatch =
                serde_json::from_str(&format!(r#"{{"status":"{raw}"}}"#)).unwrap();
            assert!(patch.status.is_some());
        }
    }

    #[test]
    fn list_query_orders_newest_first() {
        let sql = build_list_query(CampaignFilter::default()).into_sql();
        assert!(sql.contains("ORDER BY created_at DESC"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn list_query_binds_only_present_filters() {
        let filter = CampaignFilter {
            status: Some(CampaignStatus::Active),
            creator_id: None,
            limit: Some(6),
        };
        let sql = build_list_query(filter).into_sql();
        assert!(sql.contains("status = $1"));
        assert!(sql.contains("LIMIT $2"));
        assert!(!sql.contains("creator_id"));
    }
}
