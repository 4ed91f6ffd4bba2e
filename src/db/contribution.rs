use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::TryFutureExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// Upper bound on the whole insert-and-increment transaction. The pool's
/// shorter acquire timeout covers the wait for a connection.
const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: Uuid,
    pub amount: Decimal,
    pub message: Option<String>,
    pub anonymous: bool,
    pub campaign_id: Uuid,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContribution {
    pub amount: Decimal,
    pub message: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
    pub campaign_id: Uuid,
}

impl NewContribution {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.amount <= Decimal::ZERO {
            return Err(AppError::Validation("amount must be positive".into()));
        }
        Ok(())
    }
}

/// Aggregate view of a campaign's ledger. `contributors_count` counts
/// distinct underlying user ids regardless of display anonymity.
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContributionStats {
    pub total_amount: Decimal,
    pub contributors_count: i64,
    pub contributions_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionPage {
    pub contributions: Vec<Contribution>,
    pub stats: ContributionStats,
}

// Database repository for the append-only contribution ledger
#[derive(Clone)]
pub struct ContributionRepository {
    pool: PgPool,
}

impl ContributionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records a pledge. The contribution insert and the campaign's
    /// running-total increment commit or roll back together; the
    /// increment is a relative delta so concurrent pledges to the same
    /// campaign never lose updates. Contributions marked anonymous are
    /// still attributed to `user_id` in storage; anonymity only affects
    /// display.
    pub async fn create(
        &self,
        user_id: Uuid,
        new: &NewContribution,
    ) -> Result<Contribution, AppError> {
        new.validate()?;

        let worked = tokio::time::timeout(TRANSACTION_TIMEOUT, self.create_in_tx(user_id, new));
        match worked.await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    "contribution transaction for campaign {} timed out",
                    new.campaign_id
                );
                Err(AppError::Timeout)
            }
        }
    }

    async fn create_in_tx(
        &self,
        user_id: Uuid,
        new: &NewContribution,
    ) -> Result<Contribution, AppError> {
        // Begin a database transaction
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Contribution>(
            r#"
            INSERT INTO contributions (id, amount, message, anonymous, campaign_id, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.amount)
        .bind(&new.message)
        .bind(new.anonymous)
        .bind(new.campaign_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await;

        let contribution = match inserted {
            Ok(contribution) => contribution,
            Err(err) => {
                // a dangling campaign id trips the foreign key, not a 500
                if err
                    .as_database_error()
                    .is_some_and(|db| db.is_foreign_key_violation())
                {
                    return Err(AppError::NotFound("campaign"));
                }
                return Err(err.into());
            }
        };

        let updated = sqlx::query(
            "UPDATE campaigns SET current_amount = current_amount + $1, updated_at = now() \
             WHERE id = $2",
        )
        .bind(new.amount)
        .bind(new.campaign_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tracing::error!("campaign {} vanished mid-transaction", new.campaign_id);
            return Err(AppError::NotFound("campaign"));
        }

        // Commit the transaction; dropping `tx` on any early return rolls back
        tx.commit().await?;

        tracing::info!(
            "contribution {} of {} recorded for campaign {}",
            contribution.id,
            contribution.amount,
            contribution.campaign_id
        );
        Ok(contribution)
    }

    /// Newest-first page of contributions plus ledger stats. Fails with
    /// `NotFound` for an unknown campaign. The sum is independently
    /// computable from the ledger as a consistency check against the
    /// campaign's running total.
    pub async fn list(&self, campaign_id: Uuid, limit: i64) -> Result<ContributionPage, AppError> {
        let known: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM campaigns WHERE id = $1")
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await?;
        if known.is_none() {
            return Err(AppError::NotFound("campaign"));
        }

        let contributions = sqlx::query_as::<_, Contribution>(
            "SELECT * FROM contributions WHERE campaign_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool);

        let stats = self.stats_for(campaign_id);

        let (contributions, stats) = futures::try_join!(contributions.map_err(AppError::from), stats)?;

        Ok(ContributionPage {
            contributions,
            stats,
        })
    }

    pub async fn stats_for(&self, campaign_id: Uuid) -> Result<ContributionStats, AppError> {
        let stats = sqlx::query_as::<_, ContributionStats>(
            r#"
            SELECT
                COALESCE(SUM(amount), 0) AS total_amount,
                COUNT(DISTINCT user_id) AS contributors_count,
                COUNT(*) AS contributions_count
            FROM contributions
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pledge(amount: Decimal) -> NewContribution {
        NewContribution {
            amount,
            message: None,
            anonymous: false,
            campaign_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn positive_amount_passes_validation() {
        assert!(pledge(dec!(25)).validate().is_ok());
    }

    #[test]
    fn negative_amount_is_rejected() {
        assert!(matches!(
            pledge(dec!(-5)).validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(matches!(
            pledge(dec!(0)).validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn anonymous_flag_defaults_to_false() {
        let new: NewContribution = serde_json::from_str(
            r#"{"amount": 40, "campaignId": "3fa85f64-5717-4562-b3fc-2c963f66afa6"}"#,
        )
        .unwrap();
        assert!(!new.anonymous);
        assert_eq!(new.amount, dec!(40));
    }

    #[test]
    fn stats_serialize_camel_case() {
        let stats = ContributionStats {
            total_amount: dec!(750),
            contributors_count: 2,
            contributions_count: 3,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalAmount"], serde_json::json!(750.0));
        assert_eq!(json["contributorsCount"], 2);
        assert_eq!(json["contributionsCount"], 3);
    }
}
