use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::db::campaign::{
    Campaign, CampaignFilter, CampaignPatch, CampaignRepository, CampaignStatus, NewCampaign,
};
use crate::db::contribution::ContributionRepository;
use crate::error::AppError;
use crate::progress::derive_progress;
use crate::upload::{to_data_uri, MediaUploader};

use super::session::SessionService;

type CampaignState = (
    Arc<SessionService>,
    CampaignRepository,
    ContributionRepository,
    Arc<dyn MediaUploader>,
);

/// Campaign as returned by every read path: the stored row plus the
/// progress percentage derived at read time.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResponse {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub progress: Decimal,
}

impl From<Campaign> for CampaignResponse {
    fn from(campaign: Campaign) -> Self {
        let progress = derive_progress(campaign.current_amount, campaign.target_amount);
        Self { campaign, progress }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    status: Option<CampaignStatus>,
    limit: Option<i64>,
    creator_id: Option<Uuid>,
}

/// Filtering by creator exposes unpublished drafts, so the session must
/// match the requested creator.
fn authorize_creator_filter(
    requested: Option<Uuid>,
    session: Option<Uuid>,
) -> Result<(), AppError> {
    match requested {
        Some(creator_id) if session != Some(creator_id) => Err(AppError::Forbidden),
        _ => Ok(()),
    }
}

async fn create_campaign(
    headers: HeaderMap,
    State((session, campaigns, _, uploader)): State<CampaignState>,
    Json(payload): Json<NewCampaign>,
) -> Result<impl IntoResponse, AppError> {
    let creator_id = session.require_session(&headers)?;
    payload.validate()?;

    // upload before insert so a failed upload never leaves a campaign
    // with a dangling cover reference
    let cover_image = match &payload.cover_image {
        Some(base64) => Some(uploader.upload(&to_data_uri(base64)).await?),
        None => None,
    };

    let campaign = campaigns.create(creator_id, &payload, cover_image).await?;
    Ok((StatusCode::CREATED, Json(CampaignResponse::from(campaign))))
}

async fn list_campaigns(
    headers: HeaderMap,
    State((session, campaigns, _, _)): State<CampaignState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    authorize_creator_filter(query.creator_id, session.session_from_headers(&headers))?;

    let filter = CampaignFilter {
        status: query.status,
        creator_id: query.creator_id,
        limit: query.limit,
    };
    let campaigns = campaigns.list(filter).await?;
    let annotated: Vec<CampaignResponse> =
        campaigns.into_iter().map(CampaignResponse::from).collect();
    Ok(Json(annotated))
}

// all campaigns belonging to the authenticated caller
async fn my_campaigns(
    headers: HeaderMap,
    State((session, campaigns, _, _)): State<CampaignState>,
) -> Result<impl IntoResponse, AppError> {
    let caller_id = session.require_session(&headers)?;

    let filter = CampaignFilter {
        creator_id: Some(caller_id),
        ..CampaignFilter::default()
    };
    let campaigns = campaigns.list(filter).await?;
    let annotated: Vec<CampaignResponse> =
        campaigns.into_iter().map(CampaignResponse::from).collect();
    Ok(Json(annotated))
}

async fn get_campaign(
    State((_, campaigns, _, _)): State<CampaignState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let campaign = campaigns.find_by_id(campaign_id).await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

async fn update_campaign(
    headers: HeaderMap,
    State((session, campaigns, _, _)): State<CampaignState>,
    Path(campaign_id): Path<Uuid>,
    Json(patch): Json<CampaignPatch>,
) -> Result<impl IntoResponse, AppError> {
    let caller_id = session.require_session(&headers)?;
    let campaign = campaigns.update(campaign_id, caller_id, &patch).await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

async fn delete_campaign(
    headers: HeaderMap,
    State((session, campaigns, _, _)): State<CampaignState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let caller_id = session.require_session(&headers)?;
    campaigns.delete(campaign_id, caller_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Serialize)]
struct OwnershipResponse {
    #[serde(rename = "isOwner")]
    is_owner: bool,
}

// fail-open predicate gating UI visibility; always 200
async fn campaign_ownership(
    headers: HeaderMap,
    State((session, campaigns, _, _)): State<CampaignState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let caller_id = session.session_from_headers(&headers);
    let is_owner = campaigns.is_owner(campaign_id, caller_id).await?;
    Ok(Json(OwnershipResponse { is_owner }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CampaignStatistics {
    id: Uuid,
    campaign_title: String,
    total_amount: Decimal,
    contributors_count: i64,
    contributions_count: i64,
    progress: Decimal,
}

// creator-only dashboard figures, derived from the ledger
async fn campaign_statistics(
    headers: HeaderMap,
    State((session, campaigns, contributions, _)): State<CampaignState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let caller_id = session.require_session(&headers)?;

    let campaign = campaigns.find_by_id(campaign_id).await?;
    if campaign.creator_id != caller_id {
        tracing::warn!("statistics of campaign {campaign_id} denied to {caller_id}");
        return Err(AppError::Forbidden);
    }

    let stats = contributions.stats_for(campaign_id).await?;
    Ok(Json(CampaignStatistics {
        id: campaign.id,
        campaign_title: campaign.title,
        total_amount: stats.total_amount,
        contributors_count: stats.contributors_count,
        contributions_count: stats.contributions_count,
        progress: derive_progress(campaign.current_amount, campaign.target_amount),
    }))
}

pub fn campaign_routes(
    session: Arc<SessionService>,
    campaigns: CampaignRepository,
    contributions: ContributionRepository,
    uploader: Arc<dyn MediaUploader>,
) -> Router {
    Router::new()
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route("/campaigns/user", get(my_campaigns))
        .route(
            "/campaigns/:id",
            get(get_campaign)
                .put(update_campaign)
                .delete(delete_campaign),
        )
        .route("/campaigns/:id/ownership", get(campaign_ownership))
        .route("/campaigns/:id/statistics", get(campaign_statistics))
        .with_state((session, campaigns, contributions, uploader))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn campaign(current: Decimal, target: Decimal) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            title: "Solar kits".to_string(),
            description: None,
            cover_image: None,
            target_amount: target,
            current_amount: current,
            category: "energy".to_string(),
            localisation: "Thiès".to_string(),
            start_date: None,
            end_date: None,
            status: CampaignStatus::Active,
            creator_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn read_responses_carry_derived_progress() {
        let response = CampaignResponse::from(campaign(dec!(750), dec!(1000)));
        assert_eq!(response.progress, dec!(75.0));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["progress"], serde_json::json!(75.0));
        // flattened row fields sit next to the derived one
        assert_eq!(json["currentAmount"], serde_json::json!(750.0));
    }

    #[test]
    fn over_funded_response_reads_above_one_hundred() {
        let response = CampaignResponse::from(campaign(dec!(1200), dec!(1000)));
        assert_eq!(response.progress, dec!(120.0));
    }

    #[test]
    fn creator_filter_requires_matching_session() {
        let creator = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert!(authorize_creator_filter(None, None).is_ok());
        assert!(authorize_creator_filter(None, Some(stranger)).is_ok());
        assert!(authorize_creator_filter(Some(creator), Some(creator)).is_ok());
        assert!(matches!(
            authorize_creator_filter(Some(creator), Some(stranger)),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            authorize_creator_filter(Some(creator), None),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn ownership_response_uses_is_owner_key() {
        let json = serde_json::to_value(OwnershipResponse { is_owner: true }).unwrap();
        assert_eq!(json, serde_json::json!({ "isOwner": true }));
    }
}
