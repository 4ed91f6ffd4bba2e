use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::contribution::{ContributionRepository, NewContribution};
use crate::error::AppError;

use super::session::SessionService;

type ContributionState = (Arc<SessionService>, ContributionRepository);

const DEFAULT_PAGE_SIZE: i64 = 20;

async fn create_contribution(
    headers: HeaderMap,
    State((session, contributions)): State<ContributionState>,
    Json(payload): Json<NewContribution>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Starting contribution creation process");

    // contributions are always attributed to the session, even when
    // marked anonymous; anonymity is a display concern
    let user_id = session.require_session(&headers)?;

    let contribution = contributions.create(user_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(contribution)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    campaign_id: Option<Uuid>,
    limit: Option<i64>,
}

async fn list_contributions(
    State((_, contributions)): State<ContributionState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let campaign_id = query
        .campaign_id
        .ok_or_else(|| AppError::Validation("campaignId is required".into()))?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let page = contributions.list(campaign_id, limit).await?;
    Ok(Json(page))
}

pub fn contribution_routes(
    session: Arc<SessionService>,
    contributions: ContributionRepository,
) -> Router {
    Router::new()
        .route(
            "/contributions",
            get(list_contributions).post(create_contribution),
        )
        .with_state((session, contributions))
}
