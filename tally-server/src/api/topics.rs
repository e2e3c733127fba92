use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{ApiError, ApiResult},
    state::AppState,
};
use tally_types::{
    CastVoteRequest, CreateTopicRequest, SetTopicActiveRequest, ShareOutcome, ShareRequest,
    SubmissionOutcome, Topic, TopicStats, VoteOutcome,
};

fn parse_topic_id(topic_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(topic_id).map_err(|_| ApiError::BadRequest("Invalid topic ID".to_string()))
}

#[derive(Deserialize)]
pub struct ListTopicsQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    25
}

/// GET /topics - Active topics, newest first
pub async fn list_topics(
    State(state): State<AppState>,
    Query(query): Query<ListTopicsQuery>,
) -> ApiResult<Json<Vec<Topic>>> {
    let topics = state.engagement.list_active_topics(query.limit)?;
    Ok(Json(topics))
}

/// POST /topics - Create a topic, optionally as a user submission
pub async fn create_topic(
    State(state): State<AppState>,
    Json(payload): Json<CreateTopicRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionOutcome>)> {
    let outcome = state.engagement.create_topic(payload)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /topics/:id/stats
pub async fn get_topic_stats(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
) -> ApiResult<Json<TopicStats>> {
    let topic_id = parse_topic_id(&topic_id)?;
    let stats = state.engagement.get_topic_stats(&topic_id)?;
    Ok(Json(stats))
}

/// PUT /topics/:id/active - Open or close a topic for voting
pub async fn set_topic_active(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Json(payload): Json<SetTopicActiveRequest>,
) -> ApiResult<Json<Topic>> {
    let topic_id = parse_topic_id(&topic_id)?;
    let topic = state.engagement.set_topic_active(&topic_id, payload.is_active)?;
    Ok(Json(topic))
}

/// POST /topics/:id/recount - Rebuild cached tallies from vote rows
pub async fn recount_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
) -> ApiResult<Json<TopicStats>> {
    let topic_id = parse_topic_id(&topic_id)?;
    let stats = state.engagement.repair_tallies(&topic_id)?;
    Ok(Json(stats))
}

/// POST /topics/:id/vote - Cast or change a vote
pub async fn vote_on_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Json(payload): Json<CastVoteRequest>,
) -> ApiResult<Json<VoteOutcome>> {
    let topic_id = parse_topic_id(&topic_id)?;
    let fid = payload
        .fid
        .ok_or_else(|| ApiError::BadRequest("fid is required".to_string()))?;
    let choice = payload
        .choice
        .ok_or_else(|| ApiError::BadRequest("choice is required".to_string()))?;

    let outcome = state.engagement.record_vote(&topic_id, fid, &choice)?;
    Ok(Json(outcome))
}

/// POST /topics/:id/share
pub async fn share_topic(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Json(payload): Json<ShareRequest>,
) -> ApiResult<Json<ShareOutcome>> {
    let topic_id = parse_topic_id(&topic_id)?;
    let fid = payload
        .fid
        .ok_or_else(|| ApiError::BadRequest("fid is required".to_string()))?;

    let outcome = state.engagement.record_share(&topic_id, fid)?;
    Ok(Json(outcome))
}
