use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    api::{ApiError, ApiResult},
    state::AppState,
};
use tally_types::{UserAchievement, UserStreak};

fn parse_fid(fid: &str) -> Result<i64, ApiError> {
    fid.parse::<i64>()
        .map_err(|_| ApiError::BadRequest("Invalid fid".to_string()))
}

/// GET /users/:fid/streak
pub async fn get_streak(
    State(state): State<AppState>,
    Path(fid): Path<String>,
) -> ApiResult<Json<UserStreak>> {
    let fid = parse_fid(&fid)?;
    state
        .engagement
        .get_streak(fid)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No streak recorded for fid {}", fid)))
}

/// GET /users/:fid/achievements - Earned achievements, oldest first
pub async fn get_achievements(
    State(state): State<AppState>,
    Path(fid): Path<String>,
) -> ApiResult<Json<Vec<UserAchievement>>> {
    let fid = parse_fid(&fid)?;
    let achievements = state.engagement.get_user_achievements(fid)?;
    Ok(Json(achievements))
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    10
}

/// GET /streaks/leaderboard - Longest running streaks
pub async fn streak_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<UserStreak>>> {
    let streaks = state.engagement.streak_leaderboard(query.limit)?;
    Ok(Json(streaks))
}
