use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub mod error;
pub mod topics;
pub mod users;

pub use error::{ApiError, ApiResult};

/// All HTTP routes, without transport layers
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Topic routes
        .route("/topics", get(topics::list_topics).post(topics::create_topic))
        .route("/topics/:id/stats", get(topics::get_topic_stats))
        .route("/topics/:id/active", put(topics::set_topic_active))
        .route("/topics/:id/recount", post(topics::recount_topic))
        .route("/topics/:id/vote", post(topics::vote_on_topic))
        .route("/topics/:id/share", post(topics::share_topic))
        // User routes
        .route("/users/:fid/streak", get(users::get_streak))
        .route("/users/:fid/achievements", get(users::get_achievements))
        .route("/streaks/leaderboard", get(users::streak_leaderboard))
        .with_state(state)
}

/// GET /health - Also confirms the database is reachable
async fn health_check(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.db.ping()?;
    Ok("OK")
}
