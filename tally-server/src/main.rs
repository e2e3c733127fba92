use anyhow::Context;
use std::net::SocketAddr;
use tally_server::{api, config, db, state::AppState};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load settings
    let settings = config::Settings::new().context("Failed to load settings")?;
    let calendar = settings.calendar().context("Invalid engagement settings")?;

    // Initialize database
    let db = db::Database::new(&settings.database.path)?;
    db.initialize()?;
    if settings.database.seed_sample_topics {
        db.seed_sample_topics()?;
        tracing::info!("Sample topics seeded");
    }
    tracing::info!(
        "Database initialized at {} (streak days at UTC{})",
        settings.database.path,
        calendar.offset()
    );

    let state = AppState::new(db, calendar);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Failed to parse server address")?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
