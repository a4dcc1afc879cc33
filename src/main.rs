use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use course_quiz::{config::Config, db, routes::AppState, store::PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;

    let state = AppState::new(Arc::new(PgStore::new(pool)));
    let app = course_quiz::app(state, config.max_body_bytes);

    let listener = TcpListener::bind(&config.bind_address).await?;
    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
