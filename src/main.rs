use std::sync::Arc;

use anyhow::Context;

mod app;
mod auth;
mod config;
mod error;
mod images;
mod listings;
mod state;
mod storage;
mod users;

#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::state::AppState;
use crate::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "estate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let db = state::connect_db(&config).await?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("run database migrations")?;

    let storage = Storage::new(&config.storage).await?;
    let state = AppState::new(config.clone(), db.clone(), Arc::new(storage));

    app::serve(app::build_app(state), &config).await?;

    db.close().await;
    tracing::info!("shut down cleanly");
    Ok(())
}
