use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use tablebook::config::AppConfig;
use tablebook::handlers;
use tablebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    match config.max_attempts {
        Some(max) => tracing::info!(max, "booking prompts capped per field"),
        None => tracing::info!("booking prompts uncapped"),
    }

    let addr = format!("{}:{}", config.host, config.port);
    let max_idle = Duration::from_secs(config.session_idle_secs);
    let state = Arc::new(AppState::new(config));

    // Idle sweep runs at a quarter of the idle limit, at least once a minute.
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval((max_idle / 4).min(Duration::from_secs(60)));
        loop {
            ticker.tick().await;
            sweep_state.sessions.evict_idle(max_idle);
        }
    });

    let app = handlers::router(state);

    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
