mod core;
mod llm;
mod rag;
mod server;
mod state;

use std::env;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state = AppState::initialize().await?;
    core::logging::init(&state.paths);

    tracing::info!(
        config = %state.paths.config_path().display(),
        db = %state.paths.db_path.display(),
        "starting research assistant"
    );

    // Probe the LLM endpoint in the background; the service still comes up
    // without it so the health route can report what is wrong.
    let provider = state.provider.clone();
    let base_url = state.settings.llm.base_url.clone();
    tokio::spawn(async move {
        match provider.health_check().await {
            Ok(true) => tracing::info!("LLM endpoint at {} is reachable", base_url),
            _ => tracing::warn!(
                "LLM endpoint at {} is not responding; ingestion and queries need it",
                base_url
            ),
        }
    });

    let port = env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(state.settings.server.port);
    let bind_addr = format!("{}:{}", state.settings.server.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("Research Assistant API listening on http://{}", addr);
    tracing::info!(%addr, "http server up");

    let app = server::router::router(state.clone());
    axum::serve(listener, app).await.context("server exited")?;

    Ok(())
}
