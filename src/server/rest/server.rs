use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use crate::operator;
use crate::server::rest::create_router;
use crate::shared::config::Config;
use crate::shared::models::AppState;

pub async fn run_rest_server(config: Config) -> Result<()> {
    info!(
        r#"
     _          _ _
 ___| |__   ___| | |_ __ ___   __ _ _ __
/ __| '_ \ / _ \ | | '_ ` _ \ / _` | '__|
\__ \ | | |  __/ | | | | | | | (_| | |
|___/_| |_|\___|_|_|_| |_| |_|\__, |_|
                              |___/
Starting shellmgr REST API service...
PID: {}
"#,
        std::process::id()
    );

    let manager = operator::start(&config)?;
    let app_state = Arc::new(AppState::new(manager, config.agent_user_groups.clone()));

    info!("Building REST API routes...");
    let app = create_router(app_state);

    let bind_addr = config.bind_addr();
    info!("Binding to: {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Server started successfully!");
    info!("Shells endpoint: http://{}/shells", bind_addr);
    info!("OpenAPI JSON: http://{}/api-docs/openapi.json", bind_addr);
    info!("Ready to accept requests...");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down shellmgr server...");
}
