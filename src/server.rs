//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Both entry points wire the services, reconcile reminders against the alarm
//! cache, and run the alarm loop beside the MCP transport.

use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;

use crate::tools::RecollectTools;
use recollect::app::{self, App};
use recollect::config::RecollectConfig;

/// Open the services and start reminder delivery in the background.
async fn start(config: RecollectConfig) -> Result<Arc<App>> {
    let (app, alarms) = App::open(config)?;
    let app = Arc::new(app);

    if let Err(e) = app::reconcile(Arc::clone(&app.reminders)).await {
        tracing::error!(error = %e, "startup reconciliation failed");
    }
    tokio::spawn(app::run_alarm_loop(Arc::clone(&app.reminders), alarms));

    Ok(app)
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: RecollectConfig) -> Result<()> {
    tracing::info!("starting Recollect MCP server on stdio");

    let app = start(config).await?;

    let tools = RecollectTools::new(app);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: RecollectConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting Recollect MCP server on HTTP");

    let app = start(config).await?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(RecollectTools::new(Arc::clone(&app))),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
