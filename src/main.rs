// Bitbucket MCP Server Main Entry Point
// Serves pull request review tools over stdio for AI agents
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Result;
use bitbucket_mcp_server::{
    bitbucket::{self, ApiClient},
    logging, McpConfig, McpServer, ToolManager,
};
use tracing::{error, info};

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "bitbucket-mcp-server"
    }))
}

/// Minimal HTTP server for health checks only
async fn serve_health(port: u16) {
    info!("🚀 Starting health check server on port {}", port);

    let server = match HttpServer::new(|| App::new().route("/health", web::get().to(health)))
        .workers(1)
        .bind(("0.0.0.0", port))
    {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind health server on port {}: {}", port, e);
            return;
        }
    };

    if let Err(e) = server.run().await {
        error!("Health server failed: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let config = McpConfig::from_env()?;
    info!(
        dialect = config.dialect().label(),
        base_url = %config.base_url,
        user = %config.username,
        "Starting Bitbucket MCP Server"
    );

    let client = ApiClient::new(
        config.base_url.clone(),
        config.credentials.clone(),
        config.request_timeout(),
    )?;
    let tools = ToolManager::new(bitbucket::source_for(client), config.confidence_weights.clone());

    info!(
        services = tools.service_count(),
        tools = tools.tool_count(),
        "Initialized review tools"
    );

    if let Some(port) = config.health_port {
        tokio::spawn(serve_health(port));
    }

    // Runs until the client closes stdin
    let server = McpServer::new(tools, config.dialect());
    if let Err(e) = server.run().await {
        error!("MCP server error: {}", e);
        return Err(e);
    }

    Ok(())
}
