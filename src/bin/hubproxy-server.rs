use hubproxy::{start_server, Config};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    tracing::info!(
        "Starting hubproxy server on {}:{}",
        config.server.bind_address,
        config.server.port
    );
    tracing::info!(
        "Blocked user agents: {:?}",
        config.blocked_user_agents
    );
    tracing::info!("Server endpoints:");
    tracing::info!(
        "  Health: http://{}:{}/health",
        config.server.bind_address,
        config.server.port
    );
    tracing::info!(
        "  Registry: http://{}:{}/v2/",
        config.server.bind_address,
        config.server.port
    );
    tracing::info!("Press Ctrl+C to stop the server.");

    let _handle = start_server(config).await?;

    // Keep running
    loop {
        sleep(Duration::from_secs(1)).await;
    }
}
