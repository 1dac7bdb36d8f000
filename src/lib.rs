pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod nat64;
pub mod pages;
pub mod response;
pub mod rewrite;
pub mod routing;
pub mod server;

pub use config::Config;
pub use error::{ProxyError, Result};

/// Start the proxy server with the given configuration
pub async fn start_server(config: Config) -> Result<tokio::task::JoinHandle<()>> {
    server::start_server(config).await
}
