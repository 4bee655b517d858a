#![cfg(not(tarpaulin_include))]

use came_storefront::app;
use came_storefront::config::Config;

/// Main entry point for the storefront server
///
/// Reads the configuration from the environment (see `Config::from_env`)
/// and serves the JSON API until Ctrl+C or SIGTERM.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    app::run(config).await
}
