/// Aurora Vault - secure file upload and download service
///
/// Accepts streamed multipart uploads, checks every file's name, declared
/// type and leading bytes against a fixed registry, and serves stored files
/// back only to their owners.

mod api;
mod auth;
mod blob_store;
mod config;
mod context;
mod db;
mod error;
mod files;
mod ingest;
mod metadata;
mod registry;
mod server;
mod validation;

#[cfg(test)]
mod testing;

use config::ServerConfig;
use context::AppContext;
use error::VaultResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> VaultResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| "aurora_vault=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Print banner
    print_banner();

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ___                                _    __            ____
   /   | __  ___________  _________ _ | |  / /___ ___  __/ / /_
  / /| |/ / / / ___/ __ \/ ___/ __ `/ | | / / __ `/ / / / / __/
 / ___ / /_/ / /  / /_/ / /  / /_/ /  | |/ / /_/ / /_/ / / /_
/_/  |_\__,_/_/   \____/_/   \__,_/   |___/\__,_/\__,_/_/\__/

        Secure File Vault v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
