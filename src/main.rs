use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use spendwise::config::AuthConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = AuthConfig::from_env()?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "spendwise",
        "spendwise starting: RUST_LOG='{}', bind={}:{}, session_ttl_secs={}",
        rust_log, config.bind_addr, config.port, config.session_ttl_secs
    );

    spendwise::server::run(config).await
}
