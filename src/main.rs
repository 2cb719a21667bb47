use anyhow::Result;
use tracing_subscriber::EnvFilter;

use fundwise::config::Config;
use fundwise::server::run_server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fundwise=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(db = %config.db_path.display(), cors = config.enable_cors, "starting fundwise");

    run_server(config).await
}
