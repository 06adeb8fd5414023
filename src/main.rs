use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    check_env()?;
    cinetaste::app::run_server().await
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn check_env() -> Result<()> {
    if std::env::var("TMDB_API_KEY").map(|v| v.is_empty()).unwrap_or(true) {
        bail!("TMDB_API_KEY must be set");
    }
    Ok(())
}
