use std::net::SocketAddr;

use chat_mvp::{config::Config, routes::create_router, utils::init_logging, AppState};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Command-line overrides; anything not given falls back to the environment.
#[derive(Debug, Parser)]
#[command(name = "chat-mvp", version, about = "CSV-seeded multi-panel chat front-end")]
struct Cli {
    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Application root holding `assets/`, `uploads/` and `downloads/`
    #[arg(long)]
    root: Option<String>,
}

impl Cli {
    fn flag(&self, key: &str) -> Option<String> {
        match key {
            "HOST" => self.host.clone(),
            "PORT" => self.port.map(|p| p.to_string()),
            "SYS_ROOT_PATH" => self.root.clone(),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env(|key| cli.flag(key))?;
    let _log_guard = init_logging(&config.paths.logs)?;
    info!("Configuration loaded: {:?}", config.server);
    if let Some(notice) = &config.azure_notice {
        warn!(%notice, "Chat backend not configured, running in degraded mode");
    }

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HOST {:?}: {}", config.server.host, e))?;
    let addr = SocketAddr::new(host, config.server.port);

    let state = AppState::new(config);
    let app = create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
