//! MediAssist service binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mediassist::agents::{AgentModels, Orchestrator};
use mediassist::api::{start_server, AppState};
use mediassist::cache::{Cache, MemoryCache, RedisCache};
use mediassist::config::{CacheBackend, Settings};
use mediassist::gateway::Gateway;
use mediassist::providers::openai::OpenAiProvider;
use mediassist::session::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "mediassist", version, about = "Healthcare question-answering service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default)
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before reading any configuration.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("configuration error")?;
    init_tracing(&settings);

    match cli.command {
        Some(Command::Serve { port }) => serve(settings, port).await,
        None => serve(settings, None).await,
    }
}

fn init_tracing(settings: &Settings) {
    let default_level = if settings.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mediassist={default_level},info")));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(settings: Settings, port_override: Option<u16>) -> Result<()> {
    tracing::info!(app = %settings.app_name, "Starting up");
    tracing::debug!(?settings, "Resolved configuration");

    let cache: Arc<dyn Cache> = match settings.cache_backend {
        CacheBackend::Redis => {
            let url = settings.redis_url();
            tracing::info!(host = %settings.redis_host, port = settings.redis_port, "Connecting to Redis");
            Arc::new(
                RedisCache::connect(&url)
                    .await
                    .context("failed to connect to Redis")?,
            )
        }
        CacheBackend::Memory => {
            tracing::info!("Using in-process cache backend");
            Arc::new(MemoryCache::new())
        }
    };

    let provider = OpenAiProvider::new(
        &settings.openai_api_key,
        &settings.openai_api_base,
        &settings.responder_model,
    )
    .context("failed to build provider client")?;

    let orchestrator = Orchestrator::new(Arc::new(provider), AgentModels::from_settings(&settings));
    let gateway = Arc::new(Gateway::new(
        cache.clone(),
        orchestrator,
        settings.responder_model.clone(),
        settings.cache_ttl_secs,
    ));
    let sessions = SessionStore::new(cache, settings.cache_ttl_secs);

    let state = AppState::new(
        settings.app_name.clone(),
        settings.api_version.clone(),
        gateway,
        sessions,
    );

    let port = port_override.unwrap_or(settings.port);
    start_server(state, port).await.context("server error")?;
    Ok(())
}
