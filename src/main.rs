use anyhow::Context;
use charmstore_search::{
    api::{build_router, AppState},
    auth::{AccessResolver, GroupCache, HttpIdentityClient},
    config::Config,
    metadata::{MetadataRegistry, ResultAssembler},
    search::SearchService,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "charmstore-search")]
#[command(about = "Charm store search service", long_about = None, version)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "CHARMSEARCH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "charmstore_search={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting charm store search v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = charmstore_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    // Open the search index
    let search = Arc::new(
        SearchService::new(config.search.clone())
            .await
            .context("failed to open search index")?,
    );
    tracing::info!(path = %config.search.index_path.display(), "Search index ready");

    // Access resolution. Capability discharge belongs to the embedding store,
    // which installs it with `AccessResolver::with_verifier`; the standalone
    // binary resolves admin basic auth and anonymous requests only.
    let mut access = AccessResolver::new(&config.auth);
    if let Some(identity) = &config.identity {
        let client = HttpIdentityClient::new(identity).context("invalid identity configuration")?;
        access = access.with_groups(GroupCache::new(
            Arc::new(client),
            identity.group_cache_capacity,
            identity.group_cache_ttl(),
        ));
    }
    match &config.identity {
        Some(identity) if !access.verifies_capabilities() => tracing::warn!(
            api_url = %identity.api_url,
            "Identity service configured but no capability verifier installed, group lookups stay inactive"
        ),
        _ => {}
    }

    // Metadata
    let registry = MetadataRegistry::with_builtins(Arc::clone(&search));
    let assembler = ResultAssembler::new(Arc::new(registry), config.metadata.clone());

    let state = AppState::new(Arc::clone(&search), Arc::new(assembler), Arc::new(access));
    let app = build_router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutting down, flushing search index");
    search.close().await.context("failed to close search index")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
