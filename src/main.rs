use anyhow::Context;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use vaultledger::gate::{ContractGate, Denylist};
use vaultledger::orchestration::{
    run_chain_clock, ChainLanes, ClockSchedule, ClockScheduler, OrchestratorSettings,
    TokenRegistry,
};
use vaultledger::{
    api, init_db, BeefyApiClient, BreakdownOrchestrator, ChainClient, Config, EntityStore,
    JsonRpcChainClient, Repository, VaultCatalog,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let store: Arc<dyn EntityStore> = Arc::new(Repository::new(pool));

    let denylist = match &config.denylist_path {
        Some(path) => Denylist::load(Path::new(path))
            .with_context(|| format!("Failed to load denylist {}", path))?,
        None => Denylist::empty(),
    };
    tracing::info!(entries = denylist.len(), "Denylist loaded");
    let gate = ContractGate::new(Arc::new(denylist), store.clone());

    let catalog = VaultCatalog::new(Arc::new(BeefyApiClient::new(config.vault_api_url.clone())));
    let orchestrator = Arc::new(BreakdownOrchestrator::new(
        store.clone(),
        catalog,
        TokenRegistry::new(store.clone()),
        OrchestratorSettings {
            concurrency: config.breakdown_concurrency,
            resolver_timeout: config.resolver_timeout,
        },
    ));
    let scheduler = ClockScheduler::new(
        store.clone(),
        orchestrator,
        gate,
        ChainLanes::new(),
        config.clock_period_secs,
    );

    for (chain_id, rpc_url) in &config.rpc_urls {
        let schedule = ClockSchedule::for_chain(*chain_id, config.clock_period_secs)
            .with_context(|| format!("No block time known for chain {}", chain_id))?;
        let client: Arc<dyn ChainClient> = Arc::new(
            JsonRpcChainClient::new(*chain_id, rpc_url.clone())
                .with_max_elapsed(config.resolver_timeout),
        );
        tokio::spawn(run_chain_clock(
            scheduler.clone(),
            client,
            schedule,
            config.chain_poll_interval,
        ));
    }

    let app = api::create_router(api::AppState::new(store));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
