//! Backend selection and engine construction.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use gigledger_core::WalletAddress;
use gigledger_engine::{
    EngineConfig, Marketplace, MarketplaceDeps, MarketplaceRuntime, OsRandomIdSource, RuntimeStatus,
};
use gigledger_infra::config::LedgerSettings;
use gigledger_infra::{
    AppConfig, Datastore, GeminiOracle, InMemoryDatastore, InMemoryLedger, LedgerClient,
    PostgresDatastore,
};

#[derive(Debug, Clone, Serialize)]
pub struct Backends {
    pub storage: &'static str,
    pub ledger: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub uptime_secs: u64,
    pub backends: Backends,
    /// `None` once background processing has shut down.
    pub runtime: Option<RuntimeStatus>,
}

pub struct AppServices {
    pub market: Marketplace,
    pub backends: Backends,
    runtime: Mutex<Option<MarketplaceRuntime>>,
    started: Instant,
}

impl AppServices {
    pub fn status(&self) -> ServiceStatus {
        let runtime = self
            .runtime
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(MarketplaceRuntime::status));
        ServiceStatus {
            uptime_secs: self.started.elapsed().as_secs(),
            backends: self.backends.clone(),
            runtime,
        }
    }

    /// Stop the verification worker and the sweeps. Later calls do nothing.
    pub async fn shutdown(&self) {
        let runtime = self.runtime.lock().ok().and_then(|mut guard| guard.take());
        if let Some(runtime) = runtime {
            runtime.shutdown().await;
            info!("background processing stopped");
        }
    }
}

/// Build services from config and start background processing.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn Datastore> = match &config.database_url {
        Some(url) => {
            let store = PostgresDatastore::connect(url)
                .await
                .context("failed to connect to Postgres")?;
            store.ensure_schema().await.context("failed to apply schema")?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; records live in memory and are lost on restart");
            InMemoryDatastore::arc()
        }
    };
    let storage = if config.database_url.is_some() { "postgres" } else { "memory" };

    let (ledger, ledger_kind) = ledger_client(&config.ledger)?;

    let oracle = Arc::new(GeminiOracle::with_base_url(
        config.oracle.api_key.clone(),
        config.oracle.model.clone(),
        config.oracle.base_url.clone(),
    ));

    let mut market = Marketplace::build(
        MarketplaceDeps { store, ledger, oracle, ids: Arc::new(OsRandomIdSource) },
        EngineConfig::from(config),
    );
    let runtime = market.start().context("failed to start background processing")?;
    info!(storage, ledger = ledger_kind, "services ready");

    Ok(AppServices {
        market,
        backends: Backends { storage, ledger: ledger_kind },
        runtime: Mutex::new(Some(runtime)),
        started: Instant::now(),
    })
}

#[cfg(feature = "onchain")]
fn ledger_client(settings: &LedgerSettings) -> anyhow::Result<(Arc<dyn LedgerClient>, &'static str)> {
    use gigledger_infra::ledger::EvmLedger;

    match (&settings.rpc_url, &settings.contract_address, &settings.operator_key) {
        (Some(rpc_url), Some(contract), Some(key)) => {
            let ledger = EvmLedger::new(rpc_url, contract, key).context("invalid ledger settings")?;
            info!(operator = %ledger.operator(), "using EVM escrow ledger");
            let ledger: Arc<dyn LedgerClient> = Arc::new(ledger);
            Ok((ledger, "evm"))
        }
        _ => Ok(dev_ledger()),
    }
}

#[cfg(not(feature = "onchain"))]
fn ledger_client(settings: &LedgerSettings) -> anyhow::Result<(Arc<dyn LedgerClient>, &'static str)> {
    if settings.is_configured() {
        anyhow::bail!("ledger settings are set but this build lacks the `onchain` feature");
    }
    Ok(dev_ledger())
}

fn dev_ledger() -> (Arc<dyn LedgerClient>, &'static str) {
    warn!("ledger not configured; using the in-memory escrow ledger");
    let ledger: Arc<dyn LedgerClient> = InMemoryLedger::arc(WalletAddress::from_address(Default::default()));
    (ledger, "memory")
}
