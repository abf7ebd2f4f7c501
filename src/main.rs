//! txhooks demo: wires a registry, two subscribers and a hooked host
//! transaction together and runs one commit cycle.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use txhooks_core::config::AppConfig;
use txhooks_engine::prelude::*;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("TXHOOKS_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// In-process stand-in for a host transaction.
#[derive(Debug)]
struct DemoTransaction {
    id: TransactionId,
}

#[async_trait]
impl Transaction for DemoTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    async fn commit(&self, subtransaction: bool) -> AppResult<()> {
        tracing::info!(transaction_id = %self.id, subtransaction, "Host commit");
        Ok(())
    }

    async fn abort(&self, subtransaction: bool) -> AppResult<()> {
        tracing::info!(transaction_id = %self.id, subtransaction, "Host abort");
        Ok(())
    }
}

fn effect(subscriber: &'static str) -> FnExecutor<String, ()> {
    FnExecutor::from_fn(move |item: String| {
        tracing::info!(subscriber, item = %item, "Executing item");
        Ok(())
    })
}

/// Runs the logger/indexer scenario against one hooked transaction.
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting txhooks demo v{}", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(SubscriberRegistry::new());

    let logger = QueuedSubscriber::register(
        &registry,
        effect("logger"),
        SubscriberOptions::from_config("logger", &config.hooks)
            .with_priority(1)
            .with_mode(SubscriberMode::Queued),
    )
    .await?;
    let indexer = QueuedSubscriber::register(
        &registry,
        effect("indexer"),
        SubscriberOptions::from_config("indexer", &config.hooks)
            .with_priority(2)
            .with_mode(SubscriberMode::Synchronous),
    )
    .await?;

    let host = Arc::new(DemoTransaction {
        id: TransactionId::new(),
    });
    let transaction = TransactionBoundary::install(host, registry.clone(), &config.hooks);

    indexer.push("X".to_string()).await?;
    logger.push("Y".to_string()).await?;
    logger.push("Z".to_string()).await?;

    transaction.commit(true).await?;
    tracing::info!(pending = logger.pending().await, "Sub-transaction committed");

    transaction.commit(false).await?;
    tracing::info!(pending = logger.pending().await, "Transaction committed");

    Ok(())
}
