//! Component wiring and the application lifecycle.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::server::{self, AppState};
use greenbook_catalogue::{CatalogueApi, CatalogueCache, RestCatalogueClient};
use greenbook_engine::{Engine, EngineDeps};
use greenbook_exec::{RestOrderExecutor, StagingRecorder};
use greenbook_feed::{FeedTask, PriceCache};
use greenbook_persistence::{BetStore, DecisionLedger, SessionStore};
use greenbook_strategy::{tiered_lay, PluginPipeline, TieredLayStrategy};
use greenbook_stream::StreamClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Decision records kept in the in-memory ring for the control surface.
const LEDGER_RECENT_CAPACITY: usize = 500;

pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Wire everything and run until interrupted.
    pub async fn run(self) -> AppResult<()> {
        let config = self.config;
        let shutdown = CancellationToken::new();
        let data_dir = PathBuf::from(&config.data_dir);

        // Persistence.
        let bet_store = Arc::new(BetStore::open(data_dir.join("bets.json"))?);
        let ledger = Arc::new(DecisionLedger::new(
            data_dir.join("decisions"),
            LEDGER_RECENT_CAPACITY,
        ));
        let session_store = Arc::new(SessionStore::new(&data_dir)?);

        // Strategy pipeline, restoring operator-tuned descriptors.
        let pipeline = Arc::new(PluginPipeline::new());
        let persisted = session_store.load_descriptors();
        let tiered = persisted
            .iter()
            .find(|d| d.id == tiered_lay::PLUGIN_ID)
            .cloned();
        pipeline.register(Arc::new(TieredLayStrategy::new()), tiered);

        // Feed: stream client -> event channel -> price cache.
        let price_cache = Arc::new(PriceCache::new());
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (order_tx, order_rx) = mpsc::channel(256);
        let stream_client = Arc::new(StreamClient::new(config.stream_config(), event_tx));
        let feed_task = FeedTask::new(
            price_cache.clone(),
            event_rx,
            Some(order_tx),
            shutdown.clone(),
        );

        // Catalogue metadata.
        let catalogue_cache = Arc::new(CatalogueCache::new(Duration::from_secs(
            config.catalogue.refresh_interval_secs,
        )));
        let catalogue_api: Arc<dyn CatalogueApi> =
            Arc::new(RestCatalogueClient::new(config.catalogue_config())?);

        // Engine.
        let deps = EngineDeps {
            price_cache,
            catalogue_cache,
            catalogue_api,
            pipeline,
            staging_executor: Arc::new(StagingRecorder::new()),
            live_executor: Arc::new(RestOrderExecutor::new(config.order_config())?),
            bet_store: bet_store.clone(),
            ledger: ledger.clone(),
            session_store,
        };
        let (handle, engine_task) = Engine::build(
            deps,
            Duration::from_millis(config.engine.scan_interval_ms),
            Some(order_rx),
            shutdown.clone(),
        );

        // Spawn the long-lived tasks.
        let stream_task = tokio::spawn({
            let client = stream_client.clone();
            async move {
                if let Err(e) = client.run().await {
                    error!(%e, "Stream client terminated");
                }
            }
        });
        let feed_join = tokio::spawn(feed_task.run());
        let engine_join = tokio::spawn(engine_task.run());

        let state = AppState {
            engine: handle,
            bet_store,
            ledger,
        };
        let server_join = tokio::spawn({
            let shutdown = shutdown.clone();
            let port = config.server.port;
            async move {
                if let Err(e) = server::run_server(state, port, shutdown).await {
                    error!(%e, "Control surface terminated");
                }
            }
        });

        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");

        shutdown.cancel();
        stream_client.shutdown();

        let _ = engine_join.await;
        let _ = feed_join.await;
        let _ = stream_task.await;
        let _ = server_join.await;
        info!("Shutdown complete");
        Ok(())
    }
}
