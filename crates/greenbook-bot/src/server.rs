//! Operator control surface.
//!
//! A small JSON-over-HTTP API in front of the engine handle. Mode
//! transitions go through the engine's command queue and are applied
//! between scan cycles; reads are served synchronously from shared
//! state. There is no authentication here: the surface binds for the
//! operator's host and is expected to sit behind local access controls.

use crate::error::AppResult;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use chrono::Utc;
use greenbook_core::{Bet, BetStatus, EngineMode, PluginDescriptor, RiskSettings, SettlementResult};
use greenbook_engine::{ActivityEntry, EngineCommand, EngineError, EngineHandle, EngineStatus};
use greenbook_persistence::{BetStore, DecisionLedger};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub bet_store: Arc<BetStore>,
    pub ledger: Arc<DecisionLedger>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/engine/start", post(start))
        .route("/api/engine/stop", post(stop))
        .route("/api/engine/pause", post(pause))
        .route("/api/engine/resume", post(resume))
        .route("/api/engine/go-live", post(go_live))
        .route("/api/engine/go-staging", post(go_staging))
        .route("/api/engine/status", get(status))
        .route("/api/engine/settings", put(update_settings))
        .route("/api/engine/activity", get(activity))
        .route("/api/plugins", get(plugins))
        .route("/api/plugins/order", put(reorder_plugins))
        .route("/api/plugins/{id}", put(update_plugin))
        .route("/api/bets", get(bets))
        .route("/api/decisions", get(decisions))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ModeResponse {
    mode: EngineMode,
}

async fn transition(state: &AppState, command: EngineCommand) -> Result<Json<ModeResponse>, Response> {
    match state.engine.send(command).await {
        Ok(mode) => Ok(Json(ModeResponse { mode })),
        Err(e @ EngineError::InvalidTransition { .. }) => {
            Err(api_error(StatusCode::CONFLICT, e.to_string()).into_response())
        }
        Err(e) => Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    mode: EngineMode,
}

async fn start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<ModeResponse>, Response> {
    transition(&state, EngineCommand::Start(req.mode)).await
}

async fn stop(State(state): State<AppState>) -> Result<Json<ModeResponse>, Response> {
    transition(&state, EngineCommand::Stop).await
}

async fn pause(State(state): State<AppState>) -> Result<Json<ModeResponse>, Response> {
    transition(&state, EngineCommand::Pause).await
}

async fn resume(State(state): State<AppState>) -> Result<Json<ModeResponse>, Response> {
    transition(&state, EngineCommand::Resume).await
}

async fn go_live(State(state): State<AppState>) -> Result<Json<ModeResponse>, Response> {
    transition(&state, EngineCommand::GoLive).await
}

async fn go_staging(State(state): State<AppState>) -> Result<Json<ModeResponse>, Response> {
    transition(&state, EngineCommand::GoStaging).await
}

async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<RiskSettings>,
) -> Result<Json<ModeResponse>, Response> {
    transition(&state, EngineCommand::UpdateSettings(settings)).await
}

/// Today's bet outcomes, summarized for the status response.
#[derive(Debug, Default, Serialize)]
struct DailySummary {
    wins: usize,
    losses: usize,
    pending: usize,
    total_staked: Decimal,
    open_liability: Decimal,
    realized_pnl: Decimal,
}

fn daily_summary(bets: &[Bet]) -> DailySummary {
    let today = Utc::now().date_naive();
    let mut summary = DailySummary::default();
    for bet in bets.iter().filter(|b| b.placed_at.date_naive() == today) {
        if matches!(bet.status, BetStatus::Cancelled | BetStatus::Error) {
            continue;
        }
        summary.total_staked += bet.stake.inner();
        summary.open_liability += bet.open_liability();
        match bet.result {
            Some(SettlementResult::Won) => summary.wins += 1,
            Some(SettlementResult::Lost) => summary.losses += 1,
            Some(SettlementResult::Void) => {}
            None => summary.pending += 1,
        }
        if bet.result.is_some() {
            summary.realized_pnl += bet.profit_loss;
        }
    }
    summary
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    engine: EngineStatus,
    daily: DailySummary,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        engine: state.engine.status(),
        daily: daily_summary(&state.bet_store.all()),
    })
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

async fn activity(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<ActivityEntry>> {
    Json(state.engine.activity(params.limit.unwrap_or(50)))
}

async fn plugins(State(state): State<AppState>) -> Json<Vec<PluginDescriptor>> {
    Json(state.engine.plugins())
}

#[derive(Debug, Deserialize)]
struct PluginUpdate {
    enabled: Option<bool>,
    priority: Option<u32>,
    config: Option<serde_json::Value>,
}

async fn update_plugin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PluginUpdate>,
) -> Result<Json<PluginDescriptor>, ApiError> {
    let mut descriptor = state
        .engine
        .plugins()
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Unknown plugin: {id}")))?;

    if let Some(enabled) = update.enabled {
        descriptor.enabled = enabled;
    }
    if let Some(priority) = update.priority {
        descriptor.priority = priority;
    }
    if let Some(config) = update.config {
        descriptor.config = config;
    }

    if !state.engine.update_plugin(&descriptor) {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown plugin: {id}"),
        ));
    }
    Ok(Json(descriptor))
}

/// Reorder plugins by assigning ascending priorities in list order.
async fn reorder_plugins(
    State(state): State<AppState>,
    Json(order): Json<Vec<String>>,
) -> Result<Json<Vec<PluginDescriptor>>, ApiError> {
    let current = state.engine.plugins();
    for id in &order {
        if !current.iter().any(|d| &d.id == id) {
            return Err(api_error(
                StatusCode::NOT_FOUND,
                format!("Unknown plugin: {id}"),
            ));
        }
    }

    for (index, id) in order.iter().enumerate() {
        let mut descriptor = current
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .expect("checked above");
        descriptor.priority = ((index + 1) * 10) as u32;
        state.engine.update_plugin(&descriptor);
    }
    Ok(Json(state.engine.plugins()))
}

async fn bets(State(state): State<AppState>) -> Json<Vec<Bet>> {
    Json(state.bet_store.all())
}

async fn decisions(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<greenbook_core::DecisionRecord>> {
    Json(state.ledger.recent(params.limit.unwrap_or(50)))
}

/// Bind and serve the control surface until shutdown is signalled.
pub async fn run_server(state: AppState, port: u16, shutdown: CancellationToken) -> AppResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Control surface listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use greenbook_catalogue::{CatalogueApi, CatalogueCache, CatalogueError, CatalogueResult};
    use greenbook_core::{CatalogueEntry, MarketId, MarketSnapshot};
    use greenbook_engine::{Engine, EngineDeps, DEFAULT_SCAN_INTERVAL};
    use greenbook_exec::StagingRecorder;
    use greenbook_feed::PriceCache;
    use greenbook_persistence::SessionStore;
    use greenbook_strategy::{PluginPipeline, TieredLayStrategy};
    use std::time::Duration;

    struct OfflineCatalogue;

    #[async_trait]
    impl CatalogueApi for OfflineCatalogue {
        async fn list_market_catalogue(&self) -> CatalogueResult<Vec<CatalogueEntry>> {
            Err(CatalogueError::HttpClient("offline".into()))
        }

        async fn list_market_book(
            &self,
            _market_ids: &[MarketId],
        ) -> CatalogueResult<Vec<MarketSnapshot>> {
            Ok(vec![])
        }
    }

    fn test_state() -> (AppState, greenbook_engine::EngineTask) {
        let bet_store = Arc::new(BetStore::in_memory());
        let ledger = Arc::new(DecisionLedger::in_memory(100));
        let pipeline = Arc::new(PluginPipeline::new());
        pipeline.register(Arc::new(TieredLayStrategy::new()), None);

        let deps = EngineDeps {
            price_cache: Arc::new(PriceCache::new()),
            catalogue_cache: Arc::new(CatalogueCache::new(Duration::from_secs(3600))),
            catalogue_api: Arc::new(OfflineCatalogue),
            pipeline,
            staging_executor: Arc::new(StagingRecorder::new()),
            live_executor: Arc::new(StagingRecorder::new()),
            bet_store: bet_store.clone(),
            ledger: ledger.clone(),
            session_store: Arc::new(SessionStore::in_memory()),
        };
        let (handle, task) = Engine::build(
            deps,
            DEFAULT_SCAN_INTERVAL,
            None,
            CancellationToken::new(),
        );
        (
            AppState {
                engine: handle,
                bet_store,
                ledger,
            },
            task,
        )
    }

    #[tokio::test]
    async fn test_start_then_invalid_transition() {
        let (state, task) = test_state();
        tokio::spawn(task.run());

        let response = start(
            State(state.clone()),
            Json(StartRequest {
                mode: EngineMode::Staging,
            }),
        )
        .await
        .expect("start ok");
        assert_eq!(response.0.mode, EngineMode::Staging);

        // Resume is invalid outside PAUSED and maps to 409.
        let err = resume(State(state.clone())).await.expect_err("conflict");
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_status_includes_daily_summary() {
        let (state, _task) = test_state();
        let response = status(State(state)).await;
        assert_eq!(response.0.engine.mode, EngineMode::Stopped);
        assert_eq!(response.0.daily.pending, 0);
    }

    #[tokio::test]
    async fn test_plugin_update_and_reorder() {
        let (state, _task) = test_state();

        let listed = plugins(State(state.clone())).await;
        let id = listed.0[0].id.clone();

        let updated = update_plugin(
            State(state.clone()),
            Path(id.clone()),
            Json(PluginUpdate {
                enabled: Some(false),
                priority: None,
                config: None,
            }),
        )
        .await
        .expect("update ok");
        assert!(!updated.0.enabled);

        let reordered = reorder_plugins(State(state.clone()), Json(vec![id]))
            .await
            .expect("reorder ok");
        assert_eq!(reordered.0[0].priority, 10);

        let missing = update_plugin(
            State(state),
            Path("nope".to_string()),
            Json(PluginUpdate {
                enabled: None,
                priority: None,
                config: None,
            }),
        )
        .await;
        assert!(missing.is_err());
    }
}
