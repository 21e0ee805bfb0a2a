//! The engine loop.
//!
//! One task owns the session record. Commands queue through a channel
//! and are applied between scan cycles; the scan itself is sequential
//! per cycle, so no two cycles ever overlap and a stop request lets the
//! in-flight cycle finish.

use crate::activity::{ActivityKind, ActivityTrail};
use crate::command::{CommandEnvelope, EngineCommand, EngineHandle};
use crate::context::build_market_context;
use crate::error::{EngineError, EngineResult};
use crate::status::{EngineCounters, EngineStatus};
use chrono::{DateTime, Utc};
use greenbook_catalogue::{CatalogueApi, CatalogueCache};
use greenbook_core::{
    Bet, BetCandidate, BetStatus, DecisionAction, DecisionRecord, EngineMode, MarketContext,
    PluginDescriptor, RiskSettings, SessionRecord, SettlementResult,
};
use greenbook_exec::BetExecutor;
use greenbook_feed::PriceCache;
use greenbook_persistence::{BetStore, DecisionLedger, SessionStore};
use greenbook_strategy::{DriftMonitor, EvaluationInput, PluginPipeline};
use greenbook_stream::OrderChangeMessage;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default scan cadence.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(2);

/// Everything the engine orchestrates.
pub struct EngineDeps {
    pub price_cache: Arc<PriceCache>,
    pub catalogue_cache: Arc<CatalogueCache>,
    pub catalogue_api: Arc<dyn CatalogueApi>,
    pub pipeline: Arc<PluginPipeline>,
    pub staging_executor: Arc<dyn BetExecutor>,
    pub live_executor: Arc<dyn BetExecutor>,
    pub bet_store: Arc<BetStore>,
    pub ledger: Arc<DecisionLedger>,
    pub session_store: Arc<SessionStore>,
}

#[derive(Default)]
struct Counters {
    scans: AtomicU64,
    evaluations: AtomicU64,
    bets_placed: AtomicU64,
    errors: AtomicU64,
    last_scan: Mutex<Option<DateTime<Utc>>>,
}

pub struct Engine {
    deps: EngineDeps,
    session: RwLock<SessionRecord>,
    activity: ActivityTrail,
    drift: DriftMonitor,
    counters: Counters,
    /// Keeps the stop-loss announcement to one activity entry.
    stop_loss_logged: AtomicBool,
}

/// The long-lived loop, consumed by `run`.
pub struct EngineTask {
    engine: Arc<Engine>,
    command_rx: mpsc::Receiver<CommandEnvelope>,
    order_rx: Option<mpsc::Receiver<OrderChangeMessage>>,
    scan_interval: Duration,
    shutdown: CancellationToken,
}

impl Engine {
    /// Build the engine, its control handle, and the loop task.
    ///
    /// The persisted session is restored, except that the engine never
    /// resumes scanning on its own: a restart comes up STOPPED and
    /// waits for the operator.
    pub fn build(
        deps: EngineDeps,
        scan_interval: Duration,
        order_rx: Option<mpsc::Receiver<OrderChangeMessage>>,
        shutdown: CancellationToken,
    ) -> (EngineHandle, EngineTask) {
        let mut session = deps.session_store.load_session();
        if session.mode != EngineMode::Stopped {
            info!(mode = %session.mode, "Persisted session was running; starting STOPPED");
            session.mode = EngineMode::Stopped;
            session.previous_mode = None;
        }

        let engine = Arc::new(Engine {
            deps,
            session: RwLock::new(session),
            activity: ActivityTrail::default(),
            drift: DriftMonitor::new(),
            counters: Counters::default(),
            stop_loss_logged: AtomicBool::new(false),
        });

        let (command_tx, command_rx) = mpsc::channel(16);
        let handle = EngineHandle {
            engine: engine.clone(),
            command_tx,
        };
        let task = EngineTask {
            engine,
            command_rx,
            order_rx,
            scan_interval,
            shutdown,
        };
        (handle, task)
    }

    pub fn mode(&self) -> EngineMode {
        self.session.read().mode
    }

    pub fn activity(&self) -> &ActivityTrail {
        &self.activity
    }

    pub fn pipeline(&self) -> &PluginPipeline {
        &self.deps.pipeline
    }

    pub fn status(&self) -> EngineStatus {
        let session = self.session.read();
        EngineStatus {
            mode: session.mode,
            previous_mode: session.previous_mode,
            daily_exposure: session.daily_exposure,
            daily_pnl: session.daily_pnl,
            bets_placed_today: session.bets_placed_today,
            processed_markets: session.processed_markets.len(),
            tracked_markets: self.deps.price_cache.len(),
            stop_loss_hit: session.daily_pnl <= session.settings.daily_stop_loss,
            last_reset_date: session.last_reset_date,
            settings: session.settings.clone(),
            counters: EngineCounters {
                scans: self.counters.scans.load(Ordering::Relaxed),
                evaluations: self.counters.evaluations.load(Ordering::Relaxed),
                bets_placed: self.counters.bets_placed.load(Ordering::Relaxed),
                errors: self.counters.errors.load(Ordering::Relaxed),
                last_scan: *self.counters.last_scan.lock(),
            },
        }
    }

    /// Apply a plugin descriptor update and persist the new set.
    pub fn update_plugin(&self, descriptor: &PluginDescriptor) -> bool {
        let updated = self.deps.pipeline.update_descriptor(descriptor);
        if updated {
            let descriptors = self.deps.pipeline.descriptors();
            if let Err(e) = self.deps.session_store.save_descriptors(&descriptors) {
                warn!(%e, "Failed to persist plugin descriptors");
            }
        }
        updated
    }

    /// Settlement hook: record the result and roll realized P/L into
    /// the daily counter.
    pub fn record_settlement(
        &self,
        external_reference: &str,
        result: SettlementResult,
        profit_loss: Decimal,
    ) -> EngineResult<bool> {
        let settled = self
            .deps
            .bet_store
            .settle(external_reference, result, profit_loss)?;
        if settled {
            if let Some(bet) = self.deps.bet_store.find_by_reference(external_reference) {
                self.drift.unwatch(&bet.market_id, bet.selection_id);
            }
            let mut session = self.session.write();
            session.daily_pnl += profit_loss;
            if let Err(e) = self.deps.session_store.save_session(&session) {
                warn!(%e, "Failed to persist session after settlement");
            }
        }
        Ok(settled)
    }

    /// Route matched-size updates from the order feed to the bet store.
    pub fn handle_order_change(&self, message: &OrderChangeMessage) {
        for market in &message.oc {
            for runner in &market.orc {
                for order in &runner.uo {
                    let result = self.deps.bet_store.apply_order_update(
                        &order.id,
                        order.sm.unwrap_or_default(),
                        order.sr.unwrap_or_default(),
                        order.avp,
                    );
                    match result {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!(reference = %order.id, "Order update for untracked bet")
                        }
                        Err(e) => warn!(%e, "Failed to apply order update"),
                    }
                }
            }
        }
    }

    /// Apply one queued transition. Invalid transitions are errors, not
    /// panics; the requesting operator sees the reason.
    pub(crate) fn apply_command(&self, command: EngineCommand) -> EngineResult<EngineMode> {
        let mut session = self.session.write();
        let from = session.mode;

        match command {
            EngineCommand::Start(mode @ (EngineMode::Staging | EngineMode::Live))
                if from == EngineMode::Stopped =>
            {
                session.mode = mode;
                session.previous_mode = None;
                self.activity
                    .push(ActivityKind::ModeChange, format!("Engine started in {mode}"));
            }
            EngineCommand::Start(mode) => {
                return Err(EngineError::InvalidTransition {
                    from,
                    requested: format!("start({mode})"),
                });
            }
            EngineCommand::Stop if from != EngineMode::Stopped => {
                session.mode = EngineMode::Stopped;
                session.previous_mode = None;
                self.activity
                    .push(ActivityKind::ModeChange, "Engine stopped");
            }
            EngineCommand::Pause if matches!(from, EngineMode::Staging | EngineMode::Live) => {
                session.previous_mode = Some(from);
                session.mode = EngineMode::Paused;
                self.activity
                    .push(ActivityKind::ModeChange, format!("Engine paused (was {from})"));
            }
            EngineCommand::Resume if from == EngineMode::Paused => {
                let resumed = session.previous_mode.take().unwrap_or(EngineMode::Staging);
                session.mode = resumed;
                self.activity
                    .push(ActivityKind::ModeChange, format!("Engine resumed to {resumed}"));
            }
            EngineCommand::GoLive if from == EngineMode::Staging => {
                session.mode = EngineMode::Live;
                session.processed_markets.clear();
                self.activity
                    .push(ActivityKind::ModeChange, "Switched STAGING -> LIVE");
            }
            EngineCommand::GoStaging if from == EngineMode::Live => {
                session.mode = EngineMode::Staging;
                session.processed_markets.clear();
                self.activity
                    .push(ActivityKind::ModeChange, "Switched LIVE -> STAGING");
            }
            EngineCommand::UpdateSettings(settings) => {
                session.settings = settings;
                self.activity
                    .push(ActivityKind::Info, "Risk settings updated");
            }
            other => {
                return Err(EngineError::InvalidTransition {
                    from,
                    requested: format!("{other:?}"),
                });
            }
        }

        if let Err(e) = self.deps.session_store.save_session(&session) {
            warn!(%e, "Failed to persist session after transition");
        }
        Ok(session.mode)
    }

    /// One scan cycle. Public so tests can drive the engine without
    /// running the timed loop.
    pub async fn scan_cycle(&self) {
        let now = Utc::now();
        self.counters.scans.fetch_add(1, Ordering::Relaxed);
        *self.counters.last_scan.lock() = Some(now);
        self.rollover_if_needed(now);

        if self
            .deps
            .catalogue_cache
            .refresh_if_due(self.deps.catalogue_api.as_ref())
            .await
            .is_err()
        {
            // Stale entries keep serving; already logged by the cache.
        }

        let mut snapshots = self.deps.price_cache.all_snapshots();
        if snapshots.is_empty() {
            let ids = self.deps.catalogue_cache.market_ids();
            if !ids.is_empty() {
                match self.deps.catalogue_api.list_market_book(&ids).await {
                    Ok(books) => {
                        debug!(markets = books.len(), "Using account API book fallback");
                        snapshots = books;
                    }
                    Err(e) => warn!(%e, "Book snapshot fallback failed"),
                }
            }
        }

        let (mode, settings, daily_pnl) = {
            let session = self.session.read();
            (
                session.mode,
                session.settings.clone(),
                session.daily_pnl,
            )
        };
        if !mode.is_scanning() {
            return;
        }

        let stop_loss_hit = daily_pnl <= settings.daily_stop_loss;
        if stop_loss_hit {
            if !self.stop_loss_logged.swap(true, Ordering::Relaxed) {
                self.activity.push(
                    ActivityKind::StopLoss,
                    format!(
                        "Daily stop-loss reached ({daily_pnl}); no new bets until tomorrow"
                    ),
                );
            }
        } else {
            self.stop_loss_logged.store(false, Ordering::Relaxed);
        }

        let exclude_staged = mode == EngineMode::Live;

        for snapshot in snapshots {
            let market_id = snapshot.market_id.clone();

            if self.session.read().processed_markets.contains(&market_id) {
                continue;
            }
            if !snapshot.status.is_open() || snapshot.in_play {
                continue;
            }

            // Markets with no known start time are skipped defensively.
            let entry = self.deps.catalogue_cache.get(&market_id);
            let start_time = match snapshot.start_time.or(entry.as_ref().map(|e| e.start_time)) {
                Some(t) => t,
                None => {
                    debug!(%market_id, "Skipping market with unknown start time");
                    continue;
                }
            };
            let minutes_to_start = (start_time - now).num_seconds() as f64 / 60.0;
            if minutes_to_start < 0.0
                || minutes_to_start > settings.pre_race_window_minutes as f64
            {
                continue;
            }

            if self
                .deps
                .bet_store
                .has_bet_on_market(&market_id, exclude_staged)
            {
                debug!(%market_id, "Skipping market with existing bet");
                self.mark_processed(&market_id);
                continue;
            }

            let Some(entry) = entry else {
                debug!(%market_id, "Skipping market without catalogue metadata");
                continue;
            };

            // Stop-loss halts new risk; nothing past this point runs.
            if stop_loss_hit {
                continue;
            }

            let ctx = build_market_context(&snapshot, &entry);
            self.evaluate_market(&ctx, mode, &settings, now).await;
            self.mark_processed(&market_id);
        }

        self.observe_drift();

        let session = self.session.read();
        if let Err(e) = self.deps.session_store.save_session(&session) {
            warn!(%e, "Failed to persist session after cycle");
        }
    }

    fn mark_processed(&self, market_id: &greenbook_core::MarketId) {
        self.session
            .write()
            .processed_markets
            .insert(market_id.clone());
    }

    fn rollover_if_needed(&self, now: DateTime<Utc>) {
        let today = now.date_naive();
        let mut session = self.session.write();
        if session.last_reset_date == today {
            return;
        }
        info!(date = %today, "Rolling over daily counters");
        session.daily_exposure = Decimal::ZERO;
        session.daily_pnl = Decimal::ZERO;
        session.bets_placed_today = 0;
        session.processed_markets.clear();
        session.last_reset_date = today;
        self.drift.clear();
        self.stop_loss_logged.store(false, Ordering::Relaxed);
        self.activity
            .push(ActivityKind::Info, format!("Daily counters reset for {today}"));
    }

    async fn evaluate_market(
        &self,
        ctx: &MarketContext,
        mode: EngineMode,
        settings: &RiskSettings,
        now: DateTime<Utc>,
    ) {
        let (daily_pnl, daily_exposure, bets_today) = {
            let session = self.session.read();
            (
                session.daily_pnl,
                session.daily_exposure,
                session.bets_placed_today,
            )
        };

        let input = EvaluationInput {
            market: ctx,
            daily_pnl,
            daily_exposure,
            bets_today,
            settings,
            now,
        };
        let outcome = self.deps.pipeline.evaluate(&input);
        let mut evaluations = outcome.evaluations;
        self.counters
            .evaluations
            .fetch_add(evaluations.len() as u64, Ordering::Relaxed);

        // Risk limits downgrade a winning ACCEPT to REJECT, logged with
        // the violated limit; never an exception.
        let mut accepted: Option<(String, BetCandidate)> = None;
        if let Some(idx) = outcome.winner {
            let candidate = evaluations[idx].1.candidates[0].clone();
            match self.check_risk(&candidate, settings, mode, daily_exposure) {
                Ok(()) => accepted = Some((evaluations[idx].0.id.clone(), candidate)),
                Err(limit) => {
                    self.activity.push(
                        ActivityKind::RiskLimit,
                        format!("{}: candidate rejected: {limit}", ctx.market_name),
                    );
                    let evaluation = &mut evaluations[idx].1;
                    evaluation.action = DecisionAction::Reject;
                    evaluation.reason = format!("risk limit: {limit}");
                }
            }
        }

        // One ledger record per plugin evaluated, whatever the outcome.
        for (descriptor, evaluation) in &evaluations {
            let record = DecisionRecord::from_context(
                ctx,
                &descriptor.id,
                evaluation.action,
                evaluation.reason.clone(),
                evaluation.candidates.clone(),
                daily_pnl,
                daily_exposure,
                bets_today,
                now,
            );
            if let Err(e) = self.deps.ledger.append(&record) {
                warn!(%e, "Failed to append decision record");
            }
        }

        if let Some((plugin_id, candidate)) = accepted {
            self.place(ctx, plugin_id, candidate, mode).await;
        }
    }

    fn check_risk(
        &self,
        candidate: &BetCandidate,
        settings: &RiskSettings,
        mode: EngineMode,
        daily_exposure: Decimal,
    ) -> Result<(), String> {
        if candidate.liability > settings.max_liability_per_bet {
            return Err(format!(
                "per-bet liability cap ({} > {})",
                candidate.liability, settings.max_liability_per_bet
            ));
        }
        if daily_exposure + candidate.liability > settings.max_daily_exposure {
            return Err(format!(
                "daily exposure cap ({} + {} > {})",
                daily_exposure, candidate.liability, settings.max_daily_exposure
            ));
        }
        let exclude_staged = mode == EngineMode::Live;
        if self
            .deps
            .bet_store
            .bets_on_market(&candidate.market_id, exclude_staged)
            >= settings.max_bets_per_race
        {
            return Err(format!(
                "per-race bet cap ({})",
                settings.max_bets_per_race
            ));
        }
        if self.deps.bet_store.open_bet_count() >= settings.max_concurrent_bets {
            return Err(format!(
                "concurrent bet cap ({})",
                settings.max_concurrent_bets
            ));
        }
        Ok(())
    }

    async fn place(
        &self,
        ctx: &MarketContext,
        plugin_id: String,
        candidate: BetCandidate,
        mode: EngineMode,
    ) {
        let executor: &Arc<dyn BetExecutor> = match mode {
            EngineMode::Live => &self.deps.live_executor,
            _ => &self.deps.staging_executor,
        };

        let outcome = executor.execute(&candidate).await;

        let bet = Bet {
            id: Uuid::new_v4(),
            external_reference: outcome.external_reference.clone(),
            market_id: candidate.market_id.clone(),
            market_name: ctx.market_name.clone(),
            venue: ctx.venue.clone(),
            race_time: ctx.start_time,
            selection_id: candidate.selection_id,
            runner_name: candidate.runner_name.clone(),
            side: greenbook_core::BetSide::Lay,
            odds: candidate.odds,
            stake: candidate.stake,
            liability: candidate.liability,
            zone: candidate.zone,
            confidence: candidate.confidence,
            plugin_id,
            source: executor.source(),
            status: if outcome.success {
                BetStatus::Pending
            } else {
                BetStatus::Error
            },
            size_matched: Decimal::ZERO,
            size_remaining: candidate.stake.inner(),
            result: None,
            profit_loss: Decimal::ZERO,
            error: outcome.error.clone(),
            placed_at: Utc::now(),
            matched_at: None,
            settled_at: None,
        };
        if let Err(e) = self.deps.bet_store.insert(bet) {
            warn!(%e, "Failed to persist bet record");
        }

        if outcome.success {
            {
                let mut session = self.session.write();
                session.daily_exposure += candidate.liability;
                session.bets_placed_today += 1;
            }
            self.counters.bets_placed.fetch_add(1, Ordering::Relaxed);
            self.drift
                .watch(candidate.market_id.clone(), candidate.selection_id, candidate.odds);
            let kind = if mode == EngineMode::Live {
                ActivityKind::BetPlaced
            } else {
                ActivityKind::BetStaged
            };
            self.activity.push(
                kind,
                format!(
                    "{}: lay {} at {} stake {} (liability {})",
                    ctx.market_name,
                    candidate.runner_name,
                    candidate.odds,
                    candidate.stake,
                    candidate.liability
                ),
            );
        } else {
            self.counters.errors.fetch_add(1, Ordering::Relaxed);
            self.activity.push(
                ActivityKind::BetFailed,
                format!(
                    "{}: placement failed for {}: {}",
                    ctx.market_name,
                    candidate.runner_name,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ),
            );
        }
    }

    /// Log-only drift check against the latest snapshots.
    fn observe_drift(&self) {
        if self.drift.watched_count() == 0 {
            return;
        }
        for snapshot in self.deps.price_cache.all_snapshots() {
            for (selection_id, ladder) in &snapshot.runners {
                if let Some(current) = ladder.lay_odds() {
                    self.drift
                        .observe(&snapshot.market_id, *selection_id, current);
                }
            }
        }
    }
}

impl EngineTask {
    /// Run until shutdown. Commands apply between cycles; an in-flight
    /// cycle always completes before the loop stops.
    pub async fn run(mut self) {
        info!(interval_ms = self.scan_interval.as_millis(), "Engine loop started");
        let mut ticker = tokio::time::interval(self.scan_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let order_recv = async {
                match self.order_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Engine loop shutting down");
                    let session = self.engine.session.read();
                    if let Err(e) = self.engine.deps.session_store.save_session(&session) {
                        warn!(%e, "Failed to persist session on shutdown");
                    }
                    return;
                }

                envelope = self.command_rx.recv() => {
                    match envelope {
                        Some(envelope) => {
                            let result = self.engine.apply_command(envelope.command);
                            let _ = envelope.reply.send(result);
                        }
                        None => {
                            info!("Command channel closed, engine loop exiting");
                            return;
                        }
                    }
                }

                message = order_recv => {
                    match message {
                        Some(ocm) => self.engine.handle_order_change(&ocm),
                        None => {
                            debug!("Order change channel closed");
                            self.order_rx = None;
                        }
                    }
                }

                _ = ticker.tick() => {
                    // Apply anything queued before scanning so the cycle
                    // never runs under a stale mode.
                    while let Ok(envelope) = self.command_rx.try_recv() {
                        let result = self.engine.apply_command(envelope.command);
                        let _ = envelope.reply.send(result);
                    }
                    if self.engine.mode().is_scanning() {
                        self.engine.scan_cycle().await;
                    }
                }
            }
        }
    }
}
