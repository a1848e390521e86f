use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Instant;

use crate::config::DF;
use crate::data::{BackendClient, BarStreamManager, RestBackend, StreamEvent};
use crate::domain::{MarketKey, Timeframe};
use crate::models::{
    AccountSnapshot, ApplyOutcome, BarSeries, BotStats, Hyperparameters, ModelMetadata,
    SentimentIndex, Ticker24h,
};

use super::job_monitor::{JobMonitor, MonitorEvent};
use super::messages::{Command, FetchJob, IoJob, Lane, LanePayload, LaneResult, Notice, WorkerMessage};
use super::scheduler::PollScheduler;
use super::state::LaneState;
use super::worker;

/// The client-side reconciliation engine.
///
/// All store state lives here and is mutated exclusively on the GUI thread,
/// inside `update()`, the pump the app calls once per frame. Background
/// threads (I/O worker, bar stream) only produce messages into channels, so
/// the hazard is interleaving of completions, which the request-epoch guard
/// and the stream key filter handle explicitly.
pub struct TerminalEngine {
    client: Arc<dyn BackendClient>,
    active_key: MarketKey,
    /// Request epoch: bumped on every key change. Fetches capture it at
    /// issue time; completions carrying an older value are discarded, so a
    /// slow response for a previous market can never overwrite fresh state.
    generation: u64,

    pub series: BarSeries,
    pub ticker: LaneState<Ticker24h>,
    pub ticker_list: LaneState<Vec<Ticker24h>>,
    pub account: LaneState<AccountSnapshot>,
    pub bot_stats: LaneState<BotStats>,
    pub sentiment: LaneState<SentimentIndex>,
    pub metadata: LaneState<ModelMetadata>,
    pub monitor: JobMonitor,
    pub training_error: Option<String>,
    pub bot_running: bool,

    scheduler: PollScheduler,
    job_tx: Sender<IoJob>,
    worker_rx: Receiver<WorkerMessage>,
    stream: BarStreamManager,
    stream_rx: Receiver<StreamEvent>,
    notices: Vec<Notice>,
}

impl TerminalEngine {
    /// Connect to the remote engine and start all background machinery.
    pub fn new(base_url: &str, initial_key: MarketKey) -> anyhow::Result<Self> {
        let client: Arc<dyn BackendClient> = Arc::new(RestBackend::new(base_url)?);
        Ok(Self::with_client(client, initial_key))
    }

    pub fn with_client(client: Arc<dyn BackendClient>, initial_key: MarketKey) -> Self {
        let (job_tx, job_rx) = channel();
        let (worker_tx, worker_rx) = channel();
        worker::spawn_io_thread(client.clone(), job_rx, worker_tx);

        let (stream_tx, stream_rx) = channel();
        let stream = BarStreamManager::spawn(stream_tx);
        stream.switch(initial_key.clone());

        let mut engine = Self {
            client,
            active_key: initial_key,
            generation: 0,
            series: BarSeries::new(),
            ticker: LaneState::new(),
            ticker_list: LaneState::new(),
            account: LaneState::new(),
            bot_stats: LaneState::new(),
            sentiment: LaneState::new(),
            metadata: LaneState::new(),
            monitor: JobMonitor::new(),
            training_error: None,
            bot_running: false,
            scheduler: PollScheduler::new(),
            job_tx,
            worker_rx,
            stream,
            stream_rx,
            notices: Vec::new(),
        };

        engine.scheduler.start(Lane::Market);
        engine.scheduler.start(Lane::TickerList);
        engine.scheduler.start(Lane::Account);
        engine.scheduler.start(Lane::BotStats);
        engine.scheduler.start(Lane::Sentiment);

        // One-shot startup probes: model metadata gates the predict action,
        // and a training run may already be in flight on the backend.
        engine.dispatch_fetch(Lane::Metadata);
        engine.dispatch_fetch(Lane::Training);

        engine
    }

    pub fn active_key(&self) -> &MarketKey {
        &self.active_key
    }

    /// Shared client handle for one-shot UI fetches (prediction).
    pub fn client(&self) -> Arc<dyn BackendClient> {
        self.client.clone()
    }

    /// THE PUMP. Called once per GUI frame.
    pub fn update(&mut self) {
        self.process_stream_events();
        self.process_worker_messages();
        self.sync_training_lane();

        let due = self.scheduler.due_lanes(Instant::now());
        for lane in due {
            self.dispatch_fetch(lane);
        }
    }

    /// Switch every keyed store and subscription over to a new market.
    /// In-flight responses for the old key die on the generation guard.
    pub fn set_active_key(&mut self, key: MarketKey) {
        if key == self.active_key {
            return;
        }

        log::info!("Switching market {} -> {}", self.active_key, key);

        self.generation += 1;
        self.active_key = key.clone();

        // Old keyed state must not leak into the new selection.
        self.series.clear();
        self.ticker.reset();
        self.metadata.reset();
        self.monitor.reset();
        self.training_error = None;
        self.scheduler.cancel(Lane::Training);

        self.stream.switch(key);

        // Restart makes the market lane due immediately.
        self.scheduler.start(Lane::Market);
        self.dispatch_fetch(Lane::Metadata);
        self.dispatch_fetch(Lane::Training);
    }

    /// Ask the backend to train a model for the active key. Optimistic: the
    /// monitor starts tracking before the command round-trips.
    pub fn start_training(&mut self, params: Hyperparameters) {
        let key = self.active_key.clone();

        #[cfg(debug_assertions)]
        if DF.log_commands {
            log::info!("Requesting training for {}", key);
        }

        self.monitor.start(key.clone());
        self.training_error = None;
        self.scheduler.start(Lane::Training);
        self.send_job(IoJob::Command(Command::StartTraining { key, params }));
    }

    pub fn start_bot(&mut self, symbols: Vec<String>, timeframes: Vec<Timeframe>) {
        #[cfg(debug_assertions)]
        if DF.log_commands {
            log::info!("Starting bot for {:?}", symbols);
        }

        self.bot_running = true;
        self.send_job(IoJob::Command(Command::StartBot { symbols, timeframes }));
    }

    pub fn stop_bot(&mut self) {
        self.bot_running = false;
        self.send_job(IoJob::Command(Command::StopBot));
    }

    /// One-shot user-facing messages accumulated since the last drain.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Lane failures for the non-fatal banner. Values stay on screen; only
    /// the freshness complaint is surfaced.
    pub fn lane_errors(&self) -> Vec<(&'static str, &str)> {
        let mut errors = Vec::new();
        if let Some(e) = self.ticker.error() {
            errors.push(("market", e));
        }
        if let Some(e) = self.ticker_list.error() {
            errors.push(("tickers", e));
        }
        if let Some(e) = self.account.error() {
            errors.push(("account", e));
        }
        if let Some(e) = self.bot_stats.error() {
            errors.push(("bot", e));
        }
        if let Some(e) = self.sentiment.error() {
            errors.push(("sentiment", e));
        }
        errors
    }

    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.stream.shutdown();
    }

    // --- INTERNAL LOGIC ---

    fn process_stream_events(&mut self) {
        // Drain the channel fully so we never lag behind the stream.
        let mut events = Vec::new();
        while let Ok(event) = self.stream_rx.try_recv() {
            events.push(event);
        }

        for event in events {
            self.ingest_stream_event(event);
        }
    }

    fn ingest_stream_event(&mut self, event: StreamEvent) {
        if event.key != self.active_key {
            // Subscription switches acknowledge asynchronously; a few
            // updates for the previous selection can still arrive.
            #[cfg(debug_assertions)]
            if DF.log_stream_updates {
                log::info!(
                    "Dropping stream event for {} (active: {})",
                    event.key,
                    self.active_key
                );
            }
            return;
        }

        match self.series.apply_update(&event.bar) {
            ApplyOutcome::RejectedOutOfOrder => {
                log::warn!(
                    "Out-of-order bar for {} dropped: {} is behind the series tail {}",
                    event.key,
                    event.bar.open_time,
                    self.series.last().map(|b| b.open_time).unwrap_or(0)
                );
            }
            _outcome => {
                #[cfg(debug_assertions)]
                if DF.log_series_patches {
                    log::info!("Series {:?} for {}", _outcome, event.key);
                }
            }
        }
    }

    fn process_worker_messages(&mut self) {
        let mut messages = Vec::new();
        while let Ok(msg) = self.worker_rx.try_recv() {
            messages.push(msg);
        }

        for msg in messages {
            match msg {
                WorkerMessage::Lane(result) => self.apply_lane_result(result),
                WorkerMessage::CommandDone { label, result } => match result {
                    Ok(()) => {
                        #[cfg(debug_assertions)]
                        if DF.log_commands {
                            log::info!("{} acknowledged", label);
                        }
                    }
                    Err(e) => {
                        log::error!("{} failed: {}", label, e);
                        self.notices.push(Notice::error(format!("{label} failed: {e}")));
                    }
                },
            }
        }
    }

    fn apply_lane_result(&mut self, result: LaneResult) {
        if result.lane.is_keyed() && result.generation != self.generation {
            if DF.log_stale_results {
                log::info!(
                    "Discarding stale {:?} result for {} (epoch {} != {})",
                    result.lane,
                    result.key,
                    result.generation,
                    self.generation
                );
            }
            return;
        }

        match result.payload {
            Ok(payload) => self.apply_lane_payload(payload),
            Err(e) => self.record_lane_error(result.lane, e),
        }
    }

    fn apply_lane_payload(&mut self, payload: LanePayload) {
        #[cfg(debug_assertions)]
        if DF.log_lane_results {
            log::info!("Applying lane payload: {:?}", payload);
        }

        match payload {
            LanePayload::Market { bars, ticker } => {
                self.series.replace(bars);
                self.ticker.set(ticker);
            }
            LanePayload::TickerList(list) => self.ticker_list.set(list),
            LanePayload::Account(snapshot) => self.account.set(snapshot),
            LanePayload::BotStats(stats) => self.bot_stats.set(stats),
            LanePayload::Sentiment(index) => self.sentiment.set(index),
            LanePayload::Metadata(metadata) => self.metadata.set(metadata),
            LanePayload::Training(status) => {
                self.training_error = None;
                let events = self.monitor.on_status(&self.active_key, &status);
                for event in events {
                    self.handle_monitor_event(event);
                }
            }
        }
    }

    fn record_lane_error(&mut self, lane: Lane, err: String) {
        log::error!("{:?} lane fetch failed: {}", lane, err);

        match lane {
            Lane::Market => self.ticker.set_error(err),
            Lane::TickerList => self.ticker_list.set_error(err),
            Lane::Account => self.account.set_error(err),
            Lane::BotStats => self.bot_stats.set_error(err),
            Lane::Sentiment => self.sentiment.set_error(err),
            Lane::Metadata => self.metadata.set_error(err),
            Lane::Training => {
                // A transient hiccup must not abandon tracking.
                self.monitor.on_poll_error(&err);
                self.training_error = Some(err);
            }
        }
    }

    fn handle_monitor_event(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Completed { key } => {
                self.notices.push(Notice::success(format!(
                    "Training complete for {key} — model ready for predictions"
                )));
                // Refresh metadata so the predict action unlocks.
                self.dispatch_fetch(Lane::Metadata);
            }
        }
    }

    /// Keep the training lane's timer in lockstep with the monitor.
    fn sync_training_lane(&mut self) {
        let wants = self.monitor.wants_poll();
        let active = self.scheduler.is_active(Lane::Training);

        if wants && !active {
            self.scheduler.start(Lane::Training);
        } else if !wants && active {
            self.scheduler.cancel(Lane::Training);
        }
    }

    fn dispatch_fetch(&mut self, lane: Lane) {
        let job = FetchJob {
            lane,
            key: self.active_key.clone(),
            generation: self.generation,
        };
        self.send_job(IoJob::Fetch(job));
    }

    fn send_job(&self, job: IoJob) {
        if self.job_tx.send(job).is_err() {
            log::error!("I/O worker is gone; dropping job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use crate::models::TrainingStatus;
    use anyhow::Result;
    use async_trait::async_trait;

    /// A backend that never answers; engine logic under test is driven by
    /// hand-crafted results instead.
    struct NullBackend;

    #[async_trait]
    impl BackendClient for NullBackend {
        async fn fetch_bars(&self, _key: &MarketKey, _limit: u32) -> Result<Vec<Bar>> {
            Ok(Vec::new())
        }
        async fn fetch_ticker(&self, _symbol: &str) -> Result<Ticker24h> {
            Ok(Ticker24h::default())
        }
        async fn fetch_all_tickers(&self) -> Result<Vec<Ticker24h>> {
            Ok(Vec::new())
        }
        async fn fetch_account(&self) -> Result<AccountSnapshot> {
            Ok(AccountSnapshot::default())
        }
        async fn fetch_bot_stats(&self) -> Result<BotStats> {
            Ok(BotStats::default())
        }
        async fn start_bot(&self, _symbols: &[String], _timeframes: &[Timeframe]) -> Result<()> {
            Ok(())
        }
        async fn stop_bot(&self) -> Result<()> {
            Ok(())
        }
        async fn fetch_sentiment(&self) -> Result<SentimentIndex> {
            Ok(SentimentIndex::default())
        }
        async fn start_training(
            &self,
            _key: &MarketKey,
            _params: &Hyperparameters,
        ) -> Result<()> {
            Ok(())
        }
        async fn fetch_training_status(&self, _key: &MarketKey) -> Result<TrainingStatus> {
            Ok(TrainingStatus::default())
        }
        async fn fetch_model_metadata(&self, _key: &MarketKey) -> Result<ModelMetadata> {
            Ok(ModelMetadata::default())
        }
        async fn fetch_prediction(
            &self,
            _key: &MarketKey,
        ) -> Result<crate::models::PricePrediction> {
            Ok(crate::models::PricePrediction::default())
        }
    }

    fn engine() -> TerminalEngine {
        TerminalEngine::with_client(
            Arc::new(NullBackend),
            MarketKey::new("BTCUSDT", Timeframe::H1),
        )
    }

    fn bar(open_time: i64, close: f64) -> Bar {
        Bar {
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn market_result(generation: u64, key: MarketKey, bars: Vec<Bar>) -> LaneResult {
        LaneResult {
            lane: Lane::Market,
            key,
            generation,
            payload: Ok(LanePayload::Market {
                bars,
                ticker: Ticker24h::default(),
            }),
        }
    }

    #[test]
    fn stale_generation_result_is_discarded() {
        let mut e = engine();
        let old_key = e.active_key().clone();

        // User switches market while a fetch for the old key is in flight.
        e.set_active_key(MarketKey::new("ETHUSDT", Timeframe::H1));

        e.apply_lane_result(market_result(0, old_key, vec![bar(100, 5.0)]));

        assert!(e.series.is_empty(), "slow old-key response must not land");
        assert!(e.ticker.get().is_none());
    }

    #[test]
    fn current_generation_result_is_applied() {
        let mut e = engine();
        e.set_active_key(MarketKey::new("ETHUSDT", Timeframe::H1));

        let key = e.active_key().clone();
        e.apply_lane_result(market_result(1, key, vec![bar(100, 5.0), bar(160, 6.0)]));

        assert_eq!(e.series.len(), 2);
        assert!(e.ticker.get().is_some());
    }

    #[test]
    fn global_lane_results_survive_a_key_change() {
        let mut e = engine();
        let issued_at = MarketKey::new("BTCUSDT", Timeframe::H1);

        e.set_active_key(MarketKey::new("ETHUSDT", Timeframe::M5));

        // Account data is key-independent; the epoch guard does not apply.
        e.apply_lane_result(LaneResult {
            lane: Lane::Account,
            key: issued_at,
            generation: 0,
            payload: Ok(LanePayload::Account(AccountSnapshot {
                balance: 50_000.0,
                ..Default::default()
            })),
        });

        assert_eq!(e.account.get().unwrap().balance, 50_000.0);
    }

    #[test]
    fn key_change_clears_keyed_state_and_monitor() {
        let mut e = engine();
        let key = e.active_key().clone();
        e.apply_lane_result(market_result(0, key, vec![bar(100, 5.0)]));
        e.start_training(Hyperparameters::default());

        e.set_active_key(MarketKey::new("SOLUSDT", Timeframe::M15));

        assert!(e.series.is_empty());
        assert!(e.ticker.get().is_none());
        assert!(!e.monitor.wants_poll());
        assert!(e.monitor.job().is_none());
    }

    #[test]
    fn cross_talk_stream_events_are_dropped() {
        let mut e = engine();
        let key = e.active_key().clone();
        e.apply_lane_result(market_result(0, key, vec![bar(100, 5.0)]));

        // An event for a market that is no longer selected.
        e.ingest_stream_event(StreamEvent {
            key: MarketKey::new("DOGEUSDT", Timeframe::H1),
            bar: bar(160, 9.0),
            is_closed: false,
        });

        assert_eq!(e.series.len(), 1);
        assert_eq!(e.series.last().unwrap().close, 5.0);

        // The matching key still lands.
        e.ingest_stream_event(StreamEvent {
            key: e.active_key().clone(),
            bar: bar(160, 9.0),
            is_closed: false,
        });
        assert_eq!(e.series.len(), 2);
    }

    #[test]
    fn completion_edge_produces_one_notice() {
        let mut e = engine();
        e.start_training(Hyperparameters::default());

        let completed = TrainingStatus {
            completed: true,
            epoch: 5,
            ..Default::default()
        };
        for _ in 0..3 {
            e.apply_lane_result(LaneResult {
                lane: Lane::Training,
                key: e.active_key().clone(),
                generation: 0,
                payload: Ok(LanePayload::Training(completed.clone())),
            });
        }

        let notices = e.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].text.contains("Training complete"));
    }

    #[test]
    fn training_poll_error_keeps_tracking_and_surfaces() {
        let mut e = engine();
        e.start_training(Hyperparameters::default());

        e.apply_lane_result(LaneResult {
            lane: Lane::Training,
            key: e.active_key().clone(),
            generation: 0,
            payload: Err("status endpoint 500".into()),
        });

        assert!(e.monitor.wants_poll());
        assert_eq!(e.training_error.as_deref(), Some("status endpoint 500"));
    }

    #[test]
    fn lane_failure_retains_previous_snapshot() {
        let mut e = engine();
        e.apply_lane_result(LaneResult {
            lane: Lane::Sentiment,
            key: e.active_key().clone(),
            generation: 0,
            payload: Ok(LanePayload::Sentiment(SentimentIndex {
                value: 61.0,
                classification: "Greed".into(),
                updated_at: 0,
            })),
        });

        e.apply_lane_result(LaneResult {
            lane: Lane::Sentiment,
            key: e.active_key().clone(),
            generation: 0,
            payload: Err("timeout".into()),
        });

        assert_eq!(e.sentiment.get().unwrap().value, 61.0);
        assert!(e.lane_errors().iter().any(|(name, _)| *name == "sentiment"));
    }
}
