use crate::config::{DF, POLLING};
use crate::domain::MarketKey;
use crate::models::{TrainingJob, TrainingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// No job tracked for the active key.
    Idle,
    /// A job is (assumed) running; status is polled every tick.
    Polling,
    /// Completion already observed; a few more polls run to catch trailing
    /// metrics before the lane goes quiet.
    Draining { polls_left: u32 },
}

/// Fired on the not-completed -> completed transition, exactly once per job
/// instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Completed { key: MarketKey },
}

/// Tracks one training run per active (symbol, timeframe) key through
/// repeated status polls.
///
/// The completion side effects (notification, metadata refresh) hang off
/// the false->true *edge* of the completed flag, never its level: the
/// backend keeps reporting `completed: true` long after the run finished,
/// and re-observing that must stay silent.
pub struct JobMonitor {
    phase: MonitorPhase,
    job: Option<TrainingJob>,
    completion_seen: bool,
}

impl JobMonitor {
    pub fn new() -> Self {
        Self {
            phase: MonitorPhase::Idle,
            job: None,
            completion_seen: false,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn job(&self) -> Option<&TrainingJob> {
        self.job.as_ref()
    }

    /// True while the status lane should keep its periodic timer running.
    pub fn wants_poll(&self) -> bool {
        !matches!(self.phase, MonitorPhase::Idle)
    }

    /// Optimistic start on a train command. Any previous run for the key is
    /// replaced outright, never merged.
    pub fn start(&mut self, key: MarketKey) {
        #[cfg(debug_assertions)]
        if DF.log_job_monitor {
            log::info!("MONITOR: tracking new training run for {}", key);
        }

        self.job = Some(TrainingJob::new(key));
        self.phase = MonitorPhase::Polling;
        self.completion_seen = false;
    }

    /// Key change or teardown: nothing carries over to the next key.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn on_status(&mut self, key: &MarketKey, status: &TrainingStatus) -> Vec<MonitorEvent> {
        let mut events = Vec::new();

        match self.phase {
            MonitorPhase::Idle => {
                // Discovery probe: adopt a run already in flight on the
                // backend. A historical completed job stays idle; the
                // metadata fetch already covers its results.
                if status.training && !status.completed {
                    let mut job = TrainingJob::new(key.clone());
                    job.absorb(status);

                    #[cfg(debug_assertions)]
                    if DF.log_job_monitor {
                        log::info!(
                            "MONITOR: discovered in-flight training for {} (epoch {})",
                            key,
                            job.epoch
                        );
                    }

                    self.job = Some(job);
                    self.phase = MonitorPhase::Polling;
                    self.completion_seen = false;
                }
            }
            MonitorPhase::Polling => {
                if status.has_activity() {
                    if let Some(job) = self.job.as_mut() {
                        job.absorb(status);
                    }
                }

                if status.completed && !self.completion_seen {
                    self.completion_seen = true;
                    self.phase = MonitorPhase::Draining {
                        polls_left: POLLING.drain_polls,
                    };

                    if let Some(job) = &self.job {
                        events.push(MonitorEvent::Completed {
                            key: job.key.clone(),
                        });
                    }

                    #[cfg(debug_assertions)]
                    if DF.log_job_monitor {
                        log::info!("MONITOR: completion edge for {}", key);
                    }
                }
            }
            MonitorPhase::Draining { polls_left } => {
                // Final loss values can land a tick late; keep absorbing.
                if status.has_activity() {
                    if let Some(job) = self.job.as_mut() {
                        job.absorb(status);
                    }
                }

                let left = polls_left.saturating_sub(1);
                self.phase = if left == 0 {
                    // The job itself stays visible; only the polling stops.
                    MonitorPhase::Idle
                } else {
                    MonitorPhase::Draining { polls_left: left }
                };
            }
        }

        events
    }

    /// A failed poll leaves the state machine untouched; the next scheduled
    /// poll proceeds normally.
    pub fn on_poll_error(&mut self, err: &str) {
        log::error!("Training status poll failed: {}", err);
    }
}

impl Default for JobMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;

    fn key() -> MarketKey {
        MarketKey::new("BTCUSDT", Timeframe::H1)
    }

    fn status(training: bool, epoch: u32, completed: bool) -> TrainingStatus {
        TrainingStatus {
            training,
            epoch,
            total_epochs: 30,
            train_loss: 0.5 / (epoch.max(1) as f64),
            val_loss: 0.6 / (epoch.max(1) as f64),
            train_losses: (1..=epoch).map(|e| 0.5 / e as f64).collect(),
            val_losses: (1..=epoch).map(|e| 0.6 / e as f64).collect(),
            completed,
            message: String::new(),
            progress: epoch as f64 / 30.0,
        }
    }

    #[test]
    fn completion_fires_exactly_once_across_repeated_completed_polls() {
        let mut monitor = JobMonitor::new();
        monitor.start(key());

        let mut fired = 0;
        for _ in 0..10 {
            fired += monitor.on_status(&key(), &status(false, 5, true)).len();
        }

        assert_eq!(fired, 1);
        assert_eq!(monitor.phase(), MonitorPhase::Idle);
        assert!(!monitor.wants_poll());
    }

    #[test]
    fn completion_edge_fires_on_transition_not_level() {
        let mut monitor = JobMonitor::new();
        monitor.start(key());

        let first = monitor.on_status(&key(), &status(true, 3, false));
        assert!(first.is_empty());

        let second = monitor.on_status(&key(), &status(false, 5, true));
        assert_eq!(second, vec![MonitorEvent::Completed { key: key() }]);

        let third = monitor.on_status(&key(), &status(false, 5, true));
        assert!(third.is_empty());
    }

    #[test]
    fn draining_runs_for_the_configured_polls_then_goes_idle() {
        let mut monitor = JobMonitor::new();
        monitor.start(key());
        monitor.on_status(&key(), &status(false, 5, true));

        for i in 0..POLLING.drain_polls {
            assert!(monitor.wants_poll(), "still draining after {} polls", i);
            monitor.on_status(&key(), &status(false, 5, true));
        }

        assert_eq!(monitor.phase(), MonitorPhase::Idle);
        // The finished job stays available for display.
        assert!(monitor.job().is_some());
    }

    #[test]
    fn draining_still_absorbs_late_metrics() {
        let mut monitor = JobMonitor::new();
        monitor.start(key());
        monitor.on_status(&key(), &status(false, 4, true));

        monitor.on_status(&key(), &status(false, 5, true));

        let job = monitor.job().unwrap();
        assert_eq!(job.epoch, 5);
        assert_eq!(job.loss_history.len(), 5);
    }

    #[test]
    fn key_change_resets_with_zero_carryover() {
        let mut monitor = JobMonitor::new();
        monitor.start(key());
        monitor.on_status(&key(), &status(true, 7, false));

        monitor.reset();

        assert_eq!(monitor.phase(), MonitorPhase::Idle);
        assert!(monitor.job().is_none());
        assert!(!monitor.wants_poll());
    }

    #[test]
    fn idle_monitor_adopts_an_in_flight_run() {
        let mut monitor = JobMonitor::new();

        let events = monitor.on_status(&key(), &status(true, 12, false));

        assert!(events.is_empty());
        assert_eq!(monitor.phase(), MonitorPhase::Polling);
        assert_eq!(monitor.job().unwrap().epoch, 12);
    }

    #[test]
    fn idle_monitor_ignores_a_historical_completed_job() {
        let mut monitor = JobMonitor::new();

        let events = monitor.on_status(&key(), &status(false, 30, true));

        assert!(events.is_empty());
        assert_eq!(monitor.phase(), MonitorPhase::Idle);
        assert!(monitor.job().is_none());
    }

    #[test]
    fn poll_error_leaves_state_untouched() {
        let mut monitor = JobMonitor::new();
        monitor.start(key());
        monitor.on_status(&key(), &status(true, 3, false));

        monitor.on_poll_error("backend hiccup");

        assert_eq!(monitor.phase(), MonitorPhase::Polling);
        assert_eq!(monitor.job().unwrap().epoch, 3);
    }

    #[test]
    fn loss_history_tracks_the_server_arrays_not_local_accumulation() {
        let mut monitor = JobMonitor::new();
        monitor.start(key());

        // The same epoch twice must not duplicate points.
        monitor.on_status(&key(), &status(true, 3, false));
        monitor.on_status(&key(), &status(true, 3, false));
        assert_eq!(monitor.job().unwrap().loss_history.len(), 3);

        // A skipped epoch still yields the full server-side history.
        monitor.on_status(&key(), &status(true, 6, false));
        assert_eq!(monitor.job().unwrap().loss_history.len(), 6);
    }
}
