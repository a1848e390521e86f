use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::POLLING;

use super::messages::Lane;

/// Lifecycle of one polling lane's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanePhase {
    /// Never started (or reset); owns no pending ticks.
    Idle,
    Active,
    /// Explicitly stopped. Stays silent until restarted.
    Cancelled,
}

#[derive(Debug)]
struct LaneTimer {
    period: Duration,
    phase: LanePhase,
    last_fired: Option<Instant>,
}

impl LaneTimer {
    fn new(period: Duration) -> Self {
        Self {
            period,
            phase: LanePhase::Idle,
            last_fired: None,
        }
    }
}

/// Owns the periodic tick state for every polling lane.
///
/// Lanes are started and cancelled explicitly on mount, key-change, and
/// teardown transitions; there are no implicit cleanup closures. A freshly
/// started lane fires on the next due check (the mount-time immediate
/// fetch), then once per period.
pub struct PollScheduler {
    timers: HashMap<Lane, LaneTimer>,
}

impl PollScheduler {
    pub fn new() -> Self {
        let mut timers = HashMap::new();
        timers.insert(Lane::Market, LaneTimer::new(POLLING.market_refresh));
        timers.insert(Lane::TickerList, LaneTimer::new(POLLING.ticker_list_refresh));
        timers.insert(Lane::Account, LaneTimer::new(POLLING.account_refresh));
        timers.insert(Lane::BotStats, LaneTimer::new(POLLING.bot_stats_refresh));
        timers.insert(Lane::Sentiment, LaneTimer::new(POLLING.sentiment_refresh));
        timers.insert(Lane::Training, LaneTimer::new(POLLING.training_poll));
        // Lane::Metadata is one-shot and never owns a timer.
        Self { timers }
    }

    /// Activate (or restart) a lane. The next `due_lanes` call fires it
    /// immediately.
    pub fn start(&mut self, lane: Lane) {
        if let Some(timer) = self.timers.get_mut(&lane) {
            timer.phase = LanePhase::Active;
            timer.last_fired = None;
        }
    }

    pub fn cancel(&mut self, lane: Lane) {
        if let Some(timer) = self.timers.get_mut(&lane) {
            timer.phase = LanePhase::Cancelled;
        }
    }

    pub fn cancel_all(&mut self) {
        for timer in self.timers.values_mut() {
            timer.phase = LanePhase::Cancelled;
        }
    }

    pub fn is_active(&self, lane: Lane) -> bool {
        self.phase(lane) == LanePhase::Active
    }

    pub fn phase(&self, lane: Lane) -> LanePhase {
        self.timers
            .get(&lane)
            .map(|t| t.phase)
            .unwrap_or(LanePhase::Idle)
    }

    /// All active lanes due at `now`. Due lanes are marked fired, so each
    /// tick is handed out exactly once.
    pub fn due_lanes(&mut self, now: Instant) -> Vec<Lane> {
        let mut due = Vec::new();

        for (lane, timer) in self.timers.iter_mut() {
            if timer.phase != LanePhase::Active {
                continue;
            }

            let fire = match timer.last_fired {
                None => true,
                Some(at) => now.duration_since(at) >= timer.period,
            };

            if fire {
                timer.last_fired = Some(now);
                due.push(*lane);
            }
        }

        due
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_lane_fires_immediately_then_waits_a_period() {
        let mut scheduler = PollScheduler::new();
        scheduler.start(Lane::Account);

        let t0 = Instant::now();
        assert!(scheduler.due_lanes(t0).contains(&Lane::Account));

        // Same instant again: the tick was already handed out.
        assert!(scheduler.due_lanes(t0).is_empty());

        // Just before the period elapses: still quiet.
        let almost = t0 + POLLING.account_refresh - Duration::from_millis(1);
        assert!(scheduler.due_lanes(almost).is_empty());

        let later = t0 + POLLING.account_refresh;
        assert!(scheduler.due_lanes(later).contains(&Lane::Account));
    }

    #[test]
    fn cancelled_lane_never_fires() {
        let mut scheduler = PollScheduler::new();
        scheduler.start(Lane::Training);
        scheduler.cancel(Lane::Training);

        assert_eq!(scheduler.phase(Lane::Training), LanePhase::Cancelled);
        assert!(scheduler.due_lanes(Instant::now()).is_empty());
    }

    #[test]
    fn restart_makes_a_cancelled_lane_due_again() {
        let mut scheduler = PollScheduler::new();
        scheduler.start(Lane::Training);

        let t0 = Instant::now();
        scheduler.due_lanes(t0);
        scheduler.cancel(Lane::Training);
        scheduler.start(Lane::Training);

        // Restart forgets the previous firing entirely.
        assert!(scheduler.due_lanes(t0).contains(&Lane::Training));
    }

    #[test]
    fn lanes_tick_independently() {
        let mut scheduler = PollScheduler::new();
        scheduler.start(Lane::Account); // 2s
        scheduler.start(Lane::Sentiment); // 60s

        let t0 = Instant::now();
        let first = scheduler.due_lanes(t0);
        assert!(first.contains(&Lane::Account));
        assert!(first.contains(&Lane::Sentiment));

        let later = t0 + POLLING.account_refresh;
        let second = scheduler.due_lanes(later);
        assert!(second.contains(&Lane::Account));
        assert!(!second.contains(&Lane::Sentiment));
    }

    #[test]
    fn metadata_owns_no_timer() {
        let mut scheduler = PollScheduler::new();
        scheduler.start(Lane::Metadata);

        assert_eq!(scheduler.phase(Lane::Metadata), LanePhase::Idle);
        assert!(scheduler.due_lanes(Instant::now()).is_empty());
    }
}
