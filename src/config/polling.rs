use std::time::Duration;

/// Refresh cadence for every polling lane.
/// Each lane is scheduled independently; a slow or failing lane never
/// delays its siblings.
pub struct PollingConfig {
    /// Chart bars + 24h ticker for the active market.
    pub market_refresh: Duration,
    /// Full ticker list for the market picker.
    pub ticker_list_refresh: Duration,
    /// Balance, positions, orders, trade history.
    pub account_refresh: Duration,
    pub bot_stats_refresh: Duration,
    pub sentiment_refresh: Duration,
    /// Training status, only while a job is being tracked.
    pub training_poll: Duration,
    /// Extra status polls after a job completes, to catch trailing metrics.
    pub drain_polls: u32,
}

pub const POLLING: PollingConfig = PollingConfig {
    market_refresh: Duration::from_secs(5),
    ticker_list_refresh: Duration::from_secs(5),
    account_refresh: Duration::from_secs(2),
    bot_stats_refresh: Duration::from_secs(5),
    sentiment_refresh: Duration::from_secs(60),
    training_poll: Duration::from_secs(2),
    drain_polls: 5,
};
