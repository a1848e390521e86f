// Top Level Constants

pub const DEFAULT_SYMBOL: &str = "BTCUSDT";

/// How many bars a full refresh asks the backend for.
pub const CHART_BAR_LIMIT: u32 = 500;

/// Market picker only lists pairs quoted in this asset.
pub const QUOTE_ASSET: &str = "USDT";

/// Activate trace_time! macro (scope-level timing)
pub const LOG_PERFORMANCE: bool = false;
