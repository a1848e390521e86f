use serde::{Deserialize, Serialize};

/// Rolling 24h statistics for one pair, as served by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub volume: f64,
    pub quote_volume: f64,
}
