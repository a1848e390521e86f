use serde::{Deserialize, Serialize};

/// One OHLCV record for a fixed time bucket.
/// `open_time` is the bucket-start epoch in milliseconds and is the unique
/// key of the bar within its series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}
