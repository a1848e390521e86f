mod bar;
mod market_key;

pub use bar::Bar;
pub use market_key::{MarketKey, Timeframe};
