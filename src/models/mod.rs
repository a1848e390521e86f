mod account;
mod sentiment;
mod series;
mod ticker;
mod training;

pub use account::{AccountSnapshot, BotStats, Order, Position, Trade};
pub use sentiment::SentimentIndex;
pub use series::{ApplyOutcome, BarSeries};
pub use ticker::Ticker24h;
pub use training::{
    Hyperparameters, LossPoint, ModelMetadata, PricePrediction, TrainingJob, TrainingStatus,
};
