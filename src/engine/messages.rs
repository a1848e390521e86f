use crate::domain::{Bar, MarketKey, Timeframe};
use crate::models::{
    AccountSnapshot, BotStats, Hyperparameters, ModelMetadata, SentimentIndex, Ticker24h,
    TrainingStatus,
};

/// One independently scheduled polling concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Chart bars + 24h ticker for the active market.
    Market,
    /// Full ticker list for the market picker.
    TickerList,
    Account,
    BotStats,
    Sentiment,
    /// Training status; periodic only while a job is tracked, otherwise
    /// dispatched as a one-shot discovery probe.
    Training,
    /// One-shot, never on a timer: on mount, key change, and after a
    /// training run completes.
    Metadata,
}

impl Lane {
    /// Keyed lanes carry data scoped to the active (symbol, timeframe);
    /// their results die on the request-epoch guard after a key change.
    pub fn is_keyed(&self) -> bool {
        matches!(self, Lane::Market | Lane::Training | Lane::Metadata)
    }
}

/// A fetch dispatched to the I/O thread. The key and generation are
/// captured at issue time; the engine compares the generation on completion
/// and discards anything that crossed a key change.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub lane: Lane,
    pub key: MarketKey,
    pub generation: u64,
}

/// Fire-and-forget command to the remote engine.
#[derive(Debug, Clone)]
pub enum Command {
    StartTraining {
        key: MarketKey,
        params: Hyperparameters,
    },
    StartBot {
        symbols: Vec<String>,
        timeframes: Vec<Timeframe>,
    },
    StopBot,
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::StartTraining { .. } => "Start training",
            Command::StartBot { .. } => "Start bot",
            Command::StopBot => "Stop bot",
        }
    }
}

#[derive(Debug)]
pub enum IoJob {
    Fetch(FetchJob),
    Command(Command),
}

#[derive(Debug)]
pub enum LanePayload {
    Market { bars: Vec<Bar>, ticker: Ticker24h },
    TickerList(Vec<Ticker24h>),
    Account(AccountSnapshot),
    BotStats(BotStats),
    Sentiment(SentimentIndex),
    Training(TrainingStatus),
    Metadata(ModelMetadata),
}

/// The result returned by the I/O worker for one fetch.
#[derive(Debug)]
pub struct LaneResult {
    pub lane: Lane,
    pub key: MarketKey,
    pub generation: u64,
    pub payload: Result<LanePayload, String>,
}

#[derive(Debug)]
pub enum WorkerMessage {
    Lane(LaneResult),
    CommandDone {
        label: &'static str,
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// One-shot user-facing message (toast), produced by the engine and drained
/// by the UI.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}
