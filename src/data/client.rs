use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use crate::config::BACKEND;
use crate::domain::{Bar, MarketKey, Timeframe};
use crate::models::{
    AccountSnapshot, BotStats, Hyperparameters, ModelMetadata, PricePrediction, SentimentIndex,
    Ticker24h, TrainingStatus,
};

/// Abstract interface to the remote trading/analytics engine.
///
/// Everything here is request/response; the live bar push channel lives in
/// `bar_stream`. All state behind these calls is owned by the engine; the
/// terminal never writes anything durable of its own.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Bars ascending by `open_time`, at most `limit` of them.
    async fn fetch_bars(&self, key: &MarketKey, limit: u32) -> Result<Vec<Bar>>;

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker24h>;

    /// Every pair the engine tracks; the terminal filters and sorts.
    async fn fetch_all_tickers(&self) -> Result<Vec<Ticker24h>>;

    async fn fetch_account(&self) -> Result<AccountSnapshot>;

    async fn fetch_bot_stats(&self) -> Result<BotStats>;

    async fn start_bot(&self, symbols: &[String], timeframes: &[Timeframe]) -> Result<()>;

    async fn stop_bot(&self) -> Result<()>;

    async fn fetch_sentiment(&self) -> Result<SentimentIndex>;

    /// Fire-and-forget: the job runs asynchronously on the engine and is
    /// observed through `fetch_training_status`.
    async fn start_training(&self, key: &MarketKey, params: &Hyperparameters) -> Result<()>;

    async fn fetch_training_status(&self, key: &MarketKey) -> Result<TrainingStatus>;

    async fn fetch_model_metadata(&self, key: &MarketKey) -> Result<ModelMetadata>;

    async fn fetch_prediction(&self, key: &MarketKey) -> Result<PricePrediction>;
}

/// HTTP implementation against the engine's REST API.
pub struct RestBackend {
    base_url: String,
    client: Client,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(BACKEND.rest.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=BACKEND.rest.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(BACKEND.rest.backoff_ms)).await;
            }

            match self.client.get(&url).query(query).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<T>()
                        .await
                        .with_context(|| format!("Malformed response from {path}"));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    last_err = Some(anyhow!("{path} returned {status}: {text}"));
                    // 4xx will not heal on retry
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => last_err = Some(anyhow::Error::from(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Request to {url} failed")))
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(&body).send().await?;

        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        Err(anyhow!("{path} returned {status}: {text}"))
    }

    fn key_query(key: &MarketKey) -> [(&'static str, String); 2] {
        [
            ("symbol", key.symbol.clone()),
            ("interval", key.timeframe.as_str().to_string()),
        ]
    }
}

#[async_trait]
impl BackendClient for RestBackend {
    async fn fetch_bars(&self, key: &MarketKey, limit: u32) -> Result<Vec<Bar>> {
        let mut query = Self::key_query(key).to_vec();
        query.push(("limit", limit.to_string()));
        self.get_json("/market/klines", &query).await
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker24h> {
        self.get_json("/market/ticker", &[("symbol", symbol.to_string())])
            .await
    }

    async fn fetch_all_tickers(&self) -> Result<Vec<Ticker24h>> {
        self.get_json("/market/tickers", &[]).await
    }

    async fn fetch_account(&self) -> Result<AccountSnapshot> {
        self.get_json("/trading/account", &[]).await
    }

    async fn fetch_bot_stats(&self) -> Result<BotStats> {
        self.get_json("/bot/stats", &[]).await
    }

    async fn start_bot(&self, symbols: &[String], timeframes: &[Timeframe]) -> Result<()> {
        let timeframes: Vec<&str> = timeframes.iter().map(|tf| tf.as_str()).collect();
        self.post_json(
            "/bot/start",
            json!({ "symbols": symbols, "timeframes": timeframes }),
        )
        .await
    }

    async fn stop_bot(&self) -> Result<()> {
        self.post_json("/bot/stop", json!({})).await
    }

    async fn fetch_sentiment(&self) -> Result<SentimentIndex> {
        self.get_json("/sentiment/index", &[]).await
    }

    async fn start_training(&self, key: &MarketKey, params: &Hyperparameters) -> Result<()> {
        self.post_json(
            "/ml/train",
            json!({
                "symbol": key.symbol,
                "interval": key.timeframe.as_str(),
                "lookback": params.lookback,
                "hidden_size": params.hidden_size,
                "num_layers": params.num_layers,
                "epochs": params.epochs,
                "batch_size": params.batch_size,
                "learning_rate": params.learning_rate,
                "val_split": params.val_split,
            }),
        )
        .await
    }

    async fn fetch_training_status(&self, key: &MarketKey) -> Result<TrainingStatus> {
        self.get_json("/ml/train/status", &Self::key_query(key))
            .await
    }

    async fn fetch_model_metadata(&self, key: &MarketKey) -> Result<ModelMetadata> {
        self.get_json("/ml/model", &Self::key_query(key)).await
    }

    async fn fetch_prediction(&self, key: &MarketKey) -> Result<PricePrediction> {
        self.get_json("/ml/predict", &Self::key_query(key)).await
    }
}
