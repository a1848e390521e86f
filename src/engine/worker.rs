use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use tokio::runtime::Runtime;

use crate::config::constants::CHART_BAR_LIMIT;
use crate::data::BackendClient;

use super::messages::{Command, FetchJob, IoJob, Lane, LanePayload, LaneResult, WorkerMessage};

/// Spawns the I/O thread. Jobs arrive over a channel from the GUI thread;
/// each one runs as its own task on the runtime so a slow lane never delays
/// its siblings, and results stream back in completion order.
pub fn spawn_io_thread(
    client: Arc<dyn BackendClient>,
    job_rx: Receiver<IoJob>,
    tx: Sender<WorkerMessage>,
) {
    thread::spawn(move || {
        let rt = Runtime::new().expect("Failed to create I/O runtime");
        rt.block_on(async move {
            while let Ok(job) = job_rx.recv() {
                let client = client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let msg = process_job(client, job).await;
                    // Receiver dropped means the app is closing.
                    let _ = tx.send(msg);
                });
            }
        });
    });
}

async fn process_job(client: Arc<dyn BackendClient>, job: IoJob) -> WorkerMessage {
    match job {
        IoJob::Fetch(fetch) => {
            let payload = dispatch_fetch(&*client, &fetch)
                .await
                .map_err(|e| format!("{e:#}"));

            WorkerMessage::Lane(LaneResult {
                lane: fetch.lane,
                key: fetch.key,
                generation: fetch.generation,
                payload,
            })
        }
        IoJob::Command(command) => {
            let label = command.label();
            let result = run_command(&*client, command)
                .await
                .map_err(|e| format!("{e:#}"));

            WorkerMessage::CommandDone { label, result }
        }
    }
}

async fn dispatch_fetch(client: &dyn BackendClient, job: &FetchJob) -> anyhow::Result<LanePayload> {
    match job.lane {
        Lane::Market => {
            let bars = client.fetch_bars(&job.key, CHART_BAR_LIMIT).await?;
            let ticker = client.fetch_ticker(&job.key.symbol).await?;
            Ok(LanePayload::Market { bars, ticker })
        }
        Lane::TickerList => Ok(LanePayload::TickerList(client.fetch_all_tickers().await?)),
        Lane::Account => Ok(LanePayload::Account(client.fetch_account().await?)),
        Lane::BotStats => Ok(LanePayload::BotStats(client.fetch_bot_stats().await?)),
        Lane::Sentiment => Ok(LanePayload::Sentiment(client.fetch_sentiment().await?)),
        Lane::Training => Ok(LanePayload::Training(
            client.fetch_training_status(&job.key).await?,
        )),
        Lane::Metadata => Ok(LanePayload::Metadata(
            client.fetch_model_metadata(&job.key).await?,
        )),
    }
}

async fn run_command(client: &dyn BackendClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::StartTraining { key, params } => client.start_training(&key, &params).await,
        Command::StartBot { symbols, timeframes } => {
            client.start_bot(&symbols, &timeframes).await
        }
        Command::StopBot => client.stop_bot().await,
    }
}
