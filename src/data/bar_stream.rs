use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::runtime::Runtime;
use tokio::sync::mpsc as async_mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::{BACKEND, DF};
use crate::domain::{Bar, MarketKey, Timeframe};

/// A single live bar pushed by the backend, tagged with the key parsed out
/// of the payload so the receiver can reject cross-talk from a stale
/// subscription.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub key: MarketKey,
    pub bar: Bar,
    pub is_closed: bool,
}

enum StreamCommand {
    Switch(MarketKey),
    Shutdown,
}

enum StreamExit {
    Disconnected,
    Shutdown,
}

/// Owns the websocket connection to the backend's market stream.
///
/// At most one kline subscription is live at a time. Switching keys sends
/// UNSUBSCRIBE for the old stream before SUBSCRIBE for the new one; the
/// acknowledgement is asynchronous, so events for the new key can be missed
/// briefly (the periodic bulk refresh heals that) and a few events for the
/// old key can still arrive (the receiver's key filter drops those).
pub struct BarStreamManager {
    control_tx: async_mpsc::UnboundedSender<StreamCommand>,
}

impl BarStreamManager {
    pub fn spawn(event_tx: Sender<StreamEvent>) -> Self {
        let (control_tx, control_rx) = async_mpsc::unbounded_channel();

        thread::spawn(move || {
            let rt = Runtime::new().expect("Failed to create stream runtime");
            rt.block_on(run_stream_with_reconnect(control_rx, event_tx));
        });

        Self { control_tx }
    }

    /// Point the live subscription at a new key.
    pub fn switch(&self, key: MarketKey) {
        let _ = self.control_tx.send(StreamCommand::Switch(key));
    }

    pub fn shutdown(&self) {
        let _ = self.control_tx.send(StreamCommand::Shutdown);
    }
}

async fn run_stream_with_reconnect(
    mut control_rx: async_mpsc::UnboundedReceiver<StreamCommand>,
    event_tx: Sender<StreamEvent>,
) {
    let mut reconnect_delay = BACKEND.ws.initial_reconnect_delay_sec;
    let mut current_key: Option<MarketKey> = None;

    loop {
        match run_stream(&mut control_rx, &event_tx, &mut current_key).await {
            Ok(StreamExit::Shutdown) => return,
            Ok(StreamExit::Disconnected) => {
                log::warn!("Bar stream closed. Reconnecting...");
                reconnect_delay = BACKEND.ws.initial_reconnect_delay_sec;
            }
            Err(e) => {
                log::error!(
                    "Bar stream connection failed: {}. Retrying in {}s...",
                    e,
                    reconnect_delay
                );
            }
        }

        sleep(Duration::from_secs(reconnect_delay)).await;
        reconnect_delay = (reconnect_delay * 2).min(BACKEND.ws.max_reconnect_delay_sec);
    }
}

async fn run_stream(
    control_rx: &mut async_mpsc::UnboundedReceiver<StreamCommand>,
    event_tx: &Sender<StreamEvent>,
    current_key: &mut Option<MarketKey>,
) -> Result<StreamExit, Box<dyn std::error::Error + Send + Sync>> {
    let (ws_stream, _) = connect_async(BACKEND.ws.url).await?;
    let (mut write, mut read) = ws_stream.split();
    let mut request_id: u64 = 0;

    // Re-establish the subscription after a reconnect.
    if let Some(key) = current_key.as_ref() {
        request_id += 1;
        let msg = subscription_message("SUBSCRIBE", key, request_id);
        write.send(Message::Text(msg.into())).await?;
    }

    loop {
        tokio::select! {
            cmd = control_rx.recv() => {
                match cmd {
                    Some(StreamCommand::Switch(new_key)) => {
                        // Old stream goes first so its updates cannot land in
                        // a series that no longer belongs to it.
                        if let Some(old) = current_key.take() {
                            if old != new_key {
                                request_id += 1;
                                let msg = subscription_message("UNSUBSCRIBE", &old, request_id);
                                write.send(Message::Text(msg.into())).await?;
                            }
                        }

                        request_id += 1;
                        let msg = subscription_message("SUBSCRIBE", &new_key, request_id);
                        write.send(Message::Text(msg.into())).await?;

                        #[cfg(debug_assertions)]
                        if DF.log_stream_updates {
                            log::info!("Stream subscribed to {}", new_key);
                        }

                        *current_key = Some(new_key);
                    }
                    Some(StreamCommand::Shutdown) | None => return Ok(StreamExit::Shutdown),
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&text) {
                            if let Some(event) = parse_kline_event(&v) {
                                #[cfg(debug_assertions)]
                                if DF.log_stream_updates {
                                    log::info!(
                                        "[kline-tick] {} -> {:.6}",
                                        event.key,
                                        event.bar.close
                                    );
                                }
                                // Receiver dropped means the app is closing.
                                if event_tx.send(event).is_err() {
                                    return Ok(StreamExit::Shutdown);
                                }
                            }
                        } else {
                            log::warn!("⚠️ Failed to parse websocket JSON message");
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        write.send(Message::Pong(payload)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(StreamExit::Disconnected),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::error!("Websocket error: {}", e);
                        return Err(e.into());
                    }
                }
            }
        }
    }
}

fn subscription_message(method: &str, key: &MarketKey, id: u64) -> String {
    serde_json::json!({
        "method": method,
        "params": [key.stream_name()],
        "id": id,
    })
    .to_string()
}

/// Decode one pushed kline frame into a keyed event. Payloads may arrive
/// bare or wrapped in a combined-stream envelope; decimal fields come as
/// strings on the wire.
fn parse_kline_event(v: &serde_json::Value) -> Option<StreamEvent> {
    let data = if v.get("data").is_some() { &v["data"] } else { v };

    if data["e"].as_str() != Some("kline") {
        return None;
    }

    let symbol = data["s"].as_str()?.to_string();
    let k = &data["k"];
    let timeframe = Timeframe::parse(k["i"].as_str()?)?;

    let parse_f64 = |field: &str| k[field].as_str().unwrap_or("0").parse().unwrap_or(0.0);

    let bar = Bar {
        open_time: k["t"].as_i64()?,
        open: parse_f64("o"),
        high: parse_f64("h"),
        low: parse_f64("l"),
        close: parse_f64("c"),
        volume: parse_f64("v"),
    };

    Some(StreamEvent {
        key: MarketKey::new(symbol, timeframe),
        bar,
        is_closed: k["x"].as_bool().unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kline_frame(symbol: &str, interval: &str, open_time: i64, close: &str) -> serde_json::Value {
        serde_json::json!({
            "e": "kline",
            "s": symbol,
            "k": {
                "t": open_time,
                "i": interval,
                "o": "100.0",
                "h": "110.0",
                "l": "95.0",
                "c": close,
                "v": "42.5",
                "x": false,
            }
        })
    }

    #[test]
    fn kline_frame_decodes_into_keyed_event() {
        let frame = kline_frame("BTCUSDT", "1h", 1_700_000_000_000, "101.5");

        let event = parse_kline_event(&frame).expect("should decode");

        assert_eq!(event.key, MarketKey::new("BTCUSDT", Timeframe::H1));
        assert_eq!(event.bar.open_time, 1_700_000_000_000);
        assert_eq!(event.bar.close, 101.5);
        assert!(!event.is_closed);
    }

    #[test]
    fn combined_stream_envelope_is_unwrapped() {
        let frame = serde_json::json!({
            "stream": "ethusdt@kline_5m",
            "data": kline_frame("ETHUSDT", "5m", 1_700_000_300_000, "2001.0"),
        });

        let event = parse_kline_event(&frame).expect("should decode");

        assert_eq!(event.key, MarketKey::new("ETHUSDT", Timeframe::M5));
    }

    #[test]
    fn non_kline_frames_are_ignored() {
        let ack = serde_json::json!({ "result": null, "id": 3 });
        assert!(parse_kline_event(&ack).is_none());

        let other = serde_json::json!({ "e": "24hrTicker", "s": "BTCUSDT" });
        assert!(parse_kline_event(&other).is_none());
    }

    #[test]
    fn events_for_other_keys_are_distinguishable() {
        let frame = kline_frame("SOLUSDT", "1h", 1_700_000_000_000, "55.0");
        let event = parse_kline_event(&frame).unwrap();

        let active = MarketKey::new("BTCUSDT", Timeframe::H1);
        assert_ne!(event.key, active);
    }
}
