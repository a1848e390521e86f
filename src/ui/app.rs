use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{
    Align2, Area, CentralPanel, Color32, Context, Id, RichText, ScrollArea, SidePanel,
    TopBottomPanel, Visuals,
};
use eframe::{Frame, Storage};
use poll_promise::Promise;
use serde::{Deserialize, Serialize};

use crate::Cli;
use crate::config::{BACKEND, CHART};
use crate::config::constants::DEFAULT_SYMBOL;
use crate::data::BackendClient;
use crate::domain::{MarketKey, Timeframe};
use crate::engine::{Notice, NoticeLevel, TerminalEngine};
use crate::models::{Hyperparameters, PricePrediction};
use crate::ui::chart::{self, ChartProjector};
use crate::ui::panels;

const TOAST_TTL: Duration = Duration::from_secs(6);
/// The pump must keep running even when no input arrives, otherwise lane
/// timers stall between user interactions.
const REPAINT_INTERVAL: Duration = Duration::from_millis(250);

struct Toast {
    notice: Notice,
    born: Instant,
}

/// One-shot prediction fetch driven from the UI.
pub struct PredictionSlot {
    promise: Option<Promise<Result<PricePrediction, String>>>,
    value: Option<PricePrediction>,
    last_error: Option<String>,
}

impl PredictionSlot {
    fn new() -> Self {
        Self {
            promise: None,
            value: None,
            last_error: None,
        }
    }

    pub(crate) fn request(&mut self, client: Arc<dyn BackendClient>, key: MarketKey) {
        if self.promise.is_some() {
            return;
        }
        self.last_error = None;
        self.promise = Some(Promise::spawn_thread("prediction_fetch", move || {
            let rt = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
            rt.block_on(client.fetch_prediction(&key))
                .map_err(|e| format!("{e:#}"))
        }));
    }

    fn poll(&mut self) {
        let ready = self
            .promise
            .as_ref()
            .map(|p| p.ready().is_some())
            .unwrap_or(false);
        if !ready {
            return;
        }

        if let Some(promise) = self.promise.take() {
            match promise.try_take() {
                Ok(Ok(prediction)) => self.value = Some(prediction),
                Ok(Err(e)) => self.last_error = Some(e),
                Err(_) => {}
            }
        }
    }

    fn clear(&mut self) {
        self.promise = None;
        self.value = None;
        self.last_error = None;
    }

    pub(crate) fn value(&self) -> Option<&PricePrediction> {
        self.value.as_ref()
    }

    pub(crate) fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Default for PredictionSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize, Serialize)]
#[serde(default)]
pub struct TerminalApp {
    // Persisted user intent (thin, serializable)
    pub(crate) symbol: String,
    pub(crate) timeframe: Timeframe,
    pub(crate) hyperparams: Hyperparameters,
    pub(crate) show_training_params: bool,

    #[serde(skip)]
    pub(crate) engine: Option<TerminalEngine>,
    #[serde(skip)]
    pub(crate) projector: ChartProjector,
    #[serde(skip)]
    toasts: Vec<Toast>,
    #[serde(skip)]
    pub(crate) prediction: PredictionSlot,
}

impl Default for TerminalApp {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            timeframe: Timeframe::default(),
            hyperparams: Hyperparameters::default(),
            show_training_params: false,
            engine: None,
            projector: ChartProjector::new(),
            toasts: Vec::new(),
            prediction: PredictionSlot::new(),
        }
    }
}

impl TerminalApp {
    pub fn new(cc: &eframe::CreationContext<'_>, args: Cli) -> Self {
        let mut app: TerminalApp = if let Some(storage) = cc.storage {
            eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default()
        } else {
            Self::default()
        };

        setup_custom_visuals(&cc.egui_ctx);

        let base_url = args
            .backend_url
            .unwrap_or_else(|| BACKEND.rest.base_url.to_string());
        let initial_key = MarketKey::new(app.symbol.clone(), app.timeframe);

        match TerminalEngine::new(&base_url, initial_key) {
            Ok(engine) => app.engine = Some(engine),
            Err(e) => log::error!("Failed to initialize backend client: {e:#}"),
        }

        app
    }
}

/// Sets up custom visuals for the entire application
fn setup_custom_visuals(ctx: &Context) {
    let mut visuals = Visuals::dark();
    visuals.window_fill = Color32::from_rgb(15, 15, 20);
    visuals.panel_fill = Color32::from_rgb(20, 20, 26);
    ctx.set_visuals(visuals);
}

fn render_toasts(ctx: &Context, toasts: &[Toast]) {
    if toasts.is_empty() {
        return;
    }

    Area::new(Id::new("toasts"))
        .anchor(Align2::RIGHT_BOTTOM, [-16.0, -16.0])
        .show(ctx, |ui| {
            for toast in toasts {
                let color = match toast.notice.level {
                    NoticeLevel::Info => Color32::LIGHT_GRAY,
                    NoticeLevel::Success => CHART.bull_color,
                    NoticeLevel::Error => CHART.bear_color,
                };
                eframe::egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.colored_label(color, &toast.notice.text);
                });
            }
        });
}

impl eframe::App for TerminalApp {
    fn save(&mut self, storage: &mut dyn Storage) {
        eframe::set_value(storage, eframe::APP_KEY, self);
    }

    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        let Some(engine) = self.engine.as_mut() else {
            CentralPanel::default().show(ctx, |ui| {
                ui.centered_and_justified(|ui| {
                    ui.colored_label(
                        Color32::RED,
                        "Backend client failed to initialize — see logs",
                    );
                });
            });
            return;
        };

        // THE PUMP: drain stream events and lane completions, tick lanes.
        engine.update();
        self.prediction.poll();

        // Selection changes tear down everything keyed to the old market.
        let desired = MarketKey::new(self.symbol.clone(), self.timeframe);
        if engine.active_key() != &desired {
            engine.set_active_key(desired);
            self.projector.reset();
            self.prediction.clear();
        }

        for notice in engine.take_notices() {
            self.toasts.push(Toast {
                notice,
                born: Instant::now(),
            });
        }
        self.toasts.retain(|t| t.born.elapsed() < TOAST_TTL);

        TopBottomPanel::top("header").show(ctx, |ui| {
            panels::header(ui, engine, &mut self.symbol, &mut self.timeframe);
            panels::error_banner(ui, engine);
        });

        SidePanel::left("markets")
            .default_width(210.0)
            .show(ctx, |ui| {
                if let Some(clicked) = panels::market_list(ui, engine, &self.symbol) {
                    self.symbol = clicked;
                }
            });

        SidePanel::right("status")
            .default_width(300.0)
            .show(ctx, |ui| {
                ScrollArea::vertical().id_salt("status_scroll").show(ui, |ui| {
                    panels::account_panel(ui, engine);
                    ui.separator();
                    panels::bot_panel(ui, engine, &self.symbol, self.timeframe);
                    ui.separator();
                    panels::sentiment_panel(ui, engine);
                });
            });

        TopBottomPanel::bottom("training")
            .resizable(true)
            .show(ctx, |ui| {
                panels::training_panel(
                    ui,
                    engine,
                    &mut self.hyperparams,
                    &mut self.show_training_params,
                    &mut self.prediction,
                );
            });

        CentralPanel::default().show(ctx, |ui| {
            self.projector.project(&engine.series);
            if engine.series.is_empty() {
                ui.centered_and_justified(|ui| {
                    ui.label(RichText::new("Waiting for market data…").weak());
                });
            } else {
                chart::render_price_chart(
                    ui,
                    &mut self.projector,
                    self.timeframe,
                    self.prediction.value(),
                );
            }
        });

        render_toasts(ctx, &self.toasts);

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
