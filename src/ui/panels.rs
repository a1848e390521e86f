use eframe::egui::{Color32, ComboBox, DragValue, Grid, ProgressBar, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Legend, Line, Plot, PlotPoints};
use strum::IntoEnumIterator;

use crate::config::CHART;
use crate::config::constants::QUOTE_ASSET;
use crate::domain::Timeframe;
use crate::engine::{MonitorPhase, TerminalEngine};
use crate::models::Hyperparameters;
use crate::ui::app::PredictionSlot;
use crate::utils::epoch_ms_to_utc;

fn pnl_color(value: f64) -> Color32 {
    if value >= 0.0 {
        CHART.bull_color
    } else {
        CHART.bear_color
    }
}

/// Top strip: market selectors plus the live 24h ticker readout.
pub fn header(ui: &mut Ui, engine: &TerminalEngine, symbol: &mut String, timeframe: &mut Timeframe) {
    ui.horizontal(|ui| {
        ui.heading("Trade Scope");
        ui.separator();

        let symbols: Vec<String> = engine
            .ticker_list
            .get()
            .map(|list| list.iter().map(|t| t.symbol.clone()).collect())
            .unwrap_or_else(|| vec![symbol.clone()]);

        ComboBox::from_id_salt("symbol_picker")
            .selected_text(symbol.as_str())
            .show_ui(ui, |ui| {
                for candidate in symbols {
                    ui.selectable_value(symbol, candidate.clone(), candidate);
                }
            });

        ComboBox::from_id_salt("timeframe_picker")
            .selected_text(timeframe.as_str())
            .show_ui(ui, |ui| {
                for tf in Timeframe::iter() {
                    ui.selectable_value(timeframe, tf, tf.as_str());
                }
            });

        ui.separator();

        if let Some(ticker) = engine.ticker.get() {
            let change_color = pnl_color(ticker.price_change);
            ui.label(RichText::new(format!("{:.2}", ticker.last_price)).strong().size(16.0));
            ui.colored_label(
                change_color,
                format!(
                    "{:+.2} ({:+.2}%)",
                    ticker.price_change, ticker.price_change_percent
                ),
            );
            ui.weak(format!("Vol {:.0}", ticker.quote_volume));
        } else {
            ui.weak("waiting for ticker…");
        }
    });
}

/// Non-fatal lane failures. Data on screen may be stale; nothing here stops
/// the schedules.
pub fn error_banner(ui: &mut Ui, engine: &TerminalEngine) {
    let errors = engine.lane_errors();
    if errors.is_empty() {
        return;
    }

    ui.horizontal_wrapped(|ui| {
        ui.colored_label(Color32::YELLOW, "⚠");
        for (lane, err) in errors {
            ui.colored_label(Color32::YELLOW, format!("{lane}: {err}"));
        }
    });
}

/// Scrollable market picker. Returns the clicked symbol, if any.
pub fn market_list(ui: &mut Ui, engine: &TerminalEngine, selected: &str) -> Option<String> {
    ui.heading("Markets");

    let Some(list) = engine.ticker_list.get() else {
        ui.weak("loading…");
        return None;
    };

    let mut rows: Vec<_> = list
        .iter()
        .filter(|t| t.symbol.ends_with(QUOTE_ASSET))
        .collect();
    rows.sort_by(|a, b| {
        b.quote_volume
            .partial_cmp(&a.quote_volume)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut clicked = None;
    ScrollArea::vertical()
        .id_salt("market_list")
        .show(ui, |ui| {
            for ticker in rows {
                let is_selected = ticker.symbol == selected;
                let label = format!(
                    "{}  {:.4}  {:+.2}%",
                    ticker.symbol, ticker.last_price, ticker.price_change_percent
                );
                let text = if ticker.price_change_percent >= 0.0 {
                    RichText::new(label).color(CHART.bull_color)
                } else {
                    RichText::new(label).color(CHART.bear_color)
                };
                if ui.selectable_label(is_selected, text).clicked() {
                    clicked = Some(ticker.symbol.clone());
                }
            }
        });

    clicked
}

pub fn account_panel(ui: &mut Ui, engine: &TerminalEngine) {
    ui.heading("Account");

    let Some(account) = engine.account.get() else {
        ui.weak("loading…");
        return;
    };

    ui.label(RichText::new(format!("${:.2}", account.balance)).strong().size(18.0));
    ui.separator();

    ui.collapsing(format!("Positions ({})", account.positions.len()), |ui| {
        if account.positions.is_empty() {
            ui.weak("No open positions");
            return;
        }
        Grid::new("positions_grid").striped(true).show(ui, |ui| {
            ui.strong("Symbol");
            ui.strong("Side");
            ui.strong("Entry");
            ui.strong("Qty");
            ui.strong("PnL");
            ui.end_row();

            for p in &account.positions {
                ui.label(&p.symbol);
                ui.label(&p.side);
                ui.label(format!("{:.4}", p.entry_price));
                ui.label(format!("{:.4}", p.quantity));
                ui.colored_label(
                    pnl_color(p.unrealized_pnl),
                    format!("{:+.2} ({:+.2}%)", p.unrealized_pnl, p.unrealized_pnl_pct),
                );
                ui.end_row();
            }
        });
    });

    ui.collapsing(format!("Orders ({})", account.orders.len()), |ui| {
        if account.orders.is_empty() {
            ui.weak("No working orders");
            return;
        }
        Grid::new("orders_grid").striped(true).show(ui, |ui| {
            ui.strong("Symbol");
            ui.strong("Side");
            ui.strong("Type");
            ui.strong("Price");
            ui.strong("Filled");
            ui.end_row();

            for o in &account.orders {
                ui.label(&o.symbol);
                ui.label(&o.side);
                ui.label(&o.order_type);
                ui.label(format!("{:.4}", o.price));
                ui.label(format!("{:.2}/{:.2}", o.filled_qty, o.quantity));
                ui.end_row();
            }
        });
    });

    ui.collapsing(format!("Trades ({})", account.trades.len()), |ui| {
        if account.trades.is_empty() {
            ui.weak("No closed trades yet");
            return;
        }
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .header(18.0, |mut header| {
                for title in ["Symbol", "Side", "Entry", "Exit", "PnL"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for t in account.trades.iter().rev().take(50) {
                    body.row(16.0, |mut row| {
                        row.col(|ui| {
                            ui.label(&t.symbol);
                        });
                        row.col(|ui| {
                            ui.label(&t.side);
                        });
                        row.col(|ui| {
                            ui.label(format!("{:.4}", t.entry_price));
                        });
                        row.col(|ui| {
                            ui.label(format!("{:.4}", t.exit_price));
                        });
                        row.col(|ui| {
                            ui.colored_label(
                                pnl_color(t.pnl),
                                format!("{:+.2} ({:+.2}%)", t.pnl, t.pnl_percent),
                            );
                        });
                    });
                }
            });
    });
}

pub fn bot_panel(ui: &mut Ui, engine: &mut TerminalEngine, symbol: &str, timeframe: Timeframe) {
    ui.heading("Bot");

    if let Some(stats) = engine.bot_stats.get() {
        Grid::new("bot_stats_grid").show(ui, |ui| {
            ui.label("Trades");
            ui.label(format!(
                "{} ({}W / {}L)",
                stats.total_trades, stats.winning_trades, stats.losing_trades
            ));
            ui.end_row();

            ui.label("Win rate");
            ui.label(format!("{:.1}%", stats.win_rate * 100.0));
            ui.end_row();

            ui.label("Total PnL");
            ui.colored_label(
                pnl_color(stats.total_pnl),
                format!("{:+.2} ({:+.2}%)", stats.total_pnl, stats.total_pnl_percent),
            );
            ui.end_row();
        });
    } else {
        ui.weak("No stats yet");
    }

    if engine.bot_running {
        if ui
            .button(RichText::new("■ Stop bot").color(CHART.bear_color))
            .clicked()
        {
            engine.stop_bot();
        }
    } else if ui.button("▶ Start bot").clicked() {
        engine.start_bot(vec![symbol.to_string()], vec![timeframe]);
    }
}

pub fn sentiment_panel(ui: &mut Ui, engine: &TerminalEngine) {
    ui.heading("Sentiment");

    let Some(index) = engine.sentiment.get() else {
        ui.weak("loading…");
        return;
    };

    let frac = (index.value / 100.0).clamp(0.0, 1.0) as f32;
    let color = if index.value >= 50.0 {
        CHART.bull_color
    } else {
        CHART.bear_color
    };

    ui.add(
        ProgressBar::new(frac)
            .fill(color)
            .text(format!("{:.0} — {}", index.value, index.classification)),
    );
    if index.updated_at > 0 {
        ui.weak(format!("updated {}", epoch_ms_to_utc(index.updated_at)));
    }
}

/// Training controls, live job progress and the trained-model summary.
pub fn training_panel(
    ui: &mut Ui,
    engine: &mut TerminalEngine,
    hyper: &mut Hyperparameters,
    show_params: &mut bool,
    prediction: &mut PredictionSlot,
) {
    ui.horizontal(|ui| {
        ui.heading("Model");
        ui.weak(format!("{}", engine.active_key()));
    });

    let tracking = engine.monitor.wants_poll();

    ui.horizontal(|ui| {
        if ui
            .add_enabled(!tracking, eframe::egui::Button::new("🧠 Train model"))
            .clicked()
        {
            engine.start_training(*hyper);
        }

        if ui.button(if *show_params { "Parameters ▴" } else { "Parameters ▾" }).clicked() {
            *show_params = !*show_params;
        }

        let model_ready = engine.metadata.get().map(|m| m.exists).unwrap_or(false);
        if ui
            .add_enabled(model_ready, eframe::egui::Button::new("🔮 Predict"))
            .clicked()
        {
            prediction.request(engine.client(), engine.active_key().clone());
        }
    });

    if *show_params {
        Grid::new("hyperparams_grid").show(ui, |ui| {
            ui.label("Lookback");
            ui.add(DragValue::new(&mut hyper.lookback).range(10..=500));
            ui.end_row();

            ui.label("Hidden size");
            ui.add(DragValue::new(&mut hyper.hidden_size).range(8..=512));
            ui.end_row();

            ui.label("Layers");
            ui.add(DragValue::new(&mut hyper.num_layers).range(1..=8));
            ui.end_row();

            ui.label("Epochs");
            ui.add(DragValue::new(&mut hyper.epochs).range(1..=500));
            ui.end_row();

            ui.label("Batch size");
            ui.add(DragValue::new(&mut hyper.batch_size).range(1..=1024));
            ui.end_row();

            ui.label("Learning rate");
            ui.add(
                DragValue::new(&mut hyper.learning_rate)
                    .speed(0.0001)
                    .range(0.00001..=0.1),
            );
            ui.end_row();

            ui.label("Val split");
            ui.add(DragValue::new(&mut hyper.val_split).speed(0.01).range(0.05..=0.5));
            ui.end_row();
        });
    }

    if let Some(err) = &engine.training_error {
        ui.colored_label(Color32::YELLOW, format!("⚠ {err}"));
    }

    let job = engine.monitor.job().cloned();
    if let Some(job) = job {
        let progress = if job.total_epochs > 0 {
            job.epoch as f32 / job.total_epochs as f32
        } else {
            0.0
        };
        let status = match engine.monitor.phase() {
            MonitorPhase::Idle if job.completed => "done".to_string(),
            MonitorPhase::Idle => "idle".to_string(),
            MonitorPhase::Polling => format!("epoch {}/{}", job.epoch, job.total_epochs),
            MonitorPhase::Draining { .. } => "finishing…".to_string(),
        };
        ui.add(ProgressBar::new(progress).text(status));

        if !job.message.is_empty() {
            ui.weak(&job.message);
        }

        if !job.loss_history.is_empty() {
            let train_pts: PlotPoints = job
                .loss_history
                .iter()
                .map(|p| [p.epoch as f64, p.train])
                .collect();
            let val_pts: PlotPoints = job
                .loss_history
                .iter()
                .map(|p| [p.epoch as f64, p.val])
                .collect();

            Plot::new("loss_chart")
                .height(120.0)
                .legend(Legend::default())
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new("train loss", train_pts).color(CHART.train_loss_color));
                    plot_ui.line(Line::new("val loss", val_pts).color(CHART.val_loss_color));
                });
        }
    }

    if let Some(metadata) = engine.metadata.get() {
        if metadata.exists {
            ui.separator();
            Grid::new("metadata_grid").show(ui, |ui| {
                ui.label("MAE");
                ui.label(format!("{:.4}", metadata.mae));
                ui.end_row();

                ui.label("RMSE");
                ui.label(format!("{:.4}", metadata.rmse));
                ui.end_row();

                ui.label("MAPE");
                ui.label(format!("{:.2}%", metadata.mape));
                ui.end_row();

                ui.label("Direction acc");
                ui.label(format!("{:.1}%", metadata.direction_accuracy * 100.0));
                ui.end_row();

                ui.label("Trained");
                ui.label(epoch_ms_to_utc(metadata.trained_at));
                ui.end_row();
            });
        }
    }

    if let Some(err) = prediction.last_error() {
        ui.colored_label(Color32::YELLOW, format!("⚠ prediction: {err}"));
    }
    if let Some(p) = prediction.value() {
        let color = if p.is_up() {
            CHART.prediction_up_color
        } else {
            CHART.prediction_down_color
        };
        ui.colored_label(
            color,
            format!(
                "Predicted {:.2} ({}, {:.0}% confidence)",
                p.predicted_price,
                p.direction.to_uppercase(),
                p.confidence * 100.0
            ),
        );
    }
}
