use eframe::egui::{Stroke, Ui};
use egui_plot::{HLine, Line, Plot, PlotPoints, PlotUi, Polygon};

use crate::config::CHART;
use crate::domain::{Bar, Timeframe};
use crate::models::{BarSeries, PricePrediction};

/// One chart-ready candle element. X is the bucket start in seconds so the
/// plot axis stays in familiar epoch units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandlePoint {
    pub x: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl CandlePoint {
    fn from_bar(bar: &Bar) -> Self {
        Self {
            x: bar.open_time as f64 / 1000.0,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        }
    }

    fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeriesFingerprint {
    len: usize,
    last_open_time: i64,
}

/// What the projector decided for this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Point count or latest bucket changed: the whole element list was
    /// recomputed.
    Redraw,
    /// Only the forming bar's OHLC moved: one element patched in place.
    PatchedLast,
    Unchanged,
}

/// Bridges the bar series to the plot.
///
/// Full projections are O(n) in visible bars and must not run on every tick;
/// the common case (the open bucket updating as trades arrive) only rewrites
/// the last cached element. The shape fingerprint (bar count + latest bucket
/// key) decides which path runs.
pub struct ChartProjector {
    points: Vec<CandlePoint>,
    fingerprint: Option<SeriesFingerprint>,
    follow_pending: bool,
}

impl ChartProjector {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            fingerprint: None,
            follow_pending: false,
        }
    }

    /// Forget everything (market switch): the next project is a full redraw
    /// and re-centers the view.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn project(&mut self, series: &BarSeries) -> Projection {
        let Some(last_bar) = series.last() else {
            if self.points.is_empty() {
                return Projection::Unchanged;
            }
            self.points.clear();
            self.fingerprint = None;
            return Projection::Redraw;
        };

        let current = SeriesFingerprint {
            len: series.len(),
            last_open_time: last_bar.open_time,
        };

        match self.fingerprint {
            Some(prev) if prev == current => {
                let patched = CandlePoint::from_bar(last_bar);
                let cached = self.points.last_mut().expect("fingerprint implies points");
                if *cached == patched {
                    Projection::Unchanged
                } else {
                    *cached = patched;
                    Projection::PatchedLast
                }
            }
            prev => {
                crate::trace_time!("Chart: full projection", 2000, {
                    self.points = series.bars().iter().map(CandlePoint::from_bar).collect();
                });

                let grew = prev.map(|p| current.len > p.len).unwrap_or(true);
                if grew {
                    // Keep the newest bar in view; never adjust while only
                    // patching, so a user inspecting history isn't yanked.
                    self.follow_pending = true;
                }

                self.fingerprint = Some(current);
                Projection::Redraw
            }
        }
    }

    pub fn points(&self) -> &[CandlePoint] {
        &self.points
    }

    fn take_follow(&mut self) -> bool {
        std::mem::take(&mut self.follow_pending)
    }
}

impl Default for ChartProjector {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the candle chart for the active market.
/// `project()` must have run for this frame already.
pub fn render_price_chart(
    ui: &mut Ui,
    projector: &mut ChartProjector,
    timeframe: Timeframe,
    prediction: Option<&PricePrediction>,
) {
    let bucket_secs = timeframe.interval_ms() as f64 / 1000.0;
    let follow = projector.take_follow();

    Plot::new("price_chart")
        .show_axes([true, true])
        .allow_drag(true)
        .allow_zoom(true)
        .allow_scroll(true)
        .show(ui, |plot_ui| {
            if follow {
                apply_follow_bounds(plot_ui, projector.points(), bucket_secs);
            }

            for point in projector.points() {
                draw_candle(plot_ui, point, bucket_secs);
            }

            if let Some(prediction) = prediction {
                let color = if prediction.is_up() {
                    CHART.prediction_up_color
                } else {
                    CHART.prediction_down_color
                };
                plot_ui.hline(
                    HLine::new(
                        format!("predicted {:.2}", prediction.predicted_price),
                        prediction.predicted_price,
                    )
                    .color(color)
                    .width(1.5)
                    .style(egui_plot::LineStyle::dashed_loose()),
                );
            }
        });
}

fn apply_follow_bounds(plot_ui: &mut PlotUi, points: &[CandlePoint], bucket_secs: f64) {
    let Some(last) = points.last() else { return };

    let span = bucket_secs * CHART.visible_bars as f64;
    let x_max = last.x + bucket_secs * 2.0;
    let x_min = x_max - span;
    plot_ui.set_plot_bounds_x(x_min..=x_max);

    // Fit Y to the visible slice only.
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;
    for p in points.iter().filter(|p| p.x >= x_min) {
        y_min = y_min.min(p.low);
        y_max = y_max.max(p.high);
    }
    if y_min < y_max {
        let pad = (y_max - y_min) * 0.05;
        plot_ui.set_plot_bounds_y(y_min - pad..=y_max + pad);
    }
}

fn draw_candle(plot_ui: &mut PlotUi, point: &CandlePoint, bucket_secs: f64) {
    let color = if point.is_bullish() {
        CHART.bull_color
    } else {
        CHART.bear_color
    };

    let x = point.x + bucket_secs / 2.0;

    // Wick
    plot_ui.line(
        Line::new("", PlotPoints::new(vec![[x, point.low], [x, point.high]]))
            .color(color)
            .width(1.0),
    );

    // Body
    let half_w = bucket_secs * CHART.body_width_frac / 2.0;
    let (top, bottom) = if point.is_bullish() {
        (point.close, point.open)
    } else {
        (point.open, point.close)
    };
    let pts = vec![
        [x - half_w, bottom],
        [x + half_w, bottom],
        [x + half_w, top],
        [x - half_w, top],
    ];
    plot_ui.polygon(
        Polygon::new("", PlotPoints::new(pts))
            .fill_color(color)
            .stroke(Stroke::NONE),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open_time: i64, close: f64) -> Bar {
        Bar {
            open_time,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1.0,
        }
    }

    fn series(times_closes: &[(i64, f64)]) -> BarSeries {
        let mut s = BarSeries::new();
        s.replace(times_closes.iter().map(|(t, c)| bar(*t, *c)).collect());
        s
    }

    #[test]
    fn first_projection_is_a_full_redraw() {
        let mut projector = ChartProjector::new();
        let s = series(&[(100_000, 5.0), (160_000, 6.0)]);

        assert_eq!(projector.project(&s), Projection::Redraw);
        assert_eq!(projector.points().len(), 2);
        assert!(projector.take_follow());
    }

    #[test]
    fn unchanged_series_projects_to_nothing() {
        let mut projector = ChartProjector::new();
        let s = series(&[(100_000, 5.0)]);
        projector.project(&s);

        assert_eq!(projector.project(&s), Projection::Unchanged);
    }

    #[test]
    fn forming_bar_update_patches_exactly_one_point() {
        let mut projector = ChartProjector::new();
        let mut s = series(&[(100_000, 5.0), (160_000, 6.0)]);
        projector.project(&s);
        projector.take_follow();

        s.apply_update(&bar(160_000, 7.25));

        assert_eq!(projector.project(&s), Projection::PatchedLast);
        assert_eq!(projector.points().len(), 2);
        assert_eq!(projector.points()[1].close, 7.25);
        // A patch never steals the viewport.
        assert!(!projector.take_follow());
    }

    #[test]
    fn appended_bar_forces_redraw_and_follow() {
        let mut projector = ChartProjector::new();
        let mut s = series(&[(100_000, 5.0)]);
        projector.project(&s);
        projector.take_follow();

        s.apply_update(&bar(160_000, 6.0));

        assert_eq!(projector.project(&s), Projection::Redraw);
        assert_eq!(projector.points().len(), 2);
        assert!(projector.take_follow());
    }

    #[test]
    fn same_count_different_last_bucket_is_structural() {
        let mut projector = ChartProjector::new();
        projector.project(&series(&[(100_000, 5.0), (160_000, 6.0)]));

        // A full refresh can slide the window without changing the count.
        let shifted = series(&[(160_000, 6.0), (220_000, 7.0)]);

        assert_eq!(projector.project(&shifted), Projection::Redraw);
    }

    #[test]
    fn emptied_series_clears_the_cache() {
        let mut projector = ChartProjector::new();
        projector.project(&series(&[(100_000, 5.0)]));

        let empty = BarSeries::new();

        assert_eq!(projector.project(&empty), Projection::Redraw);
        assert!(projector.points().is_empty());
        assert_eq!(projector.project(&empty), Projection::Unchanged);
    }
}
