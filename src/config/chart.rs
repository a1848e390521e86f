use eframe::egui::Color32;

pub struct ChartConfig {
    pub bull_color: Color32,
    pub bear_color: Color32,
    pub prediction_up_color: Color32,
    pub prediction_down_color: Color32,
    pub train_loss_color: Color32,
    pub val_loss_color: Color32,

    /// Candle body width as a fraction of the bucket width.
    pub body_width_frac: f64,
    /// How many bars stay visible when the window auto-advances.
    pub visible_bars: usize,
}

pub const CHART: ChartConfig = ChartConfig {
    bull_color: Color32::from_rgb(34, 197, 94),
    bear_color: Color32::from_rgb(239, 68, 68),
    prediction_up_color: Color32::from_rgb(38, 166, 154),
    prediction_down_color: Color32::from_rgb(239, 83, 80),
    train_loss_color: Color32::from_rgb(100, 200, 255),
    val_loss_color: Color32::GOLD,

    body_width_frac: 0.7,
    visible_bars: 120,
};
