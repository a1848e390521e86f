use serde::{Deserialize, Serialize};

use crate::domain::MarketKey;

/// Raw training status as polled from the backend. Fields default so a
/// half-populated payload (job not found yet, trainer warming up) still
/// deserializes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingStatus {
    pub training: bool,
    pub epoch: u32,
    pub total_epochs: u32,
    pub train_loss: f64,
    pub val_loss: f64,
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub completed: bool,
    pub message: String,
    pub progress: f64,
}

impl TrainingStatus {
    /// A payload worth absorbing: the trainer has either produced an epoch,
    /// is actively running, or has finished.
    pub fn has_activity(&self) -> bool {
        self.training || self.completed || self.epoch > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossPoint {
    pub epoch: u32,
    pub train: f64,
    pub val: f64,
}

/// Client-side view of one training run, keyed to the market it was started
/// for. A new start for the same key replaces the whole object.
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub key: MarketKey,
    pub epoch: u32,
    pub total_epochs: u32,
    pub train_loss: f64,
    pub val_loss: f64,
    pub progress: f64,
    pub completed: bool,
    pub message: String,
    pub loss_history: Vec<LossPoint>,
}

impl TrainingJob {
    pub fn new(key: MarketKey) -> Self {
        Self {
            key,
            epoch: 0,
            total_epochs: 0,
            train_loss: 0.0,
            val_loss: 0.0,
            progress: 0.0,
            completed: false,
            message: String::new(),
            loss_history: Vec::new(),
        }
    }

    /// Overwrite from a status payload. The backend owns the loss history;
    /// we rebuild the projection from its arrays rather than appending
    /// locally, so repeated or skipped polls cannot drift the chart.
    pub fn absorb(&mut self, status: &TrainingStatus) {
        self.epoch = status.epoch;
        self.total_epochs = status.total_epochs;
        self.train_loss = status.train_loss;
        self.val_loss = status.val_loss;
        self.progress = status.progress;
        self.completed = status.completed;
        self.message = status.message.clone();

        if !status.train_losses.is_empty() {
            self.loss_history = status
                .train_losses
                .iter()
                .enumerate()
                .map(|(idx, train)| LossPoint {
                    epoch: idx as u32 + 1,
                    train: *train,
                    val: status.val_losses.get(idx).copied().unwrap_or(0.0),
                })
                .collect();
        }
    }
}

/// Knobs forwarded verbatim to the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub lookback: u32,
    pub hidden_size: u32,
    pub num_layers: u32,
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub val_split: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            lookback: 60,
            hidden_size: 64,
            num_layers: 2,
            epochs: 30,
            batch_size: 32,
            learning_rate: 0.001,
            val_split: 0.2,
        }
    }
}

/// Evaluation metadata of the last trained model for a key. `exists` gates
/// the predict action in the UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMetadata {
    pub exists: bool,
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
    pub direction_accuracy: f64,
    pub trained_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricePrediction {
    pub predicted_price: f64,
    pub direction: String,
    pub confidence: f64,
}

impl PricePrediction {
    pub fn is_up(&self) -> bool {
        self.direction.eq_ignore_ascii_case("up")
    }
}
