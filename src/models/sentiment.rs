use serde::{Deserialize, Serialize};

/// Market sentiment index, 0 (extreme fear) to 100 (extreme greed).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SentimentIndex {
    pub value: f64,
    pub classification: String,
    pub updated_at: i64,
}
