//! Extracted posts and their toxicity attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post as pulled out of a thread page, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPost {
    /// Poster's handle.
    pub author: String,
    /// Post body text.
    pub content: String,
    /// Posting time, parsed from the page's relative-time label.
    pub created_at: DateTime<Utc>,
    /// URL of the thread page this post was extracted from.
    pub url: String,
}

/// All posts materialized from one thread in one pass. An empty batch is a
/// valid "this thread produced nothing" signal and still counts toward
/// completion.
pub type PostBatch = Vec<RawPost>;

/// The seven attributes returned by the toxicity model, each a probability
/// in [0, 1], or all set to the -1 sentinel for posts too long to score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToxicityScores {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub obscene: f64,
    pub identity_attack: f64,
    pub insult: f64,
    pub threat: f64,
    pub sexual_explicit: f64,
}

impl ToxicityScores {
    /// Sentinel value for posts past the scoring length cap.
    pub const UNSCORED: f64 = -1.0;

    /// All-sentinel scores.
    pub fn sentinel() -> Self {
        Self {
            toxicity: Self::UNSCORED,
            severe_toxicity: Self::UNSCORED,
            obscene: Self::UNSCORED,
            identity_attack: Self::UNSCORED,
            insult: Self::UNSCORED,
            threat: Self::UNSCORED,
            sexual_explicit: Self::UNSCORED,
        }
    }

    /// Whether these scores are the unscored sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.toxicity == Self::UNSCORED
    }
}
