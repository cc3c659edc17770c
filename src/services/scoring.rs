//! Toxicity scoring collaborator.
//!
//! The model itself is a black box behind [`ToxicityScorer`]; the shipped
//! implementation talks to a sidecar HTTP service running the multilingual
//! detoxify model. Overlong posts are never sent to the model: they get
//! the sentinel scores instead.

use async_trait::async_trait;
use std::time::Duration;

use crate::models::ToxicityScores;

/// Posts with this many whitespace-separated words or more are not scored.
pub const SCORE_WORD_CAP: usize = 512;

/// Black-box scoring model: text in, seven probabilities out.
#[async_trait]
pub trait ToxicityScorer: Send + Sync {
    async fn score(&self, text: &str) -> anyhow::Result<ToxicityScores>;
}

/// Score a post, applying the length cap: content at or past
/// [`SCORE_WORD_CAP`] words yields the sentinel without invoking the
/// model.
pub async fn measure_post(
    scorer: &dyn ToxicityScorer,
    content: &str,
) -> anyhow::Result<ToxicityScores> {
    if content.split_whitespace().count() >= SCORE_WORD_CAP {
        return Ok(ToxicityScores::sentinel());
    }
    scorer.score(content).await
}

/// Client for the HTTP scoring service.
pub struct HttpScorer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpScorer {
    pub fn new(endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl ToxicityScorer for HttpScorer {
    async fn score(&self, text: &str) -> anyhow::Result<ToxicityScores> {
        let scores = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?
            .error_for_status()?
            .json::<ToxicityScores>()
            .await?;
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scorer that must never be reached.
    struct UnreachableScorer;

    #[async_trait]
    impl ToxicityScorer for UnreachableScorer {
        async fn score(&self, _text: &str) -> anyhow::Result<ToxicityScores> {
            panic!("scorer invoked for a capped post");
        }
    }

    struct FixedScorer(ToxicityScores);

    #[async_trait]
    impl ToxicityScorer for FixedScorer {
        async fn score(&self, _text: &str) -> anyhow::Result<ToxicityScores> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_overlong_post_gets_sentinel_without_model_call() {
        let content = vec!["word"; SCORE_WORD_CAP].join(" ");
        let scores = measure_post(&UnreachableScorer, &content).await.unwrap();
        assert!(scores.is_sentinel());
    }

    #[tokio::test]
    async fn test_short_post_is_scored() {
        let expected = ToxicityScores {
            toxicity: 0.9,
            severe_toxicity: 0.1,
            obscene: 0.2,
            identity_attack: 0.3,
            insult: 0.4,
            threat: 0.5,
            sexual_explicit: 0.6,
        };
        let content = vec!["word"; SCORE_WORD_CAP - 1].join(" ");
        let scores = measure_post(&FixedScorer(expected), &content).await.unwrap();
        assert_eq!(scores, expected);
    }
}
