use async_trait::async_trait;
use serde::Deserialize;

use crate::external::strategy_runner::{StrategyRequest, StrategyRunner, StrategyRunnerError};
use crate::models::{
    RecommendationBatch, RecommendationRecord, SignalAction, SignalStrength,
};

/// Runner backed by a remote analysis service over HTTP
pub struct HttpStrategyRunner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpStrategyRunner {
    pub fn from_env() -> Result<Self, StrategyRunnerError> {
        let base_url = std::env::var("STRATEGY_SERVICE_URL")
            .map_err(|_| StrategyRunnerError::BadResponse("STRATEGY_SERVICE_URL not set".into()))?;
        let api_key = std::env::var("STRATEGY_SERVICE_API_KEY").unwrap_or_default();

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    status: String,
    message: Option<String>,
    recommendations: Option<Vec<WireRecommendation>>,
}

#[derive(Debug, Deserialize)]
struct WireRecommendation {
    symbol: String,
    action: String,
    entry_price: f64,
    target_price: Option<f64>,
    stop_loss: Option<f64>,
    confidence: f64,
    reason: Option<String>,
}

#[async_trait]
impl StrategyRunner for HttpStrategyRunner {
    async fn run(
        &self,
        request: &StrategyRequest,
    ) -> Result<RecommendationBatch, StrategyRunnerError> {
        let url = format!("{}/api/strategies/{}/run", self.base_url, request.strategy);

        let mut builder = self.client.post(&url).json(request);
        if !self.api_key.is_empty() {
            builder = builder.header("x-api-key", self.api_key.as_str());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| StrategyRunnerError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StrategyRunnerError::RateLimited);
        }

        let body: RunResponse = resp
            .json()
            .await
            .map_err(|e| StrategyRunnerError::Parse(e.to_string()))?;

        if body.status != "ok" {
            if let Some(msg) = body.message {
                if msg.contains("rate limit") || msg.contains("credits") {
                    return Err(StrategyRunnerError::RateLimited);
                }
                return Err(StrategyRunnerError::BadResponse(msg));
            }
            return Err(StrategyRunnerError::BadResponse(format!(
                "service returned status: {}",
                body.status
            )));
        }

        let wire = body.recommendations.ok_or_else(|| {
            StrategyRunnerError::BadResponse("missing recommendations in response".into())
        })?;

        let records: Vec<RecommendationRecord> = wire
            .into_iter()
            .map(|w| -> Result<RecommendationRecord, StrategyRunnerError> {
                let action = match w.action.to_lowercase().as_str() {
                    "buy" => SignalAction::Buy,
                    "sell" => SignalAction::Sell,
                    "hold" => SignalAction::Hold,
                    other => {
                        return Err(StrategyRunnerError::Parse(format!(
                            "unknown action '{}'",
                            other
                        )))
                    }
                };

                Ok(RecommendationRecord {
                    symbol: w.symbol,
                    action,
                    entry_price: w.entry_price,
                    target_price: w.target_price,
                    stop_loss: w.stop_loss,
                    confidence: w.confidence,
                    strength: SignalStrength::from_confidence(w.confidence),
                    reason: w.reason.unwrap_or_default(),
                    source: request.strategy.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecommendationBatch::new(records))
    }
}
