use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recommended action for a symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SignalAction {
    /// Open or add to a long position
    #[serde(rename = "buy")]
    Buy,

    /// Close or reduce a position
    #[serde(rename = "sell")]
    Sell,

    /// No action; keep current exposure
    #[serde(rename = "hold")]
    Hold,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "buy"),
            SignalAction::Sell => write!(f, "sell"),
            SignalAction::Hold => write!(f, "hold"),
        }
    }
}

/// Qualitative strength bucket for a recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalStrength {
    #[serde(rename = "weak")]
    Weak,

    #[serde(rename = "moderate")]
    Moderate,

    #[serde(rename = "strong")]
    Strong,
}

impl SignalStrength {
    /// Bucket a confidence score: strong at 0.75 and above, moderate at 0.5.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.75 {
            SignalStrength::Strong
        } else if confidence >= 0.5 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }
}

impl std::fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalStrength::Weak => write!(f, "weak"),
            SignalStrength::Moderate => write!(f, "moderate"),
            SignalStrength::Strong => write!(f, "strong"),
        }
    }
}

/// One recommendation produced by a strategy run.
///
/// This is the only record shape the scheduling core understands; strategy
/// internals stay behind the runner boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRecord {
    /// Stock ticker symbol
    pub symbol: String,

    /// Recommended action
    pub action: SignalAction,

    /// Suggested entry price
    pub entry_price: f64,

    /// Price target, if the strategy produced one
    pub target_price: Option<f64>,

    /// Stop-loss level, if the strategy produced one
    pub stop_loss: Option<f64>,

    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,

    /// Qualitative strength bucket
    pub strength: SignalStrength,

    /// Human-readable rationale
    pub reason: String,

    /// Tag of the strategy that produced the record
    pub source: String,
}

/// Ordered batch of recommendations from a single strategy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationBatch {
    /// Records in strategy output order
    pub records: Vec<RecommendationRecord>,

    /// When the batch was produced
    pub generated_at: DateTime<Utc>,
}

impl RecommendationBatch {
    pub fn new(records: Vec<RecommendationRecord>) -> Self {
        Self {
            records,
            generated_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clean a batch before caching: trim and uppercase symbols, drop records
    /// without a symbol, clamp confidence into [0, 1]. Order is preserved.
    pub fn normalize(mut self) -> Self {
        self.records.retain(|r| !r.symbol.trim().is_empty());
        for record in &mut self.records {
            record.symbol = record.symbol.trim().to_uppercase();
            record.confidence = record.confidence.clamp(0.0, 1.0);
        }
        self
    }

    /// Count-by-action summary for execution records and logs
    pub fn summary(&self) -> BatchSummary {
        let mut buys = 0;
        let mut sells = 0;
        let mut holds = 0;
        for record in &self.records {
            match record.action {
                SignalAction::Buy => buys += 1,
                SignalAction::Sell => sells += 1,
                SignalAction::Hold => holds += 1,
            }
        }

        let avg_confidence = if self.records.is_empty() {
            0.0
        } else {
            self.records.iter().map(|r| r.confidence).sum::<f64>() / self.records.len() as f64
        };

        BatchSummary {
            total: self.records.len(),
            buys,
            sells,
            holds,
            avg_confidence,
        }
    }
}

/// Aggregate view of a batch for execution summaries and logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub buys: usize,
    pub sells: usize,
    pub holds: usize,
    pub avg_confidence: f64,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} records ({} buy / {} sell / {} hold, avg confidence {:.2})",
            self.total, self.buys, self.sells, self.holds, self.avg_confidence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, action: SignalAction, confidence: f64) -> RecommendationRecord {
        RecommendationRecord {
            symbol: symbol.to_string(),
            action,
            entry_price: 100.0,
            target_price: Some(110.0),
            stop_loss: Some(95.0),
            confidence,
            strength: SignalStrength::from_confidence(confidence),
            reason: "test".to_string(),
            source: "unit".to_string(),
        }
    }

    #[test]
    fn test_strength_buckets() {
        assert_eq!(SignalStrength::from_confidence(0.9), SignalStrength::Strong);
        assert_eq!(SignalStrength::from_confidence(0.75), SignalStrength::Strong);
        assert_eq!(SignalStrength::from_confidence(0.6), SignalStrength::Moderate);
        assert_eq!(SignalStrength::from_confidence(0.5), SignalStrength::Moderate);
        assert_eq!(SignalStrength::from_confidence(0.2), SignalStrength::Weak);
    }

    #[test]
    fn test_normalize_cleans_symbols_and_confidence() {
        let batch = RecommendationBatch::new(vec![
            record(" aapl ", SignalAction::Buy, 1.7),
            record("", SignalAction::Sell, 0.4),
            record("msft", SignalAction::Hold, -0.2),
        ])
        .normalize();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[0].symbol, "AAPL");
        assert_eq!(batch.records[0].confidence, 1.0);
        assert_eq!(batch.records[1].symbol, "MSFT");
        assert_eq!(batch.records[1].confidence, 0.0);
    }

    #[test]
    fn test_summary_counts_by_action() {
        let batch = RecommendationBatch::new(vec![
            record("AAPL", SignalAction::Buy, 0.8),
            record("MSFT", SignalAction::Buy, 0.6),
            record("TSLA", SignalAction::Sell, 0.7),
            record("NVDA", SignalAction::Hold, 0.5),
        ]);

        let summary = batch.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.buys, 2);
        assert_eq!(summary.sells, 1);
        assert_eq!(summary.holds, 1);
        assert!((summary.avg_confidence - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_summary_of_empty_batch() {
        let summary = RecommendationBatch::empty().summary();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.avg_confidence, 0.0);
    }

    #[test]
    fn test_action_serde_names() {
        assert_eq!(serde_json::to_string(&SignalAction::Buy).unwrap(), "\"buy\"");
        assert_eq!(
            serde_json::from_str::<SignalAction>("\"sell\"").unwrap(),
            SignalAction::Sell
        );
    }
}
