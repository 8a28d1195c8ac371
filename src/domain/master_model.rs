//! The master model: every accepted strategy with per-risk-tier weights.
//!
//! On each change every entry's four headline metrics are min-max normalised
//! across the whole model, combined linearly with the tier's coefficients, and
//! the raw scores are divided by their tier total so weights in a tier sum to
//! one. A tier's score is then the weight-averaged total return.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::metrics::EvaluationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [RiskTier::Low, RiskTier::Medium, RiskTier::High];

    pub fn coefficients(self) -> TierCoefficients {
        match self {
            RiskTier::Low => TierCoefficients {
                sharpe: 0.4,
                drawdown: 0.3,
                profit_factor: 0.2,
                total_return: 0.1,
            },
            RiskTier::Medium => TierCoefficients {
                sharpe: 0.25,
                drawdown: 0.25,
                profit_factor: 0.25,
                total_return: 0.25,
            },
            RiskTier::High => TierCoefficients {
                sharpe: 0.1,
                drawdown: 0.1,
                profit_factor: 0.3,
                total_return: 0.5,
            },
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

impl FromStr for RiskTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskTier::Low),
            "medium" => Ok(RiskTier::Medium),
            "high" => Ok(RiskTier::High),
            other => Err(format!("unknown risk tier '{other}'")),
        }
    }
}

/// Linear weights over the normalised features. `drawdown` applies to
/// `1 - normalised drawdown`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierCoefficients {
    pub sharpe: f64,
    pub drawdown: f64,
    pub profit_factor: f64,
    pub total_return: f64,
}

/// One float per risk tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierValues {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl TierValues {
    pub fn get(&self, tier: RiskTier) -> f64 {
        match tier {
            RiskTier::Low => self.low,
            RiskTier::Medium => self.medium,
            RiskTier::High => self.high,
        }
    }

    pub fn set(&mut self, tier: RiskTier, value: f64) {
        match tier {
            RiskTier::Low => self.low = value,
            RiskTier::Medium => self.medium = value,
            RiskTier::High => self.high = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEntry {
    /// Submitted source text; also the entry's identity.
    pub code: String,
    pub metrics: EvaluationResult,
    pub weights: TierValues,
}

impl StrategyEntry {
    pub fn new(code: impl Into<String>, metrics: EvaluationResult) -> Self {
        StrategyEntry {
            code: code.into(),
            metrics,
            weights: TierValues::default(),
        }
    }
}

/// One row of a tier's portfolio view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioEntry {
    pub code: String,
    pub weight: f64,
    pub metrics: EvaluationResult,
}

#[derive(Debug, Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Range {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |r, v| Range {
                min: r.min.min(v),
                max: r.max.max(v),
            },
        )
    }

    fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 { 0.5 } else { (value - self.min) / span }
    }
}

/// Accepted strategies in acceptance order plus per-tier scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterModel {
    #[serde(default)]
    strategies: Vec<StrategyEntry>,
    #[serde(default)]
    scores: TierValues,
}

impl MasterModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategies(&self) -> &[StrategyEntry] {
        &self.strategies
    }

    pub fn scores(&self) -> TierValues {
        self.scores
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.strategies.iter().any(|s| s.code == code)
    }

    /// Append `entry` and recompute weights and scores. Duplicate code is
    /// allowed; callers decide whether to reject it.
    pub fn add_strategy(&mut self, entry: StrategyEntry) {
        self.strategies.push(entry);
        self.recompute_weights();
        self.recompute_scores();
    }

    pub fn clear(&mut self) {
        self.strategies.clear();
        self.scores = TierValues::default();
    }

    pub fn portfolio(&self, tier: RiskTier) -> Vec<PortfolioEntry> {
        self.strategies
            .iter()
            .map(|s| PortfolioEntry {
                code: s.code.clone(),
                weight: s.weights.get(tier),
                metrics: s.metrics,
            })
            .collect()
    }

    pub fn recompute_weights(&mut self) {
        let metrics = || self.strategies.iter().map(|s| s.metrics);
        let sharpe = Range::of(metrics().map(|m| m.sharpe_ratio));
        let drawdown = Range::of(metrics().map(|m| m.max_drawdown));
        let profit_factor = Range::of(metrics().map(|m| m.profit_factor));
        let total_return = Range::of(metrics().map(|m| m.total_return));

        for entry in &mut self.strategies {
            let m = entry.metrics;
            let s = sharpe.normalize(m.sharpe_ratio);
            let d = 1.0 - drawdown.normalize(m.max_drawdown);
            let p = profit_factor.normalize(m.profit_factor);
            let r = total_return.normalize(m.total_return);

            for tier in RiskTier::ALL {
                let c = tier.coefficients();
                let raw = c.sharpe * s + c.drawdown * d + c.profit_factor * p + c.total_return * r;
                entry.weights.set(tier, raw);
            }
        }

        for tier in RiskTier::ALL {
            let sum: f64 = self.strategies.iter().map(|s| s.weights.get(tier)).sum();
            let divisor = if sum == 0.0 { 1.0 } else { sum };
            for entry in &mut self.strategies {
                let w = entry.weights.get(tier);
                entry.weights.set(tier, w / divisor);
            }
        }
    }

    pub fn recompute_scores(&mut self) {
        for tier in RiskTier::ALL {
            let score = self
                .strategies
                .iter()
                .map(|s| s.metrics.total_return * s.weights.get(tier))
                .sum();
            self.scores.set(tier, score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metrics(
        sharpe: f64,
        drawdown: f64,
        profit_factor: f64,
        total_return: f64,
    ) -> EvaluationResult {
        EvaluationResult {
            sharpe_ratio: sharpe,
            max_drawdown: drawdown,
            total_return,
            profit_factor,
            number_of_trades: 40,
        }
    }

    fn tier_sum(model: &MasterModel, tier: RiskTier) -> f64 {
        model.strategies().iter().map(|s| s.weights.get(tier)).sum()
    }

    #[test]
    fn single_entry_gets_full_weight() {
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new("a", metrics(1.0, 5.0, 2.0, 10.0)));

        for tier in RiskTier::ALL {
            assert_relative_eq!(model.strategies()[0].weights.get(tier), 1.0);
            assert_relative_eq!(model.scores().get(tier), 10.0);
        }
    }

    #[test]
    fn weights_sum_to_one_per_tier() {
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new("a", metrics(1.0, 5.0, 2.0, 10.0)));
        model.add_strategy(StrategyEntry::new("b", metrics(2.0, 15.0, 1.5, 30.0)));
        model.add_strategy(StrategyEntry::new("c", metrics(0.7, 8.0, 3.0, 6.0)));

        for tier in RiskTier::ALL {
            assert_relative_eq!(tier_sum(&model, tier), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn two_entries_follow_tier_formulas() {
        // a is best on sharpe and drawdown, b is best on profit factor and return.
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new("a", metrics(2.0, 5.0, 1.5, 10.0)));
        model.add_strategy(StrategyEntry::new("b", metrics(1.0, 10.0, 3.0, 20.0)));

        // raw low: a = 0.4 + 0.3 = 0.7, b = 0.2 + 0.1 = 0.3
        let a = &model.strategies()[0];
        let b = &model.strategies()[1];
        assert_relative_eq!(a.weights.low, 0.7, epsilon = 1e-12);
        assert_relative_eq!(b.weights.low, 0.3, epsilon = 1e-12);
        assert_relative_eq!(a.weights.medium, 0.5, epsilon = 1e-12);
        // raw high: a = 0.2, b = 0.8
        assert_relative_eq!(a.weights.high, 0.2, epsilon = 1e-12);
        assert_relative_eq!(
            model.scores().high,
            0.2 * 10.0 + 0.8 * 20.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn identical_metric_normalises_to_half() {
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new("a", metrics(1.0, 5.0, 2.0, 10.0)));
        model.add_strategy(StrategyEntry::new("b", metrics(1.0, 5.0, 2.0, 10.0)));

        // every feature is 0.5, so raw weights tie and normalise to 0.5 each
        for entry in model.strategies() {
            for tier in RiskTier::ALL {
                assert_relative_eq!(entry.weights.get(tier), 0.5, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn duplicates_coexist() {
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new("same", metrics(1.0, 5.0, 2.0, 10.0)));
        model.add_strategy(StrategyEntry::new("same", metrics(1.5, 4.0, 2.5, 12.0)));
        assert_eq!(model.len(), 2);
        assert!(model.contains_code("same"));
        assert!(!model.contains_code("other"));
    }

    #[test]
    fn clear_resets_scores() {
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new("a", metrics(1.0, 5.0, 2.0, 10.0)));
        model.clear();
        assert!(model.is_empty());
        assert_eq!(model.scores(), TierValues::default());
    }

    #[test]
    fn portfolio_lists_tier_weights_in_order() {
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new("a", metrics(2.0, 5.0, 1.5, 10.0)));
        model.add_strategy(StrategyEntry::new("b", metrics(1.0, 10.0, 3.0, 20.0)));
        let portfolio = model.portfolio(RiskTier::High);
        assert_eq!(portfolio.len(), 2);
        assert_eq!(portfolio[0].code, "a");
        assert_relative_eq!(portfolio[1].weight, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn persisted_layout_uses_expected_keys() {
        let mut model = MasterModel::new();
        model.add_strategy(StrategyEntry::new("a", metrics(1.0, 5.0, 2.0, 10.0)));
        let json = serde_json::to_value(&model).unwrap();
        assert!(json["strategies"][0]["metrics"]["profitFactor"].is_number());
        assert_eq!(json["strategies"][0]["weights"]["medium"], 1.0);
        assert_eq!(json["scores"]["low"], 10.0);
    }

    #[test]
    fn missing_fields_load_as_empty() {
        let model: MasterModel = serde_json::from_str("{}").unwrap();
        assert!(model.is_empty());
        assert_eq!(model.scores(), TierValues::default());
    }

    #[test]
    fn risk_tier_round_trips_through_str() {
        for tier in RiskTier::ALL {
            assert_eq!(tier.to_string().parse::<RiskTier>(), Ok(tier));
        }
        assert!("extreme".parse::<RiskTier>().is_err());
    }
}
