//! Synthetic market data generation.
//!
//! Prices follow a regime-switching random walk. Every [`REGIME_BLOCK`] points
//! a (drift, volatility) regime is drawn from [`REGIMES`]; within the block both
//! are jittered per step and the price compounds by `1 + drift + noise * vol`.
//! All randomness comes from one [`Lcg`] stream, so a seed fully determines
//! the series.

use chrono::{Duration, NaiveDate};

use super::error::ZkquantError;

pub const BASE_PRICE: f64 = 100.0;
pub const REGIME_BLOCK: usize = 50;

/// Relative jitter applied to a regime's drift and volatility on every step.
const REGIME_JITTER: f64 = 0.03;

/// A (drift, volatility) pair governing a block of steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regime {
    pub drift: f64,
    pub volatility: f64,
}

const fn regime(drift: f64, volatility: f64) -> Regime {
    Regime { drift, volatility }
}

pub const REGIMES: [Regime; 8] = [
    regime(0.006, 0.004),
    regime(-0.006, 0.004),
    regime(0.003, 0.003),
    regime(-0.003, 0.003),
    regime(0.002, 0.002),
    regime(-0.002, 0.002),
    regime(0.0, 0.003),
    regime(0.0, 0.002),
];

/// Linear-congruential generator producing values in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    const MULTIPLIER: u64 = 9301;
    const INCREMENT: u64 = 49297;
    const MODULUS: u64 = 233_280;

    pub fn new(seed: u64) -> Self {
        Lcg {
            state: seed % Self::MODULUS,
        }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * Self::MULTIPLIER + Self::INCREMENT) % Self::MODULUS;
        self.state as f64 / Self::MODULUS as f64
    }
}

/// The first synthetic calendar day.
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: NaiveDate,
}

/// An immutable price/time series produced for one evaluation trial.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSeries {
    points: Vec<PricePoint>,
}

impl MarketSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn timestamps(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Build a series from raw points, e.g. for replaying recorded prices.
    pub fn from_prices(start: NaiveDate, prices: &[f64]) -> Self {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                price,
                timestamp: start + Duration::days(i as i64),
            })
            .collect();
        MarketSeries { points }
    }
}

/// Generate `length` points deterministically from `seed`.
pub fn generate(seed: u64, length: usize) -> Result<MarketSeries, ZkquantError> {
    if length == 0 {
        return Err(ZkquantError::Generation {
            reason: "series length must be positive".into(),
        });
    }

    let mut rng = Lcg::new(seed);
    let start = epoch();
    let mut price = BASE_PRICE;
    let mut regime = REGIMES[0];
    let mut points = Vec::with_capacity(length);

    for i in 0..length {
        if i % REGIME_BLOCK == 0 {
            let pick = (rng.next_f64() * REGIMES.len() as f64) as usize;
            regime = REGIMES[pick.min(REGIMES.len() - 1)];
        }

        let drift = regime.drift * (1.0 + (rng.next_f64() - 0.5) * REGIME_JITTER);
        let volatility = regime.volatility * (1.0 + (rng.next_f64() - 0.5) * REGIME_JITTER);
        let noise = rng.next_f64() - 0.5;

        price *= 1.0 + drift + noise * volatility;
        if !price.is_finite() || price <= 0.0 {
            return Err(ZkquantError::Generation {
                reason: format!("price left the positive range at index {i}"),
            });
        }

        points.push(PricePoint {
            price,
            timestamp: start + Duration::days(i as i64),
        });
    }

    Ok(MarketSeries { points })
}
