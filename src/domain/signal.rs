//! Per-step trading signals.

use std::fmt;

/// A per-time-step trading decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    None,
}

impl Signal {
    /// Parse a strategy's return token. Anything but `buy`/`sell` is no signal.
    pub fn from_token(token: &str) -> Self {
        match token {
            "buy" => Signal::Buy,
            "sell" => Signal::Sell,
            _ => Signal::None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "buy"),
            Signal::Sell => write!(f, "sell"),
            Signal::None => write!(f, "none"),
        }
    }
}

/// What one invocation of the strategy produced for a single index.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Signal(Signal),
    NoSignal,
    /// The strategy raised (or overran its step budget) at this index.
    StepError(String),
}

impl StepOutcome {
    /// Collapse to the signal the simulation consumes. Errors become `None`.
    pub fn signal(&self) -> Signal {
        match self {
            StepOutcome::Signal(s) => *s,
            StepOutcome::NoSignal | StepOutcome::StepError(_) => Signal::None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StepOutcome::StepError(_))
    }
}

impl From<Option<&str>> for StepOutcome {
    fn from(token: Option<&str>) -> Self {
        match token.map(Signal::from_token) {
            Some(Signal::None) | None => StepOutcome::NoSignal,
            Some(signal) => StepOutcome::Signal(signal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_case_sensitively() {
        assert_eq!(Signal::from_token("buy"), Signal::Buy);
        assert_eq!(Signal::from_token("sell"), Signal::Sell);
        assert_eq!(Signal::from_token("BUY"), Signal::None);
        assert_eq!(Signal::from_token("hold"), Signal::None);
    }

    #[test]
    fn step_error_collapses_to_none() {
        let outcome = StepOutcome::StepError("ZeroDivisionError".into());
        assert!(outcome.is_error());
        assert_eq!(outcome.signal(), Signal::None);
    }

    #[test]
    fn option_token_conversion() {
        assert_eq!(StepOutcome::from(Some("buy")), StepOutcome::Signal(Signal::Buy));
        assert_eq!(StepOutcome::from(Some("short")), StepOutcome::NoSignal);
        assert_eq!(StepOutcome::from(None), StepOutcome::NoSignal);
    }

    #[test]
    fn display_matches_tokens() {
        assert_eq!(Signal::Sell.to_string(), "sell");
        assert_eq!(Signal::None.to_string(), "none");
    }
}
