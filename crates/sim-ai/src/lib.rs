#![deny(warnings)]

//! Bot behaviour: the market-level pressure signal that stands in for
//! unmodelled competitors, and a rule-based planner for bot-owned companies.

pub mod planner;
pub mod pressure;

pub use planner::plan_bot_decisions;
pub use pressure::market_pressure;

/// Bot utility: higher is better.
pub fn utility(market_share: f64, margin: f64) -> f64 {
    (market_share * 0.7) + (margin * 0.3)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn monotonic_increase() {
        assert!(utility(0.2, 0.1) < utility(0.3, 0.1));
        assert!(utility(0.2, 0.1) < utility(0.2, 0.2));
    }
}
