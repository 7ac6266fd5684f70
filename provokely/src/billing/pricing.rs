//! Per-model token pricing for the hosted AI proxy.
//!
//! Prices are dollars per million tokens. Costs are rounded to 4 decimal places and persisted as
//! integer units of 1/10000 dollar.

use rust_decimal::{Decimal, RoundingStrategy};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Decimal places kept for stored costs.
pub const COST_SCALE: u32 = 4;

/// Dollars per million tokens. Unknown models are billed at the `gpt-4o-mini` rate.
pub fn price_per_million(model: &str) -> Decimal {
    match model {
        "gpt-4o" => Decimal::new(250, 2),
        "gpt-4" => Decimal::new(30, 0),
        "gpt-3.5-turbo" => Decimal::new(50, 2),
        _ => Decimal::new(15, 2),
    }
}

pub fn cost_for(model: &str, tokens: i64) -> Decimal {
    let cost = Decimal::from(tokens) * price_per_million(model) / Decimal::from(1_000_000);
    cost.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Integer storage units for a cost already rounded to [`COST_SCALE`].
pub fn to_units(cost: Decimal) -> i64 {
    let mut scaled = cost.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero);
    scaled.rescale(COST_SCALE);
    i64::try_from(scaled.mantissa()).unwrap_or(i64::MAX)
}

pub fn from_units(units: i64) -> Decimal {
    Decimal::new(units, COST_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cost_per_model() {
        assert_eq!(cost_for("gpt-4o-mini", 1_000_000), Decimal::from_str("0.15").unwrap());
        assert_eq!(cost_for("gpt-4o", 2_000), Decimal::from_str("0.005").unwrap());
        assert_eq!(cost_for("gpt-4", 1_000), Decimal::from_str("0.03").unwrap());
        assert_eq!(cost_for("gpt-3.5-turbo", 10_000), Decimal::from_str("0.005").unwrap());
        assert_eq!(cost_for("some-new-model", 1_000_000), Decimal::from_str("0.15").unwrap());
    }

    #[test]
    fn test_cost_rounds_to_four_places() {
        // 123 tokens of gpt-4o-mini is $0.00001845
        assert_eq!(cost_for("gpt-4o-mini", 123), Decimal::ZERO);
        // 1234 tokens of gpt-4 is $0.03702
        assert_eq!(cost_for("gpt-4", 1234), Decimal::from_str("0.0370").unwrap());
        // 1250 tokens of gpt-4o is $0.003125
        assert_eq!(cost_for("gpt-4o", 1250), Decimal::from_str("0.0031").unwrap());
    }

    #[test]
    fn test_units() {
        assert_eq!(to_units(Decimal::from_str("0.0370").unwrap()), 370);
        assert_eq!(to_units(Decimal::from_str("1.5").unwrap()), 15_000);
        assert_eq!(from_units(370), Decimal::from_str("0.037").unwrap());
        assert_eq!(to_units(from_units(12_345)), 12_345);
    }
}
