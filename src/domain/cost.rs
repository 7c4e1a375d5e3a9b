//! Transaction cost model: commission plus slippage.

use super::error::WalkForwardError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    per_share_fee: f64,
    minimum_fee: f64,
    slippage_fraction: f64,
}

impl CostModel {
    pub fn new(
        per_share_fee: f64,
        minimum_fee: f64,
        slippage_fraction: f64,
    ) -> Result<Self, WalkForwardError> {
        check_non_negative("per_share_fee", per_share_fee)?;
        check_non_negative("minimum_fee", minimum_fee)?;
        check_non_negative("slippage_fraction", slippage_fraction)?;
        Ok(CostModel {
            per_share_fee,
            minimum_fee,
            slippage_fraction,
        })
    }

    /// Model that charges nothing.
    pub fn free() -> Self {
        CostModel {
            per_share_fee: 0.0,
            minimum_fee: 0.0,
            slippage_fraction: 0.0,
        }
    }

    pub fn per_share_fee(&self) -> f64 {
        self.per_share_fee
    }

    pub fn minimum_fee(&self) -> f64 {
        self.minimum_fee
    }

    pub fn slippage_fraction(&self) -> f64 {
        self.slippage_fraction
    }

    /// max(minimum_fee, per_share_fee * quantity)
    pub fn commission(&self, quantity: f64) -> f64 {
        self.minimum_fee.max(self.per_share_fee * quantity)
    }

    /// slippage_fraction * quantity * price
    pub fn slippage(&self, quantity: f64, price: f64) -> f64 {
        self.slippage_fraction * quantity * price
    }

    /// Total cost of trading `quantity` shares at `price`.
    ///
    /// Quantity is taken as an absolute size. A zero-sized order costs
    /// nothing, since no trade is placed.
    pub fn cost(&self, quantity: f64, price: f64) -> f64 {
        let quantity = quantity.abs();
        if quantity == 0.0 {
            return 0.0;
        }
        self.commission(quantity) + self.slippage(quantity, price.abs())
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::free()
    }
}

fn check_non_negative(key: &str, value: f64) -> Result<(), WalkForwardError> {
    if !value.is_finite() || value < 0.0 {
        return Err(WalkForwardError::invalid_config(
            "costs",
            key,
            format!("{key} must be a non-negative number, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn minimum_fee_dominates_small_orders() {
        let model = CostModel::new(0.005, 1.0, 0.001).unwrap();
        assert_relative_eq!(model.commission(50.0), 1.0);
        assert_relative_eq!(model.slippage(50.0, 100.0), 5.0);
        assert_relative_eq!(model.cost(50.0, 100.0), 6.0);
    }

    #[test]
    fn per_share_fee_dominates_large_orders() {
        let model = CostModel::new(0.005, 1.0, 0.0).unwrap();
        assert_relative_eq!(model.cost(1_000.0, 20.0), 5.0);
    }

    #[test]
    fn zero_quantity_costs_nothing() {
        let model = CostModel::new(0.005, 1.0, 0.001).unwrap();
        assert_eq!(model.cost(0.0, 100.0), 0.0);
    }

    #[test]
    fn negative_quantity_treated_as_size() {
        let model = CostModel::new(0.01, 0.0, 0.001).unwrap();
        assert_relative_eq!(model.cost(-100.0, 10.0), model.cost(100.0, 10.0));
    }

    #[test]
    fn free_model_charges_nothing() {
        assert_eq!(CostModel::free().cost(1_000.0, 50.0), 0.0);
    }

    #[test]
    fn rejects_negative_values() {
        for (fee, min, slip) in [(-0.1, 0.0, 0.0), (0.0, -1.0, 0.0), (0.0, 0.0, -0.01)] {
            assert!(matches!(
                CostModel::new(fee, min, slip),
                Err(WalkForwardError::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(CostModel::new(f64::NAN, 0.0, 0.0).is_err());
        assert!(CostModel::new(0.0, f64::INFINITY, 0.0).is_err());
    }

    proptest! {
        #[test]
        fn cost_non_decreasing_in_quantity(
            fee in 0.0..1.0f64,
            min in 0.0..10.0f64,
            slip in 0.0..0.05f64,
            price in 0.01..1_000.0f64,
            q in 0.0..10_000.0f64,
            extra in 0.0..10_000.0f64,
        ) {
            let model = CostModel::new(fee, min, slip).unwrap();
            let small = model.cost(q, price);
            let large = model.cost(q + extra, price);
            prop_assert!(small >= 0.0);
            prop_assert!(large >= small);
        }

        #[test]
        fn cost_non_decreasing_in_price(
            fee in 0.0..1.0f64,
            min in 0.0..10.0f64,
            slip in 0.0..0.05f64,
            q in 0.0..10_000.0f64,
            price in 0.0..1_000.0f64,
            extra in 0.0..1_000.0f64,
        ) {
            let model = CostModel::new(fee, min, slip).unwrap();
            prop_assert!(model.cost(q, price + extra) >= model.cost(q, price));
        }
    }
}
