//! Fixed-point fractions used for price impact and slippage.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Parts per billion, always within `[0, 10^9]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Perbill(u32);

impl Perbill {
    pub const ACCURACY: u32 = 1_000_000_000;

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn one() -> Self {
        Self(Self::ACCURACY)
    }

    /// Clamps `parts` into range.
    pub fn from_parts(parts: u32) -> Self {
        Self(parts.min(Self::ACCURACY))
    }

    /// Rounds a fraction (1 = 100%) half-up to the nearest part and clamps
    /// the result into `[0, 1]`.
    pub fn from_fraction(fraction: Decimal) -> Self {
        if fraction <= Decimal::ZERO {
            return Self::zero();
        }
        if fraction >= Decimal::ONE {
            return Self::one();
        }

        let parts = (fraction * Decimal::from(Self::ACCURACY))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        Self::from_parts(parts.to_u32().unwrap_or(Self::ACCURACY))
    }

    pub fn parts(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn to_percent(&self) -> Percent {
        Percent(Decimal::new(i64::from(self.0), 7).normalize())
    }
}

/// A percentage where `1` means 1%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// `fraction` of 1 = 100%.
    pub fn from_fraction(fraction: Decimal) -> Self {
        Self((fraction * Decimal::ONE_HUNDRED).normalize())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_perbill(&self) -> Perbill {
        Perbill::from_fraction(self.fraction())
    }
}

impl From<Perbill> for Percent {
    fn from(value: Perbill) -> Self {
        value.to_percent()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_up_to_a_part() {
        assert_eq!(Perbill::from_fraction(dec!(0.0000000005)).parts(), 1);
        assert_eq!(Perbill::from_fraction(dec!(0.0000000004)).parts(), 0);
        assert_eq!(Perbill::from_fraction(dec!(0.1)).parts(), 100_000_000);
    }

    #[test]
    fn perbill_to_percent() {
        assert_eq!(Perbill::from_parts(100_000_000).to_percent(), Percent::new(dec!(10)));
        assert_eq!(Perbill::one().to_percent(), Percent::new(dec!(100)));
        assert_eq!(Perbill::from_parts(5).to_percent().value(), dec!(0.0000005));
        assert_eq!(Percent::new(dec!(0.5)).to_string(), "0.5%");
    }

    proptest! {
        #[test]
        fn perbill_is_always_clamped(raw in -2_000_000i64..2_000_000i64) {
            let perbill = Perbill::from_fraction(Decimal::new(raw, 6));
            prop_assert!(perbill.parts() <= Perbill::ACCURACY);
        }

        #[test]
        fn from_parts_never_exceeds_accuracy(parts in any::<u32>()) {
            prop_assert!(Perbill::from_parts(parts).parts() <= Perbill::ACCURACY);
        }
    }
}
