use exchange::{Balance, Perbill, Percent, SwapQuoteArgs};
use rust_decimal::Decimal;

/// Loss in value between what goes in and what comes out, `max(0, 1 - out/in)`
/// rounded half-up to a part per billion.
///
/// Zero when either side has no fiat value.
pub fn calculate_price_impact(fiat_in: Decimal, fiat_out: Decimal) -> Percent {
    if fiat_in.is_zero() || fiat_out.is_zero() {
        return Percent::zero();
    }

    let Some(ratio) = fiat_out.checked_div(fiat_in) else {
        return Percent::zero();
    };

    let impact = (Decimal::ONE - ratio).max(Decimal::ZERO);
    Perbill::from_fraction(impact).to_percent()
}

/// Price impact of swapping `amount_in` of the request's input token for
/// `amount_out` of its output token.
pub fn price_impact(args: &SwapQuoteArgs, amount_in: &Balance, amount_out: &Balance) -> Percent {
    let fiat_in = args.token_in.planks_to_fiat(amount_in);
    let fiat_out = args.token_out.planks_to_fiat(amount_out);

    calculate_price_impact(fiat_in, fiat_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn equal_value_has_no_impact() {
        assert_eq!(calculate_price_impact(dec!(100), dec!(100)), Percent::zero());
    }

    #[test]
    fn value_lost_is_the_impact() {
        assert_eq!(calculate_price_impact(dec!(100), dec!(90)), Percent::new(dec!(10)));
    }

    #[test]
    fn favourable_trade_has_no_impact() {
        assert_eq!(calculate_price_impact(dec!(100), dec!(110)), Percent::zero());
    }

    #[test]
    fn missing_fiat_value_has_no_impact() {
        assert_eq!(calculate_price_impact(Decimal::ZERO, dec!(90)), Percent::zero());
        assert_eq!(calculate_price_impact(dec!(100), Decimal::ZERO), Percent::zero());
    }

    #[test]
    fn impact_is_rounded_to_a_part_per_billion() {
        // 1 - 1/3 = 0.666666666… → 666_666_667 parts
        assert_eq!(
            calculate_price_impact(dec!(3), dec!(1)).to_perbill().parts(),
            666_666_667
        );
        assert_eq!(
            calculate_price_impact(dec!(3), dec!(2)).value(),
            dec!(33.3333333)
        );
    }

    proptest! {
        #[test]
        fn impact_is_between_zero_and_hundred(
            fiat_in in 1i64..1_000_000_000,
            fiat_out in 0i64..2_000_000_000,
        ) {
            let impact = calculate_price_impact(Decimal::new(fiat_in, 2), Decimal::new(fiat_out, 2));
            prop_assert!(impact.value() >= Decimal::ZERO);
            prop_assert!(impact.value() <= Decimal::ONE_HUNDRED);
        }
    }
}
