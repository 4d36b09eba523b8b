use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::RentalDuration;

/// Smallest rentable energy amount
pub const MIN_ENERGY_AMOUNT: i64 = 1_000;
/// Largest rentable energy amount
pub const MAX_ENERGY_AMOUNT: i64 = 10_000_000;

/// Price per unit of energy, in TRX
const BASE_PRICE_PER_UNIT: Decimal = dec!(0.00001);
/// Discount multiplier applied to the day-fraction term
const TIME_DISCOUNT: Decimal = dec!(0.8);

/// Rental cost in TRX, rounded to 6 fractional digits with banker's
/// rounding. Computed once at order creation; stored costs are never
/// recomputed.
///
/// cost = energy_amount * 0.00001 * fraction_of_day(duration) * 0.8
pub fn rental_cost(energy_amount: i64, duration: RentalDuration) -> Decimal {
    let base = Decimal::from(energy_amount) * BASE_PRICE_PER_UNIT;
    let multiplier = duration.fraction_of_day() * TIME_DISCOUNT;
    (base * multiplier).round_dp_with_strategy(6, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_day_worked_example() {
        // 135000 * 0.00001 * 1 * 0.8 = 1.08
        assert_eq!(
            rental_cost(135_000, RentalDuration::OneDay),
            dec!(1.08)
        );
    }

    #[test]
    fn one_hour_worked_example_uses_bankers_rounding() {
        // 65000 * 0.00001 * (1/24) * 0.8 = 0.0216666... -> 0.021667
        assert_eq!(
            rental_cost(65_000, RentalDuration::OneHour),
            dec!(0.021667)
        );
    }

    #[test]
    fn longer_durations_scale_linearly() {
        let one_day = rental_cost(100_000, RentalDuration::OneDay);
        assert_eq!(rental_cost(100_000, RentalDuration::ThreeDays), one_day * dec!(3));
        assert_eq!(rental_cost(100_000, RentalDuration::SevenDays), one_day * dec!(7));
        assert_eq!(
            rental_cost(100_000, RentalDuration::FourteenDays),
            one_day * dec!(14)
        );
    }

    #[test]
    fn minimum_amount_has_nonzero_cost() {
        assert!(rental_cost(MIN_ENERGY_AMOUNT, RentalDuration::OneHour) > Decimal::ZERO);
    }
}
