// src/services/pricing_service.rs
//
// Pricing Estimator: pure and deterministic, no I/O. Called exactly once per
// ride at request time; the lifecycle manager treats the result as immutable.

use crate::models::ride::{Price, VehicleClass};

const BASE_FARE: f64 = 2.50;
const PER_KM: f64 = 1.40;
const PER_MIN: f64 = 0.30;

fn class_multiplier(class: VehicleClass) -> f64 {
    match class {
        VehicleClass::Standard => 1.0,
        VehicleClass::Comfort => 1.3,
        VehicleClass::Van => 1.5,
        VehicleClass::Premium => 1.6,
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Map distance/duration/vehicle class to a fare breakdown. Each component
/// is rounded to cents, the total is the sum of the rounded components so
/// the breakdown always adds up.
pub fn estimate(distance_meters: f64, duration_seconds: f64, class: VehicleClass) -> Price {
    let m = class_multiplier(class);

    let base = round_cents(BASE_FARE * m);
    let distance = round_cents((distance_meters / 1000.0) * PER_KM * m);
    let time = round_cents((duration_seconds / 60.0) * PER_MIN * m);
    let total = round_cents(base + distance + time);

    Price {
        base,
        distance,
        time,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_fixture_totals_twelve_fifty() {
        // 5km / 10min standard: 2.50 + 7.00 + 3.00
        let price = estimate(5000.0, 600.0, VehicleClass::Standard);
        assert_eq!(price.base, 2.50);
        assert_eq!(price.distance, 7.00);
        assert_eq!(price.time, 3.00);
        assert_eq!(price.total, 12.50);
    }

    #[test]
    fn premium_costs_more_than_standard() {
        let standard = estimate(5000.0, 600.0, VehicleClass::Standard);
        let comfort = estimate(5000.0, 600.0, VehicleClass::Comfort);
        let van = estimate(5000.0, 600.0, VehicleClass::Van);
        let premium = estimate(5000.0, 600.0, VehicleClass::Premium);
        assert!(standard.total < comfort.total);
        assert!(comfort.total < van.total);
        assert!(van.total < premium.total);
    }

    #[test]
    fn breakdown_always_adds_up() {
        for (d, t) in [(1234.0, 333.0), (98765.0, 7200.0), (0.0, 0.0)] {
            for class in [
                VehicleClass::Standard,
                VehicleClass::Comfort,
                VehicleClass::Premium,
                VehicleClass::Van,
            ] {
                let p = estimate(d, t, class);
                let sum = ((p.base + p.distance + p.time) * 100.0).round() / 100.0;
                assert_eq!(p.total, sum);
            }
        }
    }

    #[test]
    fn deterministic() {
        let a = estimate(5000.0, 600.0, VehicleClass::Comfort);
        let b = estimate(5000.0, 600.0, VehicleClass::Comfort);
        assert_eq!(a, b);
    }
}
