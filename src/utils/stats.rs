//! Utilisation statistics for a pool.

use log::{log, Level};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Remaining / utilised capacity of a pool and the utilisation percentage
#[derive(Debug, Clone, PartialEq)]
pub struct Utilisation {
    pub remaining: BigInt,
    pub utilised: BigInt,
    pub percentage: f64,
}

impl Utilisation {
    /// Compute stats for a pool of `total` units with `utilised` taken.
    ///
    /// An exhausted (or empty) pool reads as 100%.
    pub fn new(total: &BigInt, utilised: &BigInt) -> Self {
        let mut remaining = total - utilised;
        if remaining.is_negative() {
            remaining = BigInt::zero();
        }
        let percentage = if remaining.is_zero() || total.is_zero() {
            100.0
        } else {
            let permille: BigInt = utilised * 1000u32 / total;
            permille.to_f64().unwrap_or(0.0) / 10.0
        };
        Self {
            remaining,
            utilised: utilised.clone(),
            percentage,
        }
    }

    /// Emit the stats at `level`
    pub fn log(&self, level: Level) {
        log!(level, "Remaining capacity: {}", self.remaining);
        log!(level, "Utilised capacity: {}", self.utilised);
        log!(level, "Utilisation: {:.1}%", self.percentage);
    }
}
