//! Random signed 32-bit integer allocation.

use super::{AllocationStrategy, CapacityReport, StrategyContext, RESOURCE};
use crate::error::{AllocationError, Result};
use crate::props::{PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::interval::first_free;
use crate::utils::stats::Utilisation;
use num_bigint::BigInt;
use rand::Rng;
use std::collections::BTreeSet;

const KIND: &str = "random s_int32";

/// Random draws attempted per allocated value before falling back to a scan
const DRAWS_PER_ALLOCATED: u64 = 4;

/// Random signed int32 strategy
#[derive(Debug, Clone)]
pub struct RandomInt32Strategy {
    from: i64,
    to: i64,
    allocated: BTreeSet<i64>,
}

impl RandomInt32Strategy {
    pub fn new(context: StrategyContext) -> Result<Self> {
        let from = context.pool.int_opt("from")?.unwrap_or(i64::from(i32::MIN));
        let to = context.pool.int_opt("to")?.unwrap_or(i64::from(i32::MAX));
        if from > to || from < i64::from(i32::MIN) || to > i64::from(i32::MAX) {
            return Err(AllocationError::InvalidValue(format!(
                "Invalid s_int32 range [{}-{}]",
                from, to
            )));
        }

        let allocated = context
            .allocated()
            .map(|resource| resource.int("int", RESOURCE))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self { from, to, allocated })
    }

    fn range(&self) -> String {
        format!("[{}-{}]", self.from, self.to)
    }

    fn total(&self) -> i64 {
        self.to - self.from + 1
    }

    /// Allocate with the supplied random source
    pub fn allocate_with<R: Rng>(&self, rng: &mut R) -> Result<PropertyBag> {
        let draws = (self.total() as u64).min(DRAWS_PER_ALLOCATED * (self.allocated.len() as u64 + 1));
        let drawn = (0..draws)
            .map(|_| rng.gen_range(self.from..=self.to))
            .find(|candidate| !self.allocated.contains(candidate));

        let value = match drawn.or_else(|| first_free(self.from, &self.to, &self.allocated)) {
            Some(value) => value,
            None => {
                log::error!("Unable to allocate random s_int32 from {}", self.range());
                Utilisation::new(&BigInt::from(self.total()), &BigInt::from(self.allocated.len()))
                    .log(log::Level::Error);
                return Err(AllocationError::Exhausted {
                    kind: KIND,
                    pool: self.range(),
                    request: "a new s_int32".to_string(),
                    allocated: format!("{} values", self.allocated.len()),
                });
            }
        };

        log::info!("Allocated random s_int32 {} from {}", value, self.range());
        let mut result = PropertyBag::new();
        result.insert("int".to_string(), PropertyValue::Int(value));
        Ok(result)
    }
}

impl AllocationStrategy for RandomInt32Strategy {
    fn allocate(&self) -> Result<PropertyBag> {
        self.allocate_with(&mut rand::thread_rng())
    }

    fn capacity(&self) -> Result<CapacityReport> {
        let utilized = self.allocated.len() as i64;
        Ok(CapacityReport::new(self.total() - utilized, utilized))
    }
}
