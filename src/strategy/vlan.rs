//! Single VLAN id allocation from an inclusive `[from, to]` range.

use super::{join_allocated, AllocationStrategy, CapacityReport, StrategyContext, POOL, RESOURCE};
use crate::error::{AllocationError, Result};
use crate::props::{to_i64, PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::interval::first_free;
use crate::utils::stats::Utilisation;
use num_bigint::BigInt;
use std::collections::BTreeSet;

const KIND: &str = "VLAN";

/// Read a requested VLAN id; strings must be plain decimal digits
pub(crate) fn parse_vlan(value: &PropertyValue) -> Result<i64> {
    let invalid = || AllocationError::InvalidValue(format!("VLAN must be a number. Received: {}.", value));
    match value {
        PropertyValue::Text(s) => {
            let digits = s.trim();
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            digits.parse().map_err(|_| invalid())
        }
        PropertyValue::Bool(_) => Err(invalid()),
        other => to_i64(other).map_err(|_| invalid()),
    }
}

/// VLAN id strategy
#[derive(Debug, Clone)]
pub struct VlanStrategy {
    from: i64,
    to: i64,
    allocated: BTreeSet<i64>,
    user_input: PropertyBag,
}

impl VlanStrategy {
    pub fn new(context: StrategyContext) -> Result<Self> {
        let from = context.pool.int("from", POOL)?;
        let to = context.pool.int("to", POOL)?;
        let allocated = context
            .allocated()
            .map(|resource| resource.int("vlan", RESOURCE))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self {
            from,
            to,
            allocated,
            user_input: context.user_input,
        })
    }

    fn range(&self) -> String {
        format!("{} - {}", self.from, self.to)
    }

    fn total(&self) -> BigInt {
        let total = i128::from(self.to) - i128::from(self.from) + 1;
        BigInt::from(total.max(0))
    }

    fn result(&self, vlan: i64) -> PropertyBag {
        log::info!("Allocated VLAN {} from {}", vlan, self.range());
        let mut result = PropertyBag::new();
        result.insert("vlan".to_string(), PropertyValue::Int(vlan));
        result
    }
}

impl AllocationStrategy for VlanStrategy {
    fn allocate(&self) -> Result<PropertyBag> {
        log::debug!("Allocating VLAN from {} ({} allocated)", self.range(), self.allocated.len());

        if let Some(desired) = self.user_input.get("desiredValue") {
            let vlan = parse_vlan(desired)?;
            if vlan < self.from || vlan > self.to {
                log::warn!("Requested VLAN {} lies outside {}", vlan, self.range());
                return Err(AllocationError::OutOfRange {
                    kind: KIND,
                    value: vlan.to_string(),
                    range: format!("range: {}", self.range()),
                });
            }
            if self.allocated.contains(&vlan) {
                log::warn!("Requested VLAN {} is already allocated", vlan);
                return Err(AllocationError::AlreadyClaimed {
                    kind: KIND,
                    value: vlan.to_string(),
                });
            }
            return Ok(self.result(vlan));
        }

        match first_free(self.from, &self.to, &self.allocated) {
            Some(vlan) => Ok(self.result(vlan)),
            None => {
                log::error!("Unable to allocate VLAN from {}", self.range());
                Utilisation::new(&self.total(), &BigInt::from(self.allocated.len()))
                    .log(log::Level::Error);
                Err(AllocationError::Exhausted {
                    kind: KIND,
                    pool: self.range(),
                    request: "a new vlan".to_string(),
                    allocated: join_allocated(&self.allocated),
                })
            }
        }
    }

    fn capacity(&self) -> Result<CapacityReport> {
        let utilized = BigInt::from(self.allocated.len());
        Ok(CapacityReport::new(self.total() - &utilized, utilized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::props::AllocatedResource;

    fn strategy(from: i64, to: i64, allocated: &[i64], user_input: PropertyBag) -> VlanStrategy {
        let resources = allocated
            .iter()
            .map(|vlan| AllocatedResource::new(props! { "vlan" => *vlan }))
            .collect();
        VlanStrategy::new(StrategyContext::new(props! { "from" => from, "to" => to }, resources, user_input)).unwrap()
    }

    #[test]
    fn test_allocate_next_free() {
        assert_eq!(strategy(0, 4095, &[], props! {}).allocate().unwrap(), props! { "vlan" => 0 });
        assert_eq!(strategy(278, 333, &[278], props! {}).allocate().unwrap(), props! { "vlan" => 279 });
        assert_eq!(
            strategy(0, 10, &[0, 1, 2, 4], props! {}).allocate().unwrap(),
            props! { "vlan" => 3 }
        );
    }

    #[test]
    fn test_exhaustion() {
        let err = strategy(1, 3, &[1, 2, 3], props! {}).allocate().unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(
            err.to_string(),
            "Unable to allocate VLAN from: 1 - 3. Insufficient capacity to allocate a new vlan. Currently allocated: 1, 2, 3"
        );
    }

    #[test]
    fn test_desired_value() {
        assert_eq!(
            strategy(0, 4095, &[], props! { "desiredValue" => "4095" }).allocate().unwrap(),
            props! { "vlan" => 4095 }
        );
        assert_eq!(
            strategy(0, 4095, &[], props! { "desiredValue" => 100 }).allocate().unwrap(),
            props! { "vlan" => 100 }
        );
        assert_eq!(
            strategy(0, 100, &[], props! { "desiredValue" => "101" }).allocate().unwrap_err().to_string(),
            "VLAN 101 is out of range: 0 - 100"
        );
        assert_eq!(
            strategy(0, 100, &[7], props! { "desiredValue" => "7" }).allocate().unwrap_err().to_string(),
            "VLAN 7 was already claimed."
        );
        assert_eq!(
            strategy(0, 100, &[], props! { "desiredValue" => "seven" }).allocate().unwrap_err().to_string(),
            "VLAN must be a number. Received: seven."
        );
    }

    #[test]
    fn test_capacity() {
        assert_eq!(strategy(0, 4095, &[], props! {}).capacity().unwrap(), CapacityReport::new(4096, 0));
        assert_eq!(
            strategy(278, 333, &[278, 279], props! {}).capacity().unwrap(),
            CapacityReport::new(54, 2)
        );
    }

    #[test]
    fn test_extreme_bounds_do_not_overflow() {
        let s = strategy(i64::MAX - 1, i64::MAX, &[i64::MAX - 1], props! {});
        assert_eq!(s.allocate().unwrap(), props! { "vlan" => i64::MAX });
        assert_eq!(s.capacity().unwrap(), CapacityReport::new(1, 1));

        let s = strategy(i64::MAX - 1, i64::MAX, &[i64::MAX - 1, i64::MAX], props! {});
        assert!(s.allocate().unwrap_err().is_exhausted());

        let s = strategy(i64::MIN, i64::MAX, &[], props! {});
        assert_eq!(
            s.capacity().unwrap().free_capacity,
            BigInt::from(u64::MAX) + 1u32
        );
    }

    #[test]
    fn test_missing_bounds() {
        let context = StrategyContext::new(props! { "from" => 0 }, vec![], props! {});
        assert_eq!(
            VlanStrategy::new(context).unwrap_err().to_string(),
            "Missing to in pool properties"
        );
    }
}
