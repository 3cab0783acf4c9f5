//! Contiguous VLAN range allocation.
//!
//! Ranges are inclusive `from..=to` pairs. Any size fits anywhere; there is
//! no alignment, so the first gap that is large enough wins. Arithmetic runs
//! in `i128` so bounds and sizes anywhere in the `i64` range cannot overflow.

use super::vlan::parse_vlan;
use super::{join_allocated, AllocationStrategy, CapacityReport, StrategyContext, POOL, RESOURCE, USER_INPUT};
use crate::error::{AllocationError, Result};
use crate::props::{PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::interval::{find_overlap, first_fit, sort_by_end, Block};
use crate::utils::stats::Utilisation;
use num_bigint::BigInt;

const KIND: &str = "VLAN range";

fn describe(block: &Block<i128>) -> String {
    format!("{}-{}", block.start, block.end() - 1)
}

/// VLAN range strategy
#[derive(Debug, Clone)]
pub struct VlanRangeStrategy {
    parent: Block<i128>,
    /// Allocated ranges, stable-sorted by end
    allocated: Vec<Block<i128>>,
    user_input: PropertyBag,
}

impl VlanRangeStrategy {
    pub fn new(context: StrategyContext) -> Result<Self> {
        let from = i128::from(context.pool.int("from", POOL)?);
        let to = i128::from(context.pool.int("to", POOL)?);

        let mut allocated = context
            .allocated()
            .map(|resource| {
                let from = i128::from(resource.int("from", RESOURCE)?);
                let to = i128::from(resource.int("to", RESOURCE)?);
                Ok(Block::new(from, to - from + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        sort_by_end(&mut allocated);

        Ok(Self {
            parent: Block::new(from, (to - from + 1).max(0)),
            allocated,
            user_input: context.user_input,
        })
    }

    fn range(&self) -> String {
        format!("{} - {}", self.parent.start, self.parent.end() - 1)
    }

    pub fn utilized_capacity(&self) -> i128 {
        self.allocated.iter().map(|block| block.size).sum()
    }

    pub fn free_capacity(&self) -> i128 {
        (self.parent.size - self.utilized_capacity()).max(0)
    }

    fn desired_size(&self) -> Result<i128> {
        let desired = self.user_input.int("desiredSize", USER_INPUT)?;
        if desired < 1 {
            return Err(AllocationError::InvalidValue(format!(
                "Unable to allocate {} from: {}. Desired size is invalid: {}. Use values >= 1",
                KIND,
                self.range(),
                desired
            )));
        }
        Ok(i128::from(desired))
    }

    fn allocate_desired(&self, desired: &PropertyValue, size: i128) -> Result<i128> {
        let candidate = Block::new(i128::from(parse_vlan(desired)?), size);
        if !self.parent.contains(&candidate) {
            log::warn!("Requested range {} lies outside {}", describe(&candidate), self.range());
            return Err(AllocationError::OutOfRange {
                kind: KIND,
                value: describe(&candidate),
                range: format!("range: {}", self.range()),
            });
        }
        if let Some(index) = find_overlap(&candidate, &self.allocated) {
            log::warn!("Requested range {} overlaps an allocated range", describe(&candidate));
            return Err(AllocationError::Overlap {
                kind: KIND,
                value: describe(&candidate),
                existing: describe(&self.allocated[index]),
            });
        }
        Ok(candidate.start)
    }
}

impl AllocationStrategy for VlanRangeStrategy {
    fn allocate(&self) -> Result<PropertyBag> {
        let size = self.desired_size()?;
        log::debug!("Allocating VLAN range of size {} from {}", size, self.range());

        let start = match self.user_input.get("desiredValue") {
            Some(desired) => self.allocate_desired(desired, size)?,
            None => first_fit(&self.parent, &self.allocated, &size, &1).ok_or_else(|| {
                log::error!("Unable to allocate VLAN range of size {} from {}", size, self.range());
                Utilisation::new(
                    &BigInt::from(self.parent.size),
                    &BigInt::from(self.utilized_capacity()),
                )
                .log(log::Level::Error);
                AllocationError::Exhausted {
                    kind: KIND,
                    pool: self.range(),
                    request: format!("a new range of size: {}", size),
                    allocated: join_allocated(self.allocated.iter().map(describe)),
                }
            })?,
        };

        let to = start + size - 1;
        let narrow = |value: i128| {
            i64::try_from(value)
                .map_err(|_| AllocationError::InvalidValue(format!("VLAN range bound {} does not fit in 64 bits", value)))
        };
        log::info!("Allocated VLAN range {}-{} from {}", start, to, self.range());
        let mut result = PropertyBag::new();
        result.insert("from".to_string(), PropertyValue::Int(narrow(start)?));
        result.insert("to".to_string(), PropertyValue::Int(narrow(to)?));
        Ok(result)
    }

    fn capacity(&self) -> Result<CapacityReport> {
        Ok(CapacityReport::new(self.free_capacity(), self.utilized_capacity()))
    }
}
