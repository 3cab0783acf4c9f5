//! Single IPv6 address allocation.

use super::{join_allocated, AllocationStrategy, CapacityReport, StrategyContext, POOL, RESOURCE, USER_INPUT};
use crate::error::{AllocationError, Result};
use crate::props::{PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::interval::first_free;
use crate::utils::ipv6::{aton, check_prefix, ntoa, Ipv6Prefix};
use crate::utils::stats::Utilisation;
use num_bigint::BigInt;
use std::collections::BTreeSet;

const KIND: &str = "Ipv6 address";

/// IPv6 address strategy
#[derive(Debug, Clone)]
pub struct Ipv6Strategy {
    root: Ipv6Prefix,
    subnet: bool,
    allocated: BTreeSet<BigInt>,
    user_input: PropertyBag,
}

impl Ipv6Strategy {
    pub fn new(context: StrategyContext) -> Result<Self> {
        let address = aton(context.pool.text("address", POOL)?)?;
        let prefix = check_prefix(context.pool.int("prefix", POOL)?)?;
        let root = Ipv6Prefix::new(&address, prefix)?;

        let allocated = context
            .allocated()
            .map(|resource| aton(resource.text("address", RESOURCE)?))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self {
            root,
            subnet: context.pool.flag("subnet") || context.user_input.flag("subnet"),
            allocated,
            user_input: context.user_input,
        })
    }

    /// Half-open range of addresses that may be handed out
    fn bounds(&self) -> (BigInt, BigInt) {
        if self.subnet && self.root.prefix() < 127 {
            (self.root.network() + 1u32, self.root.end() - 1u32)
        } else {
            (self.root.network(), self.root.end())
        }
    }

    fn allocate_desired(&self, desired: &str) -> Result<PropertyBag> {
        let value = aton(desired)?;
        let (first, end) = self.bounds();
        if value < first || value >= end {
            log::warn!("Requested address {} lies outside {}", desired, self.root);
            return Err(AllocationError::OutOfRange {
                kind: KIND,
                value: desired.to_string(),
                range: self.root.to_string(),
            });
        }
        if self.allocated.contains(&value) {
            log::warn!("Requested address {} is already allocated", desired);
            return Err(AllocationError::AlreadyClaimed {
                kind: KIND,
                value: desired.to_string(),
            });
        }
        self.result(&value)
    }

    fn result(&self, value: &BigInt) -> Result<PropertyBag> {
        let address = ntoa(value)?;
        log::info!("Allocated Ipv6 address {} from {}", address, self.root);
        let mut result = PropertyBag::new();
        result.insert("address".to_string(), PropertyValue::Text(address));
        Ok(result)
    }
}

impl AllocationStrategy for Ipv6Strategy {
    fn allocate(&self) -> Result<PropertyBag> {
        let (first, end) = self.bounds();
        log::debug!("Allocating Ipv6 address from {} (subnet: {})", self.root, self.subnet);

        if self.user_input.contains_key("desiredValue") {
            return self.allocate_desired(self.user_input.text("desiredValue", USER_INPUT)?);
        }

        match first_free(first.clone(), &(&end - 1u32), &self.allocated) {
            Some(value) => self.result(&value),
            None => {
                log::error!("Unable to allocate Ipv6 address from {}", self.root);
                Utilisation::new(&(end - first), &BigInt::from(self.allocated.len())).log(log::Level::Error);
                Err(AllocationError::Exhausted {
                    kind: KIND,
                    pool: self.root.to_string(),
                    request: "a new address".to_string(),
                    allocated: join_allocated(
                        self.allocated
                            .iter()
                            .map(|value| ntoa(value).unwrap_or_else(|_| value.to_string())),
                    ),
                })
            }
        }
    }

    fn capacity(&self) -> Result<CapacityReport> {
        let (first, end) = self.bounds();
        let utilized = BigInt::from(self.allocated.len());
        Ok(CapacityReport::new(end - first - &utilized, utilized))
    }
}
