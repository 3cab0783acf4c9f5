//! Single IPv4 address allocation.
//!
//! Hands out the lowest free address of the pool prefix. When the pool (or
//! the request) is marked as a routed subnet, the network and broadcast
//! addresses are never handed out.

use super::{join_allocated, AllocationStrategy, CapacityReport, StrategyContext, POOL, RESOURCE, USER_INPUT};
use crate::error::{AllocationError, Result};
use crate::props::{PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::interval::first_free;
use crate::utils::ipv4::{aton, check_prefix, ntoa, Ipv4Prefix};
use crate::utils::stats::Utilisation;
use num_bigint::BigInt;
use std::collections::BTreeSet;

const KIND: &str = "Ipv4 address";

/// IPv4 address strategy
#[derive(Debug, Clone)]
pub struct Ipv4Strategy {
    root: Ipv4Prefix,
    subnet: bool,
    allocated: BTreeSet<u64>,
    user_input: PropertyBag,
}

impl Ipv4Strategy {
    pub fn new(context: StrategyContext) -> Result<Self> {
        let address = aton(context.pool.text("address", POOL)?)?;
        let prefix = check_prefix(context.pool.int("prefix", POOL)?)?;
        let root = Ipv4Prefix::new(address, prefix)?;

        let allocated = context
            .allocated()
            .map(|resource| aton(resource.text("address", RESOURCE)?).map(u64::from))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self {
            root,
            subnet: context.pool.flag("subnet") || context.user_input.flag("subnet"),
            allocated,
            user_input: context.user_input,
        })
    }

    /// Half-open range of addresses that may be handed out
    fn bounds(&self) -> (u64, u64) {
        // /31 and /32 have no network or broadcast address to reserve
        if self.subnet && self.root.prefix() < 31 {
            (self.root.start() + 1, self.root.end() - 1)
        } else {
            (self.root.start(), self.root.end())
        }
    }

    fn allocate_desired(&self, desired: &str) -> Result<PropertyBag> {
        let value = u64::from(aton(desired)?);
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
        Ok(self.result(value))
    }

    fn result(&self, value: u64) -> PropertyBag {
        let address = ntoa(u32::try_from(value).unwrap_or(u32::MAX));
        log::info!("Allocated Ipv4 address {} from {}", address, self.root);
        let mut result = PropertyBag::new();
        result.insert("address".to_string(), PropertyValue::Text(address));
        result
    }

    fn utilisation(&self) -> Utilisation {
        let (first, end) = self.bounds();
        Utilisation::new(&BigInt::from(end - first), &BigInt::from(self.allocated.len()))
    }
}

impl AllocationStrategy for Ipv4Strategy {
    fn allocate(&self) -> Result<PropertyBag> {
        let (first, end) = self.bounds();
        log::debug!(
            "Allocating Ipv4 address from {} (subnet: {}, bounds {}..{})",
            self.root,
            self.subnet,
            first,
            end
        );

        if self.user_input.contains_key("desiredValue") {
            return self.allocate_desired(self.user_input.text("desiredValue", USER_INPUT)?);
        }

        match first_free(first, &(end - 1), &self.allocated) {
            Some(value) => Ok(self.result(value)),
            None => {
                log::error!("Unable to allocate Ipv4 address from {}", self.root);
                self.utilisation().log(log::Level::Error);
                Err(AllocationError::Exhausted {
                    kind: KIND,
                    pool: self.root.to_string(),
                    request: "a new address".to_string(),
                    allocated: join_allocated(
                        self.allocated
                            .iter()
                            .map(|value| ntoa(u32::try_from(*value).unwrap_or(u32::MAX))),
                    ),
                })
            }
        }
    }

    fn capacity(&self) -> Result<CapacityReport> {
        let (first, end) = self.bounds();
        let utilized = self.allocated.len() as u64;
        Ok(CapacityReport::new(
            BigInt::from(end - first) - BigInt::from(utilized),
            utilized,
        ))
    }
}
