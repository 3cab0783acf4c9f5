//! IPv4 prefix (subnet) allocation.
//!
//! Carves the smallest aligned block that holds `desiredSize` addresses out
//! of the pool prefix, first-fit by address. Every address of the pool is
//! usable; in a `subnet` pool every block reserves room for its own network
//! and broadcast addresses by growing by two. Only the pool decides whether
//! it is a subnet.

use super::{join_allocated, AllocationStrategy, CapacityReport, StrategyContext, POOL, RESOURCE, USER_INPUT};
use crate::error::{AllocationError, Result};
use crate::props::{PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::interval::{find_overlap, first_fit, next_free_after, Block};
use crate::utils::ipv4::{addresses_in_mask, aton, check_prefix, hosts_in_mask, ntoa, prefix_for_size, Ipv4Prefix};
use crate::utils::stats::Utilisation;
use num_bigint::BigInt;

const KIND: &str = "Ipv4 prefix";

fn block_of(prefix: &Ipv4Prefix) -> Block<u64> {
    Block::new(prefix.start(), prefix.size())
}

fn to_address(value: u64) -> String {
    ntoa(u32::try_from(value).unwrap_or(u32::MAX))
}

/// IPv4 prefix strategy
#[derive(Debug, Clone)]
pub struct Ipv4PrefixStrategy {
    root: Ipv4Prefix,
    subnet: bool,
    /// Allocated prefixes, stable-sorted by end address
    allocated: Vec<Ipv4Prefix>,
    user_input: PropertyBag,
}

impl Ipv4PrefixStrategy {
    pub fn new(context: StrategyContext) -> Result<Self> {
        let address = aton(context.pool.text("address", POOL)?)?;
        let prefix = check_prefix(context.pool.int("prefix", POOL)?)?;
        let root = Ipv4Prefix::new(address, prefix)?;

        let mut allocated = context
            .allocated()
            .map(|resource| {
                let address = aton(resource.text("address", RESOURCE)?)?;
                let prefix = check_prefix(resource.int("prefix", RESOURCE)?)?;
                Ipv4Prefix::new(address, prefix)
            })
            .collect::<Result<Vec<_>>>()?;
        allocated.sort_by_key(|prefix| prefix.end());

        Ok(Self {
            root,
            subnet: context.pool.flag("subnet"),
            allocated,
            user_input: context.user_input,
        })
    }

    fn blocks(&self) -> Vec<Block<u64>> {
        self.allocated.iter().map(block_of).collect()
    }

    /// Addresses the pool can hand out: hosts of a subnet pool (none for a
    /// /31 or /32 subnet), every address of a flat pool
    pub fn total_capacity(&self) -> u64 {
        match (self.subnet, self.root.prefix()) {
            (true, prefix) if prefix >= 31 => 0,
            (true, prefix) => hosts_in_mask(prefix),
            (false, _) => self.root.size(),
        }
    }

    /// Addresses covered by allocated prefixes, network and broadcast included
    pub fn utilized_capacity(&self) -> u64 {
        self.allocated.iter().map(Ipv4Prefix::size).sum()
    }

    pub fn free_capacity(&self) -> u64 {
        self.total_capacity().saturating_sub(self.utilized_capacity())
    }

    /// Requested size and the block size it needs
    fn desired_size(&self) -> Result<(u64, u64)> {
        let desired = self.user_input.int("desiredSize", USER_INPUT)?;
        if desired < 2 {
            return Err(AllocationError::InvalidValue(format!(
                "Unable to allocate {} from: {}. Desired size is invalid: {}. Use values >= 2",
                KIND, self.root, desired
            )));
        }
        let desired = desired as u64;
        Ok((desired, if self.subnet { desired + 2 } else { desired }))
    }

    fn exhausted(&self, size: u64) -> AllocationError {
        log::error!("Unable to allocate {} of size {} from {}", KIND, size, self.root);
        Utilisation::new(
            &BigInt::from(self.total_capacity()),
            &BigInt::from(self.utilized_capacity()),
        )
        .log(log::Level::Error);
        AllocationError::Exhausted {
            kind: KIND,
            pool: self.root.to_string(),
            request: format!("a new prefix of size: {}", size),
            allocated: join_allocated(self.allocated.iter().map(Ipv4Prefix::range_string)),
        }
    }

    fn allocate_desired(&self, desired: &str, mask: u32, block_size: u64) -> Result<u64> {
        let address = aton(desired)?;
        let network = Ipv4Prefix::new(address, mask)?.start();
        if network != u64::from(address) {
            let expected = next_free_after(&network, &self.blocks(), &block_size, &block_size);
            log::warn!("Requested prefix {}/{} is not a network address", desired, mask);
            return Err(AllocationError::InvalidNetworkAddress {
                expected: to_address(expected),
            });
        }

        let candidate = Block::new(u64::from(address), block_size);
        if !block_of(&self.root).contains(&candidate) {
            log::warn!("Requested prefix {}/{} lies outside {}", desired, mask, self.root);
            return Err(AllocationError::OutOfRange {
                kind: KIND,
                value: format!("{}/{}", desired, mask),
                range: self.root.to_string(),
            });
        }

        if let Some(index) = find_overlap(&candidate, &self.blocks()) {
            log::warn!("Requested prefix {}/{} overlaps an allocated prefix", desired, mask);
            return Err(AllocationError::Overlap {
                kind: KIND,
                value: format!("{}/{}", desired, mask),
                existing: self.allocated[index].range_string(),
            });
        }
        Ok(candidate.start)
    }
}

impl AllocationStrategy for Ipv4PrefixStrategy {
    fn allocate(&self) -> Result<PropertyBag> {
        let (requested, size) = self.desired_size()?;
        let mask = prefix_for_size(size).ok_or_else(|| self.exhausted(requested))?;
        if self.subnet && mask >= 31 {
            return Err(AllocationError::InvalidValue(format!(
                "It is not possible to allocate resource with prefix {}, together with subnet set as true",
                mask
            )));
        }
        let block_size = addresses_in_mask(mask);
        log::debug!(
            "Allocating /{} ({} addresses) from {} (subnet: {})",
            mask,
            block_size,
            self.root,
            self.subnet
        );

        let start = if self.user_input.contains_key("desiredValue") {
            self.allocate_desired(self.user_input.text("desiredValue", USER_INPUT)?, mask, block_size)?
        } else {
            first_fit(&block_of(&self.root), &self.blocks(), &block_size, &block_size)
                .ok_or_else(|| self.exhausted(requested))?
        };

        let address = to_address(start);
        log::info!("Allocated {} {}/{} from {}", KIND, address, mask, self.root);
        Utilisation::new(
            &BigInt::from(self.total_capacity()),
            &BigInt::from(self.utilized_capacity() + block_size),
        )
        .log(log::Level::Debug);

        let mut result = PropertyBag::new();
        result.insert("address".to_string(), PropertyValue::Text(address));
        result.insert("prefix".to_string(), PropertyValue::from(mask));
        result.insert("subnet".to_string(), PropertyValue::Bool(self.subnet));
        Ok(result)
    }

    fn capacity(&self) -> Result<CapacityReport> {
        Ok(CapacityReport::new(self.free_capacity(), self.utilized_capacity()))
    }
}
