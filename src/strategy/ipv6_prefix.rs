//! IPv6 prefix (subnet) allocation over the 128-bit space.
//!
//! Whether blocks are subnets is a property of the pool alone.

use super::{join_allocated, AllocationStrategy, CapacityReport, StrategyContext, POOL, RESOURCE, USER_INPUT};
use crate::error::{AllocationError, Result};
use crate::props::{PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::interval::{find_overlap, first_fit, next_free_after, Block};
use crate::utils::ipv6::{addresses_in_mask, aton, check_prefix, hosts_in_mask, ntoa, prefix_for_size, Ipv6Prefix};
use crate::utils::stats::Utilisation;
use num_bigint::BigInt;
use num_traits::Zero;

const KIND: &str = "Ipv6 prefix";

fn block_of(prefix: &Ipv6Prefix) -> Block<BigInt> {
    Block::new(prefix.network(), prefix.size())
}

/// IPv6 prefix strategy
#[derive(Debug, Clone)]
pub struct Ipv6PrefixStrategy {
    root: Ipv6Prefix,
    subnet: bool,
    /// Allocated prefixes, stable-sorted by end address
    allocated: Vec<Ipv6Prefix>,
    user_input: PropertyBag,
}

impl Ipv6PrefixStrategy {
    pub fn new(context: StrategyContext) -> Result<Self> {
        let address = aton(context.pool.text("address", POOL)?)?;
        let prefix = check_prefix(context.pool.int("prefix", POOL)?)?;
        let root = Ipv6Prefix::new(&address, prefix)?;

        let mut allocated = context
            .allocated()
            .map(|resource| {
                let address = aton(resource.text("address", RESOURCE)?)?;
                let prefix = check_prefix(resource.int("prefix", RESOURCE)?)?;
                Ipv6Prefix::new(&address, prefix)
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

    fn blocks(&self) -> Vec<Block<BigInt>> {
        self.allocated.iter().map(block_of).collect()
    }

    /// Addresses the pool can hand out: hosts of a subnet pool (none for a
    /// /127 or /128 subnet), every address of a flat pool
    pub fn total_capacity(&self) -> BigInt {
        match (self.subnet, self.root.prefix()) {
            (true, prefix) if prefix >= 127 => BigInt::zero(),
            (true, prefix) => hosts_in_mask(prefix),
            (false, _) => self.root.size(),
        }
    }

    pub fn utilized_capacity(&self) -> BigInt {
        self.allocated.iter().map(Ipv6Prefix::size).sum()
    }

    pub fn free_capacity(&self) -> BigInt {
        let free = self.total_capacity() - self.utilized_capacity();
        if free < BigInt::zero() {
            BigInt::zero()
        } else {
            free
        }
    }

    /// Requested size and the block size it needs
    fn desired_size(&self) -> Result<(BigInt, BigInt)> {
        let desired = self.user_input.big("desiredSize", USER_INPUT)?;
        if desired < BigInt::from(2) {
            return Err(AllocationError::InvalidValue(format!(
                "Unable to allocate {} from: {}. Desired size is invalid: {}. Use values >= 2",
                KIND, self.root, desired
            )));
        }
        let size = if self.subnet { &desired + 2 } else { desired.clone() };
        Ok((desired, size))
    }

    fn exhausted(&self, size: &BigInt) -> AllocationError {
        log::error!("Unable to allocate {} of size {} from {}", KIND, size, self.root);
        Utilisation::new(&self.total_capacity(), &self.utilized_capacity()).log(log::Level::Error);
        AllocationError::Exhausted {
            kind: KIND,
            pool: self.root.to_string(),
            request: format!("a new prefix of size: {}", size),
            allocated: join_allocated(self.allocated.iter().map(Ipv6Prefix::range_string)),
        }
    }

    fn allocate_desired(&self, desired: &str, mask: u32, block_size: &BigInt) -> Result<BigInt> {
        let address = aton(desired)?;
        let network = Ipv6Prefix::new(&address, mask)?.network();
        if network != address {
            let expected = next_free_after(&network, &self.blocks(), block_size, block_size);
            log::warn!("Requested prefix {}/{} is not a network address", desired, mask);
            return Err(AllocationError::InvalidNetworkAddress {
                expected: ntoa(&expected)?,
            });
        }

        let candidate = Block::new(address, block_size.clone());
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

impl AllocationStrategy for Ipv6PrefixStrategy {
    fn allocate(&self) -> Result<PropertyBag> {
        let (requested, size) = self.desired_size()?;
        let mask = prefix_for_size(&size).ok_or_else(|| self.exhausted(&requested))?;
        if self.subnet && mask >= 127 {
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
            self.allocate_desired(self.user_input.text("desiredValue", USER_INPUT)?, mask, &block_size)?
        } else {
            first_fit(&block_of(&self.root), &self.blocks(), &block_size, &block_size)
                .ok_or_else(|| self.exhausted(&requested))?
        };

        let address = ntoa(&start)?;
        log::info!("Allocated {} {}/{} from {}", KIND, address, mask, self.root);
        Utilisation::new(&self.total_capacity(), &(self.utilized_capacity() + &block_size)).log(log::Level::Debug);

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
