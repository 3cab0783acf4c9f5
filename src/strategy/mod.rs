//! Allocation strategies.
//!
//! Each strategy is built from a [`StrategyContext`] (pool properties,
//! currently allocated resources, user input) and answers two questions:
//! what to hand out next ([`AllocationStrategy::allocate`]) and how much
//! room is left ([`AllocationStrategy::capacity`]). Strategies hold no state
//! across calls; the caller supplies a consistent snapshot every time.

pub mod ipv4;
pub mod ipv4_prefix;
pub mod ipv6;
pub mod ipv6_prefix;
pub mod random_int32;
pub mod route_distinguisher;
pub mod unique_id;
pub mod vlan;
pub mod vlan_range;

pub use ipv4::Ipv4Strategy;
pub use ipv4_prefix::Ipv4PrefixStrategy;
pub use ipv6::Ipv6Strategy;
pub use ipv6_prefix::Ipv6PrefixStrategy;
pub use random_int32::RandomInt32Strategy;
pub use route_distinguisher::RouteDistinguisherStrategy;
pub use unique_id::UniqueIdStrategy;
pub use vlan::VlanStrategy;
pub use vlan_range::VlanRangeStrategy;

use crate::error::{AllocationError, Result};
use crate::props::{AllocatedResource, PropertyBag};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Scope names used in missing-property errors
pub(crate) const POOL: &str = "pool properties";
pub(crate) const RESOURCE: &str = "allocated resource";
pub(crate) const USER_INPUT: &str = "user input";

/// Inputs for a single strategy invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyContext {
    pub pool: PropertyBag,
    pub resources: Vec<AllocatedResource>,
    pub user_input: PropertyBag,
}

impl StrategyContext {
    pub fn new(pool: PropertyBag, resources: Vec<AllocatedResource>, user_input: PropertyBag) -> Self {
        Self {
            pool,
            resources,
            user_input,
        }
    }

    /// Property bags of every allocated resource
    pub fn allocated(&self) -> impl Iterator<Item = &PropertyBag> {
        self.resources.iter().map(|resource| &resource.properties)
    }
}

/// Free / utilized capacity of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityReport {
    #[serde(serialize_with = "as_decimal")]
    pub free_capacity: BigInt,
    #[serde(serialize_with = "as_decimal")]
    pub utilized_capacity: BigInt,
}

impl CapacityReport {
    /// Build a report; a negative free capacity is clamped to zero
    pub fn new(free: impl Into<BigInt>, utilized: impl Into<BigInt>) -> Self {
        let mut free_capacity = free.into();
        if free_capacity.is_negative() {
            free_capacity = BigInt::zero();
        }
        Self {
            free_capacity,
            utilized_capacity: utilized.into(),
        }
    }
}

fn as_decimal<S: Serializer>(value: &BigInt, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Operations every strategy provides
pub trait AllocationStrategy {
    /// Claim the next resource, returning its property bag
    fn allocate(&self) -> Result<PropertyBag>;

    /// Report free and utilized capacity of the pool
    fn capacity(&self) -> Result<CapacityReport>;
}

/// Built-in strategies, by platform name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Ipv4,
    Ipv4Prefix,
    Ipv6,
    Ipv6Prefix,
    Vlan,
    VlanRange,
    UniqueId,
    RandomSignedInt32,
    RouteDistinguisher,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 9] = [
        StrategyKind::Ipv4,
        StrategyKind::Ipv4Prefix,
        StrategyKind::Ipv6,
        StrategyKind::Ipv6Prefix,
        StrategyKind::Vlan,
        StrategyKind::VlanRange,
        StrategyKind::UniqueId,
        StrategyKind::RandomSignedInt32,
        StrategyKind::RouteDistinguisher,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Ipv4 => "ipv4",
            StrategyKind::Ipv4Prefix => "ipv4_prefix",
            StrategyKind::Ipv6 => "ipv6",
            StrategyKind::Ipv6Prefix => "ipv6_prefix",
            StrategyKind::Vlan => "vlan",
            StrategyKind::VlanRange => "vlan_range",
            StrategyKind::UniqueId => "unique_id",
            StrategyKind::RandomSignedInt32 => "random_signed_int32",
            StrategyKind::RouteDistinguisher => "route_distinguisher",
        }
    }

    /// Construct the strategy over a per-call context
    pub fn build(self, context: StrategyContext) -> Result<Box<dyn AllocationStrategy>> {
        log::debug!(
            "Building {} strategy over {} allocated resources",
            self,
            context.resources.len()
        );
        Ok(match self {
            StrategyKind::Ipv4 => Box::new(Ipv4Strategy::new(context)?),
            StrategyKind::Ipv4Prefix => Box::new(Ipv4PrefixStrategy::new(context)?),
            StrategyKind::Ipv6 => Box::new(Ipv6Strategy::new(context)?),
            StrategyKind::Ipv6Prefix => Box::new(Ipv6PrefixStrategy::new(context)?),
            StrategyKind::Vlan => Box::new(VlanStrategy::new(context)?),
            StrategyKind::VlanRange => Box::new(VlanRangeStrategy::new(context)?),
            StrategyKind::UniqueId => Box::new(UniqueIdStrategy::new(context)?),
            StrategyKind::RandomSignedInt32 => Box::new(RandomInt32Strategy::new(context)?),
            StrategyKind::RouteDistinguisher => Box::new(RouteDistinguisherStrategy::new(context)),
        })
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| AllocationError::UnknownStrategy(s.to_string()))
    }
}

/// Render allocated values for an exhaustion message
pub(crate) fn join_allocated<I, T>(values: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    values
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
