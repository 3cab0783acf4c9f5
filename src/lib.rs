//! # Netalloc - allocation strategies for network resource pools
//!
//! This library decides which resource to hand out next from a pool, given
//! the pool's properties and everything already allocated from it.
//!
//! ## Overview
//!
//! Every call is a pure function of its inputs: the caller supplies the pool
//! properties, the current allocations and the user input, and gets back the
//! property bag of the new resource (or a capacity report). Nothing is kept
//! between calls, so the caller is responsible for persisting results.
//!
//! ## Supported Pools
//!
//! - **IPv4 / IPv6 addresses**: lowest free address in a subnet or range
//! - **IPv4 / IPv6 prefixes**: aligned, first-fit CIDR blocks of a requested size
//! - **VLANs and VLAN ranges**: single ids or contiguous runs within `from..=to`
//! - **Unique ids**: formatted counters such as `VPN-4-Network19`
//! - **Random s_int32**: random values avoiding those already handed out
//! - **Route distinguishers**: validated type 0/1/2 BGP RDs
//!
//! ## Architecture
//!
//! - `props`: property bags and value coercion
//! - `strategy`: the strategies and the name-keyed registry
//! - `request`: request documents loaded from JSON or YAML
//! - `utils`: address arithmetic, interval search, utilisation logging
//! - `error`: the shared error type
//!
//! ## Example Usage
//!
//! ```rust
//! use netalloc::props;
//! use netalloc::props::AllocatedResource;
//! use netalloc::strategy::{StrategyContext, StrategyKind};
//!
//! let context = StrategyContext::new(
//!     props! { "address" => "192.168.1.0", "prefix" => 24, "subnet" => false },
//!     vec![AllocatedResource::new(props! { "address" => "192.168.1.16", "prefix" => 28 })],
//!     props! { "desiredSize" => 10 },
//! );
//!
//! let strategy = StrategyKind::Ipv4Prefix.build(context)?;
//! let prefix = strategy.allocate()?;
//! assert_eq!(prefix, props! { "address" => "192.168.1.0", "prefix" => 28, "subnet" => false });
//! # Ok::<(), netalloc::error::AllocationError>(())
//! ```

pub mod error;
pub mod props;
pub mod request;
pub mod strategy;
pub mod utils;

pub use error::{AllocationError, Result};
pub use props::{AllocatedResource, PropertyBag, PropertyValue};
pub use request::{load_request, AllocationRequest};
pub use strategy::{AllocationStrategy, CapacityReport, StrategyContext, StrategyKind};
