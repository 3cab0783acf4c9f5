//! Shared helpers: address arithmetic, interval search, utilisation reporting.

pub mod interval;
pub mod ipv4;
pub mod ipv6;
pub mod stats;

pub use interval::{find_overlap, first_fit, first_free, next_free_after, sort_by_end, Block};
pub use ipv4::{parse_ipv4_prefix, Ipv4Prefix};
pub use ipv6::{parse_ipv6_prefix, Ipv6Prefix};
pub use stats::Utilisation;
