//! IPv4 address arithmetic on fixed-width integers.

use crate::error::{AllocationError, Result};
use ipnet::Ipv4Net;
use regex::Regex;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::LazyLock;

/// Address width in bits
pub const IPV4_BITS: u32 = 32;

/// Structural match for a dotted-quad address
pub const IPV4_PATTERN: &str = r"^([0-9]{1,3})\.([0-9]{1,3})\.([0-9]{1,3})\.([0-9]{1,3})$";

static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(IPV4_PATTERN).unwrap());

/// Convert a dotted-quad address into its 32-bit value.
pub fn aton(address: &str) -> Result<u32> {
    let captures = IPV4_RE
        .captures(address)
        .ok_or_else(|| AllocationError::Ipv4Format {
            address: address.to_string(),
            pattern: IPV4_PATTERN,
        })?;

    let mut value: u32 = 0;
    for group in 1..=4 {
        let octet: u32 = captures[group]
            .parse()
            .map_err(|_| AllocationError::Ipv4Range(address.to_string()))?;
        if octet > 255 {
            return Err(AllocationError::Ipv4Range(address.to_string()));
        }
        value = (value << 8) | octet;
    }
    Ok(value)
}

/// Render a 32-bit value as a dotted-quad address.
pub fn ntoa(value: u32) -> String {
    Ipv4Addr::from(value).to_string()
}

/// Number of addresses covered by a mask, `2^(32 - prefix)`
pub fn addresses_in_mask(prefix: u32) -> u64 {
    1u64 << (IPV4_BITS - prefix.min(IPV4_BITS))
}

/// Usable hosts behind a mask: network and broadcast are excluded except for /31 and /32
pub fn hosts_in_mask(prefix: u32) -> u64 {
    match prefix {
        32 => 1,
        31 => 2,
        p => addresses_in_mask(p) - 2,
    }
}

/// Smallest `k` such that `2^k >= n`
pub fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        u64::BITS - (n - 1).leading_zeros()
    }
}

/// The longest mask whose block holds at least `size` addresses,
/// or `None` when the block would not fit in the address space.
pub fn prefix_for_size(size: u64) -> Option<u32> {
    IPV4_BITS.checked_sub(ceil_log2(size))
}

/// Validate a mask coming from user data
pub fn check_prefix(prefix: i64) -> Result<u32> {
    u32::try_from(prefix)
        .ok()
        .filter(|p| *p <= IPV4_BITS)
        .ok_or_else(|| invalid_mask(prefix))
}

fn invalid_mask(prefix: impl fmt::Display) -> AllocationError {
    AllocationError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: format!("mask must be between 0 and {}", IPV4_BITS),
    }
}

/// An IPv4 network in CIDR form with host bits cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Prefix {
    net: Ipv4Net,
}

impl Ipv4Prefix {
    /// Build a prefix, clearing any host bits set in `address`
    pub fn new(address: u32, prefix: u32) -> Result<Self> {
        let len = u8::try_from(prefix).map_err(|_| invalid_mask(prefix))?;
        let net = Ipv4Net::new(Ipv4Addr::from(address), len).map_err(|_| invalid_mask(prefix))?;
        Ok(Self { net: net.trunc() })
    }

    pub fn net(&self) -> Ipv4Net {
        self.net
    }

    /// Mask length
    pub fn prefix(&self) -> u32 {
        u32::from(self.net.prefix_len())
    }

    /// Network address as an integer
    pub fn network(&self) -> u32 {
        u32::from(self.net.network())
    }

    pub fn size(&self) -> u64 {
        addresses_in_mask(self.prefix())
    }

    pub fn start(&self) -> u64 {
        u64::from(self.network())
    }

    /// One past the last address
    pub fn end(&self) -> u64 {
        self.start() + self.size()
    }

    /// `address/prefix[first-last]`
    pub fn range_string(&self) -> String {
        format!("{}[{}-{}]", self, self.net.network(), self.net.broadcast())
    }
}

impl From<Ipv4Net> for Ipv4Prefix {
    fn from(net: Ipv4Net) -> Self {
        Self { net: net.trunc() }
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.net.network(), self.net.prefix_len())
    }
}

impl FromStr for Ipv4Prefix {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self> {
        parse_ipv4_prefix(s)
    }
}

/// Parse `a.b.c.d/m` into a normalized network
pub fn parse_ipv4_prefix(cidr: &str) -> Result<Ipv4Prefix> {
    cidr.trim()
        .parse::<Ipv4Net>()
        .map(Ipv4Prefix::from)
        .map_err(|err| AllocationError::InvalidPrefix {
            prefix: cidr.to_string(),
            reason: err.to_string(),
        })
}
