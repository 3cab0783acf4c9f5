//! IPv6 address arithmetic over arbitrary-precision integers.
//!
//! Addresses are carried as [`BigInt`] so block arithmetic near the top of
//! the 128-bit space (`start + size` of the last block) never overflows.

use crate::error::{AllocationError, Result};
use ipnet::Ipv6Net;
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Address width in bits
pub const IPV6_BITS: u32 = 128;

const GROUPS: usize = 8;

/// Convert colon-hex notation (with optional `::` elision) into its integer value.
pub fn aton(address: &str) -> Result<BigInt> {
    let parsed: Ipv6Addr = address
        .parse()
        .map_err(|_| AllocationError::InvalidIpv6(address.to_string()))?;
    Ok(BigInt::from(u128::from(parsed)))
}

/// Render an integer as a canonical IPv6 string.
///
/// The longest run of two or more zero groups collapses to `::`; the
/// leftmost run wins a tie.
pub fn ntoa(value: &BigInt) -> Result<String> {
    Ok(compress(to_u128(value)?))
}

fn to_u128(value: &BigInt) -> Result<u128> {
    value
        .to_u128()
        .filter(|_| !value.is_negative())
        .ok_or_else(|| AllocationError::InvalidIpv6(value.to_string()))
}

fn compress(raw: u128) -> String {
    let groups: Vec<u16> = (0..GROUPS)
        .map(|i| ((raw >> (16 * (GROUPS - 1 - i))) & 0xffff) as u16)
        .collect();

    let mut best: Option<(usize, usize)> = None;
    let mut run_start: Option<usize> = None;
    for i in 0..=GROUPS {
        let is_zero = i < GROUPS && groups[i] == 0;
        match (is_zero, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                let len = i - start;
                if len >= 2 && best.map_or(true, |(_, best_len)| len > best_len) {
                    best = Some((start, len));
                }
                run_start = None;
            }
            _ => {}
        }
    }

    let hex = |slice: &[u16]| {
        slice
            .iter()
            .map(|g| format!("{:x}", g))
            .collect::<Vec<_>>()
            .join(":")
    };

    match best {
        Some((start, len)) => format!("{}::{}", hex(&groups[..start]), hex(&groups[start + len..])),
        None => hex(&groups),
    }
}

/// Number of addresses covered by a mask, `2^(128 - prefix)`
pub fn addresses_in_mask(prefix: u32) -> BigInt {
    BigInt::one() << (IPV6_BITS - prefix.min(IPV6_BITS))
}

/// Usable hosts behind a mask: network and broadcast are excluded except for /127 and /128
pub fn hosts_in_mask(prefix: u32) -> BigInt {
    match prefix {
        128 => BigInt::one(),
        127 => BigInt::from(2),
        p => addresses_in_mask(p) - 2,
    }
}

/// The longest mask whose block holds at least `size` addresses,
/// or `None` when the block would not fit in the address space.
pub fn prefix_for_size(size: &BigInt) -> Option<u32> {
    let bits = if *size <= BigInt::one() {
        0
    } else {
        (size - 1u32).bits()
    };
    u32::try_from(bits).ok().and_then(|b| IPV6_BITS.checked_sub(b))
}

/// Validate a mask coming from user data
pub fn check_prefix(prefix: i64) -> Result<u32> {
    u32::try_from(prefix)
        .ok()
        .filter(|p| *p <= IPV6_BITS)
        .ok_or_else(|| invalid_mask(prefix))
}

fn invalid_mask(prefix: impl fmt::Display) -> AllocationError {
    AllocationError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: format!("mask must be between 0 and {}", IPV6_BITS),
    }
}

/// An IPv6 network in CIDR form with host bits cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Prefix {
    net: Ipv6Net,
}

impl Ipv6Prefix {
    /// Build a prefix, clearing any host bits set in `address`
    pub fn new(address: &BigInt, prefix: u32) -> Result<Self> {
        let address = Ipv6Addr::from(to_u128(address)?);
        let len = u8::try_from(prefix).map_err(|_| invalid_mask(prefix))?;
        let net = Ipv6Net::new(address, len).map_err(|_| invalid_mask(prefix))?;
        Ok(Self { net: net.trunc() })
    }

    pub fn net(&self) -> Ipv6Net {
        self.net
    }

    /// Mask length
    pub fn prefix(&self) -> u32 {
        u32::from(self.net.prefix_len())
    }

    /// Network address as an integer
    pub fn network(&self) -> BigInt {
        BigInt::from(u128::from(self.net.network()))
    }

    pub fn size(&self) -> BigInt {
        addresses_in_mask(self.prefix())
    }

    /// One past the last address
    pub fn end(&self) -> BigInt {
        self.network() + self.size()
    }

    /// `address/prefix[first-last]`
    pub fn range_string(&self) -> String {
        format!(
            "{}[{}-{}]",
            self,
            compress(u128::from(self.net.network())),
            compress(u128::from(self.net.broadcast()))
        )
    }
}

impl From<Ipv6Net> for Ipv6Prefix {
    fn from(net: Ipv6Net) -> Self {
        Self { net: net.trunc() }
    }
}

impl fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", compress(u128::from(self.net.network())), self.net.prefix_len())
    }
}

impl FromStr for Ipv6Prefix {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self> {
        parse_ipv6_prefix(s)
    }
}

/// Parse `x::y/m` into a normalized network; mask 0 yields `::/0`
pub fn parse_ipv6_prefix(cidr: &str) -> Result<Ipv6Prefix> {
    cidr.trim()
        .parse::<Ipv6Net>()
        .map(Ipv6Prefix::from)
        .map_err(|err| AllocationError::InvalidPrefix {
            prefix: cidr.to_string(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    const DEAD_BEEF: &str = "295986882420777848964380943247191621359";

    #[test]
    fn test_aton_ntoa() {
        let value = aton("dead::beef").unwrap();
        assert_eq!(value.to_string(), DEAD_BEEF);
        assert_eq!(ntoa(&value).unwrap(), "dead::beef");

        assert_eq!(ntoa(&BigInt::zero()).unwrap(), "::");
        assert_eq!(ntoa(&BigInt::one()).unwrap(), "::1");
        assert_eq!(aton("::").unwrap(), BigInt::zero());
        assert_eq!(ntoa(&aton("abcd:ef01:2345:6789::").unwrap()).unwrap(), "abcd:ef01:2345:6789::");
    }

    #[test]
    fn test_ntoa_canonical_collapse() {
        // leftmost of two equally long runs
        assert_eq!(ntoa(&aton("1:0:0:2:0:0:3:4").unwrap()).unwrap(), "1::2:0:0:3:4");
        // longest run wins
        assert_eq!(ntoa(&aton("1:0:2:0:0:0:3:4").unwrap()).unwrap(), "1:0:2::3:4");
        // a single zero group is not collapsed
        assert_eq!(ntoa(&aton("1:2:3:4:5:6:0:8").unwrap()).unwrap(), "1:2:3:4:5:6:0:8");
        assert_eq!(ntoa(&aton("DEAD:0000:0000::00BE:0001").unwrap()).unwrap(), "dead::be:1");
    }

    #[test]
    fn test_rejects_invalid() {
        assert_eq!(
            aton("dead::beef::1"),
            Err(AllocationError::InvalidIpv6("dead::beef::1".to_string()))
        );
        assert!(aton("12345::").is_err());
        assert!(aton("xyz::").is_err());
        assert!(ntoa(&BigInt::from(-1)).is_err());
        assert!(ntoa(&(BigInt::one() << 128)).is_err());
        assert_eq!(
            AllocationError::InvalidIpv6("x".to_string()).to_string(),
            "Address: x is invalid ipv6 address."
        );
    }

    #[test]
    fn test_mask_math() {
        assert_eq!(addresses_in_mask(120), BigInt::from(256));
        assert_eq!(addresses_in_mask(0), BigInt::one() << 128);
        assert_eq!(hosts_in_mask(120), BigInt::from(254));
        assert_eq!(hosts_in_mask(127), BigInt::from(2));
        assert_eq!(hosts_in_mask(128), BigInt::one());

        assert_eq!(prefix_for_size(&BigInt::from(2)), Some(127));
        assert_eq!(prefix_for_size(&BigInt::from(1)), Some(128));
        assert_eq!(prefix_for_size(&BigInt::from(655_360)), Some(108));
        assert_eq!(prefix_for_size(&(BigInt::one() << 128)), Some(0));
        assert_eq!(prefix_for_size(&((BigInt::one() << 128) + 1)), None);
    }

    #[test]
    fn test_parse_prefix() {
        let prefix = parse_ipv6_prefix("dead::beef/120").unwrap();
        assert_eq!(prefix.to_string(), "dead::be00/120");
        assert_eq!(prefix.range_string(), "dead::be00/120[dead::be00-dead::beff]");
        assert_eq!(parse_ipv6_prefix("beef::1/0").unwrap().to_string(), "::/0");
        assert!(parse_ipv6_prefix("beef::/129").is_err());
        assert!(parse_ipv6_prefix("beef::").is_err());
        assert!("nope/64".parse::<Ipv6Prefix>().is_err());

        let prefix = Ipv6Prefix::new(&aton("dead::beef").unwrap(), 112).unwrap();
        assert_eq!(prefix.network(), aton("dead::").unwrap());
        assert_eq!(prefix.end(), aton("dead::1:0").unwrap());
        assert!(Ipv6Prefix::new(&(BigInt::one() << 128), 64).is_err());
        assert!(Ipv6Prefix::new(&BigInt::one(), 129).is_err());
    }
}
