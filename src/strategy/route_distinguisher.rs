//! BGP route distinguisher validation and formatting.
//!
//! The caller supplies every part of the RD; the strategy only checks that
//! the combination is one of the three RD types and that the result has not
//! been handed out before:
//!
//! - type 0: 2-byte AS number + assigned number (up to 4 bytes) as `AS:N`
//! - type 1: IPv4 address + 2-byte assigned number as `A.B.C.D:N`
//! - type 2: 4-byte AS number + 2-byte assigned number as `AS:N`

use super::{AllocationStrategy, CapacityReport, StrategyContext, RESOURCE};
use crate::error::{AllocationError, Result};
use crate::props::{to_i64, PropertyAccess, PropertyBag, PropertyValue};
use crate::utils::ipv4;
use crate::utils::stats::Utilisation;
use num_bigint::BigInt;
use std::collections::BTreeSet;

const BYTE_2_MAX: i64 = 65_536;
const BYTE_4_MAX: i64 = 4_294_967_296;

/// Theoretical size of the 6-byte RD value space
fn rd_space() -> BigInt {
    BigInt::from(256).pow(6)
}

/// A number together with whether it fits in two bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RdNumber {
    value: i64,
    two_byte: bool,
}

/// Route distinguisher strategy
#[derive(Debug, Clone)]
pub struct RouteDistinguisherStrategy {
    allocated: BTreeSet<String>,
    allocated_count: usize,
    user_input: PropertyBag,
}

impl RouteDistinguisherStrategy {
    pub fn new(context: StrategyContext) -> Self {
        // Resources without an `rd` cannot collide with anything
        let allocated: BTreeSet<String> = context
            .allocated()
            .filter_map(|resource| resource.text("rd", RESOURCE).ok().map(str::to_string))
            .collect();

        Self {
            allocated,
            allocated_count: context.resources.len(),
            user_input: context.user_input,
        }
    }

    /// A supplied, non-empty, non-zero input value
    fn present(&self, key: &str) -> Option<&PropertyValue> {
        self.user_input.get(key).filter(|value| match value {
            PropertyValue::Text(s) => !s.is_empty(),
            PropertyValue::Int(0) | PropertyValue::Bool(false) => false,
            PropertyValue::Float(f) => *f != 0.0,
            _ => true,
        })
    }

    fn number(&self, key: &str, label: &str) -> Result<Option<RdNumber>> {
        let Some(raw) = self.present(key) else {
            return Ok(None);
        };
        let value = to_i64(raw)?;
        if value <= 0 || value >= BYTE_4_MAX {
            return Err(self.reject(format!(
                "Unable to allocate RD for {}: {}. Number is invalid",
                label, value
            )));
        }
        Ok(Some(RdNumber {
            value,
            two_byte: value < BYTE_2_MAX,
        }))
    }

    fn reject(&self, message: String) -> AllocationError {
        log::error!("{}", message);
        Utilisation::new(&rd_space(), &BigInt::from(self.allocated_count)).log(log::Level::Error);
        AllocationError::InvalidValue(message)
    }

    fn format_rd(&self) -> Result<String> {
        let assigned = self.number("assignedNumber", "assigned number")?;
        let as_number = self.number("asNumber", "AS number")?;

        let ip = match self.present("ipv4") {
            Some(PropertyValue::Text(address)) => {
                if ipv4::aton(address).is_err() {
                    return Err(self.reject(format!("Unable to allocate RD, invalid IPv4: {} provided", address)));
                }
                Some(address.clone())
            }
            Some(other) => {
                return Err(self.reject(format!("Unable to allocate RD, invalid IPv4: {} provided", other)));
            }
            None => None,
        };

        match (as_number, ip, assigned) {
            (Some(asn), Some(ip), _) => Err(self.reject(format!(
                "Unable to allocate RD, both AS: {} number and IPv4: {} provided",
                asn.value, ip
            ))),
            (Some(asn), None, Some(n)) if !asn.two_byte && !n.two_byte => Err(self.reject(format!(
                "Unable to allocate RD, 4 byte AS: {} and 4 byte assigned number: {} provided",
                asn.value, n.value
            ))),
            (None, Some(_), Some(n)) if !n.two_byte => Err(self.reject(format!(
                "Unable to allocate RD, 4 byte assigned number: {} provided with an IP address",
                n.value
            ))),
            // types 0 and 2
            (Some(asn), None, Some(n)) => Ok(format!("{}:{}", asn.value, n.value)),
            // type 1
            (None, Some(ip), Some(n)) => Ok(format!("{}:{}", ip, n.value)),
            _ => Err(self.reject(format!(
                "Unable to allocate RD, check the input parameters. User provided input: {}",
                serde_json::to_string(&self.user_input).unwrap_or_default()
            ))),
        }
    }
}

impl AllocationStrategy for RouteDistinguisherStrategy {
    fn allocate(&self) -> Result<PropertyBag> {
        let rd = self.format_rd()?;
        if self.allocated.contains(&rd) {
            return Err(self.reject(format!("Unable to allocate RD, duplicate RD created: {}", rd)));
        }

        log::info!("Allocated route distinguisher {}", rd);
        let mut result = PropertyBag::new();
        result.insert("rd".to_string(), PropertyValue::Text(rd));
        Ok(result)
    }

    fn capacity(&self) -> Result<CapacityReport> {
        let utilized = BigInt::from(self.allocated_count);
        Ok(CapacityReport::new(rd_space() - &utilized, utilized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use crate::props::AllocatedResource;

    fn strategy(allocated: &[&str], user_input: PropertyBag) -> RouteDistinguisherStrategy {
        let resources = allocated
            .iter()
            .map(|rd| AllocatedResource::new(props! { "rd" => *rd }))
            .collect();
        RouteDistinguisherStrategy::new(StrategyContext::new(props! {}, resources, user_input))
    }

    fn rd(user_input: PropertyBag) -> Result<String> {
        strategy(&[], user_input)
            .allocate()
            .map(|result| result.text("rd", "result").unwrap().to_string())
    }

    #[test]
    fn test_type0_two_byte_as() {
        assert_eq!(rd(props! { "asNumber" => 65000, "assignedNumber" => 4_000_000_000i64 }).unwrap(), "65000:4000000000");
        assert_eq!(rd(props! { "asNumber" => 1, "assignedNumber" => 1 }).unwrap(), "1:1");
    }

    #[test]
    fn test_type1_ipv4() {
        assert_eq!(rd(props! { "ipv4" => "1.2.3.4", "assignedNumber" => 65000 }).unwrap(), "1.2.3.4:65000");
    }

    #[test]
    fn test_type2_four_byte_as() {
        assert_eq!(rd(props! { "asNumber" => 4_000_000_000i64, "assignedNumber" => 100 }).unwrap(), "4000000000:100");
    }

    #[test]
    fn test_rejects_wrong_input() {
        assert!(rd(props! { "assignedNumber" => 1 }).is_err());
        assert!(rd(props! { "ipv4" => "1.2.3.4" }).is_err());
        assert!(rd(props! { "ipv4" => "abcd", "assignedNumber" => 1 }).is_err());
        assert!(matches!(
            rd(props! { "ipv4" => "1.2.3.4", "assignedNumber" => "asdasd" }),
            Err(AllocationError::Conversion { .. })
        ));
        assert!(rd(props! { "ipv4" => "256.2.2.2", "assignedNumber" => 1 }).is_err());
        assert!(rd(props! { "asNumber" => 650_000, "assignedNumber" => 6_500_000 }).is_err());
        assert!(rd(props! { "ipv4" => "22.2.2.2", "assignedNumber" => 6_500_000 }).is_err());
        assert!(rd(props! { "asNumber" => 1, "ipv4" => "1.1.1.1", "assignedNumber" => 1 }).is_err());
        assert!(rd(props! { "asNumber" => BYTE_4_MAX, "assignedNumber" => 1 }).is_err());
        assert!(rd(props! {}).is_err());
    }

    #[test]
    fn test_duplicate_and_capacity() {
        let s = strategy(&["100:1"], props! { "asNumber" => 100, "assignedNumber" => 1 });
        assert_eq!(
            s.allocate().unwrap_err().to_string(),
            "Unable to allocate RD, duplicate RD created: 100:1"
        );

        let report = s.capacity().unwrap();
        assert_eq!(report.free_capacity.to_string(), "281474976710655");
        assert_eq!(report.utilized_capacity, BigInt::from(1));
    }
}
