//! Property bags exchanged with the resource-management layer.
//!
//! Pool properties, allocated resources, user input and allocation results
//! all travel as string-keyed bags of loosely typed values. This module
//! pins those values down to a small tagged union ([`PropertyValue`]) and
//! gives strategies typed accessors ([`PropertyAccess`]) so each required
//! field is validated once, at the boundary.

pub mod coerce;

pub use coerce::{render_plain, to_bigint, to_i64};

use crate::error::{AllocationError, Result};
use num_bigint::BigInt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A string-keyed bag of property values
pub type PropertyBag = BTreeMap<String, PropertyValue>;

/// A single property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Big(BigInt),
    Float(f64),
    Text(String),
}

/// Wire shape accepted from JSON / YAML documents
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl From<RawValue> for PropertyValue {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Bool(b) => PropertyValue::Bool(b),
            RawValue::Int(i) => PropertyValue::Int(i),
            RawValue::UInt(u) => PropertyValue::Big(BigInt::from(u)),
            RawValue::Float(f) => PropertyValue::Float(f),
            RawValue::Text(s) => PropertyValue::Text(s),
        }
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        RawValue::deserialize(deserializer).map(PropertyValue::from)
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PropertyValue::Bool(b) => serializer.serialize_bool(*b),
            PropertyValue::Int(i) => serializer.serialize_i64(*i),
            // Arbitrary precision does not survive a JSON number
            PropertyValue::Big(b) => serializer.collect_str(b),
            PropertyValue::Float(f) => serializer.serialize_f64(*f),
            PropertyValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_plain(self))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<BigInt> for PropertyValue {
    fn from(value: BigInt) -> Self {
        PropertyValue::Big(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

/// Build a [`PropertyBag`] from `key => value` pairs
///
/// ```
/// use netalloc::props;
///
/// let pool = props! { "address" => "192.168.1.0", "prefix" => 24, "subnet" => false };
/// assert_eq!(pool.len(), 3);
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::props::PropertyBag::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut bag = $crate::props::PropertyBag::new();
        $(
            bag.insert(::std::string::String::from($key), $crate::props::PropertyValue::from($value));
        )+
        bag
    }};
}

/// One previously granted resource, as handed back by the persistence layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocatedResource {
    #[serde(rename = "Properties", alias = "properties")]
    pub properties: PropertyBag,
}

impl AllocatedResource {
    pub fn new(properties: PropertyBag) -> Self {
        Self { properties }
    }
}

impl From<PropertyBag> for AllocatedResource {
    fn from(properties: PropertyBag) -> Self {
        Self::new(properties)
    }
}

/// Typed access to the fields of a property bag
pub trait PropertyAccess {
    /// Get a raw value, if present
    fn value(&self, key: &str) -> Option<&PropertyValue>;

    /// Get a raw value or fail with a missing-property error naming `scope`
    fn require(&self, key: &str, scope: &'static str) -> Result<&PropertyValue> {
        self.value(key)
            .ok_or_else(|| AllocationError::missing(key, scope))
    }

    /// Get a string field
    fn text(&self, key: &str, scope: &'static str) -> Result<&str> {
        match self.require(key, scope)? {
            PropertyValue::Text(s) => Ok(s.as_str()),
            other => Err(AllocationError::InvalidValue(format!(
                "Property {} in {} must be a string, got: {}",
                key, scope, other
            ))),
        }
    }

    /// Get an integer field, coercing numeric representations
    fn int(&self, key: &str, scope: &'static str) -> Result<i64> {
        to_i64(self.require(key, scope)?)
    }

    /// Get an arbitrary-precision integer field, coercing numeric representations
    fn big(&self, key: &str, scope: &'static str) -> Result<BigInt> {
        to_bigint(self.require(key, scope)?)
    }

    /// Get an optional integer field
    fn int_opt(&self, key: &str) -> Result<Option<i64>> {
        self.value(key).map(to_i64).transpose()
    }

    /// Boolean flag; absent or non-boolean values read as `false`
    fn flag(&self, key: &str) -> bool {
        matches!(self.value(key), Some(PropertyValue::Bool(true)))
    }
}

impl PropertyAccess for PropertyBag {
    fn value(&self, key: &str) -> Option<&PropertyValue> {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_resource_json() {
        let json = r#"{"Properties": {"address": "10.0.0.0", "prefix": 8, "subnet": true, "ratio": 0.5}}"#;
        let resource: AllocatedResource = serde_json::from_str(json).unwrap();

        assert_eq!(resource.properties.text("address", "resource").unwrap(), "10.0.0.0");
        assert_eq!(resource.properties.int("prefix", "resource").unwrap(), 8);
        assert!(resource.properties.flag("subnet"));
        assert_eq!(resource.properties.get("ratio"), Some(&PropertyValue::Float(0.5)));
    }

    #[test]
    fn test_deserialize_lowercase_container() {
        let yaml = "properties:\n  vlan: 278\n";
        let resource: AllocatedResource = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(resource.properties.int("vlan", "resource").unwrap(), 278);
    }

    #[test]
    fn test_large_unsigned_becomes_big() {
        let bag: PropertyBag = serde_json::from_str(r#"{"n": 18446744073709551615}"#).unwrap();
        assert_eq!(
            bag.get("n"),
            Some(&PropertyValue::Big(BigInt::from(u64::MAX)))
        );
    }

    #[test]
    fn test_serialize_big_as_string() {
        let bag = props! { "freeCapacity" => BigInt::from(u64::MAX) * 2 };
        let json = serde_json::to_string(&bag).unwrap();
        assert_eq!(json, r#"{"freeCapacity":"36893488147419103230"}"#);
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        let bag = props! { "address" => 5 };
        assert_eq!(
            bag.int("prefix", "pool properties"),
            Err(AllocationError::missing("prefix", "pool properties"))
        );
        assert!(matches!(
            bag.text("address", "pool properties"),
            Err(AllocationError::InvalidValue(_))
        ));
        assert!(!bag.flag("subnet"));
        assert_eq!(bag.int_opt("from").unwrap(), None);
    }
}
