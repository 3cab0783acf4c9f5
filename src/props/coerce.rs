//! Numeric coercion of loosely typed property values.

use super::PropertyValue;
use crate::error::{AllocationError, Result};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

fn conversion(value: &PropertyValue) -> AllocationError {
    AllocationError::Conversion {
        value: render_plain(value),
    }
}

/// Coerce a property value to a signed 64-bit integer.
///
/// Floats are truncated toward zero; strings must hold a decimal number.
pub fn to_i64(value: &PropertyValue) -> Result<i64> {
    match value {
        PropertyValue::Int(i) => Ok(*i),
        PropertyValue::Big(b) => b.to_i64().ok_or_else(|| conversion(value)),
        PropertyValue::Float(f) => float_to_i64(*f).ok_or_else(|| conversion(value)),
        PropertyValue::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(float_to_i64))
                .ok_or_else(|| conversion(value))
        }
        PropertyValue::Bool(_) => Err(conversion(value)),
    }
}

/// Coerce a property value to an arbitrary-precision integer.
pub fn to_bigint(value: &PropertyValue) -> Result<BigInt> {
    match value {
        PropertyValue::Int(i) => Ok(BigInt::from(*i)),
        PropertyValue::Big(b) => Ok(b.clone()),
        PropertyValue::Float(f) => float_to_bigint(*f).ok_or_else(|| conversion(value)),
        PropertyValue::Text(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<BigInt>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(float_to_bigint))
                .ok_or_else(|| conversion(value))
        }
        PropertyValue::Bool(_) => Err(conversion(value)),
    }
}

fn float_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() {
        f.trunc().to_i64()
    } else {
        None
    }
}

fn float_to_bigint(f: f64) -> Option<BigInt> {
    if f.is_finite() {
        BigInt::from_f64(f.trunc())
    } else {
        None
    }
}

/// Render a value the way it is spliced into identifiers and messages
pub fn render_plain(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Bool(b) => b.to_string(),
        PropertyValue::Int(i) => i.to_string(),
        PropertyValue::Big(b) => b.to_string(),
        PropertyValue::Float(f) => f.to_string(),
        PropertyValue::Text(s) => s.clone(),
    }
}
