//! Error types for allocation strategies.
//!
//! Every strategy operation reports failures through [`AllocationError`].
//! Variants follow the four failure families a caller has to distinguish:
//! malformed input, invalid values, conflicts with already allocated
//! resources, and exhaustion of the parent range.

/// Result type for allocation operations
pub type Result<T> = std::result::Result<T, AllocationError>;

/// Errors that can occur while allocating from a resource pool
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    // Malformed pool / input
    #[error("Missing {property} in {scope}")]
    MissingProperty { property: String, scope: &'static str },

    #[error("Unable to convert {value} to a known number type")]
    Conversion { value: String },

    #[error("Unknown allocation strategy: {0}")]
    UnknownStrategy(String),

    // Invalid values
    #[error("Address: {address} is invalid, doesn't match regex: {pattern}")]
    Ipv4Format { address: String, pattern: &'static str },

    #[error("Address: {0} is invalid, outside of ipv4 range: {0}")]
    Ipv4Range(String),

    #[error("Address: {0} is invalid ipv6 address.")]
    InvalidIpv6(String),

    #[error("Prefix: {prefix} is invalid, {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    #[error("{0}")]
    InvalidValue(String),

    #[error("Missing {{counter}} in idFormat")]
    MissingCounterToken,

    // Conflicts
    #[error("{kind} {value} is out of {range}")]
    OutOfRange {
        kind: &'static str,
        value: String,
        range: String,
    },

    #[error("{kind} {value} was already claimed.")]
    AlreadyClaimed { kind: &'static str, value: String },

    #[error("You provided invalid network address. Network address should be {expected}")]
    InvalidNetworkAddress { expected: String },

    #[error("{kind} {value} overlaps with already allocated {existing}")]
    Overlap {
        kind: &'static str,
        value: String,
        existing: String,
    },

    // Exhaustion
    #[error("Unable to allocate {kind} from: {pool}. Insufficient capacity to allocate {request}. Currently allocated: {allocated}")]
    Exhausted {
        kind: &'static str,
        pool: String,
        request: String,
        allocated: String,
    },
}

impl AllocationError {
    pub(crate) fn missing(property: &str, scope: &'static str) -> Self {
        AllocationError::MissingProperty {
            property: property.to_string(),
            scope,
        }
    }

    /// True for errors caused by running out of space in the parent range
    pub fn is_exhausted(&self) -> bool {
        matches!(self, AllocationError::Exhausted { .. })
    }

    /// True for errors caused by a conflict with already allocated resources
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AllocationError::AlreadyClaimed { .. }
                | AllocationError::InvalidNetworkAddress { .. }
                | AllocationError::Overlap { .. }
                | AllocationError::OutOfRange { .. }
        )
    }
}
