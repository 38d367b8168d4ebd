//! Identifier types for inventory entities
//!
//! Devices, ports, providers and controller nodes are all named by opaque,
//! stable identifiers. Every identifier is totally ordered so that maps keyed
//! by them iterate deterministically on every node.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device identifier, usually a URI such as `of:0000000000000001`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier from its URI form
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Get the URI form of this identifier
    pub fn uri(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

/// Port number, unique within one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortNumber(pub u64);

impl PortNumber {
    /// Create a port number
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    /// Get the raw port number
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PortNumber {
    fn from(number: u64) -> Self {
        Self(number)
    }
}

/// Identity of a reporting source ("provider")
///
/// Ancillary providers may enrich annotations but can never make a device
/// or port available on their own. Ordering is by scheme, then id, then the
/// ancillary flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProviderId {
    scheme: String,
    id: String,
    ancillary: bool,
}

impl ProviderId {
    /// Create a primary provider identifier
    pub fn new(scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
            ancillary: false,
        }
    }

    /// Create an ancillary provider identifier
    pub fn ancillary(scheme: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
            ancillary: true,
        }
    }

    /// URI scheme this provider reports for (e.g. `of`, `netconf`)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Provider-specific identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this provider is ancillary
    pub fn is_ancillary(&self) -> bool {
        self.ancillary
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.id)?;
        if self.ancillary {
            f.write_str(" (ancillary)")?;
        }
        Ok(())
    }
}

/// Controller cluster node identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Chassis identifier reported by a device
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChassisId(pub u64);

impl fmt::Display for ChassisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_providers_sort_before_their_ancillary_twin() {
        let primary = ProviderId::new("of", "foo");
        let ancillary = ProviderId::ancillary("of", "foo");
        assert!(primary < ancillary);
        assert!(!primary.is_ancillary());
        assert!(ancillary.is_ancillary());
    }

    #[test]
    fn provider_display_marks_ancillary() {
        assert_eq!(ProviderId::new("of", "foo").to_string(), "of:foo");
        assert_eq!(
            ProviderId::ancillary("of", "bar").to_string(),
            "of:bar (ancillary)"
        );
    }
}
