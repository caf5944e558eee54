//! Basic type definitions for the relay server
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: registry-assigned connection identifier
//! - `GroupId`: destination/origin group name used to key mailboxes

/// Connection identifier (newtype pattern)
///
/// Assigned by the registry in accept order, so ordering by id is
/// ordering by connection age. Implements Hash, Eq and Ord for use as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group identifier
///
/// Compared exactly as sent by the client; no case folding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_ordering() {
        assert!(ConnectionId(3) < ConnectionId(10));
        assert_eq!(ConnectionId(7).to_string(), "7");
    }

    #[test]
    fn test_group_id_is_case_sensitive() {
        assert_ne!(GroupId::from("g1"), GroupId::from("G1"));
        assert_eq!(GroupId::from("G1").as_str(), "G1");
    }
}
