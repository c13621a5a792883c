//! Strongly-typed identifiers for Warden entities
//!
//! All IDs are wrapped in newtype structs for type safety. Error and
//! coordination IDs are UUID-based; agent IDs are opaque strings supplied
//! by the calling agent processes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a single error occurrence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorId(Uuid);

impl ErrorId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error:{}", self.0)
    }
}

/// Identifier for a cooperating agent
///
/// Agent IDs originate in the calling agent processes and are treated as
/// opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent:{}", self.0)
    }
}

/// Unique identifier for a recovery coordination episode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinationId(Uuid);

impl CoordinationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CoordinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coordination:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_id_uniqueness() {
        let id1 = ErrorId::generate();
        let id2 = ErrorId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_agent_id_roundtrip() {
        let id = AgentId::new("consensus-07");
        assert_eq!(id.as_str(), "consensus-07");
        assert_eq!(id.to_string(), "agent:consensus-07");
    }

    #[test]
    fn test_coordination_id_display_prefix() {
        let id = CoordinationId::generate();
        assert!(id.to_string().starts_with("coordination:"));
    }
}
