//! Identifier newtypes used throughout the orchestrator domain.
//!
//! Every identifier wraps a `Uuid` behind a distinct type so that a `TaskId`
//! can never be handed to a function expecting a `SessionId` by accident.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(TaskId, "Identifies a single Task within a TaskList.");
uuid_id!(SessionId, "Identifies a client session.");
uuid_id!(ReasoningChainId, "Identifies a ReasoningChain.");
uuid_id!(ToolCallId, "Identifies a single tool invocation record.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn round_trips_through_display_and_from_str() {
        let id = ReasoningChainId::new();
        let parsed: ReasoningChainId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serializes_as_bare_uuid_string() {
        let id = TaskId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn rejects_invalid_uuid_strings() {
        let result: Result<ToolCallId, _> = "not-a-uuid".parse();
        assert!(result.is_err());
    }

    #[test]
    fn from_uuid_and_as_uuid_are_inverses() {
        let raw = Uuid::new_v4();
        let id = SessionId::from_uuid(raw);
        assert_eq!(id.as_uuid(), raw);
    }
}
