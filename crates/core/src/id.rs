// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types shared by the hub and its agents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire value of the broadcast target.
pub const ALL_AGENTS: &str = "<all>";

/// Longest agent identifier accepted during a handshake.
pub const MAX_AGENT_ID_LEN: usize = 64;

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct MyId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Names one Minecraft server instance connected to the hub.
    ///
    /// `new()` does not validate; identifiers arriving from the network go
    /// through [`AgentId::parse`].
    pub struct AgentId;
}

define_id! {
    /// Ties a `CommandResult` back to the `ServerCommand` that asked for it.
    pub struct CorrelationId;
}

/// Rejected agent identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("agent id is empty")]
    Empty,

    #[error("agent id is {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("agent id contains whitespace or control characters: {0:?}")]
    InvalidChars(String),

    #[error("agent id {0:?} is reserved for broadcasts")]
    Reserved(String),
}

impl AgentId {
    /// Validate an identifier announced by an agent.
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        if raw.is_empty() {
            return Err(IdError::Empty);
        }
        if raw.len() > MAX_AGENT_ID_LEN {
            return Err(IdError::TooLong {
                len: raw.len(),
                max: MAX_AGENT_ID_LEN,
            });
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(IdError::InvalidChars(raw.to_string()));
        }
        if raw == ALL_AGENTS {
            return Err(IdError::Reserved(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }
}

impl CorrelationId {
    /// Fresh random correlation id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Destination of an outbound envelope.
///
/// Serialized as a plain string: the sentinel `<all>` or an agent id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Target {
    /// Every agent connected when the send happens
    All,
    Agent(AgentId),
}

impl Target {
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(AgentId::new(id))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_AGENTS,
            Self::Agent(id) => id.as_str(),
        }
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        if s == ALL_AGENTS {
            Self::All
        } else {
            Self::Agent(AgentId(s))
        }
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        match target {
            Target::All => ALL_AGENTS.to_string(),
            Target::Agent(id) => id.0,
        }
    }
}

impl From<AgentId> for Target {
    fn from(id: AgentId) -> Self {
        Self::Agent(id)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
