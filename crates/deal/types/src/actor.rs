//! Actor identity threaded through every mutating call.
//!
//! The core trusts the identity context handed to it; *which* roles may
//! call which operations is enforced upstream. Which roles satisfy which
//! required approval is internal to the lifecycle rules.

use serde::{Deserialize, Serialize};

/// A business role within the deal organization
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role(pub String);

impl Role {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn analyst() -> Self {
        Self::new("analyst")
    }

    pub fn underwriting_lead() -> Self {
        Self::new("underwriting-lead")
    }

    pub fn ic_chair() -> Self {
        Self::new("ic-chair")
    }

    pub fn managing_partner() -> Self {
        Self::new("managing-partner")
    }

    pub fn counsel() -> Self {
        Self::new("counsel")
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity context attached to every mutation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: String,
    pub actor_name: String,
    pub actor_role: Role,
}

impl ActorContext {
    pub fn new(
        actor_id: impl Into<String>,
        actor_name: impl Into<String>,
        actor_role: Role,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            actor_role,
        }
    }
}

impl std::fmt::Display for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.actor_name, self.actor_role)
    }
}
