use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Client,
    Host,
    Admin,
    /// Payment webhooks and refund completion. Never accepted from request headers.
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Client => "client",
            ActorRole::Host => "host",
            ActorRole::Admin => "admin",
            ActorRole::System => "system",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, ActorRole::Host | ActorRole::Admin)
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(ActorRole::Client),
            "host" => Ok(ActorRole::Host),
            "admin" => Ok(ActorRole::Admin),
            "system" => Ok(ActorRole::System),
            _ => Err(format!("invalid actor role: {s}")),
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }
}
