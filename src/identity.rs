//! Identity & session collaborator.
//!
//! The engine never authenticates. It consumes an already-resolved
//! `(player_id, role)` pair; how the token was minted and verified is the
//! collaborator's concern.

use crate::errors::{EngineError, EngineResult};
use crate::types::PlayerId;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller role. Operators open, lock and resolve rounds; players place
/// wagers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Operator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Player => write!(f, "player"),
            Role::Operator => write!(f, "operator"),
        }
    }
}

/// A resolved caller identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    pub player_id: PlayerId,
    pub role: Role,
}

impl Caller {
    pub fn player(player_id: impl Into<PlayerId>) -> Self {
        Self {
            player_id: player_id.into(),
            role: Role::Player,
        }
    }

    pub fn operator(player_id: impl Into<PlayerId>) -> Self {
        Self {
            player_id: player_id.into(),
            role: Role::Operator,
        }
    }

    /// Check the caller carries the required role.
    pub fn require(&self, required: Role) -> EngineResult<()> {
        if self.role == required {
            Ok(())
        } else {
            Err(EngineError::Unauthorized { required })
        }
    }
}

/// Resolves an opaque session token to a caller identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> EngineResult<Caller>;
}

/// In-memory token table for tests and embedded deployments.
#[derive(Default)]
pub struct StaticIdentityProvider {
    sessions: DashMap<String, Caller>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: impl Into<String>, caller: Caller) {
        self.sessions.insert(token.into(), caller);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> EngineResult<Caller> {
        self.sessions
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::Unauthorized {
                required: Role::Player,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_check() {
        let operator = Caller::operator("croupier-1");
        assert!(operator.require(Role::Operator).is_ok());

        let player = Caller::player("alice");
        let err = player.require(Role::Operator).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Unauthorized {
                required: Role::Operator
            }
        ));
    }

    #[tokio::test]
    async fn test_static_provider_resolution() {
        let provider = StaticIdentityProvider::new();
        provider.register("tok-alice", Caller::player("alice"));

        let caller = provider.resolve("tok-alice").await.unwrap();
        assert_eq!(caller.player_id, "alice");
        assert_eq!(caller.role, Role::Player);

        assert!(provider.resolve("tok-unknown").await.is_err());
    }
}
