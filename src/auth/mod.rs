//! Authentication and authorization module
//!
//! JWT bearer authentication and the staff roles that gate workflow actions.

mod jwt;
mod middleware;
mod password;

pub use jwt::{Claims, TokenPair, TokenService};
pub use middleware::auth_middleware;
pub use password::{hash_password, validate_password, verify_password};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Staff roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Curates own sources and votes on others
    Curator,
    /// Supervisor: may manage sources owned by others
    Manager,
    Admin,
}

impl Role {
    pub fn can_manage_sources(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Curator => "curator",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Curator
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "curator" => Ok(Role::Curator),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The authenticated caller, as seen by services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Owner of the record or someone allowed to manage others' sources
    pub fn may_manage(&self, owner: Uuid) -> bool {
        self.id == owner || self.role.can_manage_sources()
    }
}

impl From<&Claims> for Actor {
    fn from(claims: &Claims) -> Self {
        Actor::new(claims.sub, claims.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(!Role::Curator.can_manage_sources());
        assert!(Role::Manager.can_manage_sources());
        assert!(Role::Admin.can_manage_sources());
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_actor_may_manage() {
        let owner = Uuid::new_v4();
        assert!(Actor::new(owner, Role::Curator).may_manage(owner));
        assert!(!Actor::new(Uuid::new_v4(), Role::Curator).may_manage(owner));
        assert!(Actor::new(Uuid::new_v4(), Role::Manager).may_manage(owner));
    }
}
