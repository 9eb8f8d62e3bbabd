//! Access policy
//!
//! Every role decision in the service goes through `Principal`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Non-admin logins must pass the OTP step
    pub fn requires_second_factor(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(DomainError::validation(format!("Invalid role: {}", other))),
        }
    }
}

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// List endpoints may return every user's records
    pub fn can_view_all(&self) -> bool {
        self.is_admin()
    }

    pub fn ensure_admin(&self) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::forbidden("admin role required"))
        }
    }

    pub fn ensure_owner_or_admin(&self, owner_id: Uuid) -> Result<(), DomainError> {
        if self.is_admin() || self.user_id == owner_id {
            Ok(())
        } else {
            Err(DomainError::forbidden("resource belongs to another user"))
        }
    }

    pub fn ensure_owner(&self, owner_id: Uuid) -> Result<(), DomainError> {
        if self.user_id == owner_id {
            Ok(())
        } else {
            Err(DomainError::forbidden("resource belongs to another user"))
        }
    }
}
