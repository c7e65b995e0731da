//! Users and roles

use crate::{ChatId, Language, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a user
///
/// Fixed at registration: the admin allow-list grants `Admin`, the
/// password gate grants `Vitrine`. The only permitted change afterwards is
/// an upgrade to `Admin` when the allow-list says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrator: distributes, takes back and transfers stock
    Admin,
    /// Showcase/point-of-sale: holds stock, sells and returns it
    Vitrine,
}

impl Role {
    /// Storage string for the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Vitrine => "vitrine",
        }
    }

    /// Parse a stored role string
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "vitrine" => Some(Role::Vitrine),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered user (admin or vitrine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// External chat-platform identity, unique per user
    pub chat_id: ChatId,
    pub username: String,
    pub role: Role,
    pub language: Language,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_vitrine(&self) -> bool {
        self.role == Role::Vitrine
    }
}
