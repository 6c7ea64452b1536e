//! Account + related schema for database and url parameter validation

use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = i32;

/// Role of an account. Capabilities widen from `User` to `SuperAdmin`,
/// but granting `SuperAdmin` is a separate rule (see `auth::policy`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "superAdmin")]
    SuperAdmin
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "superAdmin"
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superAdmin" => Ok(Role::SuperAdmin),
            other => Err(format!("Unknown role `{other}`"))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub external_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub is_approved: bool
}

/// Profile fields pushed by the identity provider. Role and approval are
/// never part of a sync.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub external_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>
}

/// Administrative creation path, where role and approval are set up front.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub is_approved: bool
}

fn default_role() -> Role { Role::User }

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub approved: Option<bool>
}
