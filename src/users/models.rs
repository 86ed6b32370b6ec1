use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::{FieldError, Rules, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "users.ts")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "users.ts")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_path: Option<String>,
    pub in_game_name: Option<String>,
    pub in_game_id: Option<String>,
    pub role: Role,
    /// Wallet balance in minor currency units.
    pub balance: i64,
    pub banned: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// Columns selected by every profile query, in the order `profile_from_row` reads them.
pub(crate) const PROFILE_COLUMNS: &str = "id, email, username, display_name, avatar_path, in_game_name, in_game_id, role, balance, banned, created_at, updated_at";

pub(crate) fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        avatar_path: row.get(4)?,
        in_game_name: row.get(5)?,
        in_game_id: row.get(6)?,
        role: Role::from_str(&row.get::<_, String>(7)?),
        balance: row.get(8)?,
        banned: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Data needed to create a profile for a freshly authenticated account.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub username_hint: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "users.ts")]
pub struct UpdateProfileRequest {
    pub username: String,
    pub display_name: Option<String>,
    pub in_game_name: Option<String>,
    pub in_game_id: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Vec<FieldError> {
        let mut rules = Rules::new();
        rules
            .length_between("username", &self.username, 3, 24)
            .check(
                "username",
                is_valid_username(&self.username),
                "Username may only contain letters, digits and underscores",
            );
        if let Some(name) = &self.display_name {
            rules.max_length("display_name", name, 40);
        }
        if let Some(name) = &self.in_game_name {
            rules.max_length("in_game_name", name, 32);
        }
        if let Some(id) = &self.in_game_id {
            rules.max_length("in_game_id", id, 32);
        }
        rules.finish()
    }
}

pub fn is_valid_username(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "users.ts")]
pub struct UserFilter {
    /// Matches username, email or display name.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub banned: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "users.ts")]
pub struct BalanceAdjustment {
    /// Positive credits, negative debits.
    pub amount: i64,
    pub note: String,
}

impl Validate for BalanceAdjustment {
    fn validate(&self) -> Vec<FieldError> {
        Rules::new()
            .check("amount", self.amount != 0, "Amount cannot be zero")
            .max_amount("amount", self.amount)
            .length_between("note", &self.note, 3, 200)
            .finish()
    }
}
