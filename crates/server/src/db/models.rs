use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

/// Read-only rendering of a user nested inside other resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum SkillType {
    Offered,
    Wanted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum SwapStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl SwapStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SwapStatus::Pending => "PENDING",
            SwapStatus::Accepted => "ACCEPTED",
            SwapStatus::Rejected => "REJECTED",
            SwapStatus::Cancelled => "CANCELLED",
        }
    }

    /// A pending request may move to any outcome; every other state is
    /// terminal. Re-asserting the current state is always allowed.
    pub fn can_become(self, next: SwapStatus) -> bool {
        self == next || self == SwapStatus::Pending
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: i64,
    pub user: UserSummary,
    pub location: String,
    pub profile_photo: Option<String>,
    pub availability: String,
    pub is_public: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub location: String,
    pub profile_photo: Option<String>,
    pub availability: String,
    pub is_public: bool,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            user: UserSummary {
                id: row.user_id,
                username: row.username,
                email: row.email,
            },
            location: row.location,
            profile_photo: row.profile_photo,
            availability: row.availability,
            is_public: row.is_public,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Skill {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSkill {
    pub id: i64,
    pub user: UserSummary,
    pub skill: i64,
    pub skill_type: SkillType,
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserSkillRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub skill: i64,
    pub skill_type: SkillType,
}

impl From<UserSkillRow> for UserSkill {
    fn from(row: UserSkillRow) -> Self {
        Self {
            id: row.id,
            user: UserSummary {
                id: row.user_id,
                username: row.username,
                email: row.email,
            },
            skill: row.skill,
            skill_type: row.skill_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SwapRequest {
    pub id: i64,
    pub requester: i64,
    pub receiver: i64,
    pub offered_skill: i64,
    pub requested_skill: i64,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
}

impl SwapRequest {
    pub fn involves(&self, user_id: i64) -> bool {
        self.requester == user_id || self.receiver == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: i64,
    pub swap_request: i64,
    pub rating: i32,
    pub comment: String,
}
