use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type ChannelId = i64;
pub type MessageId = i64;

/// The default channel is seeded by the server and can never be deleted.
pub const DEFAULT_CHANNEL_ID: ChannelId = 1;

/// Authorization role governing destructive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppRole {
    User,
    Moderator,
    Admin,
}

impl AppRole {
    /// Moderators and admins may delete any message.
    pub fn is_moderation_role(self) -> bool {
        matches!(self, AppRole::Moderator | AppRole::Admin)
    }
}

impl Default for AppRole {
    fn default() -> Self {
        AppRole::User
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
    pub app_role: AppRole,
}

impl UserProfile {
    /// Name shown next to messages: username if set, otherwise the email.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub slug: String,
    pub created_by: UserId,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub message: String,
    pub inserted_at: DateTime<Utc>,
    /// Denormalized author snapshot taken at fetch time. Not refreshed when
    /// the author later edits their profile.
    pub author: Option<UserProfile>,
}

impl Message {
    /// Provisional entries have a locally assigned negative id until the
    /// server echoes back the permanent one.
    pub fn is_provisional(&self) -> bool {
        self.id < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_username() {
        let mut user = UserProfile {
            id: Uuid::new_v4(),
            username: Some("skippy".into()),
            email: "skippy@example.com".into(),
            avatar_url: None,
            app_role: AppRole::User,
        };
        assert_eq!(user.display_name(), "skippy");

        user.username = None;
        assert_eq!(user.display_name(), "skippy@example.com");
    }

    #[test]
    fn app_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&AppRole::Moderator).unwrap(), "\"moderator\"");
        let role: AppRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, AppRole::Admin);
    }
}
