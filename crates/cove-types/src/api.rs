use serde::{Deserialize, Serialize};

use crate::models::UserId;

// -- Session --

/// What the identity provider knows about the signed-in user. The rest of
/// the profile (username, avatar, role) is joined from the user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
}

// -- Profile --

/// Profile mutation payload. `None` clears the field (the original client
/// always submits both fields, mapping empty input to null).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}
