/// Database row types — these map directly to SQLite rows.
/// Distinct from the cove-types API models to keep the DB layer independent;
/// coercion into validated models happens at the backend boundary.

pub struct UserRow {
    pub id: String,
    pub username: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
    pub app_role: String,
}

pub struct ChannelRow {
    pub id: i64,
    pub slug: String,
    pub created_by: String,
    pub inserted_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub channel_id: i64,
    pub user_id: String,
    pub message: String,
    pub inserted_at: String,
    // Author snapshot joined from users
    pub author_username: Option<String>,
    pub author_email: Option<String>,
    pub author_avatar_url: Option<String>,
    pub author_app_role: Option<String>,
}
