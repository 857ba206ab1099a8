use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use cove_db::Database;
use cove_db::models::{ChannelRow, MessageRow, UserRow};
use cove_types::api::ProfileUpdate;
use cove_types::error::{StoreError, StoreResult};
use cove_types::events::ChangeEvent;
use cove_types::models::{
    AppRole, Channel, ChannelId, DEFAULT_CHANNEL_ID, Message, MessageId, UserId, UserProfile,
};
use cove_types::remote::RemoteStore;

use crate::dispatcher::Dispatcher;

/// SQLite-backed reference implementation of the remote store contract.
///
/// Assigns ids and timestamps server-side, re-checks authorization as the
/// enforcement point of record, and broadcasts a change event after every
/// committed write.
#[derive(Clone)]
pub struct LocalBackend {
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            dispatcher: Dispatcher::new(),
        }
    }

    /// The event fan-out, exposed so tests can inject duplicate deliveries.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Administrative role change, used by the demo binary and tests.
    pub async fn set_role(&self, id: UserId, role: AppRole) -> StoreResult<()> {
        let db = self.db.clone();
        run_blocking(move || db.set_app_role(&id.to_string(), role_str(role))).await?;
        Ok(())
    }

    /// Create the user row for a fresh signup, returning the profile.
    pub async fn create_user(&self, id: UserId, email: &str) -> StoreResult<UserProfile> {
        let db = self.db.clone();
        let email = email.to_string();
        let row = run_blocking(move || {
            db.create_user(&id.to_string(), &email)?;
            db.get_user_by_id(&id.to_string())?
                .ok_or_else(|| anyhow!("user row vanished after insert"))
        })
        .await?;
        Ok(user_from_row(row))
    }

    /// Lookup used by the identity provider at sign-in.
    pub async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserProfile>> {
        let db = self.db.clone();
        let email = email.to_string();
        let row = run_blocking(move || db.get_user_by_email(&email)).await?;
        Ok(row.map(user_from_row))
    }

    async fn require_user(&self, id: UserId) -> StoreResult<UserProfile> {
        self.fetch_user(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))
    }
}

#[async_trait]
impl RemoteStore for LocalBackend {
    async fn fetch_channels(&self) -> StoreResult<Vec<Channel>> {
        let db = self.db.clone();
        let rows = run_blocking(move || db.list_channels()).await?;
        Ok(rows.into_iter().map(channel_from_row).collect())
    }

    async fn fetch_messages(&self, channel_id: ChannelId) -> StoreResult<Vec<Message>> {
        let db = self.db.clone();
        let rows = run_blocking(move || db.list_messages(channel_id)).await?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    async fn insert_channel(&self, slug: &str, created_by: UserId) -> StoreResult<Channel> {
        if slug.is_empty() {
            return Err(StoreError::validation("channel slug must not be empty"));
        }

        let db = self.db.clone();
        let slug = slug.to_string();
        let row =
            run_blocking(move || db.insert_channel(&slug, &created_by.to_string())).await?;

        let channel = channel_from_row(row);
        self.dispatcher.broadcast(ChangeEvent::ChannelInsert {
            channel: channel.clone(),
        });
        Ok(channel)
    }

    async fn delete_channel(&self, id: ChannelId, acted_by: UserId) -> StoreResult<()> {
        if id == DEFAULT_CHANNEL_ID {
            return Err(StoreError::authorization("the default channel cannot be deleted"));
        }

        let db = self.db.clone();
        let row = run_blocking(move || db.get_channel(id))
            .await?
            .ok_or_else(|| StoreError::not_found(format!("channel {id}")))?;

        let actor = self.require_user(acted_by).await?;
        let created_by = parse_uuid(&row.created_by, "channels.created_by");
        if actor.id != created_by && actor.app_role != AppRole::Admin {
            return Err(StoreError::authorization(
                "only the channel creator or an admin may delete a channel",
            ));
        }

        let db = self.db.clone();
        let removed = run_blocking(move || db.delete_channel(id)).await?;
        if !removed {
            return Err(StoreError::not_found(format!("channel {id}")));
        }

        // Messages cascade server-side; clients evict them on this event
        self.dispatcher.broadcast(ChangeEvent::ChannelDelete { id });
        Ok(())
    }

    async fn insert_message(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        body: &str,
    ) -> StoreResult<Message> {
        if body.trim().is_empty() {
            return Err(StoreError::validation("message body must not be empty"));
        }

        let db = self.db.clone();
        let exists = run_blocking(move || db.get_channel(channel_id)).await?.is_some();
        if !exists {
            return Err(StoreError::not_found(format!("channel {channel_id}")));
        }

        let db = self.db.clone();
        let body = body.to_string();
        let row = run_blocking(move || {
            db.insert_message(channel_id, &user_id.to_string(), &body)
        })
        .await?;

        let message = message_from_row(row);
        self.dispatcher.broadcast(ChangeEvent::MessageInsert {
            message: message.clone(),
        });
        Ok(message)
    }

    async fn delete_message(&self, id: MessageId, acted_by: UserId) -> StoreResult<()> {
        let db = self.db.clone();
        let row = run_blocking(move || db.get_message(id))
            .await?
            .ok_or_else(|| StoreError::not_found(format!("message {id}")))?;

        let actor = self.require_user(acted_by).await?;
        let author = parse_uuid(&row.user_id, "messages.user_id");
        if actor.id != author && !actor.app_role.is_moderation_role() {
            return Err(StoreError::authorization(
                "only the author or a moderator may delete a message",
            ));
        }

        let db = self.db.clone();
        let removed = run_blocking(move || db.delete_message(id)).await?;
        if !removed {
            return Err(StoreError::not_found(format!("message {id}")));
        }

        self.dispatcher.broadcast(ChangeEvent::MessageDelete {
            id,
            channel_id: row.channel_id,
        });
        Ok(())
    }

    async fn fetch_user(&self, id: UserId) -> StoreResult<Option<UserProfile>> {
        let db = self.db.clone();
        let row = run_blocking(move || db.get_user_by_id(&id.to_string())).await?;
        Ok(row.map(user_from_row))
    }

    async fn update_user(&self, id: UserId, update: &ProfileUpdate) -> StoreResult<UserProfile> {
        let db = self.db.clone();
        let username = update.username.clone();
        let avatar_url = update.avatar_url.clone();
        let row = run_blocking(move || {
            db.update_user(&id.to_string(), username.as_deref(), avatar_url.as_deref())
        })
        .await?;

        let user = user_from_row(row);
        self.dispatcher.broadcast(ChangeEvent::UserUpdate { user: user.clone() });
        Ok(user)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.dispatcher.subscribe()
    }
}

/// Run a blocking DB closure off the async runtime.
async fn run_blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Transport(anyhow!("blocking task join error: {e}")))?
        .map_err(StoreError::Transport)
}

// -- Row coercion --
//
// Rows are coerced into validated models at this boundary; malformed fields
// are logged and replaced with safe defaults rather than propagated.

fn user_from_row(row: UserRow) -> UserProfile {
    UserProfile {
        id: parse_uuid(&row.id, "users.id"),
        username: row.username,
        email: row.email,
        avatar_url: row.avatar_url,
        app_role: parse_role(&row.app_role),
    }
}

fn channel_from_row(row: ChannelRow) -> Channel {
    Channel {
        id: row.id,
        slug: row.slug,
        created_by: parse_uuid(&row.created_by, "channels.created_by"),
        inserted_at: parse_timestamp(&row.inserted_at),
    }
}

fn message_from_row(row: MessageRow) -> Message {
    let author = row.author_email.as_ref().map(|email| UserProfile {
        id: parse_uuid(&row.user_id, "messages.user_id"),
        username: row.author_username.clone(),
        email: email.clone(),
        avatar_url: row.author_avatar_url.clone(),
        app_role: row.author_app_role.as_deref().map(parse_role).unwrap_or_default(),
    });

    Message {
        id: row.id,
        channel_id: row.channel_id,
        user_id: parse_uuid(&row.user_id, "messages.user_id"),
        message: row.message,
        inserted_at: parse_timestamp(&row.inserted_at),
        author,
    }
}

fn parse_uuid(value: &str, context: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}' in {}: {}", value, context, e);
        Uuid::nil()
    })
}

fn role_str(role: AppRole) -> &'static str {
    match role {
        AppRole::User => "user",
        AppRole::Moderator => "moderator",
        AppRole::Admin => "admin",
    }
}

fn parse_role(value: &str) -> AppRole {
    match value {
        "user" => AppRole::User,
        "moderator" => AppRole::Moderator,
        "admin" => AppRole::Admin,
        other => {
            warn!("Unknown app_role '{}', defaulting to user", other);
            AppRole::User
        }
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", value, e);
            DateTime::default()
        })
}
