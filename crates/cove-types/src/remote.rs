//! Contracts the client core depends on. The remote relational store, the
//! identity provider, and the object store are external collaborators; the
//! reference implementations live in `cove-backend`.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::api::{ProfileUpdate, Session};
use crate::error::StoreResult;
use crate::events::ChangeEvent;
use crate::models::{Channel, ChannelId, Message, MessageId, UserId, UserProfile};

/// The remote source of truth for channels, messages, and user profiles.
///
/// Identifiers and timestamps are assigned server-side. Destructive
/// operations carry the acting user because the remote store is the
/// authorization enforcement point of record; client-side predicate checks
/// are a UX convenience only.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_channels(&self) -> StoreResult<Vec<Channel>>;

    /// Rows include the author's profile snapshot to avoid a per-message
    /// lookup at render time.
    async fn fetch_messages(&self, channel_id: ChannelId) -> StoreResult<Vec<Message>>;

    async fn insert_channel(&self, slug: &str, created_by: UserId) -> StoreResult<Channel>;

    async fn delete_channel(&self, id: ChannelId, acted_by: UserId) -> StoreResult<()>;

    async fn insert_message(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        body: &str,
    ) -> StoreResult<Message>;

    async fn delete_message(&self, id: MessageId, acted_by: UserId) -> StoreResult<()>;

    async fn fetch_user(&self, id: UserId) -> StoreResult<Option<UserProfile>>;

    async fn update_user(&self, id: UserId, update: &ProfileUpdate) -> StoreResult<UserProfile>;

    /// Subscribe to the change feed. Delivery is at-least-once; order is not
    /// guaranteed across entity types.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Authentication provider issuing the current-user identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the current session, or `None` when signed out.
    async fn current_session(&self) -> StoreResult<Option<Session>>;

    /// Invalidate the session with the provider.
    async fn sign_out(&self) -> StoreResult<()>;
}

/// Binary object storage for avatar images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a blob under a caller-chosen path scoped to the user's own
    /// identifier; returns a stable public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> StoreResult<String>;
}
