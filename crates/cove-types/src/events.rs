use serde::{Deserialize, Serialize};

use crate::models::{Channel, ChannelId, Message, MessageId, UserProfile};

/// Change notifications pushed by the remote store.
///
/// Delivery is at-least-once and ordering is not guaranteed across entity
/// types, so consumers must merge these idempotently keyed on row ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChangeEvent {
    /// A channel row was inserted
    ChannelInsert { channel: Channel },

    /// A channel row was deleted (its messages cascade server-side)
    ChannelDelete { id: ChannelId },

    /// A message row was inserted, carrying the author snapshot
    MessageInsert { message: Message },

    /// A message row was deleted
    MessageDelete {
        id: MessageId,
        channel_id: ChannelId,
    },

    /// A user profile row was updated
    UserUpdate { user: UserProfile },
}
