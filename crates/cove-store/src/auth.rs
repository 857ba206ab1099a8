//! Pure authorization predicates consumed by the presentation layer to
//! decide whether to offer destructive actions. The remote store re-checks
//! independently; these are a UX convenience, not a security boundary.

use cove_types::models::{AppRole, Channel, DEFAULT_CHANNEL_ID, Message, UserProfile};

/// The default channel is untouchable; otherwise the creator or an admin.
pub fn can_delete_channel(user: &UserProfile, channel: &Channel) -> bool {
    channel.id != DEFAULT_CHANNEL_ID
        && (user.id == channel.created_by || user.app_role == AppRole::Admin)
}

/// The author, or anyone holding a moderation role.
pub fn can_delete_message(user: &UserProfile, message: &Message) -> bool {
    user.id == message.user_id || user.app_role.is_moderation_role()
}
