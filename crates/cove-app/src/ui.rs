//! Presentation helpers: pure formatting functions the REPL renders with.
//! They read store state and consult the authorization predicates; all
//! synchronization logic stays in cove-store.

use chrono::Local;

use cove_store::auth;
use cove_types::models::{Channel, Message, UserProfile};

/// Up to two initials from the display name, for users without an avatar.
pub fn avatar_initials(user: Option<&UserProfile>) -> String {
    let Some(user) = user else {
        return "?".to_string();
    };

    let initials: String = user
        .display_name()
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();

    if initials.is_empty() {
        "?".to_string()
    } else {
        initials
    }
}

/// One sidebar row: `# slug`, with a trailing `[x]` when the viewer may
/// delete the channel and `*` on the active one.
pub fn sidebar_line(channel: &Channel, viewer: Option<&UserProfile>, active: bool) -> String {
    let marker = if active { "*" } else { " " };
    let deletable = viewer.is_some_and(|u| auth::can_delete_channel(u, channel));
    let action = if deletable { "  [x]" } else { "" };
    format!("{marker} #{:<20} ({}){action}", channel.slug, channel.id)
}

/// One message row: `[HH:MM] (AB) name: body`, with a trailing `[x]` when
/// the viewer may delete it.
pub fn message_line(message: &Message, viewer: Option<&UserProfile>) -> String {
    let author = message.author.as_ref();
    let name = author.map(|a| a.display_name()).unwrap_or("Unknown user");
    let initials = avatar_initials(author);
    let timestamp = message
        .inserted_at
        .with_timezone(&Local)
        .format("%H:%M");
    let pending = if message.is_provisional() { " (sending…)" } else { "" };

    let deletable = viewer.is_some_and(|u| auth::can_delete_message(u, message));
    let action = if deletable {
        format!("  [x {}]", message.id)
    } else {
        String::new()
    };

    format!("[{timestamp}] ({initials}) {name}: {}{pending}{action}", message.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cove_types::models::AppRole;
    use uuid::Uuid;

    fn user(username: Option<&str>, role: AppRole) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            username: username.map(Into::into),
            email: "pat@example.com".into(),
            avatar_url: None,
            app_role: role,
        }
    }

    #[test]
    fn initials_come_from_the_display_name() {
        let named = user(Some("Pat Doe"), AppRole::User);
        assert_eq!(avatar_initials(Some(&named)), "PD");

        let email_only = user(None, AppRole::User);
        assert_eq!(avatar_initials(Some(&email_only)), "P");

        assert_eq!(avatar_initials(None), "?");
    }

    #[test]
    fn message_line_offers_delete_to_the_author_only() {
        let author = user(Some("alice"), AppRole::User);
        let stranger = user(Some("bob"), AppRole::User);
        let message = Message {
            id: 9,
            channel_id: 1,
            user_id: author.id,
            message: "hi".into(),
            inserted_at: Utc::now(),
            author: Some(author.clone()),
        };

        assert!(message_line(&message, Some(&author)).contains("[x 9]"));
        assert!(!message_line(&message, Some(&stranger)).contains("[x"));
        assert!(!message_line(&message, None).contains("[x"));
    }

    #[test]
    fn sidebar_never_offers_deleting_the_default_channel() {
        let admin = user(Some("root"), AppRole::Admin);
        let general = Channel {
            id: 1,
            slug: "general".into(),
            created_by: admin.id,
            inserted_at: Utc::now(),
        };
        assert!(!sidebar_line(&general, Some(&admin), true).contains("[x]"));

        let other = Channel {
            id: 2,
            slug: "random".into(),
            created_by: admin.id,
            inserted_at: Utc::now(),
        };
        assert!(sidebar_line(&other, Some(&admin), false).contains("[x]"));
    }
}
