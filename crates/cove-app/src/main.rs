mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use cove_backend::{DirStorage, LocalBackend, LocalIdentity};
use cove_db::Database;
use cove_store::{IdentityContext, RealtimeStore, profile};
use cove_types::api::ProfileUpdate;
use cove_types::models::{ChannelId, DEFAULT_CHANNEL_ID};
use cove_types::remote::RemoteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cove=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("COVE_DB_PATH").unwrap_or_else(|_| "cove.db".into());
    let avatar_dir = std::env::var("COVE_AVATAR_DIR").unwrap_or_else(|_| "avatars".into());
    let email = std::env::var("COVE_EMAIL").unwrap_or_else(|_| "demo@localhost".into());

    // Reference backend standing in for the hosted services
    let db = Database::open(&PathBuf::from(&db_path))?;
    let backend = LocalBackend::new(db);
    let storage = DirStorage::new(PathBuf::from(&avatar_dir)).await?;
    let provider = Arc::new(LocalIdentity::new(backend.clone()));
    provider.sign_in(&email).await?;

    let remote: Arc<dyn RemoteStore> = Arc::new(backend.clone());
    let identity = Arc::new(IdentityContext::new(provider, remote.clone()));
    let user = identity
        .load()
        .await?
        .expect("signed in above, session must resolve");
    info!("Signed in as {} ({})", user.display_name(), user.id);

    let store = Arc::new(RealtimeStore::new(remote.clone(), identity.clone()));
    store.load_channels().await?;
    let _pump = store.spawn_event_pump();

    let mut active: ChannelId = DEFAULT_CHANNEL_ID;
    store.open_channel(active).await?;

    println!("cove — type a message, or /help for commands");
    render(&store, &identity, active);

    let mut changed = store.changed();
    changed.mark_unchanged();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            result = changed.changed() => {
                if result.is_err() {
                    break;
                }
                render(&store, &identity, active);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                if let Some(next) = handle_command(
                    line, &store, &identity, &backend, &storage, active,
                )
                .await
                {
                    if next != active {
                        store.close_channel(active);
                        match store.open_channel(next).await {
                            Ok(_) => active = next,
                            Err(e) => eprintln!("! join failed: {e}"),
                        }
                    }
                    render(&store, &identity, active);
                }
            }
        }
    }

    identity.sign_out().await?;
    Ok(())
}

/// Dispatch one REPL line. Returns the channel to make active, or `None`
/// when the command failed loudly enough already.
async fn handle_command(
    line: &str,
    store: &RealtimeStore,
    identity: &IdentityContext,
    backend: &LocalBackend,
    storage: &DirStorage,
    active: ChannelId,
) -> Option<ChannelId> {
    let Some(user) = identity.current_user() else {
        eprintln!("! not signed in");
        return None;
    };

    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    match cmd {
        "/help" => {
            println!(
                "/channels  /join <id>  /new <name>  /delchan <id>\n\
                 /del <message id>  /name <username>  /avatar <file>  /quit"
            );
            None
        }
        "/channels" => Some(active),
        "/join" => match rest.parse::<ChannelId>() {
            Ok(id) => Some(id),
            Err(_) => {
                eprintln!("! usage: /join <channel id>");
                None
            }
        },
        "/new" => match store.create_channel(rest, user.id).await {
            Ok(channel) => {
                println!("created #{} ({})", channel.slug, channel.id);
                Some(channel.id)
            }
            Err(e) => {
                eprintln!("! create channel failed: {e}");
                None
            }
        },
        "/delchan" => {
            let Ok(id) = rest.parse::<ChannelId>() else {
                eprintln!("! usage: /delchan <channel id>");
                return None;
            };
            match store.delete_channel(id, user.id).await {
                Ok(()) => Some(if id == active { DEFAULT_CHANNEL_ID } else { active }),
                Err(e) => {
                    eprintln!("! delete channel failed: {e}");
                    None
                }
            }
        }
        "/del" => {
            let Ok(id) = rest.parse::<i64>() else {
                eprintln!("! usage: /del <message id>");
                return None;
            };
            match store.delete_message(id, user.id).await {
                Ok(()) => Some(active),
                Err(e) => {
                    eprintln!("! delete message failed: {e}");
                    None
                }
            }
        }
        "/name" => {
            let update = ProfileUpdate {
                username: (!rest.is_empty()).then(|| rest.to_string()),
                avatar_url: user.avatar_url.clone(),
            };
            match profile::update_profile(backend, identity, user.id, update).await {
                Ok(updated) => {
                    println!("profile saved; you are now {}", updated.display_name());
                    Some(active)
                }
                Err(e) => {
                    eprintln!("! profile update failed: {e}");
                    None
                }
            }
        }
        "/avatar" => {
            let bytes = match tokio::fs::read(rest).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    eprintln!("! cannot read {rest}: {e}");
                    return None;
                }
            };
            let uploaded = match profile::upload_avatar(storage, user.id, rest, bytes).await {
                Ok(url) => url,
                Err(e) => {
                    eprintln!("! avatar upload failed: {e}");
                    return None;
                }
            };
            let update = ProfileUpdate {
                username: user.username.clone(),
                avatar_url: Some(uploaded),
            };
            match profile::update_profile(backend, identity, user.id, update).await {
                Ok(_) => {
                    println!("avatar saved");
                    Some(active)
                }
                Err(e) => {
                    eprintln!("! profile update failed: {e}");
                    None
                }
            }
        }
        _ if cmd.starts_with('/') => {
            eprintln!("! unknown command {cmd}; /help lists them");
            None
        }
        // Anything else is a message to the active channel
        _ => match store.send_message(active, user.id, line).await {
            Ok(_) => Some(active),
            Err(e) => {
                eprintln!("! send failed: {e}");
                None
            }
        },
    }
}

fn render(store: &RealtimeStore, identity: &IdentityContext, active: ChannelId) {
    let viewer = identity.current_user();
    let viewer = viewer.as_ref();

    println!("\n-- channels --");
    for channel in store.list_channels() {
        println!("{}", ui::sidebar_line(&channel, viewer, channel.id == active));
    }

    println!("-- #{active} --");
    for message in store.list_messages(active) {
        println!("{}", ui::message_line(&message, viewer));
    }
}
