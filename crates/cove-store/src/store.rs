use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cove_types::error::{StoreError, StoreResult};
use cove_types::events::ChangeEvent;
use cove_types::models::{
    Channel, ChannelId, DEFAULT_CHANNEL_ID, Message, MessageId, UserId,
};
use cove_types::remote::RemoteStore;
use cove_types::slug::slugify;

use crate::identity::IdentityContext;

/// The client's working copy of channels and per-channel message sequences.
///
/// All mutation — whether a local operation or a merged remote event — runs
/// to completion under one lock, so merges never interleave. Merges are
/// keyed on server-assigned ids and are idempotent: duplicate or
/// out-of-order delivery cannot corrupt the visible state, and display
/// order is recomputed by sorting on `inserted_at` rather than taken from
/// arrival order.
pub struct RealtimeStore {
    remote: Arc<dyn RemoteStore>,
    identity: Arc<IdentityContext>,
    state: Mutex<StoreState>,
    revision_tx: watch::Sender<u64>,
}

#[derive(Default)]
struct StoreState {
    /// Unique by id, insertion order preserved for rendering
    channels: Vec<Channel>,
    /// Message sequences for hydrated (actively viewed) channels only
    messages: HashMap<ChannelId, Vec<Message>>,
    /// Counter for provisional (optimistic, unacknowledged) message ids
    provisional_seq: i64,
}

impl RealtimeStore {
    pub fn new(remote: Arc<dyn RemoteStore>, identity: Arc<IdentityContext>) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            remote,
            identity,
            state: Mutex::new(StoreState::default()),
            revision_tx,
        }
    }

    /// Subscribe to "state changed" notifications; the value is a revision
    /// counter bumped after every visible mutation.
    pub fn changed(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    /// Spawn the single consumer task draining the remote change feed.
    pub fn spawn_event_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut rx = store.remote.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => store.apply_event(event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Change feed lagged, {} events dropped; refetch advised", missed);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // -- Channels --

    /// Replace the channel set from the remote snapshot. Message sequences
    /// for channels absent from the snapshot are dropped in the same lock,
    /// so a DELETE missed while the feed lagged cannot strand messages
    /// behind a channel the snapshot no longer lists.
    pub async fn load_channels(&self) -> StoreResult<Vec<Channel>> {
        let channels = self.remote.fetch_channels().await?;
        {
            let mut state = self.lock();
            state.channels.clear();
            for channel in &channels {
                merge_channel(&mut state.channels, channel.clone());
            }
            state
                .messages
                .retain(|id, _| channels.iter().any(|c| c.id == *id));
        }
        self.bump();
        Ok(channels)
    }

    /// Local snapshot; never blocks on the network.
    pub fn list_channels(&self) -> Vec<Channel> {
        self.lock().channels.clone()
    }

    /// Normalize the name into a slug, submit it, and merge the
    /// authoritative row. The later INSERT echo is a no-op against the
    /// id-keyed merge, so the channel appears exactly once.
    pub async fn create_channel(&self, name: &str, created_by: UserId) -> StoreResult<Channel> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(StoreError::validation(format!(
                "channel name {name:?} normalizes to an empty slug"
            )));
        }

        let channel = self.remote.insert_channel(&slug, created_by).await?;
        {
            let mut state = self.lock();
            merge_channel(&mut state.channels, channel.clone());
        }
        self.bump();
        Ok(channel)
    }

    /// Local fast-path rejection for the default channel happens before any
    /// network call; otherwise the remote store is the authoritative check.
    /// On confirmation the channel and its message sequence are evicted
    /// atomically.
    pub async fn delete_channel(&self, id: ChannelId, acted_by: UserId) -> StoreResult<()> {
        if id == DEFAULT_CHANNEL_ID {
            return Err(StoreError::authorization("the default channel cannot be deleted"));
        }

        self.remote.delete_channel(id, acted_by).await?;
        if self.evict_channel(id) {
            self.bump();
        }
        Ok(())
    }

    // -- Messages --

    /// Hydrate the message sequence for an active channel view.
    pub async fn open_channel(&self, id: ChannelId) -> StoreResult<Vec<Message>> {
        let fetched = self.remote.fetch_messages(id).await?;
        {
            let mut state = self.lock();
            let seq = state.messages.entry(id).or_default();
            for message in fetched {
                merge_message(seq, message);
            }
        }
        self.bump();
        Ok(self.list_messages(id))
    }

    /// Tear down the sequence when the view unmounts; later events for this
    /// channel are dropped until it is opened again.
    pub fn close_channel(&self, id: ChannelId) {
        let removed = self.lock().messages.remove(&id).is_some();
        if removed {
            self.bump();
        }
    }

    /// Snapshot ordered by `inserted_at` ascending (ties broken by id).
    pub fn list_messages(&self, channel_id: ChannelId) -> Vec<Message> {
        let mut messages = self
            .lock()
            .messages
            .get(&channel_id)
            .cloned()
            .unwrap_or_default();
        messages.sort_by(|a, b| {
            a.inserted_at.cmp(&b.inserted_at).then(a.id.cmp(&b.id))
        });
        messages
    }

    /// Optimistically echo the message locally (read-your-writes), then
    /// submit it. On ack the provisional entry is swapped for the
    /// authoritative row; on failure it is rolled back, restoring the
    /// pre-send snapshot exactly.
    pub async fn send_message(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        text: &str,
    ) -> StoreResult<Message> {
        let body = text.trim();
        if body.is_empty() {
            return Err(StoreError::validation("message text must not be empty"));
        }

        let author = self
            .identity
            .current_user()
            .filter(|user| user.id == user_id);

        let provisional_id = {
            let mut state = self.lock();
            state.provisional_seq += 1;
            // Never a server id: the store must not fabricate permanent
            // identifiers, so unacknowledged entries live below zero
            let id = -state.provisional_seq;
            let echo = Message {
                id,
                channel_id,
                user_id,
                message: body.to_string(),
                inserted_at: chrono::Utc::now(),
                author,
            };
            state.messages.entry(channel_id).or_default().push(echo);
            id
        };
        self.bump();

        match self.remote.insert_message(channel_id, user_id, body).await {
            Ok(message) => {
                {
                    let mut state = self.lock();
                    if let Some(seq) = state.messages.get_mut(&channel_id) {
                        seq.retain(|m| m.id != provisional_id);
                        merge_message(seq, message.clone());
                    }
                }
                self.bump();
                Ok(message)
            }
            Err(err) => {
                // Roll back the optimistic echo
                {
                    let mut state = self.lock();
                    if let Some(seq) = state.messages.get_mut(&channel_id) {
                        seq.retain(|m| m.id != provisional_id);
                    }
                }
                self.bump();
                Err(err)
            }
        }
    }

    /// Authorization is evaluated by the caller via [`crate::auth`] and
    /// re-validated by the remote store; removal happens on confirmation or
    /// on the corresponding DELETE event, whichever lands first.
    pub async fn delete_message(&self, id: MessageId, acted_by: UserId) -> StoreResult<()> {
        self.remote.delete_message(id, acted_by).await?;
        if self.remove_message(id) {
            self.bump();
        }
        Ok(())
    }

    // -- Event merge --

    /// Merge one remote change event into local state. Safe to call with
    /// duplicated or reordered events.
    pub fn apply_event(&self, event: ChangeEvent) {
        debug!("Merging remote event: {:?}", event);
        let changed = {
            let mut state = self.lock();
            match event {
                ChangeEvent::ChannelInsert { channel } => {
                    merge_channel(&mut state.channels, channel)
                }
                ChangeEvent::ChannelDelete { id } => evict_channel_locked(&mut state, id),
                ChangeEvent::MessageInsert { message } => {
                    match state.messages.get_mut(&message.channel_id) {
                        Some(seq) => {
                            // The echo of our own optimistic write may beat
                            // the ack; retire the matching provisional entry
                            // so the pair collapses into one row
                            retire_provisional(seq, &message);
                            merge_message(seq, message)
                        }
                        // Not hydrated: no view is mounted for this channel
                        None => false,
                    }
                }
                ChangeEvent::MessageDelete { id, channel_id } => {
                    match state.messages.get_mut(&channel_id) {
                        Some(seq) => {
                            let before = seq.len();
                            seq.retain(|m| m.id != id);
                            seq.len() != before
                        }
                        None => false,
                    }
                }
                ChangeEvent::UserUpdate { user } => {
                    drop(state);
                    // Identity refresh only; author snapshots already held
                    // in message sequences keep their fetch-time values
                    self.identity.apply_profile(user);
                    return;
                }
            }
        };

        if changed {
            self.bump();
        }
    }

    // -- Internals --

    fn evict_channel(&self, id: ChannelId) -> bool {
        evict_channel_locked(&mut self.lock(), id)
    }

    fn remove_message(&self, id: MessageId) -> bool {
        let mut state = self.lock();
        let mut removed = false;
        for seq in state.messages.values_mut() {
            let before = seq.len();
            seq.retain(|m| m.id != id);
            removed |= seq.len() != before;
        }
        removed
    }

    fn bump(&self) {
        self.revision_tx.send_modify(|rev| *rev += 1);
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // Mutations run to completion under the lock; recover on poison
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Id-keyed set-union insert. Returns true if the channel was new.
fn merge_channel(channels: &mut Vec<Channel>, channel: Channel) -> bool {
    if channels.iter().any(|c| c.id == channel.id) {
        return false;
    }
    channels.push(channel);
    true
}

/// Remove the channel and its message sequence in one step, so no observer
/// can see messages for a channel absent from the channel set.
fn evict_channel_locked(state: &mut StoreState, id: ChannelId) -> bool {
    let before = state.channels.len();
    state.channels.retain(|c| c.id != id);
    let removed_channel = state.channels.len() != before;
    let removed_messages = state.messages.remove(&id).is_some();
    removed_channel || removed_messages
}

/// Id-keyed set-union insert. Returns true if the message was new.
fn merge_message(seq: &mut Vec<Message>, message: Message) -> bool {
    if seq.iter().any(|m| m.id == message.id) {
        return false;
    }
    seq.push(message);
    true
}

/// Drop at most one provisional entry matching the incoming authoritative
/// row by author and body. Provisional ids are local-only, so the id-keyed
/// union alone cannot pair an echo with its optimistic write.
fn retire_provisional(seq: &mut Vec<Message>, incoming: &Message) {
    if let Some(pos) = seq.iter().position(|m| {
        m.is_provisional() && m.user_id == incoming.user_id && m.message == incoming.message
    }) {
        seq.remove(pos);
    }
}
