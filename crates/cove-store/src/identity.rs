use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::info;

use cove_types::error::StoreResult;
use cove_types::models::{AppRole, UserProfile};
use cove_types::remote::{IdentityProvider, RemoteStore};

/// Resolution lifecycle of the authenticated identity.
#[derive(Debug, Clone)]
enum AuthState {
    Uninitialized,
    Loading,
    Resolved(Option<UserProfile>),
}

/// Process-wide handle to "who is using this client right now".
///
/// Consumers must gate on [`auth_loaded`] before making access-control
/// decisions; until the initial resolution completes, [`current_user`]
/// carries no meaning.
///
/// [`auth_loaded`]: IdentityContext::auth_loaded
/// [`current_user`]: IdentityContext::current_user
pub struct IdentityContext {
    provider: Arc<dyn IdentityProvider>,
    remote: Arc<dyn RemoteStore>,
    state: Mutex<AuthState>,
    watch_tx: watch::Sender<Option<UserProfile>>,
}

impl IdentityContext {
    pub fn new(provider: Arc<dyn IdentityProvider>, remote: Arc<dyn RemoteStore>) -> Self {
        let (watch_tx, _) = watch::channel(None);
        Self {
            provider,
            remote,
            state: Mutex::new(AuthState::Uninitialized),
            watch_tx,
        }
    }

    /// Resolve the provider session and join the profile record by id.
    /// Completes the lifecycle whether a session exists or not.
    pub async fn load(&self) -> StoreResult<Option<UserProfile>> {
        *self.lock() = AuthState::Loading;

        let session = self.provider.current_session().await?;
        let user = match session {
            Some(session) => {
                let profile = self.remote.fetch_user(session.user_id).await?;
                // A session without a profile row can happen right after
                // signup; fall back to what the session itself carries.
                Some(profile.unwrap_or(UserProfile {
                    id: session.user_id,
                    username: None,
                    email: session.email,
                    avatar_url: None,
                    app_role: AppRole::User,
                }))
            }
            None => None,
        };

        *self.lock() = AuthState::Resolved(user.clone());
        self.watch_tx.send_replace(user.clone());
        Ok(user)
    }

    /// Snapshot of the signed-in user, or `None` before resolution or when
    /// signed out.
    pub fn current_user(&self) -> Option<UserProfile> {
        match &*self.lock() {
            AuthState::Resolved(user) => user.clone(),
            _ => None,
        }
    }

    /// True once the initial resolution has completed, success or
    /// "no session".
    pub fn auth_loaded(&self) -> bool {
        matches!(&*self.lock(), AuthState::Resolved(_))
    }

    /// Invalidate the session with the provider, then clear the local
    /// identity. Watchers observe the cleared state before this returns.
    pub async fn sign_out(&self) -> StoreResult<()> {
        self.provider.sign_out().await?;

        *self.lock() = AuthState::Resolved(None);
        self.watch_tx.send_replace(None);
        info!("Signed out; identity cleared");
        Ok(())
    }

    /// Propagate an updated profile (local save or remote push) into the
    /// current identity. Ignored unless it concerns the signed-in user.
    pub fn apply_profile(&self, user: UserProfile) {
        let mut state = self.lock();
        if let AuthState::Resolved(Some(current)) = &*state {
            if current.id == user.id {
                *state = AuthState::Resolved(Some(user.clone()));
                drop(state);
                self.watch_tx.send_replace(Some(user));
            }
        }
    }

    /// Subscribe to identity changes (sign-in, sign-out, profile update).
    pub fn watch(&self) -> watch::Receiver<Option<UserProfile>> {
        self.watch_tx.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthState> {
        // A panicked writer cannot leave AuthState partially written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cove_types::api::{ProfileUpdate, Session};
    use cove_types::events::ChangeEvent;
    use cove_types::models::{Channel, ChannelId, Message, MessageId, UserId};
    use tokio::sync::broadcast;
    use uuid::Uuid;

    struct FakeProvider {
        session: Option<Session>,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn current_session(&self) -> StoreResult<Option<Session>> {
            Ok(self.session.clone())
        }

        async fn sign_out(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    struct FakeRemote {
        user: Option<UserProfile>,
        tx: broadcast::Sender<ChangeEvent>,
    }

    impl FakeRemote {
        fn new(user: Option<UserProfile>) -> Self {
            let (tx, _) = broadcast::channel(16);
            Self { user, tx }
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn fetch_channels(&self) -> StoreResult<Vec<Channel>> {
            Ok(vec![])
        }
        async fn fetch_messages(&self, _channel_id: ChannelId) -> StoreResult<Vec<Message>> {
            Ok(vec![])
        }
        async fn insert_channel(&self, _slug: &str, _created_by: UserId) -> StoreResult<Channel> {
            unimplemented!()
        }
        async fn delete_channel(&self, _id: ChannelId, _acted_by: UserId) -> StoreResult<()> {
            unimplemented!()
        }
        async fn insert_message(
            &self,
            _channel_id: ChannelId,
            _user_id: UserId,
            _body: &str,
        ) -> StoreResult<Message> {
            unimplemented!()
        }
        async fn delete_message(&self, _id: MessageId, _acted_by: UserId) -> StoreResult<()> {
            unimplemented!()
        }
        async fn fetch_user(&self, _id: UserId) -> StoreResult<Option<UserProfile>> {
            Ok(self.user.clone())
        }
        async fn update_user(
            &self,
            _id: UserId,
            _update: &ProfileUpdate,
        ) -> StoreResult<UserProfile> {
            unimplemented!()
        }
        fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
            self.tx.subscribe()
        }
    }

    fn profile(id: Uuid) -> UserProfile {
        UserProfile {
            id,
            username: Some("alice".into()),
            email: "alice@example.com".into(),
            avatar_url: None,
            app_role: AppRole::User,
        }
    }

    #[tokio::test]
    async fn load_resolves_session_and_profile() {
        let id = Uuid::new_v4();
        let provider = Arc::new(FakeProvider {
            session: Some(Session {
                user_id: id,
                email: "alice@example.com".into(),
            }),
        });
        let remote = Arc::new(FakeRemote::new(Some(profile(id))));
        let identity = IdentityContext::new(provider, remote);

        assert!(!identity.auth_loaded());
        assert!(identity.current_user().is_none());

        let user = identity.load().await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert!(identity.auth_loaded());
        assert_eq!(identity.current_user().unwrap().id, id);
    }

    #[tokio::test]
    async fn load_without_session_still_completes() {
        let provider = Arc::new(FakeProvider { session: None });
        let remote = Arc::new(FakeRemote::new(None));
        let identity = IdentityContext::new(provider, remote);

        assert!(identity.load().await.unwrap().is_none());
        assert!(identity.auth_loaded());
        assert!(identity.current_user().is_none());
    }

    #[tokio::test]
    async fn sign_out_clears_before_returning() {
        let id = Uuid::new_v4();
        let provider = Arc::new(FakeProvider {
            session: Some(Session {
                user_id: id,
                email: "alice@example.com".into(),
            }),
        });
        let remote = Arc::new(FakeRemote::new(Some(profile(id))));
        let identity = IdentityContext::new(provider, remote);
        identity.load().await.unwrap();

        let watcher = identity.watch();
        identity.sign_out().await.unwrap();

        // No stale reads after the awaited call returns
        assert!(identity.current_user().is_none());
        assert!(watcher.borrow().is_none());
        assert!(identity.auth_loaded());
    }

    #[tokio::test]
    async fn apply_profile_only_touches_the_signed_in_user() {
        let id = Uuid::new_v4();
        let provider = Arc::new(FakeProvider {
            session: Some(Session {
                user_id: id,
                email: "alice@example.com".into(),
            }),
        });
        let remote = Arc::new(FakeRemote::new(Some(profile(id))));
        let identity = IdentityContext::new(provider, remote);
        identity.load().await.unwrap();

        // Somebody else's update is ignored
        identity.apply_profile(profile(Uuid::new_v4()));
        assert_eq!(identity.current_user().unwrap().username.as_deref(), Some("alice"));

        let mut updated = profile(id);
        updated.username = Some("skippy".into());
        identity.apply_profile(updated);
        assert_eq!(identity.current_user().unwrap().username.as_deref(), Some("skippy"));
    }
}
