use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use cove_types::api::Session;
use cove_types::error::StoreResult;
use cove_types::remote::IdentityProvider;

use crate::local::LocalBackend;

/// Identity provider for the reference backend: sessions are held in memory
/// and signup happens implicitly on first sign-in by email.
pub struct LocalIdentity {
    backend: LocalBackend,
    session: RwLock<Option<Session>>,
}

impl LocalIdentity {
    pub fn new(backend: LocalBackend) -> Self {
        Self {
            backend,
            session: RwLock::new(None),
        }
    }

    /// Sign in by email, creating the user row on first contact.
    pub async fn sign_in(&self, email: &str) -> StoreResult<Session> {
        let user = match self.backend.find_user_by_email(email).await? {
            Some(user) => user,
            None => {
                let user = self.backend.create_user(Uuid::new_v4(), email).await?;
                info!("Created account for {}", email);
                user
            }
        };

        let session = Session {
            user_id: user.id,
            email: user.email,
        };
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_session(&self) -> StoreResult<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn sign_out(&self) -> StoreResult<()> {
        let mut session = self.session.write().await;
        if let Some(old) = session.take() {
            info!("Signed out {}", old.email);
        }
        Ok(())
    }
}
