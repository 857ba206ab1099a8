//! Profile update flow: username/avatar changes against the remote user
//! record, propagated into the identity context on success.

use cove_types::api::ProfileUpdate;
use cove_types::error::{StoreError, StoreResult};
use cove_types::models::{UserId, UserProfile};
use cove_types::remote::{ObjectStorage, RemoteStore};

use crate::identity::IdentityContext;

/// Apply a profile update. `None` fields clear their column
/// (explicit-null-to-clear); `Some` fields must be non-empty.
///
/// Author snapshots already denormalized into fetched message sequences are
/// deliberately left stale; only the identity context is refreshed.
pub async fn update_profile(
    remote: &dyn RemoteStore,
    identity: &IdentityContext,
    user_id: UserId,
    update: ProfileUpdate,
) -> StoreResult<UserProfile> {
    let update = ProfileUpdate {
        username: normalize_field(update.username, "username")?,
        avatar_url: normalize_field(update.avatar_url, "avatar_url")?,
    };

    let user = remote.update_user(user_id, &update).await?;
    identity.apply_profile(user.clone());
    Ok(user)
}

/// Upload an avatar blob under a path scoped to the user's own identifier
/// and return its public URL. The caller stores the URL via
/// [`update_profile`].
pub async fn upload_avatar(
    storage: &dyn ObjectStorage,
    user_id: UserId,
    file_name: &str,
    bytes: Vec<u8>,
) -> StoreResult<String> {
    let ext = file_name
        .rsplit('.')
        .next()
        .filter(|ext| !ext.is_empty() && *ext != file_name)
        .ok_or_else(|| {
            StoreError::validation(format!("file name {file_name:?} has no extension"))
        })?;

    let path = format!("{user_id}/{user_id}.{ext}");
    storage.upload(&path, bytes).await
}

fn normalize_field(value: Option<String>, field: &str) -> StoreResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(StoreError::validation(format!(
                    "{field} must be non-empty; pass null to clear it"
                )));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}
