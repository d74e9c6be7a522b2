use indexmap::IndexMap;
use tracing::warn;
use uuid::Uuid;

use crate::dao::{
    local_store::LocalStore,
    models::ProfileRecord,
    storage::{LoadError, WriteError},
};

/// Key of the stable pseudo-identity of this profile.
pub const USER_ID_KEY: &str = "sports_user_id";
/// Key of the profile-by-id index.
pub const PROFILES_KEY: &str = "sports_profiles";
/// Key of the "current profile" pointer.
pub const CURRENT_PROFILE_KEY: &str = "sports_current_profile";

/// Generate a fresh client-side pseudo-identity.
pub fn new_pseudo_identity() -> String {
    format!("user_{}", Uuid::new_v4().simple())
}

/// Profile-related keys of the local medium.
pub struct ProfileCache<'a> {
    store: &'a LocalStore,
}

impl<'a> ProfileCache<'a> {
    /// Cache backed by `store`.
    pub fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    /// Stable pseudo-identity of this profile, created on first use.
    pub fn user_id(&self) -> Result<String, WriteError> {
        match self.store.load_json::<String>(USER_ID_KEY) {
            Ok(user_id) if !user_id.is_empty() => Ok(user_id),
            Ok(_) | Err(LoadError::NotFound { .. }) => self.create_user_id(),
            Err(err) => {
                warn!(error = %err, "stored user id unreadable; generating a new one");
                self.create_user_id()
            }
        }
    }

    /// Every cached profile keyed by `userId`. Missing or unreadable indexes
    /// read as empty.
    pub fn profiles(&self) -> IndexMap<String, ProfileRecord> {
        match self.store.load_json(PROFILES_KEY) {
            Ok(profiles) => profiles,
            Err(LoadError::NotFound { .. }) => IndexMap::new(),
            Err(err) => {
                warn!(error = %err, "profile index unreadable; treating as empty");
                IndexMap::new()
            }
        }
    }

    /// Profile the current pointer refers to.
    pub fn current_profile(&self) -> Option<ProfileRecord> {
        let user_id = self.store.load_json::<String>(CURRENT_PROFILE_KEY).ok()?;
        self.profiles().shift_remove(&user_id)
    }

    /// Store `profile` in the index and make it the current profile.
    pub fn save_profile(&self, profile: &ProfileRecord) -> Result<(), WriteError> {
        let mut profiles = self.profiles();
        profiles.insert(profile.user_id.clone(), profile.clone());
        self.store.save_json(PROFILES_KEY, &profiles)?;
        self.store.save_json(CURRENT_PROFILE_KEY, &profile.user_id)?;
        Ok(())
    }

    fn create_user_id(&self) -> Result<String, WriteError> {
        let user_id = new_pseudo_identity();
        self.store.save_json(USER_ID_KEY, &user_id)?;
        Ok(user_id)
    }
}
