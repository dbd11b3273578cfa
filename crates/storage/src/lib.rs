use async_trait::async_trait;
use gigboard_handles::{
    AccountId, HandleKind, ProfileHandleRecord, ProfileStore, ProfileStoreError,
};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for ProfileStoreError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Serialization(err) => ProfileStoreError::Serialization(err),
            StorageError::Database(err) => ProfileStoreError::Backend(err.to_string()),
        }
    }
}

/// Profile row as written by profile management
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProfile {
    pub account_id: AccountId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
}

impl StoredProfile {
    pub fn new(account_id: impl Into<AccountId>) -> Self {
        Self {
            account_id: account_id.into(),
            username: None,
            display_name: None,
            is_premium: false,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn premium(mut self, is_premium: bool) -> Self {
        self.is_premium = is_premium;
        self
    }

    /// Project this row onto the handle field selected by `kind`.
    pub fn handle_record(&self, kind: HandleKind) -> ProfileHandleRecord {
        let value = match kind {
            HandleKind::Username => self.username.clone(),
            HandleKind::DisplayName => self.display_name.clone(),
        };
        ProfileHandleRecord::new(self.account_id.clone(), value, self.is_premium)
    }
}

/// Profile store persisted in sled, one row per account id.
#[derive(Debug, Clone)]
pub struct SledProfileStore {
    db: Db,
    profiles: Tree,
}

impl SledProfileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let profiles = db.open_tree("profiles")?;
        Ok(Self { db, profiles })
    }

    /// Insert or replace the profile for its account.
    pub fn put_profile(&self, profile: &StoredProfile) -> Result<(), StorageError> {
        let data = serde_json::to_vec(profile)?;
        self.profiles
            .insert(profile.account_id.as_str().as_bytes(), data)?;
        Ok(())
    }

    pub fn get_profile(&self, account: &AccountId) -> Result<Option<StoredProfile>, StorageError> {
        self.profiles
            .get(account.as_str().as_bytes())?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    pub fn remove_profile(&self, account: &AccountId) -> Result<bool, StorageError> {
        Ok(self.profiles.remove(account.as_str().as_bytes())?.is_some())
    }

    pub fn all_profiles(&self) -> Result<Vec<StoredProfile>, StorageError> {
        let mut out = Vec::new();
        for item in self.profiles.iter() {
            let (_, val) = item?;
            out.push(serde_json::from_slice(&val)?);
        }
        Ok(out)
    }

    pub fn count(&self) -> usize {
        self.profiles.len()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SledProfileStore {
    async fn fetch_profile_handle_records(
        &self,
        kind: HandleKind,
    ) -> Result<Vec<ProfileHandleRecord>, ProfileStoreError> {
        // Blocking scan, kept off the async workers.
        let store = self.clone();
        let profiles = tokio::task::spawn_blocking(move || store.all_profiles())
            .await
            .map_err(|err| ProfileStoreError::Backend(format!("profile scan task failed: {err}")))??;
        tracing::trace!(%kind, profiles = profiles.len(), "loaded profile handle snapshot");
        Ok(profiles
            .iter()
            .map(|profile| profile.handle_record(kind))
            .collect())
    }

    fn profile_count(&self) -> Result<usize, ProfileStoreError> {
        Ok(self.count())
    }
}
