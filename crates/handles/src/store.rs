use crate::errors::ProfileStoreError;
use crate::types::{AccountId, HandleKind, ProfileHandleRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Source of profile handle snapshots.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile_handle_records(
        &self,
        kind: HandleKind,
    ) -> Result<Vec<ProfileHandleRecord>, ProfileStoreError>;

    /// Number of stored profiles, for health reporting.
    fn profile_count(&self) -> Result<usize, ProfileStoreError>;
}

#[derive(Debug, Clone, Default)]
struct MemoryProfile {
    username: Option<String>,
    display_name: Option<String>,
    is_premium: bool,
}

/// In-memory store keyed by account id. One profile per account.
///
/// Snapshots are returned in account id order, as the sled store does, so
/// identical contents always resolve identically.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<RwLock<BTreeMap<AccountId, MemoryProfile>>>,
    failure: Arc<RwLock<Option<String>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the profile for `account`.
    pub fn upsert(
        &self,
        account: impl Into<AccountId>,
        username: Option<&str>,
        display_name: Option<&str>,
        is_premium: bool,
    ) {
        self.profiles.write().insert(
            account.into(),
            MemoryProfile {
                username: username.map(str::to_string),
                display_name: display_name.map(str::to_string),
                is_premium,
            },
        );
    }

    pub fn remove(&self, account: &AccountId) -> bool {
        self.profiles.write().remove(account).is_some()
    }

    /// Make every subsequent fetch fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write() = Some(message.into());
    }

    pub fn clear_failure(&self) {
        *self.failure.write() = None;
    }

    /// Delay every subsequent fetch, to exercise caller timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch_profile_handle_records(
        &self,
        kind: HandleKind,
    ) -> Result<Vec<ProfileHandleRecord>, ProfileStoreError> {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failure.read().clone() {
            return Err(ProfileStoreError::Backend(message));
        }

        let profiles = self.profiles.read();
        Ok(profiles
            .iter()
            .map(|(account, profile)| {
                let value = match kind {
                    HandleKind::Username => profile.username.clone(),
                    HandleKind::DisplayName => profile.display_name.clone(),
                };
                ProfileHandleRecord::new(account.clone(), value, profile.is_premium)
            })
            .collect())
    }

    fn profile_count(&self) -> Result<usize, ProfileStoreError> {
        Ok(self.profiles.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn projects_records_per_kind() {
        let store = MemoryProfileStore::new();
        store.upsert("u1", Some("ana"), Some("Ana Lima"), true);
        store.upsert("u2", None, Some(""), false);

        let usernames = store
            .fetch_profile_handle_records(HandleKind::Username)
            .await
            .expect("fetch succeeds");
        assert_eq!(usernames.len(), 2);
        let ana = usernames
            .iter()
            .find(|r| r.owner_account_id.as_str() == "u1")
            .expect("u1 present");
        assert_eq!(ana.handle_value.as_deref(), Some("ana"));
        assert!(ana.is_premium_holder);

        let display_names = store
            .fetch_profile_handle_records(HandleKind::DisplayName)
            .await
            .expect("fetch succeeds");
        let u2 = display_names
            .iter()
            .find(|r| r.owner_account_id.as_str() == "u2")
            .expect("u2 present");
        assert_eq!(u2.handle_value, None);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_profile() {
        let store = MemoryProfileStore::new();
        store.upsert("u1", Some("ana"), None, false);
        store.upsert("u1", Some("ana2"), None, true);

        let records = store
            .fetch_profile_handle_records(HandleKind::Username)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].handle_value.as_deref(), Some("ana2"));
        assert_eq!(store.profile_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn snapshot_order_ignores_insertion_order() {
        let forward = MemoryProfileStore::new();
        forward.upsert("u1", Some("ana"), None, false);
        forward.upsert("u9", Some("ANA"), None, true);

        let reversed = MemoryProfileStore::new();
        reversed.upsert("u9", Some("ANA"), None, true);
        reversed.upsert("u1", Some("ana"), None, false);

        for store in [forward, reversed] {
            let owners: Vec<String> = store
                .fetch_profile_handle_records(HandleKind::Username)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.owner_account_id.to_string())
                .collect();
            assert_eq!(owners, vec!["u1", "u9"]);
        }
    }

    #[tokio::test]
    async fn removed_profile_leaves_snapshot() {
        let store = MemoryProfileStore::new();
        store.upsert("u1", Some("ana"), None, true);
        store.upsert("u2", Some("bruno"), None, false);

        assert!(store.remove(&AccountId::from("u1")));
        assert!(!store.remove(&AccountId::from("u1")));

        let records = store
            .fetch_profile_handle_records(HandleKind::Username)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner_account_id.as_str(), "u2");
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_backend_error() {
        let store = MemoryProfileStore::new();
        store.fail_with("connection refused");
        let err = store
            .fetch_profile_handle_records(HandleKind::Username)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileStoreError::Backend(ref m) if m == "connection refused"));

        store.clear_failure();
        assert!(store
            .fetch_profile_handle_records(HandleKind::Username)
            .await
            .is_ok());
    }
}
