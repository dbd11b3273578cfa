//! Integration tests for the sled-backed profile store.

use gigboard_handles::{
    AccountId, AvailabilityQuery, HandleKind, HandleReservationResolver, ProfileStore, ReasonCode,
};
use gigboard_storage::{SledProfileStore, StoredProfile};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn open_store() -> (TempDir, SledProfileStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = SledProfileStore::new(dir.path().join("db")).expect("open sled");
    (dir, store)
}

#[test]
fn put_profile_replaces_existing_row() {
    let (_dir, store) = open_store();
    store
        .put_profile(&StoredProfile::new("u1").with_username("ana"))
        .unwrap();
    store
        .put_profile(&StoredProfile::new("u1").with_username("ana_b").premium(true))
        .unwrap();

    assert_eq!(store.count(), 1);
    let profile = store.get_profile(&AccountId::from("u1")).unwrap().unwrap();
    assert_eq!(profile.username.as_deref(), Some("ana_b"));
    assert!(profile.is_premium);
}

#[test]
fn remove_profile_reports_presence() {
    let (_dir, store) = open_store();
    store.put_profile(&StoredProfile::new("u1")).unwrap();

    assert!(store.remove_profile(&AccountId::from("u1")).unwrap());
    assert!(!store.remove_profile(&AccountId::from("u1")).unwrap());
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn blank_values_project_as_unset() {
    let (_dir, store) = open_store();
    store
        .put_profile(
            &StoredProfile::new("u1")
                .with_username("ana")
                .with_display_name("  "),
        )
        .unwrap();

    let names = store
        .fetch_profile_handle_records(HandleKind::DisplayName)
        .await
        .unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].handle_value, None);

    let usernames = store
        .fetch_profile_handle_records(HandleKind::Username)
        .await
        .unwrap();
    assert_eq!(usernames[0].handle_value.as_deref(), Some("ana"));
}

#[tokio::test]
async fn profiles_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    {
        let store = SledProfileStore::new(&path).unwrap();
        store
            .put_profile(&StoredProfile::new("u1").with_username("ana").premium(true))
            .unwrap();
        store.flush().unwrap();
    }

    let store = SledProfileStore::new(&path).unwrap();
    let records = store
        .fetch_profile_handle_records(HandleKind::Username)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_premium_holder);
}

#[tokio::test]
async fn resolver_reads_through_sled_store() {
    let (_dir, store) = open_store();
    store
        .put_profile(&StoredProfile::new("u1").with_username("Ana").premium(true))
        .unwrap();
    store
        .put_profile(&StoredProfile::new("u3").with_username("bob"))
        .unwrap();
    let resolver = HandleReservationResolver::new(Arc::new(store));

    let taken = resolver
        .query(&AvailabilityQuery::username("ana", Some("u2")))
        .await;
    assert!(!taken.available);
    assert_eq!(taken.reason_code, ReasonCode::HeldByPremium);

    let contestable = resolver
        .query(&AvailabilityQuery::username("BOB", Some("u2")))
        .await;
    assert!(contestable.available);
    assert_eq!(contestable.reason_code, ReasonCode::CanTakeFromNonPremium);
}

#[tokio::test]
async fn slow_scan_times_out_as_store_unavailable() {
    let (_dir, store) = open_store();
    for i in 0..50_000 {
        let profile = StoredProfile::new(format!("account-{i:06}").as_str())
            .with_username(format!("user_{i}"))
            .with_display_name(format!("Member number {i} of the marketplace"));
        store.put_profile(&profile).unwrap();
    }
    let resolver = HandleReservationResolver::new(Arc::new(store))
        .with_store_timeout(Duration::from_millis(1));

    let response = resolver
        .query(&AvailabilityQuery::username("nobody", Some("u2")))
        .await;
    assert_eq!(response.reason_code, ReasonCode::StoreUnavailable);
    assert!(response.retryable);
}
