//! Integration tests for star reconciliation

mod common;

use common::{harness, pids, Scripted};
use core_auth::CredentialState;
use core_library::{ItemRecord, StarRepository, ANY};
use core_sync::RemoteResource;

#[tokio::test]
async fn test_star_is_scoped_to_its_folder() {
    let h = harness(false).await;

    assert!(h.coordinator.add_star("p1", 1, 1, 1).await);

    assert!(h.coordinator.is_starred("p1").await);
    assert!(h.coordinator.is_starred_in("p1", "wrong").await);
    assert!(!h.coordinator.is_starred_in("p1", "review").await);
    assert!(h.coordinator.get_folder(Some("review")).await.is_empty());
}

#[tokio::test]
async fn test_add_star_stamps_iso_time() {
    let h = harness(false).await;
    h.coordinator.add_star("p1", 1, 2, 3).await;
    h.coordinator.add_star("p1", 1, 2, 3).await;

    let folder = h.coordinator.get_folder(None).await;
    assert_eq!(pids(&folder), vec!["p1"]);
    assert_eq!(folder[0].time.as_deref(), Some("2024-03-01T12:00:00.000Z"));
}

#[tokio::test]
async fn test_fetch_replaces_only_default_folder() {
    let h = harness(false).await;
    h.coordinator.add_star("stale", 1, 1, 1).await;
    h.star_store
        .add_to_folder(&ItemRecord::new("kept", 1, 1, 1, "t"), "review")
        .await
        .unwrap();
    h.remote.seed(
        RemoteResource::Star,
        vec![
            ItemRecord::new("x", 1, 1, 1, "t"),
            ItemRecord::new("y", 2, 1, 1, "t"),
        ],
    );
    h.auth.log_in();

    assert_eq!(h.coordinator.try_fetch_stars().await.unwrap(), 2);

    assert_eq!(pids(&h.coordinator.get_folder(None).await), vec!["x", "y"]);
    assert_eq!(
        pids(&h.coordinator.get_folder(Some("review")).await),
        vec!["kept"]
    );
    assert_eq!(
        h.coordinator.list_folders().await,
        vec!["review".to_string(), "wrong".to_string()]
    );
}

#[tokio::test]
async fn test_fetch_skips_remote_stars_without_pid() {
    let h = harness(true).await;
    h.remote.seed(
        RemoteResource::Star,
        vec![
            ItemRecord::new("x", 1, 1, 1, "t"),
            ItemRecord::new(" ", 1, 1, 1, "t"),
        ],
    );

    assert_eq!(h.coordinator.try_fetch_stars().await.unwrap(), 1);
    assert_eq!(pids(&h.coordinator.get_folder(None).await), vec!["x"]);
}

#[tokio::test]
async fn test_online_star_round_trip() {
    let h = harness(true).await;

    assert!(h.coordinator.add_star("p1", 1, 1, 1).await);
    assert_eq!(h.remote.pids(RemoteResource::Star), vec!["p1".to_string()]);
    assert!(h.coordinator.is_starred("p1").await);

    assert!(h.coordinator.remove_star("p1").await);
    assert!(h.remote.pids(RemoteResource::Star).is_empty());
    assert!(!h.coordinator.is_starred("p1").await);

    let deletes = h.remote.calls_of("delete");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].resource, RemoteResource::Star);
}

#[tokio::test]
async fn test_online_star_of_existing_local_item_is_not_duplicated() {
    let h = harness(false).await;
    h.coordinator.add_star("p1", 1, 1, 1).await;
    h.auth.log_in();

    assert!(h.coordinator.add_star("p1", 1, 1, 1).await);

    assert_eq!(h.remote.calls_of("push").len(), 1);
    assert_eq!(h.coordinator.get_folder(None).await.len(), 1);
}

#[tokio::test]
async fn test_expired_star_call_renews_once() {
    let h = harness(true).await;
    h.remote.script([Scripted::Expired]);

    assert!(h.coordinator.add_star("p1", 1, 1, 1).await);

    assert_eq!(h.auth.renewals(), 1);
    assert_eq!(h.remote.calls_of("push").len(), 2);
    assert_eq!(h.coordinator.get_folder(None).await.len(), 1);
}

#[tokio::test]
async fn test_failed_remove_keeps_star() {
    let h = harness(false).await;
    h.coordinator.add_star("p1", 1, 1, 1).await;
    h.auth.log_in();
    h.remote.script([Scripted::Failed("db_error")]);

    assert!(!h.coordinator.remove_star("p1").await);

    assert!(h.coordinator.is_starred("p1").await);
    assert_eq!(h.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_fetch_with_missing_credential_logs_out() {
    let h = harness(true).await;
    h.coordinator.add_star("local", 1, 1, 1).await;
    h.remote.script([Scripted::Missing]);

    assert!(!h.coordinator.fetch_stars().await);

    assert_eq!(h.auth.state(), CredentialState::LoggedOut);
    assert!(h.notifier.messages().is_empty());
    assert!(h.coordinator.is_starred("local").await);
}

#[tokio::test]
async fn test_folder_subject_filter() {
    let h = harness(false).await;
    h.coordinator.add_star("a", 1, 1, 1).await;
    h.coordinator.add_star("b", 1, 2, 2).await;
    h.coordinator.add_star("c", 2, 2, 2).await;

    let course_one = h.coordinator.get_folder_by_subject(1, ANY, ANY, None).await;
    assert_eq!(pids(&course_one), vec!["a", "b"]);

    let by_kind = h.coordinator.get_folder_by_subject(1, ANY, 2, Some("wrong")).await;
    assert_eq!(pids(&by_kind), vec!["b"]);

    assert!(h
        .coordinator
        .get_folder_by_subject(1, ANY, ANY, Some("review"))
        .await
        .is_empty());
}
