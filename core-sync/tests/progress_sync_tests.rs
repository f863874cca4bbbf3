//! Integration tests for progress reconciliation
//!
//! Runs the coordinator against an in-memory SQLite store, a scripted
//! remote and a fake credential gateway.

mod common;

use common::{drain, harness, harness_with, pids, Scripted};
use core_auth::CredentialState;
use core_library::{ItemRecord, ProgressRepository, ANY};
use core_runtime::events::{CoreEvent, SyncEvent};
use core_runtime::UserSettings;
use core_sync::{CounterSnapshot, Curriculum, RemoteResource, SyncError, SyncOptions};

// ============================================================================
// Offline mode
// ============================================================================

#[tokio::test]
async fn test_add_twice_offline_keeps_one_record() {
    let h = harness(false).await;

    assert!(h.coordinator.add_progress("q1", 1, 2, 3).await);
    assert!(h.coordinator.add_progress("q1", 1, 2, 3).await);

    let all = h.coordinator.get_all_progress().await;
    assert_eq!(pids(&all), vec!["q1"]);
    assert_eq!(all[0].course, Some(1));
    assert_eq!(all[0].kind, Some(3));
    assert_eq!(all[0].time.as_deref(), Some("1709294400000"));

    // the duplicate add changed nothing, so its counter bump was undone
    assert_eq!(h.coordinator.counter().current, 1);
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_offline_mutations_never_fail() {
    let h = harness(false).await;
    // would break any remote call that happened
    h.remote.script([Scripted::Failed("unreachable")]);

    assert!(h.coordinator.add_progress("q1", 1, 1, 1).await);
    assert!(
        h.coordinator
            .add_progress_batch(&["q2".to_string(), "q3".to_string()])
            .await
    );
    assert!(h.coordinator.delete_progress("q2").await);
    assert!(h.coordinator.delete_progress("never-added").await);
    assert!(h.coordinator.add_star("s1", 1, 1, 1).await);
    assert!(h.coordinator.remove_star("s1").await);
    assert!(h.coordinator.remove_star("never-starred").await);

    assert!(h.remote.calls().is_empty());
    assert!(h.notifier.messages().is_empty());
    assert_eq!(
        pids(&h.coordinator.get_all_progress().await),
        vec!["q1", "q3"]
    );
}

#[tokio::test]
async fn test_delete_after_add_offline_and_online() {
    for logged_in in [false, true] {
        let h = harness(logged_in).await;

        assert!(h.coordinator.add_progress("q1", 1, 1, 1).await);
        assert!(h.coordinator.delete_progress("q1").await);

        assert!(!h.coordinator.has_progress("q1").await);
        assert!(h.coordinator.get_all_progress().await.is_empty());
        assert_eq!(h.coordinator.counter().current, 0);
        assert!(h.remote.pids(RemoteResource::Progress).is_empty());
    }
}

#[tokio::test]
async fn test_batch_add_records_have_no_classification() {
    let h = harness(false).await;
    h.coordinator.add_progress("a", 1, 2, 3).await;

    let added = h
        .coordinator
        .try_add_progress_batch(&["a".to_string(), "b".to_string(), "c".to_string()])
        .await
        .unwrap();

    assert_eq!(added, 2);
    let all = h.coordinator.get_all_progress().await;
    assert_eq!(pids(&all), vec!["a", "b", "c"]);
    assert_eq!(all[0].course, Some(1));
    assert_eq!(all[1].course, None);
    assert_eq!(all[2].subject, None);
    assert_eq!(all[2].kind, None);
    assert_eq!(h.coordinator.counter().current, 3);
}

// ============================================================================
// Queries and counter
// ============================================================================

#[tokio::test]
async fn test_subject_wildcards() {
    let h = harness(false).await;
    h.coordinator.add_progress("a", 1, 1, 1).await;
    h.coordinator.add_progress("b", 1, 2, 3).await;
    h.coordinator.add_progress("c", 2, 1, 1).await;

    let any = h.coordinator.get_progress_by_subject(1, ANY, ANY).await;
    assert_eq!(pids(&any), vec!["a", "b"]);

    let by_subject = h.coordinator.get_progress_by_subject(1, 2, ANY).await;
    assert_eq!(pids(&by_subject), vec!["b"]);

    let by_kind = h.coordinator.get_progress_by_subject(2, ANY, 1).await;
    assert_eq!(pids(&by_kind), vec!["c"]);

    assert!(h.coordinator.get_progress_by_subject(3, ANY, ANY).await.is_empty());
}

#[tokio::test]
async fn test_update_counter_recounts_from_store() {
    let h = harness(false).await;
    h.coordinator.add_progress("a", 1, 1, 1).await;
    h.coordinator.add_progress("b", 1, 1, 1).await;
    // drift the counter behind the store's back
    h.progress_store
        .replace_all(&[ItemRecord::new("a", 1, 1, 1, "0")])
        .await
        .unwrap();
    let mut rx = h.events.subscribe();

    let snapshot = h.coordinator.update_counter(Curriculum::new(100, 50)).await;

    let expected = CounterSnapshot {
        current: 1,
        total: 150,
    };
    assert_eq!(snapshot, expected);
    assert_eq!(h.coordinator.counter(), expected);
    assert!(drain(&mut rx).contains(&CoreEvent::Sync(SyncEvent::CounterUpdated {
        current: 1,
        total: 150
    })));
}

// ============================================================================
// Online mutations
// ============================================================================

#[tokio::test]
async fn test_online_add_is_pushed_then_stored() {
    let h = harness(true).await;
    let mut rx = h.events.subscribe();

    assert!(h.coordinator.add_progress("q1", 1, 1, 1).await);

    let pushes = h.remote.calls_of("push");
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].pids, vec!["q1".to_string()]);
    assert_eq!(pushes[0].token, "token-0");
    assert!(h.coordinator.has_progress("q1").await);
    assert!(drain(&mut rx).contains(&CoreEvent::Sync(SyncEvent::ProgressAdded {
        pid: "q1".to_string(),
        synced: true
    })));
}

#[tokio::test]
async fn test_expired_credential_retry_converges() {
    let h = harness(true).await;
    h.remote.script([Scripted::Expired]);

    assert!(h.coordinator.add_progress("p", 1, 1, 1).await);

    assert_eq!(pids(&h.coordinator.get_all_progress().await), vec!["p"]);
    assert_eq!(h.auth.renewals(), 1);
    assert_eq!(h.remote.pids(RemoteResource::Progress), vec!["p".to_string()]);

    let tokens: Vec<String> = h
        .remote
        .calls_of("push")
        .into_iter()
        .map(|c| c.token)
        .collect();
    assert_eq!(tokens, vec!["token-0".to_string(), "token-1".to_string()]);
    assert_eq!(h.coordinator.counter().current, 1);
}

#[tokio::test]
async fn test_retry_stops_after_policy_bound() {
    let h = harness(true).await;
    h.remote
        .script([Scripted::Expired, Scripted::Expired, Scripted::Expired]);

    let result = h.coordinator.try_add_progress("p", 1, 1, 1).await;

    match result {
        Err(SyncError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    assert_eq!(h.auth.renewals(), 2);
    assert_eq!(h.remote.calls_of("push").len(), 3);
    assert!(!h.coordinator.has_progress("p").await);
    assert_eq!(h.coordinator.counter().current, 0);
}

#[tokio::test]
async fn test_exhausted_retry_is_notified() {
    let h = harness(true).await;
    h.remote
        .script([Scripted::Expired, Scripted::Expired, Scripted::Expired]);

    assert!(!h.coordinator.add_progress("p", 1, 1, 1).await);

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Failed to add progress"));
}

#[tokio::test]
async fn test_missing_credential_logs_out_silently() {
    let h = harness(true).await;
    h.remote.script([Scripted::Missing]);
    let mut rx = h.events.subscribe();

    assert!(!h.coordinator.add_progress("p", 1, 1, 1).await);

    assert_eq!(h.auth.state(), CredentialState::LoggedOut);
    assert!(h.notifier.messages().is_empty());
    assert!(!h.coordinator.has_progress("p").await);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, CoreEvent::Sync(SyncEvent::Failed { .. }))));

    // the next add runs in local-only mode
    assert!(h.coordinator.add_progress("p", 1, 1, 1).await);
    assert!(h.coordinator.has_progress("p").await);
}

#[tokio::test]
async fn test_missing_credential_during_refresh_keeps_session() {
    let h = harness(true).await;
    h.auth.set_state(CredentialState::Refreshing);
    h.remote.script([Scripted::Missing]);

    assert!(!h.coordinator.delete_progress("p").await);

    assert_eq!(h.auth.state(), CredentialState::Refreshing);
}

#[tokio::test]
async fn test_failed_delete_leaves_local_state() {
    let h = harness(false).await;
    h.coordinator.add_progress("p", 1, 1, 1).await;
    h.auth.log_in();
    h.remote.script([Scripted::Transport]);

    assert!(!h.coordinator.delete_progress("p").await);

    assert!(h.coordinator.has_progress("p").await);
    assert_eq!(h.coordinator.counter().current, 1);
    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("connection reset"));
}

#[tokio::test]
async fn test_remote_failure_detail_reaches_notification() {
    let h = harness(true).await;
    h.remote.script([Scripted::Failed("server_busy")]);

    assert!(!h.coordinator.add_progress("p", 1, 1, 1).await);

    assert!(h.notifier.messages()[0].contains("server_busy"));
    assert_eq!(h.auth.renewals(), 0);
}

// ============================================================================
// Fetch and merge
// ============================================================================

#[tokio::test]
async fn test_merge_pushes_local_only_records() {
    let h = harness(false).await;
    for pid in ["A", "B", "C"] {
        h.coordinator.add_progress(pid, 1, 1, 1).await;
    }
    h.remote
        .seed(RemoteResource::Progress, vec![ItemRecord::new("A", 1, 1, 1, "0")]);
    h.auth.log_in();

    let report = h.coordinator.try_fetch_and_merge().await.unwrap();

    assert_eq!(report.rounds, 2);
    assert_eq!(report.pushed, 2);
    assert_eq!(report.records, 3);

    let pushes = h.remote.calls_of("push");
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].pids, vec!["B".to_string(), "C".to_string()]);

    let mut remote = h.remote.pids(RemoteResource::Progress);
    remote.sort();
    assert_eq!(remote, vec!["A", "B", "C"]);

    let local = h.coordinator.get_all_progress().await;
    for pid in ["A", "B", "C"] {
        assert!(pids(&local).contains(&pid), "{} lost by merge", pid);
    }
    assert_eq!(h.coordinator.counter().current, 3);
}

#[tokio::test]
async fn test_merge_adopts_remote_when_not_behind() {
    let h = harness(true).await;
    h.progress_store
        .replace_all(&[ItemRecord::new("A", 1, 1, 1, "0")])
        .await
        .unwrap();
    h.remote.seed(
        RemoteResource::Progress,
        vec![
            ItemRecord::new("A", 1, 2, 2, "0"),
            ItemRecord::new("B", 1, 1, 1, "0"),
        ],
    );

    assert!(h.coordinator.fetch_and_merge().await);

    let local = h.coordinator.get_all_progress().await;
    assert_eq!(pids(&local), vec!["A", "B"]);
    assert_eq!(local[0].subject, Some(2));
    assert!(h.remote.calls_of("push").is_empty());
}

#[tokio::test]
async fn test_merge_without_auto_sync_replaces_local() {
    let h = harness(true).await;
    h.progress_store
        .replace_all(&[
            ItemRecord::new("A", 1, 1, 1, "0"),
            ItemRecord::new("B", 1, 1, 1, "0"),
        ])
        .await
        .unwrap();
    h.remote
        .seed(RemoteResource::Progress, vec![ItemRecord::new("C", 1, 1, 1, "0")]);
    h.coordinator
        .update_settings(UserSettings {
            auto_sync_data: false,
            ..UserSettings::default()
        })
        .await;

    assert!(h.coordinator.fetch_and_merge().await);

    assert_eq!(pids(&h.coordinator.get_all_progress().await), vec!["C"]);
    assert_eq!(h.remote.calls().len(), 1);
}

#[tokio::test]
async fn test_merge_rounds_are_bounded() {
    let h = harness_with(
        true,
        SyncOptions {
            max_merge_rounds: 2,
            ..SyncOptions::default()
        },
    )
    .await;
    h.progress_store
        .replace_all(&[
            ItemRecord::new("A", 1, 1, 1, "0"),
            ItemRecord::new("B", 1, 1, 1, "0"),
        ])
        .await
        .unwrap();
    h.remote.ignore_pushes();

    let result = h.coordinator.try_fetch_and_merge().await;

    assert!(matches!(
        result,
        Err(SyncError::MergeIncomplete {
            rounds: 3,
            outstanding: 2
        })
    ));
    assert_eq!(h.remote.calls_of("push").len(), 2);
    assert_eq!(pids(&h.coordinator.get_all_progress().await), vec!["A", "B"]);

    assert!(!h.coordinator.fetch_and_merge().await);
    assert_eq!(h.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_single_merge_round_still_pushes_and_verifies() {
    let h = harness_with(
        true,
        SyncOptions {
            max_merge_rounds: 1,
            ..SyncOptions::default()
        },
    )
    .await;
    h.progress_store
        .replace_all(&[
            ItemRecord::new("A", 1, 1, 1, "0"),
            ItemRecord::new("B", 1, 1, 1, "0"),
        ])
        .await
        .unwrap();

    let report = h.coordinator.try_fetch_and_merge().await.unwrap();

    assert_eq!(report.rounds, 2);
    assert_eq!(report.pushed, 2);
    assert_eq!(h.remote.calls_of("push").len(), 1);
    assert_eq!(h.remote.pids(RemoteResource::Progress), vec!["A", "B"]);
    assert_eq!(pids(&h.coordinator.get_all_progress().await), vec!["A", "B"]);
}

#[tokio::test]
async fn test_merge_skips_remote_records_without_pid() {
    let h = harness(true).await;
    h.remote.seed(
        RemoteResource::Progress,
        vec![
            ItemRecord::new("A", 1, 1, 1, "0"),
            ItemRecord::new("", 1, 1, 1, "0"),
            ItemRecord::new("B", 1, 2, 1, "0"),
        ],
    );

    let report = h.coordinator.try_fetch_and_merge().await.unwrap();

    assert_eq!(report.records, 2);
    assert_eq!(pids(&h.coordinator.get_all_progress().await), vec!["A", "B"]);
    assert_eq!(h.coordinator.counter().current, 2);
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn test_merge_retries_fetch_after_renewal() {
    let h = harness(true).await;
    h.remote
        .seed(RemoteResource::Progress, vec![ItemRecord::new("A", 1, 1, 1, "0")]);
    h.remote.script([Scripted::Expired]);

    let report = h.coordinator.try_fetch_and_merge().await.unwrap();

    assert_eq!(report.rounds, 1);
    assert_eq!(h.auth.renewals(), 1);
    assert_eq!(h.remote.calls_of("fetch").len(), 2);
    assert!(h.coordinator.has_progress("A").await);
}

#[tokio::test]
async fn test_merge_while_logged_out_does_nothing() {
    let h = harness(false).await;
    h.coordinator.add_progress("A", 1, 1, 1).await;

    assert!(!h.coordinator.fetch_and_merge().await);

    assert!(h.remote.calls().is_empty());
    assert!(h.notifier.messages().is_empty());
    assert!(h.coordinator.has_progress("A").await);
}
