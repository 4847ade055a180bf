// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio_stream::StreamExt;

fn announcement(name: &str) -> IdentityAnnouncement {
    IdentityAnnouncement { name: name.to_string(), role: DEFAULT_ROLE.to_string() }
}

#[tokio::test]
async fn initial_join_snapshot_then_live_joins() {
    let tracker = LifecycleTracker::new();
    let existing = Uuid::new_v4();
    tracker.handle_identity_message(existing, Some(announcement("Scout")), false).await;

    let mut stream = tracker.track(AgentSelector::DefaultRole).await;
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.r#type, LifecycleEventType::Join as i32);
    assert_eq!(first.name, "Scout");

    let newcomer = Uuid::new_v4();
    tracker.handle_identity_message(newcomer, Some(announcement("Ranger")), false).await;
    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.r#type, LifecycleEventType::Join as i32);
    assert_eq!(second.name, "Ranger");
}

#[tokio::test]
async fn leave_is_emitted_when_announcement_clears() {
    let tracker = LifecycleTracker::new();
    let id = Uuid::new_v4();
    tracker.handle_identity_message(id, Some(announcement("Scout")), false).await;

    let mut stream = tracker.track(AgentSelector::DefaultRole).await;
    let _join = stream.next().await.unwrap().unwrap();

    tracker.handle_identity_message(id, None, false).await;
    let leave = stream.next().await.unwrap().unwrap();
    assert_eq!(leave.r#type, LifecycleEventType::Leave as i32);
}

#[tokio::test]
async fn identity_change_emits_leave_then_join() {
    let tracker = LifecycleTracker::new();
    let id = Uuid::new_v4();
    tracker.handle_identity_message(id, Some(announcement("OldName")), false).await;

    let mut stream = tracker.track(AgentSelector::DefaultRole).await;
    let _initial_join = stream.next().await.unwrap().unwrap();

    tracker.handle_identity_message(id, Some(announcement("NewName")), false).await;

    let leave = stream.next().await.unwrap().unwrap();
    assert_eq!(leave.r#type, LifecycleEventType::Leave as i32);
    assert_eq!(leave.name, "OldName");

    let join = stream.next().await.unwrap().unwrap();
    assert_eq!(join.r#type, LifecycleEventType::Join as i32);
    assert_eq!(join.name, "NewName");
}

#[tokio::test]
async fn selector_filters_out_non_matching_agents() {
    let tracker = LifecycleTracker::new();
    let mut stream = tracker.track(AgentSelector::Name("Target".to_string())).await;

    tracker.handle_identity_message(Uuid::new_v4(), Some(announcement("Other")), false).await;
    tracker.handle_identity_message(Uuid::new_v4(), Some(announcement("Target")), false).await;

    let only = stream.next().await.unwrap().unwrap();
    assert_eq!(only.name, "Target");
}

#[tokio::test]
async fn identical_re_announcement_is_a_no_op() {
    let tracker = LifecycleTracker::new();
    let id = Uuid::new_v4();
    tracker.handle_identity_message(id, Some(announcement("Scout")), false).await;

    let mut stream = tracker.track(AgentSelector::DefaultRole).await;
    let _join = stream.next().await.unwrap().unwrap();

    tracker.handle_identity_message(id, Some(announcement("Scout")), false).await;
    tracker.handle_identity_message(Uuid::new_v4(), Some(announcement("Sentinel")), false).await;
    let next = stream.next().await.unwrap().unwrap();
    assert_eq!(next.name, "Sentinel");
}
