// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::proto::tnc::v1::Payload;

fn payload(n: u8) -> Payload {
    Payload { type_url: "t".to_string(), value: vec![n] }
}

#[tokio::test]
async fn push_fans_out_to_all_registrants() {
    let engine = RoutingEngine::new();
    let mut a = engine.register_push("route");
    let mut b = engine.register_push("route");

    let count = engine.push("route", PushEvent { route: "route".to_string(), payload: Some(payload(1)) });
    assert_eq!(count, 2);

    assert_eq!(a.receiver.recv().await.unwrap().payload.unwrap().value, vec![1]);
    assert_eq!(b.receiver.recv().await.unwrap().payload.unwrap().value, vec![1]);
}

#[tokio::test]
async fn push_to_unknown_route_delivers_to_nobody() {
    let engine = RoutingEngine::new();
    assert_eq!(engine.push("nope", PushEvent { route: "nope".to_string(), payload: Some(payload(1)) }), 0);
}

#[test]
fn conflicting_policy_is_rejected() {
    let engine = RoutingEngine::new();
    let _ = engine.register_request("r", DispatchPolicy::First).unwrap();
    let err = engine.register_request("r", DispatchPolicy::Next).unwrap_err();
    assert!(matches!(err, GwError::Validation(_)));
}

#[test]
fn single_policy_rejects_second_registrant() {
    let engine = RoutingEngine::new();
    let _ = engine.register_request("r", DispatchPolicy::Single).unwrap();
    let err = engine.register_request("r", DispatchPolicy::Single).unwrap_err();
    assert!(matches!(err, GwError::Validation(_)));
}

#[tokio::test]
async fn next_policy_round_robins_in_registration_order() {
    let engine = RoutingEngine::new();
    let mut first = engine.register_request("r", DispatchPolicy::Next).unwrap();
    let mut second = engine.register_request("r", DispatchPolicy::Next).unwrap();

    let e1 = engine.clone();
    let h1 = tokio::spawn(async move { e1.request("r", payload(1)).await });
    let got_first = first.receiver.recv().await.unwrap();
    engine.respond("r", got_first.request_id, ResponseEvent { route: "r".to_string(), request_id: got_first.request_id, payload: Some(payload(9)) }).unwrap();
    h1.await.unwrap().unwrap();

    let e2 = engine.clone();
    let h2 = tokio::spawn(async move { e2.request("r", payload(2)).await });
    let got_second = second.receiver.recv().await.unwrap();
    engine.respond("r", got_second.request_id, ResponseEvent { route: "r".to_string(), request_id: got_second.request_id, payload: Some(payload(9)) }).unwrap();
    h2.await.unwrap().unwrap();
}

#[tokio::test]
async fn request_ids_are_monotonic_and_never_zero() {
    let engine = RoutingEngine::new();
    let mut reg = engine.register_request("r", DispatchPolicy::Single).unwrap();

    let e = engine.clone();
    let h = tokio::spawn(async move { e.request("r", payload(1)).await });
    let got = reg.receiver.recv().await.unwrap();
    assert_eq!(got.request_id, 1);
    assert_ne!(got.request_id, 0);
    engine.respond("r", got.request_id, ResponseEvent { route: "r".to_string(), request_id: got.request_id, payload: Some(payload(9)) }).unwrap();
    h.await.unwrap().unwrap();
}

#[tokio::test]
async fn request_without_registrant_is_unavailable() {
    let engine = RoutingEngine::new();
    let err = engine.request("missing", payload(1)).await.unwrap_err();
    assert!(matches!(err, GwError::Unavailable(_)));
}

#[tokio::test]
async fn deregistering_cancels_pending_requests() {
    let engine = RoutingEngine::new();
    let reg = engine.register_request("r", DispatchPolicy::Single).unwrap();
    let id = reg.id;

    let e = engine.clone();
    let h = tokio::spawn(async move { e.request("r", payload(1)).await });
    tokio::task::yield_now().await;
    engine.deregister_request("r", id);

    let result = h.await.unwrap();
    assert!(result.is_err());
}

#[test]
fn cursor_normalizes_after_removal() {
    let engine = RoutingEngine::new();
    let a = engine.register_request("r", DispatchPolicy::Next).unwrap();
    let _b = engine.register_request("r", DispatchPolicy::Next).unwrap();
    engine.deregister_request("r", a.id);
    // Should not panic on the next pick despite cursor possibly pointing
    // past the now-shorter entry list.
    let reg = engine.register_request("r", DispatchPolicy::Next);
    assert!(reg.is_ok());
}

#[test]
fn respond_with_no_correlated_registration_is_rejected() {
    let engine = RoutingEngine::new();
    let err = engine
        .respond("r", 1, ResponseEvent { route: "r".to_string(), request_id: 1, payload: Some(payload(9)) })
        .unwrap_err();
    assert!(matches!(err, GwError::Validation(_)));
}

#[tokio::test]
async fn respond_after_requester_already_gone_succeeds_with_zero_count() {
    let engine = RoutingEngine::new();
    let mut reg = engine.register_request("r", DispatchPolicy::Single).unwrap();

    // Simulate a caller that gave up (e.g. deadline exceeded) by dropping
    // the in-flight `request` future before a `Respond` arrives.
    {
        let e = engine.clone();
        let fut = e.request("r", payload(1));
        tokio::pin!(fut);
        let got = reg.receiver.recv().await.unwrap();
        drop(fut);
        let count = engine
            .respond("r", got.request_id, ResponseEvent { route: "r".to_string(), request_id: got.request_id, payload: Some(payload(9)) })
            .unwrap();
        assert_eq!(count, 0);
    }
}

#[tokio::test]
async fn deregistering_one_registrant_does_not_cancel_requests_dispatched_to_another() {
    let engine = RoutingEngine::new();
    let mut first = engine.register_request("r", DispatchPolicy::Next).unwrap();
    let second = engine.register_request("r", DispatchPolicy::Next).unwrap();

    let e = engine.clone();
    let h = tokio::spawn(async move { e.request("r", payload(1)).await });
    let got = first.receiver.recv().await.unwrap();

    // `second` departs; the request already chosen for `first` must keep waiting.
    engine.deregister_request("r", second.id);

    engine
        .respond("r", got.request_id, ResponseEvent { route: "r".to_string(), request_id: got.request_id, payload: Some(payload(9)) })
        .unwrap();
    assert!(h.await.unwrap().is_ok());
}
