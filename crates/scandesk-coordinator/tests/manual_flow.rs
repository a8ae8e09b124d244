//! Manual assignment: request, answer, and expiry.
//!
//! These run on a paused runtime so the manual-choice deadline elapses as
//! soon as the loop is idle.

mod common;

use common::{Harness, accepted_session, tags};
use scandesk_coordinator::{DiscardReason, ManualRequestId, UiEvent};
use scandesk_core::config::{AssignmentMode, ScanConfig};
use scandesk_core::{Error, Session, SessionId};

async fn two_user_desk() -> (Harness, Session, Session) {
    let h = Harness::start(
        ScanConfig::default()
            .with_assignment_mode(AssignmentMode::Manual)
            .with_manual_timeout_secs(30),
    );
    let alice = h.login(tags::ALICE).await;
    h.at(1);
    let bob = h.login(tags::BOB).await;
    h.at(10);
    (h, alice, bob)
}

fn requested(event: &UiEvent) -> (ManualRequestId, Vec<SessionId>) {
    match event {
        UiEvent::ManualChoiceRequested {
            request_id,
            candidates,
            timeout_secs,
            ..
        } => {
            assert_eq!(*timeout_secs, 30);
            (*request_id, candidates.clone())
        }
        other => panic!("expected manual choice request, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_choice_assigns_scan() {
    let (mut h, alice, bob) = two_user_desk().await;

    let (request_id, candidates) = requested(&h.scan(0, "BOX-1").await);
    assert_eq!(candidates, vec![alice.id, bob.id]);
    assert_eq!(h.handle.stats().pending_manual_choices, 1);
    assert!(h.gateway.scans().is_empty());

    h.handle.complete_manual(request_id, bob.id).await.unwrap();
    assert_eq!(accepted_session(&h.next_scan_event().await), bob.id);

    let scans = h.gateway.scans();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].session_id, bob.id);
    assert_eq!(h.handle.stats().pending_manual_choices, 0);
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_accepted_payload_rescanned_is_not_prompted_again() {
    let (mut h, alice, _bob) = two_user_desk().await;

    let (request_id, _) = requested(&h.scan(0, "BOX-1").await);
    h.handle.complete_manual(request_id, alice.id).await.unwrap();
    assert_eq!(accepted_session(&h.next_scan_event().await), alice.id);

    h.at(11);
    assert!(matches!(
        h.scan(0, "BOX-1").await,
        UiEvent::ScanDiscarded { reason: DiscardReason::DuplicateGlobal, .. }
    ));

    let stats = h.handle.stats();
    assert_eq!(stats.pending_manual_choices, 0);
    assert_eq!(stats.duplicates_rejected, 1);
    assert_eq!(stats.manual_timeouts, 0);
    assert_eq!(h.gateway.scans().len(), 1);
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_choice_times_out() {
    let (mut h, alice, _bob) = two_user_desk().await;

    let (request_id, _) = requested(&h.scan(0, "BOX-1").await);
    let event = h.next_scan_event().await;
    assert!(matches!(
        event,
        UiEvent::ScanDiscarded { reason: DiscardReason::ManualTimeout, .. }
    ));

    let stats = h.handle.stats();
    assert_eq!(stats.manual_timeouts, 1);
    assert_eq!(stats.pending_manual_choices, 0);
    assert!(h.gateway.scans().is_empty());

    let late = h.handle.complete_manual(request_id, alice.id).await;
    assert!(matches!(late, Err(Error::UnknownManualRequest(_))));
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_repeat_while_pending_is_discarded() {
    let (mut h, alice, _bob) = two_user_desk().await;

    let (request_id, _) = requested(&h.scan(0, "BOX-1").await);
    assert!(matches!(
        h.scan(1, "BOX-1").await,
        UiEvent::ScanDiscarded { reason: DiscardReason::PendingChoice, .. }
    ));
    // A different payload gets its own request.
    let (second, _) = requested(&h.scan(0, "BOX-2").await);
    assert_ne!(request_id, second);
    assert_eq!(h.handle.stats().pending_manual_choices, 2);

    h.handle.complete_manual(request_id, alice.id).await.unwrap();
    assert_eq!(accepted_session(&h.next_scan_event().await), alice.id);
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_choice_outside_candidates_rejected() {
    let (mut h, _alice, _bob) = two_user_desk().await;

    let (request_id, _) = requested(&h.scan(0, "BOX-1").await);
    h.at(12);
    let carol = h.login(tags::CAROL).await;

    let result = h.handle.complete_manual(request_id, carol.id).await;
    assert!(matches!(result, Err(Error::SessionNotActive(id)) if id == carol.id));
    assert!(matches!(
        h.next_scan_event().await,
        UiEvent::ScanDiscarded { reason: DiscardReason::InvalidChoice, .. }
    ));
    assert!(h.gateway.scans().is_empty());
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_choice_for_ended_session_rejected() {
    let (mut h, _alice, bob) = two_user_desk().await;

    let (request_id, _) = requested(&h.scan(0, "BOX-1").await);
    h.at(15);
    h.tag(tags::BOB).await;

    let result = h.handle.complete_manual(request_id, bob.id).await;
    assert!(matches!(result, Err(Error::SessionNotActive(_))));
    assert!(matches!(
        h.next_scan_event().await,
        UiEvent::ScanDiscarded { reason: DiscardReason::SessionEnded, .. }
    ));
    h.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_request_rejected() {
    let (h, alice, _bob) = two_user_desk().await;

    let result = h.handle.complete_manual(ManualRequestId(99), alice.id).await;
    assert!(matches!(result, Err(Error::UnknownManualRequest(_))));
    h.stop().await;
}
