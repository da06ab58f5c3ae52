//! Integration tests for the gate coordinator
//!
//! These drive the full store/reducer/effect loop against a recording
//! notifier and check what every participant ended up seeing.

#![allow(clippy::unwrap_used)] // Test code

use futures::future::join_all;
use gatekeeper::{
    Actor, ClientId, Control, CoordinatorError, Decision, Direction, GateCoordinator,
    GateEnvironment, GateEvent, MessageRef, NotifierCall, OperatorId, Outcome, Recipient,
    RecordingNotifier, RequestId, RequestStatus,
};
use gatekeeper_runtime::StoreError;
use gatekeeper_testing::test_clock;
use std::sync::Arc;
use std::time::Duration;

const ALICE: OperatorId = OperatorId::new(100);
const BOB: OperatorId = OperatorId::new(200);
const CAROL: OperatorId = OperatorId::new(300);
const CLIENT: ClientId = ClientId::new(42);
const SETTLE: Duration = Duration::from_secs(2);

fn setup_with(notifier: RecordingNotifier) -> (GateCoordinator, RecordingNotifier) {
    let env = GateEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(notifier.clone()),
        vec![ALICE, BOB, CAROL],
    );
    (GateCoordinator::new(env), notifier)
}

fn setup() -> (GateCoordinator, RecordingNotifier) {
    setup_with(RecordingNotifier::new())
}

async fn submitted(coordinator: &GateCoordinator) -> RequestId {
    let request_id = coordinator
        .submit_request(CLIENT, "ann", Direction::Entry)
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();
    request_id
}

fn sent_messages(
    notifier: &RecordingNotifier,
    recipient: Recipient,
) -> Vec<(MessageRef, Vec<Control>)> {
    notifier
        .calls_to(recipient)
        .into_iter()
        .filter_map(|call| match call {
            NotifierCall::Sent {
                message, controls, ..
            } => Some((message, controls)),
            NotifierCall::Edited { .. } | NotifierCall::Deleted { .. } => None,
        })
        .collect()
}

fn deleted_messages(notifier: &RecordingNotifier, recipient: Recipient) -> Vec<MessageRef> {
    notifier
        .calls_to(recipient)
        .into_iter()
        .filter_map(|call| match call {
            NotifierCall::Deleted { message, .. } => Some(message),
            NotifierCall::Sent { .. } | NotifierCall::Edited { .. } => None,
        })
        .collect()
}

fn edited_texts(notifier: &RecordingNotifier, recipient: Recipient) -> Vec<String> {
    notifier
        .calls_to(recipient)
        .into_iter()
        .filter_map(|call| match call {
            NotifierCall::Edited { text, .. } => Some(text),
            NotifierCall::Sent { .. } | NotifierCall::Deleted { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn test_submit_notifies_client_and_every_operator() {
    let (coordinator, notifier) = setup();

    let request_id = submitted(&coordinator).await;

    let request = coordinator.get(request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Open);
    assert_eq!(request.client, CLIENT);
    assert_eq!(request.direction, Direction::Entry);

    let client = sent_messages(&notifier, Recipient::Client(CLIENT));
    assert_eq!(client.len(), 1);
    assert!(client[0].1.is_empty());
    assert_eq!(request.client_notice, Some(client[0].0));

    for operator in [ALICE, BOB, CAROL] {
        let notices = sent_messages(&notifier, Recipient::Operator(operator));
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0].1,
            vec![Control::Accept(request_id), Control::Dismiss(request_id)]
        );
        assert_eq!(request.operator_notices.get(&operator), Some(&notices[0].0));
    }
}

#[tokio::test]
async fn test_accept_retracts_wait_and_offers_acknowledge() {
    let (coordinator, notifier) = setup();
    let request_id = submitted(&coordinator).await;
    let wait_notice = coordinator.get(request_id).await.unwrap().client_notice.unwrap();

    let outcome = coordinator
        .apply_operator_action(request_id, Decision::Accept, BOB, "bob")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();

    assert_eq!(outcome, Outcome::Accepted);
    let request = coordinator.get(request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);
    assert_eq!(request.acting_operator_name(), Some("bob"));

    let client_calls = notifier.calls_to(Recipient::Client(CLIENT));
    let retracted = client_calls
        .iter()
        .position(|call| {
            matches!(call, NotifierCall::Deleted { message, .. } if *message == wait_notice)
        })
        .unwrap();
    let acknowledge = vec![Control::Acknowledge(request_id)];
    let completion = client_calls
        .iter()
        .position(|call| {
            matches!(call, NotifierCall::Sent { controls, .. } if *controls == acknowledge)
        })
        .unwrap();
    assert!(retracted < completion);
    assert!(notifier.texts_sent_to(Recipient::Client(CLIENT))[1].contains("@bob"));

    let rewritten = edited_texts(&notifier, Recipient::Operator(BOB));
    assert_eq!(rewritten.len(), 1);
    assert!(rewritten[0].contains("completed"));
    assert!(edited_texts(&notifier, Recipient::Operator(ALICE)).is_empty());
}

#[tokio::test]
async fn test_dismiss_evicts_and_rewrites_operator_notice() {
    let (coordinator, notifier) = setup();
    let request_id = submitted(&coordinator).await;

    let outcome = coordinator
        .apply_operator_action(request_id, Decision::Dismiss, CAROL, "carol")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();

    assert_eq!(outcome, Outcome::Dismissed);
    assert!(coordinator.get(request_id).await.is_none());
    assert_eq!(deleted_messages(&notifier, Recipient::Client(CLIENT)).len(), 1);
    assert!(edited_texts(&notifier, Recipient::Operator(CAROL))[0].contains("dismissed"));
    // Nothing new reaches the client after a dismissal
    assert_eq!(sent_messages(&notifier, Recipient::Client(CLIENT)).len(), 1);
}

#[tokio::test]
async fn test_dismissed_request_accepts_no_further_actions() {
    let (coordinator, notifier) = setup();
    let request_id = submitted(&coordinator).await;
    coordinator
        .apply_operator_action(request_id, Decision::Dismiss, ALICE, "alice")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();
    let calls_before = notifier.calls().len();

    for (decision, operator) in [(Decision::Accept, BOB), (Decision::Dismiss, CAROL)] {
        let outcome = coordinator
            .apply_operator_action(request_id, decision, operator, "op")
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::NotFound);
    }
    assert_eq!(
        coordinator.acknowledge_completion(request_id).await.unwrap(),
        Outcome::NotFound
    );
    assert_eq!(coordinator.acknowledge_latest(CLIENT).await.unwrap(), Outcome::NotFound);
    coordinator.settle(SETTLE).await.unwrap();

    assert!(coordinator.get(request_id).await.is_none());
    assert_eq!(notifier.calls().len(), calls_before);
}

#[tokio::test]
async fn test_accept_before_operator_notice_lands_still_rewrites_it() {
    let (coordinator, notifier) =
        setup_with(RecordingNotifier::new().with_latency(Duration::from_millis(50)));

    let request_id = coordinator
        .submit_request(CLIENT, "ann", Direction::Entry)
        .await
        .unwrap();
    // BOB's notice is still in flight when he presses Accept
    let outcome = coordinator
        .apply_operator_action(request_id, Decision::Accept, BOB, "bob")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();

    assert_eq!(outcome, Outcome::Accepted);
    let rewritten = edited_texts(&notifier, Recipient::Operator(BOB));
    assert_eq!(rewritten.len(), 1);
    assert!(rewritten[0].contains("completed"));
    for operator in [ALICE, CAROL] {
        assert!(edited_texts(&notifier, Recipient::Operator(operator)).is_empty());
    }
}

#[tokio::test]
async fn test_dismiss_before_operator_notice_lands_still_rewrites_it() {
    let (coordinator, notifier) =
        setup_with(RecordingNotifier::new().with_latency(Duration::from_millis(50)));

    let request_id = coordinator
        .submit_request(CLIENT, "ann", Direction::Exit)
        .await
        .unwrap();
    let outcome = coordinator
        .apply_operator_action(request_id, Decision::Dismiss, CAROL, "carol")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();

    assert_eq!(outcome, Outcome::Dismissed);
    assert!(coordinator.get(request_id).await.is_none());
    let rewritten = edited_texts(&notifier, Recipient::Operator(CAROL));
    assert_eq!(rewritten.len(), 1);
    assert!(rewritten[0].contains("dismissed"));
    for operator in [ALICE, BOB] {
        assert!(edited_texts(&notifier, Recipient::Operator(operator)).is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operator_actions_commit_exactly_once() {
    for _ in 0..20 {
        let (coordinator, _notifier) = setup();
        let request_id = submitted(&coordinator).await;

        let attempts = [
            (Decision::Accept, ALICE),
            (Decision::Dismiss, BOB),
            (Decision::Accept, CAROL),
            (Decision::Dismiss, ALICE),
            (Decision::Accept, BOB),
            (Decision::Dismiss, CAROL),
        ];
        let handles: Vec<_> = attempts
            .into_iter()
            .map(|(decision, operator)| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator
                        .apply_operator_action(request_id, decision, operator, "op")
                        .await
                })
            })
            .collect();

        let outcomes: Vec<Outcome> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let committed: Vec<_> = outcomes.iter().filter(|o| o.is_committed()).collect();
        assert_eq!(committed.len(), 1, "outcomes: {outcomes:?}");
        assert_eq!(
            outcomes.iter().filter(|o| **o == Outcome::NotFound).count(),
            attempts.len() - 1
        );

        coordinator.settle(SETTLE).await.unwrap();
        match committed[0] {
            Outcome::Accepted => assert_eq!(
                coordinator.get(request_id).await.map(|r| r.status),
                Some(RequestStatus::Accepted)
            ),
            _ => assert!(coordinator.get(request_id).await.is_none()),
        }
    }
}

#[tokio::test]
async fn test_acknowledge_closes_request_and_thanks_operators() {
    let (coordinator, notifier) = setup();
    let request_id = submitted(&coordinator).await;
    coordinator
        .apply_operator_action(request_id, Decision::Accept, ALICE, "alice")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();
    let completion_notice = coordinator
        .get(request_id)
        .await
        .unwrap()
        .completion_notice
        .unwrap();

    let outcome = coordinator.acknowledge_completion(request_id).await.unwrap();
    coordinator.settle(SETTLE).await.unwrap();

    assert_eq!(outcome, Outcome::Acknowledged);
    assert!(coordinator.get(request_id).await.is_none());
    assert!(deleted_messages(&notifier, Recipient::Client(CLIENT)).contains(&completion_notice));

    let client_texts = notifier.texts_sent_to(Recipient::Client(CLIENT));
    let last = client_texts.last().unwrap();
    assert!(last.contains("completed by @alice"));

    for operator in [ALICE, BOB, CAROL] {
        let texts = notifier.texts_sent_to(Recipient::Operator(operator));
        assert_eq!(texts.len(), 2);
        assert!(texts[1].contains("Thanks"));
        assert!(texts[1].contains("@ann"));
    }

    assert_eq!(
        coordinator.acknowledge_completion(request_id).await.unwrap(),
        Outcome::NotFound
    );
}

#[tokio::test]
async fn test_unknown_request_changes_nothing() {
    let (coordinator, notifier) = setup();
    let live = submitted(&coordinator).await;
    let calls_before = notifier.calls().len();

    let outcome = coordinator
        .apply_operator_action(RequestId::new(), Decision::Accept, BOB, "bob")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();

    assert_eq!(outcome, Outcome::NotFound);
    assert_eq!(notifier.calls().len(), calls_before);
    assert_eq!(coordinator.pending().await.len(), 1);
    assert_eq!(
        coordinator.get(live).await.map(|r| r.status),
        Some(RequestStatus::Open)
    );
}

#[tokio::test]
async fn test_non_operator_is_not_authorized() {
    let (coordinator, notifier) = setup();
    let request_id = submitted(&coordinator).await;
    let calls_before = notifier.calls().len();

    let outcome = coordinator
        .apply_operator_action(request_id, Decision::Accept, OperatorId::new(CLIENT.get()), "ann")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::NotAuthorized);
    assert!(outcome.feedback_text().is_some());
    assert_eq!(notifier.calls().len(), calls_before);
    assert_eq!(
        coordinator.get(request_id).await.map(|r| r.status),
        Some(RequestStatus::Open)
    );
}

#[tokio::test]
async fn test_failing_operator_does_not_block_others() {
    let notifier = RecordingNotifier::new();
    notifier.fail_for(Recipient::Operator(BOB));
    let (coordinator, notifier) = setup_with(notifier);

    let request_id = submitted(&coordinator).await;

    assert!(sent_messages(&notifier, Recipient::Operator(BOB)).is_empty());
    assert_eq!(sent_messages(&notifier, Recipient::Operator(ALICE)).len(), 1);
    assert_eq!(sent_messages(&notifier, Recipient::Operator(CAROL)).len(), 1);

    let request = coordinator.get(request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Open);
    assert!(!request.operator_notices.contains_key(&BOB));

    // BOB never saw a notice but is still an operator
    let outcome = coordinator
        .apply_operator_action(request_id, Decision::Accept, BOB, "bob")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();
    assert_eq!(outcome, Outcome::Accepted);
    assert!(sent_messages(&notifier, Recipient::Client(CLIENT))
        .iter()
        .any(|(_, controls)| controls == &vec![Control::Acknowledge(request_id)]));
}

#[tokio::test]
async fn test_failing_client_does_not_undo_acceptance() {
    let notifier = RecordingNotifier::new();
    notifier.fail_for(Recipient::Client(CLIENT));
    let (coordinator, notifier) = setup_with(notifier);
    let request_id = submitted(&coordinator).await;

    let outcome = coordinator
        .apply_operator_action(request_id, Decision::Accept, ALICE, "alice")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();

    assert_eq!(outcome, Outcome::Accepted);
    let request = coordinator.get(request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Accepted);
    assert_eq!(request.completion_notice, None);
    assert!(notifier.calls_to(Recipient::Client(CLIENT)).is_empty());
}

#[tokio::test]
async fn test_wait_notice_arriving_after_accept_is_retracted() {
    let (coordinator, notifier) =
        setup_with(RecordingNotifier::new().with_latency(Duration::from_millis(50)));

    let request_id = coordinator
        .submit_request(CLIENT, "ann", Direction::Exit)
        .await
        .unwrap();
    // Accept while the wait notice is still in flight
    let outcome = coordinator
        .apply_operator_action(request_id, Decision::Accept, ALICE, "alice")
        .await
        .unwrap();
    coordinator.settle(SETTLE).await.unwrap();

    assert_eq!(outcome, Outcome::Accepted);
    let sent = sent_messages(&notifier, Recipient::Client(CLIENT));
    let wait_notice = sent
        .iter()
        .find(|(_, controls)| controls.is_empty())
        .map(|(message, _)| *message)
        .unwrap();
    assert!(deleted_messages(&notifier, Recipient::Client(CLIENT)).contains(&wait_notice));
    assert_eq!(coordinator.get(request_id).await.unwrap().client_notice, None);
}

#[tokio::test]
async fn test_acknowledge_latest_targets_most_recent_request() {
    let (coordinator, _notifier) = setup();
    let first = submitted(&coordinator).await;
    let second = submitted(&coordinator).await;

    assert_eq!(coordinator.latest_for_client(CLIENT).await, Some(second));
    let pending: Vec<_> = coordinator.pending().await.iter().map(|r| r.id).collect();
    assert_eq!(pending, vec![first, second]);

    // The newest request is still open, so there is nothing to thank for yet
    assert_eq!(
        coordinator.acknowledge_latest(CLIENT).await.unwrap(),
        Outcome::NotFound
    );

    for request_id in [first, second] {
        coordinator
            .apply_operator_action(request_id, Decision::Accept, ALICE, "alice")
            .await
            .unwrap();
    }
    assert_eq!(
        coordinator.acknowledge_latest(CLIENT).await.unwrap(),
        Outcome::Acknowledged
    );
    assert!(coordinator.get(second).await.is_none());
    assert!(coordinator.get(first).await.is_some());
    assert_eq!(
        coordinator.acknowledge_latest(ClientId::new(7)).await.unwrap(),
        Outcome::NotFound
    );
}

#[tokio::test]
async fn test_transport_events_drive_full_lifecycle() {
    let (coordinator, notifier) = setup();
    let client = Actor::from_profile(CLIENT.get(), Some("ann"), "Ann");
    let operator = Actor::from_profile(ALICE.get(), None, "Alice");

    let event = GateEvent::from_text("1", &client).unwrap();
    let Outcome::Submitted(request_id) = coordinator.handle(event).await.unwrap() else {
        unreachable!("submission must succeed");
    };
    coordinator.settle(SETTLE).await.unwrap();

    let (_, controls) = sent_messages(&notifier, Recipient::Operator(ALICE)).remove(0);
    let pressed: Control = controls[0].callback_data().parse().unwrap();
    let outcome = coordinator
        .handle(GateEvent::from_control(pressed, &operator))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Accepted);
    coordinator.settle(SETTLE).await.unwrap();

    let outcome = coordinator
        .handle(GateEvent::from_text("4", &client).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Acknowledged);
    coordinator.settle(SETTLE).await.unwrap();

    assert!(coordinator.get(request_id).await.is_none());
    assert!(
        notifier
            .texts_sent_to(Recipient::Client(CLIENT))
            .last()
            .unwrap()
            .contains("@Alice")
    );
}

#[tokio::test]
async fn test_shutdown_rejects_new_events() {
    let (coordinator, _notifier) = setup();
    let _ = submitted(&coordinator).await;

    coordinator.shutdown(SETTLE).await.unwrap();

    let result = coordinator
        .submit_request(CLIENT, "ann", Direction::Entry)
        .await;
    assert_eq!(
        result,
        Err(CoordinatorError::Store(StoreError::ShutdownInProgress))
    );
}
