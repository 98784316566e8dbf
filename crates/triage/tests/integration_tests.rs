//! Integration tests for the triage crate
//!
//! These drive the polling cycle end-to-end against the in-memory gateway
//! with a small hand-built classifier artifact.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use triage::{
    Classifier, ClassifierArtifact, FilterLoop, FilterStatus, InMemoryGateway, LinearModel,
    TfidfVectorizer, Verdict, labels, run_cycle,
};

/// A classifier where "free"/"money" push toward spam and
/// "meeting"/"tomorrow" toward ham, with a ham-leaning intercept
fn test_classifier() -> Classifier {
    let vectorizer = TfidfVectorizer {
        vocabulary: HashMap::from([
            ("free".to_string(), 0),
            ("money".to_string(), 1),
            ("meeting".to_string(), 2),
            ("tomorrow".to_string(), 3),
        ]),
        idf: vec![1.0, 1.0, 1.0, 1.0],
    };
    let model = LinearModel {
        weights: vec![2.0, 2.0, -1.5, -1.5],
        intercept: -0.5,
    };
    Classifier::new(ClassifierArtifact::from_parts(vectorizer, model).unwrap())
}

fn no_stop() -> AtomicBool {
    AtomicBool::new(false)
}

#[test]
fn test_scenario_mixed_verdicts_in_order() {
    // Three unread messages; verdicts spam, ham, spam: exactly two label
    // mutations, in listing order, and the ham message left untouched.
    let gateway = InMemoryGateway::new();
    gateway.add_unread("m1", "t1", Some("FREE money now"));
    gateway.add_unread("m2", "t2", Some("meeting tomorrow"));
    gateway.add_unread("m3", "t3", Some("free money free money"));

    let stats = run_cycle(&gateway, &test_classifier(), &no_stop()).unwrap();

    assert_eq!(stats.listed, 3);
    assert_eq!(stats.spam, 2);
    assert_eq!(stats.ham, 1);
    assert_eq!(stats.relabeled, 2);
    assert_eq!(stats.errors, 0);

    let applied = gateway.applied();
    assert_eq!(
        applied,
        vec![
            ("m1".to_string(), Verdict::Spam),
            ("m2".to_string(), Verdict::Ham),
            ("m3".to_string(), Verdict::Spam),
        ]
    );

    // Spam moved out of the inbox, ham still in it
    assert!(gateway.labels_of("m1").unwrap().contains(&labels::SPAM.to_string()));
    assert!(gateway.labels_of("m2").unwrap().contains(&labels::INBOX.to_string()));
    assert!(!gateway.labels_of("m2").unwrap().contains(&labels::SPAM.to_string()));
    assert!(gateway.labels_of("m3").unwrap().contains(&labels::SPAM.to_string()));
}

#[test]
fn test_scenario_empty_inbox() {
    // Nothing unread: no fetches, no verdicts, cycle goes straight to sleep
    let gateway = InMemoryGateway::new();

    let stats = run_cycle(&gateway, &test_classifier(), &no_stop()).unwrap();

    assert_eq!(stats.listed, 0);
    assert_eq!(stats.errors, 0);
    assert!(gateway.fetched().is_empty());
    assert!(gateway.applied().is_empty());
}

#[test]
fn test_partial_failure_isolation() {
    // Message m2's fetch fails; m3 and m4 are still attempted in the same
    // cycle and the failure is counted, not propagated.
    let gateway = InMemoryGateway::new();
    gateway.add_unread("m1", "t1", Some("free money"));
    gateway.add_unread("m2", "t2", Some("free money"));
    gateway.add_unread("m3", "t3", Some("meeting tomorrow"));
    gateway.add_unread("m4", "t4", Some("free money"));
    gateway.fail_fetch("m2");

    let stats = run_cycle(&gateway, &test_classifier(), &no_stop()).unwrap();

    assert_eq!(stats.listed, 4);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.spam, 2);
    assert_eq!(stats.ham, 1);
    assert_eq!(gateway.fetched(), vec!["m1", "m3", "m4"]);
}

#[test]
fn test_listing_failure_aborts_cycle() {
    let gateway = InMemoryGateway::new();
    gateway.add_unread("m1", "t1", Some("free money"));
    gateway.fail_listing(true);

    assert!(run_cycle(&gateway, &test_classifier(), &no_stop()).is_err());
    assert!(gateway.fetched().is_empty());

    // Service recovers: the next cycle processes the backlog
    gateway.fail_listing(false);
    let stats = run_cycle(&gateway, &test_classifier(), &no_stop()).unwrap();
    assert_eq!(stats.listed, 1);
    assert_eq!(stats.spam, 1);
}

#[test]
fn test_message_without_plain_text_part() {
    // No extractable body: classified on empty text, which this model
    // calls ham, and the message is not relabeled.
    let gateway = InMemoryGateway::new();
    gateway.add_unread("m1", "t1", None);

    let stats = run_cycle(&gateway, &test_classifier(), &no_stop()).unwrap();

    assert_eq!(stats.listed, 1);
    assert_eq!(stats.ham, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(gateway.applied(), vec![("m1".to_string(), Verdict::Ham)]);
}

#[test]
fn test_reapplying_verdicts_is_idempotent() {
    // Running a second cycle over the same ham backlog leaves every label
    // exactly where the first cycle put it.
    let gateway = InMemoryGateway::new();
    gateway.add_unread("m1", "t1", Some("meeting tomorrow"));
    gateway.add_unread("m2", "t2", Some("free money"));

    run_cycle(&gateway, &test_classifier(), &no_stop()).unwrap();
    let after_first: Vec<_> = ["m1", "m2"]
        .iter()
        .map(|id| gateway.labels_of(id).unwrap())
        .collect();

    // m2 left the inbox, so only m1 is listed again
    let stats = run_cycle(&gateway, &test_classifier(), &no_stop()).unwrap();
    assert_eq!(stats.listed, 1);

    let after_second: Vec<_> = ["m1", "m2"]
        .iter()
        .map(|id| gateway.labels_of(id).unwrap())
        .collect();
    assert_eq!(after_first, after_second);
}

#[test]
fn test_loop_runs_and_stops() {
    // The background worker processes the backlog, reports Running, and
    // honors the stop flag promptly.
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.add_unread("m1", "t1", Some("free money"));

    let filter = FilterLoop::new(
        gateway.clone(),
        Arc::new(test_classifier()),
        Duration::from_secs(60),
    );
    let handle = filter.start();

    // Wait for the first cycle to drain the backlog
    let deadline = Instant::now() + Duration::from_secs(5);
    while gateway.applied().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(handle.status(), FilterStatus::Running);
    assert_eq!(gateway.applied(), vec![("m1".to_string(), Verdict::Spam)]);

    // Stopping mid-sleep returns well before the 60s interval elapses
    let start = Instant::now();
    handle.stop();
    assert!(start.elapsed() < Duration::from_secs(5));
}
