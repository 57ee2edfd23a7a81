//! End-to-end booking lifecycle against the public API, with a NotifyHub
//! subscriber standing in for the notification transport.

use std::sync::Arc;

use ulid::Ulid;

use parley::clock::ManualClock;
use parley::engine::{Engine, EngineConfig, EngineError};
use parley::model::{BookingStatus, HOUR_MS, Ms};
use parley::notify::{Notification, NotifyHub, Severity};
use parley::store::InMemoryStore;

const T0: Ms = 1_700_000_000_000;

fn setup() -> (Arc<Engine>, Arc<ManualClock>, Arc<NotifyHub>) {
    let clock = Arc::new(ManualClock::new(T0));
    let hub = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(
        Arc::new(InMemoryStore::new()),
        hub.clone(),
        clock.clone(),
        EngineConfig::default(),
    ));
    (engine, clock, hub)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

#[tokio::test]
async fn happy_path_from_request_to_policy() {
    let (engine, clock, hub) = setup();
    let requester = Ulid::new();
    let agent = Ulid::new();
    let mut requester_inbox = hub.subscribe(requester);
    let mut agent_inbox = hub.subscribe(agent);

    // Request lands on the agent's calendar and both sides hear about it.
    let booking = engine
        .create_booking(
            requester,
            agent,
            T0 + 30 * HOUR_MS,
            T0 + 31 * HOUR_MS,
            Some(Ulid::new()),
            Some("policy consultation".into()),
        )
        .await
        .unwrap();
    assert_eq!(drain(&mut agent_inbox).len(), 1);
    assert_eq!(drain(&mut requester_inbox).len(), 1);

    // Agent confirms within the SLA window.
    clock.advance(2 * HOUR_MS);
    engine
        .confirm(booking.id, agent, T0 + 30 * HOUR_MS)
        .await
        .unwrap();
    let confirmations = drain(&mut requester_inbox);
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].severity, Severity::Success);

    // The 24h reminder fires on the next sweep, once for each party.
    clock.set(T0 + 10 * HOUR_MS);
    let report = engine.sweep().await;
    assert_eq!(report.reminders, 1);
    assert_eq!(drain(&mut requester_inbox).len(), 1);
    assert_eq!(drain(&mut agent_inbox).len(), 1);

    // Meeting happens, policy is issued.
    clock.set(T0 + 31 * HOUR_MS);
    engine
        .complete(booking.id, Some("docs verified".into()))
        .await
        .unwrap();
    engine.approve_policy(booking.id).await.unwrap();

    let stored = engine.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::PolicyIssued);
    assert!(!stored.sla_breached);

    let timeline = engine.timeline(booking.id).await.unwrap();
    assert_eq!(timeline.len(), 4);
    assert_eq!(timeline.last().unwrap().label, "policy issued");
}

#[tokio::test]
async fn unattended_request_expires_and_stays_dead() {
    let (engine, clock, hub) = setup();
    let requester = Ulid::new();
    let agent = Ulid::new();
    let mut requester_inbox = hub.subscribe(requester);

    let booking = engine
        .create_booking(
            requester,
            agent,
            T0 + 100 * HOUR_MS,
            T0 + 101 * HOUR_MS,
            None,
            None,
        )
        .await
        .unwrap();
    drain(&mut requester_inbox);

    // Nobody responds for 49 hours; the sweeper expires the request.
    clock.advance(49 * HOUR_MS);
    assert_eq!(engine.sweep().await.expired, 1);

    let expiry_notes = drain(&mut requester_inbox);
    assert_eq!(expiry_notes.len(), 1);
    assert_eq!(expiry_notes[0].severity, Severity::Warning);

    // The slot is free again, and the dead booking rejects further commands.
    engine
        .create_booking(
            Ulid::new(),
            agent,
            T0 + 100 * HOUR_MS,
            T0 + 101 * HOUR_MS,
            None,
            None,
        )
        .await
        .unwrap();
    assert!(matches!(
        engine.confirm(booking.id, agent, T0 + 100 * HOUR_MS).await,
        Err(EngineError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn reschedule_requeues_and_renegotiates_the_slot() {
    let (engine, _clock, hub) = setup();
    let requester = Ulid::new();
    let agent = Ulid::new();
    let mut agent_inbox = hub.subscribe(agent);

    let booking = engine
        .create_booking(
            requester,
            agent,
            T0 + 10 * HOUR_MS,
            T0 + 11 * HOUR_MS,
            None,
            None,
        )
        .await
        .unwrap();
    engine
        .confirm(booking.id, agent, T0 + 10 * HOUR_MS)
        .await
        .unwrap();
    drain(&mut agent_inbox);

    let moved = engine
        .reschedule(booking.id, T0 + 20 * HOUR_MS, T0 + 21 * HOUR_MS)
        .await
        .unwrap();
    assert_eq!(moved.status, BookingStatus::Pending);

    // The agent is told the booking is back in the approval queue.
    let notes = drain(&mut agent_inbox);
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.contains("rescheduled"));

    // Old window is bookable by someone else now.
    engine
        .create_booking(
            Ulid::new(),
            agent,
            T0 + 10 * HOUR_MS,
            T0 + 11 * HOUR_MS,
            None,
            None,
        )
        .await
        .unwrap();
}
