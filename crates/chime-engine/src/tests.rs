//! Engine tests against an in-memory store, a manual clock and a fake
//! gateway.

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chime_core::{
  clock::ManualClock,
  gateway::{GatewayError, MessageGateway, OutboundMessage},
  message::NewCommunication,
  phone::PhoneNumber,
  store::NotificationStore,
  subscription::Subscription,
};
use chime_store_sqlite::SqliteStore;

use crate::{CycleReport, Engine, EngineConfig, Error, InboundOutcome};

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct FakeGateway {
  sender: PhoneNumber,
  sent:   Mutex<Vec<OutboundMessage>>,
  fail:   AtomicBool,
}

impl FakeGateway {
  fn new() -> Self {
    Self {
      sender: PhoneNumber::canonical("+15550000000"),
      sent:   Mutex::new(Vec::new()),
      fail:   AtomicBool::new(false),
    }
  }

  fn bodies(&self) -> Vec<String> {
    self.sent.lock().unwrap().iter().map(|m| m.body.clone()).collect()
  }
}

impl MessageGateway for FakeGateway {
  fn sender(&self) -> &PhoneNumber { &self.sender }

  async fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(GatewayError::Status { status: 500, body: "provider down".into() });
    }
    self.sent.lock().unwrap().push(message.clone());
    Ok(())
  }
}

type TestEngine = Engine<SqliteStore, FakeGateway>;

struct Harness {
  engine:  Arc<TestEngine>,
  gateway: Arc<FakeGateway>,
  clock:   Arc<ManualClock>,
}

const NUMBER: &str = "5551234567";

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() }

async fn harness() -> Harness {
  let clock = Arc::new(ManualClock::new(t0()));
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
    .with_clock(clock.clone());
  let gateway = Arc::new(FakeGateway::new());
  let engine = Engine::new(Arc::new(store), gateway.clone(), EngineConfig::default());
  Harness { engine: Arc::new(engine), gateway, clock }
}

impl Harness {
  async fn subscribe(&self, due: DateTime<Utc>, frequency: Option<&str>) -> Subscription {
    let template = self
      .engine
      .register_template("water", "reminder", "drink water")
      .await
      .unwrap();
    self
      .engine
      .subscribe(NUMBER, &template.template_id.to_string(), &due.to_rfc3339(), frequency)
      .await
      .unwrap()
  }

  async fn pending(&self) -> Vec<Subscription> {
    self.engine.subscriptions_for(NUMBER).await.unwrap()
  }

  async fn record_sent(&self, body: &str) {
    self
      .engine
      .store()
      .record_communication(NewCommunication {
        template_id: None,
        from:        self.gateway.sender.clone(),
        to:          PhoneNumber::canonical(NUMBER),
        body:        body.into(),
      })
      .await
      .unwrap();
  }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_shot_fires_exactly_once() {
  let h = harness().await;
  h.subscribe(t0() - TimeDelta::minutes(1), None).await;

  let first = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(first, CycleReport { due: 1, delivered: 1, ..CycleReport::default() });
  assert_eq!(h.gateway.bodies(), vec!["drink water"]);
  assert!(h.pending().await.is_empty());

  h.clock.advance(TimeDelta::days(1));
  let second = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(second.due, 0);
  assert_eq!(h.gateway.bodies().len(), 1);
}

#[tokio::test]
async fn recurring_advances_by_one_interval() {
  let h = harness().await;
  let due = t0() - TimeDelta::seconds(20);
  h.subscribe(due, Some("1h")).await;

  h.engine.trigger_due_notifications().await.unwrap();

  let pending = h.pending().await;
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].next_trigger_time, due + TimeDelta::hours(1));
}

#[tokio::test]
async fn overdue_recurring_catches_up_without_replaying() {
  let h = harness().await;
  h.subscribe(t0() - TimeDelta::hours(10), Some("1h")).await;

  let report = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(report.delivered, 1);
  assert_eq!(h.gateway.bodies().len(), 1);

  let pending = h.pending().await;
  assert_eq!(pending[0].next_trigger_time, t0() + TimeDelta::hours(1));
}

#[tokio::test]
async fn day_frequency_advances_by_whole_days() {
  let h = harness().await;
  let due = t0() - TimeDelta::minutes(1);
  h.subscribe(due, Some("2d")).await;

  h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(h.pending().await[0].next_trigger_time, due + TimeDelta::hours(48));
}

#[tokio::test]
async fn grace_lag_defers_barely_due_subscriptions() {
  let h = harness().await;
  h.subscribe(t0() - TimeDelta::seconds(5), None).await;

  let report = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(report.due, 0);
  assert!(h.gateway.bodies().is_empty());

  h.clock.advance(TimeDelta::seconds(15));
  let report = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(report.delivered, 1);
}

#[tokio::test]
async fn gateway_failure_leaves_schedule_untouched() {
  let h = harness().await;
  let due = t0() - TimeDelta::minutes(1);
  h.subscribe(due, Some("1h")).await;
  h.gateway.fail.store(true, Ordering::SeqCst);

  let report = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(report, CycleReport { due: 1, failed: 1, ..CycleReport::default() });

  assert_eq!(h.pending().await[0].next_trigger_time, due);
  let logged = h
    .engine
    .store()
    .last_sent_to(&PhoneNumber::canonical(NUMBER))
    .await
    .unwrap();
  assert!(logged.is_none());

  h.gateway.fail.store(false, Ordering::SeqCst);
  let retry = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(retry.delivered, 1);
}

#[tokio::test]
async fn unrenderable_template_is_skipped_and_isolated() {
  let h = harness().await;
  let broken = h
    .engine
    .register_template("welcome", "registration", "hi")
    .await
    .unwrap();
  h.engine
    .subscribe(
      NUMBER,
      &broken.template_id.to_string(),
      &(t0() - TimeDelta::minutes(2)).to_rfc3339(),
      None,
    )
    .await
    .unwrap();
  h.subscribe(t0() - TimeDelta::minutes(1), None).await;

  let report = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(report, CycleReport { due: 2, delivered: 1, skipped: 1, failed: 0 });
  assert_eq!(h.gateway.bodies(), vec!["drink water"]);
  assert_eq!(h.pending().await.len(), 1);
}

#[tokio::test]
async fn manual_triggers_are_idempotent() {
  let h = harness().await;
  h.subscribe(t0() - TimeDelta::minutes(1), Some("1h")).await;
  h.subscribe(t0() - TimeDelta::minutes(1), None).await;

  let first = h.engine.trigger_due_notifications().await.unwrap();
  let second = h.engine.trigger_due_notifications().await.unwrap();
  assert_eq!(first.delivered, 2);
  assert_eq!(second.due, 0);
  assert_eq!(h.gateway.bodies().len(), 2);
}

#[tokio::test]
async fn stale_firing_is_skipped() {
  let h = harness().await;
  let sub = h.subscribe(t0() - TimeDelta::minutes(1), Some("1h")).await;

  assert!(h.engine.deliver(sub.clone()).await.unwrap().is_some());
  assert!(h.engine.deliver(sub).await.unwrap().is_none());
  assert_eq!(h.gateway.bodies().len(), 1);
}

#[tokio::test]
async fn run_until_delivers_and_stops() {
  let clock = Arc::new(ManualClock::new(t0()));
  let store = SqliteStore::open_in_memory().await.unwrap().with_clock(clock);
  let gateway = Arc::new(FakeGateway::new());
  let config = EngineConfig {
    poll_interval: Duration::from_millis(10),
    ..EngineConfig::default()
  };
  let engine = Engine::new(Arc::new(store), gateway.clone(), config);
  let template = engine
    .register_template("water", "reminder", "drink water")
    .await
    .unwrap();
  engine
    .subscribe(
      NUMBER,
      &template.template_id.to_string(),
      &(t0() - TimeDelta::minutes(1)).to_rfc3339(),
      None,
    )
    .await
    .unwrap();

  engine
    .run_until(tokio::time::sleep(Duration::from_millis(200)))
    .await;

  assert_eq!(gateway.bodies(), vec!["drink water"]);
}

// ─── Correlator ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn reply_is_journaled_against_latest_prompt() {
  let h = harness().await;
  h.engine.add_subscriber(NUMBER, "Ada").await.unwrap();
  h.record_sent("A?").await;
  h.record_sent("B?").await;

  let outcome = h
    .engine
    .handle_inbound_message("+15551234567", "yes")
    .await
    .unwrap();
  let InboundOutcome::Journaled(entry) = outcome else {
    panic!("expected a journal entry, got {outcome:?}");
  };
  assert_eq!(entry.prompt, "B?");
  assert_eq!(entry.entry, "yes");
  assert_eq!(entry.phone_number.as_str(), NUMBER);
  assert!(entry.comms_id.is_some());

  let journal = h.engine.journal_entries(NUMBER).await.unwrap();
  assert_eq!(journal.len(), 1);
}

#[tokio::test]
async fn reply_from_stranger_is_not_found() {
  let h = harness().await;
  let err = h
    .engine
    .handle_inbound_message("+15559999999", "hello")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::RecipientNotFound(p) if p.as_str() == "5559999999"));
}

#[tokio::test]
async fn empty_sender_is_malformed() {
  let h = harness().await;
  let err = h.engine.handle_inbound_message("  ", "hello").await.unwrap_err();
  assert!(matches!(err, Error::MalformedInbound(_)));
}

#[tokio::test]
async fn reply_without_prompt_fails() {
  let h = harness().await;
  h.engine.add_subscriber(NUMBER, "Ada").await.unwrap();
  let err = h.engine.handle_inbound_message(NUMBER, "yes").await.unwrap_err();
  assert!(matches!(err, Error::NothingToAnswer(_)));
}

#[tokio::test]
async fn verification_sends_acknowledgement_once() {
  let h = harness().await;
  h.engine
    .register_template("register-ack", "registration", "Thanks {{ .Name }}!")
    .await
    .unwrap();
  h.engine.add_subscriber(NUMBER, "Ada").await.unwrap();

  let first = h.engine.handle_inbound_message(NUMBER, "reg").await.unwrap();
  assert!(matches!(first, InboundOutcome::Verified));
  assert_eq!(h.gateway.bodies(), vec!["Thanks Ada!"]);

  let subscriber = h
    .engine
    .store()
    .find_subscriber(&PhoneNumber::canonical(NUMBER))
    .await
    .unwrap()
    .unwrap();
  assert!(subscriber.verified);

  let second = h.engine.handle_inbound_message(NUMBER, "reg").await.unwrap();
  assert!(matches!(second, InboundOutcome::AlreadyVerified));
  assert_eq!(h.gateway.bodies().len(), 1);
  assert!(h.engine.journal_entries(NUMBER).await.unwrap().is_empty());
}

#[tokio::test]
async fn verification_without_ack_template_fails() {
  let h = harness().await;
  h.engine.add_subscriber(NUMBER, "Ada").await.unwrap();
  let err = h.engine.handle_inbound_message(NUMBER, "reg").await.unwrap_err();
  assert!(matches!(err, Error::MissingTemplate(_)));
}

#[tokio::test]
async fn new_subscriber_is_sent_registration_prompt() {
  let h = harness().await;
  h.engine
    .register_template("register", "registration", "Reply reg to confirm")
    .await
    .unwrap();

  let subscriber = h.engine.add_subscriber(NUMBER, "Ada").await.unwrap();
  assert!(!subscriber.verified);
  assert_eq!(h.gateway.bodies(), vec!["Reply reg to confirm"]);

  let last = h
    .engine
    .store()
    .last_sent_to(&PhoneNumber::canonical(NUMBER))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(last.body, "Reply reg to confirm");

  let outcome = h.engine.handle_inbound_message(NUMBER, "yes").await.unwrap();
  let InboundOutcome::Journaled(entry) = outcome else {
    panic!("expected a journal entry, got {outcome:?}");
  };
  assert_eq!(entry.prompt, "Reply reg to confirm");
}

#[tokio::test]
async fn registration_prompt_failure_keeps_subscriber() {
  let h = harness().await;
  h.engine
    .register_template("register", "registration", "Reply reg to confirm")
    .await
    .unwrap();
  h.gateway.fail.store(true, Ordering::SeqCst);

  let err = h.engine.add_subscriber(NUMBER, "Ada").await.unwrap_err();
  assert!(matches!(err.core(), Some(chime_core::Error::Gateway(_))));
  let stored = h
    .engine
    .store()
    .find_subscriber(&PhoneNumber::canonical(NUMBER))
    .await
    .unwrap();
  assert!(stored.is_some());
}

#[tokio::test]
async fn subscriber_without_register_template_gets_no_prompt() {
  let h = harness().await;
  h.engine.add_subscriber(NUMBER, "Ada").await.unwrap();
  assert!(h.gateway.bodies().is_empty());
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribe_rejects_unknown_template() {
  let h = harness().await;
  let err = h
    .engine
    .subscribe(
      NUMBER,
      "81a36dd3-8301-410c-af35-0b2a87cdd921",
      "2024-03-01 09:30:00",
      None,
    )
    .await
    .unwrap_err();
  assert_eq!(err.core().and_then(|e| e.field()), Some("template_id"));
}

#[tokio::test]
async fn subscribe_reports_bad_fields() {
  let h = harness().await;
  let template = h
    .engine
    .register_template("water", "reminder", "drink water")
    .await
    .unwrap();
  let id = template.template_id.to_string();

  let err = h
    .engine
    .subscribe("12345", &id, "2024-03-01 09:30:00", None)
    .await
    .unwrap_err();
  assert_eq!(err.core().and_then(|e| e.field()), Some("phone_number"));

  let err = h
    .engine
    .subscribe(NUMBER, &id, "2024-03-01 09:30:00", Some("-1h"))
    .await
    .unwrap_err();
  assert_eq!(err.core().and_then(|e| e.field()), Some("frequency"));
}

#[tokio::test]
async fn duplicate_subscriber_is_rejected() {
  let h = harness().await;
  h.engine.add_subscriber(NUMBER, "Ada").await.unwrap();
  let err = h.engine.add_subscriber("+15551234567", "Ada").await.unwrap_err();
  assert!(matches!(err, Error::SubscriberExists(_)));
}

#[tokio::test]
async fn unsubscribe_removes_pending_subscription() {
  let h = harness().await;
  let sub = h.subscribe(t0() + TimeDelta::hours(1), None).await;
  assert!(h.engine.unsubscribe(sub.subscription_id).await.unwrap());
  assert!(!h.engine.unsubscribe(sub.subscription_id).await.unwrap());
  assert!(h.pending().await.is_empty());
}
