//! The `NotificationStore` trait and the delivery unit of work it executes.
//!
//! The trait is implemented by storage backends (e.g. `chime-store-sqlite`).
//! The engine depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  message::{Communication, JournalEntry, NewCommunication, NewJournalEntry},
  phone::PhoneNumber,
  subscription::{NewSubscriber, NewSubscription, Subscriber, Subscription},
  template::{NotificationKind, NewTemplate, Template},
};

// ─── Delivery ────────────────────────────────────────────────────────────────

/// What a firing does to its subscription row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleChange {
  /// One-shot: delete the row.
  Consume,
  /// Recurring: move `next_trigger_time` to the given instant.
  Advance(DateTime<Utc>),
}

/// One firing of one subscription, executed by
/// [`NotificationStore::deliver`] inside a single write transaction:
///
/// 1. the store checks the row still has the `due` time this firing was
///    selected with, and returns `Ok(None)` without side effects if not;
/// 2. [`reschedule`](Delivery::reschedule) is given the store's `now` and
///    the change is applied;
/// 3. [`dispatch`](Delivery::dispatch) renders and sends the message while
///    the transaction is still open;
/// 4. the returned communication is inserted and the transaction commits.
///
/// Any error rolls the whole transaction back. A send that succeeded before
/// a later failure is not undone, so delivery is at-least-once.
pub trait Delivery: Send + 'static {
  fn subscription_id(&self) -> Uuid;

  /// The `next_trigger_time` observed when the subscription was selected.
  fn due(&self) -> DateTime<Utc>;

  fn reschedule(&self, now: DateTime<Utc>) -> Result<ScheduleChange>;

  /// Called from the store's blocking context; may block on I/O.
  fn dispatch(self) -> Result<NewCommunication>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store that is the source of truth for
/// due times, templates, the message log and journal entries.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded runtime and from `axum` handlers.
pub trait NotificationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The store's notion of the current time. Every scheduling decision uses
  /// this rather than the local clock.
  fn now(&self) -> impl Future<Output = Result<DateTime<Utc>, Self::Error>> + Send + '_;

  // ── Templates ─────────────────────────────────────────────────────────

  fn add_template(
    &self,
    input: NewTemplate,
  ) -> impl Future<Output = Result<Template, Self::Error>> + Send + '_;

  fn get_template(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Template>, Self::Error>> + Send + '_;

  /// The oldest template of the given kind; registration kinds match on
  /// name as well.
  fn find_template<'a>(
    &'a self,
    kind: &'a NotificationKind,
  ) -> impl Future<Output = Result<Option<Template>, Self::Error>> + Send + 'a;

  fn list_templates(
    &self,
  ) -> impl Future<Output = Result<Vec<Template>, Self::Error>> + Send + '_;

  // ── Subscribers ───────────────────────────────────────────────────────

  fn add_subscriber(
    &self,
    input: NewSubscriber,
  ) -> impl Future<Output = Result<Subscriber, Self::Error>> + Send + '_;

  fn find_subscriber<'a>(
    &'a self,
    phone: &'a PhoneNumber,
  ) -> impl Future<Output = Result<Option<Subscriber>, Self::Error>> + Send + 'a;

  /// Set the verified flag. Returns `false` if it was already set or the
  /// subscriber does not exist.
  fn mark_verified<'a>(
    &'a self,
    phone: &'a PhoneNumber,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Subscriptions ─────────────────────────────────────────────────────

  fn add_subscription(
    &self,
    input: NewSubscription,
  ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send + '_;

  /// Returns `false` if no such subscription existed.
  fn remove_subscription(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn subscriptions_for<'a>(
    &'a self,
    phone: &'a PhoneNumber,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + 'a;

  /// Every subscription with `next_trigger_time <= before`, oldest first.
  fn due_subscriptions(
    &self,
    before: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + '_;

  /// Run one [`Delivery`] as a single transaction. `Ok(None)` means the
  /// firing was stale and nothing happened.
  fn deliver<D: Delivery>(
    &self,
    delivery: D,
  ) -> impl Future<Output = Result<Option<Communication>, Self::Error>> + Send + '_;

  // ── Communications ────────────────────────────────────────────────────

  fn record_communication(
    &self,
    input: NewCommunication,
  ) -> impl Future<Output = Result<Communication, Self::Error>> + Send + '_;

  /// The newest communication addressed to `phone`.
  fn last_sent_to<'a>(
    &'a self,
    phone: &'a PhoneNumber,
  ) -> impl Future<Output = Result<Option<Communication>, Self::Error>> + Send + 'a;

  // ── Journal ───────────────────────────────────────────────────────────

  fn add_journal_entry(
    &self,
    input: NewJournalEntry,
  ) -> impl Future<Output = Result<JournalEntry, Self::Error>> + Send + '_;

  /// Newest first.
  fn journal_entries<'a>(
    &'a self,
    phone: &'a PhoneNumber,
  ) -> impl Future<Output = Result<Vec<JournalEntry>, Self::Error>> + Send + 'a;
}
