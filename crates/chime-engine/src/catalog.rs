//! Validated admin operations: templates, subscribers and subscriptions.
//!
//! Raw input is checked field by field before anything reaches the store, so
//! a rejected request names the offending field.

use chime_core::{
  gateway::MessageGateway,
  message::JournalEntry,
  phone::PhoneNumber,
  store::NotificationStore,
  subscription::{NewSubscriber, NewSubscription, Subscriber, Subscription},
  template::{NewTemplate, NotificationKind, REGISTER, RegistrationStep, Template},
};
use uuid::Uuid;

use crate::{Engine, Error, Result};

impl<S, G> Engine<S, G>
where
  S: NotificationStore,
  G: MessageGateway + 'static,
{
  // ── Templates ─────────────────────────────────────────────────────────────

  pub async fn register_template(&self, name: &str, kind: &str, body: &str) -> Result<Template> {
    let input = NewTemplate::validate(name, kind, body)?;
    let template = self.store.add_template(input).await.map_err(Error::store)?;
    tracing::info!(template_id = %template.template_id, name = %template.name, "template registered");
    Ok(template)
  }

  pub async fn get_template(&self, id: Uuid) -> Result<Option<Template>> {
    self.store.get_template(id).await.map_err(Error::store)
  }

  pub async fn list_templates(&self) -> Result<Vec<Template>> {
    self.store.list_templates().await.map_err(Error::store)
  }

  // ── Subscribers ───────────────────────────────────────────────────────────

  /// Add a subscriber and send them the `register` prompt, if one is
  /// registered. The reply to that prompt drives verification.
  ///
  /// The insert is the only uniqueness check; a concurrent duplicate still
  /// comes back as [`Error::SubscriberExists`].
  pub async fn add_subscriber(&self, phone_number: &str, name: &str) -> Result<Subscriber> {
    let input = NewSubscriber::validate(phone_number, name)?;
    let subscriber = self
      .store
      .add_subscriber(input)
      .await
      .map_err(|err| Error::store(err).into_conflict())?;
    tracing::info!(phone_number = %subscriber.phone_number, "subscriber added");

    let kind = NotificationKind::Registration(RegistrationStep::Register);
    match self.store.find_template(&kind).await.map_err(Error::store)? {
      Some(template) => self.send_registration(&template, &subscriber).await?,
      None => tracing::warn!(
        phone_number = %subscriber.phone_number,
        "no {REGISTER} template registered, registration prompt not sent"
      ),
    }
    Ok(subscriber)
  }

  // ── Subscriptions ─────────────────────────────────────────────────────────

  /// Create a subscription. `frequency` of `None` or blank is one-shot.
  pub async fn subscribe(
    &self,
    phone_number: &str,
    template_id: &str,
    next_trigger_time: &str,
    frequency: Option<&str>,
  ) -> Result<Subscription> {
    let input =
      NewSubscription::validate(phone_number, template_id, next_trigger_time, frequency)?;

    let template = self
      .store
      .get_template(input.template_id)
      .await
      .map_err(Error::store)?;
    if template.is_none() {
      return Err(
        chime_core::Error::validation(
          "template_id",
          format!("template {} does not exist", input.template_id),
        )
        .into(),
      );
    }

    let subscription = self.store.add_subscription(input).await.map_err(Error::store)?;
    tracing::info!(
      subscription_id = %subscription.subscription_id,
      to = %subscription.phone_number,
      next_trigger_time = %subscription.next_trigger_time,
      "subscription added"
    );
    Ok(subscription)
  }

  /// Returns `false` if there was nothing to remove.
  pub async fn unsubscribe(&self, subscription_id: Uuid) -> Result<bool> {
    self
      .store
      .remove_subscription(subscription_id)
      .await
      .map_err(Error::store)
  }

  pub async fn subscriptions_for(&self, phone_number: &str) -> Result<Vec<Subscription>> {
    let phone = PhoneNumber::parse(phone_number)?;
    self.store.subscriptions_for(&phone).await.map_err(Error::store)
  }

  // ── Journal ───────────────────────────────────────────────────────────────

  /// Journal entries for a number, newest first.
  pub async fn journal_entries(&self, phone_number: &str) -> Result<Vec<JournalEntry>> {
    let phone = PhoneNumber::parse(phone_number)?;
    self.store.journal_entries(&phone).await.map_err(Error::store)
  }
}
