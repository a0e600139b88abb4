//! Inbound message handling: journal replies and subscriber verification.
//!
//! A reply is paired with whatever was most recently sent to the same
//! number. There is no session identifier, so two prompts answered out of
//! order are journaled against the later one.

use chime_core::{
  gateway::{MessageGateway, OutboundMessage},
  message::{JournalEntry, NewCommunication, NewJournalEntry},
  phone::PhoneNumber,
  render::{Payload, render},
  store::NotificationStore,
  subscription::Subscriber,
  template::{NotificationKind, REGISTER_ACK, RegistrationStep, Template},
};
use uuid::Uuid;

use crate::{Engine, Error, Result};

/// What an inbound message turned into.
#[derive(Debug, Clone)]
pub enum InboundOutcome {
  Journaled(JournalEntry),
  /// The sender was verified and sent the registration acknowledgement.
  Verified,
  AlreadyVerified,
}

impl<S, G> Engine<S, G>
where
  S: NotificationStore,
  G: MessageGateway + 'static,
{
  /// Handle one inbound message from the provider webhook.
  pub async fn handle_inbound_message(&self, from: &str, body: &str) -> Result<InboundOutcome> {
    let from = PhoneNumber::canonical(from);
    if from.is_empty() {
      return Err(Error::MalformedInbound("empty sender"));
    }

    let received = self.log_inbound(&from, body).await;

    let subscriber = self
      .store
      .find_subscriber(&from)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::RecipientNotFound(from.clone()))?;

    if body == self.config.verification_command {
      return self.verify(subscriber).await;
    }

    let last_sent = self
      .store
      .last_sent_to(&from)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NothingToAnswer(from.clone()))?;

    let entry = self
      .store
      .add_journal_entry(NewJournalEntry {
        comms_id:     received,
        phone_number: from,
        prompt:       last_sent.body,
        entry:        body.to_owned(),
      })
      .await
      .map_err(Error::store)?;

    tracing::info!(from = %entry.phone_number, journal_id = %entry.journal_id, "reply journaled");
    Ok(InboundOutcome::Journaled(entry))
  }

  /// Record the inbound message. Best-effort: a failure is only logged.
  async fn log_inbound(&self, from: &PhoneNumber, body: &str) -> Option<Uuid> {
    let record = NewCommunication {
      template_id: None,
      from:        from.clone(),
      to:          self.gateway.sender().clone(),
      body:        body.to_owned(),
    };
    match self.store.record_communication(record).await {
      Ok(comm) => Some(comm.comms_id),
      Err(err) => {
        tracing::warn!(%from, error = %err, "failed to record inbound message");
        None
      }
    }
  }

  async fn verify(&self, subscriber: Subscriber) -> Result<InboundOutcome> {
    let phone = &subscriber.phone_number;
    if subscriber.verified
      || !self.store.mark_verified(phone).await.map_err(Error::store)?
    {
      tracing::info!(from = %phone, "subscriber already verified");
      return Ok(InboundOutcome::AlreadyVerified);
    }

    let kind = NotificationKind::Registration(RegistrationStep::RegisterAck);
    let template = self
      .store
      .find_template(&kind)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::MissingTemplate(REGISTER_ACK.to_owned()))?;

    self.send_registration(&template, &subscriber).await?;
    tracing::info!(from = %phone, "subscriber verified");
    Ok(InboundOutcome::Verified)
  }

  /// Render a registration template for `subscriber`, send it outside any
  /// transaction and record it. Recording is best-effort.
  pub(crate) async fn send_registration(
    &self,
    template: &Template,
    subscriber: &Subscriber,
  ) -> Result<()> {
    let payload = Payload::new().with("Name", subscriber.name.as_str());
    let body = render(template, &payload).map_err(chime_core::Error::from)?;
    let message = OutboundMessage {
      to: subscriber.phone_number.clone(),
      from: self.gateway.sender().clone(),
      body,
    };
    self
      .gateway
      .send(&message)
      .await
      .map_err(chime_core::Error::from)?;

    let record = NewCommunication {
      template_id: Some(template.template_id),
      from:        message.from,
      to:          message.to,
      body:        message.body,
    };
    if let Err(err) = self.store.record_communication(record).await {
      tracing::warn!(
        to = %subscriber.phone_number,
        template = %template.name,
        error = %err,
        "failed to record registration message"
      );
    }
    Ok(())
  }
}
