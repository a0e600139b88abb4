//! The [`Delivery`] the engine hands to the store for each due subscription.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chime_core::{
  frequency::Frequency,
  gateway::{MessageGateway, OutboundMessage},
  message::{Communication, NewCommunication},
  render::{Payload, render},
  store::{Delivery, NotificationStore, ScheduleChange},
  subscription::Subscription,
};
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::{Engine, Error, Result};

/// One firing of one subscription.
///
/// `dispatch` runs on the store's connection thread, outside the async
/// runtime, so it drives the gateway future with the captured `Handle`.
pub(crate) struct SubscriptionDelivery<G> {
  subscription: Subscription,
  gateway:      Arc<G>,
  runtime:      Handle,
}

impl<G> Delivery for SubscriptionDelivery<G>
where
  G: MessageGateway + 'static,
{
  fn subscription_id(&self) -> Uuid { self.subscription.subscription_id }

  fn due(&self) -> DateTime<Utc> { self.subscription.next_trigger_time }

  fn reschedule(&self, now: DateTime<Utc>) -> chime_core::Result<ScheduleChange> {
    match &self.subscription.frequency {
      None => Ok(ScheduleChange::Consume),
      Some(text) => {
        let frequency = Frequency::parse(text)?;
        Ok(ScheduleChange::Advance(
          frequency.next_trigger(self.subscription.next_trigger_time, now),
        ))
      }
    }
  }

  fn dispatch(self) -> chime_core::Result<NewCommunication> {
    let template = &self.subscription.template;
    let body = render(template, &Payload::new())?;
    let message = OutboundMessage {
      to: self.subscription.phone_number.clone(),
      from: self.gateway.sender().clone(),
      body,
    };

    self.runtime.block_on(self.gateway.send(&message))?;

    Ok(NewCommunication {
      template_id: Some(template.template_id),
      from:        message.from,
      to:          message.to,
      body:        message.body,
    })
  }
}

impl<S, G> Engine<S, G>
where
  S: NotificationStore,
  G: MessageGateway + 'static,
{
  /// Fire one subscription: reschedule or consume it, render and send its
  /// message, and log the send, all in one store transaction.
  ///
  /// Returns `Ok(None)` when the subscription was already handled by another
  /// cycle since it was read.
  pub async fn deliver(&self, subscription: Subscription) -> Result<Option<Communication>> {
    let delivery = SubscriptionDelivery {
      subscription,
      gateway: self.gateway.clone(),
      runtime: Handle::current(),
    };
    self.store.deliver(delivery).await.map_err(Error::store)
  }
}
