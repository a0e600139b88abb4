//! Subscriptions and the subscribers they deliver to.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result, frequency::Frequency, phone::PhoneNumber, template::Template};

/// Legacy wall-clock format accepted alongside RFC 3339; interpreted as UTC.
const PLAIN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A recipient's standing order for one template.
///
/// `frequency == None` marks a one-shot subscription, deleted the moment it
/// fires.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
  pub subscription_id:   Uuid,
  pub phone_number:      PhoneNumber,
  pub template:          Template,
  pub next_trigger_time: DateTime<Utc>,
  /// Recurrence string in [`Frequency`] grammar, kept as stored.
  pub frequency:         Option<String>,
  pub created_at:        DateTime<Utc>,
}

impl Subscription {
  pub fn is_one_shot(&self) -> bool { self.frequency.is_none() }
}

/// Input to [`crate::store::NotificationStore::add_subscription`].
#[derive(Debug, Clone)]
pub struct NewSubscription {
  pub phone_number:      PhoneNumber,
  pub template_id:       Uuid,
  pub next_trigger_time: DateTime<Utc>,
  pub frequency:         Option<String>,
}

impl NewSubscription {
  /// Validate raw admin input field by field. Template existence is checked
  /// separately against the store.
  pub fn validate(
    phone_number: &str,
    template_id: &str,
    next_trigger_time: &str,
    frequency: Option<&str>,
  ) -> Result<Self> {
    let phone_number = PhoneNumber::parse(phone_number)?;
    let template_id = Uuid::parse_str(template_id.trim()).map_err(|_| {
      Error::validation(
        "template_id",
        format!("template_id {template_id:?} is not a UUID"),
      )
    })?;
    let next_trigger_time = parse_trigger_time(next_trigger_time)?;

    let frequency = match frequency.map(str::trim) {
      None | Some("") => None,
      Some(text) => {
        Frequency::parse(text)?;
        Some(text.to_owned())
      }
    };

    Ok(Self { phone_number, template_id, next_trigger_time, frequency })
  }
}

fn parse_trigger_time(raw: &str) -> Result<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(raw, PLAIN_TIME_FORMAT)
    .map(|naive| naive.and_utc())
    .map_err(|_| {
      Error::validation(
        "next_trigger_time",
        format!("next_trigger_time {raw:?} is neither RFC 3339 nor {PLAIN_TIME_FORMAT}"),
      )
    })
}

/// The account projection the engine needs: who a number belongs to and
/// whether they have confirmed it.
#[derive(Debug, Clone, Serialize)]
pub struct Subscriber {
  pub phone_number: PhoneNumber,
  pub name:         String,
  pub verified:     bool,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::NotificationStore::add_subscriber`].
#[derive(Debug, Clone)]
pub struct NewSubscriber {
  pub phone_number: PhoneNumber,
  pub name:         String,
}

impl NewSubscriber {
  pub fn validate(phone_number: &str, name: &str) -> Result<Self> {
    let phone_number = PhoneNumber::parse(phone_number)?;
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::validation("name", "name must not be empty"));
    }
    Ok(Self { phone_number, name: name.to_owned() })
  }
}
