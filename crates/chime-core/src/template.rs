//! Notification templates and their kind taxonomy.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::{Error, Result};

/// Name of the registration template sent when an account is created.
pub const REGISTER: &str = "register";
/// Name of the registration template sent once a subscriber verifies.
pub const REGISTER_ACK: &str = "register-ack";

/// Step within the registration flow, derived from the template name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
  Register,
  RegisterAck,
  Unhandled(String),
}

/// What a template is for. Stored as a `type` column plus the template name;
/// unknown values are kept so rendering can reject them explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
  Reminder,
  Prompt,
  Registration(RegistrationStep),
  Unhandled(String),
}

impl NotificationKind {
  /// Discriminants accepted by [`NewTemplate::validate`].
  pub const KNOWN: [&'static str; 3] = ["registration", "reminder", "prompt"];

  /// Classify a stored `(type, name)` pair.
  pub fn classify(kind: &str, name: &str) -> Self {
    match kind {
      "reminder" => Self::Reminder,
      "prompt" => Self::Prompt,
      "registration" => Self::Registration(match name {
        REGISTER => RegistrationStep::Register,
        REGISTER_ACK => RegistrationStep::RegisterAck,
        other => RegistrationStep::Unhandled(other.to_owned()),
      }),
      other => Self::Unhandled(other.to_owned()),
    }
  }

  /// For registration kinds, the template name the step is keyed on.
  pub fn registration_name(&self) -> Option<&str> {
    match self {
      Self::Registration(RegistrationStep::Register) => Some(REGISTER),
      Self::Registration(RegistrationStep::RegisterAck) => Some(REGISTER_ACK),
      Self::Registration(RegistrationStep::Unhandled(name)) => Some(name),
      _ => None,
    }
  }

  /// The value stored in the `kind` column.
  pub fn discriminant(&self) -> &str {
    match self {
      Self::Reminder => "reminder",
      Self::Prompt => "prompt",
      Self::Registration(_) => "registration",
      Self::Unhandled(kind) => kind,
    }
  }
}

impl Serialize for NotificationKind {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.discriminant())
  }
}

/// A notification template. Never updated or deleted once inserted.
#[derive(Debug, Clone, Serialize)]
pub struct Template {
  pub template_id: Uuid,
  pub name:        String,
  #[serde(rename = "type")]
  pub kind:        NotificationKind,
  pub body:        String,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::NotificationStore::add_template`].
#[derive(Debug, Clone)]
pub struct NewTemplate {
  pub name: String,
  pub kind: NotificationKind,
  pub body: String,
}

impl NewTemplate {
  /// Validate raw admin input.
  pub fn validate(name: &str, kind: &str, body: &str) -> Result<Self> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::validation("name", "name must not be empty"));
    }
    if !NotificationKind::KNOWN.contains(&kind) {
      return Err(Error::validation(
        "type",
        format!(
          "type {kind:?} is not one of {}",
          NotificationKind::KNOWN.join(", ")
        ),
      ));
    }
    Ok(Self {
      name: name.to_owned(),
      kind: NotificationKind::classify(kind, name),
      body: body.to_owned(),
    })
  }
}
