//! Template rendering.
//!
//! Reminders and prompts are sent verbatim. Registration templates are
//! dispatched on their name; only `register-ack` is a real template, with
//! `{{.Key}}` placeholders resolved from a [`Payload`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::template::{NotificationKind, RegistrationStep, Template};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
  #[error("unhandled notification type {0:?}")]
  UnhandledKind(String),

  #[error("unhandled registration template {0:?}")]
  UnhandledRegistration(String),

  #[error("template syntax error at byte {offset}: {message}")]
  Syntax { offset: usize, message: String },

  #[error("no value for placeholder {0:?}")]
  MissingValue(String),
}

/// Values available to placeholder substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(BTreeMap<String, String>);

impl Payload {
  pub fn new() -> Self { Self::default() }

  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.0.insert(key.into(), value.into());
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> { self.0.get(key).map(String::as_str) }
}

/// Produce the message text for `template`.
pub fn render(template: &Template, payload: &Payload) -> Result<String, RenderError> {
  match &template.kind {
    NotificationKind::Reminder | NotificationKind::Prompt => Ok(template.body.clone()),
    NotificationKind::Registration(step) => match step {
      RegistrationStep::Register => Ok(template.body.clone()),
      RegistrationStep::RegisterAck => substitute(&template.body, payload),
      RegistrationStep::Unhandled(name) => {
        Err(RenderError::UnhandledRegistration(name.clone()))
      }
    },
    NotificationKind::Unhandled(kind) => Err(RenderError::UnhandledKind(kind.clone())),
  }
}

/// Replace every `{{.Key}}` action in `body` with the payload value.
///
/// Whitespace inside the braces is allowed. Text outside actions, including a
/// stray `}}`, is copied through unchanged.
pub fn substitute(body: &str, payload: &Payload) -> Result<String, RenderError> {
  let mut out = String::with_capacity(body.len());
  let mut rest = body;
  let mut offset = 0;

  while let Some(open) = rest.find("{{") {
    out.push_str(&rest[..open]);
    let action_start = offset + open;
    let after_open = &rest[open + 2..];
    let close = after_open.find("}}").ok_or_else(|| RenderError::Syntax {
      offset:  action_start,
      message: "unclosed action".to_owned(),
    })?;

    let key = parse_action(after_open[..close].trim()).ok_or_else(|| {
      RenderError::Syntax {
        offset:  action_start,
        message: format!("unsupported action {:?}", &after_open[..close]),
      }
    })?;
    let value = payload
      .get(key)
      .ok_or_else(|| RenderError::MissingValue(key.to_owned()))?;
    out.push_str(value);

    let consumed = open + 2 + close + 2;
    rest = &rest[consumed..];
    offset += consumed;
  }

  out.push_str(rest);
  Ok(out)
}

/// `.Name` → `Name`; anything else is unsupported.
fn parse_action(action: &str) -> Option<&str> {
  let key = action.strip_prefix('.')?;
  let mut chars = key.chars();
  let first = chars.next()?;
  if !(first.is_ascii_alphabetic() || first == '_') {
    return None;
  }
  chars
    .all(|c| c.is_ascii_alphanumeric() || c == '_')
    .then_some(key)
}
