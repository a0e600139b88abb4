//! Error types for `chime-core`.

use thiserror::Error;

use crate::{
  frequency::FrequencyError, gateway::GatewayError, phone::PhoneNumber, render::RenderError,
};

#[derive(Debug, Error)]
pub enum Error {
  /// Bad caller input, scoped to the offending field. Never retried.
  #[error("invalid {field}: {message}")]
  Validation {
    field:   &'static str,
    message: String,
  },

  #[error("invalid frequency: {0}")]
  InvalidFrequency(#[from] FrequencyError),

  #[error("render error: {0}")]
  Render(#[from] RenderError),

  #[error("gateway error: {0}")]
  Gateway(#[from] GatewayError),

  /// A subscriber with this number is already on record.
  #[error("subscriber already exists: {0}")]
  SubscriberExists(PhoneNumber),
}

impl Error {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Self::Validation { field, message: message.into() }
  }

  /// The input field this error is scoped to, if it is a validation failure.
  pub fn field(&self) -> Option<&'static str> {
    match self {
      Self::Validation { field, .. } => Some(field),
      Self::InvalidFrequency(_) => Some("frequency"),
      Self::Render(_) | Self::Gateway(_) | Self::SubscriberExists(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
