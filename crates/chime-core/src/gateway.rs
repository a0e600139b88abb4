//! The outbound messaging seam.
//!
//! Implemented by `chime-gateway` for a real SMS provider and by fakes in
//! tests. Sends are not transactional: once `send` returns `Ok`, the message
//! is out, whatever happens to the surrounding database transaction.

use std::future::Future;

use thiserror::Error;

use crate::phone::PhoneNumber;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
  pub to:   PhoneNumber,
  pub from: PhoneNumber,
  pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
  /// The provider answered with something other than "created".
  #[error("gateway returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("gateway request failed: {0}")]
  Transport(String),

  #[error("gateway did not answer in time")]
  Timeout,
}

pub trait MessageGateway: Send + Sync {
  /// The number messages are sent from, in canonical form.
  fn sender(&self) -> &PhoneNumber;

  /// Hand one message to the provider.
  fn send<'a>(
    &'a self,
    message: &'a OutboundMessage,
  ) -> impl Future<Output = Result<(), GatewayError>> + Send + 'a;
}
