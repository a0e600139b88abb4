//! Error type for `chime-gateway`.
//!
//! Only construction can fail here; per-message failures are reported as
//! [`chime_core::gateway::GatewayError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("gateway.{0} must be set")]
  Missing(&'static str),

  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
