//! Twilio-style SMS gateway for Chime.
//!
//! Messages are posted as a form to `{api_url}/Messages.json` with HTTP basic
//! auth; the provider must answer `201 Created`. Recipients whose canonical
//! number starts with the sandbox prefix are logged and never dispatched.

pub mod error;

use std::time::Duration;

use chime_core::{
  gateway::{GatewayError, MessageGateway, OutboundMessage},
  phone::PhoneNumber,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub use error::{Error, Result};

fn default_sandbox_prefix() -> String { "000".into() }
fn default_timeout_secs() -> u64 { 10 }

/// Provider settings, read from the `[gateway]` table of the server config.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
  pub api_url:        String,
  pub from_number:    String,
  #[serde(default)]
  pub username:       String,
  #[serde(default)]
  pub password:       String,
  #[serde(default = "default_sandbox_prefix")]
  pub sandbox_prefix: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:   u64,
}

/// [`MessageGateway`] over a pooled [`reqwest::Client`].
///
/// Cheap to clone; the inner client is `Arc`-based.
#[derive(Clone)]
pub struct SmsGateway {
  client:         Client,
  messages_url:   String,
  sender:         PhoneNumber,
  username:       String,
  password:       String,
  sandbox_prefix: String,
}

impl SmsGateway {
  pub fn new(config: GatewayConfig) -> Result<Self> {
    if config.api_url.trim().is_empty() {
      return Err(Error::Missing("api_url"));
    }
    let sender = PhoneNumber::canonical(&config.from_number);
    if sender.is_empty() {
      return Err(Error::Missing("from_number"));
    }

    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self {
      client,
      messages_url: format!(
        "{}/Messages.json",
        config.api_url.trim().trim_end_matches('/')
      ),
      sender,
      username: config.username,
      password: config.password,
      sandbox_prefix: config.sandbox_prefix,
    })
  }

  fn is_sandboxed(&self, to: &PhoneNumber) -> bool {
    !self.sandbox_prefix.is_empty() && to.as_str().starts_with(&self.sandbox_prefix)
  }
}

fn transport(err: reqwest::Error) -> GatewayError {
  if err.is_timeout() {
    GatewayError::Timeout
  } else {
    GatewayError::Transport(err.to_string())
  }
}

impl MessageGateway for SmsGateway {
  fn sender(&self) -> &PhoneNumber { &self.sender }

  async fn send(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
    if self.is_sandboxed(&message.to) {
      tracing::info!(to = %message.to, body = %message.body, "sandbox recipient, not dispatched");
      return Ok(());
    }

    let form = [
      ("To", message.to.international()),
      ("From", message.from.international()),
      ("Body", message.body.clone()),
    ];
    let resp = self
      .client
      .post(&self.messages_url)
      .basic_auth(&self.username, Some(&self.password))
      .form(&form)
      .send()
      .await
      .map_err(transport)?;

    let status = resp.status();
    if status != StatusCode::CREATED {
      let body = resp.text().await.unwrap_or_default();
      return Err(GatewayError::Status { status: status.as_u16(), body });
    }

    tracing::info!(to = %message.to, "message sent");
    Ok(())
  }
}
