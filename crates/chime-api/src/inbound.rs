//! The provider webhook and the manual trigger.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sms/inbound` | Form `From`, `Body`; status code only |
//! | `POST` | `/trigger` | Runs one scheduler cycle; 204 or 500 |

use std::sync::Arc;

use axum::{
  Form,
  extract::{State, rejection::FormRejection},
  http::StatusCode,
};
use chime_core::{gateway::MessageGateway, store::NotificationStore};
use chime_engine::{Engine, InboundOutcome};
use serde::Deserialize;

use crate::error::ApiError;

/// The fields we read from the provider's inbound form. Everything else is
/// ignored.
#[derive(Debug, Deserialize)]
pub struct InboundForm {
  #[serde(rename = "From")]
  pub from: Option<String>,
  #[serde(rename = "Body")]
  pub body: Option<String>,
}

/// `POST /sms/inbound`
pub async fn receive<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
  form: Result<Form<InboundForm>, FormRejection>,
) -> StatusCode
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  let form = match form {
    Ok(Form(form)) => form,
    Err(rejection) => {
      tracing::warn!(error = %rejection, "unreadable inbound form");
      return StatusCode::BAD_REQUEST;
    }
  };
  let (Some(from), Some(body)) = (form.from, form.body) else {
    tracing::warn!("inbound form missing From or Body");
    return StatusCode::BAD_REQUEST;
  };

  match engine.handle_inbound_message(&from, &body).await {
    Ok(InboundOutcome::Journaled(_) | InboundOutcome::Verified | InboundOutcome::AlreadyVerified) => {
      StatusCode::OK
    }
    Err(err) => {
      let status = ApiError::engine_status(&err);
      if status.is_server_error() {
        tracing::error!(%from, error = %err, "failed to handle inbound message");
      } else {
        tracing::warn!(%from, error = %err, "rejected inbound message");
      }
      status
    }
  }
}

/// `POST /trigger`
pub async fn trigger<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
) -> Result<StatusCode, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  let report = engine.trigger_due_notifications().await?;
  tracing::info!(?report, "manual trigger finished");
  Ok(StatusCode::NO_CONTENT)
}
