//! Handlers for `/subscribers` and `/subscriptions`.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/subscribers` | Body: `{"phone_number":"…","name":"…"}`; 409 if taken |
//! | `GET`    | `/subscriptions?phone_number=…` | Soonest first |
//! | `POST`   | `/subscriptions` | Body: `{"phone_number","template_id","next_trigger_time","frequency"?}` |
//! | `DELETE` | `/subscriptions/{id}` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chime_core::{
  gateway::MessageGateway,
  store::NotificationStore,
  subscription::Subscription,
};
use chime_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Subscribers ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubscriberBody {
  pub phone_number: String,
  pub name:         String,
}

/// `POST /subscribers`
pub async fn add_subscriber<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
  Json(body): Json<SubscriberBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  let subscriber = engine.add_subscriber(&body.phone_number, &body.name).await?;
  Ok((StatusCode::CREATED, Json(subscriber)))
}

// ─── Subscriptions ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub phone_number: String,
}

/// `GET /subscriptions?phone_number=<number>`
pub async fn list<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Subscription>>, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  Ok(Json(engine.subscriptions_for(&params.phone_number).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub phone_number:      String,
  pub template_id:       String,
  pub next_trigger_time: String,
  #[serde(default)]
  pub frequency:         Option<String>,
}

/// `POST /subscriptions`
pub async fn create<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  let subscription = engine
    .subscribe(
      &body.phone_number,
      &body.template_id,
      &body.next_trigger_time,
      body.frequency.as_deref(),
    )
    .await?;
  Ok((StatusCode::CREATED, Json(subscription)))
}

/// `DELETE /subscriptions/{id}`
pub async fn remove<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  if engine.unsubscribe(id).await? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("subscription {id} not found")))
  }
}
