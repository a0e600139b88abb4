//! Handlers for `/templates` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/templates` | Oldest first |
//! | `POST` | `/templates` | Body: `{"name":"…","type":"reminder","body":"…"}` |
//! | `GET`  | `/templates/{id}` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chime_core::{gateway::MessageGateway, store::NotificationStore, template::Template};
use chime_engine::Engine;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /templates`
pub async fn list<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
) -> Result<Json<Vec<Template>>, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  Ok(Json(engine.list_templates().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
  #[serde(rename = "type")]
  pub kind: String,
  pub body: String,
}

/// `POST /templates`
pub async fn create<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  let template = engine
    .register_template(&body.name, &body.kind, &body.body)
    .await?;
  Ok((StatusCode::CREATED, Json(template)))
}

/// `GET /templates/{id}`
pub async fn get_one<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Template>, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  let template = engine
    .get_template(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("template {id} not found")))?;
  Ok(Json(template))
}
