//! `GET /journal?phone_number=<number>`: journal entries, newest first.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chime_core::{gateway::MessageGateway, message::JournalEntry, store::NotificationStore};
use chime_engine::Engine;
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub phone_number: String,
}

pub async fn list<S, G>(
  State(engine): State<Arc<Engine<S, G>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<JournalEntry>>, ApiError>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  Ok(Json(engine.journal_entries(&params.phone_number).await?))
}
