//! HTTP surface for Chime.
//!
//! Exposes an axum [`Router`] over a shared [`Engine`]: the provider's
//! inbound SMS webhook, the on-demand trigger and JSON admin endpoints.
//! Auth, TLS and request logging are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = chime_api::api_router(engine.clone()).layer(TraceLayer::new_for_http());
//! ```

pub mod error;
pub mod inbound;
pub mod journal;
pub mod subscriptions;
pub mod templates;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post},
};
use chime_core::{gateway::MessageGateway, store::NotificationStore};
use chime_engine::Engine;

pub use error::ApiError;

/// Build the API router for `engine`.
pub fn api_router<S, G>(engine: Arc<Engine<S, G>>) -> Router<()>
where
  S: NotificationStore + 'static,
  G: MessageGateway + 'static,
{
  Router::new()
    // Provider webhook and scheduler
    .route("/sms/inbound", post(inbound::receive::<S, G>))
    .route("/trigger", post(inbound::trigger::<S, G>))
    // Templates
    .route("/templates", get(templates::list::<S, G>).post(templates::create::<S, G>))
    .route("/templates/{id}", get(templates::get_one::<S, G>))
    // Subscribers and subscriptions
    .route("/subscribers", post(subscriptions::add_subscriber::<S, G>))
    .route(
      "/subscriptions",
      get(subscriptions::list::<S, G>).post(subscriptions::create::<S, G>),
    )
    .route("/subscriptions/{id}", delete(subscriptions::remove::<S, G>))
    // Journal
    .route("/journal", get(journal::list::<S, G>))
    .with_state(engine)
}
