//! The Chime notification engine.
//!
//! Drives deliveries against any [`NotificationStore`] and
//! [`MessageGateway`]: the periodic scheduler, the on-demand trigger, the
//! inbound reply correlator and validated admin inserts.

pub mod catalog;
pub mod correlator;
mod delivery;
pub mod error;
pub mod scheduler;

use std::{sync::Arc, time::Duration};

use chime_core::{gateway::MessageGateway, store::NotificationStore};

pub use correlator::InboundOutcome;
pub use error::{Error, Result};
pub use scheduler::CycleReport;

/// Tunables for the scheduler and the correlator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Time between scheduler cycles.
  pub poll_interval:        Duration,
  /// Subscriptions are only picked up once they are this far overdue.
  pub grace_lag:            Duration,
  /// Inbound body that verifies a subscriber instead of being journaled.
  pub verification_command: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      poll_interval:        Duration::from_secs(15),
      grace_lag:            Duration::from_secs(15),
      verification_command: "reg".into(),
    }
  }
}

/// Shared handle to the store, the gateway and their configuration.
///
/// Wrap in an `Arc` to share between the scheduler task and HTTP handlers.
pub struct Engine<S, G> {
  store:   Arc<S>,
  gateway: Arc<G>,
  config:  EngineConfig,
}

impl<S, G> Engine<S, G>
where
  S: NotificationStore,
  G: MessageGateway + 'static,
{
  pub fn new(store: Arc<S>, gateway: Arc<G>, config: EngineConfig) -> Self {
    Self { store, gateway, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn gateway(&self) -> &G { &self.gateway }

  pub fn config(&self) -> &EngineConfig { &self.config }
}

#[cfg(test)]
mod tests;
