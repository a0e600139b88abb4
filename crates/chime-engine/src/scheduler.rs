//! The scheduler loop and the on-demand trigger.
//!
//! Both run the same cycle: read the store's `now`, select every
//! subscription at least `grace_lag` overdue, and deliver them one at a time.
//! A failure on one subscription is logged and the batch carries on.

use std::future::Future;

use chrono::TimeDelta;
use chime_core::{gateway::MessageGateway, store::NotificationStore};
use tokio::time::{Instant, MissedTickBehavior};

use crate::{Engine, Error, Result};

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
  pub due:       usize,
  pub delivered: usize,
  /// Already handled by a concurrent cycle, or not renderable.
  pub skipped:   usize,
  /// Rolled back; picked up again next cycle.
  pub failed:    usize,
}

impl<S, G> Engine<S, G>
where
  S: NotificationStore,
  G: MessageGateway + 'static,
{
  /// Run one scheduler cycle now.
  ///
  /// Only reading the due set can fail the cycle as a whole; per-subscription
  /// failures are counted in the report.
  pub async fn trigger_due_notifications(&self) -> Result<CycleReport> {
    let now = self.store.now().await.map_err(Error::store)?;
    let lag = TimeDelta::from_std(self.config.grace_lag).unwrap_or(TimeDelta::zero());
    let cutoff = now.checked_sub_signed(lag).unwrap_or(now);

    let due = self
      .store
      .due_subscriptions(cutoff)
      .await
      .map_err(Error::store)?;

    let mut report = CycleReport { due: due.len(), ..CycleReport::default() };

    for subscription in due {
      let subscription_id = subscription.subscription_id;
      let to = subscription.phone_number.clone();

      match self.deliver(subscription).await {
        Ok(Some(_)) => {
          report.delivered += 1;
          tracing::info!(%subscription_id, %to, "notification delivered");
        }
        Ok(None) => {
          report.skipped += 1;
          tracing::debug!(%subscription_id, "already handled by another cycle");
        }
        Err(err) => match err.core() {
          Some(chime_core::Error::Gateway(_)) => {
            report.failed += 1;
            tracing::warn!(%subscription_id, %to, error = %err, "send failed, retrying next cycle");
          }
          Some(_) => {
            report.skipped += 1;
            tracing::warn!(%subscription_id, %to, error = %err, "skipping undeliverable subscription");
          }
          None => {
            report.failed += 1;
            tracing::error!(%subscription_id, error = %err, "delivery failed");
          }
        },
      }
    }

    Ok(report)
  }

  /// Run cycles every `poll_interval` until `shutdown` resolves.
  ///
  /// The first cycle runs one interval after start. A cycle that fails to
  /// read the due set is logged and the loop waits for the next tick.
  pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
    let period = self.config.poll_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
      poll_interval = ?period,
      grace_lag = ?self.config.grace_lag,
      "scheduler started"
    );

    tokio::pin!(shutdown);
    loop {
      tokio::select! {
        _ = &mut shutdown => {
          tracing::info!("scheduler stopping");
          break;
        }
        _ = ticker.tick() => {}
      }

      match self.trigger_due_notifications().await {
        Ok(report) if report.due > 0 => tracing::info!(?report, "cycle finished"),
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "failed to read due notifications"),
      }
    }
  }
}
