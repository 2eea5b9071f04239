use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::WithdrawalService;
use crate::store::Store;

/// Periodically returns overdue escrow to its wallets.
///
/// Lookups also expire records lazily, so the sweep only bounds how long an
/// untouched record can sit past its window.
pub struct ExpirySweeper<S> {
    withdrawals: WithdrawalService<S>,
    interval: Duration,
}

impl<S: Store> ExpirySweeper<S> {
    pub(crate) fn new(withdrawals: WithdrawalService<S>, interval: Duration) -> Self {
        Self {
            withdrawals,
            interval,
        }
    }

    /// Sweep every `interval` until `shutdown` turns true or its sender is
    /// dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "expiry sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("expiry sweeper stopped");
    }

    /// One pass over the pool. Returns the number of records expired.
    pub fn sweep_once(&self) -> usize {
        match self.withdrawals.expire_due() {
            Ok(expired) => {
                if expired > 0 {
                    info!(expired, "expiry sweep finished");
                }
                expired
            }
            Err(e) => {
                error!(reason = %e, "expiry sweep failed");
                0
            }
        }
    }
}
