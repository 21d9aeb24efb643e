//! Background sweep that expires pending payments whose deadline has passed.
//!
//! The sweep holds no locks and keeps no state between passes. It relies on the conditional
//! PENDING -> EXPIRED update, so a payment confirmed or cancelled between the scan and the update
//! is skipped. Nothing is retried within a pass; the next tick picks up whatever is still pending.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::{
    services::payment_service::{self, TimeoutOutcome},
    state::AppState,
    store,
};

/// Shared flag telling health checks whether the sweep loop is alive.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerStatus {
    running: Arc<AtomicBool>,
}

impl ReconcilerStatus {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// One pass over every pending payment past its `expire_time`.
///
/// A failure on one payment is logged and counted; the rest of the pass continues. Only the
/// initial scan can fail the whole pass.
pub async fn sweep_expired_payments(state: &AppState) -> anyhow::Result<SweepReport> {
    let candidates = store::payments::list_expired_pending(&state.orm, Utc::now()).await?;
    let mut report = SweepReport {
        scanned: candidates.len(),
        ..Default::default()
    };

    for payment in candidates {
        match payment_service::handle_payment_timeout(state, &payment.payment_id).await {
            Ok(TimeoutOutcome::Expired { .. }) => report.expired += 1,
            Ok(TimeoutOutcome::Skipped(status)) => {
                tracing::debug!(payment_id = %payment.payment_id, %status, "skipped during sweep");
                report.skipped += 1;
            }
            Err(err) => {
                tracing::error!(
                    payment_id = %payment.payment_id,
                    error = %err,
                    "failed to expire payment"
                );
                report.failed += 1;
            }
        }
    }

    if report.scanned > 0 {
        tracing::info!(
            scanned = report.scanned,
            expired = report.expired,
            skipped = report.skipped,
            failed = report.failed,
            "payment timeout sweep finished"
        );
    } else {
        tracing::debug!("payment timeout sweep found nothing to expire");
    }
    Ok(report)
}

pub struct PaymentReconciler {
    state: AppState,
    period: Duration,
}

impl PaymentReconciler {
    pub fn new(state: AppState, period: Duration) -> Self {
        Self { state, period }
    }

    /// Starts the loop on its own task. The first sweep runs immediately.
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let status = self.state.reconciler.clone();

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            status.set_running(true);
            tracing::info!(period_secs = self.period.as_secs(), "payment reconciler started");

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(err) = sweep_expired_payments(&self.state).await {
                            tracing::error!(error = ?err, "payment timeout sweep failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            status.set_running(false);
            tracing::info!("payment reconciler stopped");
        });

        ReconcilerHandle { shutdown_tx, task }
    }
}

pub struct ReconcilerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Signals the loop and waits for the in-flight sweep, if any, to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "payment reconciler task panicked");
        }
    }
}
