use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument};

use gateway_types::LedgerRepository;

use crate::PaymentOrchestrator;

/// Background loop that periodically reconciles stale records.
pub struct ReconcileWorker<R: LedgerRepository> {
    orchestrator: Arc<PaymentOrchestrator<R>>,
    interval: Duration,
}

impl<R: LedgerRepository> ReconcileWorker<R> {
    pub fn new(orchestrator: Arc<PaymentOrchestrator<R>>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    #[instrument(skip(self), fields(interval_secs = self.interval.as_secs()))]
    pub async fn run(self) {
        info!("Starting reconciliation worker");
        loop {
            sleep(self.interval).await;
            match self.orchestrator.reconcile().await {
                Ok(report) if report.examined > 0 => {
                    info!(
                        examined = report.examined,
                        resolved = report.resolved,
                        escalated = report.escalated,
                        "Reconciled stale transactions"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Reconciliation pass failed: {}", e);
                }
            }
        }
    }
}
