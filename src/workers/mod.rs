mod inactivity;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::{env_bool, InactivityConfig};
use crate::db::LearningStore;
use crate::services::inactivity::ScanError;
use crate::services::notifier::GuardianNotifier;

pub use inactivity::run_scheduled_scan;

static WORKER_LEADER: AtomicBool = AtomicBool::new(false);

pub fn is_worker_leader() -> bool {
    WORKER_LEADER.load(Ordering::Relaxed)
}

fn set_worker_leader(val: bool) {
    WORKER_LEADER.store(val, Ordering::Relaxed);
}

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: broadcast::Sender<()>,
    store: Arc<dyn LearningStore>,
    notifier: Arc<dyn GuardianNotifier>,
    inactivity: InactivityConfig,
}

impl WorkerManager {
    pub async fn new(
        store: Arc<dyn LearningStore>,
        notifier: Arc<dyn GuardianNotifier>,
        inactivity: InactivityConfig,
    ) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await.map_err(WorkerError::Scheduler)?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            store,
            notifier,
            inactivity,
        })
    }

    /// Schedules the weekly guardian notification run. Only the process started
    /// with `WORKER_LEADER` set runs jobs, so replicas never notify twice.
    pub async fn start(&self) -> Result<(), WorkerError> {
        if !env_bool("WORKER_LEADER").unwrap_or(false) {
            info!("WORKER_LEADER not set, skipping worker startup");
            return Ok(());
        }

        set_worker_leader(true);
        info!("Starting workers (leader mode)");

        let scheduler = self.scheduler.lock().await;

        if self.inactivity.worker_enabled {
            let schedule = self.inactivity.schedule.clone();
            let window = self.inactivity.window();
            let store = Arc::clone(&self.store);
            let notifier = Arc::clone(&self.notifier);
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
                let store = Arc::clone(&store);
                let notifier = Arc::clone(&notifier);
                let mut rx = shutdown_rx.resubscribe();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.recv() => {},
                        result = inactivity::run_scheduled_scan(store, notifier, window) => {
                            if let Err(e) = result {
                                error!(error = %e, "Inactivity worker error");
                            }
                        }
                    }
                })
            })
            .map_err(WorkerError::Scheduler)?;
            scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
            info!(schedule = %schedule, "Inactivity worker scheduled");
        } else {
            info!("Inactivity worker disabled");
        }

        scheduler.start().await.map_err(WorkerError::Scheduler)?;
        info!("All workers started");

        Ok(())
    }

    pub async fn stop(&self) {
        if !is_worker_leader() {
            return;
        }

        info!("Stopping workers...");
        let _ = self.shutdown_tx.send(());

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }

        set_worker_leader(false);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Inactivity scan error: {0}")]
    Scan(#[from] ScanError),
}
