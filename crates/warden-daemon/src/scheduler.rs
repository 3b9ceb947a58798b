//! Continuity batch scheduler

use crate::config::SchedulerConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use warden_engine::{BatchReport, Guard};

/// Drives [`Guard::run_batch`] on a fixed interval
pub struct Scheduler {
    config: SchedulerConfig,
    guard: Arc<Guard>,
    trigger_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
    last_report: RwLock<Option<BatchReport>>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(config: SchedulerConfig, guard: Arc<Guard>) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(10);

        let scheduler = Arc::new(Self {
            config,
            guard,
            trigger_tx,
            running: Arc::new(RwLock::new(true)),
            last_report: RwLock::new(None),
        });

        (scheduler, trigger_rx)
    }

    /// Run a batch now instead of waiting for the next tick
    pub async fn trigger_batch(&self) -> bool {
        self.trigger_tx.try_send(()).is_ok()
    }

    /// Run the batch loop until stopped
    pub async fn start(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<()>) {
        if !self.is_running().await {
            tracing::info!("Scheduler stopped before start");
            return;
        }

        let period = Duration::from_secs(self.config.batch_interval_secs.max(1));
        tracing::info!(interval_secs = period.as_secs(), "Scheduler started");

        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.run_once().await,
                Some(_) = trigger_rx.recv() => {
                    tracing::debug!("Triggered continuity batch");
                    self.run_once().await;
                }
                else => break,
            }

            if !*self.running.read().await {
                break;
            }
        }

        tracing::info!("Scheduler stopped");
    }

    async fn run_once(&self) {
        let report = self.guard.run_batch().await;
        *self.last_report.write().await = Some(report);
    }

    /// Stop after the current batch; a scheduler stopped before `start`
    /// never runs
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn last_report(&self) -> Option<BatchReport> {
        self.last_report.read().await.clone()
    }
}
