//! Background maintenance: reservation expiry sweep and reorder scan.

use std::io;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info};

use stockledger_core::Clock;

use crate::alerts::ReorderAlertEngine;
use crate::reservations::ReservationManager;

/// Scheduler runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceStats {
    pub sweeps_run: u64,
    pub reservations_expired: u64,
    pub sweep_failures: u64,
    pub scans_run: u64,
    pub products_scanned: u64,
    pub alerts_raised: u64,
    pub scan_failures: u64,
    pub uptime_secs: u64,
}

/// Handle to control a running scheduler.
#[derive(Debug)]
pub struct MaintenanceHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<MaintenanceStats>>,
}

impl MaintenanceHandle {
    /// Request graceful shutdown and wait for the current pass to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> MaintenanceStats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

pub struct MaintenanceScheduler {
    reservations: Arc<ReservationManager>,
    alerts: Arc<ReorderAlertEngine>,
    clock: Arc<dyn Clock>,
    expiry_interval: Duration,
    scan_interval: Duration,
    poll_interval: Duration,
}

impl MaintenanceScheduler {
    pub fn new(reservations: Arc<ReservationManager>, alerts: Arc<ReorderAlertEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reservations,
            alerts,
            clock,
            expiry_interval: Duration::from_secs(60),
            scan_interval: Duration::from_secs(15 * 60),
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_expiry_interval(mut self, interval: Duration) -> Self {
        self.expiry_interval = interval;
        self
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn run_expiry_sweep(&self, stats: &Mutex<MaintenanceStats>) {
        let outcome = self.reservations.expire_due(self.clock.now());
        update(stats, |s| {
            s.sweeps_run += 1;
            match &outcome {
                Ok(report) => {
                    s.reservations_expired += report.expired as u64;
                    s.sweep_failures += report.failed.len() as u64;
                }
                Err(_) => s.sweep_failures += 1,
            }
        });
        if let Err(e) = outcome {
            error!(error = %e, "reservation expiry sweep failed");
        }
    }

    fn run_reorder_scan(&self, stats: &Mutex<MaintenanceStats>) {
        let outcome = self.alerts.scan_all();
        update(stats, |s| {
            s.scans_run += 1;
            match &outcome {
                Ok(report) => {
                    s.products_scanned += report.evaluated as u64;
                    s.alerts_raised += report.raised as u64;
                    s.scan_failures += report.failed.len() as u64;
                }
                Err(_) => s.scan_failures += 1,
            }
        });
        if let Err(e) = outcome {
            error!(error = %e, "reorder scan failed");
        }
    }

    /// Spawn the scheduler on a background thread.
    ///
    /// Both jobs run once at start-up and then on their intervals.
    pub fn spawn(self) -> io::Result<MaintenanceHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(MaintenanceStats::default()));
        let thread_stats = Arc::clone(&stats);

        let join = thread::Builder::new()
            .name("stock-maintenance".to_string())
            .spawn(move || self.run(shutdown_rx, thread_stats))?;

        Ok(MaintenanceHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }

    fn run(self, shutdown: mpsc::Receiver<()>, stats: Arc<Mutex<MaintenanceStats>>) {
        info!(
            expiry_interval_secs = self.expiry_interval.as_secs(),
            scan_interval_secs = self.scan_interval.as_secs(),
            "maintenance scheduler started"
        );
        let started = Instant::now();
        let mut next_sweep = started;
        let mut next_scan = started;

        loop {
            let now = Instant::now();
            if now >= next_sweep {
                self.run_expiry_sweep(&stats);
                next_sweep = now + self.expiry_interval;
            }
            if now >= next_scan {
                self.run_reorder_scan(&stats);
                next_scan = now + self.scan_interval;
            }
            update(&stats, |s| s.uptime_secs = started.elapsed().as_secs());

            match shutdown.recv_timeout(self.poll_interval) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
        }

        info!("maintenance scheduler stopped");
    }
}

fn update(stats: &Mutex<MaintenanceStats>, f: impl FnOnce(&mut MaintenanceStats)) {
    match stats.lock() {
        Ok(mut s) => f(&mut s),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}
