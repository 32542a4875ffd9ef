//! Phase/QPS heartbeat: samples the request counter once a second and logs
//! traffic-phase transitions. Purely observational — nothing here feeds
//! back into request handling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct QueryCounter(AtomicU64);

impl QueryCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(0)))
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn take(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Spawns the background sampling task. Runs until the process exits;
/// there's nothing to join on shutdown since it carries no state worth
/// flushing.
pub fn spawn(counter: Arc<QueryCounter>) {
    tokio::spawn(async move {
        let mut in_phase = false;
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let qps = counter.take();
            match (qps > 0, in_phase) {
                (true, false) => {
                    tracing::info!(qps, "phase start: traffic detected");
                    in_phase = true;
                }
                (false, true) => {
                    tracing::info!("phase end: traffic idle");
                    in_phase = false;
                }
                (true, true) => tracing::info!(qps, "phase: sustained traffic"),
                (false, false) => {}
            }
        }
    });
}
