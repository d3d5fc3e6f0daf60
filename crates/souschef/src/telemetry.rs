use std::{sync::Arc, time::Duration};

use shared::protocol::TelemetrySnapshot;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::control_plane::ControlPlane;

/// Latest telemetry snapshot, swapped as a whole by the poller.
#[derive(Clone, Default)]
pub struct TelemetryCache {
    latest: Arc<RwLock<Arc<TelemetrySnapshot>>>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty snapshot until the first successful poll.
    pub async fn latest(&self) -> Arc<TelemetrySnapshot> {
        Arc::clone(&*self.latest.read().await)
    }

    pub async fn replace(&self, snapshot: TelemetrySnapshot) {
        *self.latest.write().await = Arc::new(snapshot);
    }
}

pub struct TelemetryPoller {
    control: Arc<dyn ControlPlane>,
    cache: TelemetryCache,
    tick: Duration,
}

impl TelemetryPoller {
    pub fn new(control: Arc<dyn ControlPlane>, cache: TelemetryCache, tick: Duration) -> Self {
        Self {
            control,
            cache,
            tick,
        }
    }

    /// Polls until `shutdown` flips to `true` or its sender is dropped. Fetch
    /// failures keep the previous snapshot and are retried on the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_ms = self.tick.as_millis() as u64, "telemetry poller started");
        let mut consecutive_failures: u32 = 0;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                result = self.control.latest_meta() => match result {
                    Ok(snapshot) => {
                        if consecutive_failures > 0 {
                            info!(consecutive_failures, "telemetry fetch recovered");
                        }
                        consecutive_failures = 0;
                        self.cache.replace(snapshot).await;
                    }
                    Err(error) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        if consecutive_failures == 1 {
                            warn!("telemetry fetch failed, keeping last snapshot: {error:#}");
                        } else {
                            debug!(
                                consecutive_failures,
                                "telemetry fetch still failing: {error:#}"
                            );
                        }
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("telemetry poller stopped");
    }
}

#[cfg(test)]
#[path = "tests/telemetry_tests.rs"]
mod tests;
