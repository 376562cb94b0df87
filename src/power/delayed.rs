// ABOUTME: Background force power-off after a grace period.
// ABOUTME: Requests run one after another; completion is published on a watch channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ports::ControlProxy;
use crate::types::DeviceSerial;

/// Powers devices off after a delay, for instruments whose status lags behind
/// their maintenance-complete report.
///
/// Each scheduled task first waits for its predecessor, so at most one task is
/// ever sleeping or sending at a time. Tasks are numbered in scheduling order
/// and publish their number when done.
pub struct DelayedPowerOff {
    control: Arc<dyn ControlProxy>,
    post_power_off: Duration,
    in_flight: Option<JoinHandle<()>>,
    scheduled: u64,
    completed: watch::Sender<u64>,
}

impl DelayedPowerOff {
    pub fn new(control: Arc<dyn ControlProxy>, post_power_off: Duration) -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            control,
            post_power_off,
            in_flight: None,
            scheduled: 0,
            completed,
        }
    }

    /// Queue a force power-off of `devices` after `delay`.
    pub fn schedule(&mut self, devices: Vec<DeviceSerial>, delay: Duration) {
        if devices.is_empty() {
            return;
        }

        tracing::info!(devices = devices.len(), ?delay, "scheduling delayed power-off");

        self.scheduled += 1;
        let sequence = self.scheduled;
        let previous = self.in_flight.take();
        let control = Arc::clone(&self.control);
        let settle = self.post_power_off;
        let completed = self.completed.clone();

        self.in_flight = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                tracing::debug!("waiting for previous delayed power-off");
                let _ = previous.await;
            }

            tokio::time::sleep(delay).await;

            tracing::info!(devices = devices.len(), "delayed power-off");
            if let Err(e) = control.power_off(&devices).await {
                tracing::warn!(error = %e, "delayed power-off failed");
            }

            tokio::time::sleep(settle).await;
            completed.send_replace(sequence);
        }));
    }

    /// Whether a scheduled power-off has not completed yet.
    pub fn is_in_flight(&self) -> bool {
        *self.completed.borrow() < self.scheduled
    }

    /// Resolves once every power-off scheduled so far has completed.
    ///
    /// The future does not borrow the worker, so it can be awaited from
    /// another task while more requests are scheduled.
    pub fn drained(&self) -> impl Future<Output = ()> + Send + use<> {
        let target = self.scheduled;
        let mut completed = self.completed.subscribe();
        async move {
            if completed.wait_for(|done| *done >= target).await.is_err() {
                tracing::warn!("delayed power-off worker dropped before draining");
            }
        }
    }
}

impl std::fmt::Debug for DelayedPowerOff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedPowerOff")
            .field("post_power_off", &self.post_power_off)
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ControlError;
    use crate::types::MaintainGroupId;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Recorder {
        power_offs: Mutex<Vec<(Instant, Vec<DeviceSerial>)>>,
    }

    #[async_trait]
    impl ControlProxy for Recorder {
        async fn stop_test(&self) -> Result<(), ControlError> {
            Ok(())
        }

        async fn run_maintenance(
            &self,
            _group: MaintainGroupId,
            _devices: &[DeviceSerial],
        ) -> Result<(), ControlError> {
            Ok(())
        }

        async fn power_off(&self, devices: &[DeviceSerial]) -> Result<(), ControlError> {
            self.power_offs
                .lock()
                .push((Instant::now(), devices.to_vec()));
            Ok(())
        }
    }

    fn serials(names: &[&str]) -> Vec<DeviceSerial> {
        names.iter().map(|n| DeviceSerial::new(n).unwrap()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn powers_off_after_delay() {
        let recorder = Arc::new(Recorder::default());
        let mut worker = DelayedPowerOff::new(recorder.clone(), Duration::from_secs(2));
        let start = Instant::now();

        worker.schedule(serials(&["A"]), Duration::from_secs(3));
        assert!(worker.is_in_flight());
        worker.drained().await;

        let calls = recorder.power_offs.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0 - start, Duration::from_secs(3));
        assert_eq!(calls[0].1, serials(&["A"]));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn requests_run_sequentially() {
        let recorder = Arc::new(Recorder::default());
        let mut worker = DelayedPowerOff::new(recorder.clone(), Duration::from_secs(2));
        let start = Instant::now();

        worker.schedule(serials(&["A"]), Duration::from_secs(3));
        worker.schedule(serials(&["B"]), Duration::from_secs(3));
        worker.drained().await;

        let calls = recorder.power_offs.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, serials(&["A"]));
        assert_eq!(calls[1].1, serials(&["B"]));
        // second starts after the first's delay and settle period
        assert_eq!(calls[1].0 - start, Duration::from_secs(8));
        assert!(!worker.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn drained_ignores_later_requests() {
        let recorder = Arc::new(Recorder::default());
        let mut worker = DelayedPowerOff::new(recorder.clone(), Duration::from_secs(2));
        let start = Instant::now();

        worker.schedule(serials(&["A"]), Duration::from_secs(3));
        let first = worker.drained();
        worker.schedule(serials(&["B"]), Duration::from_secs(3));

        first.await;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(worker.is_in_flight());

        worker.drained().await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert!(!worker.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_request_is_ignored() {
        let recorder = Arc::new(Recorder::default());
        let mut worker = DelayedPowerOff::new(recorder.clone(), Duration::from_secs(2));

        worker.schedule(Vec::new(), Duration::from_secs(3));

        assert!(!worker.is_in_flight());
        worker.drained().await;
        assert!(recorder.power_offs.lock().is_empty());
    }
}
