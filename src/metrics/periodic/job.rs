use super::MetricCollector;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::error;

/// Drives a [`MetricCollector`] on a fixed period.
pub struct PeriodicJob<T> {
    /// Metric collector.
    collector: T,
    /// Time between collection cycles.
    period: Duration,
}

impl<T: MetricCollector + Send + 'static> PeriodicJob<T> {
    /// Creates a [`PeriodicJob`].
    pub fn new(collector: T, period: Duration) -> Self {
        Self { collector, period }
    }

    /// Spawns the collection loop onto the runtime.
    ///
    /// A failing collection is logged and does not halt future cycles.
    pub fn spawn(self) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(err) = self.collector.collect().await {
                    error!(target: "metrics::periodic", ?err, collector = ?self.collector);
                }
            }
        });
    }
}
