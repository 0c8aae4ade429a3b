//! A background loop doing periodic work as units of the coordinator.

use std::time::Duration;

use sluice::{Handle, Sluice, SluiceError};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::{debug, error, info};

use crate::config::TickerConfig;

/// Spawn the ticker with `sluice`'s [Handle] in scope
pub fn spawn(sluice: &Sluice, config: &TickerConfig) -> JoinHandle<()> {
    let interval = config.interval();
    let work = config.work();
    tokio::spawn(sluice.handle().scope(async move {
        if let Err(e) = tick_loop(interval, work).await {
            error!("ticker stopped: {e}");
        }
    }))
}

/// Every `interval`, do `work` worth of non-preemptible work as one unit.
/// Returns once shutdown began, never in the middle of a tick.
pub async fn tick_loop(interval: Duration, work: Duration) -> Result<(), SluiceError> {
    let handle = Handle::current()?;

    let period = interval.max(Duration::from_millis(1));
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = handle
        .stop_signal()
        .until_stopped(IntervalStream::new(timer));

    while ticks.next().await.is_some() {
        let ticket = match handle.open() {
            Ok(ticket) => ticket,
            Err(SluiceError::ShuttingDown) => break,
            Err(e) => return Err(e),
        };

        debug!("tick..");
        tokio::time::sleep(work).await;
        ticket.close();
    }

    info!("ticker done, stop signal seen");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use assert2::{assert, let_assert};

    #[tokio::test]
    async fn requires_a_scope() {
        let res = tick_loop(Duration::from_millis(1), Duration::from_millis(1)).await;
        let_assert!(Err(SluiceError::Unattached) = res);
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_current_tick() {
        let sluice = Sluice::new();
        let config = TickerConfig {
            enabled: true,
            interval_ms: 10,
            work_ms: 200,
        };
        let ticker = spawn(&sluice, &config);

        while sluice.live_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let start = tokio::time::Instant::now();
        let_assert!(Ok(()) = sluice.shutdown(Some(Duration::from_secs(5))).await);
        assert!(sluice.live_count() == 0);
        // the tick in progress is not preempted
        assert!(start.elapsed() > Duration::from_millis(50));

        let_assert!(Ok(()) = tokio::time::timeout(Duration::from_secs(1), ticker).await.unwrap());
    }

    #[tokio::test]
    async fn no_tick_starts_after_the_trip() {
        let sluice = Sluice::new();
        let_assert!(Ok(()) = sluice.shutdown(None).await);

        let config = TickerConfig {
            enabled: true,
            interval_ms: 1,
            work_ms: 60_000,
        };
        let ticker = spawn(&sluice, &config);

        let_assert!(Ok(Ok(())) = tokio::time::timeout(Duration::from_secs(1), ticker).await);
        assert!(sluice.live_count() == 0);
    }
}
