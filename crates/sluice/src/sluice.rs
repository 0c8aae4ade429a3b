use std::{future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::{
    counted::CountedFut,
    handle::Handle,
    signal::{SluiceState, StopSignal},
    SluiceError,
};

/// How often a pending drain reports the units it is still waiting on
const DRAIN_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Coordinates graceful shutdown of in-flight units of work.
///
/// Cloning is cheap and every clone refers to the same coordinator. Build one
/// at startup and hand it to whatever starts units of work and to whatever
/// triggers shutdown.
#[derive(Debug, Clone)]
pub struct Sluice {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    // registration and the trip both go through this lock, so no unit can
    // slip in once the signal is visible as tripped
    state: Mutex<State>,
    stop_tx: watch::Sender<SluiceState>,
    live_tx: watch::Sender<usize>,
}

#[derive(Debug, Default)]
struct State {
    stopped: bool,
    live: usize,
}

impl Default for Sluice {
    fn default() -> Self {
        Self::new()
    }
}

impl Sluice {
    /// Create an open coordinator with no live units
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(SluiceState::Open);
        let (live_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                stop_tx,
                live_tx,
            }),
        }
    }

    /// A narrow [Handle] to this coordinator, meant to be attached to a
    /// unit of work's scope.
    pub fn handle(&self) -> Handle {
        Handle::new(self.clone())
    }

    /// Register one unit of work. Fails with [SluiceError::ShuttingDown]
    /// once the stop signal has tripped, leaving the live count untouched.
    ///
    /// Every successful call must be paired with exactly one
    /// [Sluice::unregister]. Prefer [Sluice::open], which pairs them for you.
    pub fn register(&self) -> Result<(), SluiceError> {
        self.add(1)
    }

    /// Register `delta` units at once. Either all of them are registered or,
    /// after the trip, none are.
    pub fn add(&self, delta: usize) -> Result<(), SluiceError> {
        let mut state = self.inner.state.lock();
        if state.stopped {
            trace!("refusing {delta} unit(s), shutdown in progress");
            return Err(SluiceError::ShuttingDown);
        }
        state.live += delta;
        self.inner.live_tx.send_replace(state.live);
        trace!("registered {delta} unit(s), live: {}", state.live);
        Ok(())
    }

    /// Unregister one unit of work.
    ///
    /// # Panics
    ///
    /// When no unit is registered. An unmatched unregister is a bug in the
    /// caller and would otherwise corrupt the drain.
    pub fn unregister(&self) {
        let mut state = self.inner.state.lock();
        let Some(live) = state.live.checked_sub(1) else {
            drop(state);
            panic!("sluice: unregister called without a matching register");
        };
        state.live = live;
        self.inner.live_tx.send_replace(state.live);
        trace!("unregistered a unit, live: {}", state.live);
    }

    /// Register one unit for as long as the returned [Ticket] lives
    pub fn open(&self) -> Result<Ticket, SluiceError> {
        self.register()?;
        Ok(Ticket {
            sluice: Some(self.clone()),
        })
    }

    /// Observe the stop signal
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal::new(self.inner.stop_tx.subscribe())
    }

    /// Non-blocking check, true once the stop signal has tripped
    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().stopped
    }

    /// Number of currently registered units
    pub fn live_count(&self) -> usize {
        self.inner.state.lock().live
    }

    /// Spawn `fut` on the tokio runtime as a registered unit of work. The
    /// unit is released when the future completes or is dropped, and the
    /// future runs with this coordinator's [Handle] in scope.
    #[track_caller]
    pub fn spawn<F>(&self, fut: F) -> Result<JoinHandle<F::Output>, SluiceError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let ticket = self.open()?;
        Ok(tokio::spawn(CountedFut::new(
            self.handle().scope(fut),
            ticket,
        )))
    }

    /// Trip the stop signal and wait for every live unit to unregister.
    ///
    /// With `None` or a zero timeout the wait is unbounded. Otherwise the
    /// drain is raced against `timeout` and [SluiceError::TimedOut] is
    /// returned if it expires first; live units are not cancelled and keep
    /// running.
    ///
    /// Concurrent calls are fine: the signal trips exactly once, and every
    /// caller waits on the same drain under its own timeout.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), SluiceError> {
        if self.trip() {
            info!("shutdown started, draining {} unit(s)", self.live_count());
        } else {
            debug!("shutdown already started, waiting on the drain");
        }

        match timeout.filter(|t| !t.is_zero()) {
            None => self.drained().await,
            Some(timeout) => {
                if tokio::time::timeout(timeout, self.drained()).await.is_err() {
                    let live = self.live_count();
                    warn!("shutdown timed out after {timeout:?}, {live} unit(s) still live");
                    return Err(SluiceError::TimedOut { timeout, live });
                }
            }
        }

        info!("all units drained");
        Ok(())
    }

    /// Flip the stop signal. Returns false if it had already tripped.
    fn trip(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.stopped {
            return false;
        }
        state.stopped = true;
        self.inner.stop_tx.send_replace(SluiceState::Stopped);
        debug!("stop signal tripped");
        true
    }

    /// Resolves once the live count reaches zero
    async fn drained(&self) {
        let mut live_rx = self.inner.live_tx.subscribe();

        loop {
            // an Err from wait_for means the sender is gone, and it lives in `self`
            let zero = live_rx.wait_for(|live| *live == 0);
            if tokio::time::timeout(DRAIN_REPORT_INTERVAL, zero).await.is_ok() {
                return;
            }
            info!("waiting on {} unit(s) to finish", self.live_count());
        }
    }
}

/// Keeps one unit registered with a [Sluice] until it is dropped or closed.
#[derive(Debug)]
#[must_use = "the unit is unregistered as soon as the ticket is dropped"]
pub struct Ticket {
    sluice: Option<Sluice>,
}

impl Ticket {
    /// Unregister the unit now
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(sluice) = self.sluice.take() {
            sluice.unregister();
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.release();
    }
}
