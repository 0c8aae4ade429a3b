use futures::stream::Stream;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::guard::Guarded;

/// Whether the stop signal has tripped. Only ever moves from `Open` to
/// `Stopped`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SluiceState {
    Open,
    Stopped,
}

impl SluiceState {
    /// True if the variant is Stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, SluiceState::Stopped)
    }
}

/// A `Future` that completes once shutdown has begun. Any number of clones
/// can watch it; observing it never consumes the notification.
///
/// Also completes if every [Sluice](crate::Sluice) owning the signal was
/// dropped, since nothing could trip it anymore.
#[derive(Debug)]
pub struct StopSignal {
    subscription: WatchStream<SluiceState>,
    subscription_rx: watch::Receiver<SluiceState>,
}

impl StopSignal {
    pub(crate) fn new(receiver: watch::Receiver<SluiceState>) -> Self {
        StopSignal {
            subscription: WatchStream::new(receiver.clone()),
            subscription_rx: receiver,
        }
    }

    /// The current [SluiceState]
    pub fn state(&self) -> SluiceState {
        *self.subscription_rx.borrow()
    }

    /// Non-blocking check, true once shutdown has begun
    pub fn is_stopped(&self) -> bool {
        self.state().is_stopped()
    }

    /// Wait until shutdown has begun without consuming `self`
    pub async fn stopped(&self) {
        let mut rx = self.subscription_rx.clone();
        // an Err means the sender is gone, which can't trip anymore either
        _ = rx.wait_for(SluiceState::is_stopped).await;
    }

    /// Run `work` until it completes or shutdown begins, whichever comes
    /// first. A unit decides for itself which of its steps may be cut short
    /// this way.
    pub fn guard<F: Future>(self, work: F) -> Guarded<F> {
        Guarded::new(self, work)
    }

    /// Wrap a stream so it ends as soon as shutdown begins
    pub fn until_stopped<S>(self, inner: S) -> UntilStopped<S> {
        UntilStopped {
            signal: self,
            inner,
        }
    }
}

impl Clone for StopSignal {
    fn clone(&self) -> Self {
        StopSignal::new(self.subscription_rx.clone())
    }
}

impl Future for StopSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        loop {
            match futures::ready!(Pin::new(&mut self.subscription).poll_next(cx)) {
                Some(SluiceState::Open) => {}
                Some(SluiceState::Stopped) => return Poll::Ready(()),
                None => return Poll::Ready(()),
            }
        }
    }
}

/// A [Stream] that ends when the [StopSignal] trips.
#[derive(Debug)]
pub struct UntilStopped<S> {
    signal: StopSignal,
    inner: S,
}

impl<S> Stream for UntilStopped<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.signal.is_stopped() {
            return Poll::Ready(None);
        }
        if let Poll::Ready(()) = Pin::new(&mut self.signal).poll(cx) {
            return Poll::Ready(None);
        }

        Pin::new(&mut self.inner).poll_next(cx)
    }
}
