use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use pin_project_lite::pin_project;

use crate::StopSignal;

/// How a [Guarded] piece of work ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Shutdown began first and the work was dropped where it stood
    Stopped,
    /// The work ran to completion
    Completed(T),
}

pin_project! {
    /// Work that gives up as soon as its [StopSignal] trips. Built with
    /// [StopSignal::guard].
    ///
    /// The signal is checked before the work on every poll, so a unit never
    /// starts another step once shutdown is visible.
    #[must_use = "futures do nothing unless polled"]
    pub struct Guarded<F> {
        signal: StopSignal,
        #[pin]
        work: F,
    }
}

impl<F> Guarded<F> {
    pub(crate) fn new(signal: StopSignal, work: F) -> Self {
        Self { signal, work }
    }
}

impl<F> Future for Guarded<F>
where
    F: Future,
{
    type Output = Outcome<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if this.signal.is_stopped() || Pin::new(this.signal).poll(cx).is_ready() {
            return Poll::Ready(Outcome::Stopped);
        }

        this.work.poll(cx).map(Outcome::Completed)
    }
}
