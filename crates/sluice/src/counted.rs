use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use pin_project_lite::pin_project;
use tracing::trace;

use crate::Ticket;

pin_project! {
    /// A future that keeps a unit of work registered until it completes or
    /// is dropped, whichever comes first.
    pub struct CountedFut<F> {
        #[pin]
        fut: F,
        ticket: Option<Ticket>,
    }
}

impl<F> CountedFut<F> {
    /// Tie `ticket` to the lifetime of `fut`
    pub fn new(fut: F, ticket: Ticket) -> Self {
        Self {
            fut,
            ticket: Some(ticket),
        }
    }
}

impl<F> Future for CountedFut<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        trace!("polling counted future");
        let this = self.project();
        let out = futures::ready!(this.fut.poll(cx));
        // release before handing the output over, so whoever awaits it sees
        // the unit gone already
        if let Some(ticket) = this.ticket.take() {
            ticket.close();
        }
        Poll::Ready(out)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{CountedFut, Sluice};
    use assert2::assert;

    #[tokio::test]
    async fn released_when_dropped_midway() {
        let sluice = Sluice::new();
        let fut = CountedFut::new(
            tokio::time::sleep(Duration::from_secs(60)),
            sluice.open().unwrap(),
        );
        assert!(sluice.live_count() == 1);

        let res = tokio::time::timeout(Duration::from_millis(10), fut).await;
        assert!(res.is_err());
        assert!(sluice.live_count() == 0);
    }
}
