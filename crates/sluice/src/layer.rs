use std::task::{Context, Poll};

use tokio::task::futures::TaskLocalFuture;
use tower::{Layer, Service};

use crate::{Handle, Sluice};

/// [Layer] attaching a [Handle] to every request passing through it, both
/// in the request extensions and as the task-local [Handle::current] while
/// the inner service's future is polled.
///
/// It never refuses requests; deciding what to do once shutdown began is
/// left to the services it wraps.
#[derive(Debug, Clone)]
pub struct SluiceLayer {
    handle: Handle,
}

impl SluiceLayer {
    /// Attach handles to `sluice`
    pub fn new(sluice: &Sluice) -> Self {
        Self {
            handle: sluice.handle(),
        }
    }
}

impl<S> Layer<S> for SluiceLayer {
    type Service = SluiceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SluiceService {
            inner,
            handle: self.handle.clone(),
        }
    }
}

/// Service produced by [SluiceLayer]
#[derive(Debug, Clone)]
pub struct SluiceService<S> {
    inner: S,
    handle: Handle,
}

impl<S, B> Service<http::Request<B>> for SluiceService<S>
where
    S: Service<http::Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TaskLocalFuture<Handle, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        self.handle.attach(req.extensions_mut());
        self.handle.clone().scope(self.inner.call(req))
    }
}
