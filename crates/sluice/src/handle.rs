use std::future::Future;

use tokio::task::futures::TaskLocalFuture;

use crate::{Sluice, SluiceError, StopSignal, Ticket};

tokio::task_local! {
    static CURRENT: Handle;
}

/// The part of a [Sluice] a unit of work is allowed to use: registration
/// and the stop signal. Shutdown itself stays with whoever owns the
/// [Sluice].
///
/// A handle is attached to a scope once, by whatever starts the unit of
/// work, and looked up from nested code:
///
/// - task scope: [Handle::scope] / [Handle::current]
/// - request scope: [Handle::attach] / [Handle::from_extensions]
#[derive(Debug, Clone)]
pub struct Handle {
    sluice: Sluice,
}

impl Handle {
    pub(crate) fn new(sluice: Sluice) -> Self {
        Self { sluice }
    }

    /// See [Sluice::register]
    pub fn register(&self) -> Result<(), SluiceError> {
        self.sluice.register()
    }

    /// See [Sluice::unregister]
    pub fn unregister(&self) {
        self.sluice.unregister()
    }

    /// See [Sluice::open]
    pub fn open(&self) -> Result<Ticket, SluiceError> {
        self.sluice.open()
    }

    /// See [Sluice::stop_signal]
    pub fn stop_signal(&self) -> StopSignal {
        self.sluice.stop_signal()
    }

    /// See [Sluice::is_shutting_down]
    pub fn is_shutting_down(&self) -> bool {
        self.sluice.is_shutting_down()
    }

    /// Run `fut` with this handle installed as the current one
    pub fn scope<F: Future>(self, fut: F) -> TaskLocalFuture<Handle, F> {
        CURRENT.scope(self, fut)
    }

    /// The handle of the enclosing [Handle::scope]
    pub fn current() -> Result<Handle, SluiceError> {
        CURRENT
            .try_with(Clone::clone)
            .map_err(|_| SluiceError::Unattached)
    }

    /// Like [Handle::current], for code that treats a missing handle as a
    /// bug.
    ///
    /// # Panics
    ///
    /// Outside of a [Handle::scope].
    #[track_caller]
    pub fn expect_current() -> Handle {
        match Self::current() {
            Ok(handle) => handle,
            Err(e) => panic!("{e}"),
        }
    }

    /// Attach this handle to a request's extensions
    pub fn attach(&self, extensions: &mut http::Extensions) {
        extensions.insert(self.clone());
    }

    /// The handle attached to a request's extensions
    pub fn from_extensions(extensions: &http::Extensions) -> Result<Handle, SluiceError> {
        extensions
            .get::<Handle>()
            .cloned()
            .ok_or(SluiceError::Unattached)
    }
}
