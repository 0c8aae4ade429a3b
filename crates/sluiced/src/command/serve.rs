use std::time::Duration;

use sluice::{Sluice, SluiceError};
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{error, info};

use crate::{api, config::Config, signals, ticker, VERSION};

/// Serve until SIGINT/SIGTERM, then drain in-flight work before the
/// listener goes away. Errors if the drain timed out, leaving the caller
/// to force the exit.
pub async fn run(config: Config) -> eyre::Result<()> {
    info!("Starting sluiced v{VERSION}");

    let sluice = Sluice::new();

    if config.ticker.enabled {
        ticker::spawn(&sluice, &config.ticker);
    }

    let (drained_tx, drained_rx) = oneshot::channel::<()>();
    let listener = TcpListener::bind(config.api.bind_addr).await?;
    let (_, server) = api::serve(
        listener,
        api::router(&sluice, &config.api),
        async move {
            _ = drained_rx.await;
        },
    )?;

    signals::shutdown_requested().await?;
    info!("shutting down..");

    // keep accepting (and refusing) requests while draining
    drain(&sluice, config.shutdown.timeout(), drained_tx).await?;

    if let Err(e) = server.await? {
        error!("api server error: {e}");
    }

    info!("sluiced is done");
    Ok(())
}

/// Drain in-flight work, then tell the listener to stop. The listener is
/// stopped whether or not the drain made it in time.
pub async fn drain(
    sluice: &Sluice,
    timeout: Option<Duration>,
    stop_listener: oneshot::Sender<()>,
) -> Result<(), SluiceError> {
    let res = sluice.shutdown(timeout).await;
    if let Err(e) = &res {
        error!("could not drain in-flight work: {e}");
    }
    _ = stop_listener.send(());
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{assert, let_assert};

    #[tokio::test]
    async fn listener_stops_after_a_drain() {
        let sluice = Sluice::new();
        let (tx, rx) = oneshot::channel();

        let_assert!(Ok(()) = drain(&sluice, Some(Duration::from_secs(1)), tx).await);
        let_assert!(Ok(()) = rx.await);
    }

    #[tokio::test]
    async fn listener_stops_after_a_timed_out_drain() {
        let sluice = Sluice::new();
        let _stuck = sluice.open().unwrap();
        let (tx, rx) = oneshot::channel();

        let res = drain(&sluice, Some(Duration::from_millis(50)), tx).await;
        let_assert!(Err(e) = res);
        assert!(e.is_timed_out());
        let_assert!(Ok(()) = rx.await);
        assert!(sluice.live_count() == 1);
    }
}
