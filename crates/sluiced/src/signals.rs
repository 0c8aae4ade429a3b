#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// Resolves on the first SIGTERM or SIGINT
#[cfg(unix)]
pub async fn shutdown_requested() -> std::io::Result<()> {
    let mut sigterms = signal(SignalKind::terminate())?;
    let mut sigints = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterms.recv() => debug!("received SIGTERM"),
        _ = sigints.recv() => debug!("received SIGINT"),
    }

    println!(); // cleaner logs! (new line after ^C)
    Ok(())
}

/// Resolves on the first Ctrl-C
#[cfg(not(unix))]
pub async fn shutdown_requested() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    debug!("received Ctrl-C");
    Ok(())
}
