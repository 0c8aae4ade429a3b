use std::{net::SocketAddr, time::Duration};

use assert2::{assert, let_assert};
use hyper::{body::to_bytes, Client, StatusCode};
use sluice::{Sluice, SluiceError};
use sluiced::{api, config::Config};
use tokio::{net::TcpListener, sync::oneshot};

async fn get(addr: SocketAddr, path: &str) -> hyper::Result<(StatusCode, String)> {
    let res = Client::new()
        .get(format!("http://{addr}{path}").parse().unwrap())
        .await?;
    let status = res.status();
    let body = to_bytes(res.into_body()).await?;
    Ok((status, String::from_utf8_lossy(&body).into_owned()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn in_flight_request_finishes_while_new_ones_are_refused() {
    _ = tracing_subscriber::fmt::try_init();

    let config = Config::builder()
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .slow_work(Duration::from_secs(60))
        .build();

    let sluice = Sluice::new();
    let (drained_tx, drained_rx) = oneshot::channel::<()>();
    let listener = TcpListener::bind(config.api.bind_addr).await.unwrap();
    let (addr, server) = api::serve(listener, api::router(&sluice, &config.api), async move {
        _ = drained_rx.await;
    })
    .unwrap();

    let_assert!(Ok((status, body)) = get(addr, "/").await);
    assert!(status == StatusCode::OK);
    assert!(body == "sup");

    let slow = tokio::spawn(get(addr, "/slow"));
    while sluice.live_count() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let shutdown = tokio::spawn({
        let sluice = sluice.clone();
        async move { sluice.shutdown(Some(Duration::from_secs(10))).await }
    });
    while !sluice.is_shutting_down() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let_assert!(Ok((status, body)) = get(addr, "/").await);
    assert!(status == StatusCode::SERVICE_UNAVAILABLE);
    assert!(body == "shutdown in progress");

    let_assert!(Ok(Ok((status, body))) = slow.await);
    assert!(status == StatusCode::OK);
    assert!(body == "all done.\n");

    let_assert!(Ok(Ok(())) = shutdown.await);
    assert!(sluice.live_count() == 0);

    drained_tx.send(()).unwrap();
    let_assert!(Ok(Ok(())) = server.await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stuck_unit_times_out_and_keeps_running() {
    _ = tracing_subscriber::fmt::try_init();

    let sluice = Sluice::new();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    // ignores the stop signal entirely
    let stuck = sluice
        .spawn(async move {
            _ = release_rx.await;
            "finished"
        })
        .unwrap();

    let res = sluice.shutdown(Some(Duration::from_millis(200))).await;
    let_assert!(Err(SluiceError::TimedOut { live: 1, .. }) = res);
    assert!(!stuck.is_finished());

    release_tx.send(()).unwrap();
    let_assert!(Ok("finished") = stuck.await);

    let_assert!(Ok(()) = sluice.shutdown(None).await);
}
