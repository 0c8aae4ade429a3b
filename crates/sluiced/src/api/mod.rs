//! HTTP surface of the example server. Every request gets a [Handle]
//! attached by [SluiceLayer] and holds a unit open through [gate] for as
//! long as its handler runs.

use std::{future::Future, net::SocketAddr, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use hyper::server::conn::AddrIncoming;
use serde::Serialize;
use sluice::{Handle, Outcome, Sluice, SluiceError, SluiceLayer};
use tokio::{net::TcpListener, task::JoinHandle};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};

use crate::config::ApiConfig;

pub mod gate;

#[derive(Clone, Copy, Debug)]
struct SlowWork(Duration);

pub fn router(sluice: &Sluice, config: &ApiConfig) -> Router {
    Router::new()
        .route("/", get(api_root))
        .route("/slow", get(api_slow))
        .route("/status", get(api_status))
        .layer(axum::middleware::from_fn(gate::refuse_when_stopping))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(SluiceLayer::new(sluice)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(Extension(sluice.clone()))
                .layer(Extension(SlowWork(config.slow_work()))),
        )
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub fn serve<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> eyre::Result<(SocketAddr, JoinHandle<hyper::Result<()>>)>
where
    F: Future<Output = ()> + Send + 'static,
{
    let api_addr = listener.local_addr()?;
    info!("Starting API listener on tcp/{api_addr}");
    let mut incoming = AddrIncoming::from_listener(listener)?;
    incoming.set_nodelay(true);

    let handle = tokio::spawn(
        axum::Server::builder(incoming)
            .serve(router.into_make_service())
            .with_graceful_shutdown(shutdown),
    );

    Ok((api_addr, handle))
}

fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
    )
}

/// Wraps [SluiceError] so handlers can use `?`
#[derive(Debug)]
pub struct ApiError(SluiceError);

impl From<SluiceError> for ApiError {
    fn from(e: SluiceError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            SluiceError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            SluiceError::TimedOut { .. } | SluiceError::Unattached => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

async fn api_root() -> &'static str {
    "sup"
}

/// Pretends to run a long search. Once shutdown begins it stops early and
/// answers with what it has; how much of a unit is preemptible is up to
/// the unit itself.
async fn api_slow(
    Extension(SlowWork(work)): Extension<SlowWork>,
) -> Result<&'static str, ApiError> {
    // nested code reaches the coordinator through the request scope
    let handle = Handle::current()?;
    let _ticket = handle.open()?;

    let searched = handle.stop_signal().guard(tokio::time::sleep(work)).await;
    if searched == Outcome::Stopped {
        warn!("stop signal received, finishing up early");
    }

    Ok("all done.\n")
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub shutting_down: bool,
    pub live: usize,
}

async fn api_status(Extension(sluice): Extension<Sluice>) -> Json<Status> {
    Json(Status {
        shutting_down: sluice.is_shutting_down(),
        live: sluice.live_count(),
    })
}
