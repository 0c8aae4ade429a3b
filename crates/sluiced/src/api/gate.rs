use axum::{
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use sluice::Handle;
use tracing::debug;

/// Holds a unit open for the whole request, or answers
/// `503 Service Unavailable` once shutdown has begun.
pub async fn refuse_when_stopping<B>(
    Extension(handle): Extension<Handle>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    let _ticket = match handle.open() {
        Ok(ticket) => ticket,
        Err(e) => {
            debug!("refusing request: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "shutdown in progress").into_response();
        }
    };

    next.run(request).await
}
