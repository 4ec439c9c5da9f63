//! HTTP/1 server loop.

use super::{ApiResponse, ApiState, handle};
use crate::error::{OperatorError, OperatorResult};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve the REST front-end on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: Arc<ApiState>) -> OperatorResult<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(parent: &state.span, addr = %addr, "REST front-end listening");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(parent: &state.span, "Shutdown signal received");
                return Ok(());
            }
        };

        let state = state.clone();
        tokio::spawn(async move {
            let io = hyper_util::rt::TokioIo::new(stream);
            let service = hyper::service::service_fn(|req| {
                let state = state.clone();
                async move { handle_request(&state, req).await }
            });

            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                tracing::error!(parent: &state.span, peer = %peer, error = %e, "Connection error");
            }
        });
    }
}

async fn handle_request(
    state: &ApiState,
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::error!(parent: &state.span, error = %e, "Failed to read request body");
            let err = OperatorError::InvalidRequest(format!("Failed to read request body: {e}"));
            return Ok(build_response(ApiResponse::from(err)));
        }
    };

    let response = handle(state, &method, &path, &body).await;
    tracing::debug!(
        parent: &state.span,
        method = %method,
        path = %path,
        status = response.status.as_u16(),
        "Handled request"
    );
    Ok(build_response(response))
}

fn build_response(response: ApiResponse) -> Response<Full<Bytes>> {
    let json = response.body.to_string();
    Response::builder()
        .status(response.status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build response");
            let mut fallback = Response::new(Full::new(Bytes::from_static(
                br#"{"error":"Failed to build response"}"#,
            )));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}
