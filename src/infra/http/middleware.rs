use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, header::HOST},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::public::SNAPSHOT_VERSION_HEADER;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Attach a request id, taken from `x-request-id` when the caller sent one,
/// and run the rest of the stack inside a span carrying it.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let snapshot_version = response
        .headers()
        .get(SNAPSHOT_VERSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !status.is_client_error() && !status.is_server_error() {
        debug!(
            target: "folio::http::response",
            status = status.as_u16(),
            host = %host,
            query = uri.query().unwrap_or(""),
            elapsed_ms,
            snapshot_version = %snapshot_version,
            "request served"
        );
        return response;
    }

    let (source, messages) = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target: "folio::http::response",
            status = status.as_u16(),
            method = %method,
            host = %host,
            query = uri.query().unwrap_or(""),
            elapsed_ms,
            snapshot_version = %snapshot_version,
            source,
            detail = %detail,
            chain = ?messages,
            "request failed"
        );
    } else {
        warn!(
            target: "folio::http::response",
            status = status.as_u16(),
            method = %method,
            host = %host,
            query = uri.query().unwrap_or(""),
            elapsed_ms,
            snapshot_version = %snapshot_version,
            source,
            detail = %detail,
            "client request error"
        );
    }

    response
}
