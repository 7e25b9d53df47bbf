use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
        header::{CONTENT_TYPE, HOST, LOCATION},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    application::{
        error::HttpError,
        render::RenderPipeline,
        routing::{ResolutionOutcome, RoutingService, UrlMode, request_url},
    },
    cache::{ChangeSet, FacadeTrigger},
    domain::content::ContentId,
};

use super::middleware::{log_responses, set_request_context};

pub const SNAPSHOT_VERSION_HEADER: &str = "x-folio-snapshot-version";

const DEFAULT_HOST: &str = "localhost";
const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

#[derive(Clone)]
pub struct HttpState {
    pub routing: Arc<RoutingService>,
    pub pipeline: Arc<RenderPipeline>,
    pub trigger: FacadeTrigger,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .route("/_url/{id}", get(content_url))
        .route("/_facade/notify", post(notify))
        .fallback(serve_content)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|authority| authority.to_string()))
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

fn request_scheme(headers: &HeaderMap) -> &str {
    headers
        .get(FORWARDED_PROTO_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|proto| matches!(*proto, "http" | "https"))
        .unwrap_or("http")
}

fn with_version(mut response: Response, version: u64) -> Response {
    if let Ok(value) = HeaderValue::from_str(&version.to_string()) {
        response.headers_mut().insert(SNAPSHOT_VERSION_HEADER, value);
    }
    response
}

async fn serve_content(
    State(state): State<HttpState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, HttpError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(HttpError::new(
            "infra::http::public::serve_content",
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            format!("{method} is not served for content routes"),
        ));
    }

    // Cancelled if the client goes away and this future is dropped.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let host = request_host(&headers, &uri);
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = request_url(request_scheme(&headers), &host, path_and_query)?;

    let context = state.routing.begin_request(url, cancel);
    let result = context.resolve()?;
    let version = result.snapshot_version;

    let status = match &result.outcome {
        ResolutionOutcome::Redirect(redirect) => {
            let status = if redirect.permanent {
                StatusCode::MOVED_PERMANENTLY
            } else {
                StatusCode::FOUND
            };
            let location = HeaderValue::from_str(&redirect.location).map_err(|err| {
                HttpError::from_error(
                    "infra::http::public::serve_content",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Invalid redirect location",
                    &err,
                )
            })?;
            let response = (status, [(LOCATION, location)]).into_response();
            return Ok(with_version(response, version));
        }
        ResolutionOutcome::NotFound => {
            return Err(HttpError::new(
                "infra::http::public::serve_content",
                StatusCode::NOT_FOUND,
                "Page not found",
                format!("no published content at {}", context.request().path()),
            ));
        }
        ResolutionOutcome::NotFoundPage => StatusCode::NOT_FOUND,
        ResolutionOutcome::Found => StatusCode::OK,
    };

    // Rendering runs on the blocking pool so this future can be dropped
    // mid-render; the drop guard then cancels the render's token.
    let output = {
        let pipeline = Arc::clone(&state.pipeline);
        let result = result.clone();
        let snapshot = Arc::clone(context.snapshot());
        let cancel = context.cancellation().clone();
        tokio::task::spawn_blocking(move || pipeline.render(&result, &snapshot, &cancel))
            .await
            .map_err(|err| {
                HttpError::from_error(
                    "infra::http::public::serve_content",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    &err,
                )
            })??
    };

    debug!(
        path = %context.request().path(),
        status = status.as_u16(),
        finder = result.finder,
        snapshot_version = version,
        "Rendered content"
    );

    let content_type = HeaderValue::from_str(&output.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("text/plain; charset=utf-8"));
    let response = (status, [(CONTENT_TYPE, content_type)], output.body).into_response();
    Ok(with_version(response, version))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UrlQuery {
    mode: Option<UrlMode>,
    host: Option<String>,
}

#[derive(Debug, Serialize)]
struct UrlResponse {
    id: ContentId,
    url: Option<String>,
    snapshot_version: u64,
}

async fn content_url(
    State(state): State<HttpState>,
    Path(id): Path<i32>,
    Query(query): Query<UrlQuery>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<UrlResponse>, HttpError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let host = query
        .host
        .unwrap_or_else(|| request_host(&headers, &uri));
    let current = request_url(request_scheme(&headers), &host, "/")?;

    let context = state.routing.begin_request(current, cancel);
    let id = ContentId(id);
    if context.snapshot().get(id).is_none() {
        return Err(HttpError::new(
            "infra::http::public::content_url",
            StatusCode::NOT_FOUND,
            "Content not found",
            format!("content {id} is not published"),
        ));
    }

    let url = context.url(id, query.mode)?;
    Ok(Json(UrlResponse {
        id,
        url,
        snapshot_version: context.snapshot().version(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NotifyQuery {
    wait: bool,
}

#[derive(Debug, Serialize)]
struct NotifyResponse {
    accepted: bool,
    pending_changes: usize,
    snapshot_version: u64,
}

async fn notify(
    State(state): State<HttpState>,
    Query(query): Query<NotifyQuery>,
    Json(change_set): Json<ChangeSet>,
) -> (StatusCode, Json<NotifyResponse>) {
    let accepted = state.trigger.trigger(change_set, query.wait).await;
    let facade = state.routing.facade();
    (
        StatusCode::ACCEPTED,
        Json(NotifyResponse {
            accepted,
            pending_changes: facade.pending_changes(),
            snapshot_version: facade.store().current_version(),
        }),
    )
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    snapshot_version: u64,
    pending_changes: usize,
}

async fn health(State(state): State<HttpState>) -> Json<HealthResponse> {
    let facade = state.routing.facade();
    let snapshot_version = facade.store().current_version();
    Json(HealthResponse {
        status: if snapshot_version > 0 { "ok" } else { "building" },
        snapshot_version,
        pending_changes: facade.pending_changes(),
    })
}
