use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{render::RenderPipelineError, routing::RoutingError},
    cache::FacadeError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<RoutingError> for HttpError {
    fn from(error: RoutingError) -> Self {
        match &error {
            RoutingError::Cancelled => HttpError::from_error(
                "infra::http::routing_error_to_http_error",
                StatusCode::SERVICE_UNAVAILABLE,
                "Request cancelled",
                &error,
            ),
            RoutingError::InvalidUrl { .. } => HttpError::from_error(
                "infra::http::routing_error_to_http_error",
                StatusCode::BAD_REQUEST,
                "Invalid request URL",
                &error,
            ),
        }
    }
}

impl From<RenderPipelineError> for HttpError {
    fn from(error: RenderPipelineError) -> Self {
        match &error {
            RenderPipelineError::Cancelled => HttpError::from_error(
                "infra::http::render_error_to_http_error",
                StatusCode::SERVICE_UNAVAILABLE,
                "Request cancelled",
                &error,
            ),
            RenderPipelineError::NoContent => HttpError::from_error(
                "infra::http::render_error_to_http_error",
                StatusCode::NOT_FOUND,
                "Page not found",
                &error,
            ),
            RenderPipelineError::Binding(_) | RenderPipelineError::Render(_) => {
                HttpError::from_error(
                    "infra::http::render_error_to_http_error",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    &error,
                )
            }
        }
    }
}

/// Failure of a CLI command, reported once by `main` before exiting.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Facade(#[from] FacadeError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::binding::ModelBindingError;

    #[test]
    fn binding_failures_are_server_errors_with_chain() {
        let error = HttpError::from(RenderPipelineError::Binding(ModelBindingError {
            source_type: "page".to_string(),
            declared: "article".to_string(),
        }));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = error.into_response();
        let report = response.extensions().get::<ErrorReport>().expect("report");
        assert_eq!(
            report.messages.first().map(String::as_str),
            Some("Cannot bind source type page to model type article")
        );
    }

    #[test]
    fn invalid_urls_are_client_errors() {
        let error = HttpError::from(RoutingError::invalid_url("http://", "empty host"));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn app_error_keeps_the_underlying_message() {
        let error = AppError::from(RoutingError::invalid_url("x", "bad"));
        assert_eq!(error.to_string(), "invalid request url `x`: bad");
        assert_eq!(
            AppError::validation("content 7 has no URL").to_string(),
            "validation failed: content 7 has no URL"
        );
    }
}
