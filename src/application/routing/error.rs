use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("request was cancelled")]
    Cancelled,
    #[error("invalid request url `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },
}

impl RoutingError {
    pub fn invalid_url(input: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}
