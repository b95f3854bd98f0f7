use eventsource_stream::EventStreamError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SseParseError {
    #[error("UTF-8 error: {details}")]
    Utf8 { details: String },
    #[error("Parse error: {details}")]
    Parser { details: String },
    #[error("Transport error: {details}")]
    Transport { details: String },
}

impl<E> From<EventStreamError<E>> for SseParseError
where
    E: std::error::Error,
{
    fn from(err: EventStreamError<E>) -> Self {
        match err {
            EventStreamError::Utf8(err) => Self::Utf8 {
                details: err.to_string(),
            },
            EventStreamError::Parser(err) => Self::Parser {
                details: err.to_string(),
            },
            EventStreamError::Transport(err) => Self::Transport {
                details: err.to_string(),
            },
        }
    }
}

/// Terminal error carried by a `stream-error` delta. Nothing follows it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Request cancelled")]
    Cancelled,

    #[error("SSE parse error: {0}")]
    SseParse(SseParseError),

    #[error("Transport error: {details}")]
    Transport { details: String },

    #[error("Configuration error: {details}")]
    Configuration { details: String },

    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },
}

impl StreamError {
    /// User-initiated aborts are not failures and never produce error text
    /// on an analysis record.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ApiError> for StreamError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Cancelled { .. } => Self::Cancelled,
            ApiError::Configuration(details) => Self::Configuration { details },
            ApiError::ServerError {
                provider,
                status_code,
                details,
            } => Self::Provider {
                provider,
                message: format!("status {status_code}: {details}"),
            },
            ApiError::ResponseParsingError { provider, details }
            | ApiError::StreamError { provider, details } => Self::Provider {
                provider,
                message: details,
            },
            ApiError::Network(err) => Self::Transport {
                details: err.to_string(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{provider} server error (Status: {status_code}): {details}")]
    ServerError {
        provider: String,
        status_code: u16,
        details: String,
    },

    #[error("Request cancelled for {provider}")]
    Cancelled { provider: String },

    #[error("Failed to parse response from {provider}: {details}")]
    ResponseParsingError { provider: String, details: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Stream error from {provider}: {details}")]
    StreamError { provider: String, details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cancelled_is_a_cancellation() {
        assert!(StreamError::Cancelled.is_cancellation());
        assert!(
            !StreamError::Transport {
                details: "connection reset".into()
            }
            .is_cancellation()
        );
    }

    #[test]
    fn api_errors_map_to_terminal_stream_errors() {
        let err: StreamError = ApiError::ServerError {
            provider: "openai".into(),
            status_code: 429,
            details: "slow down".into(),
        }
        .into();
        assert_eq!(err.to_string(), "openai error: status 429: slow down");

        let err: StreamError = ApiError::Cancelled {
            provider: "openai".into(),
        }
        .into();
        assert!(err.is_cancellation());

        let err: StreamError = ApiError::Configuration("no key".into()).into();
        assert_eq!(
            err,
            StreamError::Configuration {
                details: "no key".into()
            }
        );
    }
}
