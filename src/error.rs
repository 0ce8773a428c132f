use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Result with GmailError
pub type Result<T> = std::result::Result<T, GmailError>;

/// Error types for the mailbox cleanup pipeline
#[derive(Error, Debug)]
pub enum GmailError {
    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// No OAuth client secret file to start an interactive login from
    #[error("Missing client configuration: {} not found", .0.display())]
    MissingClientConfig(PathBuf),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Bad request (400), e.g. a malformed search query
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403), usually quota or scope problems
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Invalid message format or parsing error
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// IO error (file operations, console, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic catch-all error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl GmailError {
    /// No usable credential could be obtained; the run ends before any
    /// mailbox request is made.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            GmailError::AuthError(_) | GmailError::MissingClientConfig(_)
        )
    }
}

/// Read the Retry-After header as delay-seconds, defaulting to 5.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // HTTP response with status code (non-success responses)
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => GmailError::RateLimitExceeded {
                        retry_after: parse_retry_after_header(response),
                    },
                    404 => GmailError::MessageNotFound("Resource not found".to_string()),
                    400 => GmailError::BadRequest(message),
                    403 => GmailError::Forbidden(message),
                    500..=599 => GmailError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => GmailError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => GmailError::BadRequest(format!("{}", err)),
            google_gmail1::Error::HttpError(ref err) => {
                GmailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => GmailError::NetworkError(err.to_string()),
            google_gmail1::Error::MissingToken(ref err) => {
                GmailError::AuthError(format!("No access token available: {}", err))
            }
            _ => GmailError::ApiError(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures() {
        assert!(GmailError::AuthError("bad token".to_string()).is_auth_failure());
        assert!(GmailError::MissingClientConfig(PathBuf::from("credentials.json")).is_auth_failure());

        assert!(!GmailError::ConfigError("bad".to_string()).is_auth_failure());
        assert!(!GmailError::BadRequest("Invalid query".to_string()).is_auth_failure());
        assert!(!GmailError::RateLimitExceeded { retry_after: 5 }.is_auth_failure());
    }

    #[test]
    fn test_error_display() {
        let error = GmailError::RateLimitExceeded { retry_after: 10 };
        let display = format!("{}", error);
        assert!(display.contains("Rate limit exceeded"));
        assert!(display.contains("10 seconds"));

        let missing = GmailError::MissingClientConfig(PathBuf::from("credentials.json"));
        assert_eq!(
            missing.to_string(),
            "Missing client configuration: credentials.json not found"
        );
    }

    #[test]
    fn test_parse_retry_after_header_integer() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("120"),
        );

        assert_eq!(parse_retry_after_header(&response), 120);
    }

    #[test]
    fn test_parse_retry_after_header_missing() {
        let response = hyper::Response::builder().status(429).body(()).unwrap();
        assert_eq!(parse_retry_after_header(&response), 5);
    }

    #[test]
    fn test_parse_retry_after_header_invalid() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        assert_eq!(parse_retry_after_header(&response), 5);
    }
}
