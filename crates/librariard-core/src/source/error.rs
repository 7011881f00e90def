use thiserror::Error;

/// Account-level failure fetching checkouts. Any of these aborts the
/// refresh pass it occurs in.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Login rejected: {0}")]
    Auth(String),

    #[error("Checkout service error: {0}")]
    Transport(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl SourceError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => SourceError::Auth(truncated),
            // The proxy reports a failed library login as a 500 carrying the
            // upstream HTTP error text
            500 if Self::mentions_login_rejection(body) => SourceError::Auth(truncated),
            _ => SourceError::Transport(format!("Status {}: {}", status, truncated)),
        }
    }

    fn mentions_login_rejection(body: &str) -> bool {
        body.contains("401 Client Error") || body.contains("403 Client Error")
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SourceError::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_maps_auth() {
        assert!(SourceError::from_status(StatusCode::UNAUTHORIZED, "").is_auth());
        assert!(SourceError::from_status(StatusCode::FORBIDDEN, "").is_auth());
    }

    #[test]
    fn test_from_status_proxy_login_failure() {
        let body = r#"{"error": "401 Client Error: Unauthorized for url: https://lib.example/user/login"}"#;
        assert!(SourceError::from_status(StatusCode::INTERNAL_SERVER_ERROR, body).is_auth());
    }

    #[test]
    fn test_from_status_other_is_transport() {
        let err = SourceError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, SourceError::Transport(ref msg) if msg.contains("upstream down")));

        let err = SourceError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(!err.is_auth());
    }

    #[test]
    fn test_long_body_truncated() {
        let body = "x".repeat(2000);
        let SourceError::Transport(msg) = SourceError::from_status(StatusCode::BAD_REQUEST, &body)
        else {
            panic!("expected transport error");
        };
        assert!(msg.contains("truncated, 2000 total bytes"));
        assert!(msg.len() < 600);
    }
}
