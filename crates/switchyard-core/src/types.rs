//! HTTP request and response types shared by handlers and middleware.

use bytes::Bytes;
use http::{header, StatusCode};
use http_body_util::Full;

/// The HTTP request type seen by middleware and handler collections.
///
/// Bodies are fully buffered before dispatch.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by middleware and handler collections.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building error responses.
pub trait ResponseExt {
    /// Creates a plain-text error response.
    fn error(status: StatusCode, message: &str) -> Response;

    /// Creates a JSON error response with the body `{"error": ..., "message": ...}`.
    fn json_error(status: StatusCode, error: &str, message: &str) -> Response;
}

impl ResponseExt for Response {
    fn error(status: StatusCode, message: &str) -> Response {
        http::Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(message.to_string())))
            .unwrap_or_else(|_| fallback(status))
    }

    fn json_error(status: StatusCode, error: &str, message: &str) -> Response {
        let body = serde_json::json!({
            "error": error,
            "message": message,
        });

        http::Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap_or_else(|_| fallback(status))
    }
}

fn fallback(status: StatusCode) -> Response {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_error_response() {
        let response = Response::error(StatusCode::BAD_REQUEST, "Invalid input");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_json_error_body_shape() {
        let response = Response::json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Too Many Requests",
            "slow down",
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Too Many Requests");
        assert_eq!(body["message"], "slow down");
    }
}
