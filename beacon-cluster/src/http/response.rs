//! Plain-text response builders for the control plane.

use bytes::Bytes;
use http_body_util::Full;
use hyper::http::header::{self, HeaderValue};
use hyper::{Response, StatusCode};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Build a plain-text response with status code.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    response
}

/// Build a response with no body.
pub fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Build a 200 OK plain-text response.
pub fn ok_text(body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    text_response(StatusCode::OK, body)
}

/// Build a 200 OK response with an empty body.
pub fn ok_empty() -> Response<Full<Bytes>> {
    empty(StatusCode::OK)
}

/// Build a 400 Bad Request response.
pub fn bad_request() -> Response<Full<Bytes>> {
    empty(StatusCode::BAD_REQUEST)
}

/// Build a 500 Internal Server Error response.
///
/// The body is always empty; the cause is only logged.
pub fn internal_error() -> Response<Full<Bytes>> {
    empty(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Build a 404 Not Found response.
pub fn not_found() -> Response<Full<Bytes>> {
    text_response(StatusCode::NOT_FOUND, "404 page not found\n")
}

/// Build a 405 Method Not Allowed response.
pub fn method_not_allowed(allowed: &[&str]) -> Response<Full<Bytes>> {
    let allow = allowed.join(", ");
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_responses_are_utf8_plain_text() {
        let response = ok_text("hello\n");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn method_not_allowed_lists_methods() {
        let response = method_not_allowed(&["GET", "HEAD"]);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET, HEAD");
    }

    #[test]
    fn error_responses_have_no_body_headers() {
        let response = internal_error();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }
}
