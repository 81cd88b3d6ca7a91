//! Request routing for the control plane.

use super::ClusterHandle;
use super::handlers;
use super::response;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;

/// Route an incoming request to the appropriate handler.
pub async fn route<B, H>(
    req: Request<B>,
    handle: Arc<H>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H: ClusterHandle + ?Sized,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    tracing::debug!(method = %method, path = %path, "routing request");

    let response = match (method, path.as_str()) {
        (Method::GET | Method::HEAD, "/") => handlers::status(handle).await,
        (_, "/") => response::method_not_allowed(&["GET", "HEAD"]),

        (Method::POST, "/join") => handlers::join(req, handle).await,
        (_, "/join") => response::method_not_allowed(&["POST"]),

        _ => response::not_found(),
    };

    Ok(response)
}
