//! Control-plane endpoint handlers.

use super::ClusterHandle;
use super::response;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::{Request, Response};
use serde::Deserialize;
use std::sync::Arc;

/// Largest join body accepted.
const MAX_JOIN_BODY: usize = 64 * 1024;

/// Body of `POST /join`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JoinRequest {
    id: String,
    addr: String,
}

impl JoinRequest {
    /// Parse a join body, returning `None` unless it holds exactly a
    /// non-empty string `id` and a non-empty string `addr`.
    fn parse(body: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        if !value.is_object() {
            return None;
        }
        let req: JoinRequest = serde_json::from_value(value).ok()?;
        if req.id.is_empty() || req.addr.is_empty() {
            return None;
        }
        Some(req)
    }
}

/// GET /
///
/// Reports whether this node is the leader.
pub async fn status<H: ClusterHandle + ?Sized>(handle: Arc<H>) -> Response<Full<Bytes>> {
    if handle.is_leader() {
        response::ok_text(format!("I am server {}.\n", handle.node_id()))
    } else {
        response::ok_text("I am not the leader.\n")
    }
}

/// POST /join
///
/// Admits the server named in the body as a voter.
pub async fn join<B, H>(req: Request<B>, handle: Arc<H>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H: ClusterHandle + ?Sized,
{
    let body = match Limited::new(req.into_body(), MAX_JOIN_BODY).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read join request body");
            return response::bad_request();
        }
    };

    let Some(join) = JoinRequest::parse(&body) else {
        tracing::warn!("rejecting malformed join request");
        return response::bad_request();
    };

    match handle.join(&join.id, &join.addr).await {
        Ok(()) => response::ok_empty(),
        Err(e) => {
            tracing::error!(
                node_id = %join.id,
                addr = %join.addr,
                error = %e,
                "failed to join node"
            );
            response::internal_error()
        }
    }
}
