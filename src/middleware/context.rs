//! Request context middleware
//!
//! Opens the ambient context scope for every inbound request: extracts or
//! generates the correlation identifiers, runs the rest of the request
//! inside that scope, echoes the identifiers on the response, and emits
//! the request/response log entries with latency.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};

use crate::context::{self, RequestContext, REQUEST_ID_HEADER, TRACE_ID_HEADER};
use crate::logging::{LogLevel, LogPayload, Logger};

/// Middleware establishing per-request correlation state.
///
/// Runs outermost so every later stage (authentication, permission
/// gating, the handler) sees a fully populated ambient context.
pub async fn propagate_context(
    State(logger): State<Logger>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::begin(request.headers());
    let request_id = ctx.request_id.clone();
    let trace_id = ctx.trace_id.clone();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let ip = client_ip(&request);

    let mut response = context::run(ctx, async {
        logger.info(
            "http.request.received",
            json!({
                "http": {
                    "method": method.as_str(),
                    "path": path,
                    "client_ip": ip.map(|ip| ip.to_string()),
                    "user_agent": user_agent,
                }
            }),
        );

        let response = next.run(request).await;

        let status = response.status().as_u16();
        let level = if status >= 500 {
            LogLevel::Error
        } else if status >= 400 {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };

        logger.log(
            level,
            "http.response.sent",
            LogPayload::Data(json!({
                "http": {
                    "method": method.as_str(),
                    "path": path,
                    "status_code": status,
                    "response_time_ms": context::current().elapsed_ms(),
                }
            })),
        );

        response
    })
    .await;

    // Echo correlation identifiers so callers and upstream services can
    // stitch their traces to ours.
    let headers = response.headers_mut();
    if let Some(id) = request_id.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(REQUEST_ID_HEADER, id);
    }
    if let Some(id) = trace_id.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(TRACE_ID_HEADER, id);
    }

    response
}

/// Best-effort client address: proxy header first, then the socket peer
pub(crate) fn client_ip(request: &Request<Body>) -> Option<IpAddr> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_header(name: &str, value: &str) -> Request<Body> {
        Request::builder()
            .uri("/api/v1/key")
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_client_ip_from_forwarded_header() {
        let request = request_with_header("x-forwarded-for", "203.0.113.9, 10.0.0.1");
        assert_eq!(client_ip(&request), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let mut request = Request::builder()
            .uri("/api/v1/key")
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = "198.51.100.7:40123".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        assert_eq!(client_ip(&request), Some("198.51.100.7".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_missing() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request), None);
    }
}
