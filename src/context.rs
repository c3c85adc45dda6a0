//! Ambient request context
//!
//! Every inbound request gets a [`RequestContext`] carrying its correlation
//! identifiers (request id, trace id, span id) and, once authentication
//! resolves it, the acting user id. The context is scoped to the request's
//! task via a tokio task-local, so any code running inside the request's
//! async extent can read it without threading a parameter through every
//! call. The implicit mechanism is confined to the request boundary layer;
//! spawned background work re-enters the scope explicitly with
//! [`run`]`(`[`current`]`(), ...)`.

use axum::http::HeaderMap;
use rand::RngCore;
use std::cell::RefCell;
use std::future::Future;
use std::time::Instant;

/// Header carrying the client-supplied (or echoed) request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the distributed trace id
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Correlation state for one in-flight request.
///
/// All fields are optional so that code running outside any request scope
/// (startup, background sweeps) observes an empty context instead of
/// panicking.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub user_id: Option<String>,
    pub started_at: Option<Instant>,
}

impl RequestContext {
    /// Build the context for an inbound request.
    ///
    /// Client-supplied `X-Request-ID` and `X-Trace-ID` headers are honored
    /// so callers and upstream services can correlate; the span id is
    /// always generated fresh because it identifies this process's handling
    /// of the call, not the end-to-end transaction.
    pub fn begin(headers: &HeaderMap) -> Self {
        let request_id = header_value(headers, REQUEST_ID_HEADER)
            .unwrap_or_else(generate_request_id);
        let trace_id =
            header_value(headers, TRACE_ID_HEADER).unwrap_or_else(generate_trace_id);

        Self {
            request_id: Some(request_id),
            trace_id: Some(trace_id),
            span_id: Some(generate_span_id()),
            user_id: None,
            started_at: Some(Instant::now()),
        }
    }

    /// True when no identifier is populated (outside any request scope)
    pub fn is_empty(&self) -> bool {
        self.request_id.is_none() && self.trace_id.is_none() && self.span_id.is_none()
    }

    /// Milliseconds elapsed since the request started, if known
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.started_at.map(|t| t.elapsed().as_millis() as u64)
    }

    /// Overlay `other`'s populated fields onto a copy of `self`
    fn merged(&self, other: Self) -> Self {
        Self {
            request_id: other.request_id.or_else(|| self.request_id.clone()),
            trace_id: other.trace_id.or_else(|| self.trace_id.clone()),
            span_id: other.span_id.or_else(|| self.span_id.clone()),
            user_id: other.user_id.or_else(|| self.user_id.clone()),
            started_at: other.started_at.or(self.started_at),
        }
    }

    fn apply(&mut self, patch: RequestContext) {
        *self = self.merged(patch);
    }
}

tokio::task_local! {
    static CURRENT: RefCell<RequestContext>;
}

/// Execute `fut` with `context` as the ambient scope.
///
/// A nested call merges the new context over the enclosing one for the
/// duration of `fut`; the outer scope is restored when `fut` completes.
pub async fn run<F>(context: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    let scoped = current().merged(context);
    CURRENT.scope(RefCell::new(scoped), fut).await
}

/// Read the ambient context visible from the calling point.
///
/// Returns an empty context outside any [`run`] extent; never panics,
/// since logging must not be able to fail a request.
pub fn current() -> RequestContext {
    CURRENT
        .try_with(|ctx| ctx.borrow().clone())
        .unwrap_or_default()
}

/// Extend the active scope in place with `patch`'s populated fields.
///
/// Later reads within the same request observe the merged values. Outside
/// any scope this is a no-op.
pub fn merge(patch: RequestContext) {
    let _ = CURRENT.try_with(|ctx| ctx.borrow_mut().apply(patch));
}

/// Attach the resolved user id to the active scope
pub fn set_user_id(user_id: impl Into<String>) {
    merge(RequestContext {
        user_id: Some(user_id.into()),
        ..Default::default()
    });
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn generate_request_id() -> String {
    format!("req_{}", random_hex(12))
}

fn generate_trace_id() -> String {
    random_hex(16)
}

fn generate_span_id() -> String {
    random_hex(8)
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_begin_generates_ids() {
        let ctx = RequestContext::begin(&HeaderMap::new());
        let request_id = ctx.request_id.as_deref().unwrap();
        assert!(request_id.starts_with("req_"));
        assert_eq!(request_id.len(), "req_".len() + 24);
        assert_eq!(ctx.trace_id.as_deref().unwrap().len(), 32);
        assert_eq!(ctx.span_id.as_deref().unwrap().len(), 16);
        assert!(ctx.user_id.is_none());
    }

    #[test]
    fn test_begin_honors_inbound_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req_upstream"));
        headers.insert(TRACE_ID_HEADER, HeaderValue::from_static("trace-upstream"));

        let ctx = RequestContext::begin(&headers);
        assert_eq!(ctx.request_id.as_deref(), Some("req_upstream"));
        assert_eq!(ctx.trace_id.as_deref(), Some("trace-upstream"));
        // Span id is always fresh, never inherited
        assert_eq!(ctx.span_id.as_deref().unwrap().len(), 16);
    }

    #[test]
    fn test_current_outside_scope_is_empty() {
        let ctx = current();
        assert!(ctx.is_empty());
        assert!(ctx.user_id.is_none());
    }

    #[tokio::test]
    async fn test_run_scopes_context() {
        let ctx = RequestContext {
            request_id: Some("req_scoped".to_string()),
            ..Default::default()
        };

        run(ctx, async {
            assert_eq!(current().request_id.as_deref(), Some("req_scoped"));
        })
        .await;

        assert!(current().is_empty());
    }

    #[tokio::test]
    async fn test_merge_visible_to_later_reads() {
        let ctx = RequestContext {
            request_id: Some("req_merge".to_string()),
            ..Default::default()
        };

        run(ctx, async {
            set_user_id("user-42");
            let seen = current();
            assert_eq!(seen.request_id.as_deref(), Some("req_merge"));
            assert_eq!(seen.user_id.as_deref(), Some("user-42"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_nested_run_merges_then_restores() {
        let outer = RequestContext {
            request_id: Some("req_outer".to_string()),
            trace_id: Some("trace_outer".to_string()),
            ..Default::default()
        };

        run(outer, async {
            let inner = RequestContext {
                span_id: Some("span_inner".to_string()),
                ..Default::default()
            };
            run(inner, async {
                let seen = current();
                // Inner scope overlays the outer, it does not replace it
                assert_eq!(seen.request_id.as_deref(), Some("req_outer"));
                assert_eq!(seen.span_id.as_deref(), Some("span_inner"));
            })
            .await;

            // Outer scope restored on exit
            assert!(current().span_id.is_none());
            assert_eq!(current().request_id.as_deref(), Some("req_outer"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        // Two interleaved requests must never observe each other's ids,
        // even when both yield mid-execution.
        let task = |id: &'static str| async move {
            let ctx = RequestContext {
                request_id: Some(id.to_string()),
                ..Default::default()
            };
            run(ctx, async move {
                assert_eq!(current().request_id.as_deref(), Some(id));
                tokio::task::yield_now().await;
                set_user_id(format!("user-of-{id}"));
                tokio::task::yield_now().await;
                let seen = current();
                assert_eq!(seen.request_id.as_deref(), Some(id));
                assert_eq!(seen.user_id.as_deref(), Some(format!("user-of-{id}").as_str()));
            })
            .await;
        };

        tokio::join!(task("req_a"), task("req_b"));
    }
}
