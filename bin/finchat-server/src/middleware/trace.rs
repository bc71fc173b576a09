use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Run each request inside an `http_request` span tagged with a trace id.
///
/// The id comes from an incoming `x-trace-id` header when it holds a UUID and
/// is generated otherwise; either way it is set on the request before the
/// handler runs and echoed on the response. Bodies are streamed through
/// untouched and never logged, since they carry users' financial questions
/// and the assistant's answers. Only status, declared length and latency are
/// recorded.
pub async fn trace_middleware(mut req: Request, next: Next) -> Response {
    let started = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    if let Some(value) = header_value.clone() {
        req.headers_mut().insert(X_TRACE_ID, value);
    }

    async move {
        let mut response = next.run(req).await;
        if let Some(value) = header_value {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        let body_bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        info!(
            status = response.status().as_u16(),
            body_bytes,
            latency_ms = started.elapsed().as_millis() as u64,
            "request finished"
        );
        response
    }
    .instrument(span)
    .await
}
