//! HTTP request tracking middleware for observability

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::time::Instant;

/// Records latency and count for every request, labeled by method,
/// normalized route, and status.
pub async fn track_metrics(req: Request, next: Next) -> Result<Response, StatusCode> {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    let elapsed = start.elapsed().as_secs_f64();

    crate::metrics::HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &route, &status])
        .observe(elapsed);
    crate::metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &route, &status])
        .inc();

    Ok(response)
}

/// Collapses dynamic path segments so metric label cardinality stays bounded:
/// `/api/tasks/42/complete` becomes `/api/tasks/{id}/complete`.
///
/// Only two kinds of dynamic segment exist in this API: numeric task IDs
/// and conversation UUIDs. Anything overlong is treated as an ID too, so
/// junk probes cannot mint fresh label values.
fn normalize_path(path: &str) -> String {
    let mut route = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        route.push('/');
        route.push_str(if is_id_segment(segment) { "{id}" } else { segment });
    }
    if route.is_empty() {
        route.push('/');
    }
    route
}

fn is_id_segment(segment: &str) -> bool {
    segment.bytes().all(|b| b.is_ascii_digit())
        || uuid::Uuid::parse_str(segment).is_ok()
        || segment.len() > 32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/tasks/42"), "/api/tasks/{id}");
        assert_eq!(
            normalize_path("/api/tasks/42/complete"),
            "/api/tasks/{id}/complete"
        );
        assert_eq!(
            normalize_path("/api/conversations/550e8400-e29b-41d4-a716-446655440000/messages"),
            "/api/conversations/{id}/messages"
        );
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/api/chat"), "/api/chat");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_overlong_segments_collapse() {
        let probe = format!("/api/tasks/{}", "a".repeat(64));
        assert_eq!(normalize_path(&probe), "/api/tasks/{id}");
    }

    #[test]
    fn test_static_segments_survive() {
        assert!(!is_id_segment("tasks"));
        assert!(!is_id_segment("complete"));
        assert!(!is_id_segment("messages"));
        assert!(is_id_segment("7"));
        assert!(is_id_segment("550e8400-e29b-41d4-a716-446655440000"));
    }
}
