use axum::{
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppError;

/// Room for multipart framing and the text fields around an uploaded book.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Largest request body the API accepts, derived from the upload limit.
pub fn max_body_bytes(cfg: &AppConfig) -> usize {
    cfg.storage.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)
}

/// Rejects traversal attempts in the URI and oversized declared bodies before
/// any handler runs; flags known scanner user agents in the log.
pub async fn validate_request_middleware(State(cfg): State<Arc<AppConfig>>, req: Request, next: Next) -> Response {
    if contains_path_traversal(req.uri().path()) {
        tracing::warn!("Path traversal attempt: {}", sanitize_for_logging(req.uri().path()));
        return AppError::BadRequest("Path traversal detected in request".to_string()).into_response();
    }

    if let Some(ua) = req.headers().get("user-agent").and_then(|v| v.to_str().ok()) {
        if is_suspicious_user_agent(ua) {
            tracing::warn!("Suspicious user agent detected: {}", sanitize_for_logging(ua));
        }
    }

    if matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        let limit = max_body_bytes(&cfg);
        if let Some(length) = declared.filter(|&len| len > limit) {
            tracing::info!("Rejected request body of {} bytes (limit {})", length, limit);
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({
                    "error": {
                        "code": "PAYLOAD_TOO_LARGE",
                        "message": format!("Request body exceeds maximum size of {} bytes", limit),
                    },
                    "status": 413,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            )
                .into_response();
        }
    }

    next.run(req).await
}

fn contains_path_traversal(path: &str) -> bool {
    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }
    if path.contains("/./") || path.contains("\\.\\") || path.contains("....") {
        return true;
    }

    let lower = path.to_lowercase();
    // single and double URL encodings of the sequences above, plus NUL
    let encoded_patterns = [
        "%2e%2e", "%252e%252e", "%2e/", "%252e%2f", "/%2e", "%2f%2e", "%2e\\", "%2e%5c", "%5c%2e", "%5c%5c", "%00",
    ];
    encoded_patterns.iter().any(|p| lower.contains(p)) || path.contains('\0')
}

fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua_lower = ua.to_lowercase();
    ua_lower.contains("scanner")
        || (ua_lower.contains("crawler") && !ua_lower.contains("googlebot") && !ua_lower.contains("bingbot"))
        || ["nikto", "sqlmap", "havij", "acunetix"].iter().any(|tool| ua_lower.contains(tool))
}

/// Makes user-supplied text safe to embed in a log line: control characters
/// dropped, quotes escaped, length capped at 200 characters.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\\'")
}
