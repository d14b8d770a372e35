//! Stateless HTTP helper functions extracted for unit testing, mirroring the
//! teacher's separation of pure helpers from handler bodies.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Rate-limit key: the first `X-Forwarded-For` hop if present, else the peer
/// address (SPEC_FULL.md §3 Rate-limit bucket).
pub fn client_identifier(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = value.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    peer.ip().to_string()
}

/// RFC 5987 dual-form `Content-Disposition` value: an ASCII fallback (non-ASCII
/// codepoints replaced by `_`) plus the percent-encoded `filename*` form.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let encoded = urlencoding::encode(filename);
    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}

/// The user-facing download filename, with the internal `--<taskId>`
/// disambiguation suffix stripped (SPEC_FULL.md §4.1 Download contract).
pub fn download_file_name(app_name: &str) -> String {
    format!("{app_name}.apk")
}

/// Default app name when the client omits `appName`, per build kind.
pub fn default_app_name(kind: crate::domain::BuildKind) -> &'static str {
    match kind {
        crate::domain::BuildKind::Html => "MyVibeApp",
        crate::domain::BuildKind::Zip => "MyReactApp",
    }
}
