//! Turns a [`Delivery`] into an HTTP response.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::models::resume::ResumeRow;
use crate::resumes::delivery::Delivery;
use crate::resumes::range::{parse_range, ByteRange};
use crate::resumes::upload::sanitize_filename;
use crate::storage::Resolution;

const CACHE_CONTROL: &str = "private, max-age=300";
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Adds the cross-origin allowances previews need when embedded in an
/// iframe on another host.
pub fn apply_preview_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type, Range, X-User-Id"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Disposition, Content-Length, Content-Range, ETag"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
}

/// Answers a CORS preflight for the preview endpoint.
pub fn preflight_response() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    apply_preview_cors(response.headers_mut());
    response
}

pub fn delivery_response(
    delivery: Delivery,
    disposition: Disposition,
    request_headers: &HeaderMap,
) -> Response {
    let Delivery { record, resolution } = delivery;
    match resolution {
        Resolution::Redirect(url) => redirect(&url),
        Resolution::Stream {
            body, mime_type, ..
        } => stream(&record, body, &mime_type, disposition, request_headers),
        // Delivery is only built from a successful resolution.
        Resolution::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}

fn redirect(url: &str) -> Response {
    match HeaderValue::from_str(url) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => {
            tracing::error!("External URL is not a valid Location header: {url}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn stream(
    record: &ResumeRow,
    body: Bytes,
    mime_type: &str,
    disposition: Disposition,
    request_headers: &HeaderMap,
) -> Response {
    let etag = etag_for(record);
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    insert_str(&mut headers, header::ETAG, &etag);
    insert_str(
        &mut headers,
        header::LAST_MODIFIED,
        &record.updated_at.format(HTTP_DATE).to_string(),
    );

    if etag_matches(request_headers, &etag) {
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }

    insert_str(&mut headers, header::CONTENT_TYPE, mime_type);
    insert_str(
        &mut headers,
        header::CONTENT_DISPOSITION,
        &content_disposition(disposition, record),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    let len = body.len() as u64;
    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());

    match parse_range(range, len) {
        ByteRange::Full => (StatusCode::OK, headers, Body::from(body)).into_response(),
        ByteRange::Partial { start, end } => {
            insert_str(
                &mut headers,
                header::CONTENT_RANGE,
                &format!("bytes {start}-{end}/{len}"),
            );
            let slice = body.slice(start as usize..=end as usize);
            (StatusCode::PARTIAL_CONTENT, headers, Body::from(slice)).into_response()
        }
        ByteRange::Unsatisfiable => {
            insert_str(&mut headers, header::CONTENT_RANGE, &format!("bytes */{len}"));
            (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response()
        }
    }
}

/// Derived from id and size so it changes when a migration rewrites content.
pub fn etag_for(record: &ResumeRow) -> String {
    format!("\"{}-{}\"", record.id.simple(), record.size_bytes)
}

fn etag_matches(request_headers: &HeaderMap, etag: &str) -> bool {
    request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(|tag| tag.trim().trim_start_matches("W/"))
                .any(|tag| tag == "*" || tag == etag)
        })
        .unwrap_or(false)
}

/// `filename` carries an ASCII fallback, `filename*` the exact UTF-8 name.
pub fn content_disposition(disposition: Disposition, record: &ResumeRow) -> String {
    let name = sanitize_filename(&record.original_name)
        .or_else(|| sanitize_filename(&record.stored_name))
        .unwrap_or_else(|| "resume".to_string());

    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();

    if ascii == name {
        format!("{}; filename=\"{}\"", disposition.as_str(), name)
    } else {
        format!(
            "{}; filename=\"{}\"; filename*=UTF-8''{}",
            disposition.as_str(),
            ascii,
            percent_encode(&name)
        )
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!("Dropping invalid {name} header value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ContentSource;
    use crate::test_support::legacy_row;
    use uuid::Uuid;

    fn delivery(body: &'static [u8]) -> Delivery {
        let mut record = legacy_row(Uuid::new_v4(), "x.pdf");
        record.original_name = "Jane Doe CV.pdf".to_string();
        record.size_bytes = body.len() as i64;
        Delivery {
            record,
            resolution: Resolution::Stream {
                body: Bytes::from_static(body),
                mime_type: "application/pdf".to_string(),
                source: ContentSource::Database,
            },
        }
    }

    async fn body_of(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_inline_stream_headers() {
        let d = delivery(b"%PDF-1.7");
        let etag = etag_for(&d.record);
        let response = delivery_response(d, Disposition::Inline, &HeaderMap::new());

        assert_eq!(response.status(), StatusCode::OK);
        let h = response.headers();
        assert_eq!(h[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            h[header::CONTENT_DISPOSITION],
            "inline; filename=\"Jane Doe CV.pdf\""
        );
        assert_eq!(h[header::ACCEPT_RANGES], "bytes");
        assert_eq!(h[header::ETAG], etag.as_str());
        assert!(h.contains_key(header::LAST_MODIFIED));
        assert!(h.contains_key(header::CACHE_CONTROL));
        assert_eq!(body_of(response).await, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_matching_etag_is_not_modified() {
        let d = delivery(b"%PDF");
        let mut req = HeaderMap::new();
        req.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_str(&etag_for(&d.record)).unwrap(),
        );
        let response = delivery_response(d, Disposition::Attachment, &req);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_range_request_returns_partial_content() {
        let mut req = HeaderMap::new();
        req.insert(header::RANGE, HeaderValue::from_static("bytes=1-3"));
        let response = delivery_response(delivery(b"abcdef"), Disposition::Inline, &req);

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 1-3/6");
        assert_eq!(body_of(response).await, b"bcd");
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let mut req = HeaderMap::new();
        req.insert(header::RANGE, HeaderValue::from_static("bytes=100-"));
        let response = delivery_response(delivery(b"abc"), Disposition::Inline, &req);
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */3");
    }

    #[test]
    fn test_redirect_uses_found() {
        let mut d = delivery(b"");
        d.resolution = Resolution::Redirect("https://cdn.example.com/r.pdf".into());
        let response = delivery_response(d, Disposition::Attachment, &HeaderMap::new());
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://cdn.example.com/r.pdf"
        );
    }

    #[test]
    fn test_non_ascii_filename_gets_extended_parameter() {
        let mut record = legacy_row(Uuid::new_v4(), "x.pdf");
        record.original_name = "Résumé.pdf".to_string();
        assert_eq!(
            content_disposition(Disposition::Attachment, &record),
            "attachment; filename=\"R_sum_.pdf\"; filename*=UTF-8''R%C3%A9sum%C3%A9.pdf"
        );
    }

    #[test]
    fn test_preflight_is_204_with_cors() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }
}
