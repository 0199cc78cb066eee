//! HTTP 辅助工具：请求方案识别、客户端 IP、CORS 与安全响应头。

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, header};
use axum::{middleware, response::Response};
use std::net::IpAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; img-src 'self' data: https:; \
     style-src 'self' 'unsafe-inline'; script-src 'self'; frame-ancestors 'self'";

#[derive(Clone, Copy, Debug)]
pub enum RequestScheme {
    Http,
    Https,
}

impl RequestScheme {
    pub fn is_https(self) -> bool {
        matches!(self, RequestScheme::Https)
    }
}

/// 构建 CORS Layer（逗号分隔的来源列表，无效项跳过）。
pub fn build_cors_layer(cors_origins: Option<&str>) -> Option<CorsLayer> {
    let origins = cors_origins?
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "invalid cors origin");
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .and_then(|value| value.parse::<IpAddr>().ok())
}

/// 优先使用 `x-forwarded-for`，否则退回连接地址。
pub fn resolve_client_ip(headers: &HeaderMap, connect_ip: Option<IpAddr>) -> Option<IpAddr> {
    forwarded_ip(headers).or(connect_ip)
}

/// Honors `x-forwarded-proto` from a reverse proxy before the listener scheme.
pub fn is_https_request(headers: &HeaderMap, scheme: RequestScheme) -> bool {
    match headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
    {
        Some(proto) => proto.eq_ignore_ascii_case("https"),
        None => scheme.is_https(),
    }
}

pub async fn add_security_headers(request: Request<AxumBody>, next: middleware::Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-xss-protection"),
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    #[test]
    fn forwarded_ip_wins_over_connection() {
        let mut headers = HeaderMap::new();
        let connect = Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(resolve_client_ip(&headers, connect), connect);

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(
            resolve_client_ip(&headers, connect),
            Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)))
        );
    }

    #[test]
    fn forwarded_proto_overrides_scheme() {
        let mut headers = HeaderMap::new();
        assert!(!is_https_request(&headers, RequestScheme::Http));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("HTTPS"));
        assert!(is_https_request(&headers, RequestScheme::Http));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        assert!(!is_https_request(&headers, RequestScheme::Https));
    }

    #[test]
    fn cors_requires_a_valid_origin() {
        assert!(build_cors_layer(None).is_none());
        assert!(build_cors_layer(Some(" , ")).is_none());
        assert!(build_cors_layer(Some("https://drive.example.org")).is_some());
    }

    #[tokio::test]
    async fn security_headers_are_set() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(add_security_headers));
        let response = app
            .oneshot(Request::builder().uri("/").body(AxumBody::empty()).expect("request"))
            .await
            .expect("response");
        let headers = response.headers();
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(headers.contains_key("x-xss-protection"));
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    }
}
