//! Client-facing response assembly.
//!
//! Follows upstream redirects transparently, rewrites the authentication
//! realm to keep clients talking to the proxy, applies permissive CORS and
//! strips upstream security policies that would break the proxied origin.
//! Upstream failures collapse into a generic 502; the detail goes to the log,
//! never to the client.

use crate::config::MAX_REDIRECT_DEPTH;
use crate::fetch::{ProxyRequest, UpstreamFetcher};
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

/// Upstream policy headers removed before the response reaches the client.
const STRIPPED_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "clear-site-data",
];

/// Rewrite the `realm` host of a `WWW-Authenticate` challenge to the proxy's
/// own host so clients send their token requests back through the proxy.
/// Returns `None` when the value carries no parseable realm.
pub fn rewrite_realm(value: &str, proxy_host: &str) -> Option<String> {
    let start = value.find("realm=\"")? + "realm=\"".len();
    let rest = &value[start..];
    let end = rest.find('"')?;
    let realm_url = &rest[..end];

    let after_scheme = realm_url.find("://").map(|i| i + 3)?;
    let host_end = realm_url[after_scheme..]
        .find('/')
        .map(|i| after_scheme + i)
        .unwrap_or(realm_url.len());
    let realm_host = &realm_url[after_scheme..host_end];
    if realm_host.is_empty() {
        return None;
    }

    Some(value.replacen(realm_host, proxy_host, 1))
}

/// Generic error response; deliberately carries no upstream detail.
pub fn bad_gateway(message: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(message))
        .unwrap_or_default()
}

/// Turn the upstream response into the client response: any response
/// carrying a `Location` header is re-dispatched to that location (original
/// method/headers/body), up to the depth cap, regardless of status code;
/// then the authentication realm is rewritten, CORS headers added and policy
/// headers stripped. The body is streamed through, never buffered.
pub async fn finalize(
    fetcher: &UpstreamFetcher,
    original: &ProxyRequest,
    mut upstream: reqwest::Response,
    proxy_host: &str,
) -> Response {
    let mut depth = 0;
    loop {
        let Some(location) = upstream
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
        else {
            break;
        };

        if depth >= MAX_REDIRECT_DEPTH {
            tracing::warn!(depth, "redirect chain exceeded depth cap");
            return bad_gateway("upstream redirect limit exceeded");
        }
        depth += 1;

        let target = match original.url.join(&location) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(location = %location, error = %e, "upstream sent an unusable redirect location");
                return bad_gateway("upstream request failed");
            }
        };
        tracing::debug!(depth, target = %target, "following upstream redirect");

        let mut next = original.clone();
        next.url = target;
        upstream = match fetcher.dispatch(next).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "redirect re-dispatch failed");
                return bad_gateway("upstream request failed");
            }
        };
    }

    copy_response(upstream, proxy_host)
}

/// In-place header rewrites for the final client-facing response: framing
/// cleanup, policy-header strips, realm rewrite, CORS additions.
pub fn apply_rewrites(headers: &mut axum::http::HeaderMap, proxy_host: &str) {
    // The client connection has its own framing.
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);
    for name in STRIPPED_HEADERS {
        headers.remove(*name);
    }

    let rewritten = headers
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| rewrite_realm(v, proxy_host));
    if let Some(value) = rewritten {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(header::WWW_AUTHENTICATE, value);
        }
    }

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("*"),
    );
}

/// Copy status and headers from the upstream response and stream its body,
/// applying the rewrites above.
pub fn copy_response(upstream: reqwest::Response, proxy_host: &str) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    apply_rewrites(&mut headers, proxy_host);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Dispatch a request and transparently follow 3xx redirects, returning the
/// final response verbatim. Used for the configured document-root relay,
/// which the original forwarded with default redirect-following and no
/// header rewriting.
pub async fn relay_following(fetcher: &UpstreamFetcher, request: ProxyRequest) -> Response {
    let mut current = request;
    let mut depth = 0;
    loop {
        let upstream = match fetcher.dispatch(current.clone()).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!(error = %e, "relay dispatch failed");
                return bad_gateway("upstream request failed");
            }
        };

        if !upstream.status().is_redirection() {
            return passthrough(upstream);
        }
        let Some(location) = upstream
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
        else {
            return passthrough(upstream);
        };

        if depth >= MAX_REDIRECT_DEPTH {
            tracing::warn!(depth, "relay redirect chain exceeded depth cap");
            return bad_gateway("upstream redirect limit exceeded");
        }
        depth += 1;

        current.url = match current.url.join(&location) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(location = %location, error = %e, "relay target sent an unusable redirect location");
                return bad_gateway("upstream request failed");
            }
        };
        tracing::debug!(depth, target = %current.url, "following relay redirect");
    }
}

/// Stream an upstream response through verbatim, without redirect handling
/// or header rewrites. Used for the legacy search endpoints.
pub fn passthrough(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONNECTION);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
