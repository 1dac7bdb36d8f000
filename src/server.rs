//! HTTP edge pipeline.
//!
//! A single fallback handler receives every request and walks it through
//! user-agent screening, upstream routing, path normalization, the token
//! broker and outbound dispatch. Routing state travels with the request as a
//! value; nothing request-scoped lives in shared state.

use crate::auth;
use crate::config::{Config, HUB_HOST, INDEX_HOST, MAX_REQUEST_BODY_BYTES, PRIMARY_REGISTRY_HOST};
use crate::error::{ProxyError, Result};
use crate::fetch::{ProxyRequest, UpstreamFetcher};
use crate::pages;
use crate::response::{self, bad_gateway};
use crate::rewrite;
use crate::routing::{self, RouteDecision};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use reqwest::Url;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<UpstreamFetcher>,
}

async fn health() -> &'static str {
    "ok"
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(handle)
        .with_state(state)
}

/// Plain 302 with a Location header, matching what registry clients and
/// browsers both follow without changing the method.
fn found_redirect(target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::FOUND;
            response.headers_mut().insert(header::LOCATION, location);
            response
        }
        Err(_) => {
            error!(redirect_target = target, "configured redirect target is not a valid header value");
            bad_gateway("upstream request failed")
        }
    }
}

/// Pull a query parameter out of the request URL.
fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k.as_ref() == key)
        .map(|(_, v)| v.into_owned())
}

async fn handle(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let method = parts.method;
    let headers = parts.headers;
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    // Buffered so redirect re-dispatch can replay it.
    let body = match axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to buffer request body");
            return (StatusCode::BAD_REQUEST, "invalid request body").into_response();
        }
    };

    let host_header = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    // Owned: the headers move into the ProxyRequest below, and the proxy
    // host is still needed for the realm rewrite afterwards.
    let proxy_host = host_header
        .split(':')
        .next()
        .unwrap_or(host_header)
        .to_string();

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("null")
        .to_lowercase();

    tracing::info!(method = %method, path = %path_and_query, host = %proxy_host, "request received");

    if state.config.is_blocked_agent(&user_agent) {
        tracing::info!(user_agent = %user_agent, "blocked user agent, serving camouflage page");
        return Html(pages::nginx_page()).into_response();
    }

    let mut url = match Url::parse(&format!("https://{}{}", proxy_host, path_and_query)) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(error = %e, "request uri did not parse");
            return (StatusCode::BAD_REQUEST, "invalid request uri").into_response();
        }
    };

    let ns = query_param(&url, "ns");
    let hub_host_override = query_param(&url, "hubhost");
    let routed_host = hub_host_override.as_deref().unwrap_or(proxy_host.as_str());
    let decision = routing::route(ns.as_deref(), routed_host);

    if url.set_host(Some(&decision.upstream_host)).is_err() {
        error!(upstream = %decision.upstream_host, "upstream host rejected by url parser");
        return bad_gateway("upstream request failed");
    }

    let browserish = user_agent.contains("mozilla")
        || url.path().contains("/v1/search")
        || url.path().contains("/v1/repositories");
    if browserish {
        if url.path() == "/" {
            if let Some(target) = &state.config.root_redirect_url {
                return found_redirect(target);
            }
            if let Some(override_url) = &state.config.root_upstream_url {
                if override_url.eq_ignore_ascii_case("nginx") {
                    return Html(pages::nginx_page()).into_response();
                }
                return relay_root_override(&state, override_url, method, headers, body).await;
            }
            if decision.synthetic_landing_page() {
                return Html(pages::search_page()).into_response();
            }
            // No root behavior configured and no landing page: proxied like
            // any other path.
        } else {
            return relay_legacy_search(&state, url, &decision, method, headers, body).await;
        }
    }

    if decision.upstream_host == PRIMARY_REGISTRY_HOST {
        rewrite::fix_escaped_tag(&mut url);
        rewrite::add_default_namespace(&mut url);
    }

    let original = ProxyRequest {
        method,
        url,
        headers,
        body,
    };

    let mut outbound = original.clone();
    if auth::requires_token(&decision.upstream_host, original.url.path()) {
        if let Some(repo) = auth::repo_scope(original.url.path()) {
            if let Some(token) = auth::fetch_token(&state.fetcher, &repo).await {
                match HeaderValue::from_str(&format!("Bearer {}", token)) {
                    Ok(value) => {
                        outbound.headers.insert(header::AUTHORIZATION, value);
                    }
                    Err(_) => {
                        tracing::warn!(repo, "token not usable as a header value, proceeding unauthenticated");
                    }
                }
            }
        }
    }

    let upstream = match state.fetcher.dispatch(outbound).await {
        Ok(upstream) => upstream,
        Err(e) => {
            error!(error = %e, "upstream dispatch failed");
            return bad_gateway("upstream request failed");
        }
    };

    response::finalize(&state.fetcher, &original, upstream, &proxy_host).await
}

/// Forward the document-root request to the configured override URL,
/// following redirects, and return whatever comes back.
async fn relay_root_override(
    state: &AppState,
    override_url: &str,
    method: axum::http::Method,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Response {
    let url = match Url::parse(override_url) {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, "configured root override url is invalid");
            return bad_gateway("upstream request failed");
        }
    };
    let request = ProxyRequest {
        method,
        url,
        headers,
        body,
    };
    response::relay_following(&state.fetcher, request).await
}

/// Relay a browser or legacy v1 search request. `/v1/*` paths go to the
/// index host; synthetic-landing hosts browse the catalog host instead. No
/// response rewriting on this path.
async fn relay_legacy_search(
    state: &AppState,
    mut url: Url,
    decision: &RouteDecision,
    method: axum::http::Method,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Response {
    let target_host = if url.path().starts_with("/v1/") {
        Some(INDEX_HOST)
    } else if decision.synthetic_landing_page() {
        Some(HUB_HOST)
    } else {
        None
    };
    if let Some(host) = target_host {
        if url.set_host(Some(host)).is_err() {
            error!(host, "search host rejected by url parser");
            return bad_gateway("upstream request failed");
        }
    }
    rewrite::strip_library_from_query(&mut url);

    let request = ProxyRequest {
        method,
        url,
        headers,
        body,
    };
    match state.fetcher.dispatch(request).await {
        Ok(upstream) => response::passthrough(upstream),
        Err(e) => {
            error!(error = %e, "search relay dispatch failed");
            bad_gateway("upstream request failed")
        }
    }
}

/// Bind the configured address and serve until the task is aborted or the
/// listener fails.
pub async fn start_server(config: Config) -> Result<tokio::task::JoinHandle<()>> {
    let fetcher = Arc::new(UpstreamFetcher::new(&config)?);
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let state = AppState {
        config: Arc::new(config),
        fetcher,
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ProxyError::Config(format!("failed to bind {}: {}", addr, e)))?;
    tracing::info!("HTTP server listening on {}", addr);

    let app = build_router(state);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error after startup: {}", e);
        } else {
            tracing::info!("HTTP server stopped");
        }
    });
    Ok(handle)
}
