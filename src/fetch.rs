//! Outbound dispatch.
//!
//! Hosts in the direct set go out over the normal network path; everything
//! else is resolved through NAT64 and dispatched with a per-call connection
//! override pinning the hostname to the synthesized IPv6 address.

use crate::config::{Config, DIRECT_HOSTS};
use crate::error::{ProxyError, Result};
use crate::nat64::Nat64Resolver;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Mutable working copy of the request being proxied. Owned by the current
/// request's execution; the buffered body lets redirect re-dispatch reuse it.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct UpstreamFetcher {
    direct: reqwest::Client,
    resolver: Nat64Resolver,
    request_timeout_secs: u64,
    connect_timeout_secs: u64,
}

impl UpstreamFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let direct = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        let resolver = Nat64Resolver::new(config.request_timeout_secs, config.connect_timeout_secs)?;

        Ok(Self {
            direct,
            resolver,
            request_timeout_secs: config.request_timeout_secs,
            connect_timeout_secs: config.connect_timeout_secs,
        })
    }

    /// Whether the host is reachable without NAT64 translation. IP literals
    /// carry no name to resolve, so they always go direct.
    pub fn is_direct(host: &str) -> bool {
        host.parse::<IpAddr>().is_ok() || DIRECT_HOSTS.contains(&host)
    }

    /// Dispatch an outbound request, choosing direct or NAT64 per host.
    pub async fn dispatch(&self, request: ProxyRequest) -> Result<reqwest::Response> {
        let host = request
            .url
            .host_str()
            .ok_or_else(|| ProxyError::Address("outbound url has no host".to_string()))?
            .to_string();

        if Self::is_direct(&host) {
            tracing::debug!(host = %host, "dispatching over direct connection");
            self.dispatch_direct(request).await
        } else {
            tracing::debug!(host = %host, "host not in direct set, dispatching via NAT64");
            self.dispatch_nat64(request, &host).await
        }
    }

    /// GET with empty headers and body, used for token acquisition.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let url =
            Url::parse(url).map_err(|e| ProxyError::Config(format!("invalid url: {}", e)))?;
        self.dispatch(ProxyRequest {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
        .await
    }

    async fn dispatch_direct(&self, request: ProxyRequest) -> Result<reqwest::Response> {
        let mut headers = request.headers;
        sanitize_headers(&mut headers);

        let response = self
            .direct
            .request(request.method, request.url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;
        Ok(response)
    }

    async fn dispatch_nat64(
        &self,
        request: ProxyRequest,
        host: &str,
    ) -> Result<reqwest::Response> {
        let mapping = self.resolver.resolve(host).await?;
        let addr = mapping.addr()?;
        let port = request.url.port_or_known_default().unwrap_or(443);

        // One client per call: resolution is never reused across calls.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .resolve(host, SocketAddr::new(IpAddr::V6(addr), port))
            .build()?;

        let mut headers = request.headers;
        sanitize_headers(&mut headers);
        // The synthesized literal is not a valid Host/SNI value; keep the
        // original hostname on the wire.
        headers.insert(
            header::HOST,
            HeaderValue::from_str(host)
                .map_err(|_| ProxyError::Address(format!("invalid host header value: {}", host)))?,
        );

        tracing::info!(domain = %mapping.domain, nat64 = %mapping.literal, "dispatching via NAT64 override");
        let response = client
            .request(request.method, request.url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;
        Ok(response)
    }
}

/// Drop framing headers the client stack derives itself.
fn sanitize_headers(headers: &mut HeaderMap) {
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);
}
