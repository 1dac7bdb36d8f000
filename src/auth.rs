//! Bearer-token acquisition for anonymous pulls from the primary registry.

use crate::config::{AUTH_BASE_URL, AUTH_SERVICE, DEFAULT_NAMESPACE, PRIMARY_REGISTRY_HOST};
use crate::fetch::UpstreamFetcher;
use serde::Deserialize;

/// Fresh per-request pull credential; never cached or persisted.
#[derive(Debug, Deserialize)]
pub struct TokenGrant {
    pub token: String,
}

/// Whether this request needs a bearer token before dispatch: a manifest,
/// blob or tag-list operation against the primary registry's v2 API.
pub fn requires_token(upstream_host: &str, path: &str) -> bool {
    upstream_host == PRIMARY_REGISTRY_HOST
        && path.starts_with("/v2/")
        && (path.contains("/manifests/")
            || path.contains("/blobs/")
            || path.ends_with("/tags/list"))
}

/// Extract the repository identifier between the `/v2/` prefix and the first
/// operation marker, qualifying it with the default namespace when absent.
/// Returns `None` when no repository can be extracted; the broker then
/// proceeds without a token.
pub fn repo_scope(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/v2/")?;
    let idx = ["/manifests/", "/blobs/", "/tags/"]
        .iter()
        .filter_map(|marker| rest.find(marker))
        .min()?;
    let repo = &rest[..idx];
    if repo.is_empty() {
        return None;
    }

    let prefix = format!("{}/", DEFAULT_NAMESPACE);
    if repo.starts_with(&prefix) {
        Some(repo.to_string())
    } else {
        Some(format!("{}{}", prefix, repo))
    }
}

/// Fetch a pull token for the repository from the token service.
///
/// Failures are soft: the request proceeds unauthenticated and the
/// registry's own 401 becomes the caller-visible signal.
pub async fn fetch_token(fetcher: &UpstreamFetcher, repo: &str) -> Option<String> {
    let token_url = format!(
        "{}/token?service={}&scope=repository:{}:pull",
        AUTH_BASE_URL, AUTH_SERVICE, repo
    );
    tracing::debug!(repo, "requesting pull token");

    match fetcher.get(&token_url).await {
        Ok(response) if response.status().is_success() => {
            match response.json::<TokenGrant>().await {
                Ok(grant) => {
                    tracing::debug!(repo, "pull token acquired");
                    Some(grant.token)
                }
                Err(e) => {
                    tracing::warn!(repo, error = %e, "token response parse failed, proceeding unauthenticated");
                    None
                }
            }
        }
        Ok(response) => {
            tracing::warn!(repo, status = %response.status(), "token endpoint returned error, proceeding unauthenticated");
            None
        }
        Err(e) => {
            tracing::warn!(repo, error = %e, "token fetch failed, proceeding unauthenticated");
            None
        }
    }
}
