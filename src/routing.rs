//! Upstream selection.
//!
//! Routes a request to a concrete upstream registry host from either an
//! explicit `ns` override or the first label of the request hostname.

use crate::config::PRIMARY_REGISTRY_HOST;

/// How the landing-page decision was reached.
///
/// A tagged enum instead of a nullable boolean: `Explicit` means an `ns`
/// override bypassed alias routing entirely, `AliasHit` matched a short-name
/// alias, `AliasMiss` fell back to the primary registry (and only that case
/// shows the synthetic landing page).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingPage {
    Explicit,
    AliasHit,
    AliasMiss,
}

/// Immutable routing outcome, produced once per request and threaded through
/// the rest of the pipeline by value.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub upstream_host: String,
    pub landing: LandingPage,
}

impl RouteDecision {
    /// Whether browser requests for the document root should get the
    /// synthetic landing page instead of being proxied.
    pub fn synthetic_landing_page(&self) -> bool {
        matches!(self.landing, LandingPage::AliasMiss)
    }
}

/// Static alias table mapping hostname first-labels to upstream registries.
pub fn alias_host(label: &str) -> Option<&'static str> {
    match label {
        "quay" => Some("quay.io"),
        "gcr" => Some("gcr.io"),
        "k8s-gcr" => Some("k8s.gcr.io"),
        "k8s" => Some("registry.k8s.io"),
        "ghcr" => Some("ghcr.io"),
        "cloudsmith" => Some("docker.cloudsmith.io"),
        "nvcr" => Some("nvcr.io"),
        "test" => Some(PRIMARY_REGISTRY_HOST),
        _ => None,
    }
}

/// Pick the upstream host for a request.
///
/// An explicit `ns` override wins: `docker.io` canonicalizes to the primary
/// registry host, anything else is used verbatim. Otherwise the first dotted
/// label of `request_host` (already substituted by `hubhost` when present)
/// is looked up in the alias table.
pub fn route(ns: Option<&str>, request_host: &str) -> RouteDecision {
    if let Some(ns) = ns {
        let upstream_host = if ns == "docker.io" {
            PRIMARY_REGISTRY_HOST.to_string()
        } else {
            ns.to_string()
        };
        tracing::debug!(upstream = %upstream_host, "upstream selected via ns override");
        return RouteDecision {
            upstream_host,
            landing: LandingPage::Explicit,
        };
    }

    let label = request_host.split('.').next().unwrap_or(request_host);
    match alias_host(label) {
        Some(host) => {
            tracing::debug!(label, upstream = host, "upstream selected via alias");
            RouteDecision {
                upstream_host: host.to_string(),
                landing: LandingPage::AliasHit,
            }
        }
        None => {
            tracing::debug!(label, upstream = PRIMARY_REGISTRY_HOST, "no alias match, using primary registry");
            RouteDecision {
                upstream_host: PRIMARY_REGISTRY_HOST.to_string(),
                landing: LandingPage::AliasMiss,
            }
        }
    }
}
