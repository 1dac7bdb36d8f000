//! Registry path normalization.
//!
//! Rewrites outbound paths and query values to match the primary registry's
//! conventions: the implicit `library/` namespace for unqualified short
//! names, and repair of colon tag separators that clients URL-escaped into
//! the path. Alias upstreams pass through unmodified; the caller gates these
//! on the active upstream being the primary registry.

use crate::config::DEFAULT_NAMESPACE;
use reqwest::Url;

/// Splice `library%2F` after an URL-escaped tag colon.
///
/// Applies to the first `%3A` that is followed somewhere later by `&`, and
/// only when the query string carries no `%2F` (an escaped slash there means
/// the reference is already fully qualified and must not be rewritten again).
pub fn fix_escaped_tag(url: &mut Url) {
    let query_has_escaped_slash = url.query().map(|q| q.contains("%2F")).unwrap_or(false);
    if query_has_escaped_slash {
        return;
    }

    let raw = url.to_string();
    let mut search = 0;
    while let Some(rel) = raw[search..].find("%3A") {
        let idx = search + rel;
        if raw[idx + 3..].contains('&') {
            let spliced = format!(
                "{}%3A{}%2F{}",
                &raw[..idx],
                DEFAULT_NAMESPACE,
                &raw[idx + 3..]
            );
            match Url::parse(&spliced) {
                Ok(parsed) => {
                    tracing::debug!(original = %raw, rewritten = %parsed, "repaired escaped tag separator");
                    *url = parsed;
                }
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "escaped-tag rewrite produced an invalid url, leaving unchanged");
                }
            }
            return;
        }
        search = idx + 3;
    }
}

/// Prefix a two-segment `/v2/<repo>/<op>/<ref>` repository with the default
/// namespace, mirroring the registry's resolution of unqualified short names.
/// Paths already qualified (four segments, or starting with `library`) are
/// left alone.
pub fn add_default_namespace(url: &mut Url) {
    let path = url.path();
    let Some(rest) = path.strip_prefix("/v2/") else {
        return;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return;
    }
    if segments[0] == DEFAULT_NAMESPACE {
        return;
    }

    let new_path = format!("/v2/{}/{}", DEFAULT_NAMESPACE, rest);
    tracing::debug!(path, new_path = %new_path, "added default namespace to repository path");
    url.set_path(&new_path);
}

/// Strip a leading `library/` from a `q` search term so legacy search
/// endpoints see the short name users typed.
pub fn strip_library_from_query(url: &mut Url) {
    let marker = format!("{}/", DEFAULT_NAMESPACE);
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if !pairs.iter().any(|(k, v)| k == "q" && v.contains(&marker)) {
        return;
    }

    let rewritten = pairs.into_iter().map(|(k, v)| {
        if k == "q" {
            let v = v.replacen(&marker, "", 1);
            (k, v)
        } else {
            (k, v)
        }
    });
    url.query_pairs_mut().clear().extend_pairs(rewritten);
}
