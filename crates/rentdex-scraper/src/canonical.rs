//! URL canonicalization for queue and listing identity.

use reqwest::Url;

use crate::error::ScraperError;

/// Query parameters that only carry tracking data and never change the page.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "msclkid", "ref", "ref_src", "mc_cid", "mc_eid", "_ga", "igshid",
    "yclid", "spm",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Reduces a listing URL to its canonical form.
///
/// - A missing scheme becomes `https://`; only `http`/`https` are accepted.
/// - Host is lowercased; default ports are dropped.
/// - The fragment is removed, as are tracking query parameters (`utm_*`,
///   `fbclid`, `gclid`, ...). Remaining parameters keep their order.
/// - Repeated slashes in the path collapse and a trailing slash is trimmed
///   (except for the root path).
///
/// Canonicalizing an already canonical URL returns it unchanged.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] when the input is empty, cannot be
/// parsed, has no host, or uses a non-http scheme.
pub fn canonicalize_url(raw: &str) -> Result<String, ScraperError> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| ScraperError::InvalidUrl {
        url: raw.to_owned(),
        reason: reason.to_owned(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty url"));
    }

    let with_scheme = if trimmed.contains("://") || has_opaque_scheme(trimmed) {
        trimmed.to_owned()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("unsupported scheme"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = collapse_path(url.path());
    url.set_path(&path);

    Ok(url.to_string())
}

/// `mailto:x@y`, `tel:+855...` and similar: a scheme without `//`.
fn has_opaque_scheme(raw: &str) -> bool {
    raw.split_once(':').is_some_and(|(scheme, rest)| {
        !scheme.is_empty()
            && scheme.chars().all(|c| c.is_ascii_alphabetic())
            && !rest.starts_with(|c: char| c.is_ascii_digit())
    })
}

fn collapse_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
