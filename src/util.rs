//! String normalization for externally configured domains and relay URLs.

use crate::error::AppError;

/// Reduce a configured domain to the bare host used in callback URLs.
///
/// Strips a leading `http://`/`https://`, then a leading `www.`, then any
/// trailing slashes and spaces.
pub fn normalize_domain(raw_domain: Option<&str>) -> Result<String, AppError> {
    let raw_domain =
        raw_domain.ok_or_else(|| AppError::invalid_config("provide a valid domain"))?;

    let domain = raw_domain
        .strip_prefix("https://")
        .or_else(|| raw_domain.strip_prefix("http://"))
        .unwrap_or(raw_domain);
    let domain = domain.strip_prefix("www.").unwrap_or(domain);
    let domain = domain.trim_end_matches(['/', ' ']);

    Ok(domain.to_string())
}

/// Canonical relay URLs: lowercase, `wss://` unless a websocket scheme is
/// given, at most one trailing slash removed.
pub fn normalize_relay_urls<S: AsRef<str>>(urls: &[S]) -> Vec<String> {
    urls.iter()
        .map(|url| {
            let url = url.as_ref().trim().to_lowercase();
            let url = if url.starts_with("ws://") || url.starts_with("wss://") {
                url
            } else {
                format!("wss://{url}")
            };
            match url.strip_suffix('/') {
                Some(stripped) => stripped.to_string(),
                None => url,
            }
        })
        .collect()
}
