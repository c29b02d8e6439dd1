//! Encodes container ids into bookmark URLs and reads them back out.
//!
//! A bookmark opened in a container carries a `#<key>-<container>` fragment.
//! The redirect key is a user preference, so every pattern here is built from
//! the key passed in by the caller and never cached.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_REDIRECT_KEY: &str = "container";

/// Decoded value for URLs without a container marker.
pub const NO_CONTAINER: &str = "none";

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Derives the container id used in URLs from a container's display name.
///
/// Two names can normalise to the same id; the first one registered wins
/// wherever ids are looked up.
pub fn container_id(name: &str) -> String {
    WHITESPACE_RUN
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}

fn marker_pattern(redirect_key: &str) -> Regex {
    // Escaped key: only the regex size limit can fail here.
    Regex::new(&format!("(?s)#{}-(.*)", regex::escape(redirect_key)))
        .expect("escaped redirect key forms a valid regex")
}

/// Splits `url` at its container marker, returning the URL before the marker
/// and the container id after it.
pub fn split<'a>(url: &'a str, redirect_key: &str) -> Option<(&'a str, &'a str)> {
    let caps = marker_pattern(redirect_key).captures(url)?;
    let whole = caps.get(0)?;
    let id = caps.get(1)?;
    Some((&url[..whole.start()], id.as_str()))
}

/// Removes any container marker from `url`.
pub fn strip(url: &str, redirect_key: &str) -> String {
    match split(url, redirect_key) {
        Some((base, _)) => base.to_string(),
        None => url.to_string(),
    }
}

/// Appends `#<key>-<container>` to `url`, replacing an existing marker.
pub fn encode(url: &str, container_id: &str, redirect_key: &str) -> String {
    format!("{}#{}-{}", strip(url, redirect_key), redirect_key, container_id)
}

/// Returns the container id encoded in `url`, or [`NO_CONTAINER`].
pub fn decode(url: &str, redirect_key: &str) -> String {
    split(url, redirect_key)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| NO_CONTAINER.to_string())
}

/// Like [`encode`], but leaves the URL bare when the container is
/// [`NO_CONTAINER`].
pub fn with_container(url: &str, container_id: &str, redirect_key: &str) -> String {
    if container_id == NO_CONTAINER {
        strip(url, redirect_key)
    } else {
        encode(url, container_id, redirect_key)
    }
}
