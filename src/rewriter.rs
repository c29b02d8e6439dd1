//! Classifies intercepted navigations and computes their redirect target.
//!
//! Two URL shapes are rewritten:
//!
//! * an encoded bookmark `<base>#<key>-<id>` is sent to the synthetic domain
//!   `http://www.<id>.<key>/<base>`, and
//! * a synthetic domain URL `http://www.<id>.<key>/<path>` is sent to `<path>`.
//!
//! When a URL has both shapes the encoded-bookmark form is applied first.
//! Container ids may contain `/` or `.`; a synthetic URL is split at the first
//! `.<key>/` after the host prefix.
//! Every call is synchronous: the browser holds the request until it returns.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    #[default]
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Xmlhttprequest,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub url: String,
    #[serde(rename = "type", default)]
    pub resource_type: ResourceType,
}

impl RequestDetails {
    pub fn main_frame(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            resource_type: ResourceType::MainFrame,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Encoded bookmark sent to its synthetic container domain.
    ToSynthetic { container_id: String, url: String },
    /// Synthetic container domain resolved to the original URL.
    ToOriginal { container_id: String, url: String },
    PassThrough,
}

impl Redirect {
    pub fn target(&self) -> Option<&str> {
        match self {
            Redirect::ToSynthetic { url, .. } | Redirect::ToOriginal { url, .. } => Some(url),
            Redirect::PassThrough => None,
        }
    }
}

/// Response handed back to the blocking request hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl From<Redirect> for BlockingResponse {
    fn from(redirect: Redirect) -> Self {
        match redirect {
            Redirect::ToSynthetic { url, .. } | Redirect::ToOriginal { url, .. } => Self {
                redirect_url: Some(url),
            },
            Redirect::PassThrough => Self::default(),
        }
    }
}

/// Builds the synthetic container domain URL for `original`.
pub fn synthetic_url(original: &str, container_id: &str, redirect_key: &str) -> String {
    format!("http://www.{container_id}.{redirect_key}/{original}")
}

fn synthetic_pattern(redirect_key: &str) -> Regex {
    Regex::new(&format!(
        r"(?s)^http://(?:www\.)?(.+?)\.{}/(.*)$",
        regex::escape(redirect_key)
    ))
    .expect("escaped redirect key forms a valid regex")
}

/// Classifies `url` into exactly one redirect outcome.
pub fn classify(url: &str, redirect_key: &str) -> Redirect {
    if let Some((base, id)) = codec::split(url, redirect_key) {
        return Redirect::ToSynthetic {
            container_id: id.to_string(),
            url: synthetic_url(base, id, redirect_key),
        };
    }

    if let Some(caps) = synthetic_pattern(redirect_key).captures(url) {
        if let (Some(id), Some(path)) = (caps.get(1), caps.get(2)) {
            return Redirect::ToOriginal {
                container_id: id.as_str().to_string(),
                url: path.as_str().to_string(),
            };
        }
    }

    Redirect::PassThrough
}

/// Handles one intercepted request. Only main-frame navigations are rewritten.
pub fn on_before_request(details: &RequestDetails, redirect_key: &str) -> BlockingResponse {
    if details.resource_type != ResourceType::MainFrame {
        return BlockingResponse::default();
    }
    let redirect = classify(&details.url, redirect_key);
    if let Some(target) = redirect.target() {
        debug!(from = %details.url, to = %target, "redirecting navigation");
    }
    redirect.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_bookmark_goes_to_synthetic_domain() {
        let redirect = classify("https://example.com/page#container-work", "container");
        assert_eq!(
            redirect,
            Redirect::ToSynthetic {
                container_id: "work".into(),
                url: "http://www.work.container/https://example.com/page".into(),
            }
        );
    }

    #[test]
    fn synthetic_domain_goes_to_original() {
        let redirect = classify("http://www.work.container/https://example.com/page", "container");
        assert_eq!(
            redirect,
            Redirect::ToOriginal {
                container_id: "work".into(),
                url: "https://example.com/page".into(),
            }
        );
    }

    #[test]
    fn synthetic_domain_without_www_is_accepted() {
        let redirect = classify("http://work.container/https://example.com/?q=1", "container");
        assert_eq!(redirect.target(), Some("https://example.com/?q=1"));
    }

    #[test]
    fn plain_urls_pass_through() {
        for url in [
            "https://example.com/",
            "https://example.com/#top",
            "https://www.work.container/https://example.com/",
            "http://www.container.com/page",
        ] {
            assert_eq!(classify(url, "container"), Redirect::PassThrough, "{url}");
        }
    }

    #[test]
    fn round_trip_lands_on_bare_url() {
        let first = classify("https://example.com/page#container-work", "container");
        let second = classify(first.target().unwrap(), "container");
        assert_eq!(second.target(), Some("https://example.com/page"));
        assert_eq!(classify("https://example.com/page", "container"), Redirect::PassThrough);
    }

    #[test]
    fn container_id_with_slash_round_trips() {
        let id = codec::container_id("Work/Home");
        let encoded = codec::encode("https://example.com/page", &id, "container");
        let first = classify(&encoded, "container");
        assert_eq!(
            first.target(),
            Some("http://www.work/home.container/https://example.com/page")
        );
        assert_eq!(
            classify(first.target().unwrap(), "container"),
            Redirect::ToOriginal {
                container_id: "work/home".into(),
                url: "https://example.com/page".into(),
            }
        );
    }

    #[test]
    fn synthetic_url_splits_at_first_key_suffix() {
        let url = "http://www.home.container/http://www.work.container/https://example.com/";
        assert_eq!(
            classify(url, "container"),
            Redirect::ToOriginal {
                container_id: "home".into(),
                url: "http://www.work.container/https://example.com/".into(),
            }
        );
    }

    #[test]
    fn repeated_marker_splits_at_first_occurrence() {
        let url = "https://example.com/#container-work#container-home";
        assert_eq!(
            classify(url, "container"),
            Redirect::ToSynthetic {
                container_id: "work#container-home".into(),
                url: "http://www.work#container-home.container/https://example.com/".into(),
            }
        );
        assert_eq!(codec::decode(url, "container"), "work#container-home");
        assert_eq!(codec::strip(url, "container"), "https://example.com/");
    }

    #[test]
    fn encoded_form_wins_when_both_match() {
        let url = "http://www.work.container/https://example.com/#container-home";
        let redirect = classify(url, "container");
        assert_eq!(
            redirect,
            Redirect::ToSynthetic {
                container_id: "home".into(),
                url: "http://www.home.container/http://www.work.container/https://example.com/"
                    .into(),
            }
        );
    }

    #[test]
    fn uses_the_current_redirect_key() {
        let url = "https://example.com/#ctx-work";
        assert_eq!(classify(url, "container"), Redirect::PassThrough);
        assert_eq!(
            classify(url, "ctx").target(),
            Some("http://www.work.ctx/https://example.com/")
        );
    }

    #[test]
    fn sub_resources_are_ignored() {
        let details = RequestDetails {
            url: "https://example.com/app.js#container-work".into(),
            resource_type: ResourceType::Script,
        };
        assert_eq!(on_before_request(&details, "container"), BlockingResponse::default());
    }

    #[test]
    fn blocking_response_serialises_like_the_browser_expects() {
        let details = RequestDetails::main_frame("https://example.com/#container-work");
        let response = on_before_request(&details, "container");
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"redirectUrl":"http://www.work.container/https://example.com/"}"#
        );
        let empty = on_before_request(&RequestDetails::main_frame("https://a.test/"), "container");
        assert_eq!(serde_json::to_string(&empty).unwrap(), "{}");
    }

    #[test]
    fn request_details_parse_from_browser_json() {
        let details: RequestDetails =
            serde_json::from_str(r#"{"url":"https://a.test/","type":"main_frame","tabId":3}"#)
                .unwrap();
        assert_eq!(details, RequestDetails::main_frame("https://a.test/"));
        let details: RequestDetails =
            serde_json::from_str(r#"{"url":"https://a.test/","type":"websocket"}"#).unwrap();
        assert_eq!(details.resource_type, ResourceType::Other);
    }
}
