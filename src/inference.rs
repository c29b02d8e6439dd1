//! Assigns containers to bookmarks created together by "Bookmark Tabs".
//!
//! That command bookmarks the selected tabs and leaves them highlighted, so a
//! burst of new bookmarks can be matched to tabs when some window's highlighted
//! tabs have exactly the same URLs as the burst. Bookmarks sharing a URL are
//! paired with same-URL tabs by position. Nothing here is an error: bookmarks
//! that cannot be matched are simply left out of the plan.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::tabs::{ContainerIndex, Tab};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBookmark {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedUpdate {
    pub id: String,
    pub container_id: String,
    pub url: String,
}

/// Picks the highlighted tabs of the first window, by ascending window id,
/// whose URLs are the same multiset as `urls`.
fn matching_window<'a>(tabs: &'a [Tab], urls: &[&str]) -> Option<Vec<&'a Tab>> {
    let mut wanted = urls.to_vec();
    wanted.sort_unstable();

    let mut windows: BTreeMap<u64, Vec<&Tab>> = BTreeMap::new();
    for tab in tabs {
        windows.entry(tab.window_id).or_default().push(tab);
    }

    windows.into_values().find(|window| {
        let mut have = window.iter().map(|tab| tab.url.as_str()).collect::<Vec<_>>();
        have.sort_unstable();
        have == wanted
    })
}

/// Computes the URL rewrites for a drained batch of new bookmarks.
///
/// Only bookmarks whose URL actually changes appear in the result.
pub fn plan(
    pending: &[PendingBookmark],
    tabs: &[Tab],
    containers: &ContainerIndex,
    redirect_key: &str,
) -> Vec<PlannedUpdate> {
    if pending.is_empty() {
        return Vec::new();
    }

    let urls = pending.iter().map(|b| b.url.as_str()).collect::<Vec<_>>();
    let Some(window) = matching_window(tabs, &urls) else {
        return Vec::new();
    };

    let mut tabs_by_url: HashMap<&str, Vec<&Tab>> = HashMap::new();
    for tab in window {
        tabs_by_url.entry(tab.url.as_str()).or_default().push(tab);
    }

    // Position of each bookmark among the batch entries sharing its URL.
    let mut positions: HashMap<&str, usize> = HashMap::new();

    let mut updates = Vec::new();
    for bookmark in pending {
        let position = positions.entry(bookmark.url.as_str()).or_default();
        let index = *position;
        *position += 1;

        let Some(tab) = tabs_by_url
            .get(bookmark.url.as_str())
            .and_then(|tabs| tabs.get(index))
        else {
            continue;
        };
        let Some(container) = tab.container_store().and_then(|store| containers.get(store))
        else {
            continue;
        };

        let url = codec::encode(&bookmark.url, &container.id, redirect_key);
        if url == bookmark.url {
            continue;
        }
        updates.push(PlannedUpdate {
            id: bookmark.id.clone(),
            container_id: container.id.clone(),
            url,
        });
    }
    updates
}
