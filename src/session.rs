use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bookmarks::{
    self, BookmarkChange, BookmarkDetails, BookmarkMove, BookmarkNode, BookmarkStore,
    BookmarkUpdate, FolderOption,
};
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::inference::{self, PendingBookmark, PlannedUpdate};
use crate::preferences::{PreferenceStore, Preferences};
use crate::rewriter::{self, BlockingResponse, RequestDetails};
use crate::subscriptions::{Subscription, SubscriptionDiff, Subscriptions};
use crate::tabs::{ContainerIndex, ContainerInfo, ContainerRegistry, TabQuery};

/// Browser-side services the session works against.
#[derive(Clone)]
pub struct Collaborators {
    pub preferences: Arc<dyn PreferenceStore>,
    pub bookmarks: Arc<dyn BookmarkStore>,
    pub tabs: Arc<dyn TabQuery>,
    pub containers: Arc<dyn ContainerRegistry>,
}

/// Everything the popup window is opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupRequest {
    pub bookmark: BookmarkDetails,
    pub folders: Vec<FolderOption>,
    pub containers: Vec<ContainerInfo>,
    pub preferences: Preferences,
}

/// Bookmarks created since the last inference run, in creation order.
#[derive(Debug, Default)]
struct PendingBatch {
    order: Vec<String>,
    records: HashMap<String, BookmarkNode>,
}

impl PendingBatch {
    fn insert(&mut self, id: &str, node: BookmarkNode) {
        if self.records.insert(id.to_string(), node).is_none() {
            self.order.push(id.to_string());
        }
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut BookmarkNode> {
        self.records.get_mut(id)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn into_pending(mut self) -> Vec<PendingBookmark> {
        self.order
            .into_iter()
            .filter_map(|id| {
                let node = self.records.remove(&id)?;
                let url = node.url?;
                Some(PendingBookmark { id, url })
            })
            .collect()
    }
}

struct Inner {
    collaborators: Collaborators,
    last_known: RwLock<Preferences>,
    pending: Mutex<PendingBatch>,
    subscriptions: RwLock<Subscriptions>,
}

impl Inner {
    /// Current preferences. A failed read keeps the last values that loaded.
    fn preferences(&self) -> Preferences {
        match self.collaborators.preferences.load() {
            Ok(preferences) => {
                *self.last_known.write() = preferences.clone();
                preferences
            }
            Err(err) => {
                warn!(error = %err, "failed to read preferences, keeping last known values");
                self.last_known.read().clone()
            }
        }
    }

    fn refresh_subscriptions(&self) -> SubscriptionDiff {
        let preferences = self.preferences();
        self.subscriptions.write().reconcile(&preferences)
    }

    fn popup_request(&self, node: &BookmarkNode, is_edit: bool) -> Result<Option<PopupRequest>> {
        let preferences = self.preferences();
        let store = self.collaborators.bookmarks.as_ref();
        let Some(bookmark) =
            BookmarkDetails::describe(store, node, is_edit, &preferences.redirect_key)?
        else {
            return Ok(None);
        };
        let tree = store.get_tree().context("session: read bookmark tree")?;
        let containers = self
            .collaborators
            .containers
            .containers()
            .context("session: query containers")?;
        Ok(Some(PopupRequest {
            bookmark,
            folders: bookmarks::folder_options(&tree),
            containers: containers.iter().map(ContainerInfo::from).collect(),
            preferences,
        }))
    }

    fn fill_containers_from_tabs(&self) -> Vec<PlannedUpdate> {
        let batch = std::mem::take(&mut *self.pending.lock());
        let pending = batch.into_pending();
        if pending.is_empty() {
            return Vec::new();
        }

        let redirect_key = self.preferences().redirect_key;
        let tabs = match self.collaborators.tabs.highlighted_tabs() {
            Ok(tabs) => tabs,
            Err(err) => {
                warn!(error = %err, "failed to query highlighted tabs");
                return Vec::new();
            }
        };
        let containers = match self.collaborators.containers.containers() {
            Ok(containers) => ContainerIndex::new(&containers),
            Err(err) => {
                warn!(error = %err, "failed to query containers");
                return Vec::new();
            }
        };

        let planned = inference::plan(&pending, &tabs, &containers, &redirect_key);
        debug!(
            bookmarks = pending.len(),
            tabs = tabs.len(),
            planned = planned.len(),
            "container inference finished"
        );

        let store = self.collaborators.bookmarks.as_ref();
        let mut applied = Vec::with_capacity(planned.len());
        for update in planned {
            if !bookmarks::bookmark_exists(store, &update.id) {
                debug!(bookmark = %update.id, "bookmark removed before container update");
                continue;
            }
            match store.update(&update.id, BookmarkUpdate::url(update.url.clone())) {
                Ok(_) => {
                    info!(bookmark = %update.id, container = %update.container_id, "assigned container");
                    applied.push(update);
                }
                Err(err) => {
                    warn!(bookmark = %update.id, error = %err, "failed to update bookmark");
                }
            }
        }
        applied
    }
}

/// Background state for one browser session. Handlers are called by the
/// event loop; inference for a burst of new bookmarks runs on the debouncer
/// thread.
pub struct Session {
    inner: Arc<Inner>,
    debouncer: Debouncer,
}

impl Session {
    pub fn new(collaborators: Collaborators, debounce: Duration) -> Self {
        let inner = Arc::new(Inner {
            collaborators,
            last_known: RwLock::new(Preferences::default()),
            pending: Mutex::new(PendingBatch::default()),
            subscriptions: RwLock::new(Subscriptions::default()),
        });
        inner.refresh_subscriptions();

        let weak = Arc::downgrade(&inner);
        let debouncer = Debouncer::new(debounce, move || {
            if let Some(inner) = weak.upgrade() {
                inner.fill_containers_from_tabs();
            }
        });

        Self { inner, debouncer }
    }

    pub fn from_config(cfg: &Config, collaborators: Collaborators) -> Self {
        Self::new(collaborators, cfg.inference.debounce)
    }

    pub fn preferences(&self) -> Preferences {
        self.inner.preferences()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.subscriptions.read().active().collect()
    }

    /// Persists new preferences and reports which listeners to add or remove.
    pub fn set_preferences(&self, preferences: &Preferences) -> Result<SubscriptionDiff> {
        self.inner
            .collaborators
            .preferences
            .save(preferences)
            .context("session: save preferences")?;
        Ok(self.inner.refresh_subscriptions())
    }

    /// Records a new bookmark for container inference. Returns what the popup
    /// should be opened with when the popup listener is active.
    pub fn on_bookmark_created(&self, id: &str, node: BookmarkNode) -> Option<PopupRequest> {
        if !node.is_bookmark() {
            return None;
        }
        self.inner.pending.lock().insert(id, node.clone());
        self.debouncer.schedule();

        if !self
            .inner
            .subscriptions
            .read()
            .is_active(Subscription::OpenPopupOnCreate)
        {
            return None;
        }
        match self.inner.popup_request(&node, false) {
            Ok(request) => request,
            Err(err) => {
                warn!(bookmark = id, error = %err, "failed to prepare popup");
                None
            }
        }
    }

    pub fn on_bookmark_changed(&self, id: &str, change: &BookmarkChange) {
        let mut pending = self.inner.pending.lock();
        if let Some(node) = pending.get_mut(id) {
            if let Some(title) = change.title.as_ref() {
                node.title = title.clone();
            }
            if let Some(url) = change.url.as_ref() {
                node.url = Some(url.clone());
            }
        }
    }

    pub fn on_bookmark_moved(&self, id: &str, moved: &BookmarkMove) {
        let mut pending = self.inner.pending.lock();
        if let Some(node) = pending.get_mut(id) {
            node.parent_id = Some(moved.parent_id.clone());
            if let Some(index) = moved.index {
                node.index = index;
            }
        }
    }

    /// Re-reads preferences after they changed outside this session.
    pub fn reload_preferences(&self) -> SubscriptionDiff {
        self.inner.refresh_subscriptions()
    }

    /// Blocking request hook. Uses the preferences from the latest read, so
    /// no store I/O happens while the browser holds the request.
    pub fn on_before_request(&self, details: &RequestDetails) -> BlockingResponse {
        let redirect_key = self.inner.last_known.read().redirect_key.clone();
        rewriter::on_before_request(details, &redirect_key)
    }

    /// Popup contents for editing an existing bookmark or folder.
    pub fn edit_request(&self, id: &str) -> Result<Option<PopupRequest>> {
        let Some(node) = self
            .inner
            .collaborators
            .bookmarks
            .get(id)
            .with_context(|| format!("session: look up bookmark {id}"))?
        else {
            return Ok(None);
        };
        self.inner.popup_request(&node, true)
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Runs container inference now instead of waiting for the debounce delay.
    pub fn flush(&self) -> Vec<PlannedUpdate> {
        self.debouncer.cancel();
        self.inner.fill_containers_from_tabs()
    }
}
