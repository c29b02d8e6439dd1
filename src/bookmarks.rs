use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec;

pub const ROOT_ID: &str = "root________";

#[derive(Debug, thiserror::Error)]
pub enum BookmarkError {
    #[error("bookmark {0} not found")]
    NotFound(String),
    #[error("bookmark parent {0} is not a folder")]
    ParentNotFolder(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Bookmark,
    Folder,
    Separator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
}

impl BookmarkNode {
    pub fn is_bookmark(&self) -> bool {
        self.node_type == NodeType::Bookmark
    }

    pub fn is_folder(&self) -> bool {
        self.node_type == NodeType::Folder
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

/// Fields reported by the browser's `onChanged` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Fields reported by the browser's `onMoved` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkMove {
    pub parent_id: String,
    #[serde(default)]
    pub index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl BookmarkUpdate {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

pub trait BookmarkStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<BookmarkNode>>;
    fn get_children(&self, id: &str) -> Result<Vec<BookmarkNode>>;
    /// Returns the root node with all descendants filled in.
    fn get_tree(&self) -> Result<Vec<BookmarkNode>>;
    fn update(&self, id: &str, update: BookmarkUpdate) -> Result<BookmarkNode>;
}

/// Probes whether `id` still exists. Store failures count as absent.
pub fn bookmark_exists(store: &dyn BookmarkStore, id: &str) -> bool {
    match store.get(id) {
        Ok(node) => node.is_some(),
        Err(err) => {
            warn!(bookmark = id, error = %err, "bookmark lookup failed");
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderOption {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FolderOption>>,
}

fn folder_option(node: &BookmarkNode) -> Option<FolderOption> {
    if !node.is_folder() {
        return None;
    }
    Some(FolderOption {
        id: node.id.clone(),
        name: node.title.clone(),
        children: node
            .children
            .as_ref()
            .map(|children| children.iter().filter_map(folder_option).collect()),
    })
}

/// Folder-only projection of the top-level folders under the tree root.
pub fn folder_options(tree: &[BookmarkNode]) -> Vec<FolderOption> {
    tree.first()
        .and_then(|root| root.children.as_ref())
        .map(|children| children.iter().filter_map(folder_option).collect())
        .unwrap_or_default()
}

/// What the popup needs to show and edit a bookmark or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkDetails {
    pub id: String,
    pub name: String,
    pub url: String,
    pub parent_id: Option<String>,
    pub container_id: String,
    pub is_folder: bool,
    pub is_edit: bool,
    pub children: Vec<BookmarkDetails>,
}

impl BookmarkDetails {
    /// Describes `node`, or returns `None` for nodes the popup cannot edit
    /// (separators, and folders outside of edit mode).
    pub fn describe(
        store: &dyn BookmarkStore,
        node: &BookmarkNode,
        is_edit: bool,
        redirect_key: &str,
    ) -> Result<Option<Self>> {
        let is_folder = match node.node_type {
            NodeType::Bookmark => false,
            NodeType::Folder if is_edit => true,
            _ => return Ok(None),
        };

        let mut children = Vec::new();
        let mut url = node.url().to_string();
        if is_folder {
            let nodes = store
                .get_children(&node.id)
                .with_context(|| format!("bookmarks: list children of {}", node.id))?;
            children = nodes
                .iter()
                .filter(|child| child.is_bookmark())
                .map(|child| Self::leaf(child, true, redirect_key))
                .collect::<Vec<_>>();
            if let Some(first) = children.first() {
                url = first.url.clone();
            }
        }

        Ok(Some(Self {
            container_id: codec::decode(&url, redirect_key),
            id: node.id.clone(),
            name: node.title.clone(),
            url,
            parent_id: node.parent_id.clone(),
            is_folder,
            is_edit,
            children,
        }))
    }

    fn leaf(node: &BookmarkNode, is_edit: bool, redirect_key: &str) -> Self {
        Self {
            id: node.id.clone(),
            name: node.title.clone(),
            url: node.url().to_string(),
            parent_id: node.parent_id.clone(),
            container_id: codec::decode(node.url(), redirect_key),
            is_folder: false,
            is_edit,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    node: BookmarkNode,
    children: Vec<String>,
}

/// Thread-safe in-memory bookmark tree.
pub struct MemoryBookmarkStore {
    entries: RwLock<HashMap<String, Entry>>,
    next_id: RwLock<u64>,
}

impl Default for MemoryBookmarkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBookmarkStore {
    pub fn new() -> Self {
        let root = BookmarkNode {
            id: ROOT_ID.to_string(),
            node_type: NodeType::Folder,
            date_added: Some(Utc::now()),
            ..BookmarkNode::default()
        };
        let mut entries = HashMap::new();
        entries.insert(
            ROOT_ID.to_string(),
            Entry {
                node: root,
                children: Vec::new(),
            },
        );
        Self {
            entries: RwLock::new(entries),
            next_id: RwLock::new(1),
        }
    }

    pub fn create_folder(&self, parent_id: &str, title: &str) -> Result<BookmarkNode> {
        self.insert(parent_id, title, None, NodeType::Folder)
    }

    pub fn create_bookmark(&self, parent_id: &str, title: &str, url: &str) -> Result<BookmarkNode> {
        self.insert(parent_id, title, Some(url.to_string()), NodeType::Bookmark)
    }

    fn insert(
        &self,
        parent_id: &str,
        title: &str,
        url: Option<String>,
        node_type: NodeType,
    ) -> Result<BookmarkNode> {
        let id = {
            let mut next = self.next_id.write();
            let id = format!("bm{:08}", *next);
            *next += 1;
            id
        };

        let mut entries = self.entries.write();
        let parent = entries
            .get_mut(parent_id)
            .ok_or_else(|| BookmarkError::NotFound(parent_id.to_string()))?;
        if !parent.node.is_folder() {
            return Err(BookmarkError::ParentNotFolder(parent_id.to_string()).into());
        }
        let node = BookmarkNode {
            id: id.clone(),
            parent_id: Some(parent_id.to_string()),
            index: parent.children.len(),
            title: title.to_string(),
            url,
            node_type,
            date_added: Some(Utc::now()),
            children: None,
        };
        parent.children.push(id.clone());
        entries.insert(
            id,
            Entry {
                node: node.clone(),
                children: Vec::new(),
            },
        );
        Ok(node)
    }

    fn snapshot(entries: &HashMap<String, Entry>, id: &str, recursive: bool) -> Option<BookmarkNode> {
        let entry = entries.get(id)?;
        let mut node = entry.node.clone();
        if node.is_folder() && recursive {
            node.children = Some(
                entry
                    .children
                    .iter()
                    .filter_map(|child| Self::snapshot(entries, child, true))
                    .collect(),
            );
        }
        Some(node)
    }

    fn reindex(entries: &mut HashMap<String, Entry>, parent_id: &str) {
        let children = match entries.get(parent_id) {
            Some(parent) => parent.children.clone(),
            None => return,
        };
        for (index, child) in children.iter().enumerate() {
            if let Some(entry) = entries.get_mut(child) {
                entry.node.index = index;
            }
        }
    }
}

impl BookmarkStore for MemoryBookmarkStore {
    fn get(&self, id: &str) -> Result<Option<BookmarkNode>> {
        Ok(self.entries.read().get(id).map(|entry| entry.node.clone()))
    }

    fn get_children(&self, id: &str) -> Result<Vec<BookmarkNode>> {
        let entries = self.entries.read();
        let entry = entries
            .get(id)
            .ok_or_else(|| BookmarkError::NotFound(id.to_string()))?;
        Ok(entry
            .children
            .iter()
            .filter_map(|child| Self::snapshot(&entries, child, false))
            .collect())
    }

    fn get_tree(&self) -> Result<Vec<BookmarkNode>> {
        let entries = self.entries.read();
        Ok(Self::snapshot(&entries, ROOT_ID, true).into_iter().collect())
    }

    fn update(&self, id: &str, update: BookmarkUpdate) -> Result<BookmarkNode> {
        let mut entries = self.entries.write();
        if !entries.contains_key(id) {
            return Err(BookmarkError::NotFound(id.to_string()).into());
        }

        if let Some(parent_id) = update.parent_id.as_deref() {
            match entries.get(parent_id) {
                Some(parent) if parent.node.is_folder() => {}
                Some(_) => return Err(BookmarkError::ParentNotFolder(parent_id.to_string()).into()),
                None => return Err(BookmarkError::NotFound(parent_id.to_string()).into()),
            }
            let old_parent = entries.get(id).and_then(|entry| entry.node.parent_id.clone());
            if old_parent.as_deref() != Some(parent_id) {
                if let Some(old) = old_parent.as_deref() {
                    if let Some(entry) = entries.get_mut(old) {
                        entry.children.retain(|child| child != id);
                    }
                    Self::reindex(&mut entries, old);
                }
                if let Some(parent) = entries.get_mut(parent_id) {
                    parent.children.push(id.to_string());
                }
                Self::reindex(&mut entries, parent_id);
            }
        }

        let entry = entries
            .get_mut(id)
            .ok_or_else(|| BookmarkError::NotFound(id.to_string()))?;
        if let Some(url) = update.url {
            entry.node.url = Some(url);
        }
        if let Some(title) = update.title {
            entry.node.title = title;
        }
        if let Some(parent_id) = update.parent_id {
            entry.node.parent_id = Some(parent_id);
        }
        Ok(entry.node.clone())
    }
}
