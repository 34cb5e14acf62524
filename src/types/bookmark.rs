use serde::{Deserialize, Serialize};

use super::verification::{LinkStatus, SafetyData};

/// A node as reported by the native bookmark store, before transformation.
///
/// A node with a `url` is a bookmark; a node with `children` (even empty) is a
/// folder. Anything else is dropped by the transformer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeNode {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<NativeNode>>,
    #[serde(default)]
    pub date_added: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub unmodifiable: bool,
}

/// Typed in-memory tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BookmarkNode {
    Folder(FolderNode),
    Bookmark(BookmarkItem),
}

impl BookmarkNode {
    pub fn id(&self) -> &str {
        match self {
            BookmarkNode::Folder(folder) => &folder.id,
            BookmarkNode::Bookmark(item) => &item.id,
        }
    }

    pub fn as_bookmark(&self) -> Option<&BookmarkItem> {
        match self {
            BookmarkNode::Bookmark(item) => Some(item),
            BookmarkNode::Folder(_) => None,
        }
    }
}

/// A folder and its children in native sibling order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub id: String,
    pub title: String,
    pub children: Vec<BookmarkNode>,
    pub date_added: Option<i64>,
    pub parent_id: Option<String>,
    pub index: Option<u32>,
}

/// A bookmark with its derived verification state.
///
/// `status` and `safety` never reach the native store; they live in the
/// in-memory tree and the verification cache only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkItem {
    pub id: String,
    /// Display title with the leading `[tag]` run stripped.
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub keyword: Option<String>,
    pub date_added: Option<i64>,
    pub parent_id: Option<String>,
    pub index: Option<u32>,
    pub status: LinkStatus,
    pub safety: SafetyData,
}

impl BookmarkItem {
    /// Clears derived verification state, as required after a URL change.
    pub fn reset_verification(&mut self) {
        self.status = LinkStatus::Unchecked;
        self.safety = SafetyData::unknown();
    }
}

/// Fields accepted by the native store's `update`.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkChanges {
    /// Raw title, tags already encoded.
    pub title: String,
    pub url: String,
    pub keyword: Option<String>,
}

/// Fields accepted by the native store's `create`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateDetails {
    pub parent_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub index: Option<u32>,
}

/// A user edit as issued by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkEdit {
    pub title: String,
    pub url: String,
    pub tags: Vec<String>,
    pub keyword: Option<String>,
}

/// Change notification from the native store. Carries no payload beyond
/// "something changed, reload".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Created,
    Removed,
    Changed,
    Moved,
}
