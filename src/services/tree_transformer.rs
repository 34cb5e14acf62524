//! Converts the native bookmark tree into the typed in-memory tree.

use crate::services::tag_codec;
use crate::types::bookmark::{BookmarkItem, BookmarkNode, FolderNode, NativeNode};
use crate::types::verification::{LinkStatus, SafetyData};

/// Title given to folders the native store reports without one.
pub const UNNAMED_FOLDER: &str = "Unnamed Folder";

/// Transforms the native roots into the displayed top-level sequence.
///
/// A single top-level folder is treated as the synthetic root wrapper and
/// replaced by its children.
pub fn transform_tree(roots: &[NativeNode]) -> Vec<BookmarkNode> {
    let mut nodes: Vec<BookmarkNode> = roots.iter().filter_map(transform_node).collect();
    if nodes.len() == 1 {
        if let Some(BookmarkNode::Folder(_)) = nodes.first() {
            if let Some(BookmarkNode::Folder(root)) = nodes.pop() {
                return root.children;
            }
        }
    }
    nodes
}

/// Transforms one native node, or drops it when it is neither a bookmark nor
/// a folder.
pub fn transform_node(node: &NativeNode) -> Option<BookmarkNode> {
    if let Some(url) = node.url.as_deref().filter(|u| !u.is_empty()) {
        if !node.unmodifiable {
            let raw_title = node
                .title
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or(url);
            let (title, tags) = tag_codec::decode(raw_title);
            return Some(BookmarkNode::Bookmark(BookmarkItem {
                id: node.id.clone(),
                title,
                url: url.to_string(),
                tags,
                keyword: node.keyword.clone().filter(|k| !k.is_empty()),
                date_added: node.date_added,
                parent_id: node.parent_id.clone(),
                index: node.index,
                status: LinkStatus::Unchecked,
                safety: SafetyData::unknown(),
            }));
        }
    }

    let children = node.children.as_ref()?;
    Some(BookmarkNode::Folder(FolderNode {
        id: node.id.clone(),
        title: node
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNNAMED_FOLDER.to_string()),
        children: children.iter().filter_map(transform_node).collect(),
        date_added: node.date_added,
        parent_id: node.parent_id.clone(),
        index: node.index,
    }))
}
