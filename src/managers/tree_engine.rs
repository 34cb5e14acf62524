//! Tree merge and filter engine.
//!
//! Every tree operation is built on two primitives: [`rebuild`], which walks
//! the tree and lets a per-node decision keep, replace or drop each node, and
//! [`visit`], a read-only depth-first walk. Merges return a new
//! tree; nodes they do not touch are cloned unchanged.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::types::bookmark::{BookmarkItem, BookmarkNode, FolderNode};
use crate::types::verification::{LinkStatus, SafetyData, SafetyStatus};

/// Outcome of the per-node decision in [`rebuild`].
pub enum Decision {
    /// Keep the node. A kept folder is walked.
    Keep,
    /// Replace a bookmark. A folder is kept and walked as with `Keep`.
    Replace(BookmarkItem),
    /// Drop the node, and for a folder everything beneath it.
    Drop,
}

/// How [`rebuild`] treats folders left empty after their children are decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyFolders {
    Keep,
    Prune,
}

/// Visit-and-rebuild over the whole tree. Folder order and nesting are preserved.
pub fn rebuild<F>(nodes: &[BookmarkNode], empty: EmptyFolders, decide: &mut F) -> Vec<BookmarkNode>
where
    F: FnMut(&BookmarkNode) -> Decision,
{
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let decision = decide(node);
        if matches!(decision, Decision::Drop) {
            continue;
        }
        match node {
            BookmarkNode::Bookmark(_) => match decision {
                Decision::Replace(updated) => out.push(BookmarkNode::Bookmark(updated)),
                _ => out.push(node.clone()),
            },
            BookmarkNode::Folder(folder) => {
                let children = rebuild(&folder.children, empty, decide);
                if empty == EmptyFolders::Prune && children.is_empty() {
                    continue;
                }
                out.push(BookmarkNode::Folder(FolderNode {
                    children,
                    ..folder_header(folder)
                }));
            }
        }
    }
    out
}

fn folder_header(folder: &FolderNode) -> FolderNode {
    FolderNode {
        id: folder.id.clone(),
        title: folder.title.clone(),
        children: Vec::new(),
        date_added: folder.date_added,
        parent_id: folder.parent_id.clone(),
        index: folder.index,
    }
}

/// Depth-first, pre-order walk over every node.
pub fn visit<'a, F>(nodes: &'a [BookmarkNode], f: &mut F)
where
    F: FnMut(&'a BookmarkNode),
{
    for node in nodes {
        f(node);
        if let BookmarkNode::Folder(folder) = node {
            visit(&folder.children, f);
        }
    }
}

/// Updates the bookmark with `id` through `update`. Absent ids are a no-op.
pub fn update_bookmark<F>(nodes: &[BookmarkNode], id: &str, mut update: F) -> Vec<BookmarkNode>
where
    F: FnMut(&mut BookmarkItem),
{
    rebuild(nodes, EmptyFolders::Keep, &mut |node| match node {
        BookmarkNode::Bookmark(item) if item.id == id => {
            let mut updated = item.clone();
            update(&mut updated);
            Decision::Replace(updated)
        }
        _ => Decision::Keep,
    })
}

pub fn merge_status(nodes: &[BookmarkNode], id: &str, status: LinkStatus) -> Vec<BookmarkNode> {
    update_bookmark(nodes, id, |item| item.status = status)
}

pub fn merge_safety(nodes: &[BookmarkNode], id: &str, safety: &SafetyData) -> Vec<BookmarkNode> {
    update_bookmark(nodes, id, |item| item.safety = safety.clone())
}

/// [`merge_status`] that applies only while the bookmark still points at `url`.
pub fn merge_status_for(nodes: &[BookmarkNode], id: &str, url: &str, status: LinkStatus) -> Vec<BookmarkNode> {
    update_bookmark(nodes, id, |item| {
        if item.url == url {
            item.status = status;
        }
    })
}

/// [`merge_safety`] that applies only while the bookmark still points at `url`.
pub fn merge_safety_for(nodes: &[BookmarkNode], id: &str, url: &str, safety: &SafetyData) -> Vec<BookmarkNode> {
    update_bookmark(nodes, id, |item| {
        if item.url == url {
            item.safety = safety.clone();
        }
    })
}

/// Removes the node with `id`, folder or bookmark.
pub fn remove_node(nodes: &[BookmarkNode], id: &str) -> Vec<BookmarkNode> {
    rebuild(nodes, EmptyFolders::Keep, &mut |node| {
        if node.id() == id {
            Decision::Drop
        } else {
            Decision::Keep
        }
    })
}

/// Keeps a bookmark iff both predicates hold; keeps a folder iff something
/// survives beneath it.
pub fn filter_tree<F, S>(nodes: &[BookmarkNode], filter: F, search: S) -> Vec<BookmarkNode>
where
    F: Fn(&BookmarkItem) -> bool,
    S: Fn(&BookmarkItem) -> bool,
{
    rebuild(nodes, EmptyFolders::Prune, &mut |node| match node {
        BookmarkNode::Bookmark(item) if !(filter(item) && search(item)) => Decision::Drop,
        _ => Decision::Keep,
    })
}

pub fn find_node<'a>(nodes: &'a [BookmarkNode], id: &str) -> Option<&'a BookmarkNode> {
    let mut found = None;
    visit(nodes, &mut |node| {
        if found.is_none() && node.id() == id {
            found = Some(node);
        }
    });
    found
}

pub fn find_bookmark<'a>(nodes: &'a [BookmarkNode], id: &str) -> Option<&'a BookmarkItem> {
    find_node(nodes, id).and_then(BookmarkNode::as_bookmark)
}

/// All bookmarks in traversal order.
pub fn collect_bookmarks(nodes: &[BookmarkNode]) -> Vec<&BookmarkItem> {
    let mut items = Vec::new();
    visit(nodes, &mut |node| {
        if let BookmarkNode::Bookmark(item) = node {
            items.push(item);
        }
    });
    items
}

pub fn count_bookmarks(nodes: &[BookmarkNode]) -> usize {
    collect_bookmarks(nodes).len()
}

/// Maps each folder id to its display path, e.g. `"Work / Docs"`.
pub fn folder_paths(nodes: &[BookmarkNode]) -> HashMap<String, String> {
    fn walk(nodes: &[BookmarkNode], prefix: &str, out: &mut HashMap<String, String>) {
        for node in nodes {
            if let BookmarkNode::Folder(folder) = node {
                let path = if prefix.is_empty() {
                    folder.title.clone()
                } else {
                    format!("{} / {}", prefix, folder.title)
                };
                walk(&folder.children, &path, out);
                out.insert(folder.id.clone(), path);
            }
        }
    }
    let mut out = HashMap::new();
    walk(nodes, "", &mut out);
    out
}

/// Groups of bookmarks sharing an exact URL, for URLs seen more than once.
pub fn find_duplicates(nodes: &[BookmarkNode]) -> BTreeMap<String, Vec<String>> {
    let mut by_url: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in collect_bookmarks(nodes) {
        by_url.entry(item.url.clone()).or_default().push(item.id.clone());
    }
    by_url.retain(|_, ids| ids.len() > 1);
    by_url
}

/// Preset status filters offered by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkFilter {
    All,
    Live,
    /// Dead or parked.
    Dead,
    Unchecked,
    Safe,
    Unsafe,
    Warning,
}

impl BookmarkFilter {
    pub fn matches(self, item: &BookmarkItem) -> bool {
        match self {
            BookmarkFilter::All => true,
            BookmarkFilter::Live => item.status == LinkStatus::Live,
            BookmarkFilter::Dead => matches!(item.status, LinkStatus::Dead | LinkStatus::Parked),
            BookmarkFilter::Unchecked => item.status == LinkStatus::Unchecked,
            BookmarkFilter::Safe => item.safety.status == SafetyStatus::Safe,
            BookmarkFilter::Unsafe => item.safety.status == SafetyStatus::Unsafe,
            BookmarkFilter::Warning => item.safety.status == SafetyStatus::Warning,
        }
    }
}

/// Case-insensitive match against title, URL, keyword and tags. An empty
/// term matches everything.
pub fn matches_search(item: &BookmarkItem, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let term = term.to_lowercase();
    item.title.to_lowercase().contains(&term)
        || item.url.to_lowercase().contains(&term)
        || item
            .keyword
            .as_deref()
            .is_some_and(|k| k.to_lowercase().contains(&term))
        || item.tags.iter().any(|tag| tag.to_lowercase().contains(&term))
}

/// The in-memory tree shared by the scheduler and the session.
///
/// Every mutation is a read-snapshot/produce-new-tree step under one lock, so
/// concurrent merges serialize and the last writer wins per field.
#[derive(Debug, Default)]
pub struct TreeState {
    nodes: Mutex<Vec<BookmarkNode>>,
}

impl TreeState {
    pub fn new(nodes: Vec<BookmarkNode>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
        }
    }

    pub fn snapshot(&self) -> Vec<BookmarkNode> {
        self.lock().clone()
    }

    pub fn replace(&self, nodes: Vec<BookmarkNode>) {
        *self.lock() = nodes;
    }

    /// Applies `f` to the current tree and stores its result.
    pub fn apply<F>(&self, f: F)
    where
        F: FnOnce(&[BookmarkNode]) -> Vec<BookmarkNode>,
    {
        let mut nodes = self.lock();
        let next = f(&nodes);
        *nodes = next;
    }

    pub fn bookmark(&self, id: &str) -> Option<BookmarkItem> {
        find_bookmark(&self.lock(), id).cloned()
    }

    pub fn merge_status(&self, id: &str, status: LinkStatus) {
        self.apply(|nodes| merge_status(nodes, id, status));
    }

    pub fn merge_safety(&self, id: &str, safety: &SafetyData) {
        self.apply(|nodes| merge_safety(nodes, id, safety));
    }

    /// Merges a status computed for `url`; a no-op once the bookmark's URL changed.
    pub fn merge_status_for(&self, id: &str, url: &str, status: LinkStatus) {
        self.apply(|nodes| merge_status_for(nodes, id, url, status));
    }

    /// Merges a verdict computed for `url`; a no-op once the bookmark's URL changed.
    pub fn merge_safety_for(&self, id: &str, url: &str, safety: &SafetyData) {
        self.apply(|nodes| merge_safety_for(nodes, id, url, safety));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BookmarkNode>> {
        self.nodes.lock().unwrap_or_else(|p| p.into_inner())
    }
}
