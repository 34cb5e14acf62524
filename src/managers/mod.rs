// Bookmark Sentinel state managers
// Managers own stateful operations: the native store adapter, the in-memory tree,
// verification scheduling and the bookmark session.

pub mod bookmark_session;
pub mod bookmark_store;
pub mod tree_engine;
pub mod verification_scheduler;
