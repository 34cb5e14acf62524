//! Bookmark Sentinel: bookmark verification and caching.
//!
//! Checks every bookmark for reachability and for a third-party safety verdict,
//! caches results durably for a day, and keeps an in-memory tree that a
//! presentation layer can filter, search, edit and delete from.

pub mod app;
pub mod database;
pub mod logging;
pub mod managers;
pub mod services;
pub mod types;
