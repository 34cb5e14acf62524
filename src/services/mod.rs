// Bookmark Sentinel services
// Services provide core functionality: tag codec, tree transformation, checkers, cache, settings.

pub mod clock;
pub mod kv_store;
pub mod safety_checker;
pub mod settings_engine;
pub mod status_checker;
pub mod tag_codec;
pub mod tree_transformer;
pub mod verification_cache;
