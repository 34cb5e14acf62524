use std::fmt;

// === StorageError ===

/// Errors from the persistent key-value store.
#[derive(Debug)]
pub enum StorageError {
    /// The backing database rejected the operation.
    Database(String),
    /// A stored blob could not be encoded or decoded.
    Serialization(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Database(msg) => write!(f, "Storage database error: {}", msg),
            StorageError::Serialization(msg) => {
                write!(f, "Storage serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for StorageError {}

// === StoreError ===

/// Errors from the native bookmark store adapter.
#[derive(Debug)]
pub enum StoreError {
    /// Bookmark or folder with the given ID was not found.
    NotFound(String),
    /// The target parent folder was not found.
    FolderNotFound(String),
    /// Database operation failed.
    Database(String),
    /// The store refused the change.
    Rejected(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
            StoreError::FolderNotFound(id) => write!(f, "Bookmark folder not found: {}", id),
            StoreError::Database(msg) => write!(f, "Bookmark database error: {}", msg),
            StoreError::Rejected(msg) => write!(f, "Bookmark store rejected change: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// The key-value store failed while reading or writing settings.
    Storage(String),
    /// Failed to serialize or deserialize settings.
    Serialization(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Storage(msg) => write!(f, "Settings storage error: {}", msg),
            SettingsError::Serialization(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => write!(f, "Invalid settings value: {}", msg),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<StorageError> for SettingsError {
    fn from(err: StorageError) -> Self {
        SettingsError::Storage(err.to_string())
    }
}

// === ReportError ===

/// Errors raised while building a safety report link.
#[derive(Debug)]
pub enum ReportError {
    /// The bookmark URL has no parseable hostname.
    InvalidUrl(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::InvalidUrl(url) => {
                write!(f, "Could not generate safety report link for invalid URL: {}", url)
            }
        }
    }
}

impl std::error::Error for ReportError {}

// === SessionError ===

/// Errors surfaced by the bookmark session to the presentation layer.
#[derive(Debug)]
pub enum SessionError {
    /// The native store rejected or failed the operation.
    Store(StoreError),
    /// No node with the given ID is in the current tree.
    NotFound(String),
    /// The node exists but is a folder.
    NotABookmark(String),
    /// A safety report link could not be built.
    Report(ReportError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Store(err) => write!(f, "{}", err),
            SessionError::NotFound(id) => write!(f, "Bookmark not in tree: {}", id),
            SessionError::NotABookmark(id) => write!(f, "Node is not a bookmark: {}", id),
            SessionError::Report(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Store(err) => Some(err),
            SessionError::Report(err) => Some(err),
            SessionError::NotFound(_) | SessionError::NotABookmark(_) => None,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}

impl From<ReportError> for SessionError {
    fn from(err: ReportError) -> Self {
        SessionError::Report(err)
    }
}
