use bookmark_sentinel::types::errors::*;

// === StorageError Tests ===

#[test]
fn storage_error_display_variants() {
    assert_eq!(
        StorageError::Database("disk I/O error".to_string()).to_string(),
        "Storage database error: disk I/O error"
    );
    assert_eq!(
        StorageError::Serialization("trailing comma".to_string()).to_string(),
        "Storage serialization error: trailing comma"
    );
}

// === StoreError Tests ===

#[test]
fn store_error_not_found_display() {
    let err = StoreError::NotFound("bm-1".to_string());
    assert_eq!(err.to_string(), "Bookmark not found: bm-1");
}

#[test]
fn store_error_folder_not_found_display() {
    let err = StoreError::FolderNotFound("f-9".to_string());
    assert_eq!(err.to_string(), "Bookmark folder not found: f-9");
}

#[test]
fn store_error_other_variants_display() {
    assert_eq!(
        StoreError::Database("locked".to_string()).to_string(),
        "Bookmark database error: locked"
    );
    assert_eq!(
        StoreError::Rejected("read-only node".to_string()).to_string(),
        "Bookmark store rejected change: read-only node"
    );
}

#[test]
fn store_error_implements_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(StoreError::NotFound("id".to_string()));
    assert!(err.source().is_none());
}

// === SettingsError Tests ===

#[test]
fn settings_error_display_variants() {
    assert_eq!(
        SettingsError::Storage("gone".to_string()).to_string(),
        "Settings storage error: gone"
    );
    assert_eq!(
        SettingsError::Serialization("bad json".to_string()).to_string(),
        "Settings serialization error: bad json"
    );
    assert_eq!(
        SettingsError::InvalidKey("theme".to_string()).to_string(),
        "Invalid settings key: theme"
    );
    assert_eq!(
        SettingsError::InvalidValue("expected string".to_string()).to_string(),
        "Invalid settings value: expected string"
    );
}

#[test]
fn settings_error_from_storage_error() {
    let err: SettingsError = StorageError::Database("locked".to_string()).into();
    assert!(matches!(err, SettingsError::Storage(_)));
    assert!(err.to_string().contains("Storage database error: locked"));
}

// === ReportError Tests ===

#[test]
fn report_error_display() {
    let err = ReportError::InvalidUrl("not a url".to_string());
    assert_eq!(
        err.to_string(),
        "Could not generate safety report link for invalid URL: not a url"
    );
}

// === SessionError Tests ===

#[test]
fn session_error_wraps_store_error() {
    let err: SessionError = StoreError::NotFound("bm-2".to_string()).into();
    assert_eq!(err.to_string(), "Bookmark not found: bm-2");
    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.source().is_some());
}

#[test]
fn session_error_wraps_report_error() {
    let err: SessionError = ReportError::InvalidUrl("x".to_string()).into();
    assert!(matches!(err, SessionError::Report(_)));
    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.source().is_some());
}

#[test]
fn session_error_local_variants_display() {
    assert_eq!(
        SessionError::NotFound("bm-3".to_string()).to_string(),
        "Bookmark not in tree: bm-3"
    );
    assert_eq!(
        SessionError::NotABookmark("folder-1".to_string()).to_string(),
        "Node is not a bookmark: folder-1"
    );
    let boxed: Box<dyn std::error::Error> = Box::new(SessionError::NotFound("x".to_string()));
    assert!(boxed.source().is_none());
}
