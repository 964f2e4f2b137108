use chrono::{TimeZone, Utc};
use cumulus_core::path::{self, validate_name};
use cumulus_core::{
    DirectoryListing, EntryKind, FileEntry, PortError, PortErrorKind, SessionConfig,
    ValidationError,
};

#[test]
fn test_directory_name_validation() {
    assert!(matches!(validate_name(""), Err(ValidationError::EmptyName)));
    assert!(matches!(validate_name("."), Err(ValidationError::ReservedName(_))));
    assert!(matches!(validate_name(".."), Err(ValidationError::ReservedName(_))));
    assert!(matches!(
        validate_name("a/b"),
        Err(ValidationError::ContainsSeparator('/'))
    ));
    assert!(matches!(
        validate_name("a\\b"),
        Err(ValidationError::ContainsSeparator('\\'))
    ));
    assert_eq!(validate_name("archive-2026"), Ok("archive-2026"));
}

#[test]
fn test_name_validation_trims_and_limits_length() {
    assert_eq!(validate_name("  photos "), Ok("photos"));
    assert!(matches!(validate_name("   "), Err(ValidationError::EmptyName)));

    let long = "x".repeat(256);
    assert!(matches!(
        validate_name(&long),
        Err(ValidationError::TooLong { len: 256 })
    ));
}

#[test]
fn test_listing_breadcrumbs_follow_path() {
    let when = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let listing = DirectoryListing::new(
        "/photos/2026",
        vec![FileEntry::file("/photos/2026/beach.jpg", 2048, when)],
    );

    let names: Vec<_> = listing.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["photos", "2026"]);
    assert_eq!(listing.len(), 1);
    assert!(listing.contains("beach.jpg"));
    assert!(!listing.contains("missing.jpg"));
}

#[test]
fn test_entry_kind_serialization() {
    let json = serde_json::to_string(&EntryKind::Directory).unwrap();
    assert_eq!(json, "\"DIRECTORY\"");

    let when = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let entry = FileEntry::directory("/photos", when);
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["type"], "DIRECTORY");
    assert_eq!(value["name"], "photos");
    assert!(value.get("lastModified").is_some());
}

#[test]
fn test_port_error_classification() {
    let err = PortError::already_exists("/.trash");
    assert!(err.is_already_exists());
    assert!(!err.is_retryable());

    let err = PortError::new(PortErrorKind::Network, "connection reset");
    assert_eq!(err.to_string(), "connection reset");
}

#[test]
fn test_path_join_round_trip() {
    let joined = path::join("/photos", "beach.jpg");
    assert_eq!(path::parent(&joined), "/photos");
    assert_eq!(path::file_name(&joined), "beach.jpg");
}

#[test]
fn test_session_config_trash_layout() {
    let config = SessionConfig::builder()
        .trash_path("/system/bin")
        .build()
        .unwrap();
    assert_eq!(config.trash_name(), "bin");
    assert_eq!(config.trash_parent(), "/system");
}
