use super::*;

#[test]
fn severity_split() {
    assert_eq!(
        ToolError::validation("x").severity(),
        Severity::RespondToModel
    );
    assert_eq!(ToolError::not_found("x").severity(), Severity::RespondToModel);
    assert_eq!(
        ToolError::permission("x").severity(),
        Severity::RespondToModel
    );
    assert_eq!(ToolError::conflict("x").severity(), Severity::RespondToModel);
    assert_eq!(
        ToolError::already_locked("x").severity(),
        Severity::RespondToModel
    );
    assert_eq!(ToolError::transient("x").severity(), Severity::RespondToModel);
    assert_eq!(
        ToolError::Timeout { timeout_secs: 30 }.severity(),
        Severity::RespondToModel
    );
    assert_eq!(ToolError::Cancelled.severity(), Severity::RespondToModel);

    assert!(ToolError::sandbox("x").is_fatal());
    assert!(ToolError::system("x").is_fatal());
    assert!(ToolError::protocol("x").is_fatal());
}

#[test]
fn io_error_mapping() {
    let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "no file");
    assert!(matches!(
        ToolError::from(missing),
        ToolError::NotFound { .. }
    ));

    let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
    assert!(matches!(
        ToolError::from(denied),
        ToolError::Permission { .. }
    ));

    let other = std::io::Error::other("disk on fire");
    assert!(matches!(ToolError::from(other), ToolError::System { .. }));
}

#[test]
fn json_error_is_validation() {
    let err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
    let tool_err = ToolError::from(err);
    assert_eq!(tool_err.kind(), "validation");
    assert!(!tool_err.is_fatal());
}

#[test]
fn kind_labels() {
    assert_eq!(ToolError::Cancelled.kind(), "cancelled");
    assert_eq!(ToolError::sandbox("x").kind(), "sandbox");
    assert_eq!(ToolError::conflict("x").kind(), "conflict");
    assert_eq!(ToolError::already_locked("x").kind(), "already_locked");
    assert!(ToolError::Cancelled.is_cancelled());
}
