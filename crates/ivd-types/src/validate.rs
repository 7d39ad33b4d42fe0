//! Boundary validation: timeline names, seal messages, workspace paths.
//!
//! Valid timeline names:
//! - 1 to 255 characters from `[A-Za-z0-9/_-]`
//! - Must not be a reserved ref name (HEAD, ORIG_HEAD, FETCH_HEAD, MERGE_HEAD)

use crate::error::TypeError;

/// Ref names that can never be timeline names.
pub const RESERVED_TIMELINE_NAMES: &[&str] = &["HEAD", "ORIG_HEAD", "FETCH_HEAD", "MERGE_HEAD"];

/// Maximum seal message length in characters.
pub const MAX_MESSAGE_CHARS: usize = 1000;

/// Validate a timeline name, returning `Ok(())` if valid.
pub fn validate_timeline_name(name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(TypeError::InvalidName {
            name: name.to_string(),
            reason: "timeline name must not be empty".into(),
        });
    }
    if name.len() > 255 {
        return Err(TypeError::InvalidName {
            name: name.to_string(),
            reason: "timeline name exceeds 255 characters".into(),
        });
    }
    for ch in name.chars() {
        if !(ch.is_ascii_alphanumeric() || matches!(ch, '/' | '_' | '-')) {
            return Err(TypeError::InvalidName {
                name: name.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
    }
    if RESERVED_TIMELINE_NAMES.contains(&name) {
        return Err(TypeError::InvalidName {
            name: name.to_string(),
            reason: "name is reserved".into(),
        });
    }
    Ok(())
}

/// Validate a seal message: at most 1000 characters, no control characters
/// other than TAB, LF, and CR.
pub fn validate_message(message: &str) -> Result<(), TypeError> {
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(TypeError::InvalidMessage(format!(
            "message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }
    for ch in message.chars() {
        if ch.is_control() && !matches!(ch, '\t' | '\n' | '\r') {
            return Err(TypeError::InvalidMessage(format!(
                "message contains control character {ch:?}"
            )));
        }
    }
    Ok(())
}

/// Normalize a workspace path to POSIX form and validate it.
///
/// Rejects absolute paths, `..` segments, NUL bytes, and empty paths.
/// Backslashes are converted to forward slashes; `.` segments and redundant
/// separators are dropped.
pub fn normalize_path(path: &str) -> Result<String, TypeError> {
    if path.is_empty() {
        return Err(TypeError::InvalidPath {
            path: path.to_string(),
            reason: "path must not be empty".into(),
        });
    }
    if path.contains('\0') {
        return Err(TypeError::InvalidPath {
            path: path.to_string(),
            reason: "path contains NUL".into(),
        });
    }
    let posix = path.replace('\\', "/");
    if posix.starts_with('/') || has_drive_prefix(&posix) {
        return Err(TypeError::InvalidPath {
            path: path.to_string(),
            reason: "path must be relative".into(),
        });
    }

    let mut components = Vec::new();
    for segment in posix.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(TypeError::InvalidPath {
                    path: path.to_string(),
                    reason: "path must not contain '..'".into(),
                })
            }
            other => components.push(other),
        }
    }
    if components.is_empty() {
        return Err(TypeError::InvalidPath {
            path: path.to_string(),
            reason: "path has no components".into(),
        });
    }
    Ok(components.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_timeline_names() {
        assert!(validate_timeline_name("main").is_ok());
        assert!(validate_timeline_name("feature/auth").is_ok());
        assert!(validate_timeline_name("fix_bug-123").is_ok());
    }

    #[test]
    fn reject_empty_timeline_name() {
        assert!(validate_timeline_name("").is_err());
    }

    #[test]
    fn reject_long_timeline_name() {
        assert!(validate_timeline_name(&"a".repeat(256)).is_err());
        assert!(validate_timeline_name(&"a".repeat(255)).is_ok());
    }

    #[test]
    fn reject_forbidden_timeline_chars() {
        assert!(validate_timeline_name("has space").is_err());
        assert!(validate_timeline_name("dot.name").is_err());
        assert!(validate_timeline_name("a~b").is_err());
    }

    #[test]
    fn reject_reserved_names() {
        for reserved in RESERVED_TIMELINE_NAMES {
            assert!(validate_timeline_name(reserved).is_err());
        }
        // Reserved matching is exact; a lowercase variant is a normal name.
        assert!(validate_timeline_name("head").is_ok());
    }

    #[test]
    fn valid_messages() {
        assert!(validate_message("").is_ok());
        assert!(validate_message("fix: handle empty tree\n\nDetails.").is_ok());
        assert!(validate_message("tab\there").is_ok());
    }

    #[test]
    fn reject_long_message() {
        assert!(validate_message(&"m".repeat(1001)).is_err());
        assert!(validate_message(&"m".repeat(1000)).is_ok());
    }

    #[test]
    fn reject_control_chars_in_message() {
        assert!(validate_message("bell\x07").is_err());
        assert!(validate_message("escape\x1b[0m").is_err());
    }

    #[test]
    fn normalize_simple_path() {
        assert_eq!(normalize_path("a/b/c.txt").unwrap(), "a/b/c.txt");
        assert_eq!(normalize_path("./a//b/").unwrap(), "a/b");
        assert_eq!(normalize_path("a\\b").unwrap(), "a/b");
    }

    #[test]
    fn reject_absolute_paths() {
        assert!(normalize_path("/etc/passwd").is_err());
        assert!(normalize_path("C:/windows").is_err());
    }

    #[test]
    fn reject_parent_traversal() {
        assert!(normalize_path("../outside").is_err());
        assert!(normalize_path("a/../../b").is_err());
    }

    #[test]
    fn reject_empty_and_nul() {
        assert!(normalize_path("").is_err());
        assert!(normalize_path(".").is_err());
        assert!(normalize_path("a\0b").is_err());
    }
}
