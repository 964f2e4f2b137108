//! Helpers for the remote store's `/`-separated absolute paths.
//!
//! Remote paths are plain strings, not [`std::path::Path`]: the store always
//! uses `/` regardless of the client platform.

use crate::entry::PathNode;
use crate::error::ValidationError;
use crate::MAX_NAME_LEN;

/// The root path.
pub const ROOT: &str = "/";

/// Join a directory path and an entry name.
///
/// ```
/// use cumulus_core::path::join;
/// assert_eq!(join("/", "a"), "/a");
/// assert_eq!(join("/docs/", "a"), "/docs/a");
/// ```
pub fn join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    format!("{base}/{name}")
}

/// Last component of a path (`""` for the root).
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Parent directory of a path. The root is its own parent.
pub fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &trimmed[..idx],
    }
}

/// Check whether `path` equals `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return path.starts_with('/');
    }
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Rewrite `path` so that its `from` prefix becomes `to`.
///
/// Returns `None` if `path` is not within `from`.
pub fn rebase(path: &str, from: &str, to: &str) -> Option<String> {
    if path == from {
        return Some(to.to_string());
    }
    if !is_within(path, from) {
        return None;
    }
    let rest = &path[from.trim_end_matches('/').len()..];
    Some(format!("{}{}", to.trim_end_matches('/'), rest))
}

/// Build the breadcrumb trail for a directory path.
pub fn breadcrumbs(path: &str) -> Vec<PathNode> {
    let mut nodes = Vec::new();
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        nodes.push(PathNode {
            name: part.to_string(),
            path: current.clone(),
        });
    }
    nodes
}

/// Validate and normalize a user-typed navigation path.
///
/// The input is trimmed, must be absolute and must not contain runs of
/// whitespace. Trailing slashes are removed (the root stays `/`).
pub fn normalize(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if !value.starts_with('/') {
        return Err(ValidationError::RelativePath {
            suggestion: format!("/{value}"),
        });
    }
    let mut previous_space = false;
    for c in value.chars() {
        let space = c.is_whitespace();
        if space && previous_space {
            return Err(ValidationError::RepeatedWhitespace);
        }
        previous_space = space;
    }
    let normalized = value.trim_end_matches('/');
    Ok(if normalized.is_empty() {
        ROOT.to_string()
    } else {
        normalized.to_string()
    })
}

/// Validate a single entry name (new directory, rename target).
///
/// Rejects empty names, `.` and `..`, names containing `/` or `\`, and
/// names longer than [`MAX_NAME_LEN`] bytes. Surrounding whitespace is
/// ignored.
pub fn validate_name(name: &str) -> Result<&str, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name == "." || name == ".." {
        return Err(ValidationError::ReservedName(name.to_string()));
    }
    if let Some(c) = name.chars().find(|c| *c == '/' || *c == '\\') {
        return Err(ValidationError::ContainsSeparator(c));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong { len: name.len() });
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent("/a/b/c"), "/a/b");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/"), "/");
        assert_eq!(file_name("/a/b/c"), "c");
        assert_eq!(file_name("/"), "");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a", "/a"));
        assert!(!is_within("/ab", "/a"));
        assert!(is_within("/anything", "/"));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase("/a/b/c", "/a", "/x").as_deref(), Some("/x/b/c"));
        assert_eq!(rebase("/a", "/a", "/x").as_deref(), Some("/x"));
        assert_eq!(rebase("/b", "/a", "/x"), None);
    }

    #[test]
    fn test_breadcrumbs() {
        let crumbs = breadcrumbs("/docs/2026");
        assert_eq!(crumbs.len(), 2);
        assert_eq!(crumbs[1].path, "/docs/2026");
        assert!(breadcrumbs("/").is_empty());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  /docs/ ").unwrap(), "/docs");
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("///").unwrap(), "/");
        assert!(matches!(
            normalize("docs"),
            Err(ValidationError::RelativePath { suggestion }) if suggestion == "/docs"
        ));
        assert!(matches!(normalize("/a  b"), Err(ValidationError::RepeatedWhitespace)));
        assert!(matches!(normalize("  "), Err(ValidationError::EmptyPath)));
    }
}
