use crate::error::{Error, Result};

/// Checks that a node path is absolute, has no empty components and no
/// trailing slash. `/` itself is valid.
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::invalid_path(path, "path is empty"));
    }
    if !path.starts_with('/') {
        return Err(Error::invalid_path(path, "path must start with /"));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(Error::invalid_path(path, "path must not end with /"));
    }
    if path.contains('\0') {
        return Err(Error::invalid_path(path, "path contains a null character"));
    }
    for name in path[1..].split('/') {
        match name {
            "" => return Err(Error::invalid_path(path, "empty path component")),
            "." | ".." => {
                return Err(Error::invalid_path(path, "relative path component"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Parent of a node path; the parent of `/` is `/`.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

/// Final component of a node path, empty for `/`.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Joins a child name onto a node path.
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Every proper ancestor of `path` except `/`, ordered root to leaf.
///
/// `/a/b/c` yields `/a`, `/a/b`.
pub fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .map(|(pos, _)| &path[..pos])
        .filter(|p| !p.is_empty())
        .collect()
}
