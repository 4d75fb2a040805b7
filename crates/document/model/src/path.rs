//! Pointer paths
//!
//! Paths are absolute, `/`-separated pointers in the style of RFC 6901
//! (`~1` encodes `/`, `~0` encodes `~`). `/` addresses the root node.

use crate::ModelError;

/// The root pointer
pub const ROOT: &str = "/";

/// Split a pointer into decoded segments. `/` yields no segments.
pub fn segments(path: &str) -> Result<Vec<String>, ModelError> {
    if path.is_empty() || path == ROOT {
        return Ok(Vec::new());
    }
    if !path.starts_with('/') {
        return Err(ModelError::InvalidPath(path.to_string()));
    }
    Ok(path[1..]
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode)
        .collect())
}

/// Build a pointer from raw segments
pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&encode(segment.as_ref()));
    }
    out
}

/// Collapse duplicate and trailing separators and ensure a leading `/`
pub fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

/// Resolve `relative` against the node at `base`.
///
/// Contract paths are always scoped to their node, so a leading `/` in
/// `relative` still means "below `base`".
pub fn join(base: &str, relative: &str) -> String {
    let base = normalize(base);
    let relative = normalize(relative);
    if relative == ROOT {
        return base;
    }
    if base == ROOT {
        return relative;
    }
    format!("{}{}", base, relative)
}

/// True when `target` equals `root` or lies underneath it
pub fn is_inside(target: &str, root: &str) -> bool {
    let target = normalize(target);
    let root = normalize(root);
    if root == ROOT || target == root {
        return true;
    }
    target.starts_with(&root) && target.as_bytes().get(root.len()) == Some(&b'/')
}

/// Parent pointer, `None` for the root
pub fn parent(path: &str) -> Option<String> {
    let path = normalize(path);
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT.to_string()),
        Some(idx) => Some(path[..idx].to_string()),
        None => None,
    }
}

/// Number of segments below the root
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

/// Every pointer from the root down to `path`, root first
pub fn ancestors_inclusive(path: &str) -> Vec<String> {
    let path = normalize(path);
    let mut chain = vec![ROOT.to_string()];
    let mut current = String::new();
    for part in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(part);
        chain.push(current.clone());
    }
    chain
}

pub fn encode(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

pub fn decode(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
