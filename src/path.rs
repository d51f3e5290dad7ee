//! Path grammar: splitting and `~`-expansion. Walking directory blocks to
//! resolve segments to inode ids lives on [`crate::fs::FileSystem`], since it
//! needs access to the inode table.

/// Expands a leading `~` into `/home/<username>`, then splits on `/`,
/// discarding empty segments (so `.`/`..`/trailing slashes all fall out
/// naturally as ordinary segments, and repeated slashes collapse).
pub fn split(path: &str, home_username: &str) -> (bool, Vec<String>) {
    let expanded;
    let path = if let Some(rest) = path.strip_prefix('~') {
        expanded = format!("/home/{home_username}{rest}");
        expanded.as_str()
    } else {
        path
    };
    let absolute = path.starts_with('/');
    let segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (absolute, segments)
}

/// Splits a path into its parent (everything but the last segment, as a
/// string usable with [`split`] again) and its basename.
pub fn split_parent_name(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) if !parent.is_empty() => (parent, name),
        Some((_, name)) => ("/", name),
        None => ("", trimmed),
    }
}
