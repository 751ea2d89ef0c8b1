//! Common parent directory of a commit's changed paths

/// Deepest directory (with a trailing `/`) that every path in `paths` lives
/// under. Returns `/` for an empty input or when nothing is shared.
pub fn common_parent<S: AsRef<str>>(paths: &[S]) -> String {
    let mut top = String::from("/");
    for path in paths {
        let path = path.as_ref();
        if top != "/" && path.starts_with(&top) {
            continue;
        }
        for candidate in directory_prefixes(path) {
            if candidate.len() <= top.len() {
                continue;
            }
            if paths.iter().all(|p| p.as_ref().starts_with(candidate)) {
                top = candidate.to_string();
            } else {
                break;
            }
        }
    }
    top
}

/// Directory prefixes of `path`, shallowest first, each ending in `/`.
/// The final segment is a file name and never yields a prefix.
fn directory_prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/')
        .map(move |(idx, _)| &path[..=idx])
        .filter(|prefix| *prefix != "/")
}
