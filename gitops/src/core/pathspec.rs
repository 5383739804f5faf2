//! Pathspec validation for scoped staging.

use std::collections::HashSet;

/// Accepted and rejected pathspec entries, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedPathspec {
    pub accepted: Vec<String>,
    pub invalid: Vec<String>,
}

/// Validate caller-supplied pathspec entries.
///
/// Entries are trimmed and use `/` separators. Absolute paths and any `..`
/// segment are rejected. Duplicates keep their first occurrence.
pub fn normalize_pathspec<S: AsRef<str>>(entries: &[S]) -> NormalizedPathspec {
    let mut out = NormalizedPathspec::default();
    let mut seen = HashSet::new();
    for raw in entries {
        let value = raw.as_ref().trim();
        if value.is_empty() {
            continue;
        }
        let normalized = value.replace('\\', "/");
        if is_absolute(&normalized) || normalized.split('/').any(|segment| segment == "..") {
            out.invalid.push(value.to_string());
            continue;
        }
        if seen.insert(normalized.clone()) {
            out.accepted.push(normalized);
        }
    }
    out
}

fn is_absolute(path: &str) -> bool {
    if path.starts_with('/') {
        return true;
    }
    // Drive-letter paths such as `C:/repo`. `a:b.txt` is a relative name.
    matches!(path.as_bytes(), [drive, b':', b'/', ..] if drive.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_absolute_and_parent_segments() {
        let out = normalize_pathspec(&["/etc/passwd", "../x", "a/../b", "..", "C:\\temp", "ok.txt"]);
        assert_eq!(out.accepted, vec!["ok.txt".to_string()]);
        assert_eq!(
            out.invalid,
            vec!["/etc/passwd", "../x", "a/../b", "..", "C:\\temp"]
        );
    }

    #[test]
    fn dedupes_preserving_order_and_normalizes_separators() {
        let out = normalize_pathspec(&["b.txt", " a\\c.txt ", "b.txt", "", "a/c.txt"]);
        assert_eq!(out.accepted, vec!["b.txt".to_string(), "a/c.txt".to_string()]);
        assert!(out.invalid.is_empty());
    }

    #[test]
    fn colon_names_are_relative_unless_drive_rooted() {
        let out = normalize_pathspec(&["a:b.txt", "c:notes", "D:/x", "e:\\y"]);
        assert_eq!(out.accepted, vec!["a:b.txt", "c:notes"]);
        assert_eq!(out.invalid, vec!["D:/x", "e:\\y"]);
    }

    #[test]
    fn dotted_names_are_not_parent_segments() {
        let out = normalize_pathspec(&["..hidden", "dir/..rc", "./x"]);
        assert_eq!(out.accepted, vec!["..hidden", "dir/..rc", "./x"]);
    }

    #[test]
    fn revalidating_accepted_entries_is_a_no_op() {
        let cases: [&[&str]; 3] = [
            &["a.txt", "a.txt", "dir\\b.txt"],
            &["../nope", "src/lib.rs", " src/lib.rs "],
            &[],
        ];
        for case in cases {
            let first = normalize_pathspec(case);
            let second = normalize_pathspec(&first.accepted);
            assert_eq!(second.accepted, first.accepted);
            assert!(second.invalid.is_empty());
        }
    }
}
