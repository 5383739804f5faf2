//! Pure parsers for git's porcelain and listing formats.
//!
//! The snapshot builder feeds raw command output through these functions;
//! nothing here touches the filesystem.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{STALE_DAYS, is_protected_branch};

static TRACKING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?P<tracking>.+?)\]").expect("tracking regex"));
static AHEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ahead\s+(?P<count>\d+)").expect("ahead regex"));
static BEHIND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"behind\s+(?P<count>\d+)").expect("behind regex"));

/// One `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file (rename destination for renames).
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }

    fn index_code(&self) -> char {
        self.code.chars().next().unwrap_or(' ')
    }

    fn worktree_code(&self) -> char {
        self.code.chars().nth(1).unwrap_or(' ')
    }
}

/// Counts and paths reduced from a porcelain status listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub staged: u32,
    pub modified: u32,
    pub untracked: u32,
    pub ahead: u32,
    pub behind: u32,
    /// Sorted, deduplicated.
    pub changed_paths: Vec<String>,
}

impl StatusSummary {
    pub fn total_changed(&self) -> u32 {
        self.staged + self.modified + self.untracked
    }
}

/// Parse `git status --porcelain [--branch]` output.
///
/// An optional leading `## ...` header supplies ahead/behind counts from its
/// bracketed tracking section. A line may count as both staged and modified.
pub fn parse_porcelain_status(text: &str) -> StatusSummary {
    let mut summary = StatusSummary::default();
    let mut paths = BTreeSet::new();

    for line in text.lines() {
        if let Some(header) = line.strip_prefix("##") {
            let (ahead, behind) = parse_tracking_header(header);
            summary.ahead = ahead;
            summary.behind = behind;
            continue;
        }
        let Some(entry) = parse_status_line(line) else {
            continue;
        };
        if entry.is_untracked() {
            summary.untracked += 1;
        } else {
            if !matches!(entry.index_code(), ' ' | '?') {
                summary.staged += 1;
            }
            if entry.worktree_code() != ' ' {
                summary.modified += 1;
            }
        }
        if !entry.path.is_empty() {
            paths.insert(entry.path);
        }
    }

    summary.changed_paths = paths.into_iter().collect();
    summary
}

/// Extract `(ahead, behind)` from a branch header such as
/// `main...origin/main [ahead 2, behind 1]`.
pub fn parse_tracking_header(header: &str) -> (u32, u32) {
    let Some(caps) = TRACKING_RE.captures(header) else {
        return (0, 0);
    };
    let tracking = &caps["tracking"];
    let count = |re: &Regex| {
        re.captures(tracking)
            .and_then(|c| c["count"].parse::<u32>().ok())
            .unwrap_or(0)
    };
    (count(&AHEAD_RE), count(&BEHIND_RE))
}

/// Parse one porcelain line. Blank or malformed lines yield `None`.
pub fn parse_status_line(line: &str) -> Option<StatusEntry> {
    if line.trim().is_empty() {
        return None;
    }
    if let Some(path) = line.strip_prefix("??") {
        return Some(StatusEntry {
            code: "??".to_string(),
            path: unquote_path(path.trim()),
        });
    }
    let code: String = line.chars().take(2).collect();
    if code.chars().count() < 2 {
        return None;
    }
    let rest: String = line.chars().skip(3).collect();
    let rest = rest.trim();
    Some(StatusEntry {
        code,
        path: unquote_path(rename_destination(rest)),
    })
}

/// Destination half of `old -> new`. A quoted source may itself contain ` -> `.
fn rename_destination(rest: &str) -> &str {
    let source_end = if rest.starts_with('"') {
        quoted_len(rest).unwrap_or(0)
    } else {
        0
    };
    match rest[source_end..].find(" -> ") {
        Some(idx) => rest[source_end + idx + 4..].trim(),
        None => rest,
    }
}

/// Byte length of the leading `"..."` token, closing quote included.
fn quoted_len(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in text.char_indices().skip(1) {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(idx + 1),
            _ => {}
        }
    }
    None
}

/// Undo git's C-style path quoting (`"a b.txt"`, `"caf\303\251"`).
/// Unquoted input is returned as is.
pub fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };
    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some(digit @ '0'..='7') => {
                let mut value = digit.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push(u8::try_from(value).unwrap_or(u8::MAX));
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// First `(fetch)` remote from `git remote -v`.
pub fn parse_primary_remote(text: &str) -> Option<(String, String)> {
    text.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [name, url, kind, ..] if *kind == "(fetch)" => {
                Some(((*name).to_string(), (*url).to_string()))
            }
            _ => None,
        }
    })
}

/// Branches from `for-each-ref --format=%(refname:short)|%(committerdate:unix)`
/// whose last commit is at least [`STALE_DAYS`] old. Protected names excluded.
pub fn parse_stale_branches(text: &str, now_unix: i64) -> Vec<String> {
    let mut stale = BTreeSet::new();
    for line in text.lines() {
        let Some((name, ts)) = line.trim().split_once('|') else {
            continue;
        };
        if name.is_empty() || is_protected_branch(name) {
            continue;
        }
        let Ok(ts) = ts.trim().parse::<i64>() else {
            continue;
        };
        let age_days = (now_unix - ts).max(0) / 86_400;
        if age_days >= STALE_DAYS {
            stale.insert(name.to_string());
        }
    }
    stale.into_iter().collect()
}

/// Branches from `git branch --merged`, current-branch marker stripped.
pub fn parse_merged_branches(text: &str) -> Vec<String> {
    let mut merged = BTreeSet::new();
    for raw in text.lines() {
        let branch = raw.trim().trim_start_matches('*').trim();
        if branch.is_empty() || is_protected_branch(branch) {
            continue;
        }
        merged.insert(branch.to_string());
    }
    merged.into_iter().collect()
}
