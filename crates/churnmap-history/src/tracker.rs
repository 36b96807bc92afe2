//! Rename-chain resolution.
//!
//! Git reports renamed files in numstat notation, either whole-path
//! (`old/a.rs => new/b.rs`) or bracketed (`src/{old => new}/lib.rs`).
//! [`FileTracker`] collects those expressions across a batch of commits and
//! resolves any historical path to the name it is currently known by.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

const ARROW: &str = " => ";

/// Split a rename expression into `(before, after)` paths.
///
/// Returns `None` for plain paths.
///
/// # Examples
///
/// ```
/// use churnmap_history::tracker::parse_rename;
///
/// assert_eq!(
///     parse_rename("docs/a.md => b.md"),
///     Some(("docs/a.md".to_string(), "b.md".to_string()))
/// );
/// assert_eq!(
///     parse_rename("src/{old => new}/lib.rs"),
///     Some(("src/old/lib.rs".to_string(), "src/new/lib.rs".to_string()))
/// );
/// assert_eq!(parse_rename("src/lib.rs"), None);
/// ```
pub fn parse_rename(expression: &str) -> Option<(String, String)> {
    parse_simple(expression).or_else(|| parse_bracketed(expression))
}

fn is_fragment(text: &str) -> bool {
    !text.contains(['{', '}', '=', '>'])
}

fn parse_simple(expression: &str) -> Option<(String, String)> {
    let (before, after) = expression.split_once(ARROW)?;
    if is_fragment(before) && is_fragment(after) {
        Some((before.to_string(), after.to_string()))
    } else {
        None
    }
}

fn parse_bracketed(expression: &str) -> Option<(String, String)> {
    let (prefix, rest) = expression.split_once('{')?;
    let (inner, suffix) = rest.split_once('}')?;
    let (before, after) = inner.split_once(ARROW)?;
    if ![prefix, before, after, suffix].iter().all(|s| is_fragment(s)) {
        return None;
    }
    Some((
        join_path(prefix, before, suffix),
        join_path(prefix, after, suffix),
    ))
}

// `src/{ => sub}/a.rs` has an empty side; collapse the doubled separator.
fn join_path(prefix: &str, middle: &str, suffix: &str) -> String {
    let joined = format!("{prefix}{middle}{suffix}");
    if middle.is_empty() {
        joined.replacen("//", "/", 1)
    } else {
        joined
    }
}

/// Render a rename in git's numstat notation.
///
/// A shared leading directory and a shared trailing path are factored out
/// into the bracketed form; otherwise the whole-path form is used.
///
/// # Examples
///
/// ```
/// use churnmap_history::tracker::{parse_rename, rename_expression};
///
/// let expr = rename_expression("src/old/lib.rs", "src/new/lib.rs");
/// assert_eq!(expr, "src/{old => new}/lib.rs");
/// assert_eq!(rename_expression("a.rs", "b.rs"), "a.rs => b.rs");
/// assert_eq!(
///     parse_rename(&expr),
///     Some(("src/old/lib.rs".into(), "src/new/lib.rs".into()))
/// );
/// ```
pub fn rename_expression(before: &str, after: &str) -> String {
    let a = before.as_bytes();
    let b = after.as_bytes();

    let mut prefix = 0;
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        if x != y {
            break;
        }
        if *x == b'/' {
            prefix = i + 1;
        }
    }

    let mut suffix = 0;
    let room = (a.len() - prefix).min(b.len() - prefix);
    for i in 1..=room {
        let x = a[a.len() - i];
        if x != b[b.len() - i] {
            break;
        }
        if x == b'/' {
            suffix = i;
        }
    }

    if prefix == 0 && suffix == 0 {
        return format!("{before}{ARROW}{after}");
    }
    format!(
        "{}{{{}{ARROW}{}}}{}",
        &before[..prefix],
        &before[prefix..before.len() - suffix],
        &after[prefix..after.len() - suffix],
        &before[before.len() - suffix..],
    )
}

/// Maps historical file paths to their most recent names.
///
/// Built once per batch from the chronological list of per-file path
/// expressions, then read-only.
///
/// # Examples
///
/// ```
/// use churnmap_history::tracker::FileTracker;
///
/// let tracker = FileTracker::create(["lib.rs", "lib.rs => core.rs", "core.rs"]);
/// assert_eq!(tracker.newest_name("lib.rs"), "core.rs");
/// assert_eq!(tracker.newest_name("core.rs"), "core.rs");
/// assert_eq!(tracker.newest_name("lib.rs => core.rs"), "core.rs");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileTracker {
    track_map: HashMap<String, String>,
}

impl FileTracker {
    /// Build the rename map from path expressions in chronological order.
    ///
    /// Expressions are replayed newest first, so the most recent rename of a
    /// path wins. Inserting `before -> after` removes any mapping out of
    /// `after`, which keeps the map acyclic.
    pub fn create<I, S>(expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expressions: Vec<S> = expressions.into_iter().collect();
        let mut track_map: HashMap<String, String> = HashMap::new();

        for expression in expressions.iter().rev() {
            let Some((before, after)) = parse_rename(expression.as_ref()) else {
                continue;
            };
            if before == after || track_map.contains_key(&before) {
                continue;
            }
            debug!(before = %before, after = %after, "rename");

            if track_map.remove(&after).is_some() {
                info!(path = %after, "dropped older rename to avoid a cycle");
            }
            track_map.insert(before, after);
        }

        Self { track_map }
    }

    /// Resolve a path or rename expression to its current name.
    ///
    /// Rename expressions resolve from their `after` side. Plain paths that
    /// were renamed resolve too, and already-current names come back unchanged.
    pub fn newest_name(&self, expression: &str) -> String {
        let start = match parse_rename(expression) {
            Some((_, after)) => after,
            None => expression.to_string(),
        };
        self.resolve(start)
    }

    fn resolve(&self, mut name: String) -> String {
        let mut visited: HashSet<String> = HashSet::new();
        // The map is acyclic by construction; the visited set bounds the walk anyway.
        while let Some(next) = self.track_map.get(&name) {
            if !visited.insert(name.clone()) || visited.len() > self.track_map.len() {
                break;
            }
            name = next.clone();
        }
        name
    }

    /// Number of recorded renames.
    pub fn len(&self) -> usize {
        self.track_map.len()
    }

    /// Whether no renames were recorded.
    pub fn is_empty(&self) -> bool {
        self.track_map.is_empty()
    }

    /// Recorded `before -> after` edges, in no particular order.
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.track_map
            .iter()
            .map(|(before, after)| (before.as_str(), after.as_str()))
    }
}
