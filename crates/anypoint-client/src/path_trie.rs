//! Prefix tree for matching request paths against wildcard patterns.
//!
//! Patterns are slash-delimited; the reserved segment `*` matches exactly one
//! path segment. Lookups prefer exact segment children over the wildcard
//! child at every level and backtrack when a preferred branch dead-ends, so
//! the most specific registered pattern wins. The tree is built up front and
//! shared read-only afterwards; lookups take `&self` and never allocate
//! beyond the capture list.

use std::collections::HashMap;

const WILDCARD: &str = "*";

/// A successful pattern lookup.
///
/// Borrows the stored value from the tree and the captured segments from the
/// searched path, in left-to-right order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch<'t, 'p, T> {
    /// Value stored with the matched pattern.
    pub value: &'t T,
    /// Path segments consumed by wildcard positions.
    pub captures: Vec<&'p str>,
}

#[derive(Debug)]
struct TrieNode<T> {
    children: HashMap<String, TrieNode<T>>,
    /// Present only on terminal nodes; a pattern ends here.
    value: Option<T>,
}

impl<T> TrieNode<T> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            value: None,
        }
    }
}

/// Prefix tree mapping wildcard path patterns to values.
#[derive(Debug)]
pub struct PathTrie<T> {
    root: TrieNode<T>,
    len: usize,
}

impl<T> PathTrie<T> {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            len: 0,
        }
    }

    /// Number of registered patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no patterns are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `pattern` with `value`.
    ///
    /// Empty segments (leading, trailing or doubled slashes) are skipped, so
    /// `//a//b/` registers the same pattern as `/a/b`. Re-inserting a pattern
    /// replaces its value.
    pub fn insert(&mut self, pattern: &str, value: T) {
        let mut node = &mut self.root;
        for segment in segments(pattern) {
            node = node
                .children
                .entry(segment.to_owned())
                .or_insert_with(TrieNode::new);
        }
        if node.value.replace(value).is_none() {
            self.len += 1;
        }
    }

    /// Look up the pattern matching `path`.
    ///
    /// Exact children are tried before the wildcard child at every level,
    /// with full backtracking. A match must consume every path segment and
    /// end on a terminal node.
    pub fn search<'p>(&self, path: &'p str) -> Option<PathMatch<'_, 'p, T>> {
        let segs: Vec<&str> = segments(path).collect();
        let mut captures = Vec::new();
        let value = descend(&self.root, &segs, &mut captures)?;
        Some(PathMatch { value, captures })
    }
}

impl<T> Default for PathTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn descend<'t, 'p, T>(
    node: &'t TrieNode<T>,
    segs: &[&'p str],
    captures: &mut Vec<&'p str>,
) -> Option<&'t T> {
    let Some((first, rest)) = segs.split_first() else {
        return node.value.as_ref();
    };

    if let Some(child) = node.children.get(*first) {
        if let Some(value) = descend(child, rest, captures) {
            return Some(value);
        }
    }

    if let Some(wild) = node.children.get(WILDCARD) {
        captures.push(first);
        if let Some(value) = descend(wild, rest, captures) {
            return Some(value);
        }
        captures.pop();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let mut trie = PathTrie::new();
        trie.insert("/accounts/api/v2/oauth2/token", 1);

        let m = trie.search("/accounts/api/v2/oauth2/token").unwrap();
        assert_eq!(*m.value, 1);
        assert!(m.captures.is_empty());
    }

    #[test]
    fn test_wildcard_captures_in_order() {
        let mut trie = PathTrie::new();
        trie.insert("/organizations/*/environments/*", "env");

        let m = trie
            .search("/organizations/org-1/environments/env-9")
            .unwrap();
        assert_eq!(*m.value, "env");
        assert_eq!(m.captures, vec!["org-1", "env-9"]);
    }

    #[test]
    fn test_exact_preferred_over_wildcard() {
        let mut trie = PathTrie::new();
        trie.insert("/api/*/status", "wild");
        trie.insert("/api/v2/status", "exact");

        let m = trie.search("/api/v2/status").unwrap();
        assert_eq!(*m.value, "exact");
        assert!(m.captures.is_empty());
    }

    #[test]
    fn test_backtracks_out_of_exact_dead_end() {
        // The exact branch under /a/b only continues to /x, so matching
        // /a/b/c must back out and take the wildcard at the second level.
        let mut trie = PathTrie::new();
        trie.insert("/a/b/x", "exact");
        trie.insert("/a/*/c", "wild");

        let m = trie.search("/a/b/c").unwrap();
        assert_eq!(*m.value, "wild");
        assert_eq!(m.captures, vec!["b"]);
    }

    #[test]
    fn test_failed_wildcard_branch_discards_captures() {
        let mut trie = PathTrie::new();
        trie.insert("/a/*/x", "first");
        trie.insert("/a/b/*/y", "second");

        let m = trie.search("/a/b/c/y").unwrap();
        assert_eq!(*m.value, "second");
        assert_eq!(m.captures, vec!["c"]);
    }

    #[test]
    fn test_partial_path_is_no_match() {
        let mut trie = PathTrie::new();
        trie.insert("/a/b/c", 1);

        assert!(trie.search("/a/b").is_none());
        assert!(trie.search("/a/b/c/d").is_none());
    }

    #[test]
    fn test_wildcard_matches_exactly_one_segment() {
        let mut trie = PathTrie::new();
        trie.insert("/files/*", 1);

        assert!(trie.search("/files/report.json").is_some());
        assert!(trie.search("/files").is_none());
        assert!(trie.search("/files/a/b").is_none());
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let mut trie = PathTrie::new();
        trie.insert("//api//v2/", 1);

        assert!(trie.search("/api/v2").is_some());
        assert!(trie.search("api/v2//").is_some());
    }

    #[test]
    fn test_reinsert_replaces_value() {
        let mut trie = PathTrie::new();
        trie.insert("/a", 1);
        trie.insert("/a", 2);

        assert_eq!(trie.len(), 1);
        assert_eq!(*trie.search("/a").unwrap().value, 2);
    }

    #[test]
    fn test_deployment_logs_pattern() {
        let mut trie = PathTrie::new();
        trie.insert(
            "/amc/application-manager/api/v2/organizations/*/environments/*/deployments/*/specs/*/logs",
            0u64,
        );

        let m = trie
            .search("/amc/application-manager/api/v2/organizations/org-a/environments/env-b/deployments/dep-c/specs/spec-d/logs")
            .unwrap();
        assert_eq!(*m.value, 0);
        assert_eq!(m.captures, vec!["org-a", "env-b", "dep-c", "spec-d"]);
    }

    #[test]
    fn test_len_and_is_empty() {
        let mut trie = PathTrie::new();
        assert!(trie.is_empty());

        trie.insert("/a", 1);
        trie.insert("/b/*", 2);
        assert_eq!(trie.len(), 2);
        assert!(!trie.is_empty());
    }
}
