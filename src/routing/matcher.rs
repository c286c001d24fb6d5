//! Path pattern matching for cross-origin policy injection.
//!
//! # Responsibilities
//! - Match a registered path exactly (leading slash ignored)
//! - Match a path prefix for patterns ending in `*`
//! - Combine patterns with OR semantics
//!
//! # Design Decisions
//! - Matching is case-sensitive, like route paths
//! - A bare `*` matches every path
//! - No regex, so matching stays linear in pattern length

/// Trait for matching a registered route path against a condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if `path` satisfies this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches one path exactly, ignoring a leading slash on either side.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: trim_slash(&path.into()).to_string(),
        }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, path: &str) -> bool {
        trim_slash(path) == self.path
    }
}

/// Matches the path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// An empty prefix matches everything.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: trim_slash(&prefix.into()).to_string(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        trim_slash(path).starts_with(&self.prefix)
    }
}

/// Matches when any inner matcher does.
#[derive(Debug, Default)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// Compile configured patterns: `api/*` becomes a prefix matcher, anything
    /// else an exact matcher. Blank patterns are skipped.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Self {
        let matchers = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|pattern| -> Box<dyn Matcher> {
                match pattern.strip_suffix('*') {
                    Some(prefix) => Box::new(PathPrefixMatcher::new(prefix.replace('*', ""))),
                    None => Box::new(ExactPathMatcher::new(pattern)),
                }
            })
            .collect();
        Self { matchers }
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}

fn trim_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_pattern_is_slash_insensitive() {
        let matcher = AnyMatcher::from_patterns(&["api/*"]);

        assert!(matcher.matches("/api/v1/user"));
        assert!(matcher.matches("api/v1/user"));
        assert!(!matcher.matches("/api"));
        assert!(!matcher.matches("/web/api"));
    }

    #[test]
    fn test_exact_pattern() {
        let matcher = AnyMatcher::from_patterns(&["api"]);

        assert!(matcher.matches("/api"));
        assert!(matcher.matches("api"));
        assert!(!matcher.matches("/api/v1"));
        assert!(!matcher.matches("/apis"));

        let matcher = AnyMatcher::from_patterns(&["/users/{id}"]);
        assert!(matcher.matches("/users/{id}"));
    }

    #[test]
    fn test_wildcard_and_empty() {
        let all = AnyMatcher::from_patterns(&["*"]);
        assert!(all.matches("/"));
        assert!(all.matches("/anything/at/all"));

        let none = AnyMatcher::from_patterns::<&str>(&[]);
        assert!(none.is_empty());
        assert!(!none.matches("/api"));

        let blanks = AnyMatcher::from_patterns(&["", "  "]);
        assert!(blanks.is_empty());
    }

    #[test]
    fn test_any_of_several_patterns() {
        let matcher = AnyMatcher::from_patterns(&["sanctum/csrf-cookie", "/api/*"]);

        assert!(matcher.matches("/sanctum/csrf-cookie"));
        assert!(matcher.matches("/api/users"));
        assert!(!matcher.matches("/sanctum"));
    }
}
