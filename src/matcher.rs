//! Rule matching: path predicates and first-match-wins selection.
//!
//! A path matches a [`PathMatcher`] when
//! - `test` is absent or any of its patterns matches,
//! - `include` is absent or any of its patterns matches,
//! - `exclude` is absent or none of its patterns matches.
//!
//! [`match_rule`] walks the rules in caller order and returns the first one
//! whose predicate matches the path AND whose source formats contain the
//! asset format. Later rules are never consulted for that asset.

use regex::Regex;

use crate::codec::Format;
use crate::rule::Rule;

/// Query suffixes marking references rather than emittable files.
const REFERENCE_SUFFIXES: [&str; 2] = ["?url", "?inline"];

/// Disjunction of regular expressions.
#[derive(Debug, Clone, Default)]
pub struct Condition(Vec<Regex>);

impl Condition {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.0.iter().any(|re| re.is_match(path))
    }
}

/// `test` / `include` / `exclude` predicate over asset paths.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    pub test: Option<Condition>,
    pub include: Option<Condition>,
    pub exclude: Option<Condition>,
}

impl PathMatcher {
    pub fn matches(&self, path: &str) -> bool {
        let path = strip_query(path);
        self.test.as_ref().is_none_or(|c| c.matches(path))
            && self.include.as_ref().is_none_or(|c| c.matches(path))
            && !self.exclude.as_ref().is_some_and(|c| c.matches(path))
    }
}

/// Drop a `?query` suffix from an asset name.
pub fn strip_query(name: &str) -> &str {
    name.split_once('?').map_or(name, |(path, _)| path)
}

/// Whether the asset name is a reference (`?url`, `?inline`) that must not
/// enter the pipeline.
pub fn is_reference(name: &str) -> bool {
    REFERENCE_SUFFIXES.iter().any(|suffix| name.contains(suffix))
}

/// Select the first rule that applies to `path` with the guessed `format`.
///
/// Returns the rule index alongside the rule. `None` means the asset passes
/// through untouched.
pub fn match_rule<'a>(path: &str, format: Format, rules: &'a [Rule]) -> Option<(usize, &'a Rule)> {
    rules
        .iter()
        .enumerate()
        .find(|(_, rule)| rule.accepts(format) && rule.matcher().matches(path))
}
