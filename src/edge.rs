//! Lattice edges: one candidate mapping of an input span to target-script text.

use serde::Serialize;
use std::fmt;

/// Script name recorded on pass-through edges; the text stays in its source script.
pub const SOURCE_SCRIPT: &str = "Latin";

/// How an edge was produced. The declaration order is also the path-selection
/// preference among equally long edges: `Matched` beats `Fallback` beats `Preserve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Annotation {
    /// A rule from the rule tables.
    Matched,
    /// Single-letter substitution from the static per-script table.
    Fallback,
    /// Non-letter passed through unchanged.
    Preserve,
}

impl Annotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Annotation::Matched => "matched",
            Annotation::Fallback => "fallback",
            Annotation::Preserve => "preserve",
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span `[start, end)` of the input (in chars) and the text it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub start: usize,
    pub end: usize,
    /// The input text covered by the edge.
    pub source: String,
    pub target: String,
    pub script: String,
    pub annotation: Annotation,
    #[serde(skip)]
    pub(crate) priority: i32,
    #[serde(skip)]
    pub(crate) order: usize,
}

impl Edge {
    pub(crate) fn matched(
        start: usize,
        end: usize,
        source: String,
        rule: &crate::rule::ReverseRule,
    ) -> Self {
        Self {
            start,
            end,
            source,
            target: rule.target.clone(),
            script: rule.script.clone(),
            annotation: Annotation::Matched,
            priority: rule.priority,
            order: rule.order,
        }
    }

    pub(crate) fn fallback(position: usize, c: char, target: String, script: &str) -> Self {
        Self {
            start: position,
            end: position + 1,
            source: c.to_string(),
            target,
            script: script.to_string(),
            annotation: Annotation::Fallback,
            priority: 0,
            order: usize::MAX,
        }
    }

    pub(crate) fn preserve(position: usize, c: char) -> Self {
        Self {
            start: position,
            end: position + 1,
            source: c.to_string(),
            target: c.to_string(),
            script: SOURCE_SCRIPT.to_string(),
            annotation: Annotation::Preserve,
            priority: 0,
            order: usize::MAX,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of input chars covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn txt(&self) -> &str {
        &self.target
    }

    /// Priority of the rule behind a matched edge; `0` for fallback and preserve edges.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Path-selection key: longer first, then annotation class, then priority,
    /// then load order. The greatest key wins.
    pub(crate) fn preference_key(&self) -> (usize, std::cmp::Reverse<Annotation>, i32, std::cmp::Reverse<usize>) {
        (
            self.len(),
            std::cmp::Reverse(self.annotation),
            self.priority,
            std::cmp::Reverse(self.order),
        )
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}-{}] {} → {} ({}, {})",
            self.start, self.end, self.source, self.target, self.script, self.annotation
        )
    }
}
