//! Route patterns and the path matcher.
//!
//! A pattern is a `/`-delimited list of segments. Each segment is either a
//! literal (`users`) or a named variable (`:id`). The single-character
//! pattern `*` is the wildcard: it matches every path and binds nothing.
//!
//! Matching rules:
//! - the leading `/` is stripped once, then both sides are split on `/`;
//! - segment counts must be equal, so `/a` and `/a/` are different paths;
//! - literals compare byte-for-byte (case-sensitive);
//! - a variable accepts any non-empty segment.
//!
//! `/` therefore has one empty segment and matches only `/` or the empty path.

use std::collections::HashMap;

/// Path variables bound by a successful match, keyed by name without `:`.
pub type Params = HashMap<String, String>;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A compiled route pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pattern {
    raw: String,
    // `None` for the wildcard.
    segments: Option<Vec<Segment>>,
}

impl Pattern {
    pub const WILDCARD: &'static str = "*";

    pub fn parse(raw: &str) -> Self {
        if raw == Self::WILDCARD {
            return Self { raw: raw.to_owned(), segments: None };
        }

        let segments = split(raw)
            .map(|s| match s.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Variable(name.to_owned()),
                _ => Segment::Literal(s.to_owned()),
            })
            .collect();

        Self { raw: raw.to_owned(), segments: Some(segments) }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.segments.is_none()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.extract(path).is_some()
    }

    /// Returns the variable bindings on a match, `None` otherwise.
    ///
    /// `Some(empty)` means "matched, no variables" and is not the same as
    /// `None`.
    pub fn extract(&self, path: &str) -> Option<Params> {
        let Some(segments) = &self.segments else {
            return Some(Params::new());
        };

        let parts: Vec<&str> = split(path).collect();
        if parts.len() != segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (segment, part) in segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Variable(name) if !part.is_empty() => {
                    params.insert(name.clone(), part.to_owned());
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

fn split(path: &str) -> std::str::Split<'_, char> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

/// One-shot form of [`Pattern::matches`].
pub fn matches(pattern: &str, path: &str) -> bool {
    Pattern::parse(pattern).matches(path)
}

/// One-shot form of [`Pattern::extract`].
pub fn extract_variables(pattern: &str, path: &str) -> Option<Params> {
    Pattern::parse(pattern).extract(path)
}
