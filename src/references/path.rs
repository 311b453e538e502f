//! Field path parsing and navigation.
//!
//! A field path addresses a value inside a manifest using dot-separated keys with
//! optional `[n]` array index segments, for example
//! `status.loadBalancer.ingress[0].ip`. Keys may contain any character except `.`,
//! `[` and `]`, which keeps label keys such as `app.kubernetes.io/name` addressable
//! through the map-index form of an expression but not through a plain path.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A single step in a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key lookup.
    Key(String),
    /// Array element lookup.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{key}"),
            PathSegment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Error returned when a field path string is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid field path '{path}': {reason}")]
pub struct FieldPathError {
    /// The path text that failed to parse
    pub path: String,
    /// What was wrong with it
    pub reason: String,
}

impl FieldPathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// A parsed field path.
///
/// The empty path addresses the root value itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The path addressing the root value.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from already-parsed segments.
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self {
            segments,
        }
    }

    /// Parse a dot path with optional `[n]` index segments.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use refgraph_cli::references::{FieldPath, PathSegment};
    ///
    /// let path = FieldPath::parse("status.conditions[0].type").unwrap();
    /// assert_eq!(path.segments().len(), 4);
    /// assert_eq!(path.segments()[2], PathSegment::Index(0));
    /// assert!(FieldPath::parse("spec..name").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`FieldPathError`] for empty keys (`a..b`, leading or trailing dots),
    /// unterminated or non-numeric index segments, and stray `]` characters.
    pub fn parse(path: &str) -> Result<Self, FieldPathError> {
        let mut segments = Vec::new();
        if path.is_empty() {
            return Ok(Self::root());
        }

        let chars: Vec<char> = path.chars().collect();
        let mut pos = 0;
        // A key is expected at the start and after every dot
        let mut expect_key = !path.starts_with('[');

        while pos < chars.len() {
            match chars[pos] {
                '[' => {
                    let close = chars[pos..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| pos + offset)
                        .ok_or_else(|| FieldPathError::new(path, "unterminated '[' segment"))?;
                    let digits: String = chars[pos + 1..close].iter().collect();
                    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                        return Err(FieldPathError::new(
                            path,
                            format!("array index '[{digits}]' must be a non-negative integer"),
                        ));
                    }
                    let index = digits.parse::<usize>().map_err(|e| {
                        FieldPathError::new(path, format!("array index out of range: {e}"))
                    })?;
                    segments.push(PathSegment::Index(index));
                    pos = close + 1;
                    expect_key = false;
                }
                '.' => {
                    if expect_key {
                        return Err(FieldPathError::new(path, "empty key segment"));
                    }
                    pos += 1;
                    expect_key = true;
                    if pos == chars.len() {
                        return Err(FieldPathError::new(path, "path ends with '.'"));
                    }
                }
                ']' => {
                    return Err(FieldPathError::new(path, "unexpected ']'"));
                }
                _ => {
                    if !expect_key {
                        return Err(FieldPathError::new(
                            path,
                            "index segment must be followed by '.' or '['",
                        ));
                    }
                    let start = pos;
                    while pos < chars.len() && !matches!(chars[pos], '.' | '[' | ']') {
                        pos += 1;
                    }
                    segments.push(PathSegment::Key(chars[start..pos].iter().collect()));
                    expect_key = false;
                }
            }
        }

        if expect_key {
            return Err(FieldPathError::new(path, "empty key segment"));
        }

        Ok(Self {
            segments,
        })
    }

    /// The parsed segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether this path addresses the root value.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first key segment, if the path starts with one.
    pub fn root_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// The last key segment in the path, skipping trailing indices.
    pub fn last_key(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        })
    }

    /// Append a segment, returning the extended path.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self {
            segments,
        }
    }

    /// The path with every index replaced by `[n]`, used for shape matching.
    pub fn shape(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(key);
                }
                PathSegment::Index(_) => out.push_str("[n]"),
            }
        }
        out
    }

    /// Navigate into `value`, returning the addressed node if every segment exists.
    pub fn navigate<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        self.segments.iter().try_fold(value, |current, segment| match segment {
            PathSegment::Key(key) => current.as_object()?.get(key),
            PathSegment::Index(index) => current.as_array()?.get(*index),
        })
    }

    /// Navigate as far as possible, returning the deepest reachable prefix and node.
    ///
    /// Used to build actionable "field not found" messages listing the keys that
    /// do exist at the point where navigation stopped.
    pub fn deepest<'v>(&self, value: &'v Value) -> (FieldPath, &'v Value) {
        let mut current = value;
        let mut reached = Vec::new();
        for segment in &self.segments {
            let next = match segment {
                PathSegment::Key(key) => current.as_object().and_then(|map| map.get(key)),
                PathSegment::Index(index) => current.as_array().and_then(|items| items.get(*index)),
            };
            match next {
                Some(next) => {
                    reached.push(segment.clone());
                    current = next;
                }
                None => break,
            }
        }
        (FieldPath::from_segments(reached), current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i > 0 => write!(f, ".{key}")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
