//! Delimited field paths into nested records
//!
//! A path such as `python$version_info$0` addresses `record["python"]["version_info"][0]`.
//! Segments that parse as non-negative integers become array indices, so an
//! object key made only of digits cannot be addressed. That is a known
//! weakness of the format and is kept for compatibility with stored paths.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Default path separator. `$` is valid unescaped in SQLite column names,
/// which lets flattened paths double as column identifiers.
pub const DEFAULT_SEPARATOR: char = '$';

/// Whether `sep` may be used as a path separator.
///
/// The indexed store turns joined paths into column names, so the separator
/// must be a character SQL accepts in a bare identifier.
pub fn is_valid_separator(sep: char) -> bool {
    sep == '$' || sep == '_' || sep.is_ascii_alphanumeric()
}

/// Errors raised while parsing or resolving a path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path input was not a string
    #[error("expected string path, not {0}")]
    NotAString(String),
    /// A segment could not be applied to the value reached so far
    #[error("error retrieving segment {segment} of path {path}")]
    Unresolved { segment: String, path: String },
}

/// One step of a path: object key or array index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.parse::<usize>() {
            Ok(index) => PathSegment::Index(index),
            Err(_) => PathSegment::Key(trimmed.to_string()),
        })
    }

    /// Apply this segment to a value, descending one level
    fn apply<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(index) => write!(f, "{}", index),
            PathSegment::Key(key) => write!(f, "{:?}", key),
        }
    }
}

/// An ordered sequence of segments addressing a nested field
///
/// The empty path is the identity: it resolves to the whole record. That is
/// what a query without `group_by` uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The identity path
    pub fn identity() -> Self {
        Self::default()
    }

    /// Parse `path` by splitting on `sep`
    ///
    /// Segments are trimmed and empty ones dropped, so `" a $$ 0 "` becomes
    /// `["a", 0]`.
    pub fn parse(path: &str, sep: char) -> Self {
        Self {
            segments: path.split(sep).filter_map(PathSegment::parse).collect(),
        }
    }

    /// Parse a path held in a JSON value, rejecting anything but a string
    pub fn parse_value(value: &Value, sep: char) -> Result<Self, PathError> {
        match value {
            Value::String(path) => Ok(Self::parse(path, sep)),
            other => Err(PathError::NotAString(other.to_string())),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_identity(&self) -> bool {
        self.segments.is_empty()
    }

    /// Extend the path by one segment
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Render the path back into its delimited form
    pub fn join(&self, sep: char) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push(sep);
            }
            match segment {
                PathSegment::Index(index) => out.push_str(&index.to_string()),
                PathSegment::Key(key) => out.push_str(key),
            }
        }
        out
    }

    /// Walk `record` segment by segment
    ///
    /// Fails on a missing key, an out-of-range index, or any attempt to
    /// descend into a scalar.
    pub fn resolve<'a>(&self, record: &'a Value) -> Result<&'a Value, PathError> {
        let mut current = record;
        for segment in &self.segments {
            current = segment.apply(current).ok_or_else(|| PathError::Unresolved {
                segment: segment.to_string(),
                path: self.to_string(),
            })?;
        }
        Ok(current)
    }

    /// Like [`FieldPath::resolve`], returning `default` on failure
    pub fn resolve_or<'a>(&self, record: &'a Value, default: &'a Value) -> &'a Value {
        self.resolve(record).unwrap_or(default)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", segment)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn key(k: &str) -> PathSegment {
        PathSegment::Key(k.to_string())
    }

    #[test]
    fn test_parse_mixed_segments() {
        let path = FieldPath::parse("python$version_info$0", '$');
        assert_eq!(
            path.segments(),
            &[key("python"), key("version_info"), PathSegment::Index(0)]
        );
    }

    #[test]
    fn test_parse_trims_and_drops_empty() {
        let path = FieldPath::parse("  a $$ $ 12 $", '$');
        assert_eq!(path.segments(), &[key("a"), PathSegment::Index(12)]);
        assert!(FieldPath::parse("$ $", '$').is_identity());
    }

    #[test]
    fn test_parse_negative_stays_key() {
        let path = FieldPath::parse("items$-1", '$');
        assert_eq!(path.segments(), &[key("items"), key("-1")]);
    }

    #[test]
    fn test_parse_value_rejects_non_string() {
        let err = FieldPath::parse_value(&json!(42), '$').unwrap_err();
        assert_eq!(err, PathError::NotAString("42".to_string()));

        let path = FieldPath::parse_value(&json!("a.b"), '.').unwrap();
        assert_eq!(path.segments(), &[key("a"), key("b")]);
    }

    #[test]
    fn test_resolve_nested() {
        let record = json!({"python": {"version_info": [2, 7, 11]}, "user": "alice"});
        let path = FieldPath::parse("python$version_info$2", '$');
        assert_eq!(path.resolve(&record).unwrap(), &json!(11));
        assert_eq!(
            FieldPath::parse("python", '$').resolve(&record).unwrap(),
            &json!({"version_info": [2, 7, 11]})
        );
    }

    #[test]
    fn test_resolve_identity_returns_record() {
        let record = json!({"user": "alice"});
        assert_eq!(FieldPath::identity().resolve(&record).unwrap(), &record);
    }

    #[test]
    fn test_resolve_failures() {
        let record = json!({"list": [1, 2], "scalar": 5, "obj": {"a": 1}});

        for raw in ["missing", "list$5", "scalar$0", "list$a", "obj$0"] {
            let path = FieldPath::parse(raw, '$');
            assert!(
                matches!(path.resolve(&record), Err(PathError::Unresolved { .. })),
                "expected {} to fail",
                raw
            );
        }
    }

    #[test]
    fn test_resolve_error_names_segment_and_path() {
        let record = json!({"a": {"b": 1}});
        let err = FieldPath::parse("a$c", '$').resolve(&record).unwrap_err();
        assert_eq!(
            err,
            PathError::Unresolved {
                segment: "\"c\"".to_string(),
                path: "[\"a\", \"c\"]".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_or_default() {
        let record = json!({"a": 1});
        let fallback = json!("none");
        let path = FieldPath::parse("b", '$');
        assert_eq!(path.resolve_or(&record, &fallback), &fallback);
        assert_eq!(FieldPath::parse("a", '$').resolve_or(&record, &fallback), &json!(1));
    }

    #[test]
    fn test_join() {
        let path = FieldPath::parse("uname$0", '$');
        assert_eq!(path.join('$'), "uname$0");
        assert_eq!(path.join('_'), "uname_0");
    }

    #[test]
    fn test_separators() {
        assert!(is_valid_separator('$'));
        assert!(is_valid_separator('_'));
        assert!(!is_valid_separator('.'));
        assert!(!is_valid_separator(' '));
    }

    proptest! {
        #[test]
        fn prop_parse_join_parse_is_stable(
            raw in proptest::collection::vec("[a-z0-9 ]{0,6}", 0..6),
        ) {
            let input = raw.join("$");
            let first = FieldPath::parse(&input, '$');
            let second = FieldPath::parse(&first.join('$'), '$');
            prop_assert_eq!(first, second);
        }
    }
}
