//! Path selectors for extracting sub-messages.
//!
//! A path is a read-only query applied to an arriving message before it is
//! stored in a block's input map. `.` is the identity; `.key` selects an
//! object field; `[n]` indexes an array. Selectors chain: `.users[0].name`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::message::Message;

/// Errors from parsing a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The expression was empty.
    #[error("empty path expression")]
    Empty,

    /// The expression did not start with `.`.
    #[error("path must start with '.': {0:?}")]
    MissingDot(String),

    /// A `.` separator was not followed by a key.
    #[error("empty key at byte {0}")]
    EmptyKey(usize),

    /// An index selector held something other than decimal digits.
    #[error("invalid array index {index:?} at byte {position}")]
    InvalidIndex { index: String, position: usize },

    /// An index selector was missing its closing bracket.
    #[error("unterminated index at byte {0}")]
    UnterminatedIndex(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed path expression.
///
/// Parsing is validated up front; resolution never fails. A selector that
/// misses (absent key, out-of-range index, wrong variant) yields
/// [`Message::Null`].
///
/// # Examples
///
/// ```rust
/// use manifold::{Message, Path};
///
/// let path = Path::parse(".name").unwrap();
/// let message = Message::Object(
///     [("name".to_string(), Message::from("ada"))].into_iter().collect(),
/// );
/// assert_eq!(path.resolve(&message), Message::from("ada"));
///
/// // The identity path yields the whole message.
/// assert_eq!(Path::identity().resolve(&message), message);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The identity path `.`, which yields the whole message.
    pub fn identity() -> Self {
        Path {
            segments: Vec::new(),
        }
    }

    /// Check if this is the identity path.
    pub fn is_identity(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parse a path expression.
    ///
    /// The expression must start with `.`; what follows is a chain of
    /// `.key` field selections and `[n]` zero-based array indices.
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        if expr.is_empty() {
            return Err(PathError::Empty);
        }
        let bytes = expr.as_bytes();
        if bytes[0] != b'.' {
            return Err(PathError::MissingDot(expr.to_string()));
        }

        let mut segments = Vec::new();
        let mut i = 1;
        while i < expr.len() {
            match bytes[i] {
                b'[' => {
                    let close = expr[i..]
                        .find(']')
                        .ok_or(PathError::UnterminatedIndex(i))?
                        + i;
                    let digits = &expr[i + 1..close];
                    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(PathError::InvalidIndex {
                            index: digits.to_string(),
                            position: i,
                        });
                    }
                    let index = digits.parse().map_err(|_| PathError::InvalidIndex {
                        index: digits.to_string(),
                        position: i,
                    })?;
                    segments.push(Segment::Index(index));
                    i = close + 1;
                }
                b'.' => {
                    // a separator is only legitimate after a segment
                    if segments.is_empty() {
                        return Err(PathError::EmptyKey(i));
                    }
                    i += 1;
                    match bytes.get(i).copied() {
                        None | Some(b'.') | Some(b'[') => return Err(PathError::EmptyKey(i)),
                        Some(_) => {}
                    }
                }
                _ => {
                    let start = i;
                    while i < expr.len() && bytes[i] != b'.' && bytes[i] != b'[' {
                        i += 1;
                    }
                    segments.push(Segment::Key(expr[start..i].to_string()));
                }
            }
        }

        Ok(Path { segments })
    }

    /// Apply this path to a message, extracting the selected sub-message.
    pub fn resolve(&self, message: &Message) -> Message {
        let mut current = message;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Key(key), Message::Object(map)) => match map.get(key) {
                    Some(value) => value,
                    None => return Message::Null,
                },
                (Segment::Index(index), Message::Array(items)) => match items.get(*index) {
                    Some(value) => value,
                    None => return Message::Null,
                },
                _ => return Message::Null,
            };
        }
        current.clone()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, ".");
        }
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> Message {
        let mut user = BTreeMap::new();
        user.insert("name".to_string(), Message::from("ada"));
        user.insert("score".to_string(), Message::Number(7.0));
        let mut root = BTreeMap::new();
        root.insert(
            "users".to_string(),
            Message::Array(vec![Message::Object(user), Message::Null]),
        );
        Message::Object(root)
    }

    #[test]
    fn identity_yields_whole_message() {
        let message = sample();
        assert_eq!(Path::parse(".").unwrap().resolve(&message), message);
        assert!(Path::parse(".").unwrap().is_identity());
    }

    #[test]
    fn key_selection() {
        let mut root = BTreeMap::new();
        root.insert("k".to_string(), Message::Number(1.0));
        let message = Message::Object(root);
        assert_eq!(
            Path::parse(".k").unwrap().resolve(&message),
            Message::Number(1.0)
        );
    }

    #[test]
    fn chained_keys_and_indices() {
        let path = Path::parse(".users[0].name").unwrap();
        assert_eq!(path.resolve(&sample()), Message::from("ada"));
    }

    #[test]
    fn index_directly_after_dot() {
        let message = Message::Array(vec![Message::Number(10.0), Message::Number(20.0)]);
        assert_eq!(
            Path::parse(".[1]").unwrap().resolve(&message),
            Message::Number(20.0)
        );
    }

    #[test]
    fn misses_yield_null() {
        let message = sample();
        assert_eq!(
            Path::parse(".missing").unwrap().resolve(&message),
            Message::Null
        );
        assert_eq!(
            Path::parse(".users[9]").unwrap().resolve(&message),
            Message::Null
        );
        // indexing into an object misses
        assert_eq!(
            Path::parse(".users[0][0]").unwrap().resolve(&message),
            Message::Null
        );
        // descending through a scalar misses
        assert_eq!(
            Path::parse(".users[0].name.deeper").unwrap().resolve(&message),
            Message::Null
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Path::parse(""), Err(PathError::Empty));
        assert!(matches!(
            Path::parse("users"),
            Err(PathError::MissingDot(_))
        ));
        assert!(matches!(Path::parse(".a."), Err(PathError::EmptyKey(_))));
        assert!(matches!(Path::parse("..a"), Err(PathError::EmptyKey(_))));
        assert!(matches!(
            Path::parse(".a[x]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert!(matches!(
            Path::parse(".a[]"),
            Err(PathError::InvalidIndex { .. })
        ));
        assert!(matches!(
            Path::parse(".a[1"),
            Err(PathError::UnterminatedIndex(_))
        ));
    }

    #[test]
    fn display_round_trips() {
        for expr in [".", ".a", ".a.b", ".users[0].name", ".[2]"] {
            let path = Path::parse(expr).unwrap();
            assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
        }
        assert_eq!(Path::parse(".a[0].b").unwrap().to_string(), ".a[0].b");
    }

    #[test]
    fn from_str_works() {
        let path: Path = ".a.b".parse().unwrap();
        assert_eq!(path, Path::parse(".a.b").unwrap());
    }

    #[test]
    fn default_is_identity() {
        assert!(Path::default().is_identity());
    }
}
