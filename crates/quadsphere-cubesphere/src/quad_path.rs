//! String keys locating a quad in the cube-sphere quadtree.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::RootFace;

/// Reasons a string is not a valid quad path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path '{0}' is shorter than a root selector")]
    TooShort(String),
    #[error("path '{0}' does not start with a root selector")]
    UnknownRoot(String),
    #[error("path '{path}' has invalid digit '{digit}'")]
    InvalidDigit { path: String, digit: char },
}

/// A quad's address: a two-character root selector followed by one
/// quadrant digit (`0` top-left, `1` top-right, `2` bottom-left,
/// `3` bottom-right) per subdivision level.
///
/// Hashes and compares like its string form, so maps keyed by `QuadPath`
/// can be queried with a `&str`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct QuadPath {
    path: String,
    root: RootFace,
}

impl QuadPath {
    /// The path of a root quad.
    #[must_use]
    pub fn root(face: RootFace) -> Self {
        Self {
            path: face.selector().to_string(),
            root: face,
        }
    }

    /// Parse and validate a path string.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.len() < 2 || !s.is_char_boundary(2) {
            return Err(PathError::TooShort(s.to_string()));
        }
        let root =
            RootFace::from_selector(&s[..2]).ok_or_else(|| PathError::UnknownRoot(s.to_string()))?;
        if let Some(digit) = s[2..].chars().find(|c| !matches!(c, '0'..='3')) {
            return Err(PathError::InvalidDigit {
                path: s.to_string(),
                digit,
            });
        }
        Ok(Self {
            path: s.to_string(),
            root,
        })
    }

    /// Build from a root and quadrant digits known to be in `0..4`.
    pub(crate) fn from_digits(root: RootFace, digits: impl IntoIterator<Item = u8>) -> Self {
        let mut path = root.selector().to_string();
        path.extend(digits.into_iter().map(|d| char::from(b'0' + (d & 3))));
        Self { path, root }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn root_face(&self) -> RootFace {
        self.root
    }

    /// Subdivision depth; 0 for a root.
    #[must_use]
    pub fn level(&self) -> u8 {
        (self.path.len() - 2) as u8
    }

    /// Quadrant digits below the root selector.
    pub fn digits(&self) -> impl DoubleEndedIterator<Item = u8> + ExactSizeIterator + '_ {
        self.path.as_bytes()[2..].iter().map(|b| b - b'0')
    }

    /// Path of child `quadrant` (`0..4`).
    #[must_use]
    pub fn child(&self, quadrant: u8) -> Self {
        debug_assert!(quadrant < 4, "quadrant {quadrant} out of range");
        let mut path = self.path.clone();
        path.push(char::from(b'0' + (quadrant & 3)));
        Self {
            path,
            root: self.root,
        }
    }

    /// Path of the parent quad, or `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.truncated(1)
    }

    /// This path with `count` trailing digits removed, or `None` if that
    /// would cut into the root selector.
    #[must_use]
    pub fn truncated(&self, count: usize) -> Option<Self> {
        if count > self.level() as usize {
            return None;
        }
        Some(Self {
            path: self.path[..self.path.len() - count].to_string(),
            root: self.root,
        })
    }

    /// Last quadrant digit, or `None` for a root.
    #[must_use]
    pub fn last_digit(&self) -> Option<u8> {
        self.digits().next_back()
    }
}

impl Hash for QuadPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl Borrow<str> for QuadPath {
    fn borrow(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for QuadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for QuadPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuadPath({})", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_valid_paths() {
        let path = QuadPath::parse("0213").unwrap();
        assert_eq!(path.root_face(), RootFace::Right);
        assert_eq!(path.level(), 2);
        assert_eq!(path.digits().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(QuadPath::parse("0"), Err(PathError::TooShort(_))));
        assert!(matches!(QuadPath::parse("00"), Err(PathError::UnknownRoot(_))));
        assert!(matches!(
            QuadPath::parse("0314"),
            Err(PathError::InvalidDigit { digit: '4', .. })
        ));
        assert!(QuadPath::parse("é1").is_err());
    }

    #[test]
    fn test_children_extend_parent() {
        let root = QuadPath::root(RootFace::Back);
        for quadrant in 0..4 {
            let child = root.child(quadrant);
            assert_eq!(child.as_str(), format!("13{quadrant}"));
            assert_eq!(child.level(), 1);
            assert_eq!(child.parent().as_ref(), Some(&root));
            assert_eq!(child.last_digit(), Some(quadrant));
        }
        assert_eq!(root.parent(), None);
        assert_eq!(root.last_digit(), None);
    }

    #[test]
    fn test_truncated_stops_at_root() {
        let path = QuadPath::parse("21012").unwrap();
        assert_eq!(path.truncated(3).unwrap().as_str(), "21");
        assert!(path.truncated(4).is_none());
    }

    #[test]
    fn test_map_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(QuadPath::parse("0312").unwrap(), 7);
        assert_eq!(map.get("0312"), Some(&7));
        assert_eq!(map.get("031"), None);
    }
}
