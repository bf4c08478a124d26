//! Node paths over branching levels.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CvarError;

/// Position of a node in a scenario tree, as the branch taken at each level.
///
/// The root is the empty path. `"0.2"` is the third child of the first child
/// of the root. Paths order by depth first, so iterating an ordered map of
/// paths visits every parent before its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// The root path (t = 0).
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    /// Build a path from branch indices.
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        NodePath(indices.into())
    }

    /// Path of the parent node, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(NodePath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Number of branching levels below the root.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Branch indices from the root down.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl Ord for NodePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for NodePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", idx)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = CvarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CvarError::InvalidScenario(
                "node path must not be empty".into(),
            ));
        }
        s.split('.')
            .map(|part| {
                part.parse::<usize>().map_err(|_| {
                    CvarError::InvalidScenario(format!("invalid node path '{}'", s))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(NodePath)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path: NodePath = "0.2.1".parse().unwrap();
        assert_eq!(path.indices(), &[0, 2, 1]);
        assert_eq!(path.to_string(), "0.2.1");
        assert_eq!(path.depth(), 3);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<NodePath>().is_err());
        assert!("0..1".parse::<NodePath>().is_err());
        assert!("a.1".parse::<NodePath>().is_err());
    }

    #[test]
    fn test_parent_chain() {
        let path = NodePath::new(vec![1, 0]);
        let parent = path.parent().unwrap();
        assert_eq!(parent, NodePath::new(vec![1]));
        assert!(parent.parent().unwrap().is_root());
        assert!(NodePath::root().parent().is_none());
    }

    #[test]
    fn test_depth_first_ordering() {
        let mut paths = vec![
            NodePath::new(vec![0, 1]),
            NodePath::new(vec![1]),
            NodePath::new(vec![0, 0]),
            NodePath::new(vec![0]),
        ];
        paths.sort();
        let rendered: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["0", "1", "0.0", "0.1"]);
    }
}
