use crate::{DfsError, DfsResult};
use std::fmt;
use std::path::PathBuf;

/// Path component separator.
pub const SEPARATOR: char = '/';
/// Reserved for application use, never valid inside a component.
pub const RESERVED_DELIMITER: char = ':';

/// A path in the distributed namespace.
///
/// Immutable ordered sequence of components. The canonical string form is
/// the components joined with `/` and a leading `/`; the root is `"/"`.
/// Components never contain `/` or `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DfsPath {
    components: Vec<String>,
}

impl DfsPath {
    /// The root path (zero components).
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parse a canonical path string. Empty components are dropped, so
    /// `"/a//b"` parses the same as `"/a/b"`.
    pub fn parse(path: &str) -> DfsResult<Self> {
        if path.is_empty() {
            return Err(DfsError::InvalidPath("empty path string".to_string()));
        }
        if !path.starts_with(SEPARATOR) {
            return Err(DfsError::InvalidPath(format!(
                "path must begin with '{}': {}",
                SEPARATOR, path
            )));
        }
        if path.contains(RESERVED_DELIMITER) {
            return Err(DfsError::InvalidPath(format!(
                "path contains reserved '{}': {}",
                RESERVED_DELIMITER, path
            )));
        }
        let components = path
            .split(SEPARATOR)
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();
        Ok(Self { components })
    }

    /// Syntactic validity check only; says nothing about existence.
    pub fn is_valid(path: &str) -> bool {
        !path.is_empty() && path.starts_with(SEPARATOR) && !path.contains(RESERVED_DELIMITER)
    }

    /// New path with `component` appended.
    pub fn child(&self, component: &str) -> DfsResult<Self> {
        if component.is_empty()
            || component.contains(SEPARATOR)
            || component.contains(RESERVED_DELIMITER)
        {
            return Err(DfsError::InvalidPath(format!(
                "invalid path component: {}",
                component
            )));
        }
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Parent path. The root has none.
    pub fn parent(&self) -> DfsResult<Self> {
        if self.is_root() {
            return Err(DfsError::InvalidPath("root has no parent".to_string()));
        }
        let mut components = self.components.clone();
        components.pop();
        Ok(Self { components })
    }

    /// Last component. The root has none.
    pub fn last(&self) -> DfsResult<&str> {
        self.components
            .last()
            .map(|c| c.as_str())
            .ok_or_else(|| DfsError::InvalidPath("root has no last component".to_string()))
    }

    /// True iff `other`'s components are a prefix of this path's,
    /// including identity.
    pub fn is_subpath(&self, other: &DfsPath) -> bool {
        other.components.len() <= self.components.len()
            && self.components[..other.components.len()] == other.components[..]
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Every strict prefix of this path from the root down, root first,
    /// ending with the path itself. `"/a/b"` yields `"/", "/a", "/a/b"`.
    pub fn prefixes(&self) -> Vec<DfsPath> {
        let mut out = Vec::with_capacity(self.components.len() + 1);
        let mut cur = DfsPath::root();
        out.push(cur.clone());
        for c in &self.components {
            cur.components.push(c.clone());
            out.push(cur.clone());
        }
        out
    }

    /// Resolve against a local filesystem root.
    pub fn to_local(&self, root: &std::path::Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for c in &self.components {
            out.push(c);
        }
        out
    }

    /// List every file under a local directory tree, as paths relative to
    /// `dir`.
    pub fn list_local(dir: &std::path::Path) -> DfsResult<Vec<DfsPath>> {
        if !dir.exists() {
            return Err(DfsError::NotFound(format!(
                "local directory does not exist: {}",
                dir.display()
            )));
        }
        if !dir.is_dir() {
            return Err(DfsError::InvalidParam(format!(
                "not a directory: {}",
                dir.display()
            )));
        }
        let mut out = Vec::new();
        Self::walk_local(dir, &DfsPath::root(), &mut out)?;
        Ok(out)
    }

    fn walk_local(
        dir: &std::path::Path,
        current: &DfsPath,
        out: &mut Vec<DfsPath>,
    ) -> DfsResult<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n,
                None => continue,
            };
            let child = current.child(name)?;
            if entry.file_type()?.is_dir() {
                Self::walk_local(&entry.path(), &child, out)?;
            } else {
                out.push(child);
            }
        }
        Ok(())
    }
}

impl fmt::Display for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "{}", SEPARATOR);
        }
        for c in &self.components {
            write!(f, "{}{}", SEPARATOR, c)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DfsPath {
    type Err = DfsError;

    fn from_str(s: &str) -> DfsResult<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_is_fixed_point() {
        for raw in ["/", "/a", "/a/b/c", "//a//b/", "/x//"] {
            let parsed = DfsPath::parse(raw).unwrap();
            let canonical = parsed.to_string();
            let reparsed = DfsPath::parse(&canonical).unwrap();
            assert_eq!(parsed, reparsed);
            assert_eq!(canonical, reparsed.to_string());
        }
        assert_eq!(DfsPath::parse("//a//b/").unwrap().to_string(), "/a/b");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(DfsPath::parse("").is_err());
        assert!(DfsPath::parse("a/b").is_err());
        assert!(DfsPath::parse("/a:b").is_err());
    }

    #[test]
    fn test_child_rejects_bad_components() {
        let root = DfsPath::root();
        assert!(root.child("").is_err());
        assert!(root.child("a/b").is_err());
        assert!(root.child("a:b").is_err());
        assert_eq!(root.child("a").unwrap().to_string(), "/a");
    }

    #[test]
    fn test_root_parent_last() {
        let root = DfsPath::root();
        assert!(root.is_root());
        assert!(root.parent().is_err());
        assert!(root.last().is_err());

        let p = DfsPath::parse("/a/b").unwrap();
        assert_eq!(p.parent().unwrap().to_string(), "/a");
        assert_eq!(p.last().unwrap(), "b");
    }

    #[test]
    fn test_is_subpath_reflexive_and_prefix() {
        let a = DfsPath::parse("/a/b").unwrap();
        let b = DfsPath::parse("/a/b/c").unwrap();
        assert!(a.is_subpath(&a));
        assert!(b.is_subpath(&a));
        assert!(!a.is_subpath(&b));
        assert!(b.is_subpath(&DfsPath::root()));
        // sibling with a shared string prefix is not a component prefix
        let ab = DfsPath::parse("/ab").unwrap();
        assert!(!ab.is_subpath(&DfsPath::parse("/a").unwrap()));
    }

    #[test]
    fn test_ordering_is_lexicographic_by_component() {
        let mut paths = vec![
            DfsPath::parse("/b").unwrap(),
            DfsPath::parse("/a/c").unwrap(),
            DfsPath::parse("/a").unwrap(),
            DfsPath::root(),
        ];
        paths.sort();
        let rendered: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["/", "/a", "/a/c", "/b"]);
    }

    #[test]
    fn test_prefixes() {
        let p = DfsPath::parse("/a/b").unwrap();
        let rendered: Vec<String> = p.prefixes().iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["/", "/a", "/a/b"]);
    }

    #[test]
    fn test_list_local() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("d1/d2")).unwrap();
        std::fs::write(tmp.path().join("f1"), b"x").unwrap();
        std::fs::write(tmp.path().join("d1/d2/f2"), b"y").unwrap();

        let mut files = DfsPath::list_local(tmp.path()).unwrap();
        files.sort();
        let rendered: Vec<String> = files.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["/d1/d2/f2", "/f1"]);

        assert!(matches!(
            DfsPath::list_local(&tmp.path().join("missing")),
            Err(DfsError::NotFound(_))
        ));
        assert!(matches!(
            DfsPath::list_local(&tmp.path().join("f1")),
            Err(DfsError::InvalidParam(_))
        ));
    }
}
