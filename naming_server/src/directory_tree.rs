use crate::lock_node::LockNode;
use dfs_lib::DfsPath;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Identity of a storage server inside the namespace: its client port and
/// command port. Registration keys servers by this pair.
pub type ServerKey = (u16, u16);

/// One entry of the namespace: a directory or a file.
///
/// The tree owns its nodes through the flat path-keyed map; a node refers
/// to its parent only by path string, never by a second owning edge. A
/// node's parent never changes; there is no move or rename.
pub struct DirNode {
    path: String,
    name: String,
    parent: Option<String>,
    /// Local child name -> full child path.
    children: HashMap<String, String>,
    is_file: bool,
    /// Storage servers holding this file's bytes. Empty for directories.
    pub replicas: HashSet<ServerKey>,
    /// Subscribers that still have to consume this file.
    pub pending_subscribers: HashSet<String>,
    /// Set once a subscriber was ever attached; consumption-driven deletion
    /// only applies to such files.
    pub had_subscriber: bool,
    lock: Arc<LockNode>,
}

impl DirNode {
    fn new(path: String, name: String, parent: Option<String>, is_file: bool) -> Self {
        Self {
            path,
            name,
            parent,
            children: HashMap::new(),
            is_file,
            replicas: HashSet::new(),
            pending_subscribers: HashSet::new(),
            had_subscriber: false,
            lock: Arc::new(LockNode::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_file(&self) -> bool {
        self.is_file
    }

    pub fn lock(&self) -> Arc<LockNode> {
        self.lock.clone()
    }
}

/// One hop of a root-to-leaf lock acquisition.
pub struct ChainEntry {
    pub path: String,
    pub is_file: bool,
    pub lock: Arc<LockNode>,
}

/// The in-memory hierarchical namespace. Pure tree bookkeeping: no I/O and
/// no locking. The coordinator layers the lock protocol on top through
/// the per-node `LockNode` handles.
pub struct DirectoryTree {
    nodes: HashMap<String, DirNode>,
}

const ROOT: &str = "/";

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT.to_string(),
            DirNode::new(ROOT.to_string(), String::new(), None, false),
        );
        Self { nodes }
    }

    /// Syntactic check only; implies nothing about existence.
    pub fn is_valid_path(path: &str) -> bool {
        DfsPath::is_valid(path)
    }

    pub fn find(&self, path: &str) -> Option<&DirNode> {
        self.nodes.get(path)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut DirNode> {
        self.nodes.get_mut(path)
    }

    pub fn has_node(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn is_directory(&self, path: &str) -> Option<bool> {
        self.find(path).map(|n| !n.is_file())
    }

    /// True if every strict ancestor of `path` already exists as a
    /// directory.
    pub fn parent_directory_exists(&self, path: &DfsPath) -> bool {
        if path.is_root() {
            return true;
        }
        let prefixes = path.prefixes();
        prefixes[..prefixes.len() - 1]
            .iter()
            .all(|p| matches!(self.is_directory(&p.to_string()), Some(true)))
    }

    /// Create a file node, materializing every missing ancestor directory.
    /// Existing segments are reused untouched; in particular an existing
    /// terminal node keeps its replica set.
    pub fn create_file(&mut self, path: &DfsPath, replica: Option<ServerKey>) {
        if path.is_root() {
            return;
        }
        let prefixes = path.prefixes();
        let terminal = prefixes.len() - 1;
        for (depth, prefix) in prefixes.iter().enumerate().skip(1) {
            let key = prefix.to_string();
            if !self.nodes.contains_key(&key) {
                let is_file = depth == terminal;
                self.insert_node(prefix, is_file);
                if is_file {
                    if let Some(server) = replica {
                        if let Some(node) = self.nodes.get_mut(&key) {
                            node.replicas.insert(server);
                        }
                    }
                }
            }
        }
    }

    /// Create a directory node, materializing missing ancestors as
    /// directories. The coordinator gates this on `parent_directory_exists`.
    pub fn create_directory(&mut self, path: &DfsPath) {
        for prefix in path.prefixes().iter().skip(1) {
            if !self.nodes.contains_key(&prefix.to_string()) {
                self.insert_node(prefix, false);
            }
        }
    }

    fn insert_node(&mut self, path: &DfsPath, is_file: bool) {
        let key = path.to_string();
        let name = path.last().unwrap_or("").to_string();
        let parent_key = path
            .parent()
            .map(|p| p.to_string())
            .unwrap_or_else(|_| ROOT.to_string());
        if let Some(parent) = self.nodes.get_mut(&parent_key) {
            parent.children.insert(name.clone(), key.clone());
        }
        self.nodes
            .insert(key.clone(), DirNode::new(key, name, Some(parent_key), is_file));
    }

    /// Remove the node at `path` (with its whole subtree), then walk up
    /// removing every ancestor directory left childless, stopping at the
    /// root or at the first ancestor that still has children.
    pub fn delete(&mut self, path: &str) -> bool {
        if path == ROOT {
            return false;
        }
        let mut parent_key = match self.nodes.get(path) {
            Some(node) => node.parent.clone(),
            None => return false,
        };
        for sub in self.subtree_paths(path) {
            self.nodes.remove(&sub);
        }
        let mut removed = path.to_string();
        while let Some(key) = parent_key {
            let parent = match self.nodes.get_mut(&key) {
                Some(p) => p,
                None => break,
            };
            parent.children.retain(|_, child| child != &removed);
            if key == ROOT || !parent.children.is_empty() {
                break;
            }
            parent_key = parent.parent.clone();
            self.nodes.remove(&key);
            removed = key;
        }
        true
    }

    fn subtree_paths(&self, path: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![path.to_string()];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.nodes.get(&cur) {
                stack.extend(node.children.values().cloned());
            }
            out.push(cur);
        }
        out
    }

    /// Local names of the immediate children of a directory.
    pub fn list_files(&self, path: &str) -> Option<Vec<String>> {
        let node = self.find(path)?;
        if node.is_file() {
            return None;
        }
        Some(
            node.children
                .values()
                .filter_map(|child| self.nodes.get(child))
                .map(|child| child.name().to_string())
                .collect(),
        )
    }

    /// Full paths of every file at or beneath `path`. A file lists itself.
    pub fn list_all_files(&self, path: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![path.to_string()];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.nodes.get(&cur) {
                if node.is_file() {
                    out.push(cur);
                } else {
                    stack.extend(node.children.values().cloned());
                }
            }
        }
        out
    }

    /// Root-to-leaf lock handles for every prefix of `path`, target last.
    /// `None` if any prefix is missing from the tree.
    pub fn lock_chain(&self, path: &DfsPath) -> Option<Vec<ChainEntry>> {
        path.prefixes()
            .iter()
            .map(|prefix| {
                self.find(&prefix.to_string()).map(|node| ChainEntry {
                    path: node.path().to_string(),
                    is_file: node.is_file(),
                    lock: node.lock(),
                })
            })
            .collect()
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> DfsPath {
        DfsPath::parse(s).unwrap()
    }

    #[test]
    fn test_create_file_materializes_ancestors() {
        let mut tree = DirectoryTree::new();
        tree.create_file(&p("/a/b/c"), Some((7000, 7001)));

        assert!(matches!(tree.is_directory("/a"), Some(true)));
        assert!(matches!(tree.is_directory("/a/b"), Some(true)));
        let file = tree.find("/a/b/c").unwrap();
        assert!(file.is_file());
        assert!(file.replicas.contains(&(7000, 7001)));
    }

    #[test]
    fn test_create_file_reuses_existing_segments() {
        let mut tree = DirectoryTree::new();
        tree.create_file(&p("/a/b"), Some((1, 2)));
        tree.create_file(&p("/a/b"), Some((3, 4)));
        // the second creation does not touch the existing node
        let file = tree.find("/a/b").unwrap();
        assert_eq!(file.replicas.len(), 1);
        assert!(file.replicas.contains(&(1, 2)));
    }

    #[test]
    fn test_create_directory_and_listing() {
        let mut tree = DirectoryTree::new();
        tree.create_directory(&p("/docs"));
        assert_eq!(tree.list_files("/docs").unwrap(), Vec::<String>::new());

        tree.create_file(&p("/docs/a"), None);
        tree.create_file(&p("/docs/b"), None);
        let mut names = tree.list_files("/docs").unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);

        // listing a file is a type error the coordinator maps to NotFound
        assert!(tree.list_files("/docs/a").is_none());
    }

    #[test]
    fn test_list_all_files_recurses() {
        let mut tree = DirectoryTree::new();
        tree.create_file(&p("/x/one"), None);
        tree.create_file(&p("/x/deep/two"), None);
        tree.create_file(&p("/three"), None);

        let mut all = tree.list_all_files("/");
        all.sort();
        assert_eq!(all, vec!["/three", "/x/deep/two", "/x/one"]);

        assert_eq!(tree.list_all_files("/x/one"), vec!["/x/one"]);
    }

    #[test]
    fn test_parent_directory_exists() {
        let mut tree = DirectoryTree::new();
        assert!(tree.parent_directory_exists(&p("/top")));
        assert!(!tree.parent_directory_exists(&p("/a/b")));
        tree.create_directory(&p("/a"));
        assert!(tree.parent_directory_exists(&p("/a/b")));
        // a file is not a valid parent
        tree.create_file(&p("/f"), None);
        assert!(!tree.parent_directory_exists(&p("/f/x")));
    }

    #[test]
    fn test_delete_cascades_empty_ancestors() {
        let mut tree = DirectoryTree::new();
        tree.create_file(&p("/a/b/c"), None);
        tree.create_file(&p("/a/keep"), None);

        assert!(tree.delete("/a/b/c"));
        // /a/b became empty and was removed; /a still holds /a/keep
        assert!(!tree.has_node("/a/b"));
        assert!(tree.has_node("/a"));
        assert!(tree.has_node("/a/keep"));

        assert!(tree.delete("/a/keep"));
        // the root itself is never deleted
        assert!(!tree.has_node("/a"));
        assert!(tree.has_node("/"));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_delete_directory_removes_subtree() {
        let mut tree = DirectoryTree::new();
        tree.create_file(&p("/d/x"), None);
        tree.create_file(&p("/d/sub/y"), None);

        assert!(tree.delete("/d"));
        assert_eq!(tree.node_count(), 1);
        assert!(!tree.delete("/d"));
        assert!(!tree.delete("/"));
    }

    #[test]
    fn test_lock_chain_matches_prefixes() {
        let mut tree = DirectoryTree::new();
        tree.create_file(&p("/a/b"), None);

        let chain = tree.lock_chain(&p("/a/b")).unwrap();
        let paths: Vec<&str> = chain.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/a", "/a/b"]);
        assert!(chain[2].is_file);
        assert!(!chain[0].is_file);

        assert!(tree.lock_chain(&p("/a/missing")).is_none());
    }
}
