// Test tree model and builder. The tree is rebuilt wholesale on every
// discovery pass: ids are only stable within one pass, and the side
// index is rebuilt alongside so result correlation never sees a stale
// node.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

pub const ROOT_ID: &str = "root";
pub const ROOT_LABEL: &str = "luatest";

/// A node in the test tree: either a suite (the root, a file, or a
/// group) with ordered children, or a test leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Suite {
        id: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        children: Vec<TreeNode>,
    },
    Test {
        id: String,
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        /// Zero-based source line, when statically known.
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
}

impl TreeNode {
    pub fn id(&self) -> &str {
        match self {
            TreeNode::Suite { id, .. } | TreeNode::Test { id, .. } => id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TreeNode::Suite { label, .. } | TreeNode::Test { label, .. } => label,
        }
    }

    pub fn file(&self) -> Option<&Path> {
        match self {
            TreeNode::Suite { file, .. } | TreeNode::Test { file, .. } => file.as_deref(),
        }
    }

    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Suite { children, .. } => children,
            TreeNode::Test { .. } => &[],
        }
    }

    pub fn is_suite(&self) -> bool {
        matches!(self, TreeNode::Suite { .. })
    }

    /// Depth-first search by id.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id() == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    fn empty_root() -> TreeNode {
        TreeNode::Suite {
            id: ROOT_ID.to_string(),
            label: ROOT_LABEL.to_string(),
            file: None,
            children: Vec::new(),
        }
    }
}

/// Key of the side index: (group label, test label).
pub type ResultKey = (String, String);

/// Assembles discovered tests into the file → group → test hierarchy
/// and the side index used for result correlation. All scan strategies
/// feed this one builder so they produce identical shapes.
#[derive(Debug)]
pub struct TreeBuilder {
    workspace: PathBuf,
    files: IndexMap<String, FileEntry>,
    index: HashMap<ResultKey, String>,
    next_test_id: u32,
    next_group_id: u32,
}

#[derive(Debug)]
struct FileEntry {
    file: PathBuf,
    groups: IndexMap<String, GroupEntry>,
    ungrouped: Vec<TreeNode>,
}

#[derive(Debug)]
struct GroupEntry {
    id: String,
    tests: Vec<TreeNode>,
}

impl TreeBuilder {
    pub fn new(workspace: &Path) -> Self {
        TreeBuilder {
            workspace: workspace.to_path_buf(),
            files: IndexMap::new(),
            index: HashMap::new(),
            next_test_id: 1,
            next_group_id: 1,
        }
    }

    /// Add one test leaf. `group` is the exact group name reported by
    /// the runner (parametrization already encoded); `label` is the
    /// fully-qualified case name. File suites and group suites are
    /// created on first encounter, so empty suites never exist.
    pub fn add_test(&mut self, file: &Path, group: Option<&str>, label: &str, line: Option<u32>) {
        let file = if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.workspace.join(file)
        };
        let relative = file
            .strip_prefix(&self.workspace)
            .unwrap_or(&file)
            .to_string_lossy()
            .into_owned();

        let test_id = self.next_test_id.to_string();
        self.next_test_id += 1;
        let test = TreeNode::Test {
            id: test_id.clone(),
            label: label.to_string(),
            file: Some(file.clone()),
            line,
        };

        let entry = self
            .files
            .entry(relative)
            .or_insert_with(|| FileEntry {
                file,
                groups: IndexMap::new(),
                ungrouped: Vec::new(),
            });

        match group {
            Some(group_name) => {
                let next_group_id = &mut self.next_group_id;
                let group_entry = entry
                    .groups
                    .entry(group_name.to_string())
                    .or_insert_with(|| {
                        let id = format!("luatestGroup{next_group_id}");
                        *next_group_id += 1;
                        GroupEntry {
                            id,
                            tests: Vec::new(),
                        }
                    });
                group_entry.tests.push(test);
                self.index
                    .insert((group_name.to_string(), label.to_string()), test_id);
            }
            None => entry.ungrouped.push(test),
        }
    }

    /// Assemble the root suite and the side index. File-suite ids are
    /// the workspace-relative path, which is unique per file.
    pub fn finish(self) -> (TreeNode, HashMap<ResultKey, String>) {
        let mut root_children = Vec::with_capacity(self.files.len());
        for (relative, entry) in self.files {
            let mut children: Vec<TreeNode> = entry
                .groups
                .into_iter()
                .map(|(group_name, group_entry)| TreeNode::Suite {
                    id: group_entry.id,
                    label: group_name,
                    file: Some(entry.file.clone()),
                    children: group_entry.tests,
                })
                .collect();
            children.extend(entry.ungrouped);
            root_children.push(TreeNode::Suite {
                id: relative.clone(),
                label: relative,
                file: None,
                children,
            });
        }
        let root = TreeNode::Suite {
            id: ROOT_ID.to_string(),
            label: ROOT_LABEL.to_string(),
            file: None,
            children: root_children,
        };
        (root, self.index)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// One workspace's discovery state: the tree plus the side index.
/// Replaced wholesale by each discovery pass; callers must not cache
/// node ids across reloads.
#[derive(Debug)]
pub struct DiscoverySession {
    workspace: PathBuf,
    root: TreeNode,
    group_results: HashMap<ResultKey, String>,
}

impl DiscoverySession {
    pub fn new(workspace: &Path) -> Self {
        DiscoverySession {
            workspace: workspace.to_path_buf(),
            root: TreeNode::empty_root(),
            group_results: HashMap::new(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// True once a discovery pass has populated the tree.
    pub fn is_loaded(&self) -> bool {
        !self.root.children().is_empty()
    }

    pub(crate) fn install(&mut self, root: TreeNode, index: HashMap<ResultKey, String>) {
        self.root = root;
        self.group_results = index;
    }

    pub fn find_node(&self, id: &str) -> Option<&TreeNode> {
        self.root.find(id)
    }

    /// Resolve a reported result to its tree node via the side index.
    pub fn resolve_result(&self, group: &str, test: &str) -> Option<&TreeNode> {
        let id = self
            .group_results
            .get(&(group.to_string(), test.to_string()))?;
        self.root.find(id)
    }

    pub fn index_len(&self) -> usize {
        self.group_results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assigns_sequential_test_ids_from_one() {
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        builder.add_test(Path::new("a_test.lua"), Some("g"), "g.test_a", None);
        builder.add_test(Path::new("a_test.lua"), Some("g"), "g.test_b", None);
        let (root, index) = builder.finish();
        assert_eq!(index[&("g".to_string(), "g.test_a".to_string())], "1");
        assert_eq!(index[&("g".to_string(), "g.test_b".to_string())], "2");
        assert_eq!(root.find("1").unwrap().label(), "g.test_a");
    }

    #[test]
    fn file_suite_id_is_relative_path() {
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        builder.add_test(Path::new("/ws/spec/a_test.lua"), Some("g"), "g.test_a", None);
        let (root, _) = builder.finish();
        let file_suite = &root.children()[0];
        assert_eq!(file_suite.id(), "spec/a_test.lua");
        assert_eq!(file_suite.label(), "spec/a_test.lua");
    }

    #[test]
    fn group_suites_get_prefixed_ids() {
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        builder.add_test(Path::new("a_test.lua"), Some("g1"), "g1.test_a", None);
        builder.add_test(Path::new("a_test.lua"), Some("g2"), "g2.test_b", None);
        let (root, _) = builder.finish();
        let file_suite = &root.children()[0];
        assert_eq!(file_suite.children()[0].id(), "luatestGroup1");
        assert_eq!(file_suite.children()[1].id(), "luatestGroup2");
    }

    #[test]
    fn ungrouped_tests_sit_directly_under_the_file_suite() {
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        builder.add_test(Path::new("a_test.lua"), None, "test_plain", None);
        let (root, index) = builder.finish();
        let file_suite = &root.children()[0];
        assert!(!file_suite.children()[0].is_suite());
        assert!(index.is_empty());
    }

    #[test]
    fn session_resolves_results_through_the_index() {
        let mut builder = TreeBuilder::new(Path::new("/ws"));
        builder.add_test(Path::new("a_test.lua"), Some("g"), "g.test_a", Some(4));
        let (root, index) = builder.finish();
        let mut session = DiscoverySession::new(Path::new("/ws"));
        session.install(root, index);
        let node = session.resolve_result("g", "g.test_a").unwrap();
        assert_eq!(node.label(), "g.test_a");
        assert!(session.resolve_result("g", "g.test_missing").is_none());
    }
}
