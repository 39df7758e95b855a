//! # Block tree
//!
//! Test blocks are stored in an arena: every [`BlockNode`] lives in one
//! `Vec` owned by [`BlockTree`], and parent/child relations are [`NodeId`]
//! indices. Node ids are assigned in creation order, so a parent always has a
//! smaller id than its children.
//!
//! Index 0 is the synthetic root group of a suite file.

use std::collections::BTreeSet;
use std::fmt;

use crate::config::Filter;
use crate::errors::{BrambleError, Result};
use crate::suite::{Hooks, TestBody};

pub mod expand;

use expand::{DataBinding, Expansion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Leaf,
}

/// Whether a node takes part in the Run phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Run,
    Skipped,
    Filtered,
}

/// A group or test in the block tree.
pub struct BlockNode {
    pub id: NodeId,
    pub name: String,
    /// Name as declared, before data templating.
    pub declared_name: String,
    /// Dotted path from the first level below the root.
    pub full_name: String,
    pub kind: NodeKind,
    pub tags: BTreeSet<String>,
    pub skip: bool,
    pub focus: bool,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub line: u32,
    pub data: Option<DataBinding>,
    pub expansion: Option<Expansion>,
    pub selection: Selection,
    pub(crate) body: Option<TestBody>,
    pub(crate) hooks: Hooks,
}

impl fmt::Debug for BlockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("tags", &self.tags)
            .field("skip", &self.skip)
            .field("focus", &self.focus)
            .field("children", &self.children)
            .field("parent", &self.parent)
            .field("line", &self.line)
            .field("data", &self.data)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

/// Everything needed to create a node under a parent.
#[derive(Default)]
pub struct NodeSpec {
    pub name: String,
    pub declared_name: String,
    pub kind: Option<NodeKind>,
    pub tags: BTreeSet<String>,
    pub skip: bool,
    pub focus: bool,
    pub line: u32,
    pub data: Option<DataBinding>,
    pub expansion: Option<Expansion>,
    pub body: Option<TestBody>,
}

#[derive(Debug)]
pub struct BlockTree {
    nodes: Vec<BlockNode>,
}

impl BlockTree {
    pub fn new(root_name: &str) -> Self {
        let root = BlockNode {
            id: NodeId(0),
            name: root_name.to_string(),
            declared_name: root_name.to_string(),
            full_name: String::new(),
            kind: NodeKind::Group,
            tags: BTreeSet::new(),
            skip: false,
            focus: false,
            children: Vec::new(),
            parent: None,
            line: 0,
            data: None,
            expansion: None,
            selection: Selection::Run,
            body: None,
            hooks: Hooks::default(),
        };
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &BlockNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut BlockNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&BlockNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockNode> {
        self.nodes.iter()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Appends a node as the last child of `parent`.
    ///
    /// `focus` is cleared when `skip` is also set: skip wins.
    pub fn add_child(&mut self, parent: NodeId, spec: NodeSpec) -> Result<NodeId> {
        let parent_node = self
            .get(parent)
            .ok_or_else(|| BrambleError::fault(format!("no block {} in tree", parent)))?;
        if parent_node.kind == NodeKind::Leaf {
            return Err(BrambleError::fault(format!(
                "test '{}' cannot contain other blocks",
                parent_node.name
            )));
        }
        let full_name = if parent_node.parent.is_none() {
            spec.name.clone()
        } else {
            format!("{}.{}", parent_node.full_name, spec.name)
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(BlockNode {
            id,
            name: spec.name,
            declared_name: spec.declared_name,
            full_name,
            kind: spec.kind.unwrap_or(NodeKind::Leaf),
            tags: spec.tags,
            skip: spec.skip,
            focus: spec.focus && !spec.skip,
            children: Vec::new(),
            parent: Some(parent),
            line: spec.line,
            data: spec.data,
            expansion: spec.expansion,
            selection: Selection::Run,
            body: spec.body,
            hooks: Hooks::default(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Drops every node except the root. Root hooks survive.
    pub(crate) fn reset(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0].children.clear();
    }

    /// Parent chain of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.node(id).parent,
        }
    }

    /// `id` followed by its ancestors.
    fn lineage(&self, id: NodeId) -> impl Iterator<Item = &BlockNode> {
        std::iter::once(self.node(id)).chain(self.ancestors(id))
    }

    pub fn is_skipped(&self, id: NodeId) -> bool {
        self.lineage(id).any(|n| n.skip)
    }

    pub fn is_focused(&self, id: NodeId) -> bool {
        self.lineage(id).any(|n| n.focus)
    }

    pub fn has_focus(&self) -> bool {
        self.nodes.iter().any(|n| n.focus)
    }

    /// Nearest data binding on `id` or an ancestor.
    pub fn binding(&self, id: NodeId) -> Option<&DataBinding> {
        self.lineage(id).find_map(|n| n.data.as_ref())
    }

    /// Own tags plus every ancestor's.
    pub fn effective_tags(&self, id: NodeId) -> BTreeSet<String> {
        self.lineage(id)
            .flat_map(|n| n.tags.iter().cloned())
            .collect()
    }

    /// Leaves below `id` (or `id` itself if it is a leaf), in declaration order.
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.node(next);
            match node.kind {
                NodeKind::Leaf => out.push(next),
                NodeKind::Group => stack.extend(node.children.iter().rev()),
            }
        }
        out
    }

    /// Decides which nodes run, from skip flags, the filter, and focus.
    pub fn plan(&mut self, filter: &Filter) {
        let focus_active = self.has_focus();
        for idx in 0..self.nodes.len() {
            let id = NodeId(idx);
            if self.nodes[idx].kind != NodeKind::Leaf {
                continue;
            }
            let selection = if self.is_skipped(id) {
                Selection::Skipped
            } else if !filter.allows(self, id) || (focus_active && !self.is_focused(id)) {
                Selection::Filtered
            } else {
                Selection::Run
            };
            self.nodes[idx].selection = selection;
        }
        // Children always have larger ids than their parent.
        for idx in (0..self.nodes.len()).rev() {
            if self.nodes[idx].kind != NodeKind::Group {
                continue;
            }
            let any_runs = self.nodes[idx]
                .children
                .iter()
                .any(|c| self.nodes[c.0].selection == Selection::Run);
            self.nodes[idx].selection = if self.nodes[idx].skip {
                Selection::Skipped
            } else if any_runs {
                Selection::Run
            } else {
                Selection::Filtered
            };
        }
    }

    /// Indented outline, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(self.root(), 0, &mut out);
        out
    }

    fn render_into(&self, id: NodeId, depth: usize, out: &mut String) {
        for child in self.children(id) {
            let node = self.node(*child);
            let marker = match node.kind {
                NodeKind::Group => "+",
                NodeKind::Leaf => "-",
            };
            out.push_str(&"  ".repeat(depth));
            out.push_str(marker);
            out.push(' ');
            out.push_str(&node.name);
            if !node.tags.is_empty() {
                let tags: Vec<&str> = node.tags.iter().map(String::as_str).collect();
                out.push_str(&format!(" [{}]", tags.join(", ")));
            }
            if node.skip {
                out.push_str(" (skip)");
            } else if node.focus {
                out.push_str(" (focus)");
            }
            out.push('\n');
            self.render_into(*child, depth + 1, out);
        }
    }
}

pub struct Ancestors<'t> {
    tree: &'t BlockTree,
    next: Option<NodeId>,
}

impl<'t> Iterator for Ancestors<'t> {
    type Item = &'t BlockNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.tree.node(self.next?);
        self.next = node.parent;
        Some(node)
    }
}
