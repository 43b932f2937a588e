//! MindMap - arena-backed editable tree.
//!
//! Nodes live in a petgraph `StableGraph` so indices survive removals, with
//! parent→child edges and a per-node ordered child list (sibling order is
//! meaningful and edges alone do not keep it). A string-id map gives O(1)
//! lookup. Every structural edit is validated before anything is touched,
//! so a rejected edit leaves the map unchanged.

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::Dfs;
use petgraph::{Directed, Direction};
use std::collections::HashMap;

use super::balance;
use super::node::{Node, Side};
use crate::error::TreeError;
use crate::layout::Point;

/// Node payload stored in the arena.
#[derive(Debug, Clone)]
struct MapNode {
    id: String,
    text: String,
    is_collapsed: bool,
    side: Option<Side>,
    manual: Option<Point>,
    /// Ordered children (the graph edges mirror this list).
    children: Vec<NodeIndex>,
}

impl MapNode {
    fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            text: node.text.clone(),
            is_collapsed: node.is_collapsed,
            side: node.side,
            manual: node.manual_position(),
            children: Vec::new(),
        }
    }

    fn leaf(id: String, text: String) -> Self {
        Self {
            id,
            text,
            is_collapsed: false,
            side: None,
            manual: None,
            children: Vec::new(),
        }
    }
}

/// An editable mind map.
#[derive(Debug, Clone)]
pub struct MindMap {
    graph: StableGraph<MapNode, (), Directed>,
    id_to_index: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

/// Borrowed view of one node in a [`MindMap`].
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    map: &'a MindMap,
    index: NodeIndex,
}

impl<'a> NodeRef<'a> {
    fn data(&self) -> &'a MapNode {
        &self.map.graph[self.index]
    }

    pub fn id(&self) -> &'a str {
        &self.data().id
    }

    pub fn text(&self) -> &'a str {
        &self.data().text
    }

    pub fn is_collapsed(&self) -> bool {
        self.data().is_collapsed
    }

    pub fn side(&self) -> Option<Side> {
        self.data().side
    }

    pub fn manual_position(&self) -> Option<Point> {
        self.data().manual
    }

    pub fn is_root(&self) -> bool {
        self.index == self.map.root
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.map.parent_index(self.index).map(|index| NodeRef {
            map: self.map,
            index,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let map = self.map;
        self.data()
            .children
            .iter()
            .map(move |&index| NodeRef { map, index })
    }
}

impl MindMap {
    /// Id given to the root of a fresh map.
    pub const ROOT_ID: &'static str = "root";

    /// Create a map holding only a root node.
    pub fn new(root_text: impl Into<String>) -> Self {
        let mut graph = StableGraph::new();
        let root = graph.add_node(MapNode::leaf(Self::ROOT_ID.to_string(), root_text.into()));
        let mut id_to_index = HashMap::new();
        id_to_index.insert(Self::ROOT_ID.to_string(), root);
        Self {
            graph,
            id_to_index,
            root,
        }
    }

    /// Build a map from a nested tree.
    ///
    /// Fails on empty or duplicate ids.
    pub fn from_node(root: &Node) -> Result<Self, TreeError> {
        if root.id.is_empty() {
            return Err(TreeError::EmptyId);
        }

        let node_count = root.count();
        let mut graph = StableGraph::with_capacity(node_count, node_count.saturating_sub(1));
        let mut id_to_index = HashMap::with_capacity(node_count);

        let root_index = graph.add_node(MapNode::from_node(root));
        id_to_index.insert(root.id.clone(), root_index);

        let mut stack: Vec<(NodeIndex, &Node)> = vec![(root_index, root)];
        while let Some((parent_index, parent)) = stack.pop() {
            for child in &parent.children {
                if child.id.is_empty() {
                    return Err(TreeError::EmptyId);
                }
                if id_to_index.contains_key(&child.id) {
                    return Err(TreeError::DuplicateId(child.id.clone()));
                }
                let index = graph.add_node(MapNode::from_node(child));
                graph.add_edge(parent_index, index, ());
                graph[parent_index].children.push(index);
                id_to_index.insert(child.id.clone(), index);
                stack.push((index, child));
            }
        }

        Ok(Self {
            graph,
            id_to_index,
            root: root_index,
        })
    }

    /// Snapshot the whole map as a nested tree.
    pub fn to_node(&self) -> Node {
        self.snapshot(self.root)
    }

    /// Rebuild the subtree under `index` without recursion.
    ///
    /// Descendants are visited in pre-order with the last child first, so
    /// walking that order backwards completes every child list left to right
    /// on top of `done` just before its parent needs it.
    fn snapshot(&self, index: NodeIndex) -> Node {
        let mut order = Vec::new();
        let mut stack = self.graph[index].children.clone();
        while let Some(next) = stack.pop() {
            order.push(next);
            stack.extend(self.graph[next].children.iter().copied());
        }

        let mut done: Vec<Node> = Vec::with_capacity(order.len());
        for &next in order.iter().rev() {
            let split = done.len() - self.graph[next].children.len();
            let children = done.split_off(split);
            done.push(self.shallow(next, children));
        }
        self.shallow(index, done)
    }

    fn shallow(&self, index: NodeIndex, children: Vec<Node>) -> Node {
        let data = &self.graph[index];
        Node {
            id: data.id.clone(),
            text: data.text.clone(),
            children,
            is_collapsed: data.is_collapsed,
            side: data.side,
            x: data.manual.map(|p| p.x),
            y: data.manual.map(|p| p.y),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            map: self,
            index: self.root,
        }
    }

    pub fn get(&self, id: &str) -> Option<NodeRef<'_>> {
        self.id_to_index
            .get(id)
            .map(|&index| NodeRef { map: self, index })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_to_index.contains_key(id)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// A map always has a root, so it is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn index(&self, id: &str) -> Result<NodeIndex, TreeError> {
        self.id_to_index
            .get(id)
            .copied()
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))
    }

    fn parent_index(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(index, Direction::Incoming)
            .next()
    }

    /// True if `target` lies in the subtree rooted at `ancestor` (inclusive).
    fn in_subtree(&self, ancestor: NodeIndex, target: NodeIndex) -> bool {
        let mut dfs = Dfs::new(&self.graph, ancestor);
        while let Some(index) = dfs.next(&self.graph) {
            if index == target {
                return true;
            }
        }
        false
    }

    fn check_new_id(&self, id: &str) -> Result<(), TreeError> {
        if id.is_empty() {
            return Err(TreeError::EmptyId);
        }
        if self.contains(id) {
            return Err(TreeError::DuplicateId(id.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    /// Append a new leaf under `parent` and expand the parent.
    pub fn add_child(
        &mut self,
        parent: &str,
        id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), TreeError> {
        let id = id.into();
        let parent_index = self.index(parent)?;
        self.check_new_id(&id)?;

        let index = self.attach(parent_index, MapNode::leaf(id, text.into()));
        let parent = &mut self.graph[parent_index];
        parent.children.push(index);
        parent.is_collapsed = false;
        Ok(())
    }

    /// Insert a new leaf right after `sibling`. The root has no siblings.
    pub fn add_sibling(
        &mut self,
        sibling: &str,
        id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), TreeError> {
        let id = id.into();
        let sibling_index = self.index(sibling)?;
        let parent_index = self
            .parent_index(sibling_index)
            .ok_or(TreeError::RootImmutable("given a sibling"))?;
        self.check_new_id(&id)?;

        let index = self.attach(parent_index, MapNode::leaf(id, text.into()));
        let parent = &mut self.graph[parent_index];
        let position = parent
            .children
            .iter()
            .position(|&c| c == sibling_index)
            .map_or(parent.children.len(), |p| p + 1);
        parent.children.insert(position, index);
        parent.is_collapsed = false;
        Ok(())
    }

    fn attach(&mut self, parent_index: NodeIndex, node: MapNode) -> NodeIndex {
        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.graph.add_edge(parent_index, index, ());
        self.id_to_index.insert(id, index);
        index
    }

    /// Remove a node with its whole subtree and return it detached.
    pub fn remove(&mut self, id: &str) -> Result<Node, TreeError> {
        let index = self.index(id)?;
        let parent_index = self
            .parent_index(index)
            .ok_or(TreeError::RootImmutable("removed"))?;

        let detached = self.snapshot(index);
        self.graph[parent_index].children.retain(|&c| c != index);

        let mut doomed = Vec::new();
        let mut dfs = Dfs::new(&self.graph, index);
        while let Some(n) = dfs.next(&self.graph) {
            doomed.push(n);
        }
        for n in doomed {
            if let Some(node) = self.graph.remove_node(n) {
                self.id_to_index.remove(&node.id);
            }
        }

        Ok(detached)
    }

    /// Re-parent `id` as the last child of `target` and expand the target.
    ///
    /// A node that stops being a top-level branch loses its side.
    pub fn move_node(&mut self, id: &str, target: &str) -> Result<(), TreeError> {
        let index = self.index(id)?;
        let target_index = self.index(target)?;
        let old_parent = self
            .parent_index(index)
            .ok_or(TreeError::RootImmutable("moved"))?;

        if self.in_subtree(index, target_index) {
            return Err(TreeError::Cycle {
                node: id.to_string(),
                target: target.to_string(),
            });
        }

        if let Some(edge) = self.graph.find_edge(old_parent, index) {
            self.graph.remove_edge(edge);
        }
        self.graph[old_parent].children.retain(|&c| c != index);

        self.graph.add_edge(target_index, index, ());
        let parent = &mut self.graph[target_index];
        parent.children.push(index);
        parent.is_collapsed = false;

        if target_index != self.root {
            self.graph[index].side = None;
        }
        Ok(())
    }

    // =========================================================================
    // Attribute edits
    // =========================================================================

    pub fn set_text(&mut self, id: &str, text: impl Into<String>) -> Result<(), TreeError> {
        let index = self.index(id)?;
        self.graph[index].text = text.into();
        Ok(())
    }

    /// Flip the collapsed flag. Returns the new state.
    pub fn toggle_collapse(&mut self, id: &str) -> Result<bool, TreeError> {
        let index = self.index(id)?;
        let node = &mut self.graph[index];
        node.is_collapsed = !node.is_collapsed;
        Ok(node.is_collapsed)
    }

    pub fn set_side(&mut self, id: &str, side: Option<Side>) -> Result<(), TreeError> {
        let index = self.index(id)?;
        if index == self.root {
            return Err(TreeError::RootImmutable("given a side"));
        }
        self.graph[index].side = side;
        Ok(())
    }

    /// Pin (or unpin with `None`) a node at a world-space center.
    pub fn set_manual_position(&mut self, id: &str, position: Option<Point>) -> Result<(), TreeError> {
        let index = self.index(id)?;
        self.graph[index].manual = position.filter(|p| p.is_finite());
        Ok(())
    }

    /// Run the balancer over the top-level branches.
    pub fn balance(&mut self) {
        let mut snapshot = self.to_node();
        balance::balance(&mut snapshot);
        for child in &snapshot.children {
            if let Some(&index) = self.id_to_index.get(&child.id) {
                self.graph[index].side = child.side;
            }
        }
    }
}

impl Default for MindMap {
    fn default() -> Self {
        Self::new("Central Topic")
    }
}
