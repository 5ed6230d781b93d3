//! The layout tree model and search utilities.
//!
//! Trees are point-in-time snapshots produced by a get-tree call. Children
//! are exclusively owned by their parent node and there are no parent
//! back-references; parent lookup is a search over the snapshot.

use serde::{Deserialize, Serialize};

use crate::reply::Rect;

/// Name of the workspace backing the scratchpad.
pub const SCRATCHPAD_NAME: &str = "__i3_scratch";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Root,
    Output,
    Workspace,
    #[default]
    Con,
    FloatingCon,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeBorder {
    Normal,
    #[default]
    None,
    Pixel,
    Csd,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLayout {
    Splith,
    Splitv,
    Stacked,
    Tabbed,
    Output,
    #[default]
    None,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Vertical,
    Horizontal,
    #[default]
    None,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowProperties {
    pub class: Option<String>,
    pub instance: Option<String>,
    pub transient_for: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: i64,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub border: NodeBorder,
    pub current_border_width: i32,
    pub layout: NodeLayout,
    pub orientation: Orientation,
    pub percent: Option<f64>,
    pub rect: Rect,
    pub window_rect: Rect,
    pub deco_rect: Rect,
    pub geometry: Rect,
    pub urgent: Option<bool>,
    pub sticky: bool,
    pub marks: Vec<String>,
    pub focused: bool,
    pub focus: Vec<i64>,
    pub nodes: Vec<Node>,
    pub floating_nodes: Vec<Node>,
    pub representation: Option<String>,
    pub fullscreen_mode: Option<u8>,
    pub app_id: Option<String>,
    pub pid: Option<i32>,
    pub visible: Option<bool>,
    pub shell: Option<String>,
    pub window: Option<i64>,
    pub window_properties: Option<WindowProperties>,
}

impl Node {
    /// Depth-first, pre-order: a node is visited before its children, and
    /// its `nodes` before its `floating_nodes`. Returns the first node the
    /// predicate holds for.
    pub fn first<P>(&self, predicate: &P) -> Option<&Node>
    where
        P: Fn(&Node) -> bool + ?Sized,
    {
        if predicate(self) {
            return Some(self);
        }

        for n in &self.nodes {
            if let Some(found) = n.first(predicate) {
                return Some(found);
            }
        }

        for n in &self.floating_nodes {
            if let Some(found) = n.first(predicate) {
                return Some(found);
            }
        }

        None
    }

    /// Counts matching nodes in [`Node::first`] traversal order.
    pub fn count<P>(&self, predicate: &P) -> usize
    where
        P: Fn(&Node) -> bool + ?Sized,
    {
        let mut total = usize::from(predicate(self));

        for n in &self.nodes {
            total += n.count(predicate);
        }

        for n in &self.floating_nodes {
            total += n.count(predicate);
        }

        total
    }

    /// First node (traversal order) whose immediate `nodes` contain
    /// `child_id`. No parent index is kept; cost is proportional to the
    /// tree size per call.
    pub fn find_parent(&self, child_id: i64) -> Option<&Node> {
        self.first(&match_parent_of(child_id))
    }

    pub fn is_leaf(&self) -> bool {
        self.nodes.is_empty() && self.floating_nodes.is_empty()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_scratchpad(&self) -> bool {
        self.name.as_deref() == Some(SCRATCHPAD_NAME)
    }
}

pub fn is_leaf(n: &Node) -> bool {
    n.is_leaf()
}

pub fn is_focused(n: &Node) -> bool {
    n.focused
}

pub fn match_name(name: &str) -> impl Fn(&Node) -> bool + '_ {
    move |n| n.name.as_deref() == Some(name)
}

pub fn match_type(node_type: NodeType) -> impl Fn(&Node) -> bool {
    move |n| n.node_type == node_type
}

pub fn match_and(
    left: impl Fn(&Node) -> bool,
    right: impl Fn(&Node) -> bool,
) -> impl Fn(&Node) -> bool {
    move |n| left(n) && right(n)
}

pub fn match_not(predicate: impl Fn(&Node) -> bool) -> impl Fn(&Node) -> bool {
    move |n| !predicate(n)
}

/// Matches a node whose immediate `nodes` contain the given child id.
pub fn match_parent_of(child_id: i64) -> impl Fn(&Node) -> bool {
    move |n| n.nodes.iter().any(|c| c.id == child_id)
}
