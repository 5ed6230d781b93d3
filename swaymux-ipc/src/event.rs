//! Change payloads carried by event frames.

use serde::{Deserialize, Serialize};

use crate::node::Node;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceChangeKind {
    Init,
    Empty,
    Focus,
    Move,
    Rename,
    Urgent,
    Reload,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceChange {
    pub change: WorkspaceChangeKind,
    #[serde(default)]
    pub current: Option<Node>,
    #[serde(default)]
    pub old: Option<Node>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowChangeKind {
    New,
    Close,
    Focus,
    Title,
    FullscreenMode,
    Move,
    Floating,
    Urgent,
    Mark,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowChange {
    pub change: WindowChangeKind,
    pub container: Node,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModeChange {
    /// The custom name of the activated mode.
    pub change: String,
    #[serde(default)]
    pub pango_markup: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingChangeKind {
    Run,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Keyboard,
    Mouse,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BindingChange {
    pub change: BindingChangeKind,
    pub command: String,
    #[serde(default)]
    pub event_state_mask: Vec<String>,
    #[serde(default)]
    pub input_code: i32,
    #[serde(default)]
    pub symbol: Option<String>,
    pub input_type: InputKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownChangeKind {
    Exit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownChange {
    pub change: ShutdownChangeKind,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub payload: String,
}
