// Message and event codes per sway-ipc(7):
// https://man.archlinux.org/man/sway-ipc.7#MESSAGES_AND_REPLIES

use serde::Serialize;
use thiserror::Error;

/// High bit distinguishing event frames from command replies.
pub const EVENT_FLAG: u32 = 0x8000_0000;

#[derive(Debug, Error)]
pub enum PayloadTypeError {
    #[error("unknown command type `{0}`")]
    UnknownCommand(u32),
    #[error("unknown event type `{0}`")]
    UnknownEvent(u32),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PayloadType {
    /// Runs the payload as sway commands.
    RunCommand = 0,
    /// Get the list of current workspaces.
    GetWorkspaces = 1,
    /// Subscribe the IPC connection to the events listed in the payload.
    Subscribe = 2,
    /// Get the list of current outputs.
    GetOutputs = 3,
    /// Get the node layout tree.
    GetTree = 4,
    /// Get the names of all the marks currently set.
    GetMarks = 5,
    /// Get the specified bar config or a list of bar config names.
    GetBarConfig = 6,
    /// Get the version of sway that owns the IPC socket.
    GetVersion = 7,
    /// Get the list of binding mode names.
    GetBindingModes = 8,
    /// Returns the config that was last loaded.
    GetConfig = 9,
    /// Sends a tick event with the specified payload.
    SendTick = 10,
    /// Replies failure object for i3 compatibility.
    Sync = 11,
    /// Request the current binding state.
    GetBindingState = 12,
    /// Get the list of input devices.
    GetInputs = 100,
    /// Get the list of seats.
    GetSeats = 101,
}

impl TryFrom<u32> for PayloadType {
    type Error = PayloadTypeError;

    fn try_from(n: u32) -> Result<PayloadType, Self::Error> {
        match n {
            0 => Ok(PayloadType::RunCommand),
            1 => Ok(PayloadType::GetWorkspaces),
            2 => Ok(PayloadType::Subscribe),
            3 => Ok(PayloadType::GetOutputs),
            4 => Ok(PayloadType::GetTree),
            5 => Ok(PayloadType::GetMarks),
            6 => Ok(PayloadType::GetBarConfig),
            7 => Ok(PayloadType::GetVersion),
            8 => Ok(PayloadType::GetBindingModes),
            9 => Ok(PayloadType::GetConfig),
            10 => Ok(PayloadType::SendTick),
            11 => Ok(PayloadType::Sync),
            12 => Ok(PayloadType::GetBindingState),
            100 => Ok(PayloadType::GetInputs),
            101 => Ok(PayloadType::GetSeats),
            v => Err(PayloadTypeError::UnknownCommand(v)),
        }
    }
}

/// Source: https://man.archlinux.org/man/sway-ipc.7#EVENTS
///
/// On the wire an event type is `EVENT_FLAG | discriminant`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Sent whenever an event involving a workspace occurs, such as
    /// initialization of a new workspace or a different workspace gaining
    /// focus.
    Workspace = 0,
    /// Sent when outputs are updated.
    Output = 1,
    /// Sent whenever the binding mode changes.
    Mode = 2,
    /// Sent whenever an event involving a window occurs, such as being
    /// reparented, focused, or closed.
    Window = 3,
    /// Sent whenever a bar config changes.
    BarconfigUpdate = 4,
    /// Sent when a configured binding is executed.
    Binding = 5,
    /// Sent when the ipc shuts down because sway is exiting.
    Shutdown = 6,
    /// Sent when an ipc client sends a SEND_TICK message.
    Tick = 7,
    /// Sent when the visibility of a bar should change due to a modifier.
    BarStateUpdate = 0x14,
    /// Sent when something related to input devices changes.
    Input = 0x15,
}

impl EventType {
    /// The payload-type code this event carries on the wire.
    pub const fn wire_code(self) -> u32 {
        EVENT_FLAG | self as u32
    }

    /// Recovers an event type from a wire payload-type code. `None` when
    /// the event flag is missing or the low bits name no known event.
    pub fn from_wire(code: u32) -> Option<EventType> {
        if code & EVENT_FLAG == 0 {
            return None;
        }

        EventType::try_from(code ^ EVENT_FLAG).ok()
    }

    /// The protocol name used in subscribe payloads.
    pub const fn name(self) -> &'static str {
        match self {
            EventType::Workspace => "workspace",
            EventType::Output => "output",
            EventType::Mode => "mode",
            EventType::Window => "window",
            EventType::BarconfigUpdate => "barconfig_update",
            EventType::Binding => "binding",
            EventType::Shutdown => "shutdown",
            EventType::Tick => "tick",
            EventType::BarStateUpdate => "bar_state_update",
            EventType::Input => "input",
        }
    }

    pub fn from_name(name: &str) -> Option<EventType> {
        match name {
            "workspace" => Some(EventType::Workspace),
            "output" => Some(EventType::Output),
            "mode" => Some(EventType::Mode),
            "window" => Some(EventType::Window),
            "barconfig_update" => Some(EventType::BarconfigUpdate),
            "binding" => Some(EventType::Binding),
            "shutdown" => Some(EventType::Shutdown),
            "tick" => Some(EventType::Tick),
            "bar_state_update" => Some(EventType::BarStateUpdate),
            "input" => Some(EventType::Input),
            _ => None,
        }
    }
}

impl TryFrom<u32> for EventType {
    type Error = PayloadTypeError;

    fn try_from(n: u32) -> Result<EventType, Self::Error> {
        match n {
            0 => Ok(EventType::Workspace),
            1 => Ok(EventType::Output),
            2 => Ok(EventType::Mode),
            3 => Ok(EventType::Window),
            4 => Ok(EventType::BarconfigUpdate),
            5 => Ok(EventType::Binding),
            6 => Ok(EventType::Shutdown),
            7 => Ok(EventType::Tick),
            0x14 => Ok(EventType::BarStateUpdate),
            0x15 => Ok(EventType::Input),
            v => Err(PayloadTypeError::UnknownEvent(v)),
        }
    }
}
