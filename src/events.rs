//! Event definitions for the application event loop.
//!
//! Everything that happens off the controller task (a worker finishing, a key press,
//! a sidecar edited on disk, the release list arriving) reaches the controller as an
//! `Event` on a single channel.

use crossterm::event::KeyEvent;

use crate::panels::PanelKind;
use crate::params::Tool;
use crate::process::{CommandRequest, CommandResult};

#[derive(Debug, Clone)]
pub enum Event {
    /// A panel worker completed a command. Sent at most once per `start()`.
    CommandFinished {
        panel: PanelKind,
        request: CommandRequest,
        result: CommandResult,
    },
    /// A sidecar file changed on disk; `error` holds the parse failure, if any.
    SidecarChanged { tool: Tool, error: Option<String> },
    /// The CPython release list fetch finished.
    Releases(Result<Vec<String>, String>),
    /// A keyboard event received from the user.
    Key(KeyEvent),
    /// The terminal window was resized.
    Resize { width: u16, height: u16 },
    /// Ctrl-C or another request to exit.
    Shutdown,
}
