//! Data structures shared by the invoker, the workers and the panels.
//!
//! This module defines what a panel asks a worker to run (`CommandRequest`), what comes
//! back (`CommandResult`), and the lifecycle of a worker slot (`WorkerStatus`).

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// A single command handed to a panel's worker.
///
/// Created by a UI action, consumed exactly once, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    /// Dispatch-table key, e.g. `py_version` or `pack_pyinstaller`.
    pub name: String,
    /// Positional arguments; meaning depends on `name`.
    pub args: Vec<String>,
    /// Extra environment variables for the spawned process.
    pub env: HashMap<String, String>,
    /// Interpreter the command runs against, when it needs one. For pyenv commands this
    /// is the pyenv executable.
    pub interpreter: Option<PathBuf>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: HashMap<String, String>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn interpreter(mut self, python: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(python.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Returns the positional argument at `index`, or an empty string.
    pub fn arg_at(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Output carried by a `CommandResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Captured standard output, or an error message.
    Text(String),
    /// Line-by-line output of a streamed run.
    Lines(Vec<String>),
}

impl Default for CommandOutput {
    fn default() -> Self {
        CommandOutput::Text(String::new())
    }
}

/// Terminal outcome of a command. Never partial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub output: CommandOutput,
}

impl CommandResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            output: CommandOutput::Text(text.into()),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            success: false,
            output: CommandOutput::Text(text.into()),
        }
    }

    pub fn lines(success: bool, lines: Vec<String>) -> Self {
        Self {
            success,
            output: CommandOutput::Lines(lines),
        }
    }

    /// Flattens the output into a single newline-separated string.
    pub fn text(&self) -> String {
        match &self.output {
            CommandOutput::Text(text) => text.clone(),
            CommandOutput::Lines(lines) => lines.join("\n"),
        }
    }

    /// Output as individual lines, empty lines dropped.
    pub fn output_lines(&self) -> Vec<String> {
        match &self.output {
            CommandOutput::Text(text) => text
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            CommandOutput::Lines(lines) => lines.clone(),
        }
    }

    /// Appends a line, converting text output into line output.
    pub fn push_line(&mut self, line: impl Into<String>) {
        let line = line.into();
        match &mut self.output {
            CommandOutput::Lines(lines) => lines.push(line),
            CommandOutput::Text(text) => {
                let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
                lines.push(line);
                self.output = CommandOutput::Lines(lines);
            }
        }
    }
}

/// Lifecycle of a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerStatus {
    /// Nothing in flight; `start()` is accepted.
    #[default]
    Idle,
    /// A command is executing.
    Running,
    /// The in-flight command was stopped; its result will not be delivered.
    Cancelled,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Running => "running",
            WorkerStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
