//! External command execution.
//!
//! `ProcessInvoker` runs one external command at a time and normalizes the outcome into
//! a `CommandResult`. A non-zero exit never becomes an `Err`: it is reported as a failed
//! result carrying the error text. The invoker remembers the in-flight process so that
//! `terminate` can kill it, together with its children, from another task.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::output::{clean_line, LogBuffer, LogLine, StreamKind};
use crate::process::CommandResult;

/// What to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Program followed by its arguments, no shell involved.
    Argv(Vec<String>),
    /// A command line interpreted by the platform shell.
    Shell(String),
}

impl Invocation {
    pub fn argv<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::Argv(parts.into_iter().map(Into::into).collect())
    }

    fn command(&self) -> Option<Command> {
        match self {
            Invocation::Argv(parts) => {
                let (program, args) = parts.split_first()?;
                let mut command = Command::new(program);
                command.args(args);
                Some(command)
            }
            Invocation::Shell(line) => {
                if line.trim().is_empty() {
                    return None;
                }
                Some(shell_command(line))
            }
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Argv(parts) => f.write_str(&shell_words::join(parts)),
            Invocation::Shell(line) => f.write_str(line),
        }
    }
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").raw_arg(line);
    command
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

/// Runs external commands for one worker slot.
#[derive(Debug)]
pub struct ProcessInvoker {
    current: Mutex<Option<u32>>,
    verbose_tools: Vec<String>,
    tail_lines: usize,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        ProcessInvoker::new(vec!["nuitka".to_string()], 50)
    }
}

impl ProcessInvoker {
    /// `verbose_tools` are matched case-insensitively against streamed command lines;
    /// matching runs keep only their last `tail_lines` lines.
    pub fn new(verbose_tools: Vec<String>, tail_lines: usize) -> Self {
        Self {
            current: Mutex::new(None),
            verbose_tools: verbose_tools
                .into_iter()
                .map(|tool| tool.to_ascii_lowercase())
                .collect(),
            tail_lines,
        }
    }

    /// Pid of the in-flight process, if any.
    pub fn current_pid(&self) -> Option<u32> {
        *self.slot()
    }

    pub fn is_verbose(&self, command_line: &str) -> bool {
        let lowered = command_line.to_ascii_lowercase();
        self.verbose_tools
            .iter()
            .any(|tool| !tool.is_empty() && lowered.contains(tool.as_str()))
    }

    /// Runs to completion and captures both streams.
    ///
    /// Success (exit code 0) yields standard output; failure yields `Error: <stderr>`.
    pub async fn run_captured(
        &self,
        invocation: &Invocation,
        env: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> CommandResult {
        let Some(mut command) = invocation.command() else {
            return CommandResult::failure("Error: empty command");
        };
        prepare(&mut command, env, cwd);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::debug!("running {}", invocation);
        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                log::warn!("failed to start {}: {}", invocation, err);
                return CommandResult::failure(format!(
                    "Error: failed to start {}: {}",
                    invocation, err
                ));
            }
        };
        self.track(child.id());
        let output = child.wait_with_output().await;
        self.untrack();

        let output = match output {
            Ok(output) => output,
            Err(err) => return CommandResult::failure(format!("Error: {}", err)),
        };
        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        if output.status.success() {
            return CommandResult::ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let detail = if stderr.is_empty() {
            exit_description(output.status)
        } else {
            stderr
        };
        log::debug!("{} failed: {}", invocation, detail);
        CommandResult::failure(format!("Error: {}", detail))
    }

    /// Runs a shell command line, collecting cleaned output lines as they arrive.
    ///
    /// Blank lines are dropped. Verbose tools keep only their last lines.
    pub async fn run_streamed(
        &self,
        command_line: &str,
        env: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> CommandResult {
        let invocation = Invocation::Shell(command_line.to_string());
        let Some(mut command) = invocation.command() else {
            return CommandResult::lines(false, vec!["Error: empty command".to_string()]);
        };
        prepare(&mut command, env, cwd);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::debug!("streaming {}", command_line);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return CommandResult::lines(
                    false,
                    vec![format!("Error: failed to start {}: {}", command_line, err)],
                );
            }
        };
        self.track(child.id());

        let (tx, mut rx) = mpsc::channel(256);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_stream(StreamKind::Stdout, stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_stream(StreamKind::Stderr, stderr, tx.clone()));
        }
        drop(tx);

        let mut buffer = if self.is_verbose(command_line) {
            LogBuffer::new(self.tail_lines)
        } else {
            LogBuffer::unbounded()
        };
        let mut read_error = None;
        let mut dropped = 0usize;
        while let Some(message) = rx.recv().await {
            match message {
                Ok(line) => {
                    if buffer.push(line) {
                        dropped += 1;
                    }
                }
                Err(err) => read_error = Some(err),
            }
        }

        let status = child.wait().await;
        self.untrack();
        log::debug!(
            "{}: kept {} lines ({} from stderr), dropped {}",
            command_line,
            buffer.len(),
            buffer.stderr_lines(),
            dropped
        );

        let mut lines = buffer.into_lines();
        if let Some(err) = read_error {
            lines.push(format!("Error: {}", err));
            return CommandResult::lines(false, lines);
        }
        match status {
            Ok(status) if status.success() => CommandResult::lines(true, lines),
            Ok(status) => {
                log::debug!("{} failed: {}", command_line, exit_description(status));
                CommandResult::lines(false, lines)
            }
            Err(err) => {
                lines.push(format!("Error: {}", err));
                CommandResult::lines(false, lines)
            }
        }
    }

    /// Starts a GUI program without waiting for it or tracking it.
    pub fn spawn_detached(
        &self,
        invocation: &Invocation,
        env: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> CommandResult {
        let Some(mut command) = invocation.command() else {
            return CommandResult::failure("Error: empty command");
        };
        if !env.is_empty() {
            command.envs(env);
        }
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match command.spawn() {
            Ok(child) => {
                log::info!("started {} (pid {})", invocation, child.id().unwrap_or(0));
                CommandResult::ok(format!("started {}", invocation))
            }
            Err(err) => CommandResult::failure(format!(
                "Error: failed to start {}: {}",
                invocation, err
            )),
        }
    }

    /// Kills the in-flight process and its children. A no-op when nothing is running.
    pub fn terminate(&self) {
        let Some(pid) = self.slot().take() else {
            log::debug!("terminate: no process");
            return;
        };
        log::debug!("terminating process tree {}", pid);
        kill_tree(pid);
    }

    fn track(&self, pid: Option<u32>) {
        *self.slot() = pid;
    }

    fn untrack(&self) {
        *self.slot() = None;
    }

    fn slot(&self) -> MutexGuard<'_, Option<u32>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn prepare(command: &mut Command, env: &HashMap<String, String>, cwd: Option<&Path>) {
    if !env.is_empty() {
        command.envs(env);
    }
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    command.kill_on_drop(true);

    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        command.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
    }

    #[cfg(unix)]
    unsafe {
        command.pre_exec(|| {
            let _ = libc::setpgid(0, 0);
            Ok(())
        });
    }
}

fn exit_description(status: std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(unix)]
fn kill_tree(pid: u32) {
    let pid = pid as i32;
    unsafe {
        let _ = libc::kill(-pid, libc::SIGKILL);
        let _ = libc::kill(pid, libc::SIGKILL);
    }
}

#[cfg(windows)]
fn kill_tree(pid: u32) {
    use windows_sys::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};
    unsafe {
        let _ = GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid);
    }
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(all(not(unix), not(windows)))]
fn kill_tree(_pid: u32) {}

async fn read_stream<R>(stream: StreamKind, reader: R, tx: mpsc::Sender<Result<LogLine, String>>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(raw)) => {
                if let Some(text) = clean_line(&raw) {
                    let _ = tx.send(Ok(LogLine { text, stream })).await;
                }
            }
            Ok(None) => break,
            Err(err) => {
                let _ = tx.send(Err(err.to_string())).await;
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use std::time::Duration;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[tokio::test]
    async fn captured_success_returns_stdout() {
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_captured(
                &Invocation::argv(["sh", "-c", "echo out; echo err >&2"]),
                &no_env(),
                None,
            )
            .await;
        assert_eq!(result, CommandResult::ok("out"));
        assert_eq!(invoker.current_pid(), None);
    }

    #[tokio::test]
    async fn captured_failure_uses_stderr_not_stdout() {
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_captured(
                &Invocation::Shell("echo visible; echo broken >&2; exit 3".into()),
                &no_env(),
                None,
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.text(), "Error: broken");
    }

    #[tokio::test]
    async fn captured_failure_without_stderr_reports_exit_code() {
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_captured(&Invocation::Shell("exit 2".into()), &no_env(), None)
            .await;
        assert_eq!(result, CommandResult::failure("Error: exited with code 2"));
    }

    #[tokio::test]
    async fn missing_program_is_a_failure_result() {
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_captured(
                &Invocation::argv(["/definitely/not/a/program"]),
                &no_env(),
                None,
            )
            .await;
        assert!(!result.success);
        assert!(result.text().starts_with("Error: failed to start"));
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = HashMap::new();
        env.insert("PYCREATOR_PROBE".to_string(), "42".to_string());
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_captured(
                &Invocation::Shell("echo $PYCREATOR_PROBE; pwd".into()),
                &env,
                Some(dir.path()),
            )
            .await;
        let text = result.text();
        assert!(text.starts_with("42\n"));
        let canonical = dir.path().canonicalize().unwrap();
        assert!(text.ends_with(&canonical.display().to_string()));
    }

    #[tokio::test]
    async fn streamed_skips_blank_lines_and_trims() {
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_streamed("printf '  a  \\n\\n\\tb\\n'", &no_env(), None)
            .await;
        assert_eq!(
            result.output,
            CommandOutput::Lines(vec!["a".to_string(), "b".to_string()])
        );
        assert!(result.success);
    }

    #[tokio::test]
    async fn streamed_verbose_tool_keeps_last_fifty_lines() {
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_streamed(
                "echo Nuitka-Options: starting; i=1; while [ $i -le 120 ]; do echo line $i; i=$((i+1)); done",
                &no_env(),
                None,
            )
            .await;
        let lines = result.output_lines();
        assert_eq!(lines.len(), 50);
        assert_eq!(lines.first().map(String::as_str), Some("line 71"));
        assert_eq!(lines.last().map(String::as_str), Some("line 120"));
    }

    #[tokio::test]
    async fn streamed_other_tools_are_not_truncated() {
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_streamed(
                "i=1; while [ $i -le 120 ]; do echo line $i; i=$((i+1)); done",
                &no_env(),
                None,
            )
            .await;
        assert_eq!(result.output_lines().len(), 120);
    }

    #[tokio::test]
    async fn streamed_failure_keeps_output() {
        let invoker = ProcessInvoker::default();
        let result = invoker
            .run_streamed("echo building; echo bad >&2; exit 1", &no_env(), None)
            .await;
        assert!(!result.success);
        let lines = result.output_lines();
        assert!(lines.contains(&"building".to_string()));
        assert!(lines.contains(&"bad".to_string()));
    }

    #[test]
    fn terminate_without_process_is_noop() {
        let invoker = ProcessInvoker::default();
        invoker.terminate();
        invoker.terminate();
        assert_eq!(invoker.current_pid(), None);
    }

    #[tokio::test]
    async fn terminate_kills_running_process() {
        let invoker = std::sync::Arc::new(ProcessInvoker::default());
        let runner = invoker.clone();
        let handle = tokio::spawn(async move {
            runner
                .run_captured(&Invocation::Shell("sleep 30".into()), &HashMap::new(), None)
                .await
        });
        for _ in 0..100 {
            if invoker.current_pid().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(invoker.current_pid().is_some());
        invoker.terminate();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!result.success);
        invoker.terminate();
    }

    #[test]
    fn verbose_match_is_case_insensitive() {
        let invoker = ProcessInvoker::new(vec!["Nuitka".into()], 10);
        assert!(invoker.is_verbose("python -m NUITKA --onefile main.py"));
        assert!(!invoker.is_verbose("pyinstaller main.py"));
    }
}
