//! Per-panel dispatch tables.
//!
//! `PanelCommands` maps a request name to the process work behind it. The controller
//! prepares everything a command needs (interpreter, arguments, environment, working
//! directory) before handing the request to the worker, so dispatch never reads
//! settings or parameter files.
//!
//! Argument conventions:
//! - pip installs: `args` are appended to `pip install` (package, then `-i <mirror>`).
//! - `py_version`: `args[0]`, when present, is a candidate interpreter to check instead
//!   of the resolved one.
//! - packaging: `args[0]` is the build command line, `args[1]` the optional follow-up.
//! - pyenv commands: `interpreter` is the pyenv executable, `args[0]` the version.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::interpreter::Interpreter;
use crate::invoker::{Invocation, ProcessInvoker};
use crate::panels::PanelKind;
use crate::process::{CommandRequest, CommandResult};
use crate::worker::CommandTable;

/// Prefix of the timing line appended to every packaging run.
pub const ELAPSED_PREFIX: &str = "elapsed: ";

#[derive(Debug, Clone, Copy)]
pub struct PanelCommands {
    panel: PanelKind,
}

impl PanelCommands {
    pub fn new(panel: PanelKind) -> Self {
        Self { panel }
    }

    /// Command names this panel's worker accepts.
    pub fn names(&self) -> &'static [&'static str] {
        match self.panel {
            PanelKind::Project => &["py_version", "pip_list"],
            PanelKind::Designer => &[
                "py_version",
                "designer_install",
                "designer_open",
                "generate_code",
                "compile_resources",
            ],
            PanelKind::Pack => &[
                "py_version",
                "pyinstaller_install",
                "pyinstaller_upgrade",
                "nuitka_install",
                "pack_pyinstaller",
                "pack_nuitka",
            ],
            PanelKind::Other => &[
                "py_version",
                "pipreqs_install",
                "pipreqs_upgrade",
                "pipreqs_uninstall",
                "generate_requirements",
                "install_requirements",
            ],
            PanelKind::Settings => &[
                "py_version",
                "list",
                "install",
                "uninstall",
                "versions",
                "update",
            ],
        }
    }

    pub fn handles(&self, name: &str) -> bool {
        self.names().contains(&name)
    }
}

#[async_trait]
impl CommandTable for PanelCommands {
    async fn dispatch(&self, request: &CommandRequest, invoker: &ProcessInvoker) -> CommandResult {
        if !self.handles(&request.name) {
            log::warn!("{}: unknown command {}", self.panel, request.name);
            return CommandResult::failure(format!("unknown command: {}", request.name));
        }
        log::debug!("{}: dispatching {}", self.panel, request.name);
        let name = request.name.as_str();
        let result = match name {
            "py_version" => py_version(request, invoker).await,
            "pip_list" => with_python(request, |python| async move {
                captured(invoker, request, python.pip(["list"])).await
            })
            .await,
            "designer_install" | "pyinstaller_install" | "nuitka_install" | "pipreqs_install" => {
                pip(request, invoker, &["install"]).await
            }
            "pyinstaller_upgrade" | "pipreqs_upgrade" => {
                pip(request, invoker, &["install", "--upgrade"]).await
            }
            "pipreqs_uninstall" => pip(request, invoker, &["uninstall", "-y"]).await,
            "install_requirements" => install_requirements(request, invoker).await,
            "designer_open" => match interpreter(request) {
                Ok(python) => invoker.spawn_detached(
                    &Invocation::argv([python.designer().display().to_string()]),
                    &request.env,
                    request.cwd.as_deref(),
                ),
                Err(failure) => failure,
            },
            "generate_code" => generate(request, invoker, Generated::UiCode).await,
            "compile_resources" => generate(request, invoker, Generated::Resources).await,
            "pack_pyinstaller" | "pack_nuitka" | "generate_requirements" => {
                composite(request, invoker).await
            }
            "list" => pyenv(request, invoker, &["install", "--list"]).await,
            "install" => pyenv_install(request, invoker).await,
            "uninstall" => pyenv_uninstall(request, invoker).await,
            "versions" => pyenv(request, invoker, &["versions"]).await,
            "update" => pyenv(request, invoker, &["update"]).await,
            _ => CommandResult::failure(format!("unknown command: {}", name)),
        };
        if !result.success {
            log::info!("{}: {} failed", self.panel, name);
        }
        result
    }
}

fn interpreter(request: &CommandRequest) -> Result<Interpreter, CommandResult> {
    request
        .interpreter
        .as_ref()
        .filter(|path| !path.as_os_str().is_empty())
        .map(Interpreter::new)
        .ok_or_else(|| CommandResult::failure("Error: no interpreter selected"))
}

async fn with_python<F, Fut>(request: &CommandRequest, run: F) -> CommandResult
where
    F: FnOnce(Interpreter) -> Fut,
    Fut: std::future::Future<Output = CommandResult>,
{
    match interpreter(request) {
        Ok(python) => run(python).await,
        Err(failure) => failure,
    }
}

async fn captured(
    invoker: &ProcessInvoker,
    request: &CommandRequest,
    argv: Vec<String>,
) -> CommandResult {
    invoker
        .run_captured(&Invocation::Argv(argv), &request.env, request.cwd.as_deref())
        .await
}

async fn py_version(request: &CommandRequest, invoker: &ProcessInvoker) -> CommandResult {
    let candidate = request.arg_at(0).trim();
    let python = if candidate.is_empty() {
        match interpreter(request) {
            Ok(python) => python,
            Err(failure) => return failure,
        }
    } else {
        Interpreter::new(candidate)
    };
    captured(invoker, request, python.version_argv()).await
}

async fn pip(request: &CommandRequest, invoker: &ProcessInvoker, verb: &[&str]) -> CommandResult {
    with_python(request, |python| async move {
        let args = verb
            .iter()
            .map(|part| part.to_string())
            .chain(request.args.iter().cloned());
        captured(invoker, request, python.pip(args)).await
    })
    .await
}

async fn install_requirements(request: &CommandRequest, invoker: &ProcessInvoker) -> CommandResult {
    let folder = request.arg_at(0);
    if folder.is_empty() {
        return CommandResult::failure("Error: no project folder selected");
    }
    let requirements = Path::new(folder).join("requirements.txt");
    if !requirements.is_file() {
        return CommandResult::failure(format!("Error: {} not found", requirements.display()));
    }
    with_python(request, |python| async move {
        let mut args = vec![
            "install".to_string(),
            "-r".to_string(),
            requirements.display().to_string(),
        ];
        args.extend(request.args.iter().skip(1).cloned());
        captured(invoker, request, python.pip(args)).await
    })
    .await
}

#[derive(Debug, Clone, Copy)]
enum Generated {
    UiCode,
    Resources,
}

/// Runs `pyside6-uic` or `pyside6-rcc` on `args[0]`, writing into `args[1]`.
async fn generate(
    request: &CommandRequest,
    invoker: &ProcessInvoker,
    kind: Generated,
) -> CommandResult {
    let source = PathBuf::from(request.arg_at(0));
    if source.as_os_str().is_empty() {
        return CommandResult::failure("Error: no source file selected");
    }
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let out_dir = match request.arg_at(1) {
        "" => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        dir => PathBuf::from(dir),
    };
    with_python(request, |python| async move {
        let (tool, target) = match kind {
            Generated::UiCode => (python.uic(), out_dir.join(format!("Ui_{}.py", stem))),
            Generated::Resources => (python.rcc(), out_dir.join(format!("{}_rc.py", stem))),
        };
        let argv = vec![
            tool.display().to_string(),
            source.display().to_string(),
            "-o".to_string(),
            target.display().to_string(),
        ];
        let result = captured(invoker, request, argv).await;
        if result.success {
            CommandResult::ok(format!("generated {}", target.display()))
        } else {
            result
        }
    })
    .await
}

/// Streams `args[0]`; if it succeeds, runs the follow-up `args[1]`. Elapsed time is
/// always appended.
async fn composite(request: &CommandRequest, invoker: &ProcessInvoker) -> CommandResult {
    let started = Instant::now();
    let cwd = request.cwd.as_deref();
    let mut result = invoker
        .run_streamed(request.arg_at(0), &request.env, cwd)
        .await;
    let follow_up = request.arg_at(1);
    if result.success && !follow_up.is_empty() {
        let moved = invoker
            .run_captured(&Invocation::Shell(follow_up.to_string()), &request.env, cwd)
            .await;
        if !moved.success {
            result.success = false;
        }
        let text = moved.text();
        if !text.is_empty() {
            result.push_line(text);
        }
    }
    result.push_line(format!("{}{:.1}s", ELAPSED_PREFIX, started.elapsed().as_secs_f64()));
    result
}

fn pyenv_argv(request: &CommandRequest, args: &[&str]) -> Result<Vec<String>, CommandResult> {
    let pyenv = request
        .interpreter
        .as_ref()
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| CommandResult::failure("Error: pyenv not found"))?;
    let mut argv = vec![pyenv.display().to_string()];
    argv.extend(args.iter().map(|arg| arg.to_string()));
    Ok(argv)
}

async fn pyenv(request: &CommandRequest, invoker: &ProcessInvoker, args: &[&str]) -> CommandResult {
    match pyenv_argv(request, args) {
        Ok(argv) => captured(invoker, request, argv).await,
        Err(failure) => failure,
    }
}

async fn pyenv_install(request: &CommandRequest, invoker: &ProcessInvoker) -> CommandResult {
    let version = request.arg_at(0);
    if version.is_empty() {
        return CommandResult::failure("Error: no version selected");
    }
    let result = pyenv(request, invoker, &["install", version]).await;
    if result.success {
        let rehash = pyenv(request, invoker, &["rehash"]).await;
        if !rehash.success {
            log::warn!("pyenv rehash failed: {}", rehash.text());
        }
    }
    result
}

async fn pyenv_uninstall(request: &CommandRequest, invoker: &ProcessInvoker) -> CommandResult {
    let version = request.arg_at(0);
    if version.is_empty() {
        return CommandResult::failure("Error: no version selected");
    }
    if cfg!(windows) {
        pyenv(request, invoker, &["uninstall", version]).await
    } else {
        pyenv(request, invoker, &["uninstall", "-f", version]).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    /// Writes an executable that prints its arguments.
    fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    async fn dispatch(panel: PanelKind, request: CommandRequest) -> CommandResult {
        PanelCommands::new(panel)
            .dispatch(&request, &ProcessInvoker::default())
            .await
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let result = dispatch(PanelKind::Project, CommandRequest::new("pack_nuitka")).await;
        assert_eq!(result, CommandResult::failure("unknown command: pack_nuitka"));
    }

    #[tokio::test]
    async fn py_version_checks_candidate_first() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_tool(dir.path(), "python", "echo \"Python 3.11.4\"");
        let result = dispatch(
            PanelKind::Settings,
            CommandRequest::new("py_version").arg(python.display().to_string()),
        )
        .await;
        assert_eq!(result, CommandResult::ok("Python 3.11.4"));
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_failure() {
        let result = dispatch(PanelKind::Project, CommandRequest::new("pip_list")).await;
        assert_eq!(result, CommandResult::failure("Error: no interpreter selected"));
    }

    #[tokio::test]
    async fn pip_install_passes_package_and_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_tool(dir.path(), "python", "echo \"$@\"");
        let request = CommandRequest::new("pyinstaller_install")
            .args(["pyinstaller", "-i", "https://mirror/simple"])
            .interpreter(&python);
        let result = dispatch(PanelKind::Pack, request).await;
        assert_eq!(
            result,
            CommandResult::ok("-m pip install pyinstaller -i https://mirror/simple")
        );
    }

    #[tokio::test]
    async fn upgrade_and_uninstall_verbs() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_tool(dir.path(), "python", "echo \"$@\"");
        let upgrade = dispatch(
            PanelKind::Other,
            CommandRequest::new("pipreqs_upgrade").arg("pipreqs").interpreter(&python),
        )
        .await;
        assert_eq!(upgrade.text(), "-m pip install --upgrade pipreqs");
        let uninstall = dispatch(
            PanelKind::Other,
            CommandRequest::new("pipreqs_uninstall").arg("pipreqs").interpreter(&python),
        )
        .await;
        assert_eq!(uninstall.text(), "-m pip uninstall -y pipreqs");
    }

    #[tokio::test]
    async fn failing_pip_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_tool(
            dir.path(),
            "python",
            "echo \"No matching distribution\" >&2; exit 1",
        );
        let result = dispatch(
            PanelKind::Pack,
            CommandRequest::new("nuitka_install").arg("nuitka").interpreter(&python),
        )
        .await;
        assert_eq!(result, CommandResult::failure("Error: No matching distribution"));
    }

    #[tokio::test]
    async fn composite_runs_follow_up_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let request = CommandRequest::new("pack_pyinstaller")
            .arg("echo built; touch out.bin")
            .arg("mv -f out.bin out_1.bin")
            .cwd(dir.path());
        let result = dispatch(PanelKind::Pack, request).await;
        assert!(result.success);
        let lines = result.output_lines();
        assert_eq!(lines[0], "built");
        assert!(lines.last().unwrap().starts_with("elapsed: "));
        assert!(dir.path().join("out_1.bin").exists());
    }

    #[tokio::test]
    async fn composite_skips_follow_up_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let request = CommandRequest::new("pack_nuitka")
            .arg("echo failing >&2; exit 1")
            .arg("touch marker")
            .cwd(dir.path());
        let result = dispatch(PanelKind::Pack, request).await;
        assert!(!result.success);
        assert!(!dir.path().join("marker").exists());
        assert!(result.output_lines().last().unwrap().starts_with("elapsed: "));
    }

    #[tokio::test]
    async fn failing_follow_up_fails_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let request = CommandRequest::new("pack_pyinstaller")
            .arg("echo built")
            .arg("mv -f missing.bin other.bin")
            .cwd(dir.path());
        let result = dispatch(PanelKind::Pack, request).await;
        assert!(!result.success);
        assert!(result.output_lines().iter().any(|line| line.starts_with("Error: ")));
    }

    #[tokio::test]
    async fn pyenv_install_rehashes() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let pyenv = fake_tool(
            dir.path(),
            "pyenv",
            &format!("echo \"$@\" >> '{}'", log.display()),
        );
        let result = dispatch(
            PanelKind::Settings,
            CommandRequest::new("install").arg("3.11.4").interpreter(&pyenv),
        )
        .await;
        assert!(result.success);
        let calls = fs::read_to_string(&log).unwrap();
        assert_eq!(calls, "install 3.11.4\nrehash\n");
    }

    #[tokio::test]
    async fn generate_code_targets_ui_module() {
        let dir = tempfile::tempdir().unwrap();
        let python = dir.path().join("python");
        fake_tool(dir.path(), "pyside6-uic", "touch \"$3\"");
        let ui = dir.path().join("main_window.ui");
        fs::write(&ui, "<ui/>").unwrap();
        let out = dir.path().join("gen");
        fs::create_dir(&out).unwrap();
        let request = CommandRequest::new("generate_code")
            .arg(ui.display().to_string())
            .arg(out.display().to_string())
            .interpreter(&python);
        let result = dispatch(PanelKind::Designer, request).await;
        assert!(result.success, "{}", result.text());
        assert!(out.join("Ui_main_window.py").exists());
    }

    #[test]
    fn every_panel_checks_versions() {
        for panel in PanelKind::ALL {
            assert!(PanelCommands::new(panel).handles("py_version"));
        }
    }
}
