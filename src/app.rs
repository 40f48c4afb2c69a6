//! Application state and UI logic.
//!
//! `App` is the controller that owns the settings store and one worker per panel. User
//! actions go through `trigger`, which validates, resolves the interpreter, builds the
//! request and starts the panel's worker. Worker results come back as events and are
//! applied by `on_command_finished`. Nothing here blocks on a child process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use regex::Regex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::commands::{PanelCommands, ELAPSED_PREFIX};
use crate::config::{AppConfig, ORIGIN_MIRROR};
use crate::events::Event;
use crate::interpreter::Interpreter;
use crate::invoker::ProcessInvoker;
use crate::output::{EntryLevel, TimelineBuffer, TimelineEntry};
use crate::pack;
use crate::panels::{PanelAction, PanelKind};
use crate::params::{self, NuitkaParams, ParamsError, PipreqsParams, PyinstallerParams, Tool};
use crate::process::{CommandRequest, CommandResult, WorkerStatus};
use crate::resolver::{self, EnvMode, GlobalMode, ResolveError, Resolver};
use crate::settings::SettingsStore;
use crate::worker::{CommandWorker, WorkerError};

const LOG_CAPACITY: usize = 2_000;
const INFO_TTL: Duration = Duration::from_secs(5);
const ERROR_TTL: Duration = Duration::from_secs(10);
/// Output lines copied into the log when a command fails.
const FAILURE_TAIL: usize = 5;

/// Modes of user input interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Navigating panels and actions.
    Normal,
    /// Typing the value an action asked for.
    Prompt,
}

/// Work the event loop performs on the controller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    None,
    Quit,
    /// Copy the selected panel's last output to the clipboard.
    CopyOutput,
    /// Open a sidecar in the external editor.
    EditSidecar(Tool),
    /// Fetch the CPython release list in the background.
    FetchReleases,
}

/// What a triggered action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A command is running on the panel's worker; its result arrives as an event.
    Started,
    /// Settings changed; nothing was spawned.
    Updated(String),
    /// The caller has to perform this action.
    Requires(AppAction),
}

/// Why an action was refused. Shown to the user as-is.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("busy: the {0} panel is already running a command")]
    Busy(PanelKind),
    #[error("{0}: input required")]
    MissingInput(&'static str),
    #[error("unknown action {action:?} on the {panel} panel")]
    UnknownAction { panel: PanelKind, action: String },
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Settings(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct StatusMessage {
    text: String,
    at: Instant,
    ttl: Option<Duration>,
    level: StatusLevel,
}

/// Per-panel view state plus its worker.
#[derive(Debug)]
pub struct PanelState {
    pub kind: PanelKind,
    pub worker: CommandWorker,
    /// Index of the highlighted action.
    pub selected: usize,
    pub last_command: Option<String>,
    pub last_success: Option<bool>,
    pub output: Vec<String>,
    /// Last `python --version` answer for this panel.
    pub version: Option<String>,
}

#[derive(Debug)]
pub struct App {
    pub panels: Vec<PanelState>,
    /// Index of the focused panel.
    pub selected: usize,
    pub input_mode: InputMode,
    /// Buffer for prompt input.
    pub input: String,
    pub settings: SettingsStore,
    pub config: AppConfig,
    /// Activity log shown at the bottom of the screen.
    pub log: TimelineBuffer,
    /// Installable pyenv versions, newest first.
    pub pyenv_available: Vec<String>,
    /// Versions installed under pyenv.
    pub pyenv_installed: Vec<String>,
    /// CPython release tags from the network.
    pub releases: Vec<String>,
    pub should_quit: bool,
    prompt: Option<(PanelKind, &'static PanelAction)>,
    status_message: Option<StatusMessage>,
}

impl App {
    pub fn new(config: AppConfig, settings: SettingsStore, event_tx: mpsc::Sender<Event>) -> Self {
        let panels = PanelKind::ALL
            .into_iter()
            .map(|kind| PanelState {
                kind,
                worker: CommandWorker::new(
                    kind,
                    Arc::new(PanelCommands::new(kind)),
                    ProcessInvoker::new(config.verbose_tools.clone(), config.verbose_tail_lines),
                    event_tx.clone(),
                ),
                selected: 0,
                last_command: None,
                last_success: None,
                output: Vec::new(),
                version: None,
            })
            .collect();
        Self {
            panels,
            selected: 0,
            input_mode: InputMode::Normal,
            input: String::new(),
            settings,
            config,
            log: TimelineBuffer::new(LOG_CAPACITY),
            pyenv_available: Vec::new(),
            pyenv_installed: Vec::new(),
            releases: Vec::new(),
            should_quit: false,
            prompt: None,
            status_message: None,
        }
    }

    pub fn panel(&self, kind: PanelKind) -> &PanelState {
        &self.panels[panel_index(kind)]
    }

    fn panel_mut(&mut self, kind: PanelKind) -> &mut PanelState {
        &mut self.panels[panel_index(kind)]
    }

    pub fn selected_panel(&self) -> &PanelState {
        &self.panels[self.selected.min(self.panels.len() - 1)]
    }

    pub fn selected_action(&self) -> Option<&'static PanelAction> {
        let panel = self.selected_panel();
        panel.kind.actions().get(panel.selected)
    }

    /// True when any panel's worker is running.
    pub fn any_busy(&self) -> bool {
        self.panels.iter().any(|panel| panel.worker.is_busy())
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.settings, &self.config.pyenv_root)
    }

    pub fn pyenv_executable(&self) -> PathBuf {
        resolver::pyenv_executable(&self.resolver().pyenv_root())
    }

    /// Runs a panel action.
    ///
    /// Checks happen in a fixed order: busy worker, missing input, interpreter
    /// resolution, parameter files. Nothing is spawned unless all of them pass.
    pub fn trigger(
        &mut self,
        panel: PanelKind,
        slug: &str,
        input: Option<&str>,
    ) -> Result<Outcome, ActionError> {
        let action = panel.action(slug).ok_or_else(|| ActionError::UnknownAction {
            panel,
            action: slug.to_string(),
        })?;
        if spawns_command(slug) && self.panel(panel).worker.is_busy() {
            return Err(ActionError::Busy(panel));
        }
        let input = input.map(str::trim).unwrap_or("");
        if action.prompt.is_some() && input.is_empty() {
            return Err(ActionError::MissingInput(action.label));
        }
        log::debug!("{}: action {} {:?}", panel, slug, input);
        let section = panel.section();

        match slug {
            "set_mode" => {
                let mode = EnvMode::parse(input)
                    .filter(|mode| panel.allowed_modes().contains(mode))
                    .ok_or_else(|| {
                        let allowed: Vec<&str> =
                            panel.allowed_modes().iter().map(|m| m.as_str()).collect();
                        ActionError::Invalid(format!(
                            "mode must be one of: {}",
                            allowed.join(", ")
                        ))
                    })?;
                self.settings.set(section, "mode", mode.as_str())?;
                self.panel_mut(panel).version = None;
                Ok(Outcome::Updated(format!("{} mode set to {}", panel, mode)))
            }
            "set_global_mode" => {
                let mode = GlobalMode::parse(input).ok_or_else(|| {
                    ActionError::Invalid("mode must be one of: existing, pyenv".to_string())
                })?;
                self.settings.set(section, "mode", mode.as_str())?;
                Ok(Outcome::Updated(format!("global mode set to {}", mode.as_str())))
            }
            "set_interpreter" => {
                let request = CommandRequest::new("py_version").arg(input);
                self.start(panel, request, "checking interpreter")
            }
            "py_version" => {
                let python = self.resolver().resolve(panel)?;
                let request = self.python_request("py_version", &python);
                self.start(panel, request, "checking Python version")
            }
            "open_project" => {
                let folder = existing_dir(input)?;
                self.settings.set(section, "current", folder.as_str())?;
                self.settings.push_recent(section, "recent", &folder)?;
                Ok(Outcome::Updated(format!("opened project {}", folder)))
            }
            "pip_list" => {
                let python = self.resolver().resolve(panel)?;
                let request = self.python_request("pip_list", &python);
                self.start(panel, request, "listing packages")
            }
            "designer_install" => self.pip_install(panel, slug, "pyside6"),
            "pyinstaller_install" | "pyinstaller_upgrade" => {
                self.pip_install(panel, slug, "pyinstaller")
            }
            "nuitka_install" => self.pip_install(panel, slug, "nuitka"),
            "pipreqs_install" | "pipreqs_upgrade" | "pipreqs_uninstall" => {
                self.pip_install(panel, slug, "pipreqs")
            }
            "designer_open" => {
                let python = self.resolver().resolve(panel)?;
                let request = self.python_request("designer_open", &python);
                self.start(panel, request, "opening Qt Designer")
            }
            "set_output_dir" => {
                let folder = existing_dir(input)?;
                self.settings.set(section, "output_dir", folder.as_str())?;
                Ok(Outcome::Updated(format!("generated code goes to {}", folder)))
            }
            "generate_code" | "compile_resources" => {
                let source = existing_file(input)?;
                let python = self.resolver().resolve(panel)?;
                if slug == "generate_code" {
                    self.settings.push_recent(section, "recent_ui", &source)?;
                }
                let output_dir = self.settings.get_str(section, "output_dir").to_string();
                let request = self
                    .python_request(slug, &python)
                    .arg(source)
                    .arg(output_dir);
                self.start(panel, request, "generating code")
            }
            "set_entry_file" => {
                let entry = existing_file(input)?;
                self.settings.set(section, "entry_file", entry.as_str())?;
                Ok(Outcome::Updated(format!("entry file set to {}", entry)))
            }
            "pack_pyinstaller" | "pack_nuitka" => {
                let entry = self.settings.get_str(section, "entry_file").trim().to_string();
                if entry.is_empty() {
                    return Err(ActionError::Invalid("no entry file selected".to_string()));
                }
                let python = self.resolver().resolve(panel)?;
                let data_dir = self.config.data_dir.clone();
                let stamp = pack::timestamp();
                let plan = if slug == "pack_pyinstaller" {
                    let params: PyinstallerParams =
                        params::load_sidecar(&Tool::Pyinstaller.sidecar_path(&data_dir))?;
                    pack::plan_pyinstaller(&python, &params, Path::new(&entry), &stamp)
                } else {
                    let params: NuitkaParams =
                        params::load_sidecar(&Tool::Nuitka.sidecar_path(&data_dir))?;
                    pack::plan_nuitka(&python, &params, Path::new(&entry), &stamp)
                };
                log::info!("{}: {}", panel, plan.command_line);
                let request = plan
                    .into_request(slug)
                    .interpreter(python.python())
                    .envs(python.tool_env(&self.config.encoding));
                self.start(panel, request, "packing, please wait")
            }
            "edit_pyinstaller" => Ok(Outcome::Requires(AppAction::EditSidecar(Tool::Pyinstaller))),
            "edit_nuitka" => Ok(Outcome::Requires(AppAction::EditSidecar(Tool::Nuitka))),
            "edit_pipreqs" => Ok(Outcome::Requires(AppAction::EditSidecar(Tool::Pipreqs))),
            "set_project_folder" => {
                let folder = existing_dir(input)?;
                self.settings.set(section, "project_folder", folder.as_str())?;
                Ok(Outcome::Updated(format!("project folder set to {}", folder)))
            }
            "generate_requirements" => {
                let folder = self.project_folder(section)?;
                let python = self.resolver().resolve(panel)?;
                let params: PipreqsParams =
                    params::load_sidecar(&Tool::Pipreqs.sidecar_path(&self.config.data_dir))?;
                let command_line =
                    pack::pipreqs_command(&python, params.to_args(), Path::new(&folder));
                let request = self
                    .python_request(slug, &python)
                    .arg(command_line)
                    .cwd(&folder);
                self.start(panel, request, "generating requirements.txt")
            }
            "install_requirements" => {
                let folder = self.project_folder(section)?;
                let python = self.resolver().resolve(panel)?;
                let request = self
                    .python_request(slug, &python)
                    .arg(folder)
                    .args(self.pip_mirror_args());
                self.start(panel, request, "installing requirements, please wait")
            }
            "set_pyenv_path" => {
                let folder = existing_dir(input)?;
                self.settings.set(section, "pyenv_path", folder.as_str())?;
                Ok(Outcome::Updated(format!("pyenv location set to {}", folder)))
            }
            "select_version" => {
                if !self.pyenv_installed.is_empty()
                    && !self.pyenv_installed.iter().any(|v| v == input)
                {
                    return Err(ActionError::Invalid(format!(
                        "{} is not installed; installed: {}",
                        input,
                        self.pyenv_installed.join(", ")
                    )));
                }
                self.settings.set(section, "pyenv_current_version", input)?;
                Ok(Outcome::Updated(format!("global pyenv version set to {}", input)))
            }
            "set_pyenv_mirror" => {
                let name = self.mirror_name(input, &self.config.pyenv_mirrors)?;
                self.settings.set(section, "pyenv_mirror_url", name.as_str())?;
                Ok(Outcome::Updated(format!("pyenv mirror set to {}", name)))
            }
            "set_pip_mirror" => {
                let name = self.mirror_name(input, &self.config.pip_mirrors)?;
                self.settings.set(section, "pip_mirror_url", name.as_str())?;
                Ok(Outcome::Updated(format!("pip mirror set to {}", name)))
            }
            "list" | "versions" | "update" => {
                let request = self.pyenv_request(slug)?;
                self.start(panel, request, "querying pyenv")
            }
            "install" | "uninstall" => {
                let request = self.pyenv_request(slug)?.arg(input);
                let notice = if slug == "install" {
                    "installing, please wait"
                } else {
                    "uninstalling, please wait"
                };
                self.start(panel, request, notice)
            }
            "fetch_releases" => Ok(Outcome::Requires(AppAction::FetchReleases)),
            _ => Err(ActionError::UnknownAction {
                panel,
                action: slug.to_string(),
            }),
        }
    }

    /// Runs an action and reports the outcome through the status line and the log.
    pub fn submit(&mut self, panel: PanelKind, slug: &str, input: Option<&str>) -> AppAction {
        match self.trigger(panel, slug, input) {
            Ok(Outcome::Started) => AppAction::None,
            Ok(Outcome::Updated(message)) => {
                self.notify(Some(panel), StatusLevel::Info, message);
                AppAction::None
            }
            Ok(Outcome::Requires(action)) => action,
            Err(err) => {
                self.notify(Some(panel), StatusLevel::Error, err.to_string());
                AppAction::None
            }
        }
    }

    /// Cancels the panel's running command.
    pub fn stop(&mut self, panel: PanelKind) {
        if self.panel_mut(panel).worker.stop() {
            self.notify(Some(panel), StatusLevel::Info, "command stopped");
        } else {
            self.set_status_message("nothing to stop");
        }
    }

    fn start(
        &mut self,
        panel: PanelKind,
        request: CommandRequest,
        notice: &str,
    ) -> Result<Outcome, ActionError> {
        let name = request.name.clone();
        let state = self.panel_mut(panel);
        state.worker.configure(request);
        state.worker.start()?;
        state.last_command = Some(name);
        state.last_success = None;
        state.output.clear();
        self.notify(Some(panel), StatusLevel::Info, notice);
        Ok(Outcome::Started)
    }

    fn python_request(&self, name: &str, python: &Interpreter) -> CommandRequest {
        CommandRequest::new(name)
            .interpreter(python.python())
            .envs(python.tool_env(&self.config.encoding))
    }

    fn pip_install(
        &mut self,
        panel: PanelKind,
        slug: &str,
        package: &str,
    ) -> Result<Outcome, ActionError> {
        let python = self.resolver().resolve(panel)?;
        let mut request = self.python_request(slug, &python).arg(package);
        let notice = if slug.ends_with("_uninstall") {
            "uninstalling, please wait"
        } else {
            request = request.args(self.pip_mirror_args());
            if slug.ends_with("_upgrade") {
                "upgrading, please wait"
            } else {
                "installing, please wait"
            }
        };
        self.start(panel, request, notice)
    }

    fn pip_mirror_args(&self) -> Vec<String> {
        let name = self
            .settings
            .get_str(PanelKind::Settings.section(), "pip_mirror_url");
        match self.config.pip_mirror_url(name) {
            Some(url) => vec!["-i".to_string(), url.to_string()],
            None => Vec::new(),
        }
    }

    fn pyenv_request(&self, name: &str) -> Result<CommandRequest, ActionError> {
        let pyenv = self.pyenv_executable();
        if !pyenv.is_file() {
            return Err(ActionError::Invalid(format!(
                "pyenv not found at {}",
                pyenv.display()
            )));
        }
        let mut request = CommandRequest::new(name).interpreter(pyenv);
        let mirror = self
            .settings
            .get_str(PanelKind::Settings.section(), "pyenv_mirror_url");
        if let Some(url) = self.config.pyenv_mirror_url(mirror) {
            request = request.env("PYTHON_BUILD_MIRROR_URL", url);
        }
        Ok(request)
    }

    fn project_folder(&self, section: &str) -> Result<String, ActionError> {
        let folder = self.settings.get_str(section, "project_folder").trim();
        if folder.is_empty() {
            return Err(ActionError::Invalid("no project folder selected".to_string()));
        }
        existing_dir(folder)
    }

    fn mirror_name(
        &self,
        input: &str,
        mirrors: &[crate::config::Mirror],
    ) -> Result<String, ActionError> {
        if input == ORIGIN_MIRROR || mirrors.iter().any(|mirror| mirror.name == input) {
            return Ok(input.to_string());
        }
        let mut names = vec![ORIGIN_MIRROR.to_string()];
        names.extend(mirrors.iter().map(|mirror| mirror.name.clone()));
        names.dedup();
        Err(ActionError::Invalid(format!(
            "unknown mirror {}; choose one of: {}",
            input,
            names.join(", ")
        )))
    }

    /// Applies a worker result.
    pub fn on_command_finished(
        &mut self,
        panel: PanelKind,
        request: CommandRequest,
        result: CommandResult,
    ) {
        let name = request.name.as_str();
        let lines = result.output_lines();
        {
            let state = self.panel_mut(panel);
            state.last_command = Some(name.to_string());
            state.last_success = Some(result.success);
            state.output = lines.clone();
        }
        log::info!(
            "{}: {} {}",
            panel,
            name,
            if result.success { "succeeded" } else { "failed" }
        );

        if !result.success {
            let skip = lines.len().saturating_sub(FAILURE_TAIL);
            for line in &lines[skip..] {
                self.log.push(TimelineEntry {
                    text: line.clone(),
                    panel: Some(panel),
                    level: EntryLevel::Output,
                });
            }
            let detail = failure_detail(&lines);
            let message = match failure_verb(name) {
                Some(verb) => format!("{} failed: {}", verb, detail),
                None => format!("{} failed: {}", name, detail),
            };
            self.notify(Some(panel), StatusLevel::Error, message);
            return;
        }

        match name {
            "py_version" => {
                let version = result.text().trim().to_string();
                let candidate = request.arg_at(0).trim().to_string();
                if !candidate.is_empty() {
                    if let Err(err) =
                        self.settings
                            .set(panel.section(), "custom_python_path", candidate.as_str())
                    {
                        self.notify(Some(panel), StatusLevel::Error, err.to_string());
                        return;
                    }
                }
                self.panel_mut(panel).version = Some(version.clone());
                self.notify(Some(panel), StatusLevel::Info, version);
            }
            "list" => {
                self.pyenv_available = final_releases(&lines);
                let message = format!("{} versions available", self.pyenv_available.len());
                self.notify(Some(panel), StatusLevel::Info, message);
            }
            "versions" => {
                self.pyenv_installed = installed_versions(&lines);
                let message = format!("{} versions installed", self.pyenv_installed.len());
                self.notify(Some(panel), StatusLevel::Info, message);
            }
            "install" | "uninstall" => {
                let verb = if name == "install" { "install" } else { "uninstall" };
                self.notify(
                    Some(panel),
                    StatusLevel::Info,
                    format!("{} {} succeeded", verb, request.arg_at(0)),
                );
                self.follow_up(panel, "versions");
            }
            "update" => {
                self.notify(Some(panel), StatusLevel::Info, "pyenv updated");
                self.follow_up(panel, "list");
            }
            "pack_pyinstaller" | "pack_nuitka" => {
                let message = match elapsed_line(&lines) {
                    Some(elapsed) => format!("pack succeeded ({})", elapsed),
                    None => "pack succeeded".to_string(),
                };
                self.notify(Some(panel), StatusLevel::Info, message);
            }
            "designer_open" | "generate_code" | "compile_resources" => {
                self.notify(Some(panel), StatusLevel::Info, result.text());
            }
            _ => {
                let message = match success_message(name) {
                    Some(message) => message.to_string(),
                    None => format!("{} finished", name),
                };
                self.notify(Some(panel), StatusLevel::Info, message);
            }
        }
    }

    fn follow_up(&mut self, panel: PanelKind, slug: &str) {
        if let Err(err) = self.trigger(panel, slug, None) {
            self.notify(Some(panel), StatusLevel::Error, err.to_string());
        }
    }

    pub fn on_sidecar_changed(&mut self, tool: Tool, error: Option<String>) {
        match error {
            None => self.notify(None, StatusLevel::Info, format!("{} parameters reloaded", tool)),
            Some(err) => self.notify(None, StatusLevel::Error, err),
        }
    }

    pub fn on_releases(&mut self, result: Result<Vec<String>, String>) {
        match result {
            Ok(releases) => {
                let message = format!("{} CPython releases fetched", releases.len());
                self.releases = releases;
                self.notify(Some(PanelKind::Settings), StatusLevel::Info, message);
            }
            Err(err) => self.notify(
                Some(PanelKind::Settings),
                StatusLevel::Error,
                format!("release fetch failed: {}", err),
            ),
        }
    }

    /// Label/value pairs describing a panel's current configuration.
    pub fn details(&self, kind: PanelKind) -> Vec<(&'static str, String)> {
        let section = kind.section();
        let mut rows = Vec::new();
        rows.push(("mode", self.settings.get_str(section, "mode").to_string()));
        let interpreter = match self.resolver().resolve(kind) {
            Ok(python) => python.python_str(),
            Err(err) => format!("<{}>", err),
        };
        rows.push(("interpreter", interpreter));
        if let Some(version) = &self.panel(kind).version {
            rows.push(("version", version.clone()));
        }
        let keys: &[(&'static str, &str)] = match kind {
            PanelKind::Project => &[("project", "current")],
            PanelKind::Designer => &[("output dir", "output_dir")],
            PanelKind::Pack => &[("entry file", "entry_file")],
            PanelKind::Other => &[("folder", "project_folder")],
            PanelKind::Settings => &[
                ("pyenv", "pyenv_path"),
                ("pyenv version", "pyenv_current_version"),
                ("pyenv mirror", "pyenv_mirror_url"),
                ("pip mirror", "pip_mirror_url"),
            ],
        };
        for &(label, key) in keys {
            rows.push((label, self.settings.get_str(section, key).to_string()));
        }
        if kind == PanelKind::Settings {
            if !self.pyenv_installed.is_empty() {
                rows.push(("installed", self.pyenv_installed.join(", ")));
            }
            if !self.pyenv_available.is_empty() {
                let newest: Vec<&str> =
                    self.pyenv_available.iter().take(8).map(String::as_str).collect();
                rows.push(("available", newest.join(", ")));
            }
            if !self.releases.is_empty() {
                let newest: Vec<&str> = self.releases.iter().take(8).map(String::as_str).collect();
                rows.push(("releases", newest.join(", ")));
            }
        }
        rows.push(("worker", self.panel(kind).worker.status().to_string()));
        rows
    }

    pub fn selected_output_text(&self) -> Option<String> {
        let output = &self.selected_panel().output;
        if output.is_empty() {
            None
        } else {
            Some(output.join("\n"))
        }
    }

    pub fn prompt_label(&self) -> Option<&'static str> {
        self.prompt.and_then(|(_, action)| action.prompt)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        match self.input_mode {
            InputMode::Prompt => self.handle_prompt_input(key),
            InputMode::Normal => self.handle_normal_input(key),
        }
    }

    fn handle_prompt_input(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input.clear();
                self.prompt = None;
                AppAction::None
            }
            KeyCode::Enter => {
                let value = std::mem::take(&mut self.input);
                self.input_mode = InputMode::Normal;
                match self.prompt.take() {
                    Some((panel, action)) => self.submit(panel, action.slug, Some(value.as_str())),
                    None => AppAction::None,
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
                AppAction::None
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return AppAction::None;
                }
                self.input.push(c);
                AppAction::None
            }
            _ => AppAction::None,
        }
    }

    fn handle_normal_input(&mut self, key: KeyEvent) -> AppAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppAction::Quit;
        }
        match key.code {
            KeyCode::Char('q') => AppAction::Quit,
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
                self.selected = (self.selected + 1) % self.panels.len();
                AppAction::None
            }
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
                self.selected = (self.selected + self.panels.len() - 1) % self.panels.len();
                AppAction::None
            }
            KeyCode::Char(c @ '1'..='5') => {
                let index = c as usize - '1' as usize;
                if index < self.panels.len() {
                    self.selected = index;
                }
                AppAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_action(1);
                AppAction::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_action(-1);
                AppAction::None
            }
            KeyCode::Enter => self.activate_selected(),
            KeyCode::Char('s') => {
                let panel = self.selected_panel().kind;
                self.stop(panel);
                AppAction::None
            }
            KeyCode::Char('y') => AppAction::CopyOutput,
            _ => AppAction::None,
        }
    }

    fn move_action(&mut self, delta: isize) {
        let index = self.selected.min(self.panels.len() - 1);
        let state = &mut self.panels[index];
        let count = state.kind.actions().len();
        if count == 0 {
            return;
        }
        let next = (state.selected as isize + delta).rem_euclid(count as isize);
        state.selected = next as usize;
    }

    fn activate_selected(&mut self) -> AppAction {
        let panel = self.selected_panel().kind;
        let Some(action) = self.selected_action() else {
            return AppAction::None;
        };
        if action.prompt.is_some() {
            self.prompt = Some((panel, action));
            self.input_mode = InputMode::Prompt;
            self.input.clear();
            return AppAction::None;
        }
        self.submit(panel, action.slug, None)
    }

    /// Records a notification in the log and shows it on the status line.
    pub fn notify(
        &mut self,
        panel: Option<PanelKind>,
        level: StatusLevel,
        text: impl Into<String>,
    ) {
        let text = text.into();
        match level {
            StatusLevel::Info => log::info!("{}", text),
            StatusLevel::Error => log::warn!("{}", text),
        }
        self.log.push(TimelineEntry {
            text: text.clone(),
            panel,
            level: match level {
                StatusLevel::Info => EntryLevel::Info,
                StatusLevel::Error => EntryLevel::Error,
            },
        });
        let ttl = match level {
            StatusLevel::Info => INFO_TTL,
            StatusLevel::Error => ERROR_TTL,
        };
        self.set_status_message_with_level(text, Some(ttl), level);
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.set_status_message_with_level(message, Some(INFO_TTL), StatusLevel::Info);
    }

    pub fn set_status_error(&mut self, message: impl Into<String>) {
        self.set_status_message_with_level(message, Some(ERROR_TTL), StatusLevel::Error);
    }

    fn set_status_message_with_level(
        &mut self,
        message: impl Into<String>,
        ttl: Option<Duration>,
        level: StatusLevel,
    ) {
        self.status_message = Some(StatusMessage {
            text: message.into(),
            at: Instant::now(),
            ttl,
            level,
        });
    }

    pub fn status_message(&self) -> Option<(&str, StatusLevel)> {
        if let Some(message) = &self.status_message {
            let still_visible = match message.ttl {
                Some(ttl) => message.at.elapsed() < ttl,
                None => true,
            };
            if still_visible {
                return Some((message.text.as_str(), message.level));
            }
        }
        None
    }

    /// One-line summary of the focused panel.
    pub fn status_line(&self) -> String {
        let panel = self.selected_panel();
        let status = panel.worker.status();
        let last = match (&panel.last_command, panel.last_success, status) {
            (Some(name), _, WorkerStatus::Running) => format!("{} running", name),
            (Some(name), Some(true), _) => format!("{} ok", name),
            (Some(name), Some(false), _) => format!("{} failed", name),
            _ => "-".to_string(),
        };
        format!(
            "{} | worker: {} | last: {} | log: {}",
            panel.kind.title(),
            status,
            last,
            self.log.len()
        )
    }
}

fn panel_index(kind: PanelKind) -> usize {
    PanelKind::ALL
        .iter()
        .position(|candidate| *candidate == kind)
        .unwrap_or(0)
}

/// Actions that start the panel's worker.
fn spawns_command(slug: &str) -> bool {
    !matches!(
        slug,
        "set_mode"
            | "set_global_mode"
            | "open_project"
            | "set_output_dir"
            | "set_entry_file"
            | "set_project_folder"
            | "set_pyenv_path"
            | "select_version"
            | "set_pyenv_mirror"
            | "set_pip_mirror"
            | "edit_pyinstaller"
            | "edit_nuitka"
            | "edit_pipreqs"
            | "fetch_releases"
    )
}

fn success_message(name: &str) -> Option<&'static str> {
    if name.ends_with("_uninstall") {
        Some("uninstall succeeded")
    } else if name.ends_with("_upgrade") {
        Some("upgrade succeeded")
    } else if name.ends_with("_install") || name == "install_requirements" {
        Some("install succeeded")
    } else if name == "generate_requirements" {
        Some("requirements.txt generated")
    } else if name == "pip_list" {
        Some("packages listed")
    } else {
        None
    }
}

/// Last line that carries tool output, skipping the packaging timing line.
fn failure_detail(lines: &[String]) -> String {
    lines
        .iter()
        .rev()
        .find(|line| !line.starts_with(ELAPSED_PREFIX))
        .cloned()
        .unwrap_or_else(|| "no error output".to_string())
}

fn elapsed_line(lines: &[String]) -> Option<&str> {
    lines
        .iter()
        .rev()
        .find(|line| line.starts_with(ELAPSED_PREFIX))
        .map(String::as_str)
}

fn failure_verb(name: &str) -> Option<&'static str> {
    if name.ends_with("_uninstall") || name == "uninstall" {
        Some("uninstall")
    } else if name.ends_with("_upgrade") {
        Some("upgrade")
    } else if name.ends_with("_install") || name == "install" || name == "install_requirements" {
        Some("install")
    } else if name.starts_with("pack_") {
        Some("pack")
    } else if name == "py_version" {
        Some("interpreter check")
    } else {
        None
    }
}

fn existing_dir(input: &str) -> Result<String, ActionError> {
    if Path::new(input).is_dir() {
        Ok(input.to_string())
    } else {
        Err(ActionError::Invalid(format!("{} is not a directory", input)))
    }
}

fn existing_file(input: &str) -> Result<String, ActionError> {
    if Path::new(input).is_file() {
        Ok(input.to_string())
    } else {
        Err(ActionError::Invalid(format!("{} is not a file", input)))
    }
}

fn release_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").ok())
        .as_ref()
}

/// Final CPython releases from `pyenv install --list` output, newest first.
pub fn final_releases(lines: &[String]) -> Vec<String> {
    let Some(pattern) = release_pattern() else {
        return Vec::new();
    };
    let mut releases: Vec<((u32, u32, u32), String)> = lines
        .iter()
        .filter_map(|line| {
            let line = line.trim();
            let caps = pattern.captures(line)?;
            let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
            Some(((part(1)?, part(2)?, part(3)?), line.to_string()))
        })
        .collect();
    releases.sort_by(|a, b| b.0.cmp(&a.0));
    releases.dedup_by(|a, b| a.0 == b.0);
    releases.into_iter().map(|(_, version)| version).collect()
}

/// Version names from `pyenv versions` output (`* 3.11.4 (set by ...)` style).
pub fn installed_versions(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches('*').trim();
            line.split_whitespace().next().map(str::to_string)
        })
        .filter(|version| version != "system")
        .collect()
}
