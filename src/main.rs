//! pycreator: a terminal front end for managing PyQt projects.
//!
//! This is the entry point of the application. It parses command-line arguments,
//! loads configuration and persisted settings, and either runs the interactive event
//! loop or executes a single panel action and exits.

mod app;
mod clipboard;
mod commands;
mod config;
mod events;
mod interpreter;
mod invoker;
mod output;
mod pack;
mod panels;
mod params;
mod process;
mod releases;
mod resolver;
mod settings;
mod tui;
mod watch;
mod worker;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use crate::app::{App, AppAction, Outcome};
use crate::config::{AppConfig, Config};
use crate::events::Event;
use crate::output::EntryLevel;
use crate::panels::PanelKind;
use crate::params::Tool;
use crate::settings::SettingsStore;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "pycreator",
    version,
    about = "Manage PyQt projects, interpreters and packaging from the terminal",
    styles = help_styles(),
    color = clap::ColorChoice::Always,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to pycreator.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding setting.json and the tool parameter files.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Log level used when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one panel action without the TUI.
    Run {
        #[arg(value_enum)]
        panel: PanelKind,
        /// Action name, e.g. `pip_list` or `pack_pyinstaller`.
        action: String,
        /// Value for actions that ask for input.
        input: Option<String>,
    },
    /// Print the command-line flags rendered from a parameter file.
    Params {
        #[arg(value_enum)]
        tool: Tool,
    },
    /// Print the merged settings tree.
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_app_config(&cli)?;
    init_logging(&config)?;
    log::info!("pycreator {} starting", env!("CARGO_PKG_VERSION"));

    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;
    params::ensure_sidecars(&config.data_dir).with_context(|| {
        format!(
            "failed to create parameter files in {}",
            config.data_dir.display()
        )
    })?;
    let settings_path = config.settings_path();
    let settings = SettingsStore::open(&settings_path)
        .with_context(|| format!("cannot start with settings file {}", settings_path.display()))?;
    log::debug!("settings loaded from {}", settings.path().display());

    match cli.command {
        Some(Commands::Params { tool }) => {
            let flags = tool.render(&config.data_dir)?;
            println!("{}", flags.join(" "));
            Ok(())
        }
        Some(Commands::Settings) => {
            println!("{}", serde_json::to_string_pretty(settings.tree())?);
            Ok(())
        }
        Some(Commands::Run {
            panel,
            action,
            input,
        }) => run_once(config, settings, panel, &action, input.as_deref()).await,
        None => run_tui(config, settings).await,
    }
}

fn load_app_config(cli: &Cli) -> Result<AppConfig> {
    let path = cli.config.clone().or_else(config::default_config_path);
    let raw = match path {
        Some(path) => config::load_config(&path)?,
        None => Config::default(),
    };
    let mut config = AppConfig::from_config(raw);
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn init_logging(config: &AppConfig) -> Result<()> {
    if let Some(parent) = config.log_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .target(env_logger::Target::Pipe(Box::new(file)))
    .format_timestamp_secs()
    .try_init()
    .context("failed to initialise logging")?;
    Ok(())
}

async fn run_tui(config: AppConfig, settings: SettingsStore) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel(256);
    let tick_rate = Duration::from_millis(config.tick_ms);
    watch::spawn_sidecar_watcher(config.data_dir.clone(), event_tx.clone());
    let mut app = App::new(config, settings, event_tx.clone());

    let mut terminal = tui::init_terminal()?;
    spawn_input_listener(event_tx.clone());
    spawn_signal_listener(event_tx.clone());

    let mut ticker = tokio::time::interval(tick_rate);
    let mut result = Ok(());

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    Event::CommandFinished { panel, request, result } => {
                        app.on_command_finished(panel, request, result);
                    }
                    Event::SidecarChanged { tool, error } => app.on_sidecar_changed(tool, error),
                    Event::Releases(releases) => app.on_releases(releases),
                    Event::Key(key) => {
                        let action = app.handle_key(key);
                        if let Err(err) =
                            handle_app_action(action, &mut app, &mut terminal, &event_tx)
                        {
                            app.set_status_error(format!("{:#}", err));
                        }
                    }
                    Event::Resize { .. } => {}
                    Event::Shutdown => app.should_quit = true,
                }
            }
            _ = ticker.tick() => {}
        }

        if app.should_quit {
            break;
        }
        if let Err(err) = tui::draw(&app, &mut terminal) {
            result = Err(err.into());
            break;
        }
    }

    for panel in PanelKind::ALL {
        if app.panel(panel).worker.is_busy() {
            app.stop(panel);
        }
    }
    tui::restore_terminal(terminal)?;
    log::info!("pycreator exiting");
    result
}

fn handle_app_action(
    action: AppAction,
    app: &mut App,
    terminal: &mut tui::TuiTerminal,
    event_tx: &mpsc::Sender<Event>,
) -> Result<()> {
    match action {
        AppAction::None => {}
        AppAction::Quit => app.should_quit = true,
        AppAction::CopyOutput => {
            let text = app.selected_output_text().unwrap_or_default();
            match clipboard::copy_output(&text) {
                Ok(()) => app.set_status_message("output copied to clipboard"),
                Err(err) => app.set_status_error(format!("clipboard failed: {:#}", err)),
            }
        }
        AppAction::EditSidecar(tool) => {
            tui::suspend(terminal)?;
            let edited = edit_sidecar(app, tool);
            tui::resume(terminal)?;
            edited?;
            report_sidecar(app, tool);
        }
        AppAction::FetchReleases => {
            app.set_status_message("fetching CPython releases");
            spawn_release_fetch(event_tx.clone());
        }
    }
    Ok(())
}

/// Blocks until the configured editor exits.
fn edit_sidecar(app: &App, tool: Tool) -> Result<()> {
    let path = tool.sidecar_path(&app.config.data_dir);
    let mut parts = shell_words::split(&app.config.editor)
        .with_context(|| format!("invalid editor command {:?}", app.config.editor))?;
    if parts.is_empty() {
        bail!("no editor configured");
    }
    let program = parts.remove(0);
    log::debug!("editing {} with {}", path.display(), program);
    let status = std::process::Command::new(&program)
        .args(&parts)
        .arg(&path)
        .status()
        .with_context(|| format!("failed to start editor {}", program))?;
    if !status.success() {
        log::warn!("editor {} exited with {}", program, status);
    }
    Ok(())
}

fn report_sidecar(app: &mut App, tool: Tool) {
    let error = tool
        .validate(&app.config.data_dir)
        .err()
        .map(|err| err.to_string());
    app.on_sidecar_changed(tool, error);
}

fn spawn_release_fetch(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let releases = releases::fetch_releases()
            .await
            .map_err(|err| format!("{:#}", err));
        let _ = tx.send(Event::Releases(releases)).await;
    });
}

/// Runs one action to completion, follow-up commands included.
async fn run_once(
    config: AppConfig,
    settings: SettingsStore,
    panel: PanelKind,
    action: &str,
    input: Option<&str>,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let mut app = App::new(config, settings, event_tx.clone());

    let mut success = true;
    match app.trigger(panel, action, input) {
        Ok(Outcome::Started) => {
            let mut first = true;
            while app.any_busy() {
                let Some(event) = event_rx.recv().await else {
                    break;
                };
                if let Event::CommandFinished {
                    panel,
                    request,
                    result,
                } = event
                {
                    if first {
                        success = result.success;
                        first = false;
                    }
                    for line in result.output_lines() {
                        println!("{}", line);
                    }
                    app.on_command_finished(panel, request, result);
                }
            }
        }
        Ok(Outcome::Updated(message)) => println!("{}", message),
        Ok(Outcome::Requires(AppAction::FetchReleases)) => {
            for release in releases::fetch_releases().await? {
                println!("{}", release);
            }
        }
        Ok(Outcome::Requires(AppAction::EditSidecar(tool))) => {
            edit_sidecar(&app, tool)?;
            report_sidecar(&mut app, tool);
        }
        Ok(Outcome::Requires(_)) => {}
        Err(err) => bail!("{}", err),
    }

    for entry in app.log.iter() {
        let prefix = entry
            .panel
            .map(|panel| format!("[{}] ", panel))
            .unwrap_or_default();
        match entry.level {
            EntryLevel::Error => {
                success = false;
                eprintln!("{}{}", prefix, entry.text);
            }
            EntryLevel::Info | EntryLevel::Output => eprintln!("{}{}", prefix, entry.text),
        }
    }
    if !success {
        bail!("{} failed", action);
    }
    Ok(())
}

fn spawn_input_listener(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || loop {
        if crossterm::event::poll(Duration::from_millis(100)).unwrap_or(false) {
            let sent = match crossterm::event::read() {
                Ok(crossterm::event::Event::Key(key)) => tx.blocking_send(Event::Key(key)),
                Ok(crossterm::event::Event::Resize(width, height)) => {
                    tx.blocking_send(Event::Resize { width, height })
                }
                _ => Ok(()),
            };
            if sent.is_err() {
                break;
            }
        }
    });
}

fn spawn_signal_listener(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(_) => return,
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        let _ = tx.send(Event::Shutdown).await;
    });
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_subcommand_parses_panel_and_input() {
        let cli = Cli::try_parse_from([
            "pycreator",
            "--data-dir",
            "state",
            "run",
            "settings",
            "install",
            "3.11.9",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("state")));
        match cli.command {
            Some(Commands::Run {
                panel,
                action,
                input,
            }) => {
                assert_eq!(panel, PanelKind::Settings);
                assert_eq!(action, "install");
                assert!(panel.action(&action).is_some());
                assert_eq!(input.as_deref(), Some("3.11.9"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn cli_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pycreator.toml");
        fs::write(&path, "data_dir = \"from-file\"\nlog_level = \"warn\"\n").unwrap();
        let cli = Cli::try_parse_from([
            "pycreator",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "debug",
        ])
        .unwrap();
        let config = load_app_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("from-file"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn params_subcommand_takes_tool_name() {
        let cli = Cli::try_parse_from(["pycreator", "params", "nuitka"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Params { tool: Tool::Nuitka })
        ));
    }
}
