//! Interpreter resolution.
//!
//! Each panel stores an interpreter mode in its settings section. Resolution follows
//! that mode to a concrete interpreter:
//!
//! - `standalone` uses the panel's own `custom_python_path`;
//! - `global` uses the settings section, either its own path or a pyenv version;
//! - `project` resolves the project panel, which may itself only be standalone or global.
//!
//! An empty path is never a successful resolution.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::interpreter::Interpreter;
use crate::panels::PanelKind;
use crate::settings::SettingsStore;

/// Per-panel interpreter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Standalone,
    FollowGlobal,
    FollowProject,
}

impl EnvMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standalone" => Some(EnvMode::Standalone),
            "global" => Some(EnvMode::FollowGlobal),
            "project" => Some(EnvMode::FollowProject),
            _ => None,
        }
    }

    /// Value stored in `setting.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            EnvMode::Standalone => "standalone",
            EnvMode::FollowGlobal => "global",
            EnvMode::FollowProject => "project",
        }
    }
}

impl fmt::Display for EnvMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the global interpreter is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalMode {
    /// An interpreter already on disk.
    Existing,
    /// A version managed by the bundled pyenv.
    Pyenv,
}

impl GlobalMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "existing" => Some(GlobalMode::Existing),
            "pyenv" => Some(GlobalMode::Pyenv),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GlobalMode::Existing => "existing",
            GlobalMode::Pyenv => "pyenv",
        }
    }
}

/// Why no interpreter could be chosen. Shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no interpreter selected for the {0} panel")]
    NoInterpreter(PanelKind),
    #[error("no global interpreter configured")]
    NoGlobalInterpreter,
    #[error("no pyenv version selected")]
    NoPyenvVersion,
    #[error("the project panel cannot follow the project")]
    ProjectCycle,
    #[error("unknown interpreter mode {mode:?} for the {panel} panel")]
    UnknownMode { panel: PanelKind, mode: String },
}

/// Resolves interpreters from a settings snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    settings: &'a SettingsStore,
    default_pyenv_root: &'a Path,
}

impl<'a> Resolver<'a> {
    pub fn new(settings: &'a SettingsStore, default_pyenv_root: &'a Path) -> Self {
        Self {
            settings,
            default_pyenv_root,
        }
    }

    /// Resolves the interpreter `panel` should run against.
    pub fn resolve(&self, panel: PanelKind) -> Result<Interpreter, ResolveError> {
        if panel == PanelKind::Settings {
            return self.resolve_global();
        }
        match self.mode(panel)? {
            EnvMode::Standalone => self.standalone(panel),
            EnvMode::FollowGlobal => self.resolve_global(),
            EnvMode::FollowProject => {
                if panel == PanelKind::Project {
                    return Err(ResolveError::ProjectCycle);
                }
                match self.mode(PanelKind::Project)? {
                    EnvMode::Standalone => self.standalone(PanelKind::Project),
                    EnvMode::FollowGlobal => self.resolve_global(),
                    EnvMode::FollowProject => Err(ResolveError::ProjectCycle),
                }
            }
        }
    }

    /// Resolves the global interpreter from the settings section.
    pub fn resolve_global(&self) -> Result<Interpreter, ResolveError> {
        let section = PanelKind::Settings.section();
        let raw_mode = self.settings.get_str(section, "mode");
        let mode = GlobalMode::parse(raw_mode).ok_or_else(|| ResolveError::UnknownMode {
            panel: PanelKind::Settings,
            mode: raw_mode.to_string(),
        })?;
        match mode {
            GlobalMode::Existing => {
                let path = self.settings.get_str(section, "custom_python_path").trim();
                if path.is_empty() {
                    return Err(ResolveError::NoGlobalInterpreter);
                }
                Ok(Interpreter::new(path))
            }
            GlobalMode::Pyenv => {
                let version = self
                    .settings
                    .get_str(section, "pyenv_current_version")
                    .trim();
                if version.is_empty() {
                    return Err(ResolveError::NoPyenvVersion);
                }
                Ok(Interpreter::new(pyenv_python(&self.pyenv_root(), version)))
            }
        }
    }

    /// pyenv installation in use: the configured path, else the bundled default.
    pub fn pyenv_root(&self) -> PathBuf {
        pyenv_root(self.settings, self.default_pyenv_root)
    }

    fn mode(&self, panel: PanelKind) -> Result<EnvMode, ResolveError> {
        let raw = self.settings.get_str(panel.section(), "mode");
        EnvMode::parse(raw).ok_or_else(|| ResolveError::UnknownMode {
            panel,
            mode: raw.to_string(),
        })
    }

    fn standalone(&self, panel: PanelKind) -> Result<Interpreter, ResolveError> {
        let path = self
            .settings
            .get_str(panel.section(), "custom_python_path")
            .trim();
        if path.is_empty() {
            return Err(ResolveError::NoInterpreter(panel));
        }
        Ok(Interpreter::new(path))
    }
}

pub fn pyenv_root(settings: &SettingsStore, default_root: &Path) -> PathBuf {
    let configured = settings.get_str(PanelKind::Settings.section(), "pyenv_path").trim();
    if configured.is_empty() {
        default_root.to_path_buf()
    } else {
        PathBuf::from(configured)
    }
}

/// The pyenv entry script under `root`.
pub fn pyenv_executable(root: &Path) -> PathBuf {
    if cfg!(windows) {
        root.join("bin").join("pyenv.bat")
    } else {
        root.join("bin").join("pyenv")
    }
}

/// Interpreter of a pyenv-managed version.
pub fn pyenv_python(root: &Path, version: &str) -> PathBuf {
    let version_dir = root.join("versions").join(version);
    if cfg!(windows) {
        version_dir.join("python.exe")
    } else {
        version_dir.join("bin").join("python")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("setting.json")).unwrap();
        (dir, store)
    }

    fn resolve(store: &SettingsStore, panel: PanelKind) -> Result<Interpreter, ResolveError> {
        Resolver::new(store, Path::new("libs/pyenv")).resolve(panel)
    }

    #[test]
    fn standalone_uses_panel_path() {
        let (_dir, mut store) = store();
        store.set("pack", "mode", "standalone").unwrap();
        store
            .set("pack", "custom_python_path", "C:\\Python39\\python.exe")
            .unwrap();
        let interp = resolve(&store, PanelKind::Pack).unwrap();
        assert_eq!(interp.python(), Path::new("C:\\Python39\\python.exe"));
    }

    #[test]
    fn empty_path_is_never_success() {
        let (_dir, mut store) = store();
        store.set("pack", "mode", "standalone").unwrap();
        store.set("pack", "custom_python_path", "   ").unwrap();
        assert_eq!(
            resolve(&store, PanelKind::Pack),
            Err(ResolveError::NoInterpreter(PanelKind::Pack))
        );
        store.set("pack", "mode", "global").unwrap();
        assert_eq!(
            resolve(&store, PanelKind::Pack),
            Err(ResolveError::NoGlobalInterpreter)
        );
    }

    #[test]
    fn global_pyenv_requires_version() {
        let (_dir, mut store) = store();
        store.set("other", "mode", "global").unwrap();
        store.set("settings", "mode", "pyenv").unwrap();
        assert_eq!(
            resolve(&store, PanelKind::Other),
            Err(ResolveError::NoPyenvVersion)
        );
        store
            .set("settings", "pyenv_current_version", "3.11.4")
            .unwrap();
        let interp = resolve(&store, PanelKind::Other).unwrap();
        assert_eq!(
            interp.python(),
            pyenv_python(Path::new("libs/pyenv"), "3.11.4").as_path()
        );
    }

    #[test]
    fn configured_pyenv_path_wins() {
        let (_dir, mut store) = store();
        store.set("settings", "mode", "pyenv").unwrap();
        store.set("settings", "pyenv_path", "/opt/pyenv").unwrap();
        store
            .set("settings", "pyenv_current_version", "3.12.1")
            .unwrap();
        let interp = resolve(&store, PanelKind::Settings).unwrap();
        assert!(interp.python().starts_with("/opt/pyenv/versions/3.12.1"));
    }

    #[test]
    fn follow_project_uses_project_choice() {
        let (_dir, mut store) = store();
        store.set("designer", "mode", "project").unwrap();
        store.set("project", "mode", "standalone").unwrap();
        store
            .set("project", "custom_python_path", "/venv/bin/python")
            .unwrap();
        let interp = resolve(&store, PanelKind::Designer).unwrap();
        assert_eq!(interp.python(), Path::new("/venv/bin/python"));

        store.set("project", "mode", "global").unwrap();
        store
            .set("settings", "custom_python_path", "/usr/bin/python3")
            .unwrap();
        let interp = resolve(&store, PanelKind::Designer).unwrap();
        assert_eq!(interp.python(), Path::new("/usr/bin/python3"));
    }

    #[test]
    fn project_following_project_is_rejected() {
        let (_dir, mut store) = store();
        store.set("project", "mode", "project").unwrap();
        store
            .set("project", "custom_python_path", "/venv/bin/python")
            .unwrap();
        assert_eq!(
            resolve(&store, PanelKind::Project),
            Err(ResolveError::ProjectCycle)
        );
        store.set("pack", "mode", "project").unwrap();
        assert_eq!(
            resolve(&store, PanelKind::Pack),
            Err(ResolveError::ProjectCycle)
        );
    }

    #[test]
    fn pyenv_script_lives_in_bin() {
        let exe = pyenv_executable(Path::new("libs/pyenv"));
        assert!(exe.starts_with("libs/pyenv/bin"));
    }

    #[test]
    fn unknown_mode_is_reported() {
        let (_dir, mut store) = store();
        store.set("pack", "mode", "sometimes").unwrap();
        assert!(matches!(
            resolve(&store, PanelKind::Pack),
            Err(ResolveError::UnknownMode { panel: PanelKind::Pack, .. })
        ));
    }

    #[test]
    fn every_mode_yields_path_or_error() {
        let (_dir, mut store) = store();
        for panel in PanelKind::ALL {
            for mode in ["standalone", "global", "project"] {
                if panel != PanelKind::Settings {
                    store.set(panel.section(), "mode", mode).unwrap();
                }
                if let Ok(interp) = resolve(&store, panel) {
                    assert!(!interp.python().as_os_str().is_empty());
                }
            }
        }
    }
}
