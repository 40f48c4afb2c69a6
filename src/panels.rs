//! Panel kinds and the actions each panel offers.
//!
//! A panel is a view over one settings section plus one worker slot. The action table
//! is static; what an action does is decided by `App::trigger`.

use std::fmt;

use crate::resolver::EnvMode;

/// The application's panels, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum PanelKind {
    Project,
    Designer,
    Pack,
    Other,
    Settings,
}

/// A user-triggerable action on a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelAction {
    /// Stable identifier, also accepted by `pycreator run`.
    pub slug: &'static str,
    pub label: &'static str,
    /// Prompt shown when the action needs a line of input.
    pub prompt: Option<&'static str>,
}

const fn action(slug: &'static str, label: &'static str) -> PanelAction {
    PanelAction {
        slug,
        label,
        prompt: None,
    }
}

const fn prompted(slug: &'static str, label: &'static str, prompt: &'static str) -> PanelAction {
    PanelAction {
        slug,
        label,
        prompt: Some(prompt),
    }
}

const PROJECT_ACTIONS: &[PanelAction] = &[
    prompted("open_project", "Open project folder", "Project folder"),
    prompted("set_mode", "Interpreter mode", "Mode (standalone/global)"),
    prompted("set_interpreter", "Select interpreter", "Path to python"),
    action("py_version", "Show Python version"),
    action("pip_list", "List installed packages"),
];

const DESIGNER_ACTIONS: &[PanelAction] = &[
    prompted("set_mode", "Interpreter mode", "Mode (standalone/global/project)"),
    prompted("set_interpreter", "Select interpreter", "Path to python"),
    action("py_version", "Show Python version"),
    action("designer_install", "Install PySide6"),
    action("designer_open", "Open Qt Designer"),
    prompted("set_output_dir", "Generated code directory", "Output directory"),
    prompted("generate_code", "Generate code from .ui", "Path to .ui file"),
    prompted("compile_resources", "Compile .qrc resources", "Path to .qrc file"),
];

const PACK_ACTIONS: &[PanelAction] = &[
    prompted("set_mode", "Interpreter mode", "Mode (standalone/global/project)"),
    prompted("set_interpreter", "Select interpreter", "Path to python"),
    prompted("set_entry_file", "Entry file", "Path to main script"),
    action("pyinstaller_install", "Install PyInstaller"),
    action("pyinstaller_upgrade", "Upgrade PyInstaller"),
    action("nuitka_install", "Install Nuitka"),
    action("pack_pyinstaller", "Pack with PyInstaller"),
    action("pack_nuitka", "Pack with Nuitka"),
    action("edit_pyinstaller", "Edit PyInstaller parameters"),
    action("edit_nuitka", "Edit Nuitka parameters"),
];

const OTHER_ACTIONS: &[PanelAction] = &[
    prompted("set_mode", "Interpreter mode", "Mode (standalone/global/project)"),
    prompted("set_interpreter", "Select interpreter", "Path to python"),
    prompted("set_project_folder", "Project folder", "Folder to scan"),
    action("pipreqs_install", "Install pipreqs"),
    action("pipreqs_upgrade", "Upgrade pipreqs"),
    action("pipreqs_uninstall", "Uninstall pipreqs"),
    action("generate_requirements", "Generate requirements.txt"),
    action("install_requirements", "Install requirements.txt"),
    action("edit_pipreqs", "Edit pipreqs parameters"),
];

const SETTINGS_ACTIONS: &[PanelAction] = &[
    prompted("set_global_mode", "Global environment", "Mode (existing/pyenv)"),
    prompted("set_interpreter", "Global interpreter", "Path to python"),
    prompted("set_pyenv_path", "pyenv location", "pyenv root directory"),
    prompted("select_version", "Use pyenv version", "Version"),
    prompted("set_pyenv_mirror", "pyenv mirror", "Mirror name"),
    prompted("set_pip_mirror", "pip mirror", "Mirror name"),
    action("list", "List installable versions"),
    prompted("install", "Install version", "Version to install"),
    prompted("uninstall", "Uninstall version", "Version to uninstall"),
    action("versions", "List installed versions"),
    action("update", "Update pyenv"),
    action("fetch_releases", "Fetch CPython releases"),
];

impl PanelKind {
    pub const ALL: [PanelKind; 5] = [
        PanelKind::Project,
        PanelKind::Designer,
        PanelKind::Pack,
        PanelKind::Other,
        PanelKind::Settings,
    ];

    /// Key of this panel's section in `setting.json`.
    pub fn section(self) -> &'static str {
        match self {
            PanelKind::Project => "project",
            PanelKind::Designer => "designer",
            PanelKind::Pack => "pack",
            PanelKind::Other => "other",
            PanelKind::Settings => "settings",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PanelKind::Project => "Project",
            PanelKind::Designer => "Designer",
            PanelKind::Pack => "Pack",
            PanelKind::Other => "Other",
            PanelKind::Settings => "Settings",
        }
    }

    pub fn actions(self) -> &'static [PanelAction] {
        match self {
            PanelKind::Project => PROJECT_ACTIONS,
            PanelKind::Designer => DESIGNER_ACTIONS,
            PanelKind::Pack => PACK_ACTIONS,
            PanelKind::Other => OTHER_ACTIONS,
            PanelKind::Settings => SETTINGS_ACTIONS,
        }
    }

    pub fn action(self, slug: &str) -> Option<&'static PanelAction> {
        self.actions().iter().find(|action| action.slug == slug)
    }

    /// Interpreter modes a panel may select. The settings panel uses global modes instead.
    pub fn allowed_modes(self) -> &'static [EnvMode] {
        match self {
            PanelKind::Project => &[EnvMode::Standalone, EnvMode::FollowGlobal],
            PanelKind::Settings => &[],
            _ => &[EnvMode::Standalone, EnvMode::FollowGlobal, EnvMode::FollowProject],
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_unique_per_panel() {
        for panel in PanelKind::ALL {
            let slugs: Vec<&str> = panel.actions().iter().map(|a| a.slug).collect();
            let mut deduped = slugs.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(slugs.len(), deduped.len(), "{}", panel);
        }
    }

    #[test]
    fn project_panel_cannot_follow_project() {
        assert!(!PanelKind::Project
            .allowed_modes()
            .contains(&EnvMode::FollowProject));
        assert!(PanelKind::Pack.allowed_modes().contains(&EnvMode::FollowProject));
    }

    #[test]
    fn lookup_by_slug() {
        let action = PanelKind::Settings.action("install").unwrap();
        assert_eq!(action.prompt, Some("Version to install"));
        assert!(PanelKind::Project.action("install").is_none());
    }
}
