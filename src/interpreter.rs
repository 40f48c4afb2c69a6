//! Layout of a Python installation.
//!
//! Given the interpreter binary, derives where its scripts live and the environment a
//! spawned tool needs to find that interpreter's site-packages.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A resolved interpreter. Paths are derived, never checked for existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    python: PathBuf,
}

impl Interpreter {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn python_str(&self) -> String {
        self.python.display().to_string()
    }

    /// Installation directory (the interpreter's parent).
    pub fn home(&self) -> PathBuf {
        self.python
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Directory holding console scripts installed by pip.
    pub fn scripts_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.home().join("Scripts")
        } else {
            self.home()
        }
    }

    /// Path of an installed console script.
    pub fn script(&self, name: &str) -> PathBuf {
        let file = if cfg!(windows) {
            format!("{}.exe", name)
        } else {
            name.to_string()
        };
        self.scripts_dir().join(file)
    }

    /// `python -m <module> <args>`.
    pub fn module_argv<I, S>(&self, module: &str, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![self.python_str(), "-m".to_string(), module.to_string()];
        argv.extend(args.into_iter().map(Into::into));
        argv
    }

    pub fn pip<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.module_argv("pip", args)
    }

    pub fn version_argv(&self) -> Vec<String> {
        vec![self.python_str(), "--version".to_string()]
    }

    pub fn pyinstaller(&self) -> PathBuf {
        self.script("pyinstaller")
    }

    pub fn pipreqs(&self) -> PathBuf {
        self.script("pipreqs")
    }

    pub fn designer(&self) -> PathBuf {
        self.script("pyside6-designer")
    }

    pub fn uic(&self) -> PathBuf {
        self.script("pyside6-uic")
    }

    pub fn rcc(&self) -> PathBuf {
        self.script("pyside6-rcc")
    }

    /// Directories a spawned tool needs on `PYTHONPATH`.
    pub fn python_path_entries(&self) -> Vec<PathBuf> {
        let home = self.home();
        let site_packages = home.join("Lib").join("site-packages");
        vec![
            home.clone(),
            home.join("DLLs"),
            home.join("Lib"),
            site_packages.clone(),
            site_packages.join("win32"),
            site_packages.join("win32").join("lib"),
            site_packages.join("Pythonwin"),
        ]
    }

    /// `PYTHONPATH` value joined with the platform separator.
    pub fn python_path(&self) -> OsString {
        std::env::join_paths(self.python_path_entries()).unwrap_or_else(|err| {
            log::warn!("cannot build PYTHONPATH for {}: {}", self.python.display(), err);
            OsString::new()
        })
    }

    /// Environment injected into every tool run against this interpreter.
    pub fn tool_env(&self, encoding: &str) -> HashMap<String, String> {
        let mut env = HashMap::new();
        let python_path = self.python_path();
        if !python_path.is_empty() {
            env.insert(
                "PYTHONPATH".to_string(),
                python_path.to_string_lossy().into_owned(),
            );
        }
        if !encoding.is_empty() {
            env.insert("PYTHONIOENCODING".to_string(), encoding.to_string());
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_home_and_scripts() {
        let interp = Interpreter::new(Path::new("/opt/py311/python"));
        assert_eq!(interp.home(), PathBuf::from("/opt/py311"));
        if cfg!(windows) {
            assert_eq!(
                interp.pyinstaller(),
                PathBuf::from("/opt/py311").join("Scripts").join("pyinstaller.exe")
            );
        } else {
            assert_eq!(interp.pyinstaller(), PathBuf::from("/opt/py311/pyinstaller"));
        }
    }

    #[test]
    fn pip_runs_as_module() {
        let interp = Interpreter::new("/opt/py/python");
        assert_eq!(
            interp.pip(["install", "pyinstaller"]),
            vec!["/opt/py/python", "-m", "pip", "install", "pyinstaller"]
        );
    }

    #[test]
    fn python_path_lists_site_packages_and_pywin32() {
        let interp = Interpreter::new(Path::new("/opt/py/python"));
        let entries = interp.python_path_entries();
        let site = PathBuf::from("/opt/py").join("Lib").join("site-packages");
        assert_eq!(entries[0], PathBuf::from("/opt/py"));
        assert!(entries.contains(&site));
        assert!(entries.contains(&site.join("win32").join("lib")));
        assert!(entries.contains(&site.join("Pythonwin")));
    }

    #[test]
    fn tool_env_sets_encoding() {
        let env = Interpreter::new("/opt/py/python").tool_env("utf-8");
        assert_eq!(env.get("PYTHONIOENCODING").map(String::as_str), Some("utf-8"));
        assert!(env.get("PYTHONPATH").is_some_and(|p| p.contains("site-packages")));
    }
}
