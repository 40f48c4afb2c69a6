//! Configuration management for pycreator.
//!
//! This module defines the structure of the optional `pycreator.toml` file and resolves
//! it, together with command-line overrides, into the `AppConfig` the rest of the
//! application reads.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level structure of `pycreator.toml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Directory holding `setting.json` and the tool sidecars (default: `data`).
    pub data_dir: Option<String>,
    /// Log file path (default: `logs/app.log`).
    pub log_file: Option<String>,
    /// Log level filter when `RUST_LOG` is unset (default: `info`).
    pub log_level: Option<String>,
    /// Bundled pyenv installation used when the settings leave `pyenv_path` empty.
    pub pyenv_root: Option<String>,
    /// Encoding requested from spawned Python processes (default: `utf-8`).
    pub encoding: Option<String>,
    /// Lines kept from verbose tools (default: 50).
    pub verbose_tail_lines: Option<usize>,
    /// Command-name fragments that mark a tool as verbose (default: `["nuitka"]`).
    pub verbose_tools: Option<Vec<String>>,
    /// Editor used for sidecar files.
    pub editor: Option<String>,
    /// UI redraw interval in milliseconds (default: 150).
    pub tick_ms: Option<u64>,
    /// Mirror table for pyenv downloads, keyed by the names stored in `setting.json`.
    pub pyenv_mirrors: Option<Vec<Mirror>>,
    /// Mirror table for pip, keyed the same way.
    pub pip_mirrors: Option<Vec<Mirror>>,
}

/// A named download mirror.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Mirror {
    pub name: String,
    pub url: String,
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
    pub pyenv_root: PathBuf,
    pub encoding: String,
    pub verbose_tail_lines: usize,
    pub verbose_tools: Vec<String>,
    pub editor: String,
    pub tick_ms: u64,
    pub pyenv_mirrors: Vec<Mirror>,
    pub pip_mirrors: Vec<Mirror>,
}

/// Name of the mirror entry meaning "use the tool's own default".
pub const ORIGIN_MIRROR: &str = "origin";

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig::from_config(Config::default())
    }
}

impl AppConfig {
    pub fn from_config(config: Config) -> Self {
        Self {
            data_dir: PathBuf::from(config.data_dir.unwrap_or_else(|| "data".into())),
            log_file: PathBuf::from(config.log_file.unwrap_or_else(|| "logs/app.log".into())),
            log_level: config.log_level.unwrap_or_else(|| "info".into()),
            pyenv_root: PathBuf::from(
                config
                    .pyenv_root
                    .unwrap_or_else(|| default_pyenv_root().into()),
            ),
            encoding: config.encoding.unwrap_or_else(|| "utf-8".into()),
            verbose_tail_lines: config.verbose_tail_lines.unwrap_or(50),
            verbose_tools: config
                .verbose_tools
                .unwrap_or_else(|| vec!["nuitka".to_string()]),
            editor: config.editor.unwrap_or_else(default_editor),
            tick_ms: config.tick_ms.unwrap_or(150).max(16),
            pyenv_mirrors: config.pyenv_mirrors.unwrap_or_else(default_pyenv_mirrors),
            pip_mirrors: config.pip_mirrors.unwrap_or_else(default_pip_mirrors),
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("setting.json")
    }

    /// Resolves a pyenv mirror name to its URL. `origin` and unknown names resolve to `None`.
    pub fn pyenv_mirror_url(&self, name: &str) -> Option<&str> {
        lookup_mirror(&self.pyenv_mirrors, name)
    }

    /// Resolves a pip index mirror name to its URL. `origin` and unknown names resolve to `None`.
    pub fn pip_mirror_url(&self, name: &str) -> Option<&str> {
        lookup_mirror(&self.pip_mirrors, name)
    }
}

fn lookup_mirror<'a>(mirrors: &'a [Mirror], name: &str) -> Option<&'a str> {
    if name.is_empty() || name == ORIGIN_MIRROR {
        return None;
    }
    mirrors
        .iter()
        .find(|mirror| mirror.name == name)
        .map(|mirror| mirror.url.as_str())
}

fn default_pyenv_root() -> &'static str {
    if cfg!(windows) {
        "libs/pyenv-win"
    } else {
        "libs/pyenv"
    }
}

fn default_editor() -> String {
    if cfg!(windows) {
        return "notepad".to_string();
    }
    std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string())
}

fn default_pyenv_mirrors() -> Vec<Mirror> {
    vec![
        Mirror {
            name: ORIGIN_MIRROR.into(),
            url: "https://www.python.org/ftp/python".into(),
        },
        Mirror {
            name: "taobao".into(),
            url: "https://npm.taobao.org/mirrors/python".into(),
        },
        Mirror {
            name: "huawei".into(),
            url: "https://mirrors.huaweicloud.com/python".into(),
        },
    ]
}

fn default_pip_mirrors() -> Vec<Mirror> {
    vec![
        Mirror {
            name: ORIGIN_MIRROR.into(),
            url: "https://pypi.org/simple".into(),
        },
        Mirror {
            name: "tsinghua".into(),
            url: "https://pypi.tuna.tsinghua.edu.cn/simple".into(),
        },
        Mirror {
            name: "aliyun".into(),
            url: "https://mirrors.aliyun.com/pypi/simple".into(),
        },
        Mirror {
            name: "ustc".into(),
            url: "https://pypi.mirrors.ustc.edu.cn/simple".into(),
        },
    ]
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Returns `./pycreator.toml` when it exists.
pub fn default_config_path() -> Option<PathBuf> {
    let path = Path::new("pycreator.toml");
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_optional_fields() {
        let raw = r#"
data_dir = "state"
log_file = "state/app.log"
log_level = "debug"
pyenv_root = "/opt/pyenv"
encoding = "gbk"
verbose_tail_lines = 20
verbose_tools = ["nuitka", "scons"]
editor = "code --wait"
tick_ms = 100

[[pip_mirrors]]
name = "corp"
url = "https://pypi.corp.example/simple"
"#;
        let config: Config = toml::from_str(raw).unwrap();
        let app = AppConfig::from_config(config);
        assert_eq!(app.data_dir, PathBuf::from("state"));
        assert_eq!(app.settings_path(), PathBuf::from("state").join("setting.json"));
        assert_eq!(app.log_level, "debug");
        assert_eq!(app.encoding, "gbk");
        assert_eq!(app.verbose_tail_lines, 20);
        assert_eq!(app.verbose_tools, vec!["nuitka", "scons"]);
        assert_eq!(app.editor, "code --wait");
        assert_eq!(app.pip_mirror_url("corp"), Some("https://pypi.corp.example/simple"));
        assert_eq!(app.pip_mirror_url("tsinghua"), None);
    }

    #[test]
    fn defaults_apply_when_file_is_empty() {
        let config: Config = toml::from_str("").unwrap();
        let app = AppConfig::from_config(config);
        assert_eq!(app.data_dir, PathBuf::from("data"));
        assert_eq!(app.log_file, PathBuf::from("logs/app.log"));
        assert_eq!(app.encoding, "utf-8");
        assert_eq!(app.verbose_tail_lines, 50);
        assert_eq!(app.tick_ms, 150);
    }

    #[test]
    fn origin_mirror_resolves_to_none() {
        let app = AppConfig::default();
        assert_eq!(app.pyenv_mirror_url(ORIGIN_MIRROR), None);
        assert_eq!(app.pyenv_mirror_url(""), None);
        assert_eq!(
            app.pyenv_mirror_url("taobao"),
            Some("https://npm.taobao.org/mirrors/python")
        );
    }
}
