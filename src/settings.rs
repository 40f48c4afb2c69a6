//! Persisted settings tree (`setting.json`).
//!
//! The tree is a nested JSON object keyed by panel section. On load it is merged
//! against the in-code defaults: keys the defaults know about keep the user's value,
//! new default keys appear, and keys the defaults do not know about are dropped.
//! Every mutation through `SettingsStore` is written back to disk immediately.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Maximum length of the recently-opened lists.
pub const RECENT_LIMIT: usize = 10;

/// The default settings tree.
pub fn default_settings() -> Value {
    json!({
        "project": {
            "mode": "standalone",
            "custom_python_path": "",
            "current": "",
            "recent": []
        },
        "designer": {
            "mode": "project",
            "custom_python_path": "",
            "output_dir": "",
            "recent_ui": []
        },
        "pack": {
            "mode": "project",
            "custom_python_path": "",
            "entry_file": ""
        },
        "other": {
            "mode": "project",
            "custom_python_path": "",
            "project_folder": ""
        },
        "settings": {
            "mode": "existing",
            "custom_python_path": "",
            "pyenv_path": "",
            "pyenv_current_version": "",
            "pyenv_mirror_url": "origin",
            "pip_mirror_url": "origin"
        }
    })
}

/// Loads the settings at `path`, merged against `defaults`.
///
/// A missing file is created from `defaults`, which are then returned as-is.
pub fn load(path: &Path, defaults: &Value) -> Result<Value> {
    if !path.exists() {
        log::info!("creating {} from defaults", path.display());
        write(path, defaults)?;
        return Ok(defaults.clone());
    }
    let loaded = read(path)?;
    Ok(merge_defaults(&loaded, defaults))
}

/// Reads and parses the file without merging.
pub fn read(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(value)
}

/// Serializes the whole tree with 4-space indentation and overwrites `path`.
pub fn write(path: &Path, tree: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    tree.serialize(&mut serializer)
        .context("failed to serialize settings")?;
    buffer.push(b'\n');
    fs::write(path, buffer)
        .with_context(|| format!("failed to write settings file {}", path.display()))?;
    Ok(())
}

/// Recursively merges `loaded` onto `defaults`.
///
/// Only keys present in `defaults` survive. Nested objects recurse; a default object
/// whose loaded counterpart is not an object keeps the default.
pub fn merge_defaults(loaded: &Value, defaults: &Value) -> Value {
    match (loaded, defaults) {
        (Value::Object(loaded), Value::Object(defaults)) => {
            let mut merged = Map::with_capacity(defaults.len());
            for (key, default) in defaults {
                let value = match loaded.get(key) {
                    Some(user) => match (user, default) {
                        (Value::Object(_), Value::Object(_)) => merge_defaults(user, default),
                        (_, Value::Object(_)) => {
                            log::warn!("settings key {} is not an object, using defaults", key);
                            default.clone()
                        }
                        _ => user.clone(),
                    },
                    None => default.clone(),
                };
                merged.insert(key.clone(), value);
            }
            for key in loaded.keys().filter(|key| !defaults.contains_key(*key)) {
                log::debug!("dropping unknown settings key {}", key);
            }
            Value::Object(merged)
        }
        (_, Value::Object(_)) => {
            log::warn!("settings root is not an object, using defaults");
            defaults.clone()
        }
        (user, _) => user.clone(),
    }
}

/// In-memory settings with write-through persistence.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    tree: Value,
}

impl SettingsStore {
    /// Loads (or creates) the settings file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tree = load(&path, &default_settings())?;
        Ok(Self { path, tree })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.tree.get(section)?.get(key)
    }

    /// String value, empty when absent or not a string.
    pub fn get_str(&self, section: &str, key: &str) -> &str {
        self.get(section, key)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// String list, non-string entries skipped.
    pub fn get_list(&self, section: &str, key: &str) -> Vec<String> {
        self.get(section, key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sets `section.key` and rewrites the file.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        let Some(root) = self.tree.as_object_mut() else {
            bail!("settings root is not an object");
        };
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(section_map) = entry.as_object_mut() else {
            bail!("settings section {} is not an object", section);
        };
        section_map.insert(key.to_string(), value.into());
        self.save()
    }

    /// Moves `item` to the front of a recent list, capped at `RECENT_LIMIT`.
    pub fn push_recent(&mut self, section: &str, key: &str, item: &str) -> Result<()> {
        let mut recent = self.get_list(section, key);
        recent.retain(|existing| existing != item);
        recent.insert(0, item.to_string());
        recent.truncate(RECENT_LIMIT);
        self.set(section, key, recent)
    }

    pub fn save(&self) -> Result<()> {
        write(&self.path, &self.tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("setting.json");
        let defaults = default_settings();
        let first = load(&path, &defaults).unwrap();
        assert!(path.exists());
        assert_eq!(first, defaults);
        let second = load(&path, &defaults).unwrap();
        assert_eq!(second, defaults);
    }

    #[test]
    fn written_file_uses_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setting.json");
        write(&path, &json!({"project": {"mode": "standalone"}})).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    \"project\": {\n        \"mode\""));
    }

    #[test]
    fn write_then_read_round_trips_any_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setting.json");
        let tree = json!({
            "a": [1, 2.5, null, true, "x"],
            "b": {"nested": {"deep": "value"}},
            "unicode": "打包"
        });
        write(&path, &tree).unwrap();
        assert_eq!(read(&path).unwrap(), tree);
    }

    #[test]
    fn load_round_trips_trees_shaped_like_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setting.json");
        let mut tree = default_settings();
        tree["project"]["custom_python_path"] = json!("/usr/bin/python3");
        tree["project"]["recent"] = json!(["/work/a", "/work/b"]);
        tree["settings"]["mode"] = json!("pyenv");
        write(&path, &tree).unwrap();
        assert_eq!(load(&path, &default_settings()).unwrap(), tree);
    }

    #[test]
    fn merge_keeps_user_values_and_adds_new_keys() {
        let defaults = json!({
            "pack": {"mode": "project", "entry_file": ""},
            "other": {"mode": "project"}
        });
        let loaded = json!({"pack": {"mode": "standalone"}});
        let merged = merge_defaults(&loaded, &defaults);
        assert_eq!(
            merged,
            json!({"pack": {"mode": "standalone", "entry_file": ""}, "other": {"mode": "project"}})
        );
    }

    #[test]
    fn merge_drops_orphan_keys() {
        let defaults = json!({"pack": {"mode": "project"}});
        let loaded = json!({"pack": {"mode": "global", "stale": 1}, "legacy": {}});
        let merged = merge_defaults(&loaded, &defaults);
        assert_eq!(merged, json!({"pack": {"mode": "global"}}));
    }

    #[test]
    fn merge_is_idempotent() {
        let defaults = default_settings();
        let loaded = json!({"project": {"mode": "global", "recent": ["x"]}, "junk": 3});
        let once = merge_defaults(&loaded, &defaults);
        let twice = merge_defaults(&once, &defaults);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_replaces_non_object_sections() {
        let defaults = json!({"pack": {"mode": "project"}});
        let merged = merge_defaults(&json!({"pack": "broken"}), &defaults);
        assert_eq!(merged, defaults);
        let merged = merge_defaults(&json!([1, 2]), &defaults);
        assert_eq!(merged, defaults);
    }

    #[test]
    fn store_writes_through_on_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setting.json");
        let mut store = SettingsStore::open(&path).unwrap();
        store.set("pack", "entry_file", "/work/main.py").unwrap();
        let on_disk = read(&path).unwrap();
        assert_eq!(on_disk["pack"]["entry_file"], json!("/work/main.py"));
        assert_eq!(store.get_str("pack", "entry_file"), "/work/main.py");
        assert_eq!(store.get_str("pack", "missing"), "");
    }

    #[test]
    fn push_recent_dedups_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::open(dir.path().join("setting.json")).unwrap();
        for i in 0..12 {
            store
                .push_recent("project", "recent", &format!("/p/{}", i))
                .unwrap();
        }
        store.push_recent("project", "recent", "/p/5").unwrap();
        let recent = store.get_list("project", "recent");
        assert_eq!(recent.len(), RECENT_LIMIT);
        assert_eq!(recent[0], "/p/5");
        assert_eq!(recent.iter().filter(|p| *p == "/p/5").count(), 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setting.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load(&path, &default_settings()).unwrap_err();
        assert!(err.to_string().contains("failed to parse settings file"));
    }
}
