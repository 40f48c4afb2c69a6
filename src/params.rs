//! Tool parameter tables and their JSON sidecar files.
//!
//! Each packaging tool has a typed table whose field names match the keys of its sidecar
//! (`pyinstaller.json`, `nuitka.json`, `pipreqs.json`). Tables are loaded fresh before
//! every invocation and rendered to an argument list by `to_args`, which emits a flag
//! only when its value is set.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Output directory used when a table leaves it empty.
pub const DEFAULT_DIST_DIR: &str = "dist";

/// Failures loading a sidecar file.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed parameter file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The tools that have a parameter sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Tool {
    Pyinstaller,
    Nuitka,
    Pipreqs,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Pyinstaller, Tool::Nuitka, Tool::Pipreqs];

    pub fn file_name(self) -> &'static str {
        match self {
            Tool::Pyinstaller => "pyinstaller.json",
            Tool::Nuitka => "nuitka.json",
            Tool::Pipreqs => "pipreqs.json",
        }
    }

    pub fn sidecar_path(self, data_dir: &Path) -> PathBuf {
        data_dir.join(self.file_name())
    }

    /// Loads the tool's table from `data_dir` and renders it.
    pub fn render(self, data_dir: &Path) -> Result<Vec<String>, ParamsError> {
        let path = self.sidecar_path(data_dir);
        Ok(match self {
            Tool::Pyinstaller => load_sidecar::<PyinstallerParams>(&path)?.to_args(),
            Tool::Nuitka => load_sidecar::<NuitkaParams>(&path)?.to_args(),
            Tool::Pipreqs => load_sidecar::<PipreqsParams>(&path)?.to_args(),
        })
    }

    /// Parses the sidecar without writing anything; used to validate external edits.
    pub fn validate(self, data_dir: &Path) -> Result<(), ParamsError> {
        let path = self.sidecar_path(data_dir);
        match self {
            Tool::Pyinstaller => parse_sidecar::<PyinstallerParams>(&path).map(|_| ()),
            Tool::Nuitka => parse_sidecar::<NuitkaParams>(&path).map(|_| ()),
            Tool::Pipreqs => parse_sidecar::<PipreqsParams>(&path).map(|_| ()),
        }
    }

    /// Matches a sidecar file name back to its tool.
    pub fn from_file_name(name: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|tool| tool.file_name() == name)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tool::Pyinstaller => "pyinstaller",
            Tool::Nuitka => "nuitka",
            Tool::Pipreqs => "pipreqs",
        };
        f.write_str(label)
    }
}

/// Creates every missing sidecar in `data_dir` from the defaults.
///
/// Existing files are left alone and not parsed; a malformed table only fails the action
/// that reads it.
pub fn ensure_sidecars(data_dir: &Path) -> Result<(), ParamsError> {
    create_if_missing::<PyinstallerParams>(&Tool::Pyinstaller.sidecar_path(data_dir))?;
    create_if_missing::<NuitkaParams>(&Tool::Nuitka.sidecar_path(data_dir))?;
    create_if_missing::<PipreqsParams>(&Tool::Pipreqs.sidecar_path(data_dir))?;
    Ok(())
}

fn create_if_missing<T: Serialize + Default>(path: &Path) -> Result<(), ParamsError> {
    if path.exists() {
        return Ok(());
    }
    write_sidecar(path, &T::default())
}

/// Loads a table; a missing file is written from `T::default()` first.
pub fn load_sidecar<T>(path: &Path) -> Result<T, ParamsError>
where
    T: DeserializeOwned + Serialize + Default,
{
    if !path.exists() {
        let params = T::default();
        write_sidecar(path, &params)?;
        return Ok(params);
    }
    parse_sidecar(path)
}

fn parse_sidecar<T: DeserializeOwned>(path: &Path) -> Result<T, ParamsError> {
    let raw = fs::read_to_string(path).map_err(|source| ParamsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ParamsError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn write_sidecar<T: Serialize>(path: &Path, params: &T) -> Result<(), ParamsError> {
    let io_err = |source| ParamsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    params
        .serialize(&mut serializer)
        .map_err(|source| ParamsError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, buffer).map_err(io_err)
}

// Hand-edited sidecars often hold "" or a single string where a list is expected.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) if value.trim().is_empty() => Vec::new(),
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values.into_iter().filter(|v| !v.is_empty()).collect(),
        OneOrMany::Nothing(()) => Vec::new(),
    })
}

fn flag(args: &mut Vec<String>, enabled: bool, name: &str) {
    if enabled {
        args.push(name.to_string());
    }
}

fn separate(args: &mut Vec<String>, name: &str, value: &str) {
    if !value.is_empty() {
        args.push(name.to_string());
        args.push(value.to_string());
    }
}

fn separate_each(args: &mut Vec<String>, name: &str, values: &[String]) {
    for value in values {
        separate(args, name, value);
    }
}

fn joined(args: &mut Vec<String>, name: &str, value: &str) {
    if !value.is_empty() {
        args.push(format!("{}={}", name, value));
    }
}

fn joined_each(args: &mut Vec<String>, name: &str, values: &[String]) {
    for value in values {
        joined(args, name, value);
    }
}

/// PyInstaller output layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutType {
    /// One-file bundle (`-F`).
    #[default]
    File,
    /// One-folder bundle.
    Folder,
}

/// PyInstaller options, keyed like `pyinstaller.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PyinstallerParams {
    pub console: bool,
    pub debug: String,
    pub spec_path: String,
    pub import_path: String,
    #[serde(deserialize_with = "string_or_list")]
    pub exclude_module: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub hidden_import: Vec<String>,
    pub icon_path: String,
    pub workpath: String,
    pub log_level: String,
    pub out_type: OutType,
    pub out_name: String,
    pub distpath: String,
    #[serde(deserialize_with = "string_or_list")]
    pub add_data: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub add_binary: Vec<String>,
    pub is_clean: bool,
    pub encode: String,
    pub is_cover: bool,
    pub upx_dir: String,
    pub version_file: String,
    pub manifest: String,
    pub additional_hooks_dir: String,
    pub runtime_hook: String,
    pub runtime_tmpdir: String,
    pub key: String,
}

impl Default for PyinstallerParams {
    fn default() -> Self {
        Self {
            console: true,
            debug: String::new(),
            spec_path: String::new(),
            import_path: String::new(),
            exclude_module: Vec::new(),
            hidden_import: Vec::new(),
            icon_path: String::new(),
            workpath: String::new(),
            log_level: "INFO".to_string(),
            out_type: OutType::File,
            out_name: String::new(),
            distpath: String::new(),
            add_data: Vec::new(),
            add_binary: Vec::new(),
            is_clean: false,
            encode: String::new(),
            is_cover: false,
            upx_dir: String::new(),
            version_file: String::new(),
            manifest: String::new(),
            additional_hooks_dir: String::new(),
            runtime_hook: String::new(),
            runtime_tmpdir: String::new(),
            key: String::new(),
        }
    }
}

impl PyinstallerParams {
    /// Output directory, `dist` when unset.
    pub fn dist_dir(&self) -> &str {
        if self.distpath.is_empty() {
            DEFAULT_DIST_DIR
        } else {
            &self.distpath
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        flag(&mut args, !self.console, "-w");
        separate(&mut args, "-d", &self.debug);
        separate(&mut args, "--specpath", &self.spec_path);
        separate(&mut args, "-p", &self.import_path);
        separate_each(&mut args, "--exclude-module", &self.exclude_module);
        separate_each(&mut args, "--hidden-import", &self.hidden_import);
        separate(&mut args, "-i", &self.icon_path);
        separate(&mut args, "--workpath", &self.workpath);
        if !self.log_level.is_empty() && !self.log_level.eq_ignore_ascii_case("INFO") {
            separate(&mut args, "--log-level", &self.log_level);
        }
        flag(&mut args, self.out_type == OutType::File, "-F");
        separate(&mut args, "-n", &self.out_name);
        separate(&mut args, "--distpath", self.dist_dir());
        separate_each(&mut args, "--add-data", &self.add_data);
        separate_each(&mut args, "--add-binary", &self.add_binary);
        flag(&mut args, self.is_clean, "--clean");
        flag(&mut args, !self.encode.is_empty(), "-a");
        flag(&mut args, self.is_cover, "-y");
        separate(&mut args, "--upx-dir", &self.upx_dir);
        separate(&mut args, "--version-file", &self.version_file);
        separate(&mut args, "-m", &self.manifest);
        separate(&mut args, "--additional-hooks-dir", &self.additional_hooks_dir);
        separate(&mut args, "--runtime-hook", &self.runtime_hook);
        separate(&mut args, "--runtime-tmpdir", &self.runtime_tmpdir);
        separate(&mut args, "--key", &self.key);
        args
    }
}

/// Nuitka options, keyed like `nuitka.json` (the tool's own long-option names).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NuitkaParams {
    #[serde(flatten)]
    pub mode: NuitkaMode,
    #[serde(flatten)]
    pub include: NuitkaInclude,
    #[serde(flatten)]
    pub follow: NuitkaFollow,
    #[serde(flatten)]
    pub data: NuitkaData,
    #[serde(flatten)]
    pub output: NuitkaOutput,
    #[serde(flatten)]
    pub debug: NuitkaDebug,
    #[serde(flatten)]
    pub compiler: NuitkaCompiler,
    #[serde(flatten)]
    pub report: NuitkaReport,
    #[serde(flatten)]
    pub platform: NuitkaPlatform,
    #[serde(flatten)]
    pub version_info: NuitkaVersionInfo,
    #[serde(flatten)]
    pub plugins: NuitkaPlugins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaMode {
    pub module: bool,
    pub standalone: bool,
    pub onefile: bool,
    pub python_flag: String,
    pub python_debug: bool,
    pub python_for_scons: String,
}

impl Default for NuitkaMode {
    fn default() -> Self {
        Self {
            module: false,
            standalone: true,
            onefile: true,
            python_flag: String::new(),
            python_debug: false,
            python_for_scons: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaInclude {
    #[serde(deserialize_with = "string_or_list")]
    pub include_package: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub include_module: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub include_plugin_directory: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub include_plugin_files: Vec<String>,
    pub prefer_source_code: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaFollow {
    pub follow_imports: bool,
    pub follow_import_to: String,
    pub nofollow_import_to: String,
    pub nofollow_imports: bool,
    pub follow_stdlib: bool,
    pub onefile_tempdir_spec: String,
    pub onefile_no_compression: bool,
    pub onefile_as_archive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaData {
    #[serde(deserialize_with = "string_or_list")]
    pub include_package_data: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub include_data_files: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub include_data_dir: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub noinclude_data_files: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub include_onefile_external_data: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub include_raw_dir: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub noinclude_dlls: Vec<String>,
    pub warn_implicit_exceptions: bool,
    pub warn_unusual_code: bool,
    pub assume_yes_for_downloads: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaOutput {
    pub run: bool,
    pub debugger: String,
    pub full_compat: bool,
    pub output_filename: String,
    pub output_dir: String,
    pub remove_output: bool,
    pub no_pyi_file: bool,
    pub deployment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaDebug {
    pub debug: bool,
    pub unstripped: bool,
    pub profile: bool,
    pub internal_graph: bool,
    pub trace_execution: bool,
    pub recompile_c_only: bool,
    pub low_memory: bool,
    pub generate_c_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaCompiler {
    pub clang: bool,
    pub mingw64: bool,
    pub msvc: String,
    pub jobs: Option<u32>,
    pub lto: String,
    pub disable_bytecode_cache: bool,
    pub disable_ccache: bool,
    pub disable_dll_dependency_cache: bool,
    pub force_dll_dependency_cache_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaReport {
    pub quiet: bool,
    pub show_scons: bool,
    pub no_progressbar: bool,
    pub show_progress: bool,
    pub show_memory: bool,
    pub show_modules: bool,
    pub show_modules_output: String,
    pub verbose: bool,
    pub verbose_output: String,
}

impl Default for NuitkaReport {
    fn default() -> Self {
        Self {
            quiet: false,
            show_scons: false,
            no_progressbar: false,
            show_progress: false,
            show_memory: false,
            show_modules: false,
            show_modules_output: String::new(),
            verbose: true,
            verbose_output: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaPlatform {
    pub windows_console_mode: String,
    pub windows_icon_from_ico: String,
    pub linux_icon: String,
    pub macos_create_app_bundle: bool,
    pub macos_app_icon: String,
}

impl Default for NuitkaPlatform {
    fn default() -> Self {
        Self {
            windows_console_mode: "disable".to_string(),
            windows_icon_from_ico: String::new(),
            linux_icon: String::new(),
            macos_create_app_bundle: false,
            macos_app_icon: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaVersionInfo {
    pub company_name: String,
    pub product_name: String,
    pub file_version: String,
    pub product_version: String,
    pub file_description: String,
    pub copyright: String,
    pub trademarks: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NuitkaPlugins {
    #[serde(deserialize_with = "string_or_list")]
    pub enable_plugins: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub disable_plugins: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub user_plugin: Vec<String>,
    pub plugin_list: bool,
    pub plugin_no_detection: bool,
}

impl NuitkaParams {
    /// Output directory, `dist` when unset.
    pub fn dist_dir(&self) -> &str {
        if self.output.output_dir.is_empty() {
            DEFAULT_DIST_DIR
        } else {
            &self.output.output_dir
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mode = &self.mode;
        flag(&mut args, mode.module, "--module");
        flag(&mut args, mode.standalone, "--standalone");
        flag(&mut args, mode.onefile, "--onefile");
        joined(&mut args, "--python-flag", &mode.python_flag);
        flag(&mut args, mode.python_debug, "--python-debug");
        joined(&mut args, "--python-for-scons", &mode.python_for_scons);

        let include = &self.include;
        joined_each(&mut args, "--include-package", &include.include_package);
        joined_each(&mut args, "--include-module", &include.include_module);
        joined_each(&mut args, "--include-plugin-directory", &include.include_plugin_directory);
        joined_each(&mut args, "--include-plugin-files", &include.include_plugin_files);
        flag(&mut args, include.prefer_source_code, "--prefer-source-code");

        let follow = &self.follow;
        flag(&mut args, follow.follow_imports, "--follow-imports");
        joined(&mut args, "--follow-import-to", &follow.follow_import_to);
        joined(&mut args, "--nofollow-import-to", &follow.nofollow_import_to);
        flag(&mut args, follow.nofollow_imports, "--nofollow-imports");
        flag(&mut args, follow.follow_stdlib, "--follow-stdlib");
        joined(&mut args, "--onefile-tempdir-spec", &follow.onefile_tempdir_spec);
        flag(&mut args, follow.onefile_no_compression, "--onefile-no-compression");
        flag(&mut args, follow.onefile_as_archive, "--onefile-as-archive");

        let data = &self.data;
        joined_each(&mut args, "--include-package-data", &data.include_package_data);
        joined_each(&mut args, "--include-data-files", &data.include_data_files);
        joined_each(&mut args, "--include-data-dir", &data.include_data_dir);
        joined_each(&mut args, "--noinclude-data-files", &data.noinclude_data_files);
        joined_each(
            &mut args,
            "--include-onefile-external-data",
            &data.include_onefile_external_data,
        );
        joined_each(&mut args, "--include-raw-dir", &data.include_raw_dir);
        joined_each(&mut args, "--noinclude-dlls", &data.noinclude_dlls);
        flag(&mut args, data.warn_implicit_exceptions, "--warn-implicit-exceptions");
        flag(&mut args, data.warn_unusual_code, "--warn-unusual-code");
        flag(&mut args, data.assume_yes_for_downloads, "--assume-yes-for-downloads");

        let output = &self.output;
        flag(&mut args, output.run, "--run");
        joined(&mut args, "--debugger", &output.debugger);
        flag(&mut args, output.full_compat, "--full-compat");
        joined(&mut args, "--output-filename", &output.output_filename);
        joined(&mut args, "--output-dir", self.dist_dir());
        flag(&mut args, output.remove_output, "--remove-output");
        flag(&mut args, output.no_pyi_file, "--no-pyi-file");
        flag(&mut args, output.deployment, "--deployment");

        let debug = &self.debug;
        flag(&mut args, debug.debug, "--debug");
        flag(&mut args, debug.unstripped, "--unstripped");
        flag(&mut args, debug.profile, "--profile");
        flag(&mut args, debug.internal_graph, "--internal-graph");
        flag(&mut args, debug.trace_execution, "--trace-execution");
        flag(&mut args, debug.recompile_c_only, "--recompile-c-only");
        flag(&mut args, debug.low_memory, "--low-memory");
        flag(&mut args, debug.generate_c_only, "--generate-c-only");

        let compiler = &self.compiler;
        flag(&mut args, compiler.clang, "--clang");
        flag(&mut args, compiler.mingw64, "--mingw64");
        joined(&mut args, "--msvc", &compiler.msvc);
        if let Some(jobs) = compiler.jobs.filter(|jobs| *jobs > 0) {
            args.push(format!("--jobs={}", jobs));
        }
        joined(&mut args, "--lto", &compiler.lto);
        flag(&mut args, compiler.disable_bytecode_cache, "--disable-bytecode-cache");
        flag(&mut args, compiler.disable_ccache, "--disable-ccache");
        flag(
            &mut args,
            compiler.disable_dll_dependency_cache,
            "--disable-dll-dependency-cache",
        );
        flag(
            &mut args,
            compiler.force_dll_dependency_cache_update,
            "--force-dll-dependency-cache-update",
        );

        let report = &self.report;
        flag(&mut args, report.quiet, "--quiet");
        flag(&mut args, report.show_scons, "--show-scons");
        flag(&mut args, report.no_progressbar, "--no-progressbar");
        flag(&mut args, report.show_progress, "--show-progress");
        flag(&mut args, report.show_memory, "--show-memory");
        flag(&mut args, report.show_modules, "--show-modules");
        joined(&mut args, "--show-modules-output", &report.show_modules_output);
        flag(&mut args, report.verbose, "--verbose");
        joined(&mut args, "--verbose-output", &report.verbose_output);

        let platform = &self.platform;
        joined(&mut args, "--windows-console-mode", &platform.windows_console_mode);
        joined(&mut args, "--windows-icon-from-ico", &platform.windows_icon_from_ico);
        joined(&mut args, "--linux-icon", &platform.linux_icon);
        flag(&mut args, platform.macos_create_app_bundle, "--macos-create-app-bundle");
        joined(&mut args, "--macos-app-icon", &platform.macos_app_icon);

        let info = &self.version_info;
        joined(&mut args, "--company-name", &info.company_name);
        joined(&mut args, "--product-name", &info.product_name);
        joined(&mut args, "--file-version", &info.file_version);
        joined(&mut args, "--product-version", &info.product_version);
        joined(&mut args, "--file-description", &info.file_description);
        joined(&mut args, "--copyright", &info.copyright);
        joined(&mut args, "--trademarks", &info.trademarks);

        let plugins = &self.plugins;
        joined_each(&mut args, "--enable-plugin", &plugins.enable_plugins);
        joined_each(&mut args, "--disable-plugins", &plugins.disable_plugins);
        joined_each(&mut args, "--user-plugin", &plugins.user_plugin);
        flag(&mut args, plugins.plugin_list, "--plugin-list");
        flag(&mut args, plugins.plugin_no_detection, "--plugin-no-detection");
        args
    }
}

/// pipreqs options, keyed like `pipreqs.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipreqsParams {
    #[serde(deserialize_with = "string_or_list")]
    pub ignore: Vec<String>,
    pub encoding: String,
    pub force: bool,
    pub debug: bool,
    pub savepath: Option<String>,
}

impl Default for PipreqsParams {
    fn default() -> Self {
        Self {
            ignore: vec!["build".to_string(), "dist".to_string()],
            encoding: "utf-8".to_string(),
            force: true,
            debug: false,
            savepath: None,
        }
    }
}

impl PipreqsParams {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.ignore.is_empty() {
            separate(&mut args, "--ignore", &self.ignore.join(","));
        }
        separate(&mut args, "--encoding", &self.encoding);
        flag(&mut args, self.force, "--force");
        flag(&mut args, self.debug, "--debug");
        separate(&mut args, "--savepath", self.savepath.as_deref().unwrap_or(""));
        args
    }
}
