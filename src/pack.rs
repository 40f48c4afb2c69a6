//! Packaging command lines.
//!
//! A packaging run is two shell commands: the builder itself, then, if it succeeded, a
//! rename that stamps the produced artifact with the build time so the next build does
//! not overwrite it. Planning is pure: it takes freshly loaded parameter tables and
//! returns what to run.

use std::path::{Path, PathBuf};

use crate::interpreter::Interpreter;
use crate::params::{NuitkaParams, OutType, PyinstallerParams};
use crate::process::CommandRequest;

/// Timestamp suffix format for renamed artifacts.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Moves a build artifact aside. Paths are relative to the plan's `cwd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl Rename {
    pub fn command_line(&self) -> String {
        let from = self.from.display().to_string();
        let to = self.to.display().to_string();
        if cfg!(windows) {
            format!("move /Y {} {}", quote(&from), quote(&to))
        } else {
            format!("mv -f {} {}", quote(&from), quote(&to))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackPlan {
    pub command_line: String,
    pub rename: Option<Rename>,
    /// The entry file's directory; both commands run here.
    pub cwd: PathBuf,
}

impl PackPlan {
    pub fn follow_up(&self) -> Option<String> {
        self.rename.as_ref().map(Rename::command_line)
    }

    /// Request for the composite pack command: the build line, then the optional rename.
    pub fn into_request(self, name: &str) -> CommandRequest {
        let follow_up = self.follow_up();
        let mut request = CommandRequest::new(name)
            .arg(self.command_line)
            .cwd(self.cwd);
        if let Some(follow_up) = follow_up {
            request = request.arg(follow_up);
        }
        request
    }
}

pub fn plan_pyinstaller(
    interpreter: &Interpreter,
    params: &PyinstallerParams,
    entry: &Path,
    timestamp: &str,
) -> PackPlan {
    let mut argv = vec![interpreter.pyinstaller().display().to_string()];
    argv.extend(params.to_args());
    argv.push(entry.display().to_string());

    let name = if params.out_name.is_empty() {
        entry_stem(entry)
    } else {
        params.out_name.clone()
    };
    let extension = match params.out_type {
        OutType::File => executable_extension(),
        OutType::Folder => "",
    };
    let dist = Path::new(params.dist_dir());
    let rename = Rename {
        from: dist.join(format!("{}{}", name, extension)),
        to: dist.join(format!("{}_{}{}", name, timestamp, extension)),
    };

    PackPlan {
        command_line: join_command(&argv),
        rename: Some(rename),
        cwd: entry_dir(entry),
    }
}

pub fn plan_nuitka(
    interpreter: &Interpreter,
    params: &NuitkaParams,
    entry: &Path,
    timestamp: &str,
) -> PackPlan {
    let mut argv = interpreter.module_argv("nuitka", params.to_args());
    argv.push(entry.display().to_string());

    let dist = Path::new(params.dist_dir());
    let stem = entry_stem(entry);
    let rename = if params.mode.module {
        None
    } else if params.mode.standalone && !params.mode.onefile {
        Some(Rename {
            from: dist.join(format!("{}.dist", stem)),
            to: dist.join(format!("{}_{}.dist", stem, timestamp)),
        })
    } else {
        let file_name = if params.output.output_filename.is_empty() {
            format!("{}{}", stem, nuitka_binary_extension())
        } else {
            params.output.output_filename.clone()
        };
        let (base, extension) = split_extension(&file_name);
        Some(Rename {
            from: dist.join(&file_name),
            to: dist.join(format!("{}_{}{}", base, timestamp, extension)),
        })
    };

    PackPlan {
        command_line: join_command(&argv),
        rename,
        cwd: entry_dir(entry),
    }
}

/// Command line for `pipreqs <flags> <folder>`.
pub fn pipreqs_command(interpreter: &Interpreter, args: Vec<String>, folder: &Path) -> String {
    let mut argv = vec![interpreter.pipreqs().display().to_string()];
    argv.extend(args);
    argv.push(folder.display().to_string());
    join_command(&argv)
}

fn entry_stem(entry: &Path) -> String {
    entry
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string())
}

fn entry_dir(entry: &Path) -> PathBuf {
    match entry.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(index) if index > 0 => file_name.split_at(index),
        _ => (file_name, ""),
    }
}

fn executable_extension() -> &'static str {
    if cfg!(windows) {
        ".exe"
    } else {
        ""
    }
}

fn nuitka_binary_extension() -> &'static str {
    if cfg!(windows) {
        ".exe"
    } else {
        ".bin"
    }
}

/// Joins argv into one command line for the platform shell.
pub fn join_command(argv: &[String]) -> String {
    if cfg!(windows) {
        argv.iter().map(|arg| quote(arg)).collect::<Vec<_>>().join(" ")
    } else {
        shell_words::join(argv)
    }
}

fn quote(arg: &str) -> String {
    if cfg!(windows) {
        if arg.is_empty() || arg.contains([' ', '\t', '&', '(', ')']) {
            format!("\"{}\"", arg)
        } else {
            arg.to_string()
        }
    } else {
        shell_words::quote(arg).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::NuitkaMode;

    const TS: &str = "202401021530";

    fn interp() -> Interpreter {
        Interpreter::new("/opt/py/python")
    }

    #[test]
    fn timestamp_has_minute_precision() {
        let stamp = timestamp();
        assert_eq!(stamp.len(), 12);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn pyinstaller_plan_renames_onefile_artifact() {
        let plan = plan_pyinstaller(
            &interp(),
            &PyinstallerParams::default(),
            Path::new("/proj/app/main.py"),
            TS,
        );
        assert!(plan.command_line.contains("--distpath dist"));
        assert!(plan.command_line.ends_with("/proj/app/main.py"));
        assert_eq!(plan.cwd, PathBuf::from("/proj/app"));
        let rename = plan.rename.unwrap();
        let ext = executable_extension();
        assert_eq!(rename.from, Path::new("dist").join(format!("main{}", ext)));
        assert_eq!(rename.to, Path::new("dist").join(format!("main_{}{}", TS, ext)));
    }

    #[test]
    fn pyinstaller_folder_mode_uses_out_name() {
        let params = PyinstallerParams {
            out_type: OutType::Folder,
            out_name: "Viewer".to_string(),
            distpath: "out".to_string(),
            ..PyinstallerParams::default()
        };
        let plan = plan_pyinstaller(&interp(), &params, Path::new("main.py"), TS);
        assert!(!plan.command_line.contains(" -F "));
        assert_eq!(plan.cwd, PathBuf::from("."));
        let rename = plan.rename.unwrap();
        assert_eq!(rename.from, Path::new("out").join("Viewer"));
        assert_eq!(rename.to, Path::new("out").join(format!("Viewer_{}", TS)));
    }

    #[test]
    fn nuitka_onefile_plan() {
        let plan = plan_nuitka(&interp(), &NuitkaParams::default(), Path::new("/p/tool.py"), TS);
        assert!(plan.command_line.contains("-m nuitka"));
        assert!(plan.command_line.contains("--onefile"));
        let rename = plan.rename.unwrap();
        let ext = nuitka_binary_extension();
        assert_eq!(rename.from, Path::new("dist").join(format!("tool{}", ext)));
        assert_eq!(rename.to, Path::new("dist").join(format!("tool_{}{}", TS, ext)));
    }

    #[test]
    fn nuitka_standalone_renames_dist_folder() {
        let mut params = NuitkaParams::default();
        params.mode.onefile = false;
        let plan = plan_nuitka(&interp(), &params, Path::new("/p/tool.py"), TS);
        let rename = plan.rename.unwrap();
        assert_eq!(rename.from, Path::new("dist").join("tool.dist"));
        assert_eq!(rename.to, Path::new("dist").join(format!("tool_{}.dist", TS)));
    }

    #[test]
    fn nuitka_module_mode_has_no_follow_up() {
        let mut params = NuitkaParams::default();
        params.mode = NuitkaMode {
            module: true,
            standalone: false,
            onefile: false,
            ..NuitkaMode::default()
        };
        let plan = plan_nuitka(&interp(), &params, Path::new("/p/lib.py"), TS);
        assert!(plan.follow_up().is_none());
        let request = plan.into_request("pack_nuitka");
        assert_eq!(request.args.len(), 1);
    }

    #[test]
    fn nuitka_output_filename_keeps_its_extension() {
        let mut params = NuitkaParams::default();
        params.output.output_filename = "Viewer.exe".to_string();
        let plan = plan_nuitka(&interp(), &params, Path::new("/p/tool.py"), TS);
        let rename = plan.rename.unwrap();
        assert_eq!(rename.to, Path::new("dist").join(format!("Viewer_{}.exe", TS)));
    }

    #[cfg(unix)]
    #[test]
    fn follow_up_quotes_paths() {
        let rename = Rename {
            from: PathBuf::from("dist/my app"),
            to: PathBuf::from("dist/my app_1"),
        };
        assert_eq!(rename.command_line(), "mv -f 'dist/my app' 'dist/my app_1'");
    }

    #[test]
    fn request_carries_command_and_follow_up() {
        let plan = plan_pyinstaller(
            &interp(),
            &PyinstallerParams::default(),
            Path::new("/proj/main.py"),
            TS,
        );
        let follow_up = plan.follow_up().unwrap();
        let request = plan.clone().into_request("pack_pyinstaller");
        assert_eq!(request.name, "pack_pyinstaller");
        assert_eq!(request.arg_at(0), plan.command_line);
        assert_eq!(request.arg_at(1), follow_up);
        assert_eq!(request.cwd, Some(PathBuf::from("/proj")));
    }
}
