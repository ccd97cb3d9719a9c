use crate::command::ExitCode;
use log::debug;
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Process context the shell runs commands in.
///
/// The shell never changes its own working directory: `cd` updates
/// `current_dir`, relative paths are resolved against it and external
/// commands are started inside it.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Variables passed to external commands; `PATH` and `HOME` are read from here.
    pub vars: HashMap<String, String>,
    /// The working directory for command execution.
    pub current_dir: PathBuf,
    /// Set by `exit`; the loop stops and the process exits with this status.
    pub exit_requested: Option<ExitCode>,
}

impl Environment {
    /// Capture the current process state into a new `Environment`.
    pub fn new() -> Self {
        let vars = utf8_vars(stdenv::vars_os());
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::with_vars(vars, current_dir)
    }

    /// An environment that shares nothing with the running process.
    pub fn with_vars(vars: HashMap<String, String>, current_dir: PathBuf) -> Self {
        Self {
            vars,
            current_dir,
            exit_requested: None,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Colon separated directories searched for external commands.
    pub fn search_paths(&self) -> &str {
        self.get_var("PATH").unwrap_or_default()
    }

    /// `HOME`, or the platform's idea of the user's home when it is unset.
    pub fn home_dir(&self) -> Option<PathBuf> {
        match self.get_var("HOME") {
            Some(home) if !home.is_empty() => Some(PathBuf::from(home)),
            _ => dirs::home_dir(),
        }
    }

    /// Resolve `path` against the working directory. Absolute paths are kept as is.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.current_dir.join(path)
    }

    pub fn request_exit(&mut self, code: ExitCode) {
        self.exit_requested = Some(code);
    }
}

/// Keep the variables whose name and value are both valid UTF-8.
///
/// Children still inherit the others from the process itself.
fn utf8_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> HashMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!("skipping non UTF-8 variable {key:?}");
                None
            }
        })
        .collect()
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_env() -> Environment {
        Environment::with_vars(HashMap::new(), PathBuf::from("/work"))
    }

    #[test]
    fn get_var() {
        let mut env = empty_env();
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.vars.insert("KEY".into(), "VALUE".into());
        assert_eq!(env.get_var("KEY"), Some("VALUE"));
    }

    #[test]
    #[cfg(unix)]
    fn non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = utf8_vars([
            (OsString::from("GOOD"), OsString::from("yes")),
            (OsString::from("BAD_VALUE"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![b'K', 0xff]), OsString::from("v")),
        ]);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("GOOD").map(String::as_str), Some("yes"));
    }

    #[test]
    fn reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
        assert!(env.current_dir.is_absolute());
    }

    #[test]
    fn missing_path_searches_nothing() {
        assert_eq!(empty_env().search_paths(), "");
    }

    #[test]
    fn home_comes_from_vars() {
        let mut env = empty_env();
        env.vars.insert("HOME".into(), "/home/someone".into());
        assert_eq!(env.home_dir(), Some(PathBuf::from("/home/someone")));
    }

    #[test]
    fn relative_paths_resolve_against_current_dir() {
        let env = empty_env();
        assert_eq!(env.resolve_path("a/b"), PathBuf::from("/work/a/b"));
        assert_eq!(env.resolve_path("/etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn exit_request_is_recorded() {
        let mut env = empty_env();
        assert_eq!(env.exit_requested, None);
        env.request_exit(4);
        assert_eq!(env.exit_requested, Some(4));
    }
}
