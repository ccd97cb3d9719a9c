use crate::command::{COMMAND_NOT_FOUND, CommandFactory, CommandIo, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::Result;
use log::{debug, warn};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Command that is not a builtin.
pub struct ExternalCommand {
    name: String,
    path: PathBuf,
    args: Vec<String>,
}

impl ExternalCommand {
    /// `name` is what the user typed and becomes `argv[0]`; `path` is the resolved executable.
    pub fn new(name: impl Into<String>, path: PathBuf, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path,
            args,
        }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let search_paths = OsStr::new(env.search_paths());
        let executable = find_command_path(search_paths, Path::new(name), &env.current_dir)?;
        debug!("resolved {name} to {}", executable.display());
        Some(Box::new(ExternalCommand::new(
            name,
            executable,
            args.iter().map(|x| x.to_string()).collect(),
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, io: &mut CommandIo, env: &mut Environment) -> Result<ExitCode> {
        let mut cmd = Command::new(&self.path);
        set_arg0(&mut cmd, &self.name);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(io.stdout.stdio()?)
            .stderr(io.stderr.stdio()?)
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!("failed to launch {}: {err}", self.path.display());
                writeln!(io.stderr, "{}: command not found", self.name)?;
                return Ok(COMMAND_NOT_FOUND);
            }
        };
        let exit_status = child.wait()?;
        debug!("{} finished with {exit_status}", self.name);
        match exit_status.code() {
            Some(x) => Ok(x),
            None => Ok(terminated_by_signal(exit_status)),
        }
    }
}

#[cfg(unix)]
fn set_arg0(cmd: &mut Command, name: &str) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(name);
}

#[cfg(not(unix))]
fn set_arg0(_cmd: &mut Command, _name: &str) {}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command name to an executable file the way a typical shell would.
///
/// Behavior:
/// - A bare name (one path component, e.g. `ls`): search each directory of
///   `search_paths` (the `PATH` value) in order and return the first match.
/// - Anything with a separator (`/bin/sh`, `./foo`, `bin/tool`): resolve it
///   against `cwd` and return it if it matches.
/// - Empty name: `None`.
///
/// A match is an existing regular file with an executable permission bit.
pub fn find_command_path(search_paths: &OsStr, name: &Path, cwd: &Path) -> Option<PathBuf> {
    let mut components = name.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(Component::Normal(file)), None) => find_in_path(search_paths, file),
        _ => find_by_path(&cwd.join(name)),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| find_by_path(&dir.join(cmd)))
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    if path.is_file() && is_executable::is_executable(path) {
        Some(path.to_path_buf())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::MemWriter;
    use std::collections::HashMap;
    use std::fs;

    fn osstr(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, "#!/bin/sh\n").expect("write script");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    fn test_env(dir: &Path) -> Environment {
        let mut vars = HashMap::new();
        vars.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        Environment::with_vars(vars, dir.to_path_buf())
    }

    fn io_to(stdout: fs::File, stderr: fs::File) -> CommandIo {
        CommandIo {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_true() {
        let path = Path::new("/bin/sh");
        let res = find_command_path(osstr("/bin"), path, Path::new("/"));
        assert_eq!(res.as_deref(), Some(path), "Expected to find /bin/sh via absolute path");
    }

    #[test]
    #[cfg(unix)]
    fn absolute_nonexisting() {
        let res = find_command_path(osstr("/bin"), Path::new("/bin/nonexisting"), Path::new("/"));
        assert!(res.is_none(), "Expected not to find /bin/nonexisting via absolute path");
    }

    #[test]
    #[cfg(unix)]
    fn single_component_found_in_path() {
        let found = find_command_path(osstr("/bin"), Path::new("sh"), Path::new("/"))
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found, Path::new("/bin/sh"));
    }

    #[test]
    #[cfg(unix)]
    fn single_component_not_found_in_path() {
        let res = find_command_path(osstr("/bin"), Path::new("nonexisting"), Path::new("/"));
        assert!(res.is_none(), "Expected not to find 'nonexisting' in PATH");
    }

    #[test]
    #[cfg(unix)]
    fn first_directory_in_path_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        make_executable(&first.path().join("tool"));
        make_executable(&second.path().join("tool"));

        let search = std::env::join_paths([second.path(), first.path()]).unwrap();
        let found = find_command_path(&search, Path::new("tool"), Path::new("/"));
        assert_eq!(found, Some(second.path().join("tool")));
    }

    #[test]
    #[cfg(unix)]
    fn non_executable_files_are_skipped() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("tool"), "data").unwrap();
        make_executable(&second.path().join("tool"));

        let search = std::env::join_paths([first.path(), second.path()]).unwrap();
        let found = find_command_path(&search, Path::new("tool"), Path::new("/"));
        assert_eq!(found, Some(second.path().join("tool")));
    }

    #[test]
    #[cfg(unix)]
    fn directories_are_not_commands() {
        let base = tempfile::tempdir().unwrap();
        fs::create_dir(base.path().join("tool")).unwrap();
        let res = find_command_path(base.path().as_os_str(), Path::new("tool"), Path::new("/"));
        assert!(res.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn multiple_components_relative_to_cwd() {
        let base = tempfile::tempdir().unwrap();
        fs::create_dir_all(base.path().join("bin")).unwrap();
        make_executable(&base.path().join("bin").join("tool"));

        let found = find_command_path(osstr("/does/not/matter"), Path::new("bin/tool"), base.path())
            .expect("Expected to find relative 'bin/tool' in current dir");
        assert!(found.ends_with("bin/tool"));
        assert!(found.starts_with(base.path()));
    }

    #[test]
    #[cfg(unix)]
    fn current_dir_with_dot_prefix() {
        let base = tempfile::tempdir().unwrap();
        make_executable(&base.path().join("foo"));

        let found = find_command_path(osstr("/bin"), Path::new("./foo"), base.path())
            .expect("Expected to find './foo' in current dir");
        assert!(found.starts_with(base.path()));
        assert!(found.ends_with("foo"));
    }

    #[test]
    fn empty_path_is_none() {
        let res = find_command_path(osstr("/bin"), Path::new(""), Path::new("/"));
        assert!(res.is_none(), "Empty path should not resolve to anything");
    }

    #[test]
    #[cfg(unix)]
    fn factory_needs_a_match() {
        let base = tempfile::tempdir().unwrap();
        let env = test_env(base.path());
        let factory = Factory::<ExternalCommand>::default();
        assert!(factory.try_create(&env, "sh", &["-c", "true"]).is_some());
        assert!(factory.try_create(&env, "nonexistent_xyz", &[]).is_none());
    }

    #[test]
    #[cfg(unix)]
    fn output_goes_to_redirected_files() {
        let base = tempfile::tempdir().unwrap();
        let mut env = test_env(base.path());
        let out_path = base.path().join("out.txt");
        let err_path = base.path().join("err.txt");
        let mut io = io_to(
            fs::File::create(&out_path).unwrap(),
            fs::File::create(&err_path).unwrap(),
        );

        let cmd = Box::new(ExternalCommand::new(
            "sh",
            PathBuf::from("/bin/sh"),
            vec!["-c".into(), "echo out; echo err >&2; pwd".into()],
        ));
        let code = cmd.execute(&mut io, &mut env).unwrap();
        drop(io);

        assert_eq!(code, 0);
        let out = fs::read_to_string(&out_path).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("out"));
        let cwd = lines.next().expect("pwd output");
        assert_eq!(
            fs::canonicalize(cwd).unwrap(),
            fs::canonicalize(base.path()).unwrap()
        );
        assert_eq!(fs::read_to_string(&err_path).unwrap(), "err\n");
    }

    #[test]
    #[cfg(unix)]
    fn exit_status_is_passed_through() {
        let base = tempfile::tempdir().unwrap();
        let mut env = test_env(base.path());
        let mut io = CommandIo {
            stdout: Box::new(MemWriter::new()),
            stderr: Box::new(MemWriter::new()),
        };

        let cmd = Box::new(ExternalCommand::new(
            "sh",
            PathBuf::from("/bin/sh"),
            vec!["-c".into(), "exit 3".into()],
        ));
        assert_eq!(cmd.execute(&mut io, &mut env).unwrap(), 3);

        let killed = Box::new(ExternalCommand::new(
            "sh",
            PathBuf::from("/bin/sh"),
            vec!["-c".into(), "kill -9 $$".into()],
        ));
        assert_eq!(killed.execute(&mut io, &mut env).unwrap(), 128 + 9);
    }

    #[test]
    #[cfg(unix)]
    fn launch_failure_reports_command_not_found() {
        let base = tempfile::tempdir().unwrap();
        let mut env = test_env(base.path());
        let err_path = base.path().join("err.txt");
        let mut io = CommandIo {
            stdout: Box::new(MemWriter::new()),
            stderr: Box::new(fs::File::create(&err_path).unwrap()),
        };

        let cmd = Box::new(ExternalCommand::new(
            "ghost",
            base.path().join("missing-binary"),
            Vec::new(),
        ));
        assert_eq!(cmd.execute(&mut io, &mut env).unwrap(), COMMAND_NOT_FOUND);
        io.stderr.flush().unwrap();
        assert_eq!(fs::read_to_string(&err_path).unwrap(), "ghost: command not found\n");
    }
}
