use crate::command::{CommandFactory, CommandIo, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::external::find_command_path;
use crate::interpreter::Factory;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use log::debug;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the provided output streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is printed to `stderr` and turned into status 1.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;

    /// Parse the words that follow the command name.
    ///
    /// Every word is a positional argument, even one that starts with `-` or
    /// reads `help`. Only a lone `--help` asks for the usage text.
    fn from_words(name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        if matches!(args, ["--help"]) {
            return Self::from_args(&[name], args);
        }
        let words: Vec<&str> = std::iter::once("--").chain(args.iter().copied()).collect();
        Self::from_args(&[name], &words)
    }
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, io: &mut CommandIo, env: &mut Environment) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, &mut io.stdout, &mut io.stderr, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(io.stderr, "{e}")?;
                Ok(1)
            }
        }
    }
}

/// Names of all builtins, as `type` reports them.
pub(crate) fn is_builtin(name: &str) -> bool {
    [Echo::name(), Exit::name(), Type::name(), Pwd::name(), Cd::name()].contains(&name)
}

/// Output of argh for `--help` or for arguments it could not parse.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, io: &mut CommandIo, _env: &mut Environment) -> Result<ExitCode> {
        let text = self.output.trim_end();
        if self.is_error {
            writeln!(io.stderr, "{text}")?;
            Ok(1)
        } else {
            writeln!(io.stdout, "{text}")?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_words(name, args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// `~` stands for the directory named by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub targets: Vec<String>,
}

impl Cd {
    fn expand_home(target: &str, env: &Environment) -> Result<PathBuf> {
        let rest = match target {
            "~" => "",
            _ => match target.strip_prefix("~/") {
                Some(rest) => rest,
                None => return Ok(PathBuf::from(target)),
            },
        };
        match env.home_dir() {
            Some(home) => Ok(home.join(rest)),
            None => bail!("cd: HOME not set"),
        }
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match self.targets.as_slice() {
            [target] => target,
            [] => bail!("cd: too few arguments"),
            _ => bail!("cd: too many arguments"),
        };

        let new_dir = env.resolve_path(Self::expand_home(target, env)?);
        match fs::metadata(&new_dir) {
            Err(_) => bail!("cd: {target}: No such file or directory"),
            Ok(metadata) if !metadata.is_dir() => bail!("cd: {target}: Not a directory"),
            Ok(_) => {}
        }

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: {target}: can't resolve {}", new_dir.display()))?;
        debug!("cd {} -> {}", target, canonical.display());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given status, 0 by default.
pub struct Exit {
    #[argh(positional, greedy)]
    /// exit status; taken modulo 256.
    pub args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let code = match self.args.as_slice() {
            [] => 0,
            [code] => match code.parse::<i64>() {
                Ok(code) => code.rem_euclid(256) as ExitCode,
                Err(_) => {
                    writeln!(stderr, "exit: {code}: numeric argument required")?;
                    2
                }
            },
            _ => bail!("exit: too many arguments"),
        };
        env.request_exit(code);
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Write the arguments to standard output, separated by spaces.
/// A trailing newline is printed unless the first argument is `-n`.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    /// Arguments are printed as written; only a leading `-n` is an option.
    fn from_words(_name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        let (no_newline, rest) = match args {
            ["-n", rest @ ..] => (true, rest),
            _ => (false, args),
        };
        Ok(Echo {
            no_newline,
            args: rest.iter().map(|x| x.to_string()).collect(),
        })
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Tell how each name would be run: as a builtin or as a program found in PATH.
pub struct Type {
    #[argh(positional)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut status = 0;
        for name in &self.names {
            if is_builtin(name) {
                writeln!(stdout, "{name} is a shell builtin")?;
                continue;
            }
            let search_paths = OsStr::new(env.search_paths());
            match find_command_path(search_paths, Path::new(name), &env.current_dir) {
                Some(path) => writeln!(stdout, "{name} is {}", path.display())?,
                None => {
                    writeln!(stderr, "{name}: not found")?;
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}
