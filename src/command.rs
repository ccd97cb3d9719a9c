use crate::env::Environment;
use anyhow::Result;
use std::fs::File;
use std::io::{self, Write};
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Status reported when a command cannot be found or launched.
pub const COMMAND_NOT_FOUND: ExitCode = 127;

/// A writable output destination that can also be handed to a child process.
///
/// Implemented for redirection target files and for the shell's own standard
/// streams. Builtins write through [`Write`]; external commands receive the
/// [`Stdio`] produced by [`OutStream::stdio`].
pub trait OutStream: Write {
    /// Produce a [`Stdio`] for `std::process::Command` that writes to the same place.
    fn stdio(&mut self) -> io::Result<Stdio>;
}

impl OutStream for File {
    fn stdio(&mut self) -> io::Result<Stdio> {
        Ok(self.try_clone()?.into())
    }
}

impl OutStream for io::Stdout {
    fn stdio(&mut self) -> io::Result<Stdio> {
        // Anything a builtin left in the buffer must come out before the child's output.
        self.flush()?;
        Ok(Stdio::inherit())
    }
}

impl OutStream for io::Stderr {
    fn stdio(&mut self) -> io::Result<Stdio> {
        self.flush()?;
        Ok(Stdio::inherit())
    }
}

/// Resolved output destinations of one command invocation.
pub struct CommandIo {
    pub stdout: Box<dyn OutStream>,
    pub stderr: Box<dyn OutStream>,
}

impl CommandIo {
    pub fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()?;
        self.stderr.flush()
    }
}

/// Where output goes when a command is not redirected.
pub trait Streams {
    fn stdout(&self) -> Box<dyn OutStream>;
    fn stderr(&self) -> Box<dyn OutStream>;
}

/// The standard output and error of the shell process itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct InheritedStreams;

impl Streams for InheritedStreams {
    fn stdout(&self) -> Box<dyn OutStream> {
        Box::new(io::stdout())
    }

    fn stderr(&self) -> Box<dyn OutStream> {
        Box::new(io::stderr())
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command, writing to the destinations in `io`.
    fn execute(self: Box<Self>, io: &mut CommandIo, env: &mut Environment) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
/// Implementations can use the environment to resolve executables (e.g., using PATH).
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
