use crate::command::{
    COMMAND_NOT_FOUND, CommandFactory, CommandIo, ExitCode, InheritedStreams, OutStream, Streams,
};
use crate::env::Environment;
use crate::lexer;
use crate::parser::{self, CommandLine, RedirectTarget, RedirectionError};
use log::{debug, warn};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fmt::Display;
use std::io::{self, BufRead, Write};

/// Printed before reading each line.
pub const PROMPT: &str = "$ ";

/// Status of a line that could not be parsed.
const SYNTAX_ERROR: ExitCode = 2;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only commands defined in this crate are supported: builtins and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal shell that reads command lines and runs builtin and external commands.
///
/// The interpreter owns the [`Environment`] commands run in, a list of
/// [`CommandFactory`] objects that are queried in order to create a command by
/// name, and the default [`Streams`] used when a command is not redirected.
/// See [`Default`] for the factories included out of the box.
///
/// Example
/// ```
/// use myshell::Interpreter;
/// use myshell::io_adapters::CapturedStreams;
///
/// let streams = CapturedStreams::new();
/// let mut sh = Interpreter::with_streams(streams.clone());
/// let code = sh.eval_line("echo 'hello   world'");
/// assert_eq!(code, 0);
/// assert_eq!(streams.stdout_text(), "hello   world\n");
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    streams: Box<dyn Streams>,
    last_status: ExitCode,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(
        env: Environment,
        commands: Vec<Box<dyn CommandFactory>>,
        streams: Box<dyn Streams>,
    ) -> Self {
        Self {
            env,
            commands,
            streams,
            last_status: 0,
        }
    }

    /// The default commands in the given environment.
    pub fn with_environment(env: Environment, streams: impl Streams + 'static) -> Self {
        Self::new(env, default_commands(), Box::new(streams))
    }

    /// The default commands in the current process environment.
    pub fn with_streams(streams: impl Streams + 'static) -> Self {
        Self::with_environment(Environment::new(), streams)
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Status of the last command that ran.
    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Tokenize, parse and execute one line.
    ///
    /// Every failure is reported on a stream and turned into a status; nothing
    /// here stops the shell except `exit`, which shows up in
    /// [`Environment::exit_requested`].
    pub fn eval_line(&mut self, line: &str) -> ExitCode {
        let tokens = lexer::split_into_tokens(line);
        debug!("tokens = {tokens:?}");

        let status = match parser::parse_command(tokens) {
            Ok(Some(command)) => self.execute_command(command),
            Ok(None) => return self.last_status,
            Err(err) => {
                self.report(err);
                SYNTAX_ERROR
            }
        };
        self.last_status = status;
        status
    }

    fn execute_command(&mut self, command: CommandLine) -> ExitCode {
        let mut io = match self.open_io(&command) {
            Ok(io) => io,
            Err(err) => {
                warn!("skipping {}: {err}", command.name);
                self.report(err);
                return 1;
            }
        };

        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        let created = self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(&self.env, &command.name, &args));

        let status = match created {
            Some(cmd) => match cmd.execute(&mut io, &mut self.env) {
                Ok(code) => code,
                Err(err) => {
                    write_diagnostic(&mut io.stderr, format_args!("{}: {err:#}", command.name));
                    1
                }
            },
            None => {
                write_diagnostic(
                    &mut io.stderr,
                    format_args!("{}: command not found", command.name),
                );
                COMMAND_NOT_FOUND
            }
        };
        debug!("{} exited with {status}", command.name);

        if let Err(err) = io.flush() {
            warn!("failed to flush output of {}: {err}", command.name);
        }
        status
    }

    /// Open redirection targets; both files exist before the command starts.
    fn open_io(&self, command: &CommandLine) -> Result<CommandIo, RedirectionError> {
        Ok(CommandIo {
            stdout: self.open_target(&command.stdout, || self.streams.stdout())?,
            stderr: self.open_target(&command.stderr, || self.streams.stderr())?,
        })
    }

    fn open_target(
        &self,
        target: &RedirectTarget,
        default: impl FnOnce() -> Box<dyn OutStream>,
    ) -> Result<Box<dyn OutStream>, RedirectionError> {
        Ok(match target.open(&self.env.current_dir)? {
            Some(file) => Box::new(file),
            None => default(),
        })
    }

    fn report(&self, message: impl Display) {
        write_diagnostic(&mut self.streams.stderr(), message);
    }

    fn prompt(&self) -> io::Result<()> {
        let mut out = self.streams.stdout();
        out.write_all(PROMPT.as_bytes())?;
        out.flush()
    }

    /// Prompt, read and evaluate lines from `input` until it ends or `exit` runs.
    ///
    /// Returns 0 at end of input, otherwise the status given to `exit`.
    pub fn run_script<R: BufRead>(&mut self, mut input: R) -> anyhow::Result<ExitCode> {
        let mut line = String::new();
        loop {
            self.prompt()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                debug!("end of input");
                return Ok(0);
            }
            self.eval_line(line.trim_end_matches(['\n', '\r']));
            if let Some(code) = self.env.exit_requested {
                return Ok(code);
            }
        }
    }

    /// Interactive loop on a line editor with history.
    ///
    /// Ctrl-C drops the line being edited, Ctrl-D ends the session with status 0.
    pub fn repl(&mut self) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.eval_line(&line);
                    if let Some(code) = self.env.exit_requested {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(0),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn write_diagnostic(out: &mut dyn Write, message: impl Display) {
    if let Err(err) = writeln!(out, "{message}") {
        warn!("failed to report \"{message}\": {err}");
    }
}

fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::external::ExternalCommand;
    vec![
        Box::new(Factory::<Echo>::default()),
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Type>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

impl Default for Interpreter {
    /// Create an interpreter on the process environment and standard streams with:
    /// - built-ins: `echo`, `exit`, `type`, `pwd`, `cd`
    /// - external command launcher
    fn default() -> Self {
        Self::with_streams(InheritedStreams)
    }
}
