//! Builds a [`CommandLine`] out of the tokens of one input line.
//!
//! The first token names the command. The remaining tokens are arguments,
//! except for the redirection operators `>`, `1>`, `>>`, `1>>`, `2>` and `2>>`,
//! each of which takes the token right after it as its target path.

use log::debug;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Output stream of a command that can be redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// How a redirection target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Create the file, or empty it if it exists.
    Truncate,
    /// Create the file if missing and write at its end.
    Append,
}

impl RedirectMode {
    fn target(self, path: String) -> RedirectTarget {
        match self {
            RedirectMode::Truncate => RedirectTarget::Write(PathBuf::from(path)),
            RedirectMode::Append => RedirectTarget::Append(PathBuf::from(path)),
        }
    }
}

/// Destination of one of the command's output streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RedirectTarget {
    /// The shell's own stream.
    #[default]
    Inherit,
    /// `>`, `1>` or `2>`.
    Write(PathBuf),
    /// `>>`, `1>>` or `2>>`.
    Append(PathBuf),
}

impl RedirectTarget {
    /// Open the target file, resolving a relative path against `cwd`.
    ///
    /// Returns `Ok(None)` for [`RedirectTarget::Inherit`].
    pub fn open(&self, cwd: &Path) -> Result<Option<File>, RedirectionError> {
        let (path, mode) = match self {
            RedirectTarget::Inherit => return Ok(None),
            RedirectTarget::Write(path) => (path, RedirectMode::Truncate),
            RedirectTarget::Append(path) => (path, RedirectMode::Append),
        };

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            RedirectMode::Truncate => options.write(true).truncate(true),
            RedirectMode::Append => options.append(true),
        };

        options
            .open(cwd.join(path))
            .map(Some)
            .map_err(|source| RedirectionError::OpenFailed {
                path: path.clone(),
                source,
            })
    }
}

/// A parsed command: name, arguments and where its output goes.
///
/// Built fresh for each input line and consumed by a single execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub name: String,
    pub args: Vec<String>,
    pub stdout: RedirectTarget,
    pub stderr: RedirectTarget,
}

impl CommandLine {
    /// A command with no arguments and no redirections.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            stdout: RedirectTarget::Inherit,
            stderr: RedirectTarget::Inherit,
        }
    }
}

/// Errors found while building a [`CommandLine`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParsingError {
    /// A redirection operator ended the line.
    #[error("syntax error near unexpected token `newline'")]
    MissingRedirectTarget(String),
    /// A redirection operator was followed by another operator.
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),
}

/// Failure to open a redirection target.
#[derive(Debug, Error)]
pub enum RedirectionError {
    #[error("{}: {}", .path.display(), describe_io_error(.source))]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn describe_io_error(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "No such file or directory".to_string(),
        io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        io::ErrorKind::IsADirectory => "Is a directory".to_string(),
        _ => err.to_string(),
    }
}

/// Classify a token as a redirection operator.
pub fn redirect_operator(token: &str) -> Option<(Stream, RedirectMode)> {
    match token {
        ">" | "1>" => Some((Stream::Stdout, RedirectMode::Truncate)),
        ">>" | "1>>" => Some((Stream::Stdout, RedirectMode::Append)),
        "2>" => Some((Stream::Stderr, RedirectMode::Truncate)),
        "2>>" => Some((Stream::Stderr, RedirectMode::Append)),
        _ => None,
    }
}

struct CommandBuilder {
    tokens: Vec<String>,
    pos: usize,
}

impl CommandBuilder {
    fn from(tokens: Vec<String>) -> Self {
        CommandBuilder { tokens, pos: 0 }
    }

    fn consume(&mut self) -> Option<String> {
        let token = self.tokens.get_mut(self.pos).map(std::mem::take);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn build(mut self) -> Result<Option<CommandLine>, ParsingError> {
        let Some(name) = self.consume() else {
            return Ok(None);
        };
        let mut command = CommandLine::new(name);

        while let Some(token) = self.consume() {
            let Some((stream, mode)) = redirect_operator(&token) else {
                command.args.push(token);
                continue;
            };
            // A later redirection of the same stream replaces an earlier one.
            let target = mode.target(self.parse_redirect_target(token)?);
            debug!("redirecting {stream:?} to {target:?}");
            match stream {
                Stream::Stdout => command.stdout = target,
                Stream::Stderr => command.stderr = target,
            }
        }

        Ok(Some(command))
    }

    fn parse_redirect_target(&mut self, operator: String) -> Result<String, ParsingError> {
        match self.consume() {
            None => Err(ParsingError::MissingRedirectTarget(operator)),
            Some(token) if redirect_operator(&token).is_some() => {
                Err(ParsingError::UnexpectedToken(token))
            }
            Some(token) => Ok(token),
        }
    }
}

/// Build the command for one line from its tokens.
///
/// Returns `Ok(None)` when there are no tokens at all.
pub fn parse_command(tokens: Vec<String>) -> Result<Option<CommandLine>, ParsingError> {
    CommandBuilder::from(tokens).build()
}
