use argh::FromArgs;
use log::LevelFilter;
use myshell::{Interpreter, logging};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(FromArgs)]
/// A small interactive shell with builtins, quoting and output redirection.
struct Options {
    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status.
    command: Option<String>,

    #[argh(option, default = "LevelFilter::Off")]
    /// diagnostic log level: off, error, warn, info, debug or trace.
    log_level: LevelFilter,

    #[argh(option)]
    /// append diagnostic logs to this file instead of stderr.
    log_file: Option<PathBuf>,

    #[argh(switch)]
    /// read plain lines from stdin even when it is a terminal.
    no_editor: bool,
}

fn main() -> anyhow::Result<()> {
    let options: Options = argh::from_env();
    logging::init(options.log_level, options.log_file.as_deref())?;

    let mut shell = Interpreter::default();
    let code = match options.command {
        Some(line) => {
            let status = shell.eval_line(&line);
            shell.env().exit_requested.unwrap_or(status)
        }
        None if !options.no_editor && std::io::stdin().is_terminal() => shell.repl()?,
        None => shell.run_script(std::io::stdin().lock())?,
    };
    log::debug!("exiting with {code}");
    std::process::exit(code)
}
