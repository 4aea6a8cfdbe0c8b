//! Command-line parsing

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("missing command, try `cyberfarm --help`")]
    MissingCommand,

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("`run` needs a script path")]
    MissingScript,

    #[error("{0} needs a value")]
    MissingValue(&'static str),

    #[error("invalid interval `{0}`, expected milliseconds")]
    InvalidInterval(String),

    #[error("unknown option `{0}`")]
    UnknownOption(String),
}

/// Options for `cyberfarm run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub script: PathBuf,
    /// Force manual-step mode
    pub manual: bool,
    pub server: Option<String>,
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    Help,
    Version,
}

/// Parse `std::env::args()` (program name included)
pub fn parse(args: &[String]) -> Result<Command, ArgsError> {
    let Some(command) = args.get(1) else {
        return Err(ArgsError::MissingCommand);
    };
    match command.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "--version" | "-v" => Ok(Command::Version),
        "run" => parse_run(&args[2..]).map(Command::Run),
        other => Err(ArgsError::UnknownCommand(other.to_string())),
    }
}

fn parse_run(args: &[String]) -> Result<RunArgs, ArgsError> {
    let mut script: Option<PathBuf> = None;
    let mut manual = false;
    let mut server: Option<String> = None;
    let mut interval_ms: Option<u64> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--manual" | "-m" => {
                manual = true;
                i += 1;
            }
            "--server" | "-s" => {
                let value = args.get(i + 1).ok_or(ArgsError::MissingValue("--server"))?;
                server = Some(value.clone());
                i += 2;
            }
            "--interval" | "-i" => {
                let value = args
                    .get(i + 1)
                    .ok_or(ArgsError::MissingValue("--interval"))?;
                interval_ms = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidInterval(value.clone()))?,
                );
                i += 2;
            }
            arg if arg.starts_with('-') => return Err(ArgsError::UnknownOption(arg.to_string())),
            arg => {
                script = Some(PathBuf::from(arg));
                i += 1;
            }
        }
    }

    Ok(RunArgs {
        script: script.ok_or(ArgsError::MissingScript)?,
        manual,
        server,
        interval_ms,
    })
}

pub fn print_help() {
    println!("cyberfarm - run farm scripts against a cyberfarm server");
    println!();
    println!("USAGE:");
    println!("    cyberfarm run <SCRIPT> [OPTIONS]");
    println!();
    println!("RUN OPTIONS:");
    println!("    -m, --manual          Step through the script one instruction at a time");
    println!("    -s, --server URL      Server base URL (default http://127.0.0.1:8000)");
    println!("    -i, --interval MS     Override the auto-step pacing interval");
    println!();
    println!("CONTROLS (while running):");
    println!("    p        pause / resume (auto mode)");
    println!("    s, ⏎     execute one step (manual mode)");
    println!("    q        abort");
    println!();
    println!("GLOBAL OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version");
    println!();
    println!("CONFIG:");
    println!("    ~/.config/cyberfarm/config.toml");
}
