//! Headless session runner
//!
//! Drives the same `FarmApp` as the browser: server frames, pacing timers
//! and terminal commands go in, actions come out and are carried out here
//! with tokio.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use cyberfarm_client::{AckTicket, Action, ClientSettings, ExecState, FarmApp};
use cyberfarm_protocol::Bootstrap;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::args::RunArgs;
use crate::config::{Config, ConfigError, Endpoints, RunMode};

/// Fully resolved options for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub script: PathBuf,
    pub mode: RunMode,
    pub endpoints: Endpoints,
    pub interval_override: Option<Duration>,
}

impl RunOptions {
    /// Merge command-line flags over the config file
    pub fn resolve(args: RunArgs, config: &Config) -> Result<Self, ConfigError> {
        let base = args.server.as_deref().unwrap_or(&config.server.url);
        let mode = if args.manual {
            RunMode::Manual
        } else {
            config.run.mode
        };
        Ok(Self {
            script: args.script,
            mode,
            endpoints: Endpoints::from_base(base)?,
            interval_override: args
                .interval_ms
                .or(config.run.exec_interval_ms)
                .map(Duration::from_millis),
        })
    }
}

/// Line typed while a script runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCommand {
    PauseResume,
    Step,
    Abort,
}

pub fn parse_command(line: &str) -> Option<TerminalCommand> {
    match line.trim() {
        "p" | "pause" | "resume" => Some(TerminalCommand::PauseResume),
        "" | "s" | "step" => Some(TerminalCommand::Step),
        "q" | "quit" | "abort" => Some(TerminalCommand::Abort),
        _ => None,
    }
}

/// Text printed to stdout for an action, if any
///
/// Highlights echo the program line being executed.
pub fn console_line(action: &Action, script: &[String]) -> Option<String> {
    match action {
        Action::Log(text) => Some(text.clone()),
        Action::HighlightLine(line) => {
            let source = (*line as usize)
                .checked_sub(1)
                .and_then(|i| script.get(i))
                .map_or("", |s| s.trim_end());
            Some(format!("→ {line:>3} | {source}"))
        }
        _ => None,
    }
}

/// Executes actions against a message sink
pub struct Host<S> {
    sink: S,
    ack_tx: mpsc::UnboundedSender<AckTicket>,
    script: Vec<String>,
}

impl<S> Host<S>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    pub fn new(sink: S, ack_tx: mpsc::UnboundedSender<AckTicket>, code: &str) -> Self {
        Self {
            sink,
            ack_tx,
            script: code.lines().map(String::from).collect(),
        }
    }

    pub async fn apply(&mut self, actions: Vec<Action>) -> anyhow::Result<()> {
        for action in actions {
            match action {
                Action::Send(msg) => {
                    let json = msg.to_json()?;
                    debug!(%json, "send");
                    self.sink
                        .send(Message::Text(json))
                        .await
                        .context("failed to send to server")?;
                }
                Action::ScheduleAck { ticket, after } => {
                    let tx = self.ack_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = tx.send(ticket);
                    });
                }
                Action::Controls(controls) => {
                    debug!(run = controls.run.text(), stop = controls.stop_enabled, "controls");
                }
                Action::Resync => debug!("resync skipped, the cli never reconnects"),
                other => {
                    if let Some(line) = console_line(&other, &self.script) {
                        println!("{line}");
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

/// Blocking stdin reader on its own thread
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    break;
                }
            }
        }
    });
    rx
}

async fn fetch_bootstrap(endpoints: &Endpoints) -> anyhow::Result<Bootstrap> {
    let url = endpoints.bootstrap.clone();
    let bootstrap = reqwest::get(url.clone())
        .await
        .with_context(|| format!("bootstrap request to {url} failed"))?
        .error_for_status()?
        .json::<Bootstrap>()
        .await
        .context("invalid bootstrap payload")?;
    Ok(bootstrap)
}

/// Run one script session to completion
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let code = tokio::fs::read_to_string(&opts.script)
        .await
        .with_context(|| format!("failed to read {}", opts.script.display()))?;

    let bootstrap = fetch_bootstrap(&opts.endpoints).await?;
    let mut settings =
        ClientSettings::from_bootstrap(&bootstrap.config).context("invalid session config")?;
    if let Some(interval) = opts.interval_override {
        settings = settings.with_exec_interval(interval);
    }
    info!(
        grid = settings.grid(),
        interval = ?settings.exec_interval,
        mode = ?opts.mode,
        "session configured"
    );

    let mut app = FarmApp::new(settings);
    if let Err(e) = app.resync(bootstrap.farm) {
        warn!(error = %e, "initial snapshot rejected");
    }

    let (ws, _) = connect_async(opts.endpoints.run.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", opts.endpoints.run))?;
    let (sink, mut stream) = ws.split();
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    let mut host = Host::new(sink, ack_tx, &code);
    let mut commands = spawn_stdin_reader();

    host.apply(app.connected()).await?;
    let start = match opts.mode {
        RunMode::Auto => app.toggle_run(&code),
        RunMode::Manual => app.step(&code),
    };
    host.apply(start).await?;

    loop {
        let actions = tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => app.on_text(&text),
                Some(Ok(Message::Close(_))) | None => {
                    host.apply(app.connection_lost()).await?;
                    bail!("server closed the connection");
                }
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => {
                    host.apply(app.connection_lost()).await?;
                    return Err(e).context("websocket error");
                }
            },
            Some(ticket) = ack_rx.recv() => app.pacing_elapsed(ticket),
            Some(line) = commands.recv() => match parse_command(&line) {
                Some(TerminalCommand::PauseResume) => app.toggle_run(&code),
                Some(TerminalCommand::Step) => app.step(&code),
                Some(TerminalCommand::Abort) => app.abort(),
                None => {
                    warn!(%line, "unknown command, use p / s / q");
                    Vec::new()
                }
            },
            _ = tokio::signal::ctrl_c() => app.abort(),
        };
        host.apply(actions).await?;

        if app.controller.state() == ExecState::Idle {
            break;
        }
    }

    host.close().await;
    println!("{}", app.render().hud);
    Ok(())
}
