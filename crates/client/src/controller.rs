//! Remote-execution state machine
//!
//! The controller never touches a socket or a timer. Every input returns
//! the [`Action`]s the host must carry out, in order: frames to send, a
//! pacing wait to schedule, console lines, highlight and button updates.
//! Pacing waits come back through [`ExecutionController::pacing_elapsed`]
//! with the [`AckTicket`] they were scheduled under.

use std::time::Duration;

use cyberfarm_protocol::{ClientMessage, ExecEvent, ExecMode, ScriptResult, ServerMessage};
use tracing::{debug, info, warn};

use crate::scene::FarmScene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecState {
    #[default]
    Idle,
    RunningAuto,
    PausedAuto,
    RunningManual,
}

impl ExecState {
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub const fn mode(self) -> Option<ExecMode> {
        match self {
            Self::Idle => None,
            Self::RunningAuto | Self::PausedAuto => Some(ExecMode::AutoStep),
            Self::RunningManual => Some(ExecMode::ManualStep),
        }
    }
}

/// Identifies the session a pacing wait belongs to
///
/// A ticket from an aborted or finished session is rejected when it comes
/// back, so a late wait can never acknowledge a newer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AckTicket {
    session: u64,
}

impl AckTicket {
    pub const fn session(self) -> u64 {
        self.session
    }
}

/// Label of the combined run / pause / resume control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLabel {
    Run,
    Pause,
    Resume,
}

impl RunLabel {
    pub const fn text(self) -> &'static str {
        match self {
            Self::Run => "▶ Run",
            Self::Pause => "⏸ Pause",
            Self::Resume => "▶ Resume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub run: RunLabel,
    pub stop_enabled: bool,
}

/// Host-side effect requested by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(ClientMessage),
    /// Call `pacing_elapsed(ticket)` once `after` has passed
    ScheduleAck { ticket: AckTicket, after: Duration },
    HighlightLine(u32),
    ClearHighlight,
    ClearConsole,
    /// Append a line (or block) to the user console
    Log(String),
    Controls(Controls),
    /// Re-fetch the bootstrap snapshot
    Resync,
}

#[derive(Debug)]
pub struct ExecutionController {
    state: ExecState,
    session: u64,
    exec_interval: Duration,
    /// Set by a transport loss, cleared once the farm has been resynced
    resync_required: bool,
}

impl ExecutionController {
    pub const fn new(exec_interval: Duration) -> Self {
        Self {
            state: ExecState::Idle,
            session: 0,
            exec_interval,
            resync_required: false,
        }
    }

    pub const fn state(&self) -> ExecState {
        self.state
    }

    /// Number of sessions started so far
    pub const fn session(&self) -> u64 {
        self.session
    }

    pub const fn exec_interval(&self) -> Duration {
        self.exec_interval
    }

    pub const fn controls(&self) -> Controls {
        let run = match self.state {
            ExecState::RunningAuto => RunLabel::Pause,
            ExecState::PausedAuto => RunLabel::Resume,
            ExecState::Idle | ExecState::RunningManual => RunLabel::Run,
        };
        Controls {
            run,
            stop_enabled: self.state.is_active(),
        }
    }

    /// The run control: start auto-step, pause, or resume
    pub fn toggle_run(&mut self, code: &str) -> Vec<Action> {
        match self.state {
            ExecState::Idle => self.start(ExecMode::AutoStep, code),
            ExecState::RunningAuto => {
                self.state = ExecState::PausedAuto;
                info!(session = self.session, "paused");
                vec![
                    Action::Controls(self.controls()),
                    Action::Log("[system] paused".into()),
                ]
            }
            ExecState::PausedAuto => {
                self.state = ExecState::RunningAuto;
                info!(session = self.session, "resumed");
                vec![
                    Action::Controls(self.controls()),
                    Action::Log("[system] resumed".into()),
                    Action::Send(ClientMessage::Ack),
                ]
            }
            ExecState::RunningManual => {
                warn!("pause/resume ignored in manual-step mode");
                Vec::new()
            }
        }
    }

    /// The step control: start manual-step, or request one more step
    pub fn step(&mut self, code: &str) -> Vec<Action> {
        match self.state {
            ExecState::Idle => self.start(ExecMode::ManualStep, code),
            ExecState::RunningManual => {
                debug!(session = self.session, "step");
                vec![Action::Send(ClientMessage::Step)]
            }
            ExecState::RunningAuto | ExecState::PausedAuto => {
                warn!("step ignored in auto-step mode");
                Vec::new()
            }
        }
    }

    /// Cancel the session without waiting for the server
    pub fn abort(&mut self) -> Vec<Action> {
        if !self.state.is_active() {
            return Vec::new();
        }
        info!(session = self.session, "aborted");
        self.reset();
        vec![
            Action::Send(ClientMessage::Abort),
            Action::ClearHighlight,
            Action::Controls(self.controls()),
            Action::Log("[system] aborted".into()),
        ]
    }

    fn start(&mut self, mode: ExecMode, code: &str) -> Vec<Action> {
        if self.resync_required {
            warn!(?mode, "session refused until the farm is resynced");
            return vec![Action::Log("[system] reconnecting".into())];
        }
        self.session += 1;
        self.state = match mode {
            ExecMode::AutoStep => ExecState::RunningAuto,
            ExecMode::ManualStep => ExecState::RunningManual,
        };
        info!(session = self.session, ?mode, "session started");
        vec![
            Action::ClearConsole,
            Action::ClearHighlight,
            Action::Controls(self.controls()),
            Action::Send(ClientMessage::Start {
                mode,
                code: code.to_string(),
            }),
        ]
    }

    fn reset(&mut self) {
        self.state = ExecState::Idle;
    }

    /// A pacing wait scheduled by `ScheduleAck` has completed
    ///
    /// The ack is sent even if the user paused during the wait; it is
    /// dropped only when the session it belongs to has ended.
    pub fn pacing_elapsed(&mut self, ticket: AckTicket) -> Vec<Action> {
        if ticket.session != self.session || !self.state.is_active() {
            debug!(ticket = ticket.session, session = self.session, "stale pacing ticket");
            return Vec::new();
        }
        vec![Action::Send(ClientMessage::Ack)]
    }

    /// Decode and dispatch one text frame
    ///
    /// Malformed frames are reported on the console and otherwise skipped.
    pub fn handle_text(&mut self, text: &str, scene: &mut FarmScene) -> Vec<Action> {
        match ServerMessage::from_json(text) {
            Ok(msg) => self.handle(msg, scene),
            Err(e) => {
                warn!(error = %e, "undecodable server frame");
                vec![Action::Log(format!("[error] protocol: {e}"))]
            }
        }
    }

    pub fn handle(&mut self, msg: ServerMessage, scene: &mut FarmScene) -> Vec<Action> {
        debug!(kind = msg.kind(), state = ?self.state, "server message");
        match msg {
            ServerMessage::Event { event } => self.on_event(event, scene),
            ServerMessage::FarmState { farm } => match scene.apply_snapshot(farm) {
                Ok(()) => Vec::new(),
                Err(e) => {
                    warn!(error = %e, "snapshot rejected");
                    vec![Action::Log(format!("[error] snapshot: {e}"))]
                }
            },
            ServerMessage::Done { result } => self.on_done(result.as_ref()),
            ServerMessage::Error { message, line } => {
                warn!(%message, ?line, "remote error");
                let text = match line {
                    Some(line) => format!("[error] {message} (line {line})"),
                    None => format!("[error] {message}"),
                };
                vec![Action::Log(text)]
            }
        }
    }

    fn on_event(&mut self, event: ExecEvent, scene: &mut FarmScene) -> Vec<Action> {
        if !self.state.is_active() {
            debug!(line = event.line, "event after session end ignored");
            return Vec::new();
        }

        let mut actions = vec![Action::HighlightLine(event.line)];
        if let Some(delta) = scene.record_gold_event(event.x, event.y, event.gold) {
            debug!(x = event.x, y = event.y, delta, "gold changed");
        }

        if self.state == ExecState::RunningAuto {
            actions.push(Action::ScheduleAck {
                ticket: AckTicket {
                    session: self.session,
                },
                after: self.exec_interval,
            });
        }
        actions
    }

    fn on_done(&mut self, result: Option<&ScriptResult>) -> Vec<Action> {
        if !self.state.is_active() {
            debug!("done after session end ignored");
            return Vec::new();
        }
        info!(session = self.session, "session finished");
        self.reset();

        let mut actions = vec![Action::ClearHighlight, Action::Controls(self.controls())];
        if let Some(result) = result {
            actions.push(Action::Log(format_result(result)));
        }
        actions.push(Action::Log("[system] done".into()));
        actions
    }

    /// Transport is open
    ///
    /// After an earlier loss the host must resync the farm and report it
    /// through [`Self::resynced`] before new sessions are accepted.
    pub fn connected(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::Log("[system] connected".into())];
        if self.resync_required {
            actions.push(Action::Resync);
        }
        actions
    }

    /// A fresh snapshot replaced the cache after a reconnect
    pub fn resynced(&mut self) {
        if std::mem::take(&mut self.resync_required) {
            info!("resync complete, sessions accepted again");
        }
    }

    pub const fn resync_required(&self) -> bool {
        self.resync_required
    }

    /// Transport closed unexpectedly; an active session is dropped locally
    pub fn connection_lost(&mut self) -> Vec<Action> {
        self.resync_required = true;
        let mut actions = Vec::new();
        if self.state.is_active() {
            warn!(session = self.session, "connection lost during session");
            self.reset();
            actions.push(Action::ClearHighlight);
            actions.push(Action::Controls(self.controls()));
        }
        actions.push(Action::Log("[system] connection lost".into()));
        actions
    }
}

/// Round half up, matching the server-side percentage display
fn percent(ratio: f64) -> i64 {
    (ratio * 100.0 + 0.5).floor() as i64
}

/// Console block summarising a finished script
pub fn format_result(result: &ScriptResult) -> String {
    let record = if result.new_record {
        "🏆 New Best ROI!".to_string()
    } else {
        format!("⭐ Best ROI: {}%", percent(result.best_roi))
    };
    format!(
        "📊 Script Result\n💸 Cost: {}\n💰 Gain: {}\n📈 ROI: {}%\n{record}",
        result.cost,
        result.gain,
        percent(result.roi),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridProjector;
    use cyberfarm_protocol::FieldRatio;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn scene() -> FarmScene {
        let ratio = FieldRatio {
            top_left: [0.0, 0.0],
            top_right: [1.0, 0.0],
            bottom_left: [0.0, 1.0],
            bottom_right: [1.0, 1.0],
        };
        FarmScene::new(GridProjector::new(4, ratio).unwrap())
    }

    fn event(line: u32, gold: i64) -> ServerMessage {
        ServerMessage::Event {
            event: ExecEvent {
                line,
                x: 0,
                y: 0,
                gold,
            },
        }
    }

    fn sends(actions: &[Action]) -> Vec<&ClientMessage> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn ticket(actions: &[Action]) -> Option<AckTicket> {
        actions.iter().find_map(|a| match a {
            Action::ScheduleAck { ticket, .. } => Some(*ticket),
            _ => None,
        })
    }

    #[test]
    fn test_run_starts_auto_session() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let actions = ctl.toggle_run("move(1)");
        assert_eq!(ctl.state(), ExecState::RunningAuto);
        assert_eq!(actions[0], Action::ClearConsole);
        assert_eq!(
            sends(&actions),
            vec![&ClientMessage::Start {
                mode: ExecMode::AutoStep,
                code: "move(1)".into()
            }]
        );
        assert_eq!(ctl.controls().run, RunLabel::Pause);
        assert!(ctl.controls().stop_enabled);
    }

    #[test]
    fn test_run_button_cycle() {
        let mut ctl = ExecutionController::new(INTERVAL);
        ctl.toggle_run("");
        let paused = ctl.toggle_run("");
        assert_eq!(ctl.state(), ExecState::PausedAuto);
        assert!(sends(&paused).is_empty());
        assert!(paused.contains(&Action::Log("[system] paused".into())));
        assert_eq!(ctl.controls().run, RunLabel::Resume);

        let resumed = ctl.toggle_run("");
        assert_eq!(ctl.state(), ExecState::RunningAuto);
        assert_eq!(sends(&resumed), vec![&ClientMessage::Ack]);
    }

    #[test]
    fn test_auto_event_schedules_ack() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        ctl.toggle_run("");
        let actions = ctl.handle(event(3, 100), &mut scene);
        assert_eq!(actions[0], Action::HighlightLine(3));
        assert!(sends(&actions).is_empty());
        assert!(actions.contains(&Action::ScheduleAck {
            ticket: AckTicket { session: 1 },
            after: INTERVAL
        }));

        let t = ticket(&actions).unwrap();
        assert_eq!(sends(&ctl.pacing_elapsed(t)), vec![&ClientMessage::Ack]);
    }

    #[test]
    fn test_pause_during_wait_still_acks() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        ctl.toggle_run("");
        let t = ticket(&ctl.handle(event(1, 0), &mut scene)).unwrap();
        ctl.toggle_run("");
        assert_eq!(sends(&ctl.pacing_elapsed(t)), vec![&ClientMessage::Ack]);

        // paused: the next event waits for resume
        assert!(ticket(&ctl.handle(event(2, 0), &mut scene)).is_none());
        assert_eq!(sends(&ctl.toggle_run("")), vec![&ClientMessage::Ack]);
    }

    #[test]
    fn test_resume_acks_immediately_with_wait_in_flight() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        ctl.toggle_run("");
        let t = ticket(&ctl.handle(event(1, 0), &mut scene)).unwrap();
        ctl.toggle_run("");

        let resumed = ctl.toggle_run("");
        assert_eq!(ctl.state(), ExecState::RunningAuto);
        assert_eq!(sends(&resumed), vec![&ClientMessage::Ack]);
        // the wait that was already running still completes with its own ack
        assert_eq!(sends(&ctl.pacing_elapsed(t)), vec![&ClientMessage::Ack]);
    }

    #[test]
    fn test_manual_mode() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        let start = ctl.step("till()");
        assert_eq!(ctl.state(), ExecState::RunningManual);
        assert_eq!(
            sends(&start),
            vec![&ClientMessage::Start {
                mode: ExecMode::ManualStep,
                code: "till()".into()
            }]
        );
        assert_eq!(sends(&ctl.step("ignored")), vec![&ClientMessage::Step]);

        let actions = ctl.handle(event(2, 0), &mut scene);
        assert_eq!(actions, vec![Action::HighlightLine(2)]);

        assert!(ctl.toggle_run("").is_empty());
        assert_eq!(ctl.state(), ExecState::RunningManual);
    }

    #[test]
    fn test_step_ignored_in_auto_mode() {
        let mut ctl = ExecutionController::new(INTERVAL);
        ctl.toggle_run("");
        assert!(ctl.step("").is_empty());
        ctl.toggle_run("");
        assert!(ctl.step("").is_empty());
        assert_eq!(ctl.state(), ExecState::PausedAuto);
    }

    #[test]
    fn test_abort_invalidates_pending_ack() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        ctl.toggle_run("");
        let t = ticket(&ctl.handle(event(1, 0), &mut scene)).unwrap();

        let aborted = ctl.abort();
        assert_eq!(sends(&aborted), vec![&ClientMessage::Abort]);
        assert!(aborted.contains(&Action::Log("[system] aborted".into())));
        assert_eq!(ctl.state(), ExecState::Idle);
        assert!(!ctl.controls().stop_enabled);

        assert!(ctl.pacing_elapsed(t).is_empty());
        // a late ticket cannot ack the next session either
        ctl.toggle_run("");
        assert!(ctl.pacing_elapsed(t).is_empty());
    }

    #[test]
    fn test_abort_when_idle_is_noop() {
        let mut ctl = ExecutionController::new(INTERVAL);
        assert!(ctl.abort().is_empty());
    }

    #[test]
    fn test_stale_messages_ignored_when_idle() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        assert!(ctl.handle(event(1, 50), &mut scene).is_empty());
        assert!(ctl
            .handle(ServerMessage::Done { result: None }, &mut scene)
            .is_empty());
        assert_eq!(scene.cache.current_gold(), None);
    }

    #[test]
    fn test_done_surfaces_result() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        ctl.toggle_run("");
        let result = ScriptResult {
            cost: 30.0,
            gain: 45.0,
            roi: 0.5,
            best_roi: 0.8,
            new_record: false,
        };
        let actions = ctl.handle(
            ServerMessage::Done {
                result: Some(result),
            },
            &mut scene,
        );
        assert_eq!(ctl.state(), ExecState::Idle);
        assert_eq!(actions[0], Action::ClearHighlight);
        assert_eq!(
            actions[2],
            Action::Log(
                "📊 Script Result\n💸 Cost: 30\n💰 Gain: 45\n📈 ROI: 50%\n⭐ Best ROI: 80%".into()
            )
        );
        assert_eq!(actions[3], Action::Log("[system] done".into()));
    }

    #[test]
    fn test_remote_error_keeps_state() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        ctl.step("");
        let actions = ctl.handle(
            ServerMessage::Error {
                message: "NameError".into(),
                line: Some(4),
            },
            &mut scene,
        );
        assert_eq!(actions, vec![Action::Log("[error] NameError (line 4)".into())]);
        assert_eq!(ctl.state(), ExecState::RunningManual);
    }

    #[test]
    fn test_malformed_frame_is_logged() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        ctl.toggle_run("");
        let actions = ctl.handle_text(r#"{"type":"event","event":{"line":"x"}}"#, &mut scene);
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], Action::Log(line) if line.starts_with("[error] protocol:")));
        assert_eq!(ctl.state(), ExecState::RunningAuto);
    }

    #[test]
    fn test_bad_snapshot_is_logged() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        let actions = ctl.handle_text(
            r#"{"type":"farm_state","farm":{"gold":1,"grid":[[null]]}}"#,
            &mut scene,
        );
        assert!(matches!(&actions[0], Action::Log(line) if line.starts_with("[error] snapshot:")));
        assert_eq!(scene.cache.current_gold(), None);
    }

    #[test]
    fn test_connection_loss_is_implicit_abort() {
        let mut ctl = ExecutionController::new(INTERVAL);
        let mut scene = scene();
        assert_eq!(ctl.connected(), vec![Action::Log("[system] connected".into())]);
        ctl.toggle_run("");
        let t = ticket(&ctl.handle(event(1, 0), &mut scene)).unwrap();

        let lost = ctl.connection_lost();
        assert!(sends(&lost).is_empty());
        assert_eq!(ctl.state(), ExecState::Idle);
        assert!(ctl.pacing_elapsed(t).is_empty());

        assert!(ctl.connected().contains(&Action::Resync));
        ctl.resynced();
        assert!(!ctl.connected().contains(&Action::Resync));
    }

    #[test]
    fn test_sessions_refused_until_resynced() {
        let mut ctl = ExecutionController::new(INTERVAL);
        ctl.connected();
        ctl.connection_lost();

        let refused = ctl.toggle_run("till()");
        assert_eq!(ctl.state(), ExecState::Idle);
        assert!(sends(&refused).is_empty());
        assert_eq!(refused, vec![Action::Log("[system] reconnecting".into())]);

        ctl.connected();
        assert!(ctl.resync_required());
        assert!(sends(&ctl.step("till()")).is_empty());
        assert_eq!(ctl.session(), 0);

        ctl.resynced();
        let started = ctl.toggle_run("till()");
        assert_eq!(ctl.state(), ExecState::RunningAuto);
        assert_eq!(
            sends(&started),
            vec![&ClientMessage::Start {
                mode: ExecMode::AutoStep,
                code: "till()".into()
            }]
        );
    }

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(percent(0.125), 13);
        assert_eq!(percent(-0.125), -12);
        assert_eq!(percent(1.0), 100);
    }
}
