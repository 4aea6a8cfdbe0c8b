//! Application state shared by the frame loop and the transport callbacks

use cyberfarm_protocol::{Bootstrap, FarmState};
use tracing::{info, warn};

use crate::cache::SnapshotError;
use crate::clock::{FrameCallback, FrameClock};
use crate::config::{ClientSettings, ConfigError};
use crate::controller::{AckTicket, Action, ExecutionController};
use crate::geometry::{CellPos, Point};
use crate::scene::{DrawList, FarmScene, ImageSize, SceneRenderer, Viewport};

/// Everything one client session needs, owned in one place
///
/// Hosts hold a single `FarmApp` and route every callback (frame, socket
/// message, pacing timer, pointer, button) through it. Callbacks run one at
/// a time, so no locking is involved.
pub struct FarmApp {
    settings: ClientSettings,
    pub scene: FarmScene,
    pub controller: ExecutionController,
    renderer: SceneRenderer,
    clock: FrameClock,
}

impl FarmApp {
    pub fn new(settings: ClientSettings) -> Self {
        let scene = FarmScene::new(settings.projector.clone());
        let controller = ExecutionController::new(settings.exec_interval);
        Self {
            settings,
            scene,
            controller,
            renderer: SceneRenderer::default(),
            clock: FrameClock::new(),
        }
    }

    /// Build from the bootstrap payload and apply its initial snapshot
    pub fn from_bootstrap(bootstrap: Bootstrap) -> Result<Self, ConfigError> {
        let settings = ClientSettings::from_bootstrap(&bootstrap.config)?;
        info!(
            grid = settings.grid(),
            interval_ms = settings.exec_interval.as_millis(),
            "session configured"
        );
        let mut app = Self::new(settings);
        if let Err(e) = app.resync(bootstrap.farm) {
            warn!(error = %e, "initial snapshot rejected");
        }
        Ok(app)
    }

    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn toggle_run(&mut self, code: &str) -> Vec<Action> {
        self.controller.toggle_run(code)
    }

    pub fn step(&mut self, code: &str) -> Vec<Action> {
        self.controller.step(code)
    }

    pub fn abort(&mut self) -> Vec<Action> {
        self.controller.abort()
    }

    pub fn on_text(&mut self, text: &str) -> Vec<Action> {
        self.controller.handle_text(text, &mut self.scene)
    }

    pub fn pacing_elapsed(&mut self, ticket: AckTicket) -> Vec<Action> {
        self.controller.pacing_elapsed(ticket)
    }

    pub fn connected(&mut self) -> Vec<Action> {
        self.controller.connected()
    }

    pub fn connection_lost(&mut self) -> Vec<Action> {
        self.controller.connection_lost()
    }

    /// Replace the farm with a freshly fetched snapshot
    ///
    /// Sessions refused since a transport loss are accepted again only
    /// after the snapshot is applied.
    pub fn resync(&mut self, farm: FarmState) -> Result<(), SnapshotError> {
        self.scene.apply_snapshot(farm)?;
        self.controller.resynced();
        Ok(())
    }

    pub fn pointer_moved(&mut self, p: Point) -> Option<CellPos> {
        self.scene.pointer_moved(p)
    }

    pub fn pointer_left(&mut self) {
        self.scene.pointer_left();
    }

    /// One host frame: measure `dt`, animate, lay out and draw
    pub fn animation_frame(
        &mut self,
        now_ms: f64,
        viewport: Viewport,
        image: Option<ImageSize>,
    ) -> DrawList {
        let dt = self.clock.tick(now_ms);
        self.frame(dt);
        self.scene.relayout(viewport, image);
        self.render()
    }

    pub fn render(&self) -> DrawList {
        self.renderer.render(&self.scene)
    }
}

impl FrameCallback for FarmApp {
    fn frame(&mut self, dt: f64) {
        self.scene.overlay.advance(dt);
    }
}
