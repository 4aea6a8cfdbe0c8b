//! Core of the cyberfarm visual client
//!
//! Everything here is host-independent: the browser front end and the
//! headless CLI both feed input into a [`FarmApp`] and carry out the
//! [`Action`]s and [`DrawList`]s it returns.

pub mod app;
pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod geometry;
pub mod overlay;
pub mod scene;

pub use app::FarmApp;
pub use cache::{FarmStateCache, SnapshotError};
pub use clock::{drive, FrameCallback, FrameClock};
pub use config::{ClientSettings, ConfigError};
pub use controller::{
    format_result, AckTicket, Action, Controls, ExecState, ExecutionController, RunLabel,
};
pub use geometry::{CellPos, GeometryError, GridProjector, Point, ProjectedPoint, Rect, ScreenField};
pub use overlay::{FloatingText, OverlayAnimator};
pub use scene::{
    BackgroundLayout, DrawCommand, DrawList, FarmScene, ImageSize, SceneRenderer, Viewport,
};
