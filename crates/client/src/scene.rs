//! Scene state and display-list rendering
//!
//! [`FarmScene`] is the application-state object shared by the render
//! callback and the message handlers: projector, cached farm, overlay
//! particles, the field resolved for the current layout, and the hovered
//! cell. [`SceneRenderer`] turns it into a [`DrawList`] that a host painter
//! (the browser canvas) replays without further logic.

use cyberfarm_protocol::FarmState;
use tracing::{debug, warn};

use crate::cache::{FarmStateCache, SnapshotError};
use crate::geometry::{CellPos, GridProjector, Point, Rect, ScreenField};
use crate::overlay::{OverlayAnimator, DEFAULT_LIFE};

/// Rise speed of gold-delta labels, px/s
const FLOAT_VY: f64 = -40.0;
/// Gold-delta labels start this far above the sprite anchor
const FLOAT_LIFT: f64 = 20.0;

/// Drawable area in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Natural size of the background image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

/// Placement of the background image inside the viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundLayout {
    pub rect: Rect,
    /// Image-to-screen scale; sprite sizes follow it
    pub scale: f64,
}

impl BackgroundLayout {
    /// Fit the image inside the viewport, centred horizontally and aligned to
    /// the top edge. `None` while the image has no size (not loaded).
    pub fn fit(viewport: Viewport, image: ImageSize) -> Option<Self> {
        if image.width <= 0.0 || image.height <= 0.0 {
            return None;
        }
        let scale = (viewport.width / image.width).min(viewport.height / image.height);
        let w = image.width * scale;
        let h = image.height * scale;
        Some(Self {
            rect: Rect {
                x: (viewport.width - w) / 2.0,
                y: 0.0,
                w,
                h,
            },
            scale,
        })
    }
}

pub struct FarmScene {
    projector: GridProjector,
    pub cache: FarmStateCache,
    pub overlay: OverlayAnimator,
    viewport: Viewport,
    layout: Option<BackgroundLayout>,
    field: Option<ScreenField>,
    hovered: Option<CellPos>,
}

impl FarmScene {
    pub fn new(projector: GridProjector) -> Self {
        let grid = projector.grid();
        Self {
            projector,
            cache: FarmStateCache::new(grid),
            overlay: OverlayAnimator::new(),
            viewport: Viewport::default(),
            layout: None,
            field: None,
            hovered: None,
        }
    }

    pub const fn projector(&self) -> &GridProjector {
        &self.projector
    }

    /// Recompute background placement and the screen field
    ///
    /// Called every frame; layout can change continuously while the panes
    /// are being resized.
    pub fn relayout(&mut self, viewport: Viewport, image: Option<ImageSize>) {
        self.viewport = viewport;
        self.layout = image.and_then(|image| BackgroundLayout::fit(viewport, image));
        self.field = self
            .layout
            .map(|layout| self.projector.resolve_field(layout.rect));
    }

    pub const fn layout(&self) -> Option<&BackgroundLayout> {
        self.layout.as_ref()
    }

    pub const fn field(&self) -> Option<&ScreenField> {
        self.field.as_ref()
    }

    pub const fn hovered(&self) -> Option<CellPos> {
        self.hovered
    }

    /// Update the hovered cell from a pointer position
    pub fn pointer_moved(&mut self, p: Point) -> Option<CellPos> {
        self.hovered = self
            .field
            .as_ref()
            .and_then(|field| self.projector.hit_test(p, field));
        self.hovered
    }

    pub fn pointer_left(&mut self) {
        self.hovered = None;
    }

    pub fn apply_snapshot(&mut self, farm: FarmState) -> Result<(), SnapshotError> {
        self.cache.apply_snapshot(farm)
    }

    /// Record an event's gold total and float the change above its cell
    ///
    /// Returns the delta when a label was spawned.
    pub fn record_gold_event(&mut self, x: i64, y: i64, gold: i64) -> Option<i64> {
        let delta = self.cache.record_gold(gold).filter(|d| *d != 0)?;
        let (Ok(cx), Ok(cy)) = (usize::try_from(x), usize::try_from(y)) else {
            warn!(x, y, "gold change at a negative cell, not drawn");
            return None;
        };
        let Some(field) = self.field else {
            debug!(delta, "no layout yet, gold change not drawn");
            return None;
        };

        let anchor = self.projector.cell_center(cx, cy, &field);
        self.overlay.spawn(
            anchor.x,
            anchor.y - FLOAT_LIFT,
            gold_delta_label(delta),
            DEFAULT_LIFE,
            FLOAT_VY,
        );
        Some(delta)
    }
}

/// `"+5 💰"` / `"-3 💰"`
pub fn gold_delta_label(delta: i64) -> String {
    let sign = if delta > 0 { "+" } else { "" };
    format!("{sign}{delta} 💰")
}

/// One primitive for the host painter
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Clear the whole viewport
    Clear { width: f64, height: f64 },
    /// Draw the background image into `rect`
    Background { rect: Rect },
    /// Filled and stroked hover outline of one cell
    CellHighlight { corners: [Point; 4] },
    /// Centred emoji glyph of `size` px
    Glyph {
        glyph: &'static str,
        x: f64,
        y: f64,
        size: f64,
    },
    /// Gold-coloured overlay label
    FloatingText {
        text: String,
        x: f64,
        y: f64,
        alpha: f64,
    },
}

/// A complete frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawList {
    pub commands: Vec<DrawCommand>,
    /// Resource line, e.g. `💰 500 | 🕒 12`
    pub hud: String,
}

/// Builds a frame from the scene state
#[derive(Debug, Clone, Copy)]
pub struct SceneRenderer {
    pub crop_base: f64,
    pub crop_min: f64,
    pub crop_max: f64,
}

impl Default for SceneRenderer {
    fn default() -> Self {
        Self {
            crop_base: 44.0,
            crop_min: 32.0,
            crop_max: 64.0,
        }
    }
}

const HARVEST_GLYPH: &str = "🟢";

impl SceneRenderer {
    /// Sprite size for a crop, scaled by depth and growth, clamped
    pub fn crop_size(&self, bg_scale: f64, depth: f64, maturity: f64) -> f64 {
        let depth_scale = 1.0 + depth * 0.25;
        let maturity_scale = 0.6 + maturity * 0.4;
        (self.crop_base * bg_scale * depth_scale * maturity_scale)
            .clamp(self.crop_min, self.crop_max)
    }

    pub fn render(&self, scene: &FarmScene) -> DrawList {
        let mut commands = vec![DrawCommand::Clear {
            width: scene.viewport.width,
            height: scene.viewport.height,
        }];

        if let (Some(layout), Some(field)) = (scene.layout, scene.field) {
            commands.push(DrawCommand::Background { rect: layout.rect });
            if scene.cache.has_grid() {
                self.push_cells(scene, &layout, &field, &mut commands);
            }
        }

        commands.extend(scene.overlay.particles().iter().map(|p| DrawCommand::FloatingText {
            text: p.text.clone(),
            x: p.x,
            y: p.y,
            alpha: p.alpha(),
        }));

        DrawList {
            commands,
            hud: format!(
                "💰 {} | 🕒 {}",
                scene.cache.current_gold().unwrap_or(0),
                scene.cache.current_time().unwrap_or(0.0)
            ),
        }
    }

    fn push_cells(
        &self,
        scene: &FarmScene,
        layout: &BackgroundLayout,
        field: &ScreenField,
        commands: &mut Vec<DrawCommand>,
    ) {
        let projector = scene.projector();
        for pos in projector.cells() {
            let Some(cell) = scene.cache.current_cell(pos.x, pos.y) else {
                continue;
            };

            if scene.hovered == Some(pos) {
                commands.push(DrawCommand::CellHighlight {
                    corners: projector.cell_corners(pos.x, pos.y, field),
                });
            }

            let Some(kind) = cell.kind else {
                continue;
            };
            let p = projector.cell_center(pos.x, pos.y, field);
            commands.push(DrawCommand::Glyph {
                glyph: kind.emoji(),
                x: p.x,
                y: p.y,
                size: self.crop_size(layout.scale, p.depth, cell.maturity),
            });

            if cell.is_mature() {
                let size = (14.0 + p.depth * 4.0) * layout.scale;
                commands.push(DrawCommand::Glyph {
                    glyph: HARVEST_GLYPH,
                    x: p.x + size,
                    y: p.y - size,
                    size,
                });
            }
        }
    }
}
