//! Canvas 2D painter for the scene display list

use cyberfarm_client::{DrawCommand, DrawList, ImageSize, Point, Viewport};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{window, CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

const HIGHLIGHT_FILL: &str = "rgba(0, 200, 255, 0.25)";
const HIGHLIGHT_STROKE: &str = "rgba(0, 200, 255, 0.9)";
const FLOAT_COLOR: &str = "gold";
const FLOAT_FONT: &str = "20px serif";

pub struct Painter {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    background: HtmlImageElement,
    dpr: f64,
    css_width: f64,
    css_height: f64,
}

impl Painter {
    pub fn new(canvas: HtmlCanvasElement, background_url: &str) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or("2d context unavailable")?
            .dyn_into::<CanvasRenderingContext2d>()?;

        let background = HtmlImageElement::new()?;
        background.set_src(background_url);

        let dpr = window().map_or(1.0, |w| w.device_pixel_ratio());

        Ok(Self {
            canvas,
            ctx,
            background,
            dpr,
            css_width: 0.0,
            css_height: 0.0,
        })
    }

    /// Match the backing store to the element's CSS size (HiDPI aware)
    pub fn resize(&mut self, css_width: f64, css_height: f64) {
        self.css_width = css_width;
        self.css_height = css_height;

        self.canvas.set_width((css_width * self.dpr) as u32);
        self.canvas.set_height((css_height * self.dpr) as u32);

        // Reset transform before scaling (prevents compound scaling)
        let _ = self.ctx.set_transform(self.dpr, 0.0, 0.0, self.dpr, 0.0, 0.0);
    }

    /// Re-read the element size, for when no `ResizeObserver` fired yet
    pub fn fit_to_element(&mut self) {
        let rect = self.canvas.get_bounding_client_rect();
        if (rect.width() - self.css_width).abs() > f64::EPSILON
            || (rect.height() - self.css_height).abs() > f64::EPSILON
        {
            self.resize(rect.width(), rect.height());
        }
    }

    pub const fn viewport(&self) -> Viewport {
        Viewport {
            width: self.css_width,
            height: self.css_height,
        }
    }

    /// Natural size of the background, once it has loaded
    pub fn image_size(&self) -> Option<ImageSize> {
        let (w, h) = (
            self.background.natural_width(),
            self.background.natural_height(),
        );
        (self.background.complete() && w > 0 && h > 0).then(|| ImageSize {
            width: f64::from(w),
            height: f64::from(h),
        })
    }

    /// Canvas-relative position of a client-space pointer
    pub fn to_canvas(&self, client_x: i32, client_y: i32) -> Point {
        let rect = self.canvas.get_bounding_client_rect();
        Point::new(
            f64::from(client_x) - rect.left(),
            f64::from(client_y) - rect.top(),
        )
    }

    #[allow(deprecated)] // web-sys set_fill_style deprecation is overzealous
    pub fn paint(&self, frame: &DrawList) {
        let ctx = &self.ctx;
        for command in &frame.commands {
            match command {
                DrawCommand::Clear { width, height } => {
                    ctx.clear_rect(0.0, 0.0, *width, *height);
                }
                DrawCommand::Background { rect } => {
                    let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
                        &self.background,
                        rect.x,
                        rect.y,
                        rect.w,
                        rect.h,
                    );
                }
                DrawCommand::CellHighlight { corners } => {
                    ctx.begin_path();
                    ctx.move_to(corners[0].x, corners[0].y);
                    for p in &corners[1..] {
                        ctx.line_to(p.x, p.y);
                    }
                    ctx.close_path();

                    ctx.set_fill_style(&HIGHLIGHT_FILL.into());
                    ctx.fill();
                    ctx.set_line_width(2.0);
                    ctx.set_stroke_style(&HIGHLIGHT_STROKE.into());
                    ctx.stroke();
                }
                DrawCommand::Glyph { glyph, x, y, size } => {
                    ctx.set_font(&format!("{size}px serif"));
                    ctx.set_text_align("center");
                    ctx.set_text_baseline("middle");
                    let _ = ctx.fill_text(glyph, *x, *y);
                }
                DrawCommand::FloatingText { text, x, y, alpha } => {
                    ctx.save();
                    ctx.set_text_align("center");
                    ctx.set_text_baseline("middle");
                    ctx.set_font(FLOAT_FONT);
                    ctx.set_global_alpha(*alpha);
                    ctx.set_fill_style(&FLOAT_COLOR.into());
                    let _ = ctx.fill_text(text, *x, *y);
                    ctx.restore();
                }
            }
        }
    }
}
