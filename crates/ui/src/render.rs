//! Continuous `requestAnimationFrame` loop
//! Every frame: measure dt, animate the overlay, lay out, paint.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::error;
use wasm_bindgen::prelude::*;
use web_sys::window;

use crate::dom::set_resource;
use crate::session::Session;

type FrameClosure = Closure<dyn FnMut(f64)>;

fn request_frame(callback: &FrameClosure) {
    let Some(win) = window() else {
        return;
    };
    if let Err(e) = win.request_animation_frame(callback.as_ref().unchecked_ref()) {
        error!(error = ?e, "requestAnimationFrame failed");
    }
}

fn render_frame(session: &Session, now_ms: f64) {
    let painter = session.painter.borrow();
    let frame = session
        .app
        .borrow_mut()
        .animation_frame(now_ms, painter.viewport(), painter.image_size());
    painter.paint(&frame);
    set_resource(&frame.hud);
}

/// Register the frame callback; it reschedules itself for the page lifetime
pub fn start(session: Rc<Session>) {
    let slot: Rc<RefCell<Option<FrameClosure>>> = Rc::new(RefCell::new(None));
    let next = Rc::clone(&slot);

    *slot.borrow_mut() = Some(Closure::wrap(Box::new(move |now: f64| {
        render_frame(&session, now);
        if let Some(callback) = next.borrow().as_ref() {
            request_frame(callback);
        }
    }) as Box<dyn FnMut(f64)>));

    if let Some(callback) = slot.borrow().as_ref() {
        request_frame(callback);
    };
}
