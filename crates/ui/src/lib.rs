//! cyberfarm browser front end
//!
//! Fetches the bootstrap payload, paints the farm on `#farmCanvas` every
//! animation frame, and runs scripts over the `/ws/run` WebSocket. The page
//! wires its buttons to [`farm_run`], [`farm_step`] and [`farm_abort`], and
//! may install `window.__editor` (`getValue`, `highlightLine`,
//! `clearHighlight`) for program text and line highlighting.

mod bootstrap;
mod channel;
mod dom;
mod handler;
mod network;
mod render;
mod renderer;
mod session;

use std::cell::RefCell;
use std::rc::Rc;

use cyberfarm_client::FarmApp;
use tracing::{error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{window, HtmlCanvasElement, MouseEvent};

use crate::bootstrap::fetch_bootstrap;
use crate::handler::apply;
use crate::renderer::Painter;
use crate::session::Session;

thread_local! {
    static SESSION: RefCell<Option<Rc<Session>>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn main_js() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();

    spawn_local(async {
        if let Err(e) = main_thread_entry().await {
            let reason = e.as_string().unwrap_or_else(|| format!("{e:?}"));
            error!(%reason, "startup failed");
            dom::console_append(&format!("[error] startup: {reason}"));
        }
    });

    Ok(())
}

async fn main_thread_entry() -> Result<(), JsValue> {
    let window = window().ok_or("no global `window` exists")?;
    let document = window.document().ok_or("should have a document on window")?;
    let canvas = document
        .get_element_by_id("farmCanvas")
        .ok_or("canvas not found")?
        .dyn_into::<HtmlCanvasElement>()?;

    let endpoints = session::endpoints()?;
    let bootstrap = fetch_bootstrap(&endpoints.bootstrap_url).await?;
    let app = FarmApp::from_bootstrap(bootstrap).map_err(|e| JsValue::from_str(&e.to_string()))?;

    let mut painter = Painter::new(canvas.clone(), &app.settings().background)?;
    painter.fit_to_element();

    let session = Rc::new(Session::new(app, painter, endpoints));
    dom::set_controls(session.app.borrow().controller.controls());

    setup_resize(&canvas, &session)?;
    setup_pointer(&canvas, &session)?;
    network::connect(&session)?;
    render::start(Rc::clone(&session));

    info!("farm client ready");
    SESSION.with(|slot| *slot.borrow_mut() = Some(session));
    Ok(())
}

fn setup_resize(canvas: &HtmlCanvasElement, session: &Rc<Session>) -> Result<(), JsValue> {
    let session = Rc::clone(session);
    dom::setup_resize_listener(canvas, move |width, height| {
        session.painter.borrow_mut().resize(width, height);
    })
}

fn setup_pointer(canvas: &HtmlCanvasElement, session: &Rc<Session>) -> Result<(), JsValue> {
    // Mouse Move
    let session_move = Rc::clone(session);
    let on_move = Closure::wrap(Box::new(move |e: MouseEvent| {
        let p = session_move.painter.borrow().to_canvas(e.client_x(), e.client_y());
        session_move.app.borrow_mut().pointer_moved(p);
    }) as Box<dyn FnMut(MouseEvent)>);
    canvas.add_event_listener_with_callback("mousemove", on_move.as_ref().unchecked_ref())?;
    on_move.forget();

    // Mouse Leave
    let session_leave = Rc::clone(session);
    let on_leave = Closure::wrap(Box::new(move |_: MouseEvent| {
        session_leave.app.borrow_mut().pointer_left();
    }) as Box<dyn FnMut(MouseEvent)>);
    canvas.add_event_listener_with_callback("mouseleave", on_leave.as_ref().unchecked_ref())?;
    on_leave.forget();

    Ok(())
}

fn with_session(f: impl FnOnce(&Rc<Session>)) {
    let session = SESSION.with(|slot| slot.borrow().clone());
    match session {
        Some(session) => f(&session),
        None => warn!("farm session not ready"),
    }
}

/// Run button: start an auto-step run, pause it, or resume it
///
/// `code` defaults to the installed editor's text.
#[wasm_bindgen]
pub fn farm_run(code: Option<String>) {
    with_session(|session| {
        let code = code.unwrap_or_else(dom::editor_text);
        let actions = session.app.borrow_mut().toggle_run(&code);
        apply(session, actions);
    });
}

/// Step button: start a manual-step run, or execute one more instruction
#[wasm_bindgen]
pub fn farm_step(code: Option<String>) {
    with_session(|session| {
        let code = code.unwrap_or_else(dom::editor_text);
        let actions = session.app.borrow_mut().step(&code);
        apply(session, actions);
    });
}

/// Stop button
#[wasm_bindgen]
pub fn farm_abort() {
    with_session(|session| {
        let actions = session.app.borrow_mut().abort();
        apply(session, actions);
    });
}
