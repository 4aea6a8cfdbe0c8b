//! DOM sinks: console panel, resource line, buttons, editor hooks

use cyberfarm_client::Controls;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    window, Document, HtmlButtonElement, HtmlCanvasElement, ResizeObserver, ResizeObserverEntry,
};

/// Get document helper
fn get_document() -> Option<Document> {
    window().and_then(|w| w.document())
}

/// Append a line to the console panel and keep it scrolled to the end
pub fn console_append(text: &str) {
    if let Some(doc) = get_document() {
        if let Some(el) = doc.get_element_by_id("console") {
            let mut content = el.text_content().unwrap_or_default();
            content.push_str(text);
            content.push('\n');
            el.set_text_content(Some(&content));
            el.set_scroll_top(el.scroll_height());
        }
    }
}

pub fn console_clear() {
    if let Some(doc) = get_document() {
        if let Some(el) = doc.get_element_by_id("console") {
            el.set_text_content(Some(""));
        }
    }
}

/// Resource line (`💰 gold | 🕒 time`); skips the write when unchanged
pub fn set_resource(text: &str) {
    if let Some(doc) = get_document() {
        if let Some(el) = doc.get_element_by_id("resource") {
            if el.text_content().as_deref() != Some(text) {
                el.set_text_content(Some(text));
            }
        }
    }
}

fn button(doc: &Document, id: &str) -> Option<HtmlButtonElement> {
    doc.get_element_by_id(id)?.dyn_into::<HtmlButtonElement>().ok()
}

/// Reflect controller state on the run and stop buttons
pub fn set_controls(controls: Controls) {
    if let Some(doc) = get_document() {
        if let Some(run) = button(&doc, "runAllBtn") {
            run.set_text_content(Some(controls.run.text()));
            run.set_disabled(false);
        }
        if let Some(stop) = button(&doc, "stopBtn") {
            stop.set_disabled(!controls.stop_enabled);
        }
    }
}

/// Set connection status indicator (connected/connecting/disconnected)
pub fn set_status(status: &str) {
    if let Some(doc) = get_document() {
        if let Some(el) = doc.get_element_by_id("farm-status") {
            el.set_class_name(&format!("status-{status}"));
        }
    }
}

/// Call `window.__editor.<method>([arg])` if the page installed an editor
fn call_editor(method: &str, arg: Option<&JsValue>) -> Option<JsValue> {
    let win = window()?;
    let editor = js_sys::Reflect::get(&win, &"__editor".into()).ok()?;
    if editor.is_undefined() {
        return None;
    }
    let func = js_sys::Reflect::get(&editor, &method.into()).ok()?;
    let func = func.dyn_ref::<js_sys::Function>()?;
    let result = match arg {
        Some(arg) => func.call1(&editor, arg),
        None => func.call0(&editor),
    };
    result.ok()
}

/// Highlight the whole program line `line` (1-based)
pub fn highlight_line(line: u32) {
    call_editor("highlightLine", Some(&line.into()));
}

pub fn clear_highlight() {
    call_editor("clearHighlight", None);
}

/// Current program text from the editor; empty when no editor is installed
pub fn editor_text() -> String {
    call_editor("getValue", None)
        .and_then(|v| v.as_string())
        .unwrap_or_default()
}

/// Setup `ResizeObserver` for the canvas
pub fn setup_resize_listener(
    canvas: &HtmlCanvasElement,
    on_resize: impl Fn(f64, f64) + 'static,
) -> Result<(), JsValue> {
    let resize_callback = Closure::wrap(Box::new(move |entries: js_sys::Array| {
        for i in 0..entries.length() {
            if let Ok(entry) = entries.get(i).dyn_into::<ResizeObserverEntry>() {
                let rect = entry.content_rect();
                on_resize(rect.width(), rect.height());
            }
        }
    }) as Box<dyn FnMut(_)>);

    let observer = ResizeObserver::new(resize_callback.as_ref().unchecked_ref())?;
    observer.observe(canvas);
    resize_callback.forget();

    Ok(())
}
