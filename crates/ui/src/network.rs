use std::rc::Rc;

use tracing::{debug, error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, CloseEvent, Event, MessageEvent, WebSocket};

use crate::channel::{backoff_delay_ms, ConnectionState};
use crate::dom::set_status;
use crate::handler::apply;
use crate::session::Session;

/// Open the run channel and wire its callbacks to the session
///
/// An unexpected close drops any active script session and schedules a
/// reconnect with exponential backoff.
pub fn connect(session: &Rc<Session>) -> Result<(), JsValue> {
    let ws = WebSocket::new(&session.endpoints.ws_url)?;
    set_status("connecting");

    // ON OPEN
    let ws_open = ws.clone();
    let session_open = Rc::clone(session);
    let onopen = Closure::wrap(Box::new(move || {
        info!(url = %session_open.endpoints.ws_url, "connected");
        set_status("connected");
        session_open.reset_reconnect();
        session_open.channel.set_websocket(ws_open.clone());
        let actions = session_open.app.borrow_mut().connected();
        apply(&session_open, actions);
    }) as Box<dyn FnMut()>);
    ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
    onopen.forget();

    // ON MESSAGE
    let session_msg = Rc::clone(session);
    let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| {
        let Some(text) = e.data().as_string() else {
            warn!("binary frame ignored");
            return;
        };
        debug!(len = text.len(), "frame received");
        let actions = session_msg.app.borrow_mut().on_text(&text);
        apply(&session_msg, actions);
    }) as Box<dyn FnMut(_)>);
    ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget();

    // ON ERROR
    let onerror = Closure::wrap(Box::new(move |e: Event| {
        error!(event = %e.type_(), "websocket error");
        set_status("disconnected");
    }) as Box<dyn FnMut(_)>);
    ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
    onerror.forget();

    // ON CLOSE
    let session_close = Rc::clone(session);
    let onclose = Closure::wrap(Box::new(move |e: CloseEvent| {
        warn!(code = e.code(), reason = %e.reason(), "websocket closed");
        set_status("disconnected");

        let was_open = session_close.channel.connection_state() != ConnectionState::Disconnected;
        session_close.channel.mark_disconnected();
        if was_open {
            session_close.channel.discard_pending();
            let actions = session_close.app.borrow_mut().connection_lost();
            apply(&session_close, actions);
        }
        schedule_reconnect(&session_close);
    }) as Box<dyn FnMut(_)>);
    ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
    onclose.forget();

    Ok(())
}

fn schedule_reconnect(session: &Rc<Session>) {
    let Some(win) = window() else {
        return;
    };
    let attempt = session.next_reconnect_attempt();
    let delay = backoff_delay_ms(attempt);
    info!(attempt, delay_ms = delay, "reconnecting");

    let session = Rc::clone(session);
    let callback = Closure::once_into_js(move || {
        if let Err(e) = connect(&session) {
            error!(error = ?e, "reconnect failed");
            schedule_reconnect(&session);
        }
    });
    if let Err(e) = win.set_timeout_with_callback_and_timeout_and_arguments_0(
        callback.unchecked_ref(),
        i32::try_from(delay).unwrap_or(i32::MAX),
    ) {
        error!(error = ?e, attempt, "failed to schedule reconnect");
        set_status("offline");
    }
}
