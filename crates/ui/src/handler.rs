//! Carries out controller actions against the browser

use std::rc::Rc;
use std::time::Duration;

use cyberfarm_client::{AckTicket, Action};
use tracing::{debug, error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::window;

use crate::bootstrap::fetch_bootstrap;
use crate::channel::backoff_delay_ms;
use crate::dom;
use crate::session::Session;

/// Execute actions in order
pub fn apply(session: &Rc<Session>, actions: Vec<Action>) {
    for action in actions {
        match action {
            Action::Send(msg) => {
                if let Err(e) = session.channel.send(&msg) {
                    warn!(error = %e, "send deferred");
                }
            }
            Action::ScheduleAck { ticket, after } => schedule_ack(session, ticket, after),
            Action::HighlightLine(line) => dom::highlight_line(line),
            Action::ClearHighlight => dom::clear_highlight(),
            Action::ClearConsole => dom::console_clear(),
            Action::Log(text) => dom::console_append(&text),
            Action::Controls(controls) => dom::set_controls(controls),
            Action::Resync => resync(session),
        }
    }
}

/// Plain timed wait; pause does not cancel it
fn schedule_ack(session: &Rc<Session>, ticket: AckTicket, after: Duration) {
    let Some(win) = window() else {
        return;
    };
    let session = Rc::clone(session);
    // freed by the JS side once it has run
    let callback = Closure::once_into_js(move || {
        let actions = session.app.borrow_mut().pacing_elapsed(ticket);
        apply(&session, actions);
    });

    let delay = i32::try_from(after.as_millis()).unwrap_or(i32::MAX);
    if let Err(e) =
        win.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
    {
        error!(error = ?e, "failed to schedule ack");
    }
}

/// Re-fetch the bootstrap snapshot after a reconnect
///
/// New sessions stay refused until a snapshot is applied, so failures retry
/// at the capped backoff delay.
fn resync(session: &Rc<Session>) {
    let session = Rc::clone(session);
    wasm_bindgen_futures::spawn_local(async move {
        let outcome = match fetch_bootstrap(&session.endpoints.bootstrap_url).await {
            Ok(bootstrap) => session
                .app
                .borrow_mut()
                .resync(bootstrap.farm)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.as_string().unwrap_or_else(|| format!("{e:?}"))),
        };
        match outcome {
            Ok(()) => {
                info!("farm resynced");
                dom::console_append("[system] resynced");
            }
            Err(reason) => {
                warn!(%reason, "resync failed");
                dom::console_append(&format!("[error] resync: {reason}"));
                retry_resync(&session);
            }
        }
    });
    debug!("resync requested");
}

fn retry_resync(session: &Rc<Session>) {
    let Some(win) = window() else {
        return;
    };
    let session_retry = Rc::clone(session);
    let callback = Closure::once_into_js(move || {
        if session_retry.app.borrow().controller.resync_required() {
            resync(&session_retry);
        }
    });
    let delay = i32::try_from(backoff_delay_ms(u8::MAX)).unwrap_or(i32::MAX);
    if let Err(e) =
        win.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
    {
        error!(error = ?e, "failed to schedule resync retry");
    }
}
