use std::cell::{Cell, RefCell};

use cyberfarm_client::FarmApp;
use wasm_bindgen::prelude::*;
use web_sys::window;

use crate::channel::OutboundChannel;
use crate::renderer::Painter;

/// Server endpoints derived from the page location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub bootstrap_url: String,
    pub ws_url: String,
}

impl Endpoints {
    /// Build from `location.protocol` and `location.host`
    pub fn for_location(protocol: &str, host: &str) -> Self {
        let ws_protocol = if protocol == "https:" { "wss" } else { "ws" };
        Self {
            bootstrap_url: "/api/bootstrap".to_string(),
            ws_url: format!("{ws_protocol}://{host}/ws/run"),
        }
    }
}

/// Resolve endpoints for the current page
pub fn endpoints() -> Result<Endpoints, JsValue> {
    let win = window().ok_or("No window found")?;
    let location = win.location();
    let protocol = location.protocol()?;
    let host = location.host()?;
    Ok(Endpoints::for_location(&protocol, &host))
}

/// Page-lifetime state shared by every browser callback
///
/// Callbacks never overlap, but a borrow must still end before
/// [`crate::handler::apply`] runs the returned actions.
pub struct Session {
    pub app: RefCell<FarmApp>,
    pub painter: RefCell<Painter>,
    pub channel: OutboundChannel,
    pub endpoints: Endpoints,
    reconnect_attempt: Cell<u8>,
}

impl Session {
    pub fn new(app: FarmApp, painter: Painter, endpoints: Endpoints) -> Self {
        Self {
            app: RefCell::new(app),
            painter: RefCell::new(painter),
            channel: OutboundChannel::new(),
            endpoints,
            reconnect_attempt: Cell::new(0),
        }
    }

    /// Next reconnect attempt number, counting up until a socket opens
    pub fn next_reconnect_attempt(&self) -> u8 {
        let attempt = self.reconnect_attempt.get();
        self.reconnect_attempt.set(attempt.saturating_add(1));
        attempt
    }

    pub fn reset_reconnect(&self) {
        self.reconnect_attempt.set(0);
    }
}
