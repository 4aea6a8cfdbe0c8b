//! Outbound message channel
//! FIFO send queue with retry over the current WebSocket.
//! Survives reconnection: the socket is swapped, queued frames are kept.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use cyberfarm_protocol::{ClientMessage, ProtocolError};
use thiserror::Error;
use tracing::{info, warn};
use web_sys::WebSocket;

const MAX_RETRIES: u8 = 5;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to encode {kind} message: {source}")]
    Encode {
        kind: &'static str,
        source: ProtocolError,
    },

    #[error("socket is not open, message queued")]
    NotOpen,
}

/// Connection state for resilience tracking
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConnectionState {
    Connected,
    Degraded,     // Experiencing failures but still trying
    Disconnected, // WebSocket closed
}

/// Exponential backoff: 100ms doubling per attempt, capped at 1.6s
pub const fn backoff_delay_ms(attempt: u8) -> u32 {
    100 * (1 << (if attempt < 4 { attempt } else { 4 }))
}

fn kind(msg: &ClientMessage) -> &'static str {
    match msg {
        ClientMessage::Start { .. } => "start",
        ClientMessage::Ack => "ack",
        ClientMessage::Step => "step",
        ClientMessage::Abort => "abort",
    }
}

/// Queue of encoded JSON frames waiting for an open socket
pub struct OutboundChannel {
    queue: RefCell<VecDeque<(String, u8)>>, // (json, retry_count)
    ws: RefCell<Option<WebSocket>>,
    send_failures: Cell<u32>,
    state: Cell<ConnectionState>,
}

impl OutboundChannel {
    pub const fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            ws: RefCell::new(None),
            send_failures: Cell::new(0),
            state: Cell::new(ConnectionState::Disconnected),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Install a freshly opened socket and flush anything queued
    pub fn set_websocket(&self, ws: WebSocket) {
        if let Some(old_ws) = self.ws.borrow_mut().replace(ws) {
            if old_ws.ready_state() == WebSocket::OPEN
                || old_ws.ready_state() == WebSocket::CONNECTING
            {
                let _ = old_ws.close();
            }
        }
        self.state.set(ConnectionState::Connected);
        self.send_failures.set(0);
        info!("channel connected");
        self.flush();
    }

    /// Mark as disconnected (called from onclose handler)
    pub fn mark_disconnected(&self) {
        self.state.set(ConnectionState::Disconnected);
        warn!(queued = self.pending_count(), "channel disconnected");
    }

    /// Drop frames that belong to a session that no longer exists
    pub fn discard_pending(&self) {
        self.queue.borrow_mut().clear();
    }

    /// Encode and queue one message, sending immediately when possible
    pub fn send(&self, msg: &ClientMessage) -> Result<(), ChannelError> {
        let json = msg.to_json().map_err(|source| ChannelError::Encode {
            kind: kind(msg),
            source,
        })?;
        self.queue.borrow_mut().push_back((json, 0));
        self.flush();
        if self.state.get() == ConnectionState::Disconnected {
            return Err(ChannelError::NotOpen);
        }
        Ok(())
    }

    /// Flush all queued frames to the WebSocket
    pub fn flush(&self) {
        let ws_opt = self.ws.borrow();
        let ws = match ws_opt.as_ref() {
            Some(ws) if ws.ready_state() == WebSocket::OPEN => ws,
            _ => return,
        };

        let mut queue = self.queue.borrow_mut();
        let mut requeue: VecDeque<(String, u8)> = VecDeque::new();

        while let Some((json, retry_count)) = queue.pop_front() {
            match ws.send_with_str(&json) {
                Ok(()) => {
                    if self.send_failures.get() > 0 {
                        self.send_failures.set(0);
                        self.state.set(ConnectionState::Connected);
                        info!("channel send recovered");
                    }
                }
                Err(e) => {
                    self.send_failures.set(self.send_failures.get() + 1);
                    if self.send_failures.get() >= 3 {
                        self.state.set(ConnectionState::Degraded);
                    }
                    if retry_count < MAX_RETRIES {
                        warn!(
                            retry = retry_count + 1,
                            max = MAX_RETRIES,
                            backoff_ms = backoff_delay_ms(retry_count),
                            error = ?e,
                            "send failed"
                        );
                        requeue.push_back((json, retry_count + 1));
                    } else {
                        warn!(error = ?e, "dropping frame after {MAX_RETRIES} retries");
                    }
                }
            }
        }

        queue.extend(requeue);
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Default for OutboundChannel {
    fn default() -> Self {
        Self::new()
    }
}
