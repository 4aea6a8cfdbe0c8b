use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::farm::FarmState;

/// How the server paces a script run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Server waits for an `ack` after every event
    AutoStep,
    /// Server executes one instruction per `step`
    ManualStep,
}

/// Messages sent by the client over `/ws/run`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begin a new script session
    Start { mode: ExecMode, code: String },
    /// Acknowledge an auto-step event, permitting the next step
    Ack,
    /// Request exactly one manual step
    Step,
    /// Cancel the current session
    Abort,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Effect of one executed script instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEvent {
    /// 1-based program line
    pub line: u32,
    pub x: i64,
    pub y: i64,
    /// Gold total after the instruction
    pub gold: i64,
}

/// Summary reported when an auto-step script finishes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptResult {
    pub cost: f64,
    pub gain: f64,
    pub roi: f64,
    pub best_roi: f64,
    pub new_record: bool,
}

/// Messages sent by the server over `/ws/run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Event {
        event: ExecEvent,
    },
    /// Full snapshot replacing the cached farm
    FarmState {
        farm: FarmState,
    },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ScriptResult>,
    },
    /// Advisory notice from the server
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
}

const SERVER_TYPES: &[&str] = &["event", "farm_state", "done", "error"];

impl ServerMessage {
    /// Decode one text frame
    ///
    /// Distinguishes a missing or unknown `type` tag from a known tag whose
    /// payload has the wrong shape, so callers can report the difference.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !SERVER_TYPES.contains(&tag) {
            return Err(ProtocolError::UnknownType(tag.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Short name used in logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::FarmState { .. } => "farm_state",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
