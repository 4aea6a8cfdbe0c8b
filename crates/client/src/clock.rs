//! Frame scheduling
//!
//! The host clock (`requestAnimationFrame` in the browser, a tokio interval
//! natively) calls [`FrameClock::tick`] with its timestamp and hands the
//! measured `dt` to a [`FrameCallback`]. Tests drive the same callback with a
//! fixed `dt` sequence through [`drive`].

/// Per-frame update registered with a host clock
pub trait FrameCallback {
    /// Advance by `dt` seconds of wall-clock time
    fn frame(&mut self, dt: f64);
}

/// Converts host timestamps (milliseconds) into frame deltas (seconds)
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
}

impl FrameClock {
    pub const fn new() -> Self {
        Self { last_ms: None }
    }

    /// Seconds since the previous tick; `0.0` on the first tick or when the
    /// host clock steps backwards
    pub fn tick(&mut self, now_ms: f64) -> f64 {
        let dt = self
            .last_ms
            .map_or(0.0, |last| ((now_ms - last) / 1000.0).max(0.0));
        self.last_ms = Some(now_ms);
        dt
    }

    /// Forget the previous timestamp, e.g. after the page was hidden
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

/// Run `callback` once per entry of a deterministic `dt` sequence
pub fn drive<C, I>(callback: &mut C, deltas: I)
where
    C: FrameCallback + ?Sized,
    I: IntoIterator<Item = f64>,
{
    for dt in deltas {
        callback.frame(dt);
    }
}
