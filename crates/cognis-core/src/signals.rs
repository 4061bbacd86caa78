//! Power-save signalling toward the heartbeat scheduler.

use serde::{Deserialize, Serialize};

/// Operating mode announced to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    /// Normal heartbeat cadence
    Normal,

    /// Lengthened heartbeat while cognition is unavailable
    PowerSave,
}

/// Fire-and-forget receiver of power mode changes.
///
/// Implementations must not block; delivery failures are ignored.
pub trait PowerSaveSignal: Send + Sync {
    fn notify(&self, mode: PowerMode);
}

/// Signal that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSignal;

impl PowerSaveSignal for NoopSignal {
    fn notify(&self, _mode: PowerMode) {}
}
