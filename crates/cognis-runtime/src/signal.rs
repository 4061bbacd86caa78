//! Power-save signal delivered over a tokio channel.

use tokio::sync::mpsc;

use cognis_core::{PowerMode, PowerSaveSignal};

/// Forwards power mode changes to a scheduler task.
///
/// Sending never blocks; if the receiver is gone the change is dropped.
#[derive(Debug, Clone)]
pub struct ChannelPowerSignal {
    sender: mpsc::UnboundedSender<PowerMode>,
}

impl ChannelPowerSignal {
    /// Create a signal and the receiver the scheduler listens on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PowerMode>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PowerSaveSignal for ChannelPowerSignal {
    fn notify(&self, mode: PowerMode) {
        if self.sender.send(mode).is_err() {
            tracing::debug!(mode = ?mode, "Power mode change dropped, no listener");
        }
    }
}
