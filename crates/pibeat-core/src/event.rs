//! Button events flowing from the GPIO layer into the controller.

/// One physical button press, already debounced by the input layer.
///
/// All six buttons funnel through a single channel into the controller
/// loop, which dispatches them one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    /// Next station.
    Forward,
    /// Previous station.
    Rewind,
    /// Toggle between playing and stopped.
    PlayToggle,
    VolumeUp,
    VolumeDown,
    /// Request a clean shutdown of the controller.
    Power,
}

impl ButtonEvent {
    /// Human-readable name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            ButtonEvent::Forward => "forward",
            ButtonEvent::Rewind => "rewind",
            ButtonEvent::PlayToggle => "play",
            ButtonEvent::VolumeUp => "volume up",
            ButtonEvent::VolumeDown => "volume down",
            ButtonEvent::Power => "power",
        }
    }
}
