//! GPIO button input.
//!
//! The six pHAT BEAT buttons sit on fixed BCM pins wired as pull-up
//! inputs; a press pulls the pin low.  Each debounced falling edge fires
//! the matching `ButtonEvent` into the controller's channel from the
//! interrupt thread.

use rppal::gpio::{Gpio, InputPin, Trigger};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use pibeat_core::event::ButtonEvent;

// pHAT BEAT wiring, BCM numbering.
const BINDINGS: [(u8, ButtonEvent); 6] = [
    (5, ButtonEvent::Forward),
    (13, ButtonEvent::Rewind),
    (6, ButtonEvent::PlayToggle),
    (16, ButtonEvent::VolumeUp),
    (26, ButtonEvent::VolumeDown),
    (12, ButtonEvent::Power),
];

const DEBOUNCE: Duration = Duration::from_millis(25);

/// Owns the configured pins.  Dropping the watcher unhooks the
/// interrupts, so it has to outlive the controller loop.
pub struct ButtonWatcher {
    _pins: Vec<InputPin>,
}

impl ButtonWatcher {
    pub fn bind(tx: mpsc::Sender<ButtonEvent>) -> anyhow::Result<Self> {
        let gpio = Gpio::new()?;
        let mut pins = Vec::with_capacity(BINDINGS.len());
        for (bcm, event) in BINDINGS {
            let mut pin = gpio.get(bcm)?.into_input_pullup();
            let tx = tx.clone();
            pin.set_async_interrupt(Trigger::FallingEdge, Some(DEBOUNCE), move |_| {
                // Interrupt callbacks run on rppal's own thread; a full
                // channel delays the press, a closed one means the
                // controller is already gone.
                if tx.blocking_send(event).is_err() {
                    debug!("buttons: dropped {} press, channel closed", event.label());
                }
            })?;
            pins.push(pin);
        }
        info!("buttons: {} GPIO pins bound", pins.len());
        Ok(Self { _pins: pins })
    }
}
