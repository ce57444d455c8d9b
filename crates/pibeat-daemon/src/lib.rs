//! pibeat daemon — buttons in, MPD commands out, status on a serial
//! display.
//!
//! `controller` owns all mutable state and runs the select loop; `mpd`
//! drives the player over TCP; `display` decides what the serial screen
//! shows; `buttons` turns GPIO edges into events.

pub mod buttons;
pub mod controller;
pub mod display;
pub mod mpd;
