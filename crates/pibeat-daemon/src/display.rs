//! Serial status display.
//!
//! `Screen` decides what the one-line display shows: the live song label
//! while playing, or a transient message (volume change, pause, station
//! name) that holds the screen for a fixed window before live status
//! resumes.  `SerialDisplay` is the hardware sink behind it, a UART at
//! 8N1 that takes newline-terminated UTF-8 text.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use pibeat_core::status::{PlaybackState, TrackInfo};

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("serial port: {0}")]
    Uart(#[from] rppal::uart::Error),
    #[error("display sink unavailable")]
    Unavailable,
}

/// Where display lines end up.  Production writes to the serial port;
/// tests record the lines instead.
#[async_trait]
pub trait DisplaySink {
    async fn write_line(&mut self, text: &str) -> Result<(), DisplayError>;
}

pub struct SerialDisplay {
    uart: rppal::uart::Uart,
}

impl SerialDisplay {
    pub fn open(device: &Path, baud_rate: u32) -> Result<Self, DisplayError> {
        let mut uart =
            rppal::uart::Uart::with_path(device, baud_rate, rppal::uart::Parity::None, 8, 1)?;
        uart.set_write_mode(true)?;
        Ok(Self { uart })
    }
}

#[async_trait]
impl DisplaySink for SerialDisplay {
    async fn write_line(&mut self, text: &str) -> Result<(), DisplayError> {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(b'\n');
        let mut rest = &bytes[..];
        while !rest.is_empty() {
            let written = self.uart.write(rest)?;
            if written == 0 {
                return Err(DisplayError::Unavailable);
            }
            rest = &rest[written..];
        }
        Ok(())
    }
}

/// Display state machine.
///
/// Owns what was last written so identical consecutive lines are written
/// only once, and the hold window during which live status stays off the
/// screen.  Sink failures are non-fatal: first failure of an episode is
/// logged at warn, the rest at debug until a write goes through again.
pub struct Screen<D: DisplaySink> {
    sink: D,
    hold: Duration,
    hold_until: Option<Instant>,
    last_line: Option<String>,
    write_fault: bool,
}

impl<D: DisplaySink> Screen<D> {
    pub fn new(sink: D, hold: Duration) -> Self {
        Self {
            sink,
            hold,
            hold_until: None,
            last_line: None,
            write_fault: false,
        }
    }

    /// One pass of the display decision.  Called on every loop tick,
    /// whether or not anything changed.
    pub async fn tick(&mut self, state: PlaybackState, track: &TrackInfo) {
        if let Some(until) = self.hold_until {
            if Instant::now() < until {
                return;
            }
            // Hold lapsed: the next render is unconditional, even if the
            // song line equals what was on screen before the message.
            self.hold_until = None;
            self.last_line = None;
        }

        if !state.is_playing() {
            return;
        }

        let line = track.song_label();
        if self.last_line.as_deref() == Some(line.as_str()) {
            return;
        }
        if self.write(&line).await {
            self.last_line = Some(line);
        }
    }

    /// Writes `text` immediately and keeps live status off the screen for
    /// the configured hold window.  A second message replaces the first
    /// and restarts the window.
    pub async fn show_message(&mut self, text: &str) {
        self.write(text).await;
        self.hold_until = Some(Instant::now() + self.hold);
    }

    async fn write(&mut self, text: &str) -> bool {
        match self.sink.write_line(text).await {
            Ok(()) => {
                self.write_fault = false;
                true
            }
            Err(e) => {
                if self.write_fault {
                    debug!("display: write still failing: {}", e);
                } else {
                    warn!("display: write failed: {}", e);
                    self.write_fault = true;
                }
                false
            }
        }
    }
}

/// Recording sink for tests.  The test keeps a clone; every line the
/// screen writes shows up in the shared log.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct MemorySink {
    lines: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    fail: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl MemorySink {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub(crate) fn set_fail(&self, fail: bool) {
        self.fail
            .store(fail, std::sync::atomic::Ordering::Relaxed);
    }
}

#[cfg(test)]
#[async_trait]
impl DisplaySink for MemorySink {
    async fn write_line(&mut self, text: &str) -> Result<(), DisplayError> {
        if self.fail.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(DisplayError::Unavailable);
        }
        self.lines.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn track(title: &str) -> TrackInfo {
        TrackInfo {
            title: Some(title.to_string()),
            name: None,
            file: None,
        }
    }

    fn screen_with_sink() -> (MemorySink, Screen<MemorySink>) {
        let sink = MemorySink::default();
        let screen = Screen::new(sink.clone(), Duration::from_secs(30));
        (sink, screen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_writes_changed_lines_once() {
        let (sink, mut screen) = screen_with_sink();
        let a = track("A");

        screen.tick(PlaybackState::Playing, &a).await;
        screen.tick(PlaybackState::Playing, &a).await;
        screen.tick(PlaybackState::Playing, &a).await;
        assert_eq!(sink.lines(), vec!["A"]);

        let b = track("B");
        screen.tick(PlaybackState::Playing, &b).await;
        screen.tick(PlaybackState::Playing, &b).await;
        assert_eq!(sink.lines(), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_leaves_display_alone_while_stopped() {
        let (sink, mut screen) = screen_with_sink();
        screen.tick(PlaybackState::Stopped, &track("A")).await;
        screen.tick(PlaybackState::Unknown, &track("A")).await;
        assert!(sink.lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_suppresses_live_status_until_expiry() {
        let (sink, mut screen) = screen_with_sink();

        screen.show_message("Volume 45").await;
        assert_eq!(sink.lines(), vec!["Volume 45"]);

        // Track changes during the hold stay off the screen.
        advance(Duration::from_secs(10)).await;
        screen.tick(PlaybackState::Playing, &track("B")).await;
        advance(Duration::from_secs(19)).await;
        screen.tick(PlaybackState::Playing, &track("C")).await;
        assert_eq!(sink.lines(), vec!["Volume 45"]);

        advance(Duration::from_secs(2)).await;
        screen.tick(PlaybackState::Playing, &track("C")).await;
        assert_eq!(sink.lines(), vec!["Volume 45", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_hold_forces_redraw_of_identical_text() {
        let (sink, mut screen) = screen_with_sink();
        let a = track("A");

        screen.tick(PlaybackState::Playing, &a).await;
        screen.show_message("Paused").await;
        advance(Duration::from_secs(31)).await;

        screen.tick(PlaybackState::Playing, &a).await;
        assert_eq!(sink.lines(), vec!["A", "Paused", "A"]);

        // Idempotence resumes after the forced redraw.
        screen.tick(PlaybackState::Playing, &a).await;
        assert_eq!(sink.lines(), vec!["A", "Paused", "A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_message_restarts_the_hold() {
        let (sink, mut screen) = screen_with_sink();

        screen.show_message("Volume 50").await;
        advance(Duration::from_secs(20)).await;
        screen.show_message("Volume 55").await;

        // 29s after the second message the hold is still on.
        advance(Duration::from_secs(29)).await;
        screen.tick(PlaybackState::Playing, &track("A")).await;
        assert_eq!(sink.lines(), vec!["Volume 50", "Volume 55"]);

        advance(Duration::from_secs(2)).await;
        screen.tick(PlaybackState::Playing, &track("A")).await;
        assert_eq!(sink.lines(), vec!["Volume 50", "Volume 55", "A"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_retries_on_next_tick() {
        let (sink, mut screen) = screen_with_sink();
        let a = track("A");

        sink.set_fail(true);
        screen.tick(PlaybackState::Playing, &a).await;
        assert!(sink.lines().is_empty());

        sink.set_fail(false);
        screen.tick(PlaybackState::Playing, &a).await;
        assert_eq!(sink.lines(), vec!["A"]);
    }
}
