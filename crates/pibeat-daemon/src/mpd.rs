//! MPD client driver.
//!
//! Speaks the line protocol MPD serves on TCP: the server greets with
//! `OK MPD <version>`, each request is a single command line, and each
//! response is zero or more `key: value` lines terminated by `OK` (or an
//! `ACK [..] {..} message` line on rejection).  One command is in flight at
//! a time.  Every request runs under a deadline; a timeout or transport
//! error drops the connection and the next command reconnects.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use pibeat_core::status::{PlaybackState, Status, TrackInfo};

#[derive(Debug, Error)]
pub enum MpdError {
    #[error("mpd i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("mpd: not connected")]
    NotConnected,
    #[error("mpd: connection closed by server")]
    Closed,
    #[error("mpd: timed out waiting for response")]
    Timeout,
    #[error("mpd: unexpected protocol line {0:?}")]
    Protocol(String),
    #[error("mpd rejected command: {0}")]
    Server(String),
}

/// The slice of the player the controller drives.  `MpdClient` is the
/// production implementation; tests substitute their own.
#[async_trait]
pub trait Player {
    async fn status(&mut self) -> Result<Status, MpdError>;
    async fn current_track(&mut self) -> Result<TrackInfo, MpdError>;
    async fn play(&mut self) -> Result<(), MpdError>;
    async fn stop(&mut self) -> Result<(), MpdError>;
    async fn next(&mut self) -> Result<(), MpdError>;
    async fn previous(&mut self) -> Result<(), MpdError>;
    async fn set_volume(&mut self, volume: u8) -> Result<(), MpdError>;
    /// Best-effort goodbye; the connection is gone afterwards either way.
    async fn close(&mut self) -> Result<(), MpdError>;
}

pub struct MpdClient {
    addr: String,
    timeout: Duration,
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<OwnedWriteHalf>,
}

impl MpdClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            reader: None,
            writer: None,
        }
    }

    fn connected(&self) -> bool {
        self.writer.is_some()
    }

    fn disconnect(&mut self) {
        self.reader = None;
        self.writer = None;
    }

    /// Connects and consumes the server greeting.  Any previous connection
    /// is dropped first.
    pub async fn connect(&mut self) -> Result<(), MpdError> {
        self.disconnect();

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr.as_str()))
            .await
            .map_err(|_| MpdError::Timeout)??;
        let (r, w) = stream.into_split();
        let mut reader = BufReader::new(r);

        let mut line = String::new();
        match tokio::time::timeout(self.timeout, reader.read_line(&mut line)).await {
            Ok(Ok(0)) => return Err(MpdError::Closed),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(MpdError::Timeout),
        }
        let greeting = line.trim_end();
        if !greeting.starts_with("OK MPD") {
            return Err(MpdError::Protocol(greeting.to_string()));
        }

        info!("mpd: connected to {} ({})", self.addr, greeting);
        self.reader = Some(reader);
        self.writer = Some(w);
        Ok(())
    }

    /// Startup helper: MPD may still be coming up when we are launched at
    /// boot, so retry for a while before giving up.
    pub async fn connect_with_retry(&mut self, attempts: u32) -> Result<(), MpdError> {
        for attempt in 1..=attempts {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!(
                        "mpd: connect attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(MpdError::NotConnected)
    }

    async fn ensure_connected(&mut self) -> Result<(), MpdError> {
        if self.connected() {
            return Ok(());
        }
        self.connect().await
    }

    /// Sends one command and collects the `key: value` response pairs.
    ///
    /// An `ACK` leaves the connection usable; timeouts and transport
    /// errors drop it so the next command reconnects.
    async fn command(&mut self, command: &str) -> Result<Vec<(String, String)>, MpdError> {
        self.ensure_connected().await?;

        let timeout = self.timeout;
        let writer = self.writer.as_mut().ok_or(MpdError::NotConnected)?;
        let reader = self.reader.as_mut().ok_or(MpdError::NotConnected)?;

        debug!("mpd send: {}", command);
        let mut raw = command.to_string();
        raw.push('\n');
        if let Err(e) = writer.write_all(raw.as_bytes()).await {
            self.disconnect();
            return Err(e.into());
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut pairs = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                self.disconnect();
                return Err(MpdError::Timeout);
            }

            let mut line = String::new();
            match tokio::time::timeout(remaining, reader.read_line(&mut line)).await {
                Ok(Ok(0)) => {
                    self.disconnect();
                    return Err(MpdError::Closed);
                }
                Ok(Ok(_)) => {
                    let trimmed = line.trim_end();
                    if trimmed == "OK" {
                        return Ok(pairs);
                    }
                    if let Some(ack) = trimmed.strip_prefix("ACK ") {
                        return Err(MpdError::Server(ack.to_string()));
                    }
                    match trimmed.split_once(": ") {
                        Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
                        None => debug!("mpd: ignoring malformed line {:?}", trimmed),
                    }
                }
                Ok(Err(e)) => {
                    self.disconnect();
                    return Err(e.into());
                }
                Err(_) => {
                    self.disconnect();
                    return Err(MpdError::Timeout);
                }
            }
        }
    }
}

#[async_trait]
impl Player for MpdClient {
    async fn status(&mut self) -> Result<Status, MpdError> {
        let pairs = self.command("status").await?;
        Ok(parse_status(&pairs))
    }

    async fn current_track(&mut self) -> Result<TrackInfo, MpdError> {
        let pairs = self.command("currentsong").await?;
        Ok(parse_track(&pairs))
    }

    async fn play(&mut self) -> Result<(), MpdError> {
        self.command("play").await?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), MpdError> {
        self.command("stop").await?;
        Ok(())
    }

    async fn next(&mut self) -> Result<(), MpdError> {
        self.command("next").await?;
        Ok(())
    }

    async fn previous(&mut self) -> Result<(), MpdError> {
        self.command("previous").await?;
        Ok(())
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), MpdError> {
        self.command(&format!("setvol {}", volume)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), MpdError> {
        if let Some(writer) = self.writer.as_mut() {
            // MPD sends no reply to close, it just hangs up.
            let _ = writer.write_all(b"close\n").await;
            let _ = writer.shutdown().await;
        }
        self.disconnect();
        Ok(())
    }
}

fn parse_status(pairs: &[(String, String)]) -> Status {
    let mut status = Status::default();
    for (key, value) in pairs {
        match key.as_str() {
            "state" => status.state = PlaybackState::from_mpd(value),
            // MPD reports -1 when it has no mixer; clamp into range.
            "volume" => {
                if let Ok(v) = value.parse::<i64>() {
                    status.volume = v.clamp(0, 100) as u8;
                }
            }
            _ => {}
        }
    }
    status
}

fn parse_track(pairs: &[(String, String)]) -> TrackInfo {
    let mut track = TrackInfo::default();
    for (key, value) in pairs {
        match key.as_str() {
            "file" => track.file = Some(value.clone()),
            "Title" => track.title = Some(value.clone()),
            "Name" => track.name = Some(value.clone()),
            _ => {}
        }
    }
    track
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_status_maps_state_and_volume() {
        let status = parse_status(&pairs(&[
            ("volume", "40"),
            ("repeat", "0"),
            ("state", "play"),
            ("song", "2"),
        ]));
        assert_eq!(status.state, PlaybackState::Playing);
        assert_eq!(status.volume, 40);
    }

    #[test]
    fn test_parse_status_without_mixer_clamps_volume() {
        let status = parse_status(&pairs(&[("volume", "-1"), ("state", "stop")]));
        assert_eq!(status.state, PlaybackState::Stopped);
        assert_eq!(status.volume, 0);
    }

    #[test]
    fn test_parse_status_defaults_when_keys_missing() {
        let status = parse_status(&pairs(&[("repeat", "0")]));
        assert_eq!(status.state, PlaybackState::Unknown);
        assert_eq!(status.volume, 0);
    }

    #[test]
    fn test_parse_track_picks_tags() {
        let track = parse_track(&pairs(&[
            ("file", "http://stream.example/wfmu"),
            ("Title", "Night Music"),
            ("Name", "WFMU"),
            ("Pos", "0"),
        ]));
        assert_eq!(track.title.as_deref(), Some("Night Music"));
        assert_eq!(track.name.as_deref(), Some("WFMU"));
        assert_eq!(track.file.as_deref(), Some("http://stream.example/wfmu"));

        let track = parse_track(&[]);
        assert_eq!(track, TrackInfo::default());
    }
}
