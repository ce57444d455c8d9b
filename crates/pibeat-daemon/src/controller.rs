//! Controller — single-owner loop for all mutable state.
//!
//! Owns the player client, the status cache, and the screen exclusively.
//! Button events arrive on one mpsc channel and are handled to completion
//! one at a time; the same loop ticks the display and periodically
//! re-syncs the cache, so no handler ever interleaves with a tick or with
//! another handler.  No locks anywhere.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use pibeat_core::event::ButtonEvent;
use pibeat_core::status::{volume_step_down, volume_step_up, PlaybackState, TrackInfo};

use crate::display::{DisplaySink, Screen};
use crate::mpd::{MpdError, Player};

/// How often the display decision re-runs.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// How often the cache re-syncs without a button press.  A track that
/// ends or renames itself server-side reaches the display within this
/// plus one tick.
const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Last fetched player state.  A failed refresh leaves the previous
/// snapshot in place, so the display keeps showing the last known track.
#[derive(Debug, Default)]
pub struct StatusCache {
    pub playback: PlaybackState,
    pub volume: u8,
    pub track: TrackInfo,
}

pub struct Controller<P: Player, D: DisplaySink> {
    player: P,
    screen: Screen<D>,
    cache: StatusCache,
    shutdown: bool,
}

impl<P: Player, D: DisplaySink> Controller<P, D> {
    /// Builds the controller and primes the cache.  A player that cannot
    /// answer `status` at startup aborts the daemon.
    pub async fn new(player: P, screen: Screen<D>) -> Result<Self, MpdError> {
        let mut controller = Self {
            player,
            screen,
            cache: StatusCache::default(),
            shutdown: false,
        };
        controller.sync_cache().await?;
        Ok(controller)
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<ButtonEvent>) -> anyhow::Result<()> {
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh = tokio::time::interval(REFRESH_INTERVAL);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("controller: running");
        while !self.shutdown {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_button(event).await,
                    None => {
                        warn!("controller: button channel closed, shutting down");
                        self.shutdown = true;
                    }
                },
                _ = tick.tick() => {
                    self.screen.tick(self.cache.playback, &self.cache.track).await;
                }
                _ = refresh.tick() => {
                    self.refresh_status().await;
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    async fn handle_button(&mut self, event: ButtonEvent) {
        info!("controller: {} button pressed", event.label());
        match event {
            ButtonEvent::Forward => self.next_station().await,
            ButtonEvent::Rewind => self.previous_station().await,
            ButtonEvent::PlayToggle => self.toggle_play().await,
            ButtonEvent::VolumeUp => self.volume_up().await,
            ButtonEvent::VolumeDown => self.volume_down().await,
            ButtonEvent::Power => self.request_shutdown(),
        }
    }

    /// Fetches status and current track, then replaces the cache in one
    /// go.  Nothing is replaced if either fetch fails.
    async fn sync_cache(&mut self) -> Result<(), MpdError> {
        let status = self.player.status().await?;
        let track = self.player.current_track().await?;
        debug!(
            "controller: state={:?} volume={} track={:?}",
            status.state, status.volume, track
        );
        self.cache.playback = status.state;
        self.cache.volume = status.volume;
        self.cache.track = track;
        Ok(())
    }

    /// Refresh that tolerates an unavailable player: the previous snapshot
    /// stays, and the caller learns whether the cache is fresh.
    async fn refresh_status(&mut self) -> bool {
        match self.sync_cache().await {
            Ok(()) => true,
            Err(e) => {
                warn!("controller: status refresh failed: {}", e);
                false
            }
        }
    }

    async fn volume_up(&mut self) {
        let Some(target) = volume_step_up(self.cache.volume) else {
            debug!("controller: volume already at maximum");
            return;
        };
        self.apply_volume(target).await;
    }

    async fn volume_down(&mut self) {
        let Some(target) = volume_step_down(self.cache.volume) else {
            debug!("controller: volume already at zero");
            return;
        };
        self.apply_volume(target).await;
    }

    async fn apply_volume(&mut self, target: u8) {
        if let Err(e) = self.player.set_volume(target).await {
            warn!("controller: setvol {} failed: {}", target, e);
            return;
        }
        self.refresh_status().await;
        self.screen.show_message(&format!("Volume {}", target)).await;
    }

    async fn toggle_play(&mut self) {
        if self.cache.playback.is_playing() {
            if let Err(e) = self.player.stop().await {
                warn!("controller: stop failed: {}", e);
                return;
            }
            self.refresh_status().await;
            self.screen.show_message("Paused").await;
        } else {
            if let Err(e) = self.player.play().await {
                warn!("controller: play failed: {}", e);
                return;
            }
            self.refresh_status().await;
        }
    }

    async fn next_station(&mut self) {
        if let Err(e) = self.player.next().await {
            warn!("controller: next failed: {}", e);
            return;
        }
        self.announce_station().await;
    }

    async fn previous_station(&mut self) {
        if let Err(e) = self.player.previous().await {
            warn!("controller: previous failed: {}", e);
            return;
        }
        self.announce_station().await;
    }

    /// The station name comes from the refreshed cache.  Without fresh
    /// data the message is skipped rather than naming the old station.
    async fn announce_station(&mut self) {
        if !self.refresh_status().await {
            return;
        }
        let station = self.cache.track.station_label();
        self.screen.show_message(&station).await;
    }

    fn request_shutdown(&mut self) {
        info!("controller: shutdown requested");
        self.shutdown = true;
    }

    /// Best-effort teardown: stop playback, say goodbye to MPD.  Failures
    /// are logged and never keep the process from exiting cleanly.
    async fn cleanup(&mut self) {
        info!("controller: stopping playback and closing the player connection");
        if let Err(e) = self.player.stop().await {
            warn!("controller: stop during shutdown failed: {}", e);
        }
        if let Err(e) = self.player.close().await {
            warn!("controller: close during shutdown failed: {}", e);
        }
    }
}
