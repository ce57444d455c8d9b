//! Playback state, track labelling, and volume stepping rules.

/// Volume moves in fixed steps and clamps exactly onto the boundaries,
/// so 97 steps up to 100, never 102.
pub const VOLUME_STEP: u8 = 5;
pub const VOLUME_MAX: u8 = 100;

/// Playback state as reported by the player.
///
/// MPD distinguishes `pause` from `stop`, but the controller treats both
/// as "not playing": the display only shows live track info while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Playing,
    Stopped,
    /// Not yet fetched, or the player reported something unrecognised.
    #[default]
    Unknown,
}

impl PlaybackState {
    /// Maps the `state:` value from an MPD `status` response.
    pub fn from_mpd(value: &str) -> Self {
        match value {
            "play" => PlaybackState::Playing,
            "stop" | "pause" => PlaybackState::Stopped,
            _ => PlaybackState::Unknown,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// Snapshot of the player's `status` response: state plus mixer volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub state: PlaybackState,
    /// Mixer volume in [0, 100].
    pub volume: u8,
}

/// Current-track metadata from the player.
///
/// Internet radio streams usually carry a stream `name` and a rolling
/// `title`; local files carry a `title` tag; the `file` URI is always
/// present while something is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub name: Option<String>,
    pub file: Option<String>,
}

impl TrackInfo {
    /// Now-playing text: title, else stream name, else the file's
    /// basename, else "Unknown".
    pub fn song_label(&self) -> String {
        non_empty(&self.title)
            .or_else(|| non_empty(&self.name))
            .map(str::to_string)
            .or_else(|| self.file_basename())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Station identity shown after switching stations: stream name, else
    /// the file's basename, else "Unknown".  Deliberately skips the title,
    /// which names the track currently on air rather than the station.
    pub fn station_label(&self) -> String {
        non_empty(&self.name)
            .map(str::to_string)
            .or_else(|| self.file_basename())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    // Last path segment of the file URI.  Split on '/' rather than going
    // through Path so that a URL ending in '/' yields nothing instead of
    // the host component.
    fn file_basename(&self) -> Option<String> {
        let file = non_empty(&self.file)?;
        let base = file.rsplit('/').next().unwrap_or("");
        if base.is_empty() {
            None
        } else {
            Some(base.to_string())
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Next volume when stepping up, or `None` when already at the maximum
/// (the caller then skips the remote call entirely).
pub fn volume_step_up(volume: u8) -> Option<u8> {
    if volume >= VOLUME_MAX {
        return None;
    }
    Some(volume.saturating_add(VOLUME_STEP).min(VOLUME_MAX))
}

/// Next volume when stepping down, or `None` when already at zero.
pub fn volume_step_down(volume: u8) -> Option<u8> {
    if volume == 0 {
        return None;
    }
    Some(volume.saturating_sub(VOLUME_STEP))
}
