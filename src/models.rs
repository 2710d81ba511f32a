use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two independent playback slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Learning audio (audiobooks, lectures)
    Book,
    /// Background music
    Music,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Book, Channel::Music];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Book => "book",
            Channel::Music => "music",
        }
    }

    /// Heading used by the status display
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Book => "Learning",
            Channel::Music => "Music",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "book" | "learning" | "b" => Ok(Channel::Book),
            "music" | "m" => Ok(Channel::Music),
            other => Err(format!("unknown channel '{}' (expected book or music)", other)),
        }
    }
}

/// Transport state of a loaded track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }
}

/// Observable state of a single channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    /// `None` while the channel has no resource loaded
    pub state: Option<PlaybackState>,
    /// Name the loaded track was requested with
    pub track: Option<String>,
}

impl ChannelStatus {
    pub fn empty(volume: f32) -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            volume,
            state: None,
            track: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Progress through the track (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Observable state of both channels at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub book: ChannelStatus,
    pub music: ChannelStatus,
}

impl PlayerSnapshot {
    pub fn channel(&self, channel: Channel) -> &ChannelStatus {
        match channel {
            Channel::Book => &self.book,
            Channel::Music => &self.music,
        }
    }
}

/// Human readable track name: drops a `.mp3` suffix and capitalises the first letter
pub fn display_name(name: &str) -> String {
    let base = name.trim_matches('/');
    let base = base.rsplit('/').next().unwrap_or(base);
    let base = base.strip_suffix(".mp3").unwrap_or(base);

    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// File stem of a track name: `"Learning/book1.mp3"` is `"book1"`
pub fn track_stem(name: &str) -> &str {
    let base = name.trim_matches('/');
    let base = base.rsplit('/').next().unwrap_or(base);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    }
}

/// Clamp a volume into `[0, 1]`; NaN becomes silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_parse() {
        assert_eq!("book".parse::<Channel>().unwrap(), Channel::Book);
        assert_eq!("Music".parse::<Channel>().unwrap(), Channel::Music);
        assert_eq!("learning".parse::<Channel>().unwrap(), Channel::Book);
        assert!("drums".parse::<Channel>().is_err());
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(Channel::Book.to_string(), "book");
        assert_eq!(Channel::Music.label(), "Music");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("book3.mp3"), "Book3");
        assert_eq!(display_name("book17"), "Book17");
        assert_eq!(display_name("Learning/Audiobooks/book1.mp3"), "Book1");
        assert_eq!(display_name("music.flac"), "Music.flac");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn test_track_stem() {
        assert_eq!(track_stem("book3.mp3"), "book3");
        assert_eq!(track_stem("book3"), "book3");
        assert_eq!(track_stem("/Learning/Audiobooks/book1.mp3/"), "book1");
        assert_eq!(track_stem("Music/Calm Piano.m4a"), "Calm Piano");
        assert_eq!(track_stem(".hidden"), ".hidden");
    }

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(0.4), 0.4);
        assert_eq!(clamp_volume(-3.0), 0.0);
        assert_eq!(clamp_volume(7.5), 1.0);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
        assert_eq!(clamp_volume(f32::INFINITY), 1.0);
    }

    #[test]
    fn test_channel_status_progress() {
        let mut status = ChannelStatus::empty(1.0);
        assert_eq!(status.progress(), 0.0);
        assert!(!status.is_loaded());

        status.duration = 40.0;
        status.current_time = 10.0;
        status.state = Some(PlaybackState::Paused);
        assert_eq!(status.progress(), 0.25);
        assert!(status.is_loaded());
    }
}
