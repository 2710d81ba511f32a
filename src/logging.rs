use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::models::Channel;

/// Environment variable selecting the log level
pub const LOG_LEVEL_ENV: &str = "SIMULISTEN_LOG_LEVEL";

/// Playback event kept for debugging and the `events` command
#[derive(Debug, Clone)]
pub struct PlaybackEvent {
    pub timestamp: DateTime<Utc>,
    pub channel: Channel,
    pub event_type: PlaybackEventType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEventType {
    TrackLoaded,
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    PlaybackFinished,
    SeekOperation,
    VolumeChanged,
    ResourceNotFound,
    DecodeFailed,
}

impl PlaybackEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackEventType::TrackLoaded => "TRACK_LOADED",
            PlaybackEventType::PlaybackStarted => "PLAYBACK_STARTED",
            PlaybackEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            PlaybackEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            PlaybackEventType::PlaybackFinished => "PLAYBACK_FINISHED",
            PlaybackEventType::SeekOperation => "SEEK_OPERATION",
            PlaybackEventType::VolumeChanged => "VOLUME_CHANGED",
            PlaybackEventType::ResourceNotFound => "RESOURCE_NOT_FOUND",
            PlaybackEventType::DecodeFailed => "DECODE_FAILED",
        }
    }
}

/// Logger for playback operations; clones share one event history
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<PlaybackEvent>>>,
    max_events: usize,
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioLogger {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: 1000,
        }
    }

    /// Initialize the global logger from `SIMULISTEN_LOG_LEVEL`
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });
        builder.filter_level(parse_level(&log_level));
        builder.try_init()?;

        info!("Simulisten logging initialized with level: {}", log_level);
        Ok(())
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<PlaybackEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an event and forward it to the `log` facade
    pub fn log_event(&self, channel: Channel, event_type: PlaybackEventType, details: String) {
        match event_type {
            PlaybackEventType::TrackLoaded
            | PlaybackEventType::PlaybackStarted
            | PlaybackEventType::PlaybackPaused
            | PlaybackEventType::PlaybackStopped
            | PlaybackEventType::PlaybackFinished => {
                info!("[{}] [{}] {}", event_type.as_str(), channel, details);
            }
            PlaybackEventType::SeekOperation | PlaybackEventType::VolumeChanged => {
                debug!("[{}] [{}] {}", event_type.as_str(), channel, details);
            }
            PlaybackEventType::ResourceNotFound => {
                warn!("[{}] [{}] {}", event_type.as_str(), channel, details);
            }
            PlaybackEventType::DecodeFailed => {
                error!("[{}] [{}] {}", event_type.as_str(), channel, details);
            }
        }

        let mut events = self.history();
        events.push_back(PlaybackEvent {
            timestamp: Utc::now(),
            channel,
            event_type,
            details,
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_track_loaded(&self, channel: Channel, name: &str, duration: f64) {
        self.log_event(
            channel,
            PlaybackEventType::TrackLoaded,
            format!("Loaded '{}' ({:.1}s)", name, duration),
        );
    }

    pub fn log_playback_started(&self, channel: Channel, position: f64) {
        self.log_event(
            channel,
            PlaybackEventType::PlaybackStarted,
            format!("Playback started at {:.2}s", position),
        );
    }

    pub fn log_playback_paused(&self, channel: Channel, position: f64) {
        self.log_event(
            channel,
            PlaybackEventType::PlaybackPaused,
            format!("Playback paused at {:.2}s", position),
        );
    }

    pub fn log_playback_stopped(&self, channel: Channel) {
        self.log_event(channel, PlaybackEventType::PlaybackStopped, "Playback stopped".to_string());
    }

    pub fn log_playback_finished(&self, channel: Channel) {
        self.log_event(
            channel,
            PlaybackEventType::PlaybackFinished,
            "Reached end of track".to_string(),
        );
    }

    pub fn log_seek_operation(&self, channel: Channel, from: f64, to: f64) {
        self.log_event(
            channel,
            PlaybackEventType::SeekOperation,
            format!("Seek from {:.2}s to {:.2}s", from, to),
        );
    }

    pub fn log_volume_changed(&self, channel: Channel, volume: f32) {
        self.log_event(
            channel,
            PlaybackEventType::VolumeChanged,
            format!("Volume set to {:.2}", volume),
        );
    }

    pub fn log_resource_not_found(&self, channel: Channel, name: &str) {
        self.log_event(
            channel,
            PlaybackEventType::ResourceNotFound,
            format!("Failed to find resource '{}'", name),
        );
    }

    pub fn log_decode_failed(&self, channel: Channel, name: &str, error: &str) {
        self.log_event(
            channel,
            PlaybackEventType::DecodeFailed,
            format!("Failed to open '{}': {}", name, error),
        );
    }

    /// Most recent events, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<PlaybackEvent> {
        let events = self.history();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn clear_events(&self) {
        self.history().clear();
    }

    pub fn get_event_statistics(&self) -> EventStatistics {
        let events = self.history();
        let mut stats = EventStatistics::default();

        for event in events.iter() {
            match event.event_type {
                PlaybackEventType::TrackLoaded => stats.tracks_loaded += 1,
                PlaybackEventType::SeekOperation => stats.seek_operations += 1,
                PlaybackEventType::ResourceNotFound => stats.missing_resources += 1,
                PlaybackEventType::DecodeFailed => stats.decode_failures += 1,
                _ => {}
            }
        }

        stats.total_events = events.len();
        stats
    }
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Statistics about logged events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStatistics {
    pub total_events: usize,
    pub tracks_loaded: usize,
    pub seek_operations: usize,
    pub missing_resources: usize,
    pub decode_failures: usize,
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: String) -> Self {
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            warn!(
                "Operation '{}' took {}ms (threshold: {}ms)",
                self.operation_name,
                duration.as_millis(),
                threshold.as_millis()
            );
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}
