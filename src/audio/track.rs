use log::{debug, warn};

use crate::audio::{MediaBackend, MediaPlayer, ResourceRef};
use crate::error::DecodeError;
use crate::logging::AudioLogger;
use crate::models::{clamp_volume, Channel, ChannelStatus, PlaybackState};

/// What a track slot currently holds
enum Slot {
    Empty,
    Loaded {
        player: Box<dyn MediaPlayer>,
        resource: ResourceRef,
        state: PlaybackState,
    },
}

/// Owns at most one opened resource for a channel and the channel's
/// observable time, duration and volume.
///
/// Every transport command is a no-op while the slot is empty.
pub struct TrackPlayer {
    channel: Channel,
    slot: Slot,
    current_time: f64,
    duration: f64,
    volume: f32,
    logger: AudioLogger,
}

impl TrackPlayer {
    pub fn new(channel: Channel, volume: f32, logger: AudioLogger) -> Self {
        Self {
            channel,
            slot: Slot::Empty,
            current_time: 0.0,
            duration: 0.0,
            volume: clamp_volume(volume),
            logger,
        }
    }

    /// Replace the loaded resource. The previous one is stopped and dropped
    /// before the new one is opened; on failure the slot stays empty.
    pub fn load(
        &mut self,
        backend: &dyn MediaBackend,
        resource: ResourceRef,
    ) -> Result<f64, DecodeError> {
        self.begin_load();
        let opened = backend.open(&resource);
        self.finish_load(resource, opened)
    }

    /// First half of a load: stop and release the current resource
    pub fn begin_load(&mut self) {
        self.unload();
    }

    /// Second half of a load: install what the backend opened, or record
    /// the failure and leave the slot empty
    pub fn finish_load(
        &mut self,
        resource: ResourceRef,
        opened: Result<Box<dyn MediaPlayer>, DecodeError>,
    ) -> Result<f64, DecodeError> {
        // a load that finished in between is replaced as well
        self.unload();

        let mut player = match opened {
            Ok(player) => player,
            Err(e) => {
                self.logger
                    .log_decode_failed(self.channel, &resource.name, &e.to_string());
                return Err(e);
            }
        };

        player.set_volume(self.volume);
        let duration = sanitize_seconds(player.duration());
        self.duration = duration;
        self.current_time = 0.0;
        self.logger.log_track_loaded(self.channel, &resource.name, duration);
        self.slot = Slot::Loaded {
            player,
            resource,
            state: PlaybackState::Stopped,
        };

        Ok(duration)
    }

    fn unload(&mut self) {
        if let Slot::Loaded { mut player, resource, state } =
            std::mem::replace(&mut self.slot, Slot::Empty)
        {
            if state != PlaybackState::Stopped {
                player.stop();
            }
            debug!("[{}] Released '{}'", self.channel, resource.name);
        }
        self.current_time = 0.0;
        self.duration = 0.0;
    }

    pub fn play(&mut self) {
        self.detect_finished();
        if let Slot::Loaded { player, state, .. } = &mut self.slot {
            if *state != PlaybackState::Playing {
                player.play();
                *state = PlaybackState::Playing;
                self.logger.log_playback_started(self.channel, self.current_time);
            }
        }
    }

    pub fn pause(&mut self) {
        self.detect_finished();
        if let Slot::Loaded { player, state, .. } = &mut self.slot {
            if *state == PlaybackState::Playing {
                player.pause();
                *state = PlaybackState::Paused;
                self.current_time = sanitize_seconds(player.position()).min(self.duration);
                self.logger.log_playback_paused(self.channel, self.current_time);
            }
        }
    }

    /// Halt and rewind. The observable time is 0 afterwards even when empty.
    pub fn stop(&mut self) {
        if let Slot::Loaded { player, state, .. } = &mut self.slot {
            player.stop();
            player.set_position(0.0);
            if *state != PlaybackState::Stopped {
                *state = PlaybackState::Stopped;
                self.logger.log_playback_stopped(self.channel);
            }
        }
        self.current_time = 0.0;
    }

    /// Clamp into `[0, duration]` and apply immediately. Ignored while empty.
    pub fn seek(&mut self, seconds: f64) {
        if let Slot::Loaded { player, .. } = &mut self.slot {
            let target = if seconds.is_nan() {
                warn!("Ignoring NaN seek target");
                0.0
            } else {
                seconds.clamp(0.0, self.duration)
            };
            player.set_position(target);
            self.logger.log_seek_operation(self.channel, self.current_time, target);
            self.current_time = target;
        }
    }

    /// Clamp into `[0, 1]`; kept for the next resource loaded into this slot
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
        if let Slot::Loaded { player, .. } = &mut self.slot {
            player.set_volume(self.volume);
        }
        self.logger.log_volume_changed(self.channel, self.volume);
    }

    /// Live `(position, duration)` of the loaded resource
    pub fn query_position(&self) -> Option<(f64, f64)> {
        match &self.slot {
            Slot::Loaded { player, .. } => Some((player.position(), player.duration())),
            Slot::Empty => None,
        }
    }

    /// Pull the player's live position into the observable state.
    /// Returns false when the slot is empty and nothing changed.
    pub fn refresh(&mut self) -> bool {
        let Some((position, duration)) = self.query_position() else {
            return false;
        };

        self.duration = sanitize_seconds(duration);
        self.current_time = sanitize_seconds(position).min(self.duration);
        self.detect_finished();
        true
    }

    /// Notice a player that ran off the end since the last look
    fn detect_finished(&mut self) {
        if let Slot::Loaded { player, state, .. } = &mut self.slot {
            if *state == PlaybackState::Playing && !player.is_playing() {
                *state = PlaybackState::Stopped;
                self.current_time = sanitize_seconds(player.position()).min(self.duration);
                self.logger.log_playback_finished(self.channel);
            }
        }
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn state(&self) -> Option<PlaybackState> {
        match &self.slot {
            Slot::Loaded { state, .. } => Some(*state),
            Slot::Empty => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.slot, Slot::Loaded { .. })
    }

    pub fn status(&self) -> ChannelStatus {
        let track = match &self.slot {
            Slot::Loaded { resource, .. } => Some(resource.name.clone()),
            Slot::Empty => None,
        };

        ChannelStatus {
            current_time: self.current_time,
            duration: self.duration,
            volume: self.volume,
            state: self.state(),
            track,
        }
    }
}

impl Drop for TrackPlayer {
    fn drop(&mut self) {
        if self.is_loaded() {
            self.unload();
        }
    }
}

/// Non-negative and finite, or 0
fn sanitize_seconds(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        if seconds.is_nan() {
            warn!("Ignoring NaN time value");
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tests::ScriptedBackend;
    use std::path::PathBuf;

    fn resource(name: &str) -> ResourceRef {
        ResourceRef {
            name: name.to_string(),
            path: PathBuf::from(format!("/bundle/{}.mp3", name)),
        }
    }

    fn loaded(backend: &ScriptedBackend, name: &str) -> TrackPlayer {
        let mut track = TrackPlayer::new(Channel::Book, 1.0, AudioLogger::new());
        track.load(backend, resource(name)).unwrap();
        track
    }

    #[test]
    fn test_new_track_is_empty() {
        let track = TrackPlayer::new(Channel::Music, 0.5, AudioLogger::new());
        assert!(!track.is_loaded());
        assert_eq!(track.state(), None);
        assert_eq!(track.duration(), 0.0);
        assert_eq!(track.current_time(), 0.0);
        assert_eq!(track.volume(), 0.5);
        assert_eq!(track.query_position(), None);
    }

    #[test]
    fn test_load_publishes_duration() {
        let backend = ScriptedBackend::new().with_track("book1", 30.0);
        let mut track = TrackPlayer::new(Channel::Book, 0.3, AudioLogger::new());

        assert_eq!(track.load(&backend, resource("book1")).unwrap(), 30.0);
        assert_eq!(track.duration(), 30.0);
        assert_eq!(track.state(), Some(PlaybackState::Stopped));
        assert_eq!(backend.handle("book1").volume(), 0.3);
    }

    #[test]
    fn test_failed_load_empties_slot() {
        let backend = ScriptedBackend::new()
            .with_track("book1", 30.0)
            .with_broken("corrupt");
        let mut track = loaded(&backend, "book1");
        track.seek(12.0);

        assert!(track.load(&backend, resource("corrupt")).is_err());
        assert!(!track.is_loaded());
        assert_eq!(track.duration(), 0.0);
        assert_eq!(track.current_time(), 0.0);
    }

    #[test]
    fn test_transport_transitions() {
        let backend = ScriptedBackend::new().with_track("book1", 30.0);
        let mut track = loaded(&backend, "book1");
        let handle = backend.handle("book1");

        track.play();
        assert_eq!(track.state(), Some(PlaybackState::Playing));
        assert!(handle.is_playing());

        handle.advance(4.0);
        track.pause();
        assert_eq!(track.state(), Some(PlaybackState::Paused));
        assert_eq!(track.current_time(), 4.0);

        // pause while paused does nothing
        track.pause();
        assert_eq!(handle.pause_calls(), 1);

        track.play();
        track.stop();
        assert_eq!(track.state(), Some(PlaybackState::Stopped));
        assert_eq!(track.current_time(), 0.0);
        assert_eq!(handle.position(), 0.0);
    }

    #[test]
    fn test_commands_on_empty_track_are_noops() {
        let mut track = TrackPlayer::new(Channel::Book, 1.0, AudioLogger::new());
        track.play();
        track.pause();
        track.seek(10.0);
        track.stop();

        assert!(!track.is_loaded());
        assert_eq!(track.current_time(), 0.0);
        assert!(!track.refresh());
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let backend = ScriptedBackend::new().with_track("book1", 30.0);
        let mut track = loaded(&backend, "book1");

        track.seek(45.0);
        assert_eq!(track.current_time(), 30.0);
        assert_eq!(backend.handle("book1").position(), 30.0);

        track.seek(-5.0);
        assert_eq!(track.current_time(), 0.0);

        track.seek(f64::NAN);
        assert_eq!(track.current_time(), 0.0);

        track.seek(f64::INFINITY);
        assert_eq!(track.current_time(), 30.0);

        track.seek(f64::NEG_INFINITY);
        assert_eq!(track.current_time(), 0.0);

        track.seek(12.5);
        assert_eq!(track.current_time(), 12.5);
    }

    #[test]
    fn test_volume_persists_across_loads() {
        let backend = ScriptedBackend::new()
            .with_track("music1", 10.0)
            .with_track("music2", 20.0);
        let mut track = TrackPlayer::new(Channel::Music, 1.0, AudioLogger::new());

        track.set_volume(1.7);
        assert_eq!(track.volume(), 1.0);
        track.set_volume(0.25);
        track.load(&backend, resource("music1")).unwrap();
        assert_eq!(backend.handle("music1").volume(), 0.25);

        track.set_volume(-2.0);
        assert_eq!(backend.handle("music1").volume(), 0.0);
        track.load(&backend, resource("music2")).unwrap();
        assert_eq!(backend.handle("music2").volume(), 0.0);
    }

    #[test]
    fn test_reload_stops_previous_resource() {
        let backend = ScriptedBackend::new()
            .with_track("music1", 10.0)
            .with_track("music2", 20.0);
        let mut track = TrackPlayer::new(Channel::Music, 1.0, AudioLogger::new());
        track.load(&backend, resource("music1")).unwrap();
        track.play();
        backend.handle("music1").advance(6.0);
        track.refresh();

        track.load(&backend, resource("music2")).unwrap();

        let first = backend.handle("music1");
        assert!(!first.is_playing());
        assert_eq!(first.stop_calls(), 1);
        assert!(first.is_released());
        assert_eq!(track.current_time(), 0.0);
        assert_eq!(track.duration(), 20.0);
    }

    #[test]
    fn test_refresh_reads_live_position() {
        let backend = ScriptedBackend::new().with_track("book1", 30.0);
        let mut track = loaded(&backend, "book1");
        track.play();

        backend.handle("book1").advance(7.5);
        assert_eq!(track.query_position(), Some((7.5, 30.0)));
        assert!(track.refresh());
        assert_eq!(track.current_time(), 7.5);
    }

    #[test]
    fn test_refresh_detects_end_of_track() {
        let backend = ScriptedBackend::new().with_track("book1", 30.0);
        let mut track = loaded(&backend, "book1");
        track.play();

        backend.handle("book1").finish();
        track.refresh();

        assert_eq!(track.state(), Some(PlaybackState::Stopped));
        assert_eq!(track.current_time(), 0.0);
    }

    #[test]
    fn test_play_after_unnoticed_end_restarts() {
        let backend = ScriptedBackend::new().with_track("book1", 30.0);
        let mut track = loaded(&backend, "book1");
        let handle = backend.handle("book1");
        track.play();
        handle.advance(12.0);

        // ran off the end before any refresh saw it
        handle.finish();
        track.play();

        assert_eq!(track.state(), Some(PlaybackState::Playing));
        assert!(handle.is_playing());
        assert_eq!(handle.play_calls(), 2);
        assert_eq!(track.current_time(), 0.0);
    }

    #[test]
    fn test_pause_after_unnoticed_end_is_noop() {
        let backend = ScriptedBackend::new().with_track("book1", 30.0);
        let mut track = loaded(&backend, "book1");
        track.play();
        backend.handle("book1").finish();

        track.pause();

        assert_eq!(track.state(), Some(PlaybackState::Stopped));
        assert_eq!(backend.handle("book1").pause_calls(), 0);
    }

    #[test]
    fn test_finish_load_installs_opened_player() {
        let backend = ScriptedBackend::new().with_track("music1", 10.0);
        let mut track = TrackPlayer::new(Channel::Music, 0.4, AudioLogger::new());

        track.begin_load();
        let opened = backend.open(&resource("music1"));
        assert_eq!(track.finish_load(resource("music1"), opened).unwrap(), 10.0);

        assert_eq!(track.state(), Some(PlaybackState::Stopped));
        assert_eq!(backend.handle("music1").volume(), 0.4);
    }

    #[test]
    fn test_status_snapshot() {
        let backend = ScriptedBackend::new().with_track("book1", 30.0);
        let mut track = loaded(&backend, "book1");
        track.seek(3.0);

        let status = track.status();
        assert_eq!(status.track.as_deref(), Some("book1"));
        assert_eq!(status.current_time, 3.0);
        assert_eq!(status.duration, 30.0);
        assert_eq!(status.state, Some(PlaybackState::Stopped));
    }

    #[test]
    fn test_sanitize_seconds() {
        assert_eq!(sanitize_seconds(3.5), 3.5);
        assert_eq!(sanitize_seconds(-1.0), 0.0);
        assert_eq!(sanitize_seconds(f64::NAN), 0.0);
        assert_eq!(sanitize_seconds(f64::INFINITY), 0.0);
    }
}
