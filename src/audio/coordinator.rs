use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, trace};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::{MediaBackend, ResourceLocator, TrackPlayer};
use crate::error::{AudioError, PlayerError};
use crate::logging::{AudioLogger, OperationTimer};
use crate::models::{Channel, ChannelStatus, PlayerSnapshot};

/// Loads slower than this are reported
const LOAD_WARN_THRESHOLD: Duration = Duration::from_millis(200);

/// Both channels' track players
struct Channels {
    book: TrackPlayer,
    music: TrackPlayer,
}

impl Channels {
    fn get_mut(&mut self, channel: Channel) -> &mut TrackPlayer {
        match channel {
            Channel::Book => &mut self.book,
            Channel::Music => &mut self.music,
        }
    }

    fn get(&self, channel: Channel) -> &TrackPlayer {
        match channel {
            Channel::Book => &self.book,
            Channel::Music => &self.music,
        }
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            book: self.book.status(),
            music: self.music.status(),
        }
    }
}

/// State shared between the coordinator and its poll task
struct Shared {
    channels: Mutex<Channels>,
    /// Cleared under the channels lock on teardown
    running: AtomicBool,
    updates: watch::Sender<PlayerSnapshot>,
}

impl Shared {
    fn channels(&self) -> MutexGuard<'_, Channels> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refresh every loaded channel from its player and republish
    fn poll_tick(&self) -> bool {
        let mut channels = self.channels();
        if !self.running.load(Ordering::Acquire) {
            return false;
        }

        let book = channels.book.refresh();
        let music = channels.music.refresh();
        if book || music {
            self.updates.send_replace(channels.snapshot());
        }
        true
    }
}

/// Owns the book and music channels and the single poll task that keeps
/// their observable time and duration fresh.
///
/// Commands take effect on the observable state immediately; the poll
/// task only picks up position changes made by playback itself.
pub struct PlaybackCoordinator {
    shared: Arc<Shared>,
    locator: ResourceLocator,
    backend: Arc<dyn MediaBackend>,
    logger: AudioLogger,
    poller: Option<JoinHandle<()>>,
}

impl PlaybackCoordinator {
    pub fn new(
        locator: ResourceLocator,
        backend: Arc<dyn MediaBackend>,
        logger: AudioLogger,
        book_volume: f32,
        music_volume: f32,
    ) -> Self {
        let channels = Channels {
            book: TrackPlayer::new(Channel::Book, book_volume, logger.clone()),
            music: TrackPlayer::new(Channel::Music, music_volume, logger.clone()),
        };
        let (updates, _) = watch::channel(channels.snapshot());

        Self {
            shared: Arc::new(Shared {
                channels: Mutex::new(channels),
                running: AtomicBool::new(true),
                updates,
            }),
            locator,
            backend,
            logger,
            poller: None,
        }
    }

    /// Spawn the poll task on the current tokio runtime
    pub fn start_polling(&mut self, period: Duration) -> Result<(), PlayerError> {
        if self.poller.is_some() {
            return Ok(());
        }
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(AudioError::InitializationFailed(
                "coordinator has been shut down".to_string(),
            )
            .into());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            AudioError::InitializationFailed(format!("No async runtime for polling: {}", e))
        })?;

        let shared = Arc::clone(&self.shared);
        self.poller = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !shared.poll_tick() {
                    break;
                }
                trace!("Poll tick");
            }
            debug!("Poll task finished");
        }));

        info!("Polling playback position every {}ms", period.as_millis());
        Ok(())
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one refresh of both channels; what the poll task does each period
    pub fn poll_tick(&self) {
        self.shared.poll_tick();
    }

    fn publish(&self, channels: &Channels) {
        self.shared.updates.send_replace(channels.snapshot());
    }

    /// Resolve `name` and load it into `channel`, returning the new duration.
    ///
    /// A missing resource leaves the channel untouched; a resource that
    /// fails to open leaves the channel empty. Both are logged here.
    pub fn load_channel(&self, channel: Channel, name: &str) -> Result<f64, PlayerError> {
        let resource = match self.locator.resolve(name) {
            Ok(resource) => resource,
            Err(e) => {
                self.logger.log_resource_not_found(channel, name);
                return Err(e.into());
            }
        };

        let timer = OperationTimer::new(format!("load {} '{}'", channel, name));
        {
            let mut channels = self.shared.channels();
            channels.get_mut(channel).begin_load();
            self.publish(&channels);
        }

        // opened without the lock so the other channel and the poll task keep going
        let opened = self.backend.open(&resource);

        let mut channels = self.shared.channels();
        let result = channels.get_mut(channel).finish_load(resource, opened);
        self.publish(&channels);
        drop(channels);
        timer.finish_with_threshold(LOAD_WARN_THRESHOLD);

        Ok(result?)
    }

    pub fn play(&self, channel: Channel) {
        self.with_channel(channel, TrackPlayer::play);
    }

    pub fn pause(&self, channel: Channel) {
        self.with_channel(channel, TrackPlayer::pause);
    }

    pub fn stop(&self, channel: Channel) {
        self.with_channel(channel, TrackPlayer::stop);
    }

    /// Clamped into `[0, duration]`; ignored while the channel is empty
    pub fn seek(&self, channel: Channel, seconds: f64) {
        self.with_channel(channel, |track| track.seek(seconds));
    }

    /// Clamped into `[0, 1]`
    pub fn set_volume(&self, channel: Channel, volume: f32) {
        self.with_channel(channel, |track| track.set_volume(volume));
    }

    fn with_channel(&self, channel: Channel, command: impl FnOnce(&mut TrackPlayer)) {
        let mut channels = self.shared.channels();
        command(channels.get_mut(channel));
        self.publish(&channels);
    }

    pub fn status(&self, channel: Channel) -> ChannelStatus {
        self.shared.channels().get(channel).status()
    }

    pub fn current_time(&self, channel: Channel) -> f64 {
        self.shared.channels().get(channel).current_time()
    }

    pub fn duration(&self, channel: Channel) -> f64 {
        self.shared.channels().get(channel).duration()
    }

    pub fn volume(&self, channel: Channel) -> f32 {
        self.shared.channels().get(channel).volume()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.shared.channels().snapshot()
    }

    /// Receiver updated after every command and every poll tick that saw a loaded channel
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn logger(&self) -> &AudioLogger {
        &self.logger
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Halt the poll task. No tick changes state once this returns.
    pub fn shutdown(&mut self) {
        {
            let _channels = self.shared.channels();
            self.shared.running.store(false, Ordering::Release);
        }
        if let Some(poller) = self.poller.take() {
            poller.abort();
            debug!("Poll task cancelled");
        }
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
