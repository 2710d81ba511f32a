pub mod coordinator;
pub mod decoder;
pub mod output;
pub mod resampler;
pub mod resource;
pub mod track;

#[cfg(test)]
pub mod tests;

use crate::error::DecodeError;

pub use coordinator::PlaybackCoordinator;
pub use decoder::TrackStream;
pub use output::CpalBackend;
pub use resampler::LinearResampler;
pub use resource::{ResourceLocator, ResourceRef};
pub use track::TrackPlayer;

/// One opened audio resource with its own playback cursor.
///
/// Times are in seconds. Implementations never fail once opened; a
/// misbehaving output is reported through logging only.
pub trait MediaPlayer: Send {
    /// Start or resume from the current cursor
    fn play(&mut self);

    /// Halt output, keeping the cursor
    fn pause(&mut self);

    /// Halt output. Rewinding is left to the caller.
    fn stop(&mut self);

    /// Move the cursor; callers pass a value already inside `[0, duration]`
    fn set_position(&mut self, seconds: f64);

    /// Live cursor position
    fn position(&self) -> f64;

    /// Total length of the resource
    fn duration(&self) -> f64;

    /// Output gain in `[0, 1]`
    fn set_volume(&mut self, volume: f32);

    /// False once paused, stopped, or run off the end of the resource
    fn is_playing(&self) -> bool;
}

/// Opens located resources into players
pub trait MediaBackend: Send + Sync {
    fn open(&self, resource: &ResourceRef) -> Result<Box<dyn MediaPlayer>, DecodeError>;
}
