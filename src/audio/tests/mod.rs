//! Scripted media backend used by the unit and scenario tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audio::{MediaBackend, MediaPlayer, ResourceRef};
use crate::error::DecodeError;

#[derive(Debug, Default)]
struct ScriptedState {
    duration: f64,
    position: f64,
    volume: f32,
    playing: bool,
    play_calls: usize,
    pause_calls: usize,
    stop_calls: usize,
    released: bool,
}

/// Test-side view of an opened scripted player
#[derive(Clone)]
pub struct ScriptedHandle(Arc<Mutex<ScriptedState>>);

impl ScriptedHandle {
    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.0.lock().unwrap()
    }

    /// Move the cursor forward as real playback would
    pub fn advance(&self, seconds: f64) {
        let mut state = self.state();
        state.position = (state.position + seconds).min(state.duration);
    }

    /// Run off the end: the player halts and rewinds
    pub fn finish(&self) {
        let mut state = self.state();
        state.playing = false;
        state.position = 0.0;
    }

    pub fn position(&self) -> f64 {
        self.state().position
    }

    pub fn volume(&self) -> f32 {
        self.state().volume
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn play_calls(&self) -> usize {
        self.state().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state().pause_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.state().stop_calls
    }

    pub fn is_released(&self) -> bool {
        self.state().released
    }
}

struct ScriptedPlayer(ScriptedHandle);

impl MediaPlayer for ScriptedPlayer {
    fn play(&mut self) {
        let mut state = self.0.state();
        state.playing = true;
        state.play_calls += 1;
    }

    fn pause(&mut self) {
        let mut state = self.0.state();
        state.playing = false;
        state.pause_calls += 1;
    }

    fn stop(&mut self) {
        let mut state = self.0.state();
        state.playing = false;
        state.stop_calls += 1;
    }

    fn set_position(&mut self, seconds: f64) {
        self.0.state().position = seconds;
    }

    fn position(&self) -> f64 {
        self.0.state().position
    }

    fn duration(&self) -> f64 {
        self.0.state().duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.0.state().volume = volume;
    }

    fn is_playing(&self) -> bool {
        self.0.state().playing
    }
}

impl Drop for ScriptedPlayer {
    fn drop(&mut self) {
        self.0.state().released = true;
    }
}

/// Backend that "decodes" files by stem: known stems open with a fixed
/// duration, broken stems fail, anything else is unsupported.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    durations: HashMap<String, f64>,
    broken: HashSet<String>,
    opened: Arc<Mutex<HashMap<String, ScriptedHandle>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, stem: &str, duration: f64) -> Self {
        self.durations.insert(stem.to_string(), duration);
        self
    }

    pub fn with_broken(mut self, stem: &str) -> Self {
        self.broken.insert(stem.to_string());
        self
    }

    /// Most recently opened player for `stem`
    pub fn handle(&self, stem: &str) -> ScriptedHandle {
        self.opened
            .lock()
            .unwrap()
            .get(stem)
            .cloned()
            .unwrap_or_else(|| panic!("'{}' was never opened", stem))
    }

    pub fn was_opened(&self, stem: &str) -> bool {
        self.opened.lock().unwrap().contains_key(stem)
    }
}

impl MediaBackend for ScriptedBackend {
    fn open(&self, resource: &ResourceRef) -> Result<Box<dyn MediaPlayer>, DecodeError> {
        let stem = resource
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        if self.broken.contains(&stem) {
            return Err(DecodeError::DecodeFailed(format!("{} is corrupt", stem)));
        }
        let duration = *self.durations.get(&stem).ok_or_else(|| DecodeError::UnsupportedFormat {
            format: stem.clone(),
        })?;

        let handle = ScriptedHandle(Arc::new(Mutex::new(ScriptedState {
            duration,
            volume: 1.0,
            ..Default::default()
        })));
        self.opened.lock().unwrap().insert(stem, handle.clone());
        Ok(Box::new(ScriptedPlayer(handle)))
    }
}

/// Resource root containing an empty file for every name given
pub fn bundle(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().unwrap();
    for file in files {
        let path = dir.path().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }
    dir
}

/// 16-bit PCM WAV with every sample set to `value`
pub fn write_wav(path: &std::path::Path, sample_rate: u32, channels: u16, frames: usize, value: i16) {
    let data_len = (frames * channels as usize * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
    bytes.extend_from_slice(&(channels * 2).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for _ in 0..frames * channels as usize {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    std::fs::write(path, bytes).unwrap();
}

/// `ResourceRef` for a file, named after its stem
pub fn resource_at(path: &std::path::Path) -> ResourceRef {
    ResourceRef {
        name: path.file_stem().unwrap().to_string_lossy().into_owned(),
        path: path.to_path_buf(),
    }
}
