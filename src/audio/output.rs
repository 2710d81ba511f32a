use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use log::{debug, error, info, warn};

use crate::audio::{LinearResampler, MediaBackend, MediaPlayer, ResourceRef, TrackStream};
use crate::error::{AudioError, DecodeError};

/// Decoded blocks queued ahead of the output callback
const QUEUED_BLOCKS: usize = 32;

/// How long the feeder waits for a command while the queue is full
const FEED_WAIT: Duration = Duration::from_millis(10);

/// Audio travelling from the feeder thread to the output callback.
/// Blocks from before the latest seek carry an older generation.
enum Block {
    Samples { generation: u64, samples: Vec<f32> },
    End { generation: u64 },
}

enum FeedCommand {
    Seek { generation: u64, seconds: f64 },
}

/// State shared between a player, its feeder and its output callback
struct Voice {
    channels: usize,
    sample_rate: u32,
    frames: usize,
    duration: f64,
    /// Frames rendered since the last seek target, at the device rate
    cursor: AtomicUsize,
    generation: AtomicU64,
    playing: AtomicBool,
    volume: AtomicU32,
}

impl Voice {
    fn new(channels: usize, sample_rate: u32, duration: f64) -> Self {
        let frames = (duration * sample_rate as f64).round();
        Self {
            channels: channels.max(1),
            sample_rate,
            frames: if frames.is_finite() && frames > 0.0 { frames as usize } else { 0 },
            duration,
            cursor: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            volume: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    fn seconds(&self, frames: usize) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            frames as f64 / self.sample_rate as f64
        }
    }

    fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds * self.sample_rate as f64).round();
        if frame.is_finite() && frame > 0.0 {
            (frame as usize).min(self.frames)
        } else {
            0
        }
    }
}

/// Output-callback side of a voice: the block being played and the queue behind it
struct Playhead {
    voice: Arc<Voice>,
    blocks: Receiver<Block>,
    current: Vec<f32>,
    offset: usize,
    generation: u64,
}

impl Playhead {
    fn new(voice: Arc<Voice>, blocks: Receiver<Block>) -> Self {
        Self {
            voice,
            blocks,
            current: Vec::new(),
            offset: 0,
            generation: 0,
        }
    }

    /// Make a frame of `generation` available at `offset`. Returns false on
    /// underrun or at the end of the track, flagging the latter in `finished`.
    fn next_frame(&mut self, generation: u64, finished: &mut bool) -> bool {
        let channels = self.voice.channels;
        loop {
            if self.generation > generation {
                // a seek landed mid-period; its audio waits for the next one
                return false;
            }
            if self.generation == generation && self.offset + channels <= self.current.len() {
                return true;
            }
            match self.blocks.try_recv() {
                Ok(Block::Samples { generation: g, samples }) if g >= generation => {
                    self.current = samples;
                    self.offset = 0;
                    self.generation = g;
                }
                Ok(Block::End { generation: g }) if g == generation => {
                    *finished = true;
                    return false;
                }
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    }

    /// Fill one output period. Running off the end halts playback and
    /// rewinds; a cursor moved by a concurrent seek is left alone.
    fn render<T>(&mut self, data: &mut [T], out_channels: usize)
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        let silence = T::from_sample(0.0f32);
        if !self.voice.playing.load(Ordering::Acquire) || out_channels == 0 {
            data.iter_mut().for_each(|sample| *sample = silence);
            return;
        }

        let generation = self.voice.generation.load(Ordering::Acquire);
        let start = self.voice.cursor.load(Ordering::Acquire);
        let volume = f32::from_bits(self.voice.volume.load(Ordering::Relaxed));
        let channels = self.voice.channels;
        let mut rendered = 0usize;
        let mut finished = false;

        for out_frame in data.chunks_mut(out_channels) {
            if finished || !self.next_frame(generation, &mut finished) {
                out_frame.iter_mut().for_each(|sample| *sample = silence);
                continue;
            }

            let base = self.offset;
            for (k, sample) in out_frame.iter_mut().enumerate() {
                let source = self.current[base + k.min(channels - 1)];
                *sample = T::from_sample(source * volume);
            }
            self.offset += channels;
            rendered += 1;
        }

        let target = if finished {
            self.voice.playing.store(false, Ordering::Release);
            0
        } else {
            start + rendered
        };
        let _ = self
            .voice
            .cursor
            .compare_exchange(start, target, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Decodes ahead of the output callback on its own thread. After the end
/// of the track it rewinds to the start, so replaying needs no seek.
struct Feeder {
    stream: TrackStream,
    resampler: LinearResampler,
    generation: u64,
    pending: Option<Block>,
    exhausted: bool,
    name: String,
}

impl Feeder {
    fn new(stream: TrackStream, device_rate: u32, name: String) -> Self {
        let resampler = LinearResampler::new(stream.sample_rate(), device_rate, stream.channels());
        if !resampler.is_passthrough() {
            debug!(
                "Resampling '{}' from {} Hz to {} Hz",
                name,
                stream.sample_rate(),
                device_rate
            );
        }
        Self {
            stream,
            resampler,
            generation: 0,
            pending: None,
            exhausted: false,
            name,
        }
    }

    fn apply(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::Seek { generation, seconds } => {
                self.generation = generation;
                self.pending = None;
                self.reposition(seconds);
            }
        }
    }

    fn reposition(&mut self, seconds: f64) {
        self.resampler.reset();
        match self.stream.seek(seconds) {
            Ok(()) => self.exhausted = false,
            Err(e) => {
                warn!("'{}': {}", self.name, e);
                self.exhausted = true;
            }
        }
    }

    fn next_block(&mut self) -> Block {
        let generation = self.generation;
        while !self.exhausted {
            match self.stream.next_chunk() {
                Ok(Some(chunk)) => {
                    let samples = self.resampler.process(&chunk);
                    if !samples.is_empty() {
                        return Block::Samples { generation, samples };
                    }
                }
                Ok(None) => self.exhausted = true,
                Err(e) => {
                    error!("'{}' stopped decoding: {}", self.name, e);
                    self.exhausted = true;
                }
            }
        }
        Block::End { generation }
    }

    /// Runs until the player drops its command sender or the output side
    /// goes away.
    fn run(mut self, blocks: SyncSender<Block>, commands: Receiver<FeedCommand>) {
        loop {
            loop {
                match commands.try_recv() {
                    Ok(command) => self.apply(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            let block = match self.pending.take() {
                Some(block) => block,
                None => self.next_block(),
            };
            let is_end = matches!(block, Block::End { .. });

            match blocks.try_send(block) {
                Ok(()) => {
                    if is_end {
                        self.reposition(0.0);
                    }
                }
                Err(TrySendError::Full(block)) => {
                    self.pending = Some(block);
                    match commands.recv_timeout(FEED_WAIT) {
                        Ok(command) => self.apply(command),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Opens resources onto the default output device. Creating it is the
/// process's one-time audio session activation.
pub struct CpalBackend {
    device: Mutex<cpal::Device>,
    device_name: String,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl CpalBackend {
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceUnavailable("No default output device".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let default_config = device.default_output_config().map_err(|e| {
            AudioError::InitializationFailed(format!("Failed to get default config: {}", e))
        })?;

        let sample_format = default_config.sample_format();
        if !matches!(sample_format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16) {
            return Err(AudioError::UnsupportedSampleFormat {
                format: format!("{:?}", sample_format),
            });
        }

        let config = StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            "Audio session active on '{}': {} Hz, {} channels, {:?}",
            device_name, config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device: Mutex::new(device),
            device_name,
            config,
            sample_format,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start_feeder_thread(
        name: &str,
        feeder: Feeder,
        blocks: SyncSender<Block>,
        commands: Receiver<FeedCommand>,
    ) -> Result<JoinHandle<()>, AudioError> {
        thread::Builder::new()
            .name(format!("feeder-{}", name))
            .spawn(move || feeder.run(blocks, commands))
            .map_err(|e| {
                AudioError::InitializationFailed(format!("Failed to create feeder thread: {}", e))
            })
    }

    fn start_output_thread(
        &self,
        name: &str,
        playhead: Playhead,
    ) -> Result<(Sender<()>, JoinHandle<()>), AudioError> {
        let device = self
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let config = self.config.clone();
        let sample_format = self.sample_format;
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), AudioError>>(1);

        let thread_name = format!("output-{}", name);
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let stream_result = match sample_format {
                    SampleFormat::F32 => create_stream::<f32>(&device, &config, playhead),
                    SampleFormat::I16 => create_stream::<i16>(&device, &config, playhead),
                    SampleFormat::U16 => create_stream::<u16>(&device, &config, playhead),
                    other => Err(AudioError::UnsupportedSampleFormat {
                        format: format!("{:?}", other),
                    }),
                };

                let stream = match stream_result.and_then(|stream| {
                    stream
                        .play()
                        .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;
                    Ok(stream)
                }) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // the stream lives until the owning player is dropped
                let _ = shutdown_rx.recv();
                let _ = stream.pause();
                debug!("Output thread {} finished", thread_name);
            })
            .map_err(|e| {
                AudioError::InitializationFailed(format!("Failed to create output thread: {}", e))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok((shutdown_tx, handle)),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::StreamError("Output thread exited early".to_string()))
            }
        }
    }
}

impl MediaBackend for CpalBackend {
    fn open(&self, resource: &ResourceRef) -> Result<Box<dyn MediaPlayer>, DecodeError> {
        let stream = TrackStream::open(resource)?;
        let device_rate = self.sample_rate();
        let voice = Arc::new(Voice::new(stream.channels(), device_rate, stream.duration()));

        let (block_tx, block_rx) = mpsc::sync_channel(QUEUED_BLOCKS);
        let (command_tx, command_rx) = mpsc::channel();
        let feeder = Feeder::new(stream, device_rate, resource.name.clone());
        let feeder_thread = Self::start_feeder_thread(&resource.name, feeder, block_tx, command_rx)
            .map_err(|e| DecodeError::OutputFailed(e.to_string()))?;

        let playhead = Playhead::new(Arc::clone(&voice), block_rx);
        let (shutdown, output_thread) = match self.start_output_thread(&resource.name, playhead) {
            Ok(started) => started,
            Err(e) => {
                drop(command_tx);
                let _ = feeder_thread.join();
                return Err(DecodeError::OutputFailed(e.to_string()));
            }
        };

        Ok(Box::new(CpalPlayer {
            voice,
            commands: Some(command_tx),
            shutdown: Some(shutdown),
            threads: vec![output_thread, feeder_thread],
        }))
    }
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut playhead: Playhead,
) -> Result<Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    T: cpal::FromSample<f32>,
{
    let out_channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                playhead.render(data, out_channels);
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))
}

/// One resource streaming to its own output stream
pub struct CpalPlayer {
    voice: Arc<Voice>,
    commands: Option<Sender<FeedCommand>>,
    shutdown: Option<Sender<()>>,
    threads: Vec<JoinHandle<()>>,
}

impl MediaPlayer for CpalPlayer {
    fn play(&mut self) {
        self.voice.playing.store(true, Ordering::Release);
    }

    fn pause(&mut self) {
        self.voice.playing.store(false, Ordering::Release);
    }

    fn stop(&mut self) {
        self.voice.playing.store(false, Ordering::Release);
    }

    fn set_position(&mut self, seconds: f64) {
        let frame = self.voice.frame_at(seconds);
        let generation = self.voice.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.voice.cursor.store(frame, Ordering::Release);
        if let Some(commands) = &self.commands {
            let _ = commands.send(FeedCommand::Seek {
                generation,
                seconds: self.voice.seconds(frame),
            });
        }
    }

    fn position(&self) -> f64 {
        self.voice
            .seconds(self.voice.cursor.load(Ordering::Acquire))
            .min(self.voice.duration)
    }

    fn duration(&self) -> f64 {
        self.voice.duration
    }

    fn set_volume(&mut self, volume: f32) {
        self.voice.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    fn is_playing(&self) -> bool {
        self.voice.playing.load(Ordering::Acquire)
    }
}

impl Drop for CpalPlayer {
    fn drop(&mut self) {
        self.voice.playing.store(false, Ordering::Release);
        self.commands.take();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                error!("Playback thread panicked");
            }
        }
    }
}
