use std::fs::File;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use crate::audio::ResourceRef;
use crate::error::DecodeError;

/// Incremental symphonia decoder for one resource.
///
/// Packets are decoded on demand into interleaved f32 chunks, so only the
/// chunk in hand is ever held in memory. The total duration comes from the
/// container's frame count, or from one pass over the packet headers when
/// the container does not record it.
pub struct TrackStream {
    name: String,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_rate: u32,
    channels: usize,
    duration: f64,
    sample_buf: Option<SampleBuffer<f32>>,
    buf_frames: usize,
    /// First chunk, decoded while opening
    pending: Option<Vec<f32>>,
    /// Frames before this timestamp are dropped after an accurate seek
    skip_until: Option<u64>,
    skipped: usize,
}

impl TrackStream {
    /// Probe the resource, pick its first audio track and decode the first
    /// chunk. A resource yielding no audio at all is an error.
    pub fn open(resource: &ResourceRef) -> Result<Self, DecodeError> {
        let reader = probe(resource)?;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| DecodeError::DecodeFailed(format!("Failed to create decoder: {}", e)))?;

        let mut stream = Self {
            name: resource.name.clone(),
            reader,
            decoder,
            track_id,
            time_base: params.time_base,
            sample_rate: params.sample_rate.unwrap_or(0),
            channels: params.channels.map(|c| c.count()).unwrap_or(0),
            duration: 0.0,
            sample_buf: None,
            buf_frames: 0,
            pending: None,
            skip_until: None,
            skipped: 0,
        };

        let first = stream.next_chunk()?;
        if first.is_none() || stream.channels == 0 || stream.sample_rate == 0 {
            return Err(DecodeError::DecodeFailed(format!(
                "No audio decoded from '{}'",
                resource.name
            )));
        }
        stream.pending = first;

        let total = match params.n_frames {
            Some(frames) => frames,
            None => count_timestamps(resource, track_id)?,
        };
        stream.duration = ts_to_seconds(stream.time_base, stream.sample_rate, total);

        debug!(
            "Opened '{}': {:.2}s, {} Hz, {} channels",
            stream.name, stream.duration, stream.sample_rate, stream.channels
        );
        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Next chunk of interleaved samples, or `None` at the end of the track.
    /// Corrupt packets are skipped.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<f32>>, DecodeError> {
        if let Some(chunk) = self.pending.take() {
            return Ok(Some(chunk));
        }

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                // a new track list mid-stream; the first one is all we play
                Err(SymphoniaError::ResetRequired) => break,
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to read packet: {}", err)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }
            let skip_frames = self.skip_until.map(|target| {
                ts_to_frames(self.time_base, self.sample_rate, target.saturating_sub(packet.ts()))
            });

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let capacity = decoded.capacity();
                    if self.sample_buf.is_none() || capacity > self.buf_frames {
                        self.sample_buf = Some(SampleBuffer::<f32>::new(capacity as u64, spec));
                        self.buf_frames = capacity;
                    }
                    self.sample_rate = spec.rate;
                    self.channels = spec.channels.count();

                    let Some(buf) = self.sample_buf.as_mut() else {
                        continue;
                    };
                    buf.copy_interleaved_ref(decoded);
                    let mut samples = buf.samples();

                    if let Some(frames) = skip_frames {
                        let skip = frames * self.channels;
                        if skip >= samples.len() {
                            continue;
                        }
                        samples = &samples[skip..];
                        self.skip_until = None;
                    }
                    if samples.is_empty() {
                        continue;
                    }
                    return Ok(Some(samples.to_vec()));
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    self.skipped += 1;
                    debug!("Skipping corrupt packet in '{}': {}", self.name, err);
                }
                Err(SymphoniaError::IoError(_)) => break,
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to decode packet: {}", err)));
                }
            }
        }

        if self.skipped > 0 {
            warn!("Skipped {} corrupt packets in '{}'", self.skipped, self.name);
            self.skipped = 0;
        }
        Ok(None)
    }

    /// Reposition so the next chunk starts at `seconds`
    pub fn seek(&mut self, seconds: f64) -> Result<(), DecodeError> {
        self.pending = None;
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let time = Time::new(seconds.trunc() as u64, seconds.fract());

        let seeked = self
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| DecodeError::DecodeFailed(format!("Failed to seek to {:.2}s: {}", seconds, e)))?;

        self.decoder.reset();
        self.skip_until = (seeked.required_ts > seeked.actual_ts).then_some(seeked.required_ts);
        Ok(())
    }
}

fn probe(resource: &ResourceRef) -> Result<Box<dyn FormatReader>, DecodeError> {
    let file = File::open(&resource.path)
        .map_err(|e| DecodeError::Open(format!("{}: {}", resource.path.display(), e)))?;
    let media_source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = resource.extension() {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat {
            format: format!("{} ({})", resource.extension().unwrap_or("unknown"), e),
        })?;
    Ok(probed.format)
}

/// Sum of packet durations for a container that does not store its length
fn count_timestamps(resource: &ResourceRef, track_id: u32) -> Result<u64, DecodeError> {
    let mut reader = probe(resource)?;
    let mut total = 0u64;
    loop {
        match reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => total += packet.dur(),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    debug!("Counted length of '{}' from packet headers", resource.name);
    Ok(total)
}

fn ts_to_seconds(time_base: Option<TimeBase>, sample_rate: u32, ts: u64) -> f64 {
    match time_base {
        Some(time_base) => {
            let time = time_base.calc_time(ts);
            time.seconds as f64 + time.frac
        }
        None if sample_rate > 0 => ts as f64 / sample_rate as f64,
        None => 0.0,
    }
}

fn ts_to_frames(time_base: Option<TimeBase>, sample_rate: u32, ts: u64) -> usize {
    match time_base {
        Some(_) => (ts_to_seconds(time_base, sample_rate, ts) * sample_rate as f64).round() as usize,
        None => ts as usize,
    }
}
