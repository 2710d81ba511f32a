/*!
Streaming linear resampler for interleaved f32 audio.

- Converts decoded chunks from the track's sample rate to the output device rate.
- Operates on interleaved frames (LRLR...) for an arbitrary number of channels.
- Carries the last source frame and the fractional phase across calls, so
  successive chunks join without clicks.

Typical usage:

    use crate::audio::resampler::LinearResampler;

    let mut rs = LinearResampler::new(44_100, 48_000, 2);
    let output = rs.process(&input_interleaved_f32);
    // 'output' is now at 48kHz with the same channel count.

Call `reset()` after seeking so the next chunk does not interpolate
against audio from the old position.
*/

#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,

    // how many source frames per 1 output frame (src/dst)
    step: f64,

    // Streaming state
    pos: f64,             // source position in frames, relative to the start of `prev_frame`
    prev_frame: Vec<f32>, // last source frame of the previous call, empty at the start
}

impl LinearResampler {
    /// Create a new resampler.
    /// - src_rate: decoded sample rate (Hz)
    /// - dst_rate: output sample rate (Hz)
    /// - channels: number of interleaved channels
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let step = if dst_rate == 0 { 0.0 } else { src_rate as f64 / dst_rate as f64 };
        Self {
            src_rate,
            dst_rate,
            channels,
            step,
            pos: 0.0,
            prev_frame: Vec::new(),
        }
    }

    /// Forget the phase and history
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.prev_frame.clear();
    }

    pub fn config(&self) -> (u32, u32, usize) {
        (self.src_rate, self.dst_rate, self.channels)
    }

    /// True when input and output rates already match
    pub fn is_passthrough(&self) -> bool {
        self.src_rate == self.dst_rate
    }

    /// Resample the next interleaved block of the stream.
    ///
    /// Output frames are produced only while a following source frame is
    /// available to interpolate against; the remainder is emitted by the
    /// next call.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.channels == 0 || self.dst_rate == 0 || self.src_rate == 0 {
            return Vec::new();
        }
        if self.is_passthrough() {
            return input.to_vec();
        }

        let ch = self.channels;
        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Vec::new();
        }

        // [prev_frame, input frames...]
        let mut work = Vec::with_capacity(self.prev_frame.len() + in_frames * ch);
        work.extend_from_slice(&self.prev_frame);
        work.extend_from_slice(&input[..in_frames * ch]);
        let total_frames = work.len() / ch;
        let last = (total_frames - 1) as f64;

        let expected = ((in_frames as f64) * (self.dst_rate as f64 / self.src_rate as f64)).ceil() as usize + 1;
        let mut out = Vec::with_capacity(expected * ch);

        while self.pos < last {
            let i = self.pos.floor() as usize;
            let frac = (self.pos - i as f64) as f32;

            let base0 = i * ch;
            let base1 = (i + 1) * ch;
            out.extend((0..ch).map(|c| {
                let s0 = work[base0 + c];
                let s1 = work[base1 + c];
                s0 + (s1 - s0) * frac
            }));

            self.pos += self.step;
        }

        // the last frame becomes index 0 of the next call
        self.prev_frame.clear();
        self.prev_frame.extend_from_slice(&work[(total_frames - 1) * ch..]);
        self.pos -= last;

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gen_sine(f_hz: f32, sr: u32, frames: usize, ch: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * ch);
        for n in 0..frames {
            let t = n as f32 / sr as f32;
            let s = (2.0 * std::f32::consts::PI * f_hz * t).sin();
            for _ in 0..ch {
                out.push(s);
            }
        }
        out
    }

    #[test]
    fn resample_length_mono_44k1_to_48k() {
        let src = 44_100;
        let dst = 48_000;
        let in_frames = 4410; // 0.1s
        let input = gen_sine(1000.0, src, in_frames, 1);

        let out = LinearResampler::new(src, dst, 1).process(&input);

        let expected = (in_frames as f64 * (dst as f64 / src as f64)).round() as isize;
        let actual = out.len() as isize;
        assert!((actual - expected).abs() <= 2, "expected ~{}, got {}", expected, actual);
    }

    #[test]
    fn resample_keeps_interleaving() {
        let src = 48_000;
        let dst = 44_100;
        let frames = 5000;
        // left is +0.5, right is -0.5
        let input: Vec<f32> = (0..frames).flat_map(|_| [0.5f32, -0.5]).collect();

        let out = LinearResampler::new(src, dst, 2).process(&input);

        assert_eq!(out.len() % 2, 0);
        for frame in out.chunks(2) {
            assert!((frame[0] - 0.5).abs() < 1e-6);
            assert!((frame[1] + 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn resample_interpolates_between_frames() {
        // upsample 2x: midpoints appear between source frames
        let mut rs = LinearResampler::new(1, 2, 1);
        assert_eq!(rs.process(&[0.0, 1.0]), vec![0.0, 0.5]);
        // the held frame joins the next block
        assert_eq!(rs.process(&[3.0]), vec![1.0, 2.0]);
    }

    #[test]
    fn passthrough_and_degenerate_rates() {
        let input = gen_sine(440.0, 44_100, 100, 2);
        assert_eq!(LinearResampler::new(44_100, 44_100, 2).process(&input), input);
        assert!(LinearResampler::new(0, 44_100, 2).process(&input).is_empty());
        assert!(LinearResampler::new(44_100, 48_000, 0).process(&input).is_empty());
        assert!(LinearResampler::new(44_100, 48_000, 2).process(&[]).is_empty());
    }

    #[test]
    fn streaming_matches_one_shot() {
        let (src, dst, ch) = (44_100, 48_000, 2);
        let input = gen_sine(440.0, src, 10_000, ch);

        let one_shot = LinearResampler::new(src, dst, ch).process(&input);

        let mut rs = LinearResampler::new(src, dst, ch);
        let mut streamed = Vec::new();
        for piece in input.chunks(777 * ch) {
            streamed.extend(rs.process(piece));
        }

        // phase rounding may move the final frame across a block edge
        assert!((one_shot.len() as isize - streamed.len() as isize).abs() <= ch as isize);
        for (a, b) in one_shot.iter().zip(&streamed) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn reset_drops_history() {
        let mut rs = LinearResampler::new(1, 2, 1);
        rs.process(&[5.0, 5.0, 5.0]);

        rs.reset();

        assert_eq!(rs.process(&[0.0, 1.0]), vec![0.0, 0.5]);
        assert_eq!(rs.config(), (1, 2, 1));
    }
}
