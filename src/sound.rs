//! Sonification of receptive fields
//!
//! Each field gets a fixed sine tone whose pitch follows its vertical position
//! and whose stereo balance follows its horizontal position. The waveform is
//! synthesized once at setup; per frame only the channel gains change.

use crate::audio::{AudioBackend, Channel, Waveform};
use crate::error::{WavyError, WavyResult};
use crate::field::FieldOutput;
use crate::topology::{FieldSpec, Geometry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Largest usable `i16` peak
pub const MAX_AMPLITUDE: f64 = i16::MAX as f64;

/// Audio parameters shared by every field of a retina
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundParams {
    /// Pitch of a field at the bottom edge (top edge when flipped)
    pub freq_min: f64,
    /// Pitch of a field at the top edge (bottom edge when flipped)
    pub freq_max: f64,
    /// Length of the precomputed loop, in seconds
    pub play_duration: f64,
    /// Peak value of the quantized sine
    pub amplitude: f64,
    pub sample_rate: u32,
    /// Invert the pitch axis so lower fields sound higher
    pub flip_y: bool,
}

impl Default for SoundParams {
    fn default() -> Self {
        Self {
            freq_min: 200.0,
            freq_max: 2000.0,
            play_duration: 1.0,
            amplitude: 10000.0,
            sample_rate: 44100,
            flip_y: false,
        }
    }
}

impl SoundParams {
    pub fn validate(&self) -> WavyResult<()> {
        for (name, f) in [("freq_min", self.freq_min), ("freq_max", self.freq_max)] {
            if !f.is_finite() || f <= 0.0 {
                return Err(WavyError::config(format!(
                    "{} must be a positive frequency, got {}",
                    name, f
                )));
            }
        }
        if self.sample_rate == 0 {
            return Err(WavyError::config("sample rate must be positive"));
        }
        if !self.play_duration.is_finite() || self.play_duration <= 0.0 {
            return Err(WavyError::config(format!(
                "play duration must be positive, got {}",
                self.play_duration
            )));
        }
        if !self.amplitude.is_finite() || self.amplitude <= 0.0 || self.amplitude > MAX_AMPLITUDE
        {
            return Err(WavyError::config(format!(
                "amplitude must be in (0, {}], got {}",
                MAX_AMPLITUDE, self.amplitude
            )));
        }
        if self.loop_frames() == 0 {
            return Err(WavyError::config(format!(
                "{} s at {} Hz yields an empty waveform",
                self.play_duration, self.sample_rate
            )));
        }
        Ok(())
    }

    /// Requested waveform length in frames, before snapping to whole periods
    pub fn loop_frames(&self) -> usize {
        (self.play_duration * self.sample_rate as f64).round() as usize
    }
}

/// Left/right gain coefficients in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoPan {
    pub left: f32,
    pub right: f32,
}

/// Linear pitch mapping of `y / height` across `[freq_min, freq_max]`.
/// Unflipped, `y = 0` (top) maps to `freq_max`.
pub fn tone_hz(y: u32, height: u32, params: &SoundParams) -> f64 {
    let span = params.freq_max - params.freq_min;
    let pos = y as f64 / height as f64;
    if params.flip_y {
        params.freq_min + pos * span
    } else {
        params.freq_max - pos * span
    }
}

/// `(0.5 + (0.5 - x/w), 0.5 + (x/w - 0.5))`: full left at `x = 0`, centred at `w/2`
pub fn stereo_pan(x: u32, width: u32) -> StereoPan {
    let pos = x as f64 / width as f64;
    StereoPan {
        left: (0.5 + (0.5 - pos)) as f32,
        right: (0.5 + (pos - 0.5)) as f32,
    }
}

/// Stereo sine loop at exactly `tone` Hz.
///
/// The loop length is snapped to the whole number of periods nearest
/// `play_duration` (at least one), so the loop point is continuous without
/// moving the pitch.
pub fn synthesize(tone: f64, params: &SoundParams) -> WavyResult<Waveform> {
    params.validate()?;
    if !tone.is_finite() || tone <= 0.0 {
        return Err(WavyError::config(format!("tone must be positive, got {} Hz", tone)));
    }

    let rate = params.sample_rate as f64;
    if tone >= rate / 2.0 {
        warn!("{} Hz is above the Nyquist limit of {} Hz and will alias", tone, rate / 2.0);
    }
    let periods = (params.play_duration * tone).round().max(1.0);
    let frames = ((periods * rate / tone).round() as usize).max(1);

    let mut samples = Vec::with_capacity(frames * 2);
    for n in 0..frames {
        let v = (params.amplitude * (TAU * tone * n as f64 / rate).sin()) as i16;
        samples.push(v);
        samples.push(v);
    }

    Waveform::new(params.sample_rate, 2, samples)
}

/// Audio sink of one receptive field
pub struct SoundOutput {
    tone_hz: f64,
    pan: StereoPan,
    waveform: Arc<Waveform>,
    channel: Channel,
    last_gains: (f32, f32),
}

impl SoundOutput {
    /// Derive tone and pan for `spec`, synthesize its loop, claim a channel and
    /// start it looping at zero volume.
    pub fn configure(
        spec: &FieldSpec,
        geometry: Geometry,
        params: &SoundParams,
        backend: &Arc<dyn AudioBackend>,
    ) -> WavyResult<Self> {
        let tone = tone_hz(spec.y, geometry.height, params);
        let waveform = Arc::new(synthesize(tone, params)?);
        Self::with_waveform(spec, geometry, tone, waveform, backend)
    }

    /// `waveform` must be the loop synthesized for `tone_hz`
    fn with_waveform(
        spec: &FieldSpec,
        geometry: Geometry,
        tone_hz: f64,
        waveform: Arc<Waveform>,
        backend: &Arc<dyn AudioBackend>,
    ) -> WavyResult<Self> {
        let pan = stereo_pan(spec.x, geometry.width);

        let channel = Channel::acquire(backend)?;
        channel.play(Arc::clone(&waveform), true)?;
        channel.set_volume(0.0, 0.0);

        trace!(
            x = spec.x,
            y = spec.y,
            tone_hz,
            left = pan.left,
            right = pan.right,
            channel = channel.id(),
            "sound field configured"
        );

        Ok(Self {
            tone_hz,
            pan,
            waveform,
            channel,
            last_gains: (0.0, 0.0),
        })
    }

    pub fn tone_hz(&self) -> f64 {
        self.tone_hz
    }

    pub fn pan(&self) -> StereoPan {
        self.pan
    }

    pub fn waveform(&self) -> &Arc<Waveform> {
        &self.waveform
    }

    pub fn channel_id(&self) -> usize {
        self.channel.id()
    }

    /// Gains sent by the last [`output`](FieldOutput::output)
    pub fn last_gains(&self) -> (f32, f32) {
        self.last_gains
    }
}

impl FieldOutput for SoundOutput {
    #[inline]
    fn output(&mut self, activity: f32) {
        let gains = (self.pan.left * activity, self.pan.right * activity);
        self.channel.set_volume(gains.0, gains.1);
        self.last_gains = gains;
    }
}

/// Field factory for [`Retina::new`](crate::retina::Retina::new).
///
/// Parameters are validated up front. Fields on the same row share one
/// synthesized waveform.
pub fn sound_factory(
    params: SoundParams,
    backend: Arc<dyn AudioBackend>,
) -> WavyResult<impl FnMut(&FieldSpec, Geometry) -> WavyResult<SoundOutput>> {
    params.validate()?;
    let mut cache: HashMap<u64, Arc<Waveform>> = HashMap::new();

    Ok(move |spec: &FieldSpec, geometry: Geometry| {
        let tone = tone_hz(spec.y, geometry.height, &params);
        let waveform = match cache.get(&tone.to_bits()) {
            Some(w) => Arc::clone(w),
            None => {
                let w = Arc::new(synthesize(tone, &params)?);
                debug!(
                    "Synthesized {:.1} Hz loop ({} frames)",
                    tone,
                    w.frames()
                );
                cache.insert(tone.to_bits(), Arc::clone(&w));
                w
            }
        };
        SoundOutput::with_waveform(spec, geometry, tone, waveform, &backend)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MixerConfig, SharedMixer};
    use crate::topology::Captor;

    /// Upward zero crossings over one pass through the loop, seam included
    fn rising_crossings(w: &Waveform) -> usize {
        let left: Vec<i16> = w.samples().iter().step_by(2).copied().collect();
        (0..left.len())
            .filter(|&n| {
                let prev = left[(n + left.len() - 1) % left.len()];
                prev < 0 && left[n] >= 0
            })
            .count()
    }

    #[test]
    fn test_pan_edges_and_centre() {
        assert_eq!(stereo_pan(50, 100), StereoPan { left: 0.5, right: 0.5 });
        assert_eq!(stereo_pan(0, 100), StereoPan { left: 1.0, right: 0.0 });
        assert_eq!(stereo_pan(100, 100), StereoPan { left: 0.0, right: 1.0 });
    }

    #[test]
    fn test_tone_mapping_direction() {
        let params = SoundParams {
            freq_min: 100.0,
            freq_max: 1100.0,
            ..SoundParams::default()
        };
        assert_eq!(tone_hz(0, 10, &params), 1100.0);
        assert_eq!(tone_hz(10, 10, &params), 100.0);
        assert_eq!(tone_hz(5, 10, &params), 600.0);

        let flipped = SoundParams {
            flip_y: true,
            ..params
        };
        assert_eq!(tone_hz(0, 10, &flipped), 100.0);
        assert_eq!(tone_hz(10, 10, &flipped), 1100.0);
    }

    #[test]
    fn test_zero_length_waveform_is_a_configuration_error() {
        let params = SoundParams {
            play_duration: 1e-6,
            sample_rate: 8000,
            ..SoundParams::default()
        };
        assert!(matches!(
            synthesize(440.0, &params),
            Err(WavyError::Configuration(_))
        ));
        let silent = SoundParams {
            amplitude: 0.0,
            ..SoundParams::default()
        };
        assert!(silent.validate().is_err());
        let no_rate = SoundParams {
            sample_rate: 0,
            ..SoundParams::default()
        };
        assert!(no_rate.validate().is_err());
    }

    #[test]
    fn test_waveform_is_stereo_and_bounded() {
        let params = SoundParams {
            play_duration: 0.1,
            ..SoundParams::default()
        };
        let w = synthesize(441.0, &params).unwrap();
        assert_eq!(w.channels(), 2);
        // 44.1 periods round to 44
        assert_eq!(w.frames(), 4400);
        assert!(w.samples().chunks(2).all(|f| f[0] == f[1]));
        let peak = w.samples().iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak <= 10000 && peak > 9900, "peak = {}", peak);
    }

    #[test]
    fn test_loop_point_is_continuous() {
        // 0.05 s holds 15.5 periods of 310 Hz, snapped to 16
        let params = SoundParams {
            play_duration: 0.05,
            ..SoundParams::default()
        };
        let w = synthesize(310.0, &params).unwrap();
        let s = w.samples();
        let last = s[s.len() - 2] as i32;
        let first = s[0] as i32;
        let second = s[2] as i32;
        // Whole periods rarely land on a sample boundary, so the seam may be
        // up to half a sample longer than an ordinary step
        assert!(
            (first - last).abs() * 2 <= (second - first).abs() * 3 + 2,
            "loop seam jumps from {} to {}",
            last,
            first
        );
    }

    #[test]
    fn test_short_loop_plays_the_reported_tone() {
        let mixer = SharedMixer::new(MixerConfig {
            capacity: 2,
            ..MixerConfig::default()
        })
        .unwrap();
        let geometry = Geometry {
            width: 100,
            height: 100,
        };
        let spec = FieldSpec::new(10, 95, vec![Captor::new(10, 95)]);

        for play_duration in [0.005, 0.1] {
            let params = SoundParams {
                play_duration,
                ..SoundParams::default()
            };
            let output = SoundOutput::configure(&spec, geometry, &params, &mixer.backend()).unwrap();
            let tone = output.tone_hz();
            assert!((tone - 290.0).abs() < 1e-9, "tone = {}", tone);

            let w = output.waveform();
            let rate = params.sample_rate as f64;
            for (n, frame) in w.samples().chunks(2).enumerate() {
                let expected = params.amplitude * (TAU * tone * n as f64 / rate).sin();
                assert!(
                    (frame[0] as f64 - expected).abs() <= 1.0,
                    "sample {} of a {} s loop is off pitch",
                    n,
                    play_duration
                );
            }

            let periods = rising_crossings(w);
            let measured = periods as f64 * rate / w.frames() as f64;
            assert!(
                (measured - tone).abs() / tone < 0.005,
                "{} s loop measures {} Hz for a {} Hz field",
                play_duration,
                measured,
                tone
            );
        }
    }
}
