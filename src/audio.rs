//! Playback channels, mixing, and real-time output using cpal
//!
//! The retina only needs "N independently volume-controllable channels, each
//! looping a waveform". [`AudioBackend`] is that contract; [`SharedMixer`]
//! implements it in software and [`CpalOutput`] feeds the mix to a device
//! (JACK, ALSA, CoreAudio, WASAPI, ...). Offline rendering pulls from the same
//! mixer without a device.

use crate::error::{WavyError, WavyResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

pub type ChannelId = usize;

/// Fixed-point PCM buffer, interleaved when `channels > 1`
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl Waveform {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> WavyResult<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(WavyError::config(format!(
                "waveform needs a positive rate and channel count, got {} Hz x {}",
                sample_rate, channels
            )));
        }
        if samples.is_empty() || samples.len() % channels as usize != 0 {
            return Err(WavyError::config(format!(
                "waveform of {} samples is not a whole number of {}-channel frames",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame `i` as `(left, right)` in `[-1, 1)`; mono is duplicated
    #[inline]
    pub fn frame(&self, i: usize) -> (f32, f32) {
        let ch = self.channels as usize;
        let base = i * ch;
        let left = self.samples[base] as f32 / 32768.0;
        let right = if ch > 1 {
            self.samples[base + 1] as f32 / 32768.0
        } else {
            left
        };
        (left, right)
    }
}

/// The playback-channel contract consumed by sound fields
pub trait AudioBackend: Send + Sync {
    fn allocate_channel(&self) -> WavyResult<ChannelId>;
    fn play(&self, id: ChannelId, waveform: Arc<Waveform>, looping: bool) -> WavyResult<()>;
    /// Gains are clamped into `[0, 1]`
    fn set_volume(&self, id: ChannelId, left: f32, right: f32);
    fn release(&self, id: ChannelId);
}

/// Exclusive handle on one playback channel, returned to the pool on drop
pub struct Channel {
    id: ChannelId,
    backend: Arc<dyn AudioBackend>,
}

impl Channel {
    pub fn acquire(backend: &Arc<dyn AudioBackend>) -> WavyResult<Self> {
        let id = backend.allocate_channel()?;
        Ok(Self {
            id,
            backend: Arc::clone(backend),
        })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn play(&self, waveform: Arc<Waveform>, looping: bool) -> WavyResult<()> {
        self.backend.play(self.id, waveform, looping)
    }

    #[inline]
    pub fn set_volume(&self, left: f32, right: f32) {
        self.backend.set_volume(self.id, left, right);
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.backend.release(self.id);
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("id", &self.id).finish()
    }
}

/// Mixer settings
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Output rate in Hz
    pub sample_rate: u32,
    /// Number of playback channels in the pool
    pub capacity: usize,
    /// Gain applied to the summed mix before soft clipping
    pub master_gain: f32,
    /// Time for a channel gain to travel the full `0..1` range
    pub gain_ramp_ms: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            capacity: 64,
            master_gain: 0.8,
            gain_ramp_ms: 10.0,
        }
    }
}

#[derive(Default)]
struct Slot {
    allocated: bool,
    playing: bool,
    looping: bool,
    waveform: Option<Arc<Waveform>>,
    /// Read position in waveform frames
    position: f64,
    /// Waveform frames advanced per output frame
    step: f64,
    gain: [f32; 2],
    target: [f32; 2],
}

impl Slot {
    fn reset(&mut self) {
        *self = Slot::default();
    }

    #[inline]
    fn next(&mut self, slew: f32) -> (f32, f32) {
        for (g, t) in self.gain.iter_mut().zip(self.target) {
            *g += (t - *g).clamp(-slew, slew);
        }

        let Some(wave) = self.waveform.as_ref() else {
            return (0.0, 0.0);
        };
        let frames = wave.frames();

        let idx = self.position as usize;
        let frac = (self.position - idx as f64) as f32;
        let (mut l, mut r) = wave.frame(idx);

        // Linear interpolation toward the next frame when resampling
        if frac > 0.0 {
            let next = if idx + 1 < frames {
                Some(idx + 1)
            } else if self.looping {
                Some(0)
            } else {
                None
            };
            if let Some(n) = next {
                let (nl, nr) = wave.frame(n);
                l += (nl - l) * frac;
                r += (nr - r) * frac;
            }
        }

        self.position += self.step;
        if self.position >= frames as f64 {
            if self.looping {
                self.position %= frames as f64;
            } else {
                self.playing = false;
            }
        }

        (l * self.gain[0], r * self.gain[1])
    }
}

/// Software mixer over a fixed pool of looping channels
pub struct Mixer {
    config: MixerConfig,
    slots: Vec<Slot>,
    /// Maximum gain change per output frame
    slew: f32,
}

impl Mixer {
    pub fn new(config: MixerConfig) -> WavyResult<Self> {
        if config.sample_rate == 0 {
            return Err(WavyError::config("mixer sample rate must be positive"));
        }
        if config.capacity == 0 {
            return Err(WavyError::config("mixer needs at least one channel"));
        }
        if !config.master_gain.is_finite() || config.master_gain < 0.0 {
            return Err(WavyError::config(format!(
                "master gain must be finite and >= 0, got {}",
                config.master_gain
            )));
        }
        if !config.gain_ramp_ms.is_finite() || config.gain_ramp_ms < 0.0 {
            return Err(WavyError::config(format!(
                "gain ramp must be finite and >= 0 ms, got {}",
                config.gain_ramp_ms
            )));
        }

        let ramp_frames = config.gain_ramp_ms * config.sample_rate as f32 / 1000.0;
        let slew = if ramp_frames < 1.0 { 1.0 } else { 1.0 / ramp_frames };
        let slots = (0..config.capacity).map(|_| Slot::default()).collect();

        debug!(
            "Mixer: {} channels at {} Hz, ramp {} ms",
            config.capacity, config.sample_rate, config.gain_ramp_ms
        );
        Ok(Self {
            config,
            slots,
            slew,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Channels currently claimed from the pool
    pub fn allocated(&self) -> usize {
        self.slots.iter().filter(|s| s.allocated).count()
    }

    /// Current (smoothed) gains of a channel
    pub fn gains(&self, id: ChannelId) -> Option<(f32, f32)> {
        self.slots
            .get(id)
            .filter(|s| s.allocated)
            .map(|s| (s.gain[0], s.gain[1]))
    }

    /// Requested gains of a channel, before smoothing
    pub fn target_gains(&self, id: ChannelId) -> Option<(f32, f32)> {
        self.slots
            .get(id)
            .filter(|s| s.allocated)
            .map(|s| (s.target[0], s.target[1]))
    }

    pub fn is_playing(&self, id: ChannelId) -> bool {
        self.slots.get(id).map_or(false, |s| s.allocated && s.playing)
    }

    pub fn allocate(&mut self) -> WavyResult<ChannelId> {
        let id = self
            .slots
            .iter()
            .position(|s| !s.allocated)
            .ok_or_else(|| {
                WavyError::Audio(format!(
                    "all {} playback channels are in use",
                    self.slots.len()
                ))
            })?;
        let slot = &mut self.slots[id];
        slot.reset();
        slot.allocated = true;
        Ok(id)
    }

    pub fn play(&mut self, id: ChannelId, waveform: Arc<Waveform>, looping: bool) -> WavyResult<()> {
        let rate = self.config.sample_rate;
        let slot = self
            .slots
            .get_mut(id)
            .filter(|s| s.allocated)
            .ok_or_else(|| WavyError::Audio(format!("channel {} is not allocated", id)))?;

        slot.step = waveform.sample_rate() as f64 / rate as f64;
        slot.waveform = Some(waveform);
        slot.position = 0.0;
        slot.looping = looping;
        slot.playing = true;
        Ok(())
    }

    pub fn set_volume(&mut self, id: ChannelId, left: f32, right: f32) {
        if let Some(slot) = self.slots.get_mut(id).filter(|s| s.allocated) {
            slot.target = [clamp_gain(left), clamp_gain(right)];
        }
    }

    pub fn release(&mut self, id: ChannelId) {
        if let Some(slot) = self.slots.get_mut(id) {
            slot.reset();
        }
    }

    /// Mix the next output frame as `(left, right)`
    #[inline]
    pub fn next_frame(&mut self) -> (f32, f32) {
        let slew = self.slew;
        let (mut left, mut right) = (0.0f32, 0.0f32);

        for slot in self.slots.iter_mut().filter(|s| s.playing) {
            let (l, r) = slot.next(slew);
            left += l;
            right += r;
        }

        // Soft clipping to prevent distortion
        let gain = self.config.master_gain;
        ((left * gain).tanh(), (right * gain).tanh())
    }

    /// Fill an interleaved buffer. Channel 0 is left, channel 1 right, extra
    /// channels are silent; a mono device gets the average.
    pub fn render_into(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in output.chunks_mut(channels) {
            let (l, r) = self.next_frame();
            match frame {
                [mono] => *mono = 0.5 * (l + r),
                [fl, fr, rest @ ..] => {
                    *fl = l;
                    *fr = r;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }
}

fn clamp_gain(g: f32) -> f32 {
    if g.is_nan() {
        0.0
    } else {
        g.clamp(0.0, 1.0)
    }
}

/// Thread-safe mixer handle shared by the retina (control) and the device (render)
#[derive(Clone)]
pub struct SharedMixer {
    inner: Arc<Mutex<Mixer>>,
}

impl SharedMixer {
    pub fn new(config: MixerConfig) -> WavyResult<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(Mixer::new(config)?)),
        })
    }

    /// Lock the mixer. A panic on another thread does not leave the mix unusable.
    pub fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn render_into(&self, output: &mut [f32], channels: usize) {
        self.lock().render_into(output, channels);
    }

    pub fn backend(&self) -> Arc<dyn AudioBackend> {
        Arc::new(self.clone())
    }
}

impl AudioBackend for SharedMixer {
    fn allocate_channel(&self) -> WavyResult<ChannelId> {
        self.lock().allocate()
    }

    fn play(&self, id: ChannelId, waveform: Arc<Waveform>, looping: bool) -> WavyResult<()> {
        self.lock().play(id, waveform, looping)
    }

    fn set_volume(&self, id: ChannelId, left: f32, right: f32) {
        self.lock().set_volume(id, left, right);
    }

    fn release(&self, id: ChannelId) {
        self.lock().release(id);
    }
}

/// Live output stream pulling from a [`SharedMixer`]
pub struct CpalOutput {
    mixer: SharedMixer,
    sample_rate: u32,
    channels: usize,
    _stream: cpal::Stream,
}

impl CpalOutput {
    /// Open the default output device and start streaming. The mixer is built
    /// at the device rate, overriding `config.sample_rate`.
    pub fn start(mut config: MixerConfig) -> WavyResult<Self> {
        let host = cpal::default_host();
        info!("Audio host: {:?}", host.id());

        let device = host
            .default_output_device()
            .ok_or_else(|| WavyError::Audio("No audio output device found".into()))?;
        info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        let supported = device
            .default_output_config()
            .map_err(|e| WavyError::Audio(format!("no default output config: {}", e)))?;
        info!("Audio config: {:?}", supported);

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        config.sample_rate = sample_rate;
        let mixer = SharedMixer::new(config)?;

        let stream_config: cpal::StreamConfig = supported.config();
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &stream_config, mixer.clone(), channels)
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &stream_config, mixer.clone(), channels)
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &stream_config, mixer.clone(), channels)
            }
            other => {
                return Err(WavyError::Audio(format!(
                    "Unsupported sample format {:?}",
                    other
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| WavyError::Audio(format!("could not start stream: {}", e)))?;
        info!("Audio stream started at {} Hz, {} channels", sample_rate, channels);

        Ok(Self {
            mixer,
            sample_rate,
            channels,
            _stream: stream,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mixer: SharedMixer,
        channels: usize,
    ) -> WavyResult<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let mut scratch: Vec<f32> = Vec::new();
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    mixer.render_into(&mut scratch, channels);
                    for (out, &s) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(s);
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| WavyError::Audio(format!("could not build stream: {}", e)))
    }

    pub fn mixer(&self) -> &SharedMixer {
        &self.mixer
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc_wave(value: i16, frames: usize) -> Arc<Waveform> {
        Arc::new(Waveform::new(44100, 2, vec![value; frames * 2]).unwrap())
    }

    fn mixer(capacity: usize, ramp_ms: f32) -> Mixer {
        Mixer::new(MixerConfig {
            sample_rate: 44100,
            capacity,
            master_gain: 1.0,
            gain_ramp_ms: ramp_ms,
        })
        .unwrap()
    }

    #[test]
    fn test_waveform_shape_checks() {
        assert!(Waveform::new(44100, 2, vec![0; 3]).is_err());
        assert!(Waveform::new(44100, 2, Vec::new()).is_err());
        assert!(Waveform::new(0, 2, vec![0; 2]).is_err());
        let w = Waveform::new(100, 2, vec![0; 200]).unwrap();
        assert_eq!(w.frames(), 100);
        assert!((w.duration_secs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pool_exhaustion_and_reuse() {
        let mut m = mixer(2, 0.0);
        let a = m.allocate().unwrap();
        let b = m.allocate().unwrap();
        assert_ne!(a, b);
        assert!(matches!(m.allocate(), Err(WavyError::Audio(_))));
        m.release(a);
        assert_eq!(m.allocate().unwrap(), a);
    }

    #[test]
    fn test_silent_until_volume_set() {
        let mut m = mixer(1, 0.0);
        let id = m.allocate().unwrap();
        m.play(id, dc_wave(16384, 8), true).unwrap();
        assert_eq!(m.next_frame(), (0.0, 0.0));

        m.set_volume(id, 1.0, 0.0);
        let (l, r) = m.next_frame();
        assert!((l - 0.5f32.tanh()).abs() < 1e-6, "left = {}", l);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn test_gain_ramps_instead_of_jumping() {
        // 1 ms at 44.1 kHz = 44.1 frames for a full-scale move
        let mut m = mixer(1, 1.0);
        let id = m.allocate().unwrap();
        m.play(id, dc_wave(16384, 64), true).unwrap();
        m.set_volume(id, 1.0, 1.0);

        m.next_frame();
        let (gl, _) = m.gains(id).unwrap();
        assert!(gl > 0.0 && gl < 0.05, "first step should be small, got {}", gl);

        for _ in 0..60 {
            m.next_frame();
        }
        assert_eq!(m.gains(id), Some((1.0, 1.0)));
    }

    #[test]
    fn test_looping_wraps_and_one_shot_stops() {
        let mut m = mixer(2, 0.0);
        let looped = m.allocate().unwrap();
        let once = m.allocate().unwrap();
        m.play(looped, dc_wave(1000, 4), true).unwrap();
        m.play(once, dc_wave(1000, 4), false).unwrap();

        for _ in 0..10 {
            m.next_frame();
        }
        assert!(m.is_playing(looped));
        assert!(!m.is_playing(once));
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut m = mixer(1, 0.0);
        let id = m.allocate().unwrap();
        m.set_volume(id, 3.0, -1.0);
        assert_eq!(m.target_gains(id), Some((1.0, 0.0)));
        m.set_volume(id, f32::NAN, 0.5);
        assert_eq!(m.target_gains(id), Some((0.0, 0.5)));
    }

    #[test]
    fn test_render_into_layouts() {
        let mut m = mixer(1, 0.0);
        let id = m.allocate().unwrap();
        m.play(id, dc_wave(16384, 16), true).unwrap();
        m.set_volume(id, 1.0, 0.5);

        let mut quad = vec![9.0f32; 8];
        m.render_into(&mut quad, 4);
        assert!(quad[0] > quad[1] && quad[1] > 0.0);
        assert_eq!(&quad[2..4], &[0.0, 0.0]);

        let mut mono = vec![0.0f32; 2];
        m.render_into(&mut mono, 1);
        assert!(mono[0] > 0.0);
    }

    #[test]
    fn test_channel_handle_releases_on_drop() {
        let shared = SharedMixer::new(MixerConfig {
            capacity: 1,
            ..MixerConfig::default()
        })
        .unwrap();
        let backend = shared.backend();
        {
            let channel = Channel::acquire(&backend).unwrap();
            channel.play(dc_wave(0, 4), true).unwrap();
            assert_eq!(shared.lock().allocated(), 1);
            assert!(Channel::acquire(&backend).is_err());
        }
        assert_eq!(shared.lock().allocated(), 0);
        assert!(Channel::acquire(&backend).is_ok());
    }

    #[test]
    fn test_resampling_step() {
        let mut m = Mixer::new(MixerConfig {
            sample_rate: 22050,
            capacity: 1,
            master_gain: 1.0,
            gain_ramp_ms: 0.0,
        })
        .unwrap();
        let id = m.allocate().unwrap();
        // 4 frames at 44.1 kHz are consumed in 2 output frames
        m.play(id, dc_wave(1000, 4), false).unwrap();
        m.next_frame();
        assert!(m.is_playing(id));
        m.next_frame();
        assert!(!m.is_playing(id));
    }
}
