//! Offline sonification
//!
//! Drives a retina with a synthetic stimulus at a fixed frame rate and pulls
//! the matching stretch of audio from the mixer after every sweep, so gains
//! computed for frame N only ever shape audio of frame N. The result can be
//! written to a 16-bit stereo WAV file.

use crate::audio::SharedMixer;
use crate::error::{WavyError, WavyResult};
use crate::field::FieldOutput;
use crate::pixel::LumaFrame;
use crate::retina::Retina;
use crate::stimulus::Stimulus;
use std::path::Path;
use tracing::{debug, info};

/// Configuration for an offline run
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Retina sweeps per second
    pub fps: u32,
    /// Duration in seconds
    pub duration: f32,
    /// Fade in time in seconds
    pub fade_in: f32,
    /// Fade out time in seconds
    pub fade_out: f32,
    /// Use the rayon sweep instead of the sequential one
    pub parallel: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: 25,
            duration: 4.0,
            fade_in: 0.01,
            fade_out: 0.01,
            parallel: false,
        }
    }
}

/// Renderer for stimulus-driven retinas
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> WavyResult<Self> {
        if config.fps == 0 {
            return Err(WavyError::config("render fps must be positive"));
        }
        if !config.duration.is_finite() || config.duration <= 0.0 {
            return Err(WavyError::config(format!(
                "render duration must be positive, got {}",
                config.duration
            )));
        }
        Ok(Self { config })
    }

    /// Render interleaved stereo samples at the mixer's rate
    pub fn render_to_buffer<O: FieldOutput>(
        &self,
        retina: &mut Retina<O>,
        mixer: &SharedMixer,
        stimulus: &Stimulus,
    ) -> Vec<f32> {
        let sample_rate = mixer.lock().sample_rate() as u64;
        let fps = self.config.fps as u64;
        let geometry = retina.geometry();
        let mut frame = LumaFrame::new(geometry.width, geometry.height);

        let total = (self.config.duration as f64 * sample_rate as f64).round() as u64;
        let mut samples = Vec::with_capacity(total as usize * 2);
        let mut done = 0u64;
        let mut sweep = 0u64;

        while done < total {
            let t = sweep as f64 / fps as f64;
            stimulus.draw(&mut frame, t);
            if self.config.parallel {
                retina.update_parallel(&frame);
            } else {
                retina.update(&frame);
            }

            // Sample-exact frame boundaries, no drift over long runs
            let end = ((sweep + 1) * sample_rate / fps).min(total);
            let count = (end - done) as usize;
            let start = samples.len();
            samples.resize(start + count * 2, 0.0);
            mixer.render_into(&mut samples[start..], 2);

            done = end;
            sweep += 1;
        }

        debug!("Rendered {} sweeps, {} frames", sweep, total);
        self.apply_fades(&mut samples, sample_rate as f32);
        samples
    }

    /// Render and write a WAV file
    pub fn render_to_file<O: FieldOutput>(
        &self,
        retina: &mut Retina<O>,
        mixer: &SharedMixer,
        stimulus: &Stimulus,
        output_path: &Path,
    ) -> WavyResult<RenderStats> {
        let sample_rate = mixer.lock().sample_rate();
        let samples = self.render_to_buffer(retina, mixer, stimulus);
        let stats = RenderStats::from_samples(&samples, sample_rate);
        write_wav(output_path, &samples, sample_rate)?;
        info!(
            "Wrote {} ({:.2}s, peak {:.3}, rms {:.3})",
            output_path.display(),
            stats.duration,
            stats.peak,
            stats.rms
        );
        Ok(stats)
    }

    /// Apply fade in and fade out to interleaved stereo samples
    fn apply_fades(&self, samples: &mut [f32], sample_rate: f32) {
        let frames = samples.len() / 2;

        if self.config.fade_in > 0.0 {
            let fade_in_frames = (self.config.fade_in * sample_rate) as usize;
            for i in 0..fade_in_frames.min(frames) {
                let gain = i as f32 / fade_in_frames as f32;
                samples[2 * i] *= gain;
                samples[2 * i + 1] *= gain;
            }
        }

        if self.config.fade_out > 0.0 {
            let fade_out_frames = (self.config.fade_out * sample_rate) as usize;
            let start = frames.saturating_sub(fade_out_frames);
            for i in start..frames {
                let gain = (frames - 1 - i) as f32 / fade_out_frames as f32;
                samples[2 * i] *= gain;
                samples[2 * i + 1] *= gain;
            }
        }
    }
}

/// Write interleaved stereo samples as 16-bit PCM
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> WavyResult<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        // Clamp to prevent overflow
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Statistics about rendered audio
#[derive(Debug, Clone)]
pub struct RenderStats {
    pub duration: f32,
    /// Stereo frames
    pub frame_count: usize,
    pub rms: f32,
    pub peak: f32,
    /// RMS of the left and right channels
    pub balance: (f32, f32),
}

impl RenderStats {
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        let frame_count = samples.len() / 2;
        if frame_count == 0 {
            return Self {
                duration: 0.0,
                frame_count,
                rms: 0.0,
                peak: 0.0,
                balance: (0.0, 0.0),
            };
        }

        let sum_squares: f32 = samples.iter().map(|x| x * x).sum();
        let rms = (sum_squares / samples.len() as f32).sqrt();
        let peak = samples.iter().map(|x| x.abs()).fold(0.0f32, f32::max);

        let channel_rms = |offset: usize| {
            let sum: f32 = samples.iter().skip(offset).step_by(2).map(|x| x * x).sum();
            (sum / frame_count as f32).sqrt()
        };

        Self {
            duration: frame_count as f32 / sample_rate as f32,
            frame_count,
            rms,
            peak,
            balance: (channel_rms(0), channel_rms(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_render_config() {
        assert!(Renderer::new(RenderConfig {
            fps: 0,
            ..RenderConfig::default()
        })
        .is_err());
        assert!(Renderer::new(RenderConfig {
            duration: 0.0,
            ..RenderConfig::default()
        })
        .is_err());
    }

    #[test]
    fn test_stats_of_silence_and_tone() {
        let silent = RenderStats::from_samples(&[0.0; 200], 100);
        assert_eq!(silent.frame_count, 100);
        assert_eq!(silent.peak, 0.0);
        assert!((silent.duration - 1.0).abs() < 1e-6);

        let left_only: Vec<f32> = (0..100).flat_map(|_| [0.5, 0.0]).collect();
        let stats = RenderStats::from_samples(&left_only, 100);
        assert_eq!(stats.peak, 0.5);
        assert!(stats.balance.0 > 0.49 && stats.balance.1 == 0.0);
    }

    #[test]
    fn test_fades_reach_zero_at_edges() {
        let renderer = Renderer::new(RenderConfig {
            fade_in: 0.1,
            fade_out: 0.1,
            ..RenderConfig::default()
        })
        .unwrap();
        let mut samples = vec![1.0f32; 200];
        renderer.apply_fades(&mut samples, 100.0);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[198], 0.0);
        assert_eq!(samples[100], 1.0);
    }
}
