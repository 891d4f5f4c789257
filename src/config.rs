//! Session configuration loaded from TOML
//!
//! ```toml
//! [retina]
//! file = "retina.ret"
//! threshold = 0.1
//!
//! [sonification]
//! sample_rate = 44100
//! amplitude = 10000
//! freq_min = 200.0
//! freq_max = 2000.0
//! play_duration = 1.0
//! flip_y = false
//!
//! [mixer]
//! master_gain = 0.8
//! gain_ramp_ms = 10.0
//!
//! [stimulus]
//! preset = "sweep"
//! fps = 25
//! ```
//!
//! Every key has a default, so an empty file is a valid configuration.

use crate::audio::MixerConfig;
use crate::error::{WavyError, WavyResult};
use crate::sound::SoundParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetinaSection {
    /// Topology file, relative paths resolve against the config file's directory
    pub file: PathBuf,
    /// Normalized activity cutoff in `[0, 1]`
    pub threshold: f32,
}

impl Default for RetinaSection {
    fn default() -> Self {
        Self {
            file: PathBuf::from("retina.ret"),
            threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSection {
    pub master_gain: f32,
    pub gain_ramp_ms: f32,
    /// Size of the playback-channel pool, 0 means twice the field count
    pub max_channels: usize,
}

impl Default for MixerSection {
    fn default() -> Self {
        Self {
            master_gain: 0.8,
            gain_ramp_ms: 10.0,
            max_channels: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusSection {
    pub preset: String,
    /// Retina sweeps per second
    pub fps: u32,
}

impl Default for StimulusSection {
    fn default() -> Self {
        Self {
            preset: "sweep".to_string(),
            fps: 25,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavyConfig {
    pub retina: RetinaSection,
    pub sonification: SoundParams,
    pub mixer: MixerSection,
    pub stimulus: StimulusSection,
}

impl WavyConfig {
    /// Load and validate a config file. A relative retina path is resolved
    /// against the directory holding the config.
    pub fn load(path: impl AsRef<Path>) -> WavyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| WavyError::io(path, e))?;
        let mut config = Self::parse(&content)?;

        if config.retina.file.is_relative() {
            if let Some(dir) = path.parent() {
                config.retina.file = dir.join(&config.retina.file);
            }
        }

        info!("Loaded config {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> WavyResult<Self> {
        let config: WavyConfig = toml::from_str(content)
            .map_err(|e| WavyError::config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> WavyResult<String> {
        toml::to_string_pretty(self).map_err(|e| WavyError::config(e.to_string()))
    }

    pub fn validate(&self) -> WavyResult<()> {
        if !(0.0..=1.0).contains(&self.retina.threshold) {
            return Err(WavyError::config(format!(
                "retina.threshold must be in [0, 1], got {}",
                self.retina.threshold
            )));
        }
        self.sonification.validate()?;
        if self.stimulus.fps == 0 {
            return Err(WavyError::config("stimulus.fps must be positive"));
        }
        Ok(())
    }

    /// Mixer settings for a retina of `fields` fields at `sample_rate`
    pub fn mixer_config(&self, fields: usize, sample_rate: u32) -> MixerConfig {
        let capacity = if self.mixer.max_channels == 0 {
            (fields * 2).max(1)
        } else {
            self.mixer.max_channels
        };
        MixerConfig {
            sample_rate,
            capacity,
            master_gain: self.mixer.master_gain,
            gain_ramp_ms: self.mixer.gain_ramp_ms,
        }
    }
}
