//! # Wavy - Visual-to-Auditory Sensory Substitution
//!
//! Wavy turns a 2-D brightness signal into a continuous multi-channel sound.
//! A *retina* of receptive fields samples the image every frame; each field
//! owns one looping sine tone whose pitch follows the field's height and whose
//! stereo balance follows its horizontal position. The field's brightness sets
//! the tone's loudness.
//!
//! ## Quick Start
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use wavy::audio::{MixerConfig, SharedMixer};
//! use wavy::generators::generate_grid;
//! use wavy::pixel::LumaFrame;
//! use wavy::retina::Retina;
//! use wavy::sound::{sound_factory, SoundParams};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let topology = generate_grid(64, 48, 16, 16, 4, 1.5, &mut rng).unwrap();
//!
//! let mixer = SharedMixer::new(MixerConfig {
//!     capacity: topology.field_count(),
//!     ..MixerConfig::default()
//! })
//! .unwrap();
//! let factory = sound_factory(SoundParams::default(), mixer.backend()).unwrap();
//! let mut retina = Retina::new(topology, 0.1, factory).unwrap();
//!
//! let mut frame = LumaFrame::new(64, 48);
//! frame.fill_disc(10, 10, 6, 255);
//! retina.update(&frame);
//!
//! let mut out = vec![0.0f32; 512];
//! mixer.render_into(&mut out, 2);
//! ```
//!
//! ## Architecture
//!
//! 1. [`codec`] reads and writes the `.ret` topology format; [`generators`]
//!    builds lattice or random topologies
//! 2. [`retina::Retina`] owns one [`field::ReceptiveField`] per topology entry,
//!    each paired with a [`field::FieldOutput`] chosen by a factory
//! 3. Every frame, [`retina::Retina::update`] samples a [`pixel::PixelSource`],
//!    thresholds, and hands activity to the outputs
//! 4. [`sound::SoundOutput`] turns activity into channel gains on an
//!    [`audio::AudioBackend`]; [`audio::SharedMixer`] mixes and
//!    [`audio::CpalOutput`] plays
//! 5. [`render`] runs the same loop offline into a WAV file

pub mod audio;
pub mod capture;
pub mod codec;
pub mod config;
pub mod error;
pub mod field;
pub mod generators;
pub mod pixel;
pub mod render;
pub mod retina;
pub mod sound;
pub mod stimulus;
pub mod topology;

pub use error::{WavyError, WavyResult};
pub use retina::Retina;
pub use topology::{Captor, FieldSpec, Geometry, RetinaTopology};
