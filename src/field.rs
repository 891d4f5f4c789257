//! Receptive fields and their output capability
//!
//! A [`ReceptiveField`] turns a cluster of captors into one activity value in
//! `[0, 1]`. What happens with that value is decided by a [`FieldOutput`]
//! chosen when the retina is built; [`SoundOutput`](crate::sound::SoundOutput)
//! is the audio variant.

use crate::pixel::PixelSource;
use crate::topology::{Captor, FieldSpec};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Hard cutoff: values at or below the threshold are fully suppressed
#[inline]
pub fn threshold_transfer(raw: f32, threshold: f32) -> f32 {
    if raw > threshold {
        raw
    } else {
        0.0
    }
}

/// One spatial sampling unit
#[derive(Clone, Debug)]
pub struct ReceptiveField {
    x: u32,
    y: u32,
    captors: Vec<Captor>,
    /// Normalized cutoff in `[0, 1]`
    threshold: f32,
    activity: f32,
}

impl ReceptiveField {
    pub fn new(spec: &FieldSpec, threshold: f32) -> Self {
        Self {
            x: spec.x,
            y: spec.y,
            captors: spec.captors.clone(),
            threshold,
            activity: 0.0,
        }
    }

    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn captors(&self) -> &[Captor] {
        &self.captors
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Activity computed by the last [`update`](Self::update)
    pub fn activity(&self) -> f32 {
        self.activity
    }

    /// Sample every captor, normalize by `255 * captor_count`, apply the threshold.
    ///
    /// Bounded by the captor count; no I/O beyond the pixel probe.
    pub fn update<P: PixelSource + ?Sized>(&mut self, source: &P) -> f32 {
        let sum: u32 = self
            .captors
            .iter()
            .map(|c| source.sample(c.x, c.y) as u32)
            .sum();
        let raw = sum as f32 / (255.0 * self.captors.len() as f32);
        self.activity = threshold_transfer(raw, self.threshold);
        self.activity
    }
}

/// Observable side effect driven by a field's activity, invoked once per frame
pub trait FieldOutput: Send {
    fn output(&mut self, activity: f32);
}

impl<T: FieldOutput + ?Sized> FieldOutput for Box<T> {
    fn output(&mut self, activity: f32) {
        (**self).output(activity)
    }
}

/// Discards activity. Useful for inspecting a topology without a sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullOutput;

impl FieldOutput for NullOutput {
    fn output(&mut self, _activity: f32) {}
}

/// Publishes each field's activity into a shared table readable from other threads
#[derive(Clone, Debug)]
pub struct ActivityTap {
    index: usize,
    levels: Arc<[AtomicU32]>,
}

impl ActivityTap {
    /// Shared table sized for `fields` entries, all zero
    pub fn table(fields: usize) -> Arc<[AtomicU32]> {
        (0..fields).map(|_| AtomicU32::new(0)).collect()
    }

    pub fn new(index: usize, levels: Arc<[AtomicU32]>) -> Self {
        Self { index, levels }
    }

    /// Read entry `index` of a table
    pub fn read(levels: &[AtomicU32], index: usize) -> f32 {
        f32::from_bits(levels[index].load(Ordering::Relaxed))
    }
}

impl FieldOutput for ActivityTap {
    fn output(&mut self, activity: f32) {
        self.levels[self.index].store(activity.to_bits(), Ordering::Relaxed);
    }
}
