//! Retina - ordered collection of receptive fields driven once per frame
//!
//! The retina owns its fields and their outputs but not the pixel data: the
//! current frame is passed to every [`Retina::update`] call, so there is no
//! cached buffer reference to go stale when the producer swaps frames.
//!
//! ```rust
//! use wavy::codec;
//! use wavy::field::NullOutput;
//! use wavy::pixel::LumaFrame;
//! use wavy::retina::Retina;
//!
//! let topology = codec::parse("4;4\n2;2\n1;1;1;2;2;1;2;2\n").unwrap();
//! let mut retina = Retina::new(topology, 0.0, |_, _| Ok(NullOutput)).unwrap();
//!
//! retina.update(&LumaFrame::filled(4, 4, 255));
//! assert_eq!(retina.activities(), vec![1.0]);
//! ```

use crate::capture::FrameSlot;
use crate::error::{WavyError, WavyResult};
use crate::field::{FieldOutput, ReceptiveField};
use crate::pixel::PixelSource;
use crate::topology::{FieldSpec, Geometry, RetinaTopology};
use rayon::prelude::*;
use tracing::{debug, info, trace};

/// A receptive field paired with the sink its activity drives
pub struct Unit<O> {
    pub field: ReceptiveField,
    pub output: O,
}

/// Ordered set of receptive fields built from one topology, swept once per frame
pub struct Retina<O> {
    topology: RetinaTopology,
    units: Vec<Unit<O>>,
    sweeps: u64,
}

impl<O: FieldOutput> Retina<O> {
    /// Build one field per [`FieldSpec`], in topology order.
    ///
    /// `factory` chooses the output for each field. The topology is validated
    /// first; if validation or any factory call fails nothing is kept, and
    /// outputs created so far are dropped.
    pub fn new<F>(topology: RetinaTopology, threshold: f32, mut factory: F) -> WavyResult<Self>
    where
        F: FnMut(&FieldSpec, Geometry) -> WavyResult<O>,
    {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(WavyError::config(format!(
                "threshold must be in [0, 1], got {}",
                threshold
            )));
        }
        topology.validate()?;

        let geometry = topology.geometry();
        let units = topology
            .fields
            .iter()
            .map(|spec| {
                Ok(Unit {
                    field: ReceptiveField::new(spec, threshold),
                    output: factory(spec, geometry)?,
                })
            })
            .collect::<WavyResult<Vec<_>>>()?;

        info!(
            "Retina ready: {}x{}, {} fields, threshold {}",
            topology.width,
            topology.height,
            units.len(),
            threshold
        );

        Ok(Self {
            topology,
            units,
            sweeps: 0,
        })
    }

    pub fn field_count(&self) -> usize {
        self.units.len()
    }

    pub fn geometry(&self) -> Geometry {
        self.topology.geometry()
    }

    pub fn topology(&self) -> &RetinaTopology {
        &self.topology
    }

    pub fn units(&self) -> &[Unit<O>] {
        &self.units
    }

    pub fn fields(&self) -> impl Iterator<Item = &ReceptiveField> {
        self.units.iter().map(|u| &u.field)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &O> {
        self.units.iter().map(|u| &u.output)
    }

    /// Activities from the most recent sweep, in topology order
    pub fn activities(&self) -> Vec<f32> {
        self.fields().map(|f| f.activity()).collect()
    }

    /// Number of completed sweeps
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Check that every captor indexes into `source`
    pub fn check_source<P: PixelSource + ?Sized>(&self, source: &P) -> WavyResult<()> {
        let (w, h) = (source.width(), source.height());
        if w >= self.topology.width && h >= self.topology.height {
            return Ok(());
        }

        for (index, field) in self.fields().enumerate() {
            if let Some(c) = field.captors().iter().find(|c| c.x >= w || c.y >= h) {
                return Err(WavyError::CaptorOutOfBounds {
                    field: index,
                    x: c.x,
                    y: c.y,
                    width: w,
                    height: h,
                });
            }
        }
        Ok(())
    }

    /// One synchronous sweep: each field samples `source` then emits its output.
    ///
    /// The source must cover the retina grid (see [`check_source`](Self::check_source)).
    pub fn update<P: PixelSource + ?Sized>(&mut self, source: &P) {
        debug_assert!(
            self.check_source(source).is_ok(),
            "pixel source {}x{} does not cover the retina grid",
            source.width(),
            source.height()
        );

        for (index, unit) in self.units.iter_mut().enumerate() {
            let activity = unit.field.update(source);
            unit.output.output(activity);
            trace!(field = index, activity, "field updated");
        }
        self.finish_sweep();
    }

    /// Sample all fields on the rayon pool, then apply outputs in topology order.
    ///
    /// Returns only once every output of the frame has been applied.
    pub fn update_parallel<P: PixelSource + ?Sized>(&mut self, source: &P) {
        debug_assert!(self.check_source(source).is_ok());

        self.units.par_iter_mut().for_each(|unit| {
            unit.field.update(source);
        });
        for unit in &mut self.units {
            unit.output.output(unit.field.activity());
        }
        self.finish_sweep();
    }

    /// Sweep over the frame current in `slot` when the call starts
    pub fn update_from(&mut self, slot: &FrameSlot) {
        let frame = slot.snapshot();
        self.update(frame.as_ref());
    }

    fn finish_sweep(&mut self) {
        self.sweeps += 1;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let active = self.fields().filter(|f| f.activity() > 0.0).count();
            debug!(sweep = self.sweeps, active, "retina sweep complete");
        }
    }
}
