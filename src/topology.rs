//! Declarative retina description: receptive field positions and their captors
//!
//! A topology is independent of any sensor resolution. It names a grid
//! (`width` x `height`) and, for every receptive field, the pixel probes
//! ("captors") whose brightness it aggregates. Field order is meaningful only
//! in that it fixes the order in which playback channels are claimed.

use crate::error::{WavyError, WavyResult};
use serde::{Deserialize, Serialize};

/// A single pixel probe feeding a receptive field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Captor {
    pub x: u32,
    pub y: u32,
}

impl Captor {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl From<(u32, u32)> for Captor {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// Position and captor list of one receptive field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub x: u32,
    pub y: u32,
    pub captors: Vec<Captor>,
}

impl FieldSpec {
    pub fn new(x: u32, y: u32, captors: Vec<Captor>) -> Self {
        Self { x, y, captors }
    }
}

/// Grid extents handed to field factories in place of a back-reference to the retina
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }
}

/// The full retina description
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetinaTopology {
    pub width: u32,
    pub height: u32,
    pub fields: Vec<FieldSpec>,
}

impl RetinaTopology {
    pub fn new(width: u32, height: u32, fields: Vec<FieldSpec>) -> Self {
        Self {
            width,
            height,
            fields,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            width: self.width,
            height: self.height,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Total number of captors across all fields
    pub fn captor_count(&self) -> usize {
        self.fields.iter().map(|f| f.captors.len()).sum()
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of all field positions and captors.
    /// `None` for an empty topology.
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let points = self.fields.iter().flat_map(|f| {
            std::iter::once((f.x, f.y)).chain(f.captors.iter().map(|c| (c.x, c.y)))
        });

        points.fold(None, |acc, (x, y)| match acc {
            None => Some((x, y, x, y)),
            Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
        })
    }

    /// Check the structural invariants: non-empty grid and field list, at
    /// least one captor per field, every coordinate inside the grid.
    pub fn validate(&self) -> WavyResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(WavyError::format(
                1,
                format!("grid size must be positive, got {}x{}", self.width, self.height),
            ));
        }
        if self.fields.is_empty() {
            return Err(WavyError::format(0, "topology declares no receptive fields"));
        }

        let geometry = self.geometry();
        for (index, field) in self.fields.iter().enumerate() {
            if field.captors.is_empty() {
                return Err(WavyError::format(
                    record_line(index) + 1,
                    format!("field {} has no captors", index),
                ));
            }

            let points = std::iter::once((field.x, field.y))
                .chain(field.captors.iter().map(|c| (c.x, c.y)));
            for (x, y) in points {
                if !geometry.contains(x, y) {
                    return Err(WavyError::CaptorOutOfBounds {
                        field: index,
                        x,
                        y,
                        width: self.width,
                        height: self.height,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Line number of the position record of field `index` in the text layout
pub(crate) fn record_line(index: usize) -> usize {
    2 + index * 2
}
