//! Synthetic topology builders
//!
//! Both builders are pure functions of their parameters and the injected
//! random source. Seed a [`rand::rngs::StdRng`] for reproducible retinas.

use crate::error::{WavyError, WavyResult};
use crate::topology::{Captor, FieldSpec, RetinaTopology};
use rand::Rng;
use std::f64::consts::TAU;
use tracing::{debug, warn};

/// Gaussian scatter of captors around a field centre, clamped to the grid
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianJitter {
    std_dev: f64,
}

impl GaussianJitter {
    pub fn new(std_dev: f64) -> WavyResult<Self> {
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(WavyError::config(format!(
                "captor jitter standard deviation must be finite and >= 0, got {}",
                std_dev
            )));
        }
        Ok(Self { std_dev })
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Draw one coordinate from `N(center, sd)`, rounded and clamped into `[0, extent - 1]`
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, center: u32, extent: u32) -> u32 {
        let value = (center as f64 + self.std_dev * standard_normal(rng)).round();
        value.clamp(0.0, extent.saturating_sub(1) as f64) as u32
    }

    /// Draw `count` captors around `(x, y)`
    pub fn scatter<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        x: u32,
        y: u32,
        count: usize,
        width: u32,
        height: u32,
    ) -> Vec<Captor> {
        (0..count)
            .map(|_| {
                let cx = self.draw(rng, x, width);
                let cy = self.draw(rng, y, height);
                Captor::new(cx, cy)
            })
            .collect()
    }
}

/// Box-Muller transform over the injected uniform source
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // (0, 1] keeps ln() finite
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

fn check_common(width: u32, height: u32, captors_per_field: usize) -> WavyResult<()> {
    if width == 0 || height == 0 {
        return Err(WavyError::config(format!(
            "retina size must be positive, got {}x{}",
            width, height
        )));
    }
    if captors_per_field == 0 {
        return Err(WavyError::config("captors per field must be at least 1"));
    }
    Ok(())
}

/// `count` evenly spaced integer positions covering `[0, extent - 1]` inclusive
fn lattice(extent: u32, count: u32) -> Vec<u32> {
    let last = extent.saturating_sub(1) as f64;
    if count <= 1 {
        return vec![0];
    }
    (0..count)
        .map(|i| (i as f64 * last / (count - 1) as f64).round() as u32)
        .collect()
}

fn lattice_count(extent: u32, resolution: u32, axis: &str) -> u32 {
    let count = (extent as f64 / resolution as f64).round() as u32;
    if count == 0 {
        warn!(
            "{} resolution {} exceeds retina extent {}, using a single lattice line",
            axis, resolution, extent
        );
        1
    } else {
        count
    }
}

/// Receptive fields on a regular lattice of `round(width / x_res)` columns by
/// `round(height / y_res)` rows, each with `captors_per_field` jittered captors.
///
/// Fields are emitted column by column (x outer, y inner).
pub fn generate_grid<R: Rng + ?Sized>(
    width: u32,
    height: u32,
    x_res: u32,
    y_res: u32,
    captors_per_field: usize,
    captor_jitter_std_dev: f64,
    rng: &mut R,
) -> WavyResult<RetinaTopology> {
    check_common(width, height, captors_per_field)?;
    if x_res == 0 || y_res == 0 {
        return Err(WavyError::config(format!(
            "lattice resolution must be positive, got {}x{}",
            x_res, y_res
        )));
    }
    let jitter = GaussianJitter::new(captor_jitter_std_dev)?;

    let columns = lattice(width, lattice_count(width, x_res, "x"));
    let rows = lattice(height, lattice_count(height, y_res, "y"));

    let mut fields = Vec::with_capacity(columns.len() * rows.len());
    for &x in &columns {
        for &y in &rows {
            let captors = jitter.scatter(rng, x, y, captors_per_field, width, height);
            fields.push(FieldSpec::new(x, y, captors));
        }
    }

    debug!(
        "Generated {}x{} lattice retina ({} fields)",
        columns.len(),
        rows.len(),
        fields.len()
    );
    Ok(RetinaTopology::new(width, height, fields))
}

/// `field_count` receptive fields at uniformly random positions
pub fn generate_random<R: Rng + ?Sized>(
    width: u32,
    height: u32,
    field_count: usize,
    captors_per_field: usize,
    captor_jitter_std_dev: f64,
    rng: &mut R,
) -> WavyResult<RetinaTopology> {
    check_common(width, height, captors_per_field)?;
    if field_count == 0 {
        return Err(WavyError::config("field count must be at least 1"));
    }
    let jitter = GaussianJitter::new(captor_jitter_std_dev)?;

    let fields = (0..field_count)
        .map(|_| {
            let x = rng.gen_range(0..width);
            let y = rng.gen_range(0..height);
            let captors = jitter.scatter(rng, x, y, captors_per_field, width, height);
            FieldSpec::new(x, y, captors)
        })
        .collect::<Vec<_>>();

    debug!("Generated random retina ({} fields)", fields.len());
    Ok(RetinaTopology::new(width, height, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_lattice_spans_extent() {
        assert_eq!(lattice(100, 10).first(), Some(&0));
        assert_eq!(lattice(100, 10).last(), Some(&99));
        assert_eq!(lattice(100, 1), vec![0]);
        assert_eq!(lattice(5, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_jitter_puts_captors_on_centre() {
        let mut rng = StdRng::seed_from_u64(7);
        let t = generate_grid(40, 20, 10, 10, 3, 0.0, &mut rng).unwrap();
        for field in &t.fields {
            assert!(field.captors.iter().all(|c| c.x == field.x && c.y == field.y));
        }
    }

    #[test]
    fn test_oversized_resolution_falls_back_to_single_line() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = generate_grid(10, 10, 50, 5, 1, 1.0, &mut rng).unwrap();
        assert_eq!(t.fields.len(), 2);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_grid(0, 10, 1, 1, 1, 1.0, &mut rng).is_err());
        assert!(generate_grid(10, 10, 0, 1, 1, 1.0, &mut rng).is_err());
        assert!(generate_grid(10, 10, 1, 1, 0, 1.0, &mut rng).is_err());
        assert!(generate_random(10, 10, 0, 1, 1.0, &mut rng).is_err());
        assert!(generate_random(10, 10, 3, 1, -1.0, &mut rng).is_err());
        assert!(generate_random(10, 10, 3, 1, f64::NAN, &mut rng).is_err());
    }

    #[test]
    fn test_jitter_is_roughly_centred() {
        let mut rng = StdRng::seed_from_u64(99);
        let jitter = GaussianJitter::new(2.0).unwrap();
        let n = 5000;
        let mean = (0..n)
            .map(|_| jitter.draw(&mut rng, 500, 1000) as f64)
            .sum::<f64>()
            / n as f64;
        assert!(
            (mean - 500.0).abs() < 0.2,
            "jittered captors should centre on the field, mean = {}",
            mean
        );
    }
}
