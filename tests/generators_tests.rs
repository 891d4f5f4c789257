//! Tests for the lattice and random topology generators

use rand::rngs::StdRng;
use rand::SeedableRng;
use wavy::codec;
use wavy::generators::{generate_grid, generate_random, GaussianJitter};

#[test]
fn test_grid_is_deterministic_for_a_seed() {
    let a = generate_grid(100, 100, 10, 10, 5, 1.0, &mut StdRng::seed_from_u64(3)).unwrap();
    let b = generate_grid(100, 100, 10, 10, 5, 1.0, &mut StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(a, b, "same seed must give the same retina");
    assert_eq!(a.field_count(), 100);
    assert!(a.fields.iter().all(|f| f.captors.len() == 5));
}

#[test]
fn test_different_seeds_differ() {
    let a = generate_grid(100, 100, 10, 10, 5, 3.0, &mut StdRng::seed_from_u64(1)).unwrap();
    let b = generate_grid(100, 100, 10, 10, 5, 3.0, &mut StdRng::seed_from_u64(2)).unwrap();
    assert_eq!(a.field_count(), b.field_count());
    assert_ne!(a, b);
}

#[test]
fn test_grid_lattice_covers_corners() {
    let t = generate_grid(64, 48, 16, 16, 1, 0.0, &mut StdRng::seed_from_u64(0)).unwrap();
    // round(64/16) = 4 columns, round(48/16) = 3 rows
    assert_eq!(t.field_count(), 12);
    let positions: Vec<(u32, u32)> = t.fields.iter().map(|f| (f.x, f.y)).collect();
    assert_eq!(positions.first(), Some(&(0, 0)));
    assert_eq!(positions[1], (0, 24), "fields are emitted column by column");
    assert_eq!(positions.last(), Some(&(63, 47)));
}

#[test]
fn test_random_fields_stay_on_grid() {
    let mut rng = StdRng::seed_from_u64(11);
    let t = generate_random(30, 20, 500, 8, 4.0, &mut rng).unwrap();
    assert_eq!(t.field_count(), 500);
    assert!(t.validate().is_ok(), "every generated coordinate must be in range");
}

#[test]
fn test_jitter_clamping_never_leaves_the_grid() {
    let mut rng = StdRng::seed_from_u64(77);
    let jitter = GaussianJitter::new(25.0).unwrap();
    let (width, height) = (16u32, 9u32);
    for i in 0..10_000u32 {
        // Centres at and near the edges push many draws out of range
        let cx = if i % 2 == 0 { 0 } else { width - 1 };
        let cy = i % height;
        let c = &jitter.scatter(&mut rng, cx, cy, 1, width, height)[0];
        assert!(c.x < width && c.y < height, "draw {} escaped: {:?}", i, c);
    }
}

#[test]
fn test_generated_retina_survives_codec() {
    let t = generate_random(320, 240, 40, 6, 2.0, &mut StdRng::seed_from_u64(9)).unwrap();
    assert_eq!(codec::parse(&codec::serialize(&t)).unwrap(), t);
}
