//! Tests for the `.ret` topology codec
//!
//! Covers file round-trips through the public API and the interleaved
//! position/captor layout that previously captured files rely on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wavy::{codec, Captor, FieldSpec, RetinaTopology, WavyError};

/// Helper: random well-formed topology with 1-100 fields of 1-20 captors
fn random_topology(rng: &mut StdRng) -> RetinaTopology {
    let width = rng.gen_range(1..=640);
    let height = rng.gen_range(1..=480);
    let fields = (0..rng.gen_range(1..=100))
        .map(|_| {
            let captors = (0..rng.gen_range(1..=20))
                .map(|_| Captor::new(rng.gen_range(0..width), rng.gen_range(0..height)))
                .collect();
            FieldSpec::new(rng.gen_range(0..width), rng.gen_range(0..height), captors)
        })
        .collect();
    RetinaTopology::new(width, height, fields)
}

#[test]
fn test_parse_serialize_round_trip() {
    let mut rng = StdRng::seed_from_u64(2010);
    for i in 0..200 {
        let topology = random_topology(&mut rng);
        let text = codec::serialize(&topology);
        let parsed = codec::parse(&text)
            .unwrap_or_else(|e| panic!("topology {} failed to re-parse: {}", i, e));
        assert_eq!(parsed, topology, "topology {} changed across a round trip", i);
    }
}

#[test]
fn test_layout_is_two_records_per_field() {
    let topology = RetinaTopology::new(
        10,
        8,
        vec![
            FieldSpec::new(3, 4, vec![Captor::new(2, 4), Captor::new(3, 5)]),
            FieldSpec::new(9, 0, vec![Captor::new(9, 1)]),
        ],
    );
    let text = codec::serialize(&topology);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["10;8", "3;4", "2;4;3;5", "9;0", "9;1"]);
    assert!(!text.contains(";\n"), "captor records must not end with a separator");
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("retina.ret");

    let mut rng = StdRng::seed_from_u64(5);
    let topology = random_topology(&mut rng);
    codec::save(&path, &topology).expect("save should succeed");

    let loaded = codec::load(&path).expect("load should succeed");
    assert_eq!(loaded, topology);
}

#[test]
fn test_legacy_file_with_trailing_separators() {
    // Older writers left a `;` after the last captor of every record
    let text = "4;4\n2;2\n1;1;1;2;2;1;2;2;\n3;1\n3;0;\n";
    let topology = codec::parse(text).expect("legacy layout should load");
    assert_eq!(topology.fields.len(), 2);
    assert_eq!(topology.fields[1].captors, vec![Captor::new(3, 0)]);
}

#[test]
fn test_malformed_inputs() {
    let cases = [
        ("", "empty source"),
        ("4\n2;2\n1;1\n", "header with one value"),
        ("4;4;4\n2;2\n1;1\n", "header with three values"),
        ("4;4\n2;2\n", "position without captor record"),
        ("4;4\n2;2;2\n1;1\n", "position with three values"),
        ("4;4\n2;2\n1;1;1\n", "odd captor list"),
        ("4;4\n2;2\none;1\n", "non-integer captor"),
        ("4;4\n", "no fields"),
        ("0;4\n0;0\n0;0\n", "zero width"),
        ("4;4\n1;1\n\n2;2\n3;3\n0;0\n", "blank captor record between fields"),
    ];
    for (text, what) in cases {
        match codec::parse(text) {
            Err(WavyError::Format { .. }) => {}
            other => panic!("{}: expected a format error, got {:?}", what, other),
        }
    }
}

#[test]
fn test_out_of_grid_coordinates() {
    match codec::parse("4;4\n2;2\n1;1;5;1\n") {
        Err(WavyError::CaptorOutOfBounds {
            field,
            x,
            y,
            width,
            height,
        }) => assert_eq!((field, x, y, width, height), (0, 5, 1, 4, 4)),
        other => panic!("expected CaptorOutOfBounds, got {:?}", other),
    }
}

#[test]
fn test_missing_file_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.ret");
    let err = codec::load(&path).unwrap_err();
    assert!(err.to_string().contains("absent.ret"), "error was: {}", err);
    match err {
        WavyError::Format {
            line: 0,
            source: Some(io),
            ..
        } => assert_eq!(io.kind(), std::io::ErrorKind::NotFound),
        other => panic!("a missing topology file is a format error, got {:?}", other),
    }
}
