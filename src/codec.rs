//! Text codec for `.ret` topology files
//!
//! The layout is line oriented and semicolon delimited, two records per field:
//!
//! ```text
//! <width>;<height>
//! <field1_x>;<field1_y>
//! <f1c1_x>;<f1c1_y>;<f1c2_x>;<f1c2_y>;...
//! <field2_x>;<field2_y>
//! ...
//! ```
//!
//! There is no versioning or metadata. Files captured by older tools must keep
//! loading, so the interleaving is fixed.

use crate::error::{WavyError, WavyResult};
use crate::topology::{Captor, FieldSpec, RetinaTopology};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// Parse topology text. The result is validated, so coordinates outside the
/// declared grid are reported as [`WavyError::CaptorOutOfBounds`].
pub fn parse(text: &str) -> WavyResult<RetinaTopology> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .collect();

    // Trailing blank lines are dropped; any other blank line would shift the
    // position/captor interleaving
    let end = lines
        .iter()
        .rposition(|(_, line)| !line.is_empty())
        .map_or(0, |i| i + 1);
    if let Some(&(line, _)) = lines[..end].iter().find(|(_, line)| line.is_empty()) {
        return Err(WavyError::format(line, "empty record"));
    }
    let mut records = lines[..end].iter().copied();

    let (header_line, header) = records
        .next()
        .ok_or_else(|| WavyError::format(0, "empty topology source"))?;
    let size = parse_tokens(header_line, header)?;
    if size.len() != 2 {
        return Err(WavyError::format(
            header_line,
            format!("expected `width;height`, got {} values", size.len()),
        ));
    }
    let (width, height) = (size[0], size[1]);

    let mut fields = Vec::new();
    while let Some((pos_line, pos_record)) = records.next() {
        let position = parse_tokens(pos_line, pos_record)?;
        if position.len() != 2 {
            return Err(WavyError::format(
                pos_line,
                format!("expected field position `x;y`, got {} values", position.len()),
            ));
        }

        let (cap_line, cap_record) = records.next().ok_or_else(|| {
            WavyError::format(pos_line, "field position record has no captor record")
        })?;
        let coords = parse_tokens(cap_line, cap_record)?;
        if coords.is_empty() || coords.len() % 2 != 0 {
            return Err(WavyError::format(
                cap_line,
                format!(
                    "captor list needs a non-empty, even number of values, got {}",
                    coords.len()
                ),
            ));
        }

        let captors = coords
            .chunks_exact(2)
            .map(|pair| Captor::new(pair[0], pair[1]))
            .collect();
        fields.push(FieldSpec::new(position[0], position[1], captors));
    }

    let topology = RetinaTopology::new(width, height, fields);
    topology.validate()?;
    debug!(
        "Parsed topology {}x{} with {} fields",
        topology.width,
        topology.height,
        topology.fields.len()
    );
    Ok(topology)
}

/// Split a record on `;` into non-negative integers.
/// A single trailing separator is tolerated.
fn parse_tokens(line: usize, record: &str) -> WavyResult<Vec<u32>> {
    let record = record.strip_suffix(';').unwrap_or(record);
    record
        .split(';')
        .map(|token| {
            let token = token.trim();
            token.parse::<u32>().map_err(|_| {
                WavyError::format(
                    line,
                    format!("expected a non-negative integer, got `{}`", token),
                )
            })
        })
        .collect()
}

/// Inverse of [`parse`]. Every record ends with a newline, captor pairs are
/// joined without a trailing separator.
pub fn serialize(topology: &RetinaTopology) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "{};{}", topology.width, topology.height);

    for field in &topology.fields {
        let _ = writeln!(out, "{};{}", field.x, field.y);
        let captors = field
            .captors
            .iter()
            .map(|c| format!("{};{}", c.x, c.y))
            .collect::<Vec<_>>()
            .join(";");
        out.push_str(&captors);
        out.push('\n');
    }

    out
}

/// Read and parse a topology file
pub fn load(path: impl AsRef<Path>) -> WavyResult<RetinaTopology> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| WavyError::unreadable(path, e))?;
    let topology = parse(&content)?;
    info!(
        "Loaded retina {} ({}x{}, {} fields, {} captors)",
        path.display(),
        topology.width,
        topology.height,
        topology.field_count(),
        topology.captor_count()
    );
    Ok(topology)
}

/// Serialize a topology to a file
pub fn save(path: impl AsRef<Path>, topology: &RetinaTopology) -> WavyResult<()> {
    let path = path.as_ref();
    std::fs::write(path, serialize(topology)).map_err(|e| WavyError::io(path, e))?;
    info!(
        "Wrote retina {} ({} fields)",
        path.display(),
        topology.field_count()
    );
    Ok(())
}
