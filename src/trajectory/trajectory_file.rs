use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use tracing::debug;

use crate::trajectory::trajectory_item::{TrajectoryItem, TrajectorySet};
use crate::trajectory::transfer_error::TransferError;

const NUM_FIELDS: usize = 8;

pub fn load_trajectory_file(path: impl AsRef<Path>) -> anyhow::Result<TrajectorySet> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading trajectory file {}", path.display()))?;

    let set = parse_trajectory(&text)?;
    debug!("loaded {} items from {}", set.len(), path.display());
    Ok(set)
}

/// Parses comma-separated items, one per line: `command,frame,param1,param2,param3,x,y,z`.
///
/// The first line is a header and is skipped, as are blank lines. Sequence numbers are assigned
///  from the order of the lines.
pub fn parse_trajectory(text: &str) -> Result<TrajectorySet, TransferError> {
    let mut items = Vec::new();

    for (idx, line) in text.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        items.push(parse_line(line, idx + 1)?);
    }

    TrajectorySet::new(items)
}

fn parse_line(line: &str, line_number: usize) -> Result<TrajectoryItem, TransferError> {
    let fields = line.split(',')
        .map(|f| f.trim())
        .collect::<Vec<_>>();

    if fields.len() != NUM_FIELDS {
        return Err(TransferError::InputMalformed {
            line: line_number,
            reason: format!("expected {} fields, got {}", NUM_FIELDS, fields.len()),
        });
    }

    Ok(TrajectoryItem {
        sequence: 0,
        command: parse_field(fields[0], "command", line_number)?,
        frame: parse_field(fields[1], "frame", line_number)?,
        param1: parse_field(fields[2], "param1", line_number)?,
        param2: parse_field(fields[3], "param2", line_number)?,
        param3: parse_field(fields[4], "param3", line_number)?,
        x: parse_field(fields[5], "x", line_number)?,
        y: parse_field(fields[6], "y", line_number)?,
        z: parse_field(fields[7], "z", line_number)?,
    })
}

fn parse_field<T: FromStr>(raw: &str, name: &str, line_number: usize) -> Result<T, TransferError> {
    raw.parse()
        .map_err(|_| TransferError::InputMalformed {
            line: line_number,
            reason: format!("invalid {} '{}'", name, raw),
        })
}
