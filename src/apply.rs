//! Applying commands to reconstruct V (Section 4.10).

use crate::placement::output_size;
use crate::types::{Command, DeltaError, PlacedCommand};

/// Check that `start..start+length` fits within `bound`, returning the same
/// kind of error a corrupt-but-checksum-valid delta should produce (Section
/// 7: `InvalidDelta` for "copy range exceeds R/V bounds").
fn check_range(what: &str, start: usize, length: usize, bound: usize) -> Result<(), DeltaError> {
    match start.checked_add(length) {
        Some(end) if end <= bound => Ok(()),
        _ => Err(DeltaError::InvalidDelta(format!(
            "{what} range [{start}, {start}+{length}) exceeds bound {bound}"
        ))),
    }
}

/// Apply placed commands in sequential mode: read from R, write to `out`.
/// Returns the number of bytes written.
pub fn apply_placed_to(r: &[u8], commands: &[PlacedCommand], out: &mut [u8]) -> Result<usize, DeltaError> {
    let mut max_written = 0;
    for cmd in commands {
        match cmd {
            PlacedCommand::Copy { src, dst, length } => {
                check_range("copy source", *src, *length, r.len())?;
                check_range("copy destination", *dst, *length, out.len())?;
                out[*dst..*dst + *length].copy_from_slice(&r[*src..*src + *length]);
                max_written = max_written.max(dst + length);
            }
            PlacedCommand::Add { dst, data } => {
                check_range("add destination", *dst, data.len(), out.len())?;
                out[*dst..*dst + data.len()].copy_from_slice(data);
                max_written = max_written.max(dst + data.len());
            }
        }
    }
    Ok(max_written)
}

/// Apply placed commands in-place within a single shared buffer.
///
/// Uses `copy_within` (`memmove` semantics) so an overlapping src/dst range
/// is handled correctly — this is the whole point of in-place application.
pub fn apply_placed_inplace_to(commands: &[PlacedCommand], buf: &mut [u8]) -> Result<(), DeltaError> {
    for cmd in commands {
        match cmd {
            PlacedCommand::Copy { src, dst, length } => {
                check_range("copy source", *src, *length, buf.len())?;
                check_range("copy destination", *dst, *length, buf.len())?;
                buf.copy_within(*src..*src + *length, *dst);
            }
            PlacedCommand::Add { dst, data } => {
                check_range("add destination", *dst, data.len(), buf.len())?;
                buf[*dst..*dst + data.len()].copy_from_slice(data);
            }
        }
    }
    Ok(())
}

/// Apply algorithm commands directly (no explicit placement), writing into
/// a pre-allocated buffer. Returns the number of bytes written.
pub fn apply_delta_to(r: &[u8], commands: &[Command], out: &mut [u8]) -> Result<usize, DeltaError> {
    let mut pos = 0;
    for cmd in commands {
        match cmd {
            Command::Add { data } => {
                check_range("add destination", pos, data.len(), out.len())?;
                out[pos..pos + data.len()].copy_from_slice(data);
                pos += data.len();
            }
            Command::Copy { offset, length } => {
                check_range("copy source", *offset, *length, r.len())?;
                check_range("copy destination", pos, *length, out.len())?;
                out[pos..pos + *length].copy_from_slice(&r[*offset..*offset + *length]);
                pos += *length;
            }
        }
    }
    Ok(pos)
}

/// Reconstruct V from reference R and algorithm commands.
pub fn apply_delta(r: &[u8], commands: &[Command]) -> Result<Vec<u8>, DeltaError> {
    let mut out = vec![0u8; output_size(commands)];
    apply_delta_to(r, commands, &mut out)?;
    Ok(out)
}

/// Reconstruct V from R and placed in-place commands.
///
/// The working buffer is sized `max(|R|, |V|)` and preloaded with R, since
/// in-place commands read and write the same buffer before it is truncated
/// to the final version length.
pub fn apply_delta_inplace(
    r: &[u8],
    commands: &[PlacedCommand],
    version_size: usize,
) -> Result<Vec<u8>, DeltaError> {
    let buf_size = r.len().max(version_size);
    let mut buf = vec![0u8; buf_size];
    buf[..r.len()].copy_from_slice(r);
    apply_placed_inplace_to(commands, &mut buf)?;
    buf.truncate(version_size);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::place_commands;

    #[test]
    fn sequential_apply_matches_placed_apply() {
        let r = b"hello world".to_vec();
        let commands = vec![
            Command::Copy { offset: 6, length: 5 },
            Command::Add { data: b", ".to_vec() },
            Command::Copy { offset: 0, length: 5 },
        ];
        let via_commands = apply_delta(&r, &commands).unwrap();
        let placed = place_commands(&commands);
        let mut out = vec![0u8; output_size(&commands)];
        apply_placed_to(&r, &placed, &mut out).unwrap();
        assert_eq!(via_commands, out);
        assert_eq!(via_commands, b"world, hello");
    }

    #[test]
    fn inplace_apply_handles_self_overlapping_shift() {
        // A single copy whose src and dst ranges overlap (a rightward
        // shift) is exactly the case `copy_within`/memmove exists for.
        let r = b"ABCDEFGHIJ".to_vec();
        let placed = vec![PlacedCommand::Copy { src: 0, dst: 2, length: 8 }];
        let v = apply_delta_inplace(&r, &placed, 10).unwrap();
        assert_eq!(&v, b"ABABCDEFGH");
    }

    #[test]
    fn copy_past_reference_end_is_rejected() {
        let r = b"short".to_vec();
        let commands = vec![Command::Copy { offset: 2, length: 10 }];
        let mut out = vec![0u8; 10];
        let placed = place_commands(&commands);
        assert!(matches!(
            apply_placed_to(&r, &placed, &mut out),
            Err(DeltaError::InvalidDelta(_))
        ));
        assert!(matches!(apply_delta(&r, &commands), Err(DeltaError::InvalidDelta(_))));
    }

    #[test]
    fn inplace_copy_past_buffer_end_is_rejected() {
        let r = b"short".to_vec();
        let placed = vec![PlacedCommand::Copy { src: 50, dst: 0, length: 60 }];
        assert!(matches!(
            apply_delta_inplace(&r, &placed, 99),
            Err(DeltaError::InvalidDelta(_))
        ));
    }
}
