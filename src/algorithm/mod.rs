pub mod correcting;
pub mod greedy;
pub mod onepass;

use crate::types::{Algorithm, Command, DeltaError, EncodeOptions};

/// Emit shared diagnostic statistics for a finished encode at DEBUG level.
///
/// Structured via `tracing` fields rather than `eprintln!` so callers can
/// filter, redirect, or silence diagnostics without the algorithm caring;
/// this has no effect on the returned commands.
pub(crate) fn trace_command_stats(algorithm: Algorithm, commands: &[Command]) {
    let summary = crate::types::delta_summary(commands);
    let copy_pct = if summary.total_output_bytes > 0 {
        summary.copy_bytes as f64 / summary.total_output_bytes as f64 * 100.0
    } else {
        0.0
    };
    tracing::debug!(
        ?algorithm,
        num_copies = summary.num_copies,
        num_adds = summary.num_adds,
        copy_bytes = summary.copy_bytes,
        add_bytes = summary.add_bytes,
        copy_pct,
        total_output_bytes = summary.total_output_bytes,
        "delta encoding complete"
    );
}

/// Dispatch to the requested differencing algorithm (Section 3).
///
/// Validates `opts` before touching either buffer, so a bad `seed_len` or
/// `table_size` surfaces as [`DeltaError::InvalidArgument`] instead of a
/// division by zero inside whichever algorithm builds its index first.
pub fn diff(algorithm: Algorithm, r: &[u8], v: &[u8], opts: &EncodeOptions) -> Result<Vec<Command>, DeltaError> {
    opts.validate()?;
    Ok(match algorithm {
        Algorithm::Greedy => greedy::diff_greedy(r, v, opts)?,
        Algorithm::Onepass => onepass::diff_onepass(r, v, opts)?,
        Algorithm::Correcting => correcting::diff_correcting(r, v, opts)?,
    })
}

/// Dispatch with default options.
pub fn diff_default(algorithm: Algorithm, r: &[u8], v: &[u8]) -> Result<Vec<Command>, DeltaError> {
    diff(algorithm, r, v, &EncodeOptions::default())
}
