//! Command placement (Section 4.7).
//!
//! Algorithm output ([`Command`]) names copy sources but leaves the
//! destination implicit in list order. Placement makes destinations
//! explicit ([`PlacedCommand`]), which the binary codec and the in-place
//! converter both need: the codec to support out-of-order application,
//! the converter to build the read/write intersection digraph.

use crate::types::{Command, PlacedCommand};

/// Total output length implied by a command sequence.
pub fn output_size(commands: &[Command]) -> usize {
    commands
        .iter()
        .map(|cmd| match cmd {
            Command::Copy { length, .. } => *length,
            Command::Add { data } => data.len(),
        })
        .sum()
}

/// Assign each command a destination offset by sequential packing: the
/// first command starts at 0, and each subsequent one starts where the
/// last left off.
pub fn place_commands(commands: &[Command]) -> Vec<PlacedCommand> {
    let mut placed = Vec::with_capacity(commands.len());
    let mut dst = 0;
    for cmd in commands {
        match cmd {
            Command::Copy { offset, length } => {
                placed.push(PlacedCommand::Copy { src: *offset, dst, length: *length });
                dst += length;
            }
            Command::Add { data } => {
                placed.push(PlacedCommand::Add { dst, data: data.clone() });
                dst += data.len();
            }
        }
    }
    placed
}

/// Invert [`place_commands`]: sort by destination, then drop the
/// destination field to recover a sequential command list. Sorting first
/// means the input need not already be in destination order — a decoded
/// in-place delta, for instance, lists commands in topological (execution)
/// order rather than output order.
pub fn unplace_commands(placed: &[PlacedCommand]) -> Vec<Command> {
    let mut ordered: Vec<&PlacedCommand> = placed.iter().collect();
    ordered.sort_by_key(|cmd| cmd.dst());
    ordered
        .into_iter()
        .map(|cmd| match cmd {
            PlacedCommand::Copy { src, length, .. } => Command::Copy { offset: *src, length: *length },
            PlacedCommand::Add { data, .. } => Command::Add { data: data.clone() },
        })
        .collect()
}
