use std::fmt;

// ============================================================================
// Constants (Ajtai, Burns, Fagin, Long — JACM 2002)
//
// Hash parameters (Section 2.1.3):
//   p (SEED_LEN)   = minimum match length / fingerprint window
//   b (HASH_BASE)  = polynomial base for Karp-Rabin hash
//   Q (HASH_MOD)   = Mersenne prime 2^61-1 for fingerprint arithmetic
//   q (TABLE_SIZE) = hash table capacity; correcting uses checkpointing
//                    (Section 8) to fit any |R| into a fixed-size table
// Delta commands: Section 2.1.1
// ============================================================================

pub const SEED_LEN: usize = 16;
pub const TABLE_SIZE: usize = 1_048_573; // largest prime < 2^20
pub const HASH_BASE: u64 = 263;
pub const HASH_MOD: u64 = (1 << 61) - 1; // Mersenne prime 2^61-1
pub const DELTA_BUF_CAP: usize = 256;

/// Entries a single `HashTableIndex` slot retains before the oldest is
/// cyclically evicted (Section 4.2: "next cyclic slot" eviction policy).
pub const SEED_CHAIN_LEN: usize = 4;

/// Fixed lazy-matching lookahead for the greedy encoder (Section 4.4).
/// The paper leaves this a free parameter; determinism requires a fixed
/// value, so it is pinned here rather than exposed as an option.
pub const GREEDY_LAZY_LOOKAHEAD: usize = 32;

pub const DELTA_MAGIC: &[u8; 5] = b"DELTA";
pub const DELTA_VERSION: u8 = 1;
pub const MODE_SEQUENTIAL: u8 = 0;
pub const MODE_INPLACE: u8 = 1;

pub const TAG_COPY: u8 = 0x01;
pub const TAG_ADD: u8 = 0x02;
pub const TAG_COPY_PLACED: u8 = 0x11;
pub const TAG_ADD_PLACED: u8 = 0x12;

pub const CRC_LEN: usize = 8;

// ============================================================================
// Delta commands (Section 2.1.1)
// ============================================================================

/// Algorithm output: copy from the reference or add literal bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Copy { offset: usize, length: usize },
    Add { data: Vec<u8> },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Copy { offset, length } => write!(f, "COPY(off={offset}, len={length})"),
            Command::Add { data } => {
                if data.len() <= 20 {
                    write!(f, "ADD({data:?})")
                } else {
                    write!(f, "ADD(len={})", data.len())
                }
            }
        }
    }
}

// ============================================================================
// Placed commands — ready for encoding and application
// ============================================================================

/// A command with an explicit destination offset in V.
///
/// For sequential deltas, `Copy::src` is an offset into the reference and
/// `dst` is the write position in the output. For in-place deltas, both
/// refer to positions in the shared working buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlacedCommand {
    Copy { src: usize, dst: usize, length: usize },
    Add { dst: usize, data: Vec<u8> },
}

impl PlacedCommand {
    pub fn dst(&self) -> usize {
        match self {
            PlacedCommand::Copy { dst, .. } => *dst,
            PlacedCommand::Add { dst, .. } => *dst,
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            PlacedCommand::Copy { length, .. } => *length,
            PlacedCommand::Add { data, .. } => data.len(),
        }
    }
}

impl fmt::Display for PlacedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacedCommand::Copy { src, dst, length } => {
                write!(f, "COPY(src={src}, dst={dst}, len={length})")
            }
            PlacedCommand::Add { dst, data } => {
                if data.len() <= 20 {
                    write!(f, "ADD(dst={dst}, {data:?})")
                } else {
                    write!(f, "ADD(dst={dst}, len={})", data.len())
                }
            }
        }
    }
}

// ============================================================================
// Algorithm and policy enums
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Greedy,
    Onepass,
    Correcting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePolicy {
    Localmin,
    Constant,
}

/// Options for differencing algorithms (Section 6).
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    pub seed_len: usize,
    pub table_size: usize,
    /// 0 means "use seed_len".
    pub min_copy: usize,
    pub use_splay: bool,
    pub buf_cap: usize,
    pub verbose: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            seed_len: SEED_LEN,
            table_size: TABLE_SIZE,
            min_copy: 0,
            use_splay: false,
            buf_cap: DELTA_BUF_CAP,
            verbose: false,
        }
    }
}

impl EncodeOptions {
    /// The effective match-length floor: `min_copy` if set, else `seed_len`.
    pub fn effective_min_copy(&self) -> usize {
        if self.min_copy == 0 {
            self.seed_len
        } else {
            self.min_copy
        }
    }

    /// Reject parameter combinations that would divide by zero or otherwise
    /// make no sense before any encoder touches them (Section 7: `p=0, q=0`
    /// is an `InvalidArgument`, not a panic).
    pub fn validate(&self) -> Result<(), DeltaError> {
        if self.seed_len == 0 {
            return Err(DeltaError::InvalidArgument("seed_len (p) must be non-zero".into()));
        }
        if self.table_size == 0 {
            return Err(DeltaError::InvalidArgument("table_size (q) must be non-zero".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid delta format: {0}")]
    FormatError(String),

    #[error("checksum mismatch: delta is corrupt")]
    ChecksumMismatch,

    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    #[error("cycle unresolvable under policy {0:?}")]
    CycleUnresolvable(CyclePolicy),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Summary statistics
// ============================================================================

#[derive(Debug)]
pub struct DeltaSummary {
    pub num_commands: usize,
    pub num_copies: usize,
    pub num_adds: usize,
    pub copy_bytes: usize,
    pub add_bytes: usize,
    pub total_output_bytes: usize,
}

pub fn delta_summary(commands: &[Command]) -> DeltaSummary {
    let mut s = DeltaSummary {
        num_commands: commands.len(),
        num_copies: 0,
        num_adds: 0,
        copy_bytes: 0,
        add_bytes: 0,
        total_output_bytes: 0,
    };
    for cmd in commands {
        match cmd {
            Command::Copy { length, .. } => {
                s.num_copies += 1;
                s.copy_bytes += length;
            }
            Command::Add { data } => {
                s.num_adds += 1;
                s.add_bytes += data.len();
            }
        }
    }
    s.total_output_bytes = s.copy_bytes + s.add_bytes;
    s
}

pub fn placed_summary(commands: &[PlacedCommand]) -> DeltaSummary {
    let mut s = DeltaSummary {
        num_commands: commands.len(),
        num_copies: 0,
        num_adds: 0,
        copy_bytes: 0,
        add_bytes: 0,
        total_output_bytes: 0,
    };
    for cmd in commands {
        match cmd {
            PlacedCommand::Copy { length, .. } => {
                s.num_copies += 1;
                s.copy_bytes += length;
            }
            PlacedCommand::Add { data, .. } => {
                s.num_adds += 1;
                s.add_bytes += data.len();
            }
        }
    }
    s.total_output_bytes = s.copy_bytes + s.add_bytes;
    s
}
