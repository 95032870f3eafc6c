//! Differential compression per Ajtai, Burns, Fagin, Long & Stockmeyer,
//! "Compactly Encoding Unstructured Inputs with Differential Compression,"
//! JACM 49(3), 2002, with the in-place conversion of Burns, Long &
//! Stockmeyer, IEEE TKDE 15(5), 2003.

pub mod algorithm;
pub mod apply;
pub mod codec;
pub mod hash;
pub mod inplace;
pub mod matcher;
pub mod placement;
pub mod seed_index;
pub mod splay;
pub mod types;

pub use algorithm::correcting::{diff_correcting, diff_correcting_default};
pub use algorithm::greedy::{diff_greedy, diff_greedy_default};
pub use algorithm::onepass::{diff_onepass, diff_onepass_default};
pub use algorithm::{diff, diff_default};
pub use apply::{apply_delta, apply_delta_inplace, apply_delta_to, apply_placed_inplace_to, apply_placed_to};
pub use codec::{decode_delta, encode_delta, encode_delta_inplace, is_inplace_delta, DecodedDelta};
pub use hash::{fingerprint, fp_to_index, is_prime, mod_mersenne, next_prime, precompute_bp, RollingHash};
pub use inplace::{make_inplace, InplaceStats};
pub use matcher::{extend_match, is_useful, Match};
pub use placement::{output_size, place_commands, unplace_commands};
pub use seed_index::{HashTableIndex, SeedIndex, SplayIndex};
pub use types::{
    delta_summary, placed_summary, Algorithm, Command, CyclePolicy, DeltaError, DeltaSummary,
    EncodeOptions, PlacedCommand, DELTA_MAGIC, HASH_BASE, HASH_MOD, SEED_LEN, TABLE_SIZE,
};
