//! One-pass algorithm (Section 4.5).
//!
//! Builds a single bounded-memory seed index over R once, then streams V
//! through it left to right. Unlike the greedy algorithm, R is visited
//! exactly once during index construction and V is visited exactly once
//! during the scan — no backtracking, no per-match reinitialization of
//! the index. This keeps the algorithm usable on a true stream of V (R
//! must be seekable/fully available to build the index, V need not be).
//!
//! Suboptimal relative to greedy: only the first `SEED_CHAIN_LEN` offsets
//! per fingerprint bucket survive in R's index, and ties among those are
//! broken by whichever is found first, not by longest extension.

use crate::hash::RollingHash;
use crate::matcher::extend_match;
use crate::seed_index::{HashTableIndex, SeedIndex};
use crate::types::{Command, DeltaError, EncodeOptions};

fn build_r_index(r: &[u8], seed_len: usize, table_size: usize) -> HashTableIndex {
    let mut index = HashTableIndex::new(table_size);
    if r.len() >= seed_len {
        let mut rh = RollingHash::new(r, 0, seed_len);
        index.insert(rh.value(), 0);
        for a in 1..=(r.len() - seed_len) {
            rh.roll(r[a - 1], r[a + seed_len - 1]);
            index.insert(rh.value(), a);
        }
    }
    index
}

/// Run the one-pass encoder (Section 4.5) over reference `r` and target `v`.
pub fn diff_onepass(r: &[u8], v: &[u8], opts: &EncodeOptions) -> Result<Vec<Command>, DeltaError> {
    opts.validate()?;
    let seed_len = opts.seed_len;
    let min_copy = opts.effective_min_copy();
    let mut commands = Vec::new();
    if v.is_empty() {
        return Ok(commands);
    }

    let mut index = build_r_index(r, seed_len, opts.table_size);
    tracing::debug!(
        r_len = r.len(),
        v_len = v.len(),
        seed_len,
        table_size = opts.table_size,
        "onepass: index over R built"
    );

    let mut v_c: usize = 0;
    let mut v_s: usize = 0;
    let mut rh_v: Option<RollingHash> = if v.len() >= seed_len {
        Some(RollingHash::new(v, 0, seed_len))
    } else {
        None
    };
    let mut rh_pos: usize = 0;

    while v_c + seed_len <= v.len() {
        let fp = match rh_v.as_mut() {
            Some(rh) if v_c == rh_pos => rh.value(),
            Some(rh) if v_c == rh_pos + 1 => {
                rh.roll(v[v_c - 1], v[v_c + seed_len - 1]);
                rh_pos = v_c;
                rh.value()
            }
            Some(rh) => {
                *rh = RollingHash::new(v, v_c, seed_len);
                rh_pos = v_c;
                rh.value()
            }
            None => break,
        };

        let candidates = index.lookup(fp);
        let mut best: Option<crate::matcher::Match> = None;
        for r_cand in candidates {
            if r[r_cand..r_cand + seed_len] != v[v_c..v_c + seed_len] {
                continue;
            }
            // No backward extension: earlier V bytes are already committed
            // the moment the scan has passed them.
            let m = extend_match(r, v, r_cand, v_c, seed_len, v_c);
            if best.map_or(true, |b| m.length > b.length) {
                best = Some(m);
            }
        }

        let Some(m) = best.filter(|m| m.length >= min_copy) else {
            v_c += 1;
            continue;
        };

        if v_s < m.v_start {
            commands.push(Command::Add { data: v[v_s..m.v_start].to_vec() });
        }
        commands.push(Command::Copy { offset: m.r_start, length: m.length });
        v_s = m.v_end();
        v_c = m.v_end();
    }

    if v_s < v.len() {
        commands.push(Command::Add { data: v[v_s..].to_vec() });
    }

    if opts.verbose {
        super::trace_command_stats(crate::types::Algorithm::Onepass, &commands);
    }

    Ok(commands)
}

/// Convenience wrapper with default options.
pub fn diff_onepass_default(r: &[u8], v: &[u8]) -> Result<Vec<Command>, DeltaError> {
    diff_onepass(r, v, &EncodeOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_version_produces_no_commands() {
        assert!(diff_onepass_default(b"hello", b"").unwrap().is_empty());
    }

    #[test]
    fn identical_buffers_become_one_copy() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let cmds = diff_onepass_default(data, data).unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0], Command::Copy { offset: 0, length: data.len() });
    }

    #[test]
    fn completely_different_buffers_are_one_add() {
        let r = vec![0u8; 64];
        let v = vec![1u8; 64];
        let cmds = diff_onepass_default(&r, &v).unwrap();
        assert_eq!(cmds.len(), 1);
        assert!(matches!(&cmds[0], Command::Add { data } if data == &v));
    }

    #[test]
    fn reorders_still_decode_correctly() {
        // R and V share two blocks in swapped order: one-pass can only
        // catch one direction of this without revisiting the index, but
        // the result must still round-trip.
        let r = b"AAAAAAAABBBBBBBB";
        let v = b"BBBBBBBBAAAAAAAA";
        let opts = EncodeOptions { seed_len: 4, ..Default::default() };
        let cmds = diff_onepass(r, v, &opts).unwrap();
        let summary = crate::types::delta_summary(&cmds);
        assert_eq!(summary.total_output_bytes, v.len());
    }

    #[test]
    fn zero_seed_len_is_rejected() {
        let opts = EncodeOptions { seed_len: 0, ..Default::default() };
        assert!(matches!(diff_onepass(b"r", b"v", &opts), Err(DeltaError::InvalidArgument(_))));
    }
}
