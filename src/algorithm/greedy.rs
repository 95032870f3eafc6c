//! Greedy algorithm (Section 3.1, Figure 2).
//!
//! Optimal under the simple cost measure (Theorem 1, Section 3.3): at each
//! position in V, emit the longest possible copy from anywhere in R. A
//! dense index over every offset of R is required for optimality, so this
//! algorithm trades O(|R|) space for the strongest compression guarantee.
//!
//! A bounded lookahead of [`GREEDY_LAZY_LOOKAHEAD`] positions breaks ties in
//! favor of a slightly later, longer match (classic lazy matching); without
//! a fixed bound this search would be unbounded, so the paper's free
//! parameter is pinned to a fixed constant for determinism.

use crate::hash::RollingHash;
use crate::matcher::extend_match;
use crate::seed_index::{HashTableIndex, SeedIndex, SplayIndex};
use crate::types::{Command, DeltaError, EncodeOptions, GREEDY_LAZY_LOOKAHEAD};

enum Index {
    Hash(HashTableIndex),
    Splay(SplayIndex),
}

impl Index {
    fn insert(&mut self, fp: u64, offset: usize) {
        match self {
            Index::Hash(i) => i.insert(fp, offset),
            Index::Splay(i) => i.insert(fp, offset),
        }
    }

    fn lookup(&mut self, fp: u64) -> Vec<usize> {
        match self {
            Index::Hash(i) => i.lookup(fp),
            Index::Splay(i) => i.lookup(fp),
        }
    }
}

fn build_index(r: &[u8], seed_len: usize, opts: &EncodeOptions) -> Index {
    let mut index = if opts.use_splay {
        Index::Splay(SplayIndex::new())
    } else {
        Index::Hash(HashTableIndex::new(opts.table_size))
    };

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

/// Find the best match at `v_c`, verified against seed collisions and
/// extended maximally.
fn best_match_at(
    r: &[u8],
    v: &[u8],
    v_c: usize,
    seed_len: usize,
    min_copy: usize,
    index: &mut Index,
) -> Option<crate::matcher::Match> {
    if v_c + seed_len > v.len() {
        return None;
    }
    let fp = crate::hash::fingerprint(v, v_c, seed_len);
    let candidates = index.lookup(fp);
    let mut best: Option<crate::matcher::Match> = None;
    for r_cand in candidates {
        if r[r_cand..r_cand + seed_len] != v[v_c..v_c + seed_len] {
            continue; // hash collision, not an actual seed match
        }
        let m = extend_match(r, v, r_cand, v_c, seed_len, 0);
        if best.map_or(true, |b| m.length > b.length) {
            best = Some(m);
        }
    }
    best.filter(|m| m.length >= min_copy)
}

/// Run the greedy encoder (Section 3.1, Figure 2) over reference `r` and
/// target `v`.
pub fn diff_greedy(r: &[u8], v: &[u8], opts: &EncodeOptions) -> Result<Vec<Command>, DeltaError> {
    opts.validate()?;
    let seed_len = opts.seed_len;
    let min_copy = opts.effective_min_copy();
    let mut commands = Vec::new();
    if v.is_empty() {
        return Ok(commands);
    }

    let mut index = build_index(r, seed_len, opts);
    tracing::debug!(
        backend = if opts.use_splay { "splay" } else { "hash_table" },
        r_len = r.len(),
        v_len = v.len(),
        seed_len,
        "greedy: index built"
    );

    let mut v_c: usize = 0;
    let mut v_s: usize = 0;

    while v_c + seed_len <= v.len() {
        let Some(mut candidate) = best_match_at(r, v, v_c, seed_len, min_copy, &mut index) else {
            v_c += 1;
            continue;
        };

        // Bounded lazy lookahead: if a strictly longer match starts within
        // GREEDY_LAZY_LOOKAHEAD positions, prefer it and emit the skipped
        // bytes as part of the upcoming ADD.
        let lookahead_end = (v_c + GREEDY_LAZY_LOOKAHEAD).min(v.len());
        let mut best_pos = v_c;
        for probe in (v_c + 1)..lookahead_end {
            if let Some(m) = best_match_at(r, v, probe, seed_len, min_copy, &mut index) {
                if m.length > candidate.length {
                    candidate = m;
                    best_pos = probe;
                }
            }
        }

        if v_s < best_pos {
            commands.push(Command::Add { data: v[v_s..best_pos].to_vec() });
        }
        commands.push(Command::Copy { offset: candidate.r_start, length: candidate.length });
        v_s = best_pos + candidate.length;
        v_c = v_s;
    }

    if v_s < v.len() {
        commands.push(Command::Add { data: v[v_s..].to_vec() });
    }

    if opts.verbose {
        super::trace_command_stats(crate::types::Algorithm::Greedy, &commands);
    }

    Ok(commands)
}

/// Convenience wrapper with default options.
pub fn diff_greedy_default(r: &[u8], v: &[u8]) -> Result<Vec<Command>, DeltaError> {
    diff_greedy(r, v, &EncodeOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_version_produces_no_commands() {
        assert!(diff_greedy_default(b"hello", b"").unwrap().is_empty());
    }

    #[test]
    fn identical_buffers_become_one_copy() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let cmds = diff_greedy_default(data, data).unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0], Command::Copy { offset: 0, length: data.len() });
    }

    #[test]
    fn completely_different_buffers_are_one_add() {
        let r = vec![0u8; 64];
        let v = vec![1u8; 64];
        let cmds = diff_greedy_default(&r, &v).unwrap();
        assert_eq!(cmds.len(), 1);
        assert!(matches!(&cmds[0], Command::Add { data } if data == &v));
    }

    #[test]
    fn splay_backend_matches_hash_backend() {
        let r = b"abcdefghijklmnopqrstuvwxyzabcdefghijklmnop";
        let v = b"xyzabcdefghijklmnopqrstuvwxyz123";
        let mut hash_opts = EncodeOptions { seed_len: 4, ..Default::default() };
        hash_opts.use_splay = false;
        let mut splay_opts = hash_opts.clone();
        splay_opts.use_splay = true;
        let via_hash = diff_greedy(r, v, &hash_opts).unwrap();
        let via_splay = diff_greedy(r, v, &splay_opts).unwrap();
        let out_hash = crate::types::delta_summary(&via_hash).total_output_bytes;
        let out_splay = crate::types::delta_summary(&via_splay).total_output_bytes;
        assert_eq!(out_hash, v.len());
        assert_eq!(out_splay, v.len());
    }

    #[test]
    fn zero_seed_len_is_rejected() {
        let opts = EncodeOptions { seed_len: 0, ..Default::default() };
        assert!(matches!(diff_greedy(b"r", b"v", &opts), Err(DeltaError::InvalidArgument(_))));
    }

    #[test]
    fn zero_table_size_is_rejected() {
        let opts = EncodeOptions { table_size: 0, ..Default::default() };
        assert!(matches!(diff_greedy(b"r", b"v", &opts), Err(DeltaError::InvalidArgument(_))));
    }
}
