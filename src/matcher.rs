//! Match extension (Section 4.3).
//!
//! Given a seed hit (a candidate offset pair where a `p`-byte fingerprint
//! collided), extend the match as far as possible in both directions to
//! find the maximal common substring. Extension respects two boundaries:
//!
//! - `last_committed_v`: the match may not extend backward past bytes of
//!   V already covered by a previously emitted command (a one-pass or
//!   correcting encoder cannot retroactively rewrite earlier output).
//! - `min_copy`: a match shorter than this floor is not worth encoding as
//!   a COPY and should be rejected by the caller.

/// A maximal match between R and V.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub r_start: usize,
    pub v_start: usize,
    pub length: usize,
}

impl Match {
    pub fn r_end(&self) -> usize {
        self.r_start + self.length
    }

    pub fn v_end(&self) -> usize {
        self.v_start + self.length
    }
}

/// Extend a seed hit at `(r_seed, v_seed)` (known equal for `seed_len` bytes)
/// as far as possible forward and backward.
///
/// Backward extension stops at `last_committed_v` (inclusive floor: bytes
/// at or before this index in V are already spoken for) and at the start
/// of either buffer. Forward extension stops at the end of either buffer.
pub fn extend_match(
    r: &[u8],
    v: &[u8],
    r_seed: usize,
    v_seed: usize,
    seed_len: usize,
    last_committed_v: usize,
) -> Match {
    let mut r_start = r_seed;
    let mut v_start = v_seed;

    // Backward extension, bounded by the commit frontier.
    while r_start > 0 && v_start > last_committed_v && r[r_start - 1] == v[v_start - 1] {
        r_start -= 1;
        v_start -= 1;
    }

    // Forward extension from the seed's far end.
    let mut r_end = r_seed + seed_len;
    let mut v_end = v_seed + seed_len;
    while r_end < r.len() && v_end < v.len() && r[r_end] == v[v_end] {
        r_end += 1;
        v_end += 1;
    }

    Match {
        r_start,
        v_start,
        length: r_end - r_start,
    }
}

/// Whether a match clears the minimum copy-length floor.
pub fn is_useful(m: &Match, min_copy: usize) -> bool {
    m.length >= min_copy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extends_both_directions() {
        let r = b"XXXhello worldYYY";
        let v = b"ZZhello worldWW";
        // Seed at the common "hello worl" region.
        let r_seed = 3 + 2; // "llo worl"
        let v_seed = 2 + 2;
        let m = extend_match(r, v, r_seed, v_seed, 4, 0);
        assert_eq!(&r[m.r_start..m.r_end()], &v[m.v_start..m.v_end()]);
        assert_eq!(&v[m.v_start..m.v_end()], b"hello worl");
    }

    #[test]
    fn backward_extension_respects_commit_frontier() {
        let r = b"aaaahello";
        let v = b"bbbbhello";
        let r_seed = 4;
        let v_seed = 4;
        // Frontier at 5 means V[0..=5] is already committed; extension may
        // only look at bytes strictly after index 5.
        let m = extend_match(r, v, r_seed, v_seed, 4, 5);
        assert_eq!(m.v_start, 6);
    }

    #[test]
    fn forward_extension_stops_at_buffer_end() {
        let r = b"abcXYZ";
        let v = b"defXYZ";
        let m = extend_match(r, v, 3, 3, 2, 0);
        assert_eq!(m.length, 3);
    }

    #[test]
    fn min_copy_floor() {
        let m = Match { r_start: 0, v_start: 0, length: 3 };
        assert!(is_useful(&m, 3));
        assert!(!is_useful(&m, 4));
    }
}
