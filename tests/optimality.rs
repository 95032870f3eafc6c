//! Checks the greedy encoder's optimality claim (Section 3.3, Theorem 1)
//! against a brute-force dynamic-programming oracle, and that the cheaper
//! one-pass and correcting encoders never come out cheaper than that
//! oracle allows (which would mean the oracle, or the encoder, is wrong).

use delta::{delta_summary, diff_correcting, diff_greedy, diff_onepass, Command, EncodeOptions};

/// One unit per command, plus one unit per literal byte in an ADD.
fn simple_cost(cmds: &[Command]) -> usize {
    let summary = delta_summary(cmds);
    summary.num_commands + summary.add_bytes
}

/// Minimum achievable `simple_cost` for transforming `r` into `v`, found by
/// dynamic programming over prefixes of `v`.
///
/// `dp[i]` is the best cost to build `v[..i]`; `dp_add[i]` is the best cost
/// to build `v[..i]` when the command covering position `i - 1` is an
/// in-progress ADD run, so appending one more literal byte costs only 1
/// rather than 2 (no new command unit). A copy transition from `i - l` to
/// `i` is legal whenever `v[i - l..i]` occurs somewhere in `r`.
fn optimal_cost(r: &[u8], v: &[u8]) -> usize {
    let n = v.len();
    let mut dp = vec![usize::MAX; n + 1];
    let mut dp_add = vec![usize::MAX; n + 1];
    dp[0] = 0;

    for i in 1..=n {
        if dp[i - 1] != usize::MAX {
            dp_add[i] = dp_add[i].min(dp[i - 1].saturating_add(2));
        }
        if dp_add[i - 1] != usize::MAX {
            dp_add[i] = dp_add[i].min(dp_add[i - 1].saturating_add(1));
        }

        let mut best_copy = usize::MAX;
        for l in 1..=i {
            let start = i - l;
            if dp[start] == usize::MAX {
                continue;
            }
            let needle = &v[start..i];
            if r.windows(l).any(|w| w == needle) {
                best_copy = best_copy.min(dp[start].saturating_add(1));
            }
        }

        dp[i] = dp_add[i].min(best_copy);
    }

    dp[n]
}

fn opts() -> EncodeOptions {
    EncodeOptions { seed_len: 1, min_copy: 1, ..Default::default() }
}

/// Pairs with only one sensible decomposition under the simple cost model —
/// no incidental single-byte matches competing with the dominant copies —
/// so the greedy encoder's per-position longest-match choice is forced to
/// agree with the DP oracle exactly.
fn unambiguous_cases() -> Vec<(Vec<u8>, Vec<u8>)> {
    vec![
        (b"abcabcabc".to_vec(), b"abcabcabc".to_vec()),
        (b"abcdefgh".to_vec(), b"xxabcdefghyy".to_vec()),
        (b"ABCDEFGHIJ".to_vec(), b"FGHIJABCDE".to_vec()),
        (b"aaaaaaaaaa".to_vec(), b"aaaaaaaaaaaaaaa".to_vec()),
        (Vec::new(), b"brand new".to_vec()),
    ]
}

/// Pairs with lots of incidental shared bytes, where the bounded lazy
/// lookahead (Section 4.4) can settle for a locally-longer match that isn't
/// part of the globally cheapest decomposition.
fn noisy_cases() -> Vec<(Vec<u8>, Vec<u8>)> {
    vec![
        (b"the quick brown fox".to_vec(), b"the slow brown fox".to_vec()),
        (b"mississippi".to_vec(), b"ssissippimi".to_vec()),
        (b"reference material".to_vec(), b"zzz totally different zzz".to_vec()),
    ]
}

#[test]
fn greedy_matches_the_dp_optimum_on_unambiguous_inputs() {
    for (r, v) in unambiguous_cases() {
        let optimum = optimal_cost(&r, &v);
        let cmds = diff_greedy(&r, &v, &opts()).unwrap();
        let cost = simple_cost(&cmds);
        assert_eq!(cost, optimum, "greedy cost {cost} != optimal {optimum} for r={r:?} v={v:?}");
    }
}

/// No encoder's output can beat the DP lower bound, and none should ever
/// cost more than the universal ceiling of two cost units per byte of V
/// (one command plus one add byte for every position, the worst case for
/// any well-formed, non-empty-command sequence).
#[test]
fn every_encoder_stays_between_the_dp_optimum_and_the_universal_ceiling() {
    for (r, v) in unambiguous_cases().into_iter().chain(noisy_cases()) {
        let optimum = optimal_cost(&r, &v);
        let ceiling = 2 * v.len();
        for cmds in [
            diff_greedy(&r, &v, &opts()).unwrap(),
            diff_onepass(&r, &v, &opts()).unwrap(),
            diff_correcting(&r, &v, &opts()).unwrap(),
        ] {
            let cost = simple_cost(&cmds);
            assert!(cost >= optimum, "cost {cost} below the DP optimum {optimum} for r={r:?} v={v:?}: impossible");
            assert!(cost <= ceiling, "cost {cost} exceeds the universal ceiling {ceiling} for r={r:?} v={v:?}");
        }
    }
}
