//! Correcting 1.5-pass algorithm (Section 4.6).
//!
//! Pass 1 builds a bounded hash table over R with a first-found policy
//! (no eviction — the earliest offset for a fingerprint wins and is never
//! displaced, unlike the cyclic eviction in [`crate::seed_index`]). Pass 2
//! streams V, extending every seed match both forward and backward. A
//! tentative-commit ring buffer of bounded capacity lets a match that
//! extends backward into an already-buffered region retroactively correct
//! (shrink or drop) the earlier command — "tail correction" — rather than
//! committing every match the instant it is found.

use std::collections::VecDeque;

use crate::hash::fingerprint;
use crate::types::{Command, DeltaError, EncodeOptions};

/// One entry in the tentative-commit buffer: the region of V it covers,
/// the command that encodes it, and whether it has since been absorbed
/// into a later, larger match (a dummy is skipped on flush).
struct BufEntry {
    v_start: usize,
    v_end: usize,
    cmd: Command,
    dummy: bool,
}

/// First-found-wins hash table over R, rebuilt once before scanning V.
///
/// Unlike [`crate::seed_index::HashTableIndex`], a slot is never
/// overwritten once occupied: checkpoint re-verification in Pass 2 relies
/// on the stored offset being the earliest valid one, so churn here would
/// just waste cycles re-deriving the same invariant R already gives us.
fn build_first_found_table(r: &[u8], seed_len: usize, table_size: usize) -> Vec<Option<(u64, usize)>> {
    let mut table: Vec<Option<(u64, usize)>> = vec![None; table_size];
    if r.len() >= seed_len {
        for a in 0..=(r.len() - seed_len) {
            let fp = fingerprint(r, a, seed_len);
            let idx = (fp % table_size as u64) as usize;
            if table[idx].is_none() {
                table[idx] = Some((fp, a));
            }
        }
    }
    table
}

/// How a newly-found match at `[v_m, match_end)` relates to the most
/// recently buffered, not-yet-committed entry, seen from the match's side.
enum TailOverlap {
    /// The buffered entry's whole span lies inside the new match; drop it.
    FullyCovered,
    /// The buffered ADD's tail reaches into the new match; keep only the
    /// prefix of it before `keep_until`.
    AddOverlapsFront { keep_until: usize },
    /// No usable overlap: either there's none, or the tail is a COPY,
    /// which is left alone rather than re-derived with a shifted offset.
    LeaveAlone,
}

fn classify_tail(tail_start: usize, tail_end: usize, tail_is_add: bool, v_m: usize, match_end: usize) -> TailOverlap {
    if tail_start >= v_m && tail_end <= match_end {
        TailOverlap::FullyCovered
    } else if tail_end > v_m && tail_start < v_m && tail_is_add {
        TailOverlap::AddOverlapsFront { keep_until: v_m }
    } else {
        TailOverlap::LeaveAlone
    }
}

/// Run the correcting encoder (Section 4.6) over reference `r` and target `v`.
pub fn diff_correcting(r: &[u8], v: &[u8], opts: &EncodeOptions) -> Result<Vec<Command>, DeltaError> {
    opts.validate()?;
    let seed_len = opts.seed_len;
    let table_size = opts.table_size;
    let buf_cap = opts.buf_cap.max(1);

    let mut commands = Vec::new();
    if v.is_empty() {
        return Ok(commands);
    }

    let table = build_first_found_table(r, seed_len, table_size);
    tracing::debug!(
        r_len = r.len(),
        v_len = v.len(),
        seed_len,
        table_size,
        buf_cap,
        "correcting: index over R built"
    );

    let mut buf: VecDeque<BufEntry> = VecDeque::new();
    let flush_oldest = |buf: &mut VecDeque<BufEntry>, commands: &mut Vec<Command>| {
        if buf.len() >= buf_cap {
            if let Some(oldest) = buf.pop_front() {
                if !oldest.dummy {
                    commands.push(oldest.cmd);
                }
            }
        }
    };

    let mut v_c: usize = 0;
    let mut v_s: usize = 0;

    while v_c + seed_len <= v.len() {
        let fp_v = fingerprint(v, v_c, seed_len);
        let idx = (fp_v % table_size as u64) as usize;
        let r_cand = match table[idx] {
            Some((stored_fp, offset)) if stored_fp == fp_v => {
                if r[offset..offset + seed_len] != v[v_c..v_c + seed_len] {
                    v_c += 1;
                    continue;
                }
                offset
            }
            _ => {
                v_c += 1;
                continue;
            }
        };

        // Extend forward and backward from the verified seed. Backward
        // extension is intentionally unbounded by any commit frontier: a
        // later match reaching back into already-buffered territory is
        // exactly what tail correction exists to handle.
        let mut fwd = seed_len;
        while v_c + fwd < v.len() && r_cand + fwd < r.len() && v[v_c + fwd] == r[r_cand + fwd] {
            fwd += 1;
        }
        let mut bwd: usize = 0;
        while v_c >= bwd + 1 && r_cand >= bwd + 1 && v[v_c - bwd - 1] == r[r_cand - bwd - 1] {
            bwd += 1;
        }

        let v_m = v_c - bwd;
        let r_m = r_cand - bwd;
        let match_len = bwd + fwd;
        let match_end = v_m + match_len;

        if v_s <= v_m {
            // Match lies entirely in the unencoded suffix: buffer the gap
            // (if any) then the match itself.
            if v_s < v_m {
                flush_oldest(&mut buf, &mut commands);
                buf.push_back(BufEntry {
                    v_start: v_s,
                    v_end: v_m,
                    cmd: Command::Add { data: v[v_s..v_m].to_vec() },
                    dummy: false,
                });
            }
            flush_oldest(&mut buf, &mut commands);
            buf.push_back(BufEntry {
                v_start: v_m,
                v_end: match_end,
                cmd: Command::Copy { offset: r_m, length: match_len },
                dummy: false,
            });
            v_s = match_end;
        } else {
            // Match reaches back into already-buffered territory: absorb
            // or trim whatever it overlaps (Section 4.6, tail correction).
            let mut effective_start = v_s;
            loop {
                let Some(tail) = buf.back() else { break };
                if tail.dummy {
                    buf.pop_back();
                    continue;
                }
                let tail_start = tail.v_start;
                let tail_end = tail.v_end;
                let tail_is_add = matches!(tail.cmd, Command::Add { .. });

                match classify_tail(tail_start, tail_end, tail_is_add, v_m, match_end) {
                    TailOverlap::FullyCovered => {
                        effective_start = effective_start.min(tail_start);
                        buf.pop_back();
                    }
                    TailOverlap::AddOverlapsFront { keep_until } => {
                        let keep = keep_until - tail_start;
                        if keep > 0 {
                            let back = buf.back_mut().unwrap();
                            back.cmd = Command::Add { data: v[back.v_start..keep_until].to_vec() };
                            back.v_end = keep_until;
                        } else {
                            buf.pop_back();
                        }
                        effective_start = effective_start.min(keep_until);
                        break;
                    }
                    TailOverlap::LeaveAlone => break,
                }
            }

            let adjust = effective_start - v_m;
            let new_len = match_end - effective_start;
            if new_len > 0 {
                flush_oldest(&mut buf, &mut commands);
                buf.push_back(BufEntry {
                    v_start: effective_start,
                    v_end: match_end,
                    cmd: Command::Copy { offset: r_m + adjust, length: new_len },
                    dummy: false,
                });
            }
            v_s = match_end;
        }

        v_c = match_end;
    }

    for entry in buf.drain(..) {
        if !entry.dummy {
            commands.push(entry.cmd);
        }
    }
    if v_s < v.len() {
        commands.push(Command::Add { data: v[v_s..].to_vec() });
    }

    if opts.verbose {
        super::trace_command_stats(crate::types::Algorithm::Correcting, &commands);
    }

    Ok(commands)
}

/// Convenience wrapper with default options.
pub fn diff_correcting_default(r: &[u8], v: &[u8]) -> Result<Vec<Command>, DeltaError> {
    diff_correcting(r, v, &EncodeOptions::default())
}
