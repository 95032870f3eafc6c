//! Polynomial fingerprinting over the Mersenne prime 2^61 - 1, plus the
//! primality machinery used to pick hash table sizes (Ajtai et al., 2002,
//! Section 2.1.3).
//!
//! A fingerprint here is a base-`HASH_BASE` polynomial evaluated over a
//! window of bytes and reduced mod `HASH_MOD`. Two windows with different
//! content collide with probability roughly `window_count / HASH_MOD`,
//! which for 2^61 - 1 is negligible for any realistic file size, so a
//! fingerprint match is treated as a byte match without re-verifying the
//! bytes in the forward-extension paths. [`fp_to_index`] is the separate,
//! lossy step that folds a 61-bit fingerprint down into a hash table slot.

use crate::types::{HASH_BASE, HASH_MOD};

/// Fold a (possibly much larger than 61-bit) product back into `[0, HASH_MOD)`.
///
/// `HASH_MOD = 2^61 - 1` is a Mersenne prime, so for any `x`,
/// `x mod HASH_MOD` equals `(x >> 61) + (x & HASH_MOD)` up to at most one
/// more subtraction of `HASH_MOD` — splitting the high and low 61 bits and
/// adding them is cheaper than a real division. Because `x` here comes from
/// multiplying two already-reduced 61-bit values, one round of that split
/// can still leave a sum a little over 2^61, so the fold is applied twice.
#[inline]
pub fn mod_mersenne(x: u128) -> u64 {
    let modulus = HASH_MOD as u128;
    let fold = |v: u128| -> u128 {
        let mut low_plus_high = (v >> 61) + (v & modulus);
        if low_plus_high >= modulus {
            low_plus_high -= modulus;
        }
        low_plus_high
    };
    fold(fold(x)) as u64
}

/// Evaluate the Karp-Rabin polynomial fingerprint of `data[offset..offset+len]`.
///
/// `F = x_0 * b^(len-1) + x_1 * b^(len-2) + ... + x_{len-1}` taken mod
/// `HASH_MOD`, computed left to right with Horner's rule so no power of
/// `b` needs to be precomputed.
pub fn fingerprint(data: &[u8], offset: usize, len: usize) -> u64 {
    data[offset..offset + len]
        .iter()
        .fold(0u64, |acc, &byte| mod_mersenne(acc as u128 * HASH_BASE as u128 + byte as u128))
}

/// `HASH_BASE^(len.saturating_sub(1))` mod `HASH_MOD`, the weight the
/// leftmost byte of a window of length `len` carries — and so the factor a
/// [`RollingHash`] must strip off before sliding its window forward.
pub fn precompute_bp(len: usize) -> u64 {
    let Some(exp) = len.checked_sub(1) else { return 1 };
    mersenne_mod_pow(HASH_BASE, exp as u64)
}

/// Square-and-multiply exponentiation using the Mersenne reduction above.
fn mersenne_mod_pow(mut base: u64, mut exp: u64) -> u64 {
    let mut acc: u64 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mod_mersenne(acc as u128 * base as u128);
        }
        base = mod_mersenne(base as u128 * base as u128);
        exp >>= 1;
    }
    acc
}

/// Fold a full 61-bit fingerprint into a slot `< table_size` (`F mod q`).
///
/// This throws away collision resistance on purpose: it's only safe to use
/// as a hash table index, never as a stand-in for comparing two windows —
/// that's what the full fingerprint from [`fingerprint`] is for.
#[inline]
pub fn fp_to_index(fp: u64, table_size: usize) -> usize {
    (fp % table_size as u64) as usize
}

/// An O(1)-per-step fingerprint over a sliding window of fixed width.
///
/// Built once at some starting offset, then advanced byte by byte with
/// [`RollingHash::roll`] instead of re-scanning the whole window each time.
pub struct RollingHash {
    current: u64,
    leading_weight: u64,
    window_len: usize,
}

impl RollingHash {
    /// Start a window over `data[offset..offset+window_len]`.
    pub fn new(data: &[u8], offset: usize, window_len: usize) -> Self {
        RollingHash {
            current: fingerprint(data, offset, window_len),
            leading_weight: precompute_bp(window_len),
            window_len,
        }
    }

    /// The fingerprint of the window at its current position.
    #[inline]
    pub fn value(&self) -> u64 {
        self.current
    }

    /// Advance the window by one byte: drop `leaving` from the front, append
    /// `entering` at the back.
    ///
    /// `F' = ((F - leaving * b^(w-1)) * b + entering) mod HASH_MOD`, with the
    /// subtraction done in a way that never underflows an unsigned integer.
    #[inline]
    pub fn roll(&mut self, leaving: u8, entering: u8) {
        let leaving_contribution = mod_mersenne(leaving as u128 * self.leading_weight as u128);
        let without_leading = if self.current >= leaving_contribution {
            self.current - leaving_contribution
        } else {
            HASH_MOD - (leaving_contribution - self.current)
        };
        self.current = mod_mersenne(without_leading as u128 * HASH_BASE as u128 + entering as u128);
    }

    /// Width of the window this hash was built with.
    #[inline]
    pub fn seed_len(&self) -> usize {
        self.window_len
    }
}

// ── Primality, for sizing the hash table to a prime bucket count ─────────

/// The witness bases that make Miller-Rabin exact (not merely probable) for
/// every `n` below roughly 3.3e24 — far past any table size this crate will
/// ever construct, so [`is_prime`] never has to fall back to a probabilistic
/// round count.
const MILLER_RABIN_WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

fn pow_mod_u64(base: u64, exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let modulus = modulus as u128;
    let mut base = base as u128 % modulus;
    let mut exp = exp;
    let mut acc: u128 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc * base % modulus;
        }
        base = base * base % modulus;
        exp >>= 1;
    }
    acc as u64
}

/// Deterministic Miller-Rabin: is `n` prime?
pub fn is_prime(n: usize) -> bool {
    let n = n as u64;
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }

    // n - 1 = odd_part * 2^power_of_two
    let mut odd_part = n - 1;
    let mut power_of_two: u32 = 0;
    while odd_part % 2 == 0 {
        odd_part /= 2;
        power_of_two += 1;
    }

    'witness: for &witness in MILLER_RABIN_WITNESSES.iter() {
        if witness >= n {
            continue;
        }
        let mut x = pow_mod_u64(witness, odd_part, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 0..power_of_two.saturating_sub(1) {
            x = pow_mod_u64(x, 2, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// The smallest prime that is `>= n`.
///
/// Walks odd candidates upward; prime gaps near realistic table sizes are
/// small enough (the prime number theorem puts the expected gap at
/// `O(log n)`) that this never does meaningful work.
pub fn next_prime(n: usize) -> usize {
    if n <= 2 {
        return 2;
    }
    let mut candidate = n | 1;
    while !is_prime(candidate) {
        candidate += 2;
    }
    candidate
}
