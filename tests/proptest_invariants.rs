use proptest::prelude::*;

use delta::{
    apply_delta_inplace, apply_placed_to, decode_delta, diff_correcting, diff_greedy,
    diff_onepass, encode_delta, make_inplace, output_size, place_commands, CyclePolicy,
    DecodedDelta, EncodeOptions,
};

fn opts() -> EncodeOptions {
    EncodeOptions { seed_len: 4, ..Default::default() }
}

fn roundtrip_ok(r: &[u8], v: &[u8], cmds: &[delta::Command]) -> bool {
    let placed = place_commands(cmds);
    let mut out = vec![0u8; output_size(cmds)];
    apply_placed_to(r, &placed, &mut out).unwrap();
    out == v
}

proptest! {
    // Every encoder must reconstruct V exactly, for arbitrary byte strings.
    #[test]
    fn greedy_roundtrips(r in prop::collection::vec(any::<u8>(), 0..400), v in prop::collection::vec(any::<u8>(), 0..400)) {
        let cmds = diff_greedy(&r, &v, &opts()).unwrap();
        prop_assert!(roundtrip_ok(&r, &v, &cmds));
    }

    #[test]
    fn onepass_roundtrips(r in prop::collection::vec(any::<u8>(), 0..400), v in prop::collection::vec(any::<u8>(), 0..400)) {
        let cmds = diff_onepass(&r, &v, &opts()).unwrap();
        prop_assert!(roundtrip_ok(&r, &v, &cmds));
    }

    #[test]
    fn correcting_roundtrips(r in prop::collection::vec(any::<u8>(), 0..400), v in prop::collection::vec(any::<u8>(), 0..400)) {
        let cmds = diff_correcting(&r, &v, &opts()).unwrap();
        prop_assert!(roundtrip_ok(&r, &v, &cmds));
    }

    // The binary container must round-trip through encode/decode for any
    // commands an encoder could actually produce.
    #[test]
    fn binary_container_roundtrips(r in prop::collection::vec(any::<u8>(), 0..400), v in prop::collection::vec(any::<u8>(), 0..400)) {
        let cmds = diff_greedy(&r, &v, &opts()).unwrap();
        let encoded = encode_delta(v.len(), &cmds);
        match decode_delta(&encoded).unwrap() {
            DecodedDelta::Sequential { version_len, commands } => {
                prop_assert_eq!(version_len, v.len());
                prop_assert!(roundtrip_ok(&r, &v, &commands));
            }
            DecodedDelta::Inplace { .. } => prop_assert!(false, "expected sequential mode"),
        }
    }

    // In-place conversion must preserve the reconstructed output regardless
    // of which cycle-breaking policy is used.
    #[test]
    fn inplace_conversion_preserves_output(
        r in prop::collection::vec(any::<u8>(), 1..300),
        v in prop::collection::vec(any::<u8>(), 1..300),
        use_constant in any::<bool>(),
    ) {
        let cmds = diff_greedy(&r, &v, &opts()).unwrap();
        let policy = if use_constant { CyclePolicy::Constant } else { CyclePolicy::Localmin };
        let (placed, _stats) = make_inplace(&r, &cmds, policy);
        let out = apply_delta_inplace(&r, &placed, v.len()).unwrap();
        prop_assert_eq!(out, v);
    }

    // Flipping any single byte in an encoded delta must never be silently
    // accepted as a different, still-valid delta.
    #[test]
    fn corrupted_delta_is_rejected_or_unchanged(
        r in prop::collection::vec(any::<u8>(), 1..200),
        v in prop::collection::vec(any::<u8>(), 1..200),
        flip_idx in any::<usize>(),
        flip_mask in 1u8..=255,
    ) {
        let cmds = diff_greedy(&r, &v, &opts()).unwrap();
        let mut encoded = encode_delta(v.len(), &cmds);
        let idx = flip_idx % encoded.len();
        let original = encoded.clone();
        encoded[idx] ^= flip_mask;
        if encoded == original {
            return Ok(());
        }
        match decode_delta(&encoded) {
            Err(_) => {}
            Ok(DecodedDelta::Sequential { commands, .. }) => {
                // A flip that still parses must not silently reconstruct a
                // different V than what was originally encoded.
                prop_assert!(!roundtrip_ok(&r, &v, &commands) || commands == cmds);
            }
            Ok(DecodedDelta::Inplace { .. }) => prop_assert!(false, "mode bit should not flip cleanly"),
        }
    }
}
