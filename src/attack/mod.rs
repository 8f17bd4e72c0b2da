//! Offline attack driver (spec §4.4/§11/§12): `valid_nonce`'s parity check,
//! nested-distance calibration, the dummy-byte `AUTHENTICATION_TIMEOUT`
//! trick, and the `ExternalSolver` boundary for CRYPTO-1 key recovery.
//!
//! Ground truth: `armsrc/mifarecmd.c`'s `valid_nonce` and the calibration
//! loop inside `MifareNested` (the `dmin`/`dmax`/`NESTED_MAX_TRIES`/
//! `davg` bookkeeping).

use crate::crypto1::prng_successor;
use crate::util::parity::oddparity8;

/// Card times out this many SSP clock cycles after a failed authentication
/// (spec §4.4, `armsrc/mifarecmd.c AUTHENTICATION_TIMEOUT`).
pub const AUTHENTICATION_TIMEOUT_SSP_CYCLES: u32 = 848;

/// Some non-standard cards need a pause after select before they're ready
/// for the first authentication (`PRE_AUTHENTICATION_LEADTIME`).
pub const PRE_AUTHENTICATION_LEADTIME_SSP_CYCLES: u32 = 400;

/// A card is declared non-vulnerable to nested after this many failed
/// calibration rounds (`NESTED_MAX_TRIES`).
pub const NESTED_MAX_TRIES: u32 = 12;

/// `valid_nonce`: checks that the parity bits of the encrypted second
/// nonce `{nt2}` match the odd parities of the candidate cleartext nonce
/// XORed with the high 3 bits of the recovered keystream `ks1` — exactly
/// the boolean in `armsrc/mifarecmd.c`.
pub fn valid_nonce(nt_candidate: u32, nt_enc: u32, ks1: u32, parity: [u8; 3]) -> bool {
    let bit = |x: u32, n: u32| ((x >> n) & 1) as u8;
    let check = |shift: u32, par_idx: usize, ks_bit: u32| {
        oddparity8(((nt_candidate >> shift) & 0xFF) as u8)
            == (parity[par_idx] ^ oddparity8(((nt_enc >> shift) & 0xFF) as u8) ^ bit(ks1, ks_bit))
    };
    check(24, 0, 16) && check(16, 1, 8) && check(8, 2, 0)
}

/// One round of nested-distance calibration: given the known-key auth
/// timing (`auth1_time`) and the delay used for the nested re-auth, and the
/// prng distance actually observed against the known key, records whether
/// this round's distance is within `[dmin, dmax]`.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationRound {
    pub distance: u32,
}

/// Calibrates the `[dmin, dmax]` nonce-distance window by sampling `rounds`
/// known-key auths and recording the PRNG distance each time, taking the
/// median distance ± 2 (spec §4.4 step 5 / Testable Property 9).
pub fn calibrate_distance_window(rounds: &[CalibrationRound]) -> Option<(u32, u32)> {
    if rounds.is_empty() {
        return None;
    }
    let mut distances: Vec<u32> = rounds.iter().map(|r| r.distance).collect();
    distances.sort_unstable();
    let davg = distances[distances.len() / 2];
    let dmin = davg.saturating_sub(2);
    let dmax = davg + 2;
    Some((dmin, dmax))
}

/// Searches the calibrated `[dmin, dmax]` window for the one candidate
/// distance `d` such that `prng_successor(nt1, d)` validates against the
/// observed `(nt2_enc, ks1, parity)` — spec §4.4 step 4.
pub fn find_nonce_distance(
    nt1: u32,
    nt2_enc: u32,
    ks1: u32,
    parity: [u8; 3],
    dmin: u32,
    dmax: u32,
) -> Option<u32> {
    let mut found = None;
    for d in dmin..=dmax {
        let candidate = prng_successor(nt1, d);
        if valid_nonce(candidate, nt2_enc, ks1, parity) {
            if found.is_some() {
                // More than one distance validates: the window is
                // ambiguous, so the spec contract ("if exactly one d in the
                // window validates") isn't met.
                return None;
            }
            found = Some(d);
        }
    }
    found
}

/// A disambiguated `(nt, ks1)` pair ready for handoff to an external solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceKeystreamPair {
    pub uid: u32,
    pub nt: u32,
    pub ks1: u32,
}

/// The external boundary for CRYPTO-1 key recovery (spec §9:
/// "`lfsr_recovery32`, `lfsr_common_prefix`, etc. ... not detailed here ...
/// an implementer may port them directly or replace with a from-scratch
/// crapto1-equivalent"). The only contract this core defines is: given
/// `(uid, nt, ks1)` pairs, produce candidate 48-bit keys to be verified with
/// one more auth attempt.
pub trait ExternalSolver {
    fn recover_candidates(&self, pairs: &[NonceKeystreamPair]) -> Vec<u64>;
}

/// A reference brute-force solver suitable for test vectors (small state
/// spaces), not a production-speed implementation (explicitly out of this
/// core's budget per spec §9).
pub struct BruteForceSolver {
    pub key_space: std::ops::Range<u64>,
}

impl ExternalSolver for BruteForceSolver {
    fn recover_candidates(&self, pairs: &[NonceKeystreamPair]) -> Vec<u64> {
        use crate::crypto1::{state_from_key, word};
        let mut candidates = Vec::new();
        'keys: for key in self.key_space.clone() {
            for pair in pairs {
                let mut state = state_from_key(key);
                let ks = word(&mut state, pair.uid ^ pair.nt, false);
                // The first keystream word opens the session; ks1 here
                // models only its top byte for the brute-force vector check.
                if (ks >> 24) as u8 != (pair.ks1 >> 24) as u8 {
                    continue 'keys;
                }
            }
            candidates.push(key);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto1::{state_from_key, word};

    fn make_nonce_observation(key: u64, uid: u32, nt: u32) -> (u32, u32) {
        let mut state = state_from_key(key);
        let ks = word(&mut state, uid ^ nt, false);
        let nt_enc = nt ^ ks;
        (nt_enc, ks)
    }

    fn parity_for(nt: u32, ks: u32) -> [u8; 3] {
        let bit = |n: u32| ((ks >> n) & 1) as u8;
        [
            oddparity8(((nt >> 24) & 0xFF) as u8) ^ bit(16),
            oddparity8(((nt >> 16) & 0xFF) as u8) ^ bit(8),
            oddparity8(((nt >> 8) & 0xFF) as u8) ^ bit(0),
        ]
    }

    #[test]
    fn valid_nonce_accepts_matching_transcript() {
        let key = 0xFFFF_FFFF_FFFF;
        let uid = 0x0DB3_FA11;
        let nt = 0xE051_2BB5;
        let (nt_enc, ks) = make_nonce_observation(key, uid, nt);
        let parity = parity_for(nt, ks);
        assert!(valid_nonce(nt, nt_enc, ks, parity));
    }

    #[test]
    fn valid_nonce_rejects_wrong_candidate() {
        let key = 0xFFFF_FFFF_FFFF;
        let uid = 0x0DB3_FA11;
        let nt = 0xE051_2BB5;
        let (nt_enc, ks) = make_nonce_observation(key, uid, nt);
        let parity = parity_for(nt, ks);
        assert!(!valid_nonce(nt.wrapping_add(1), nt_enc, ks, parity));
    }

    #[test]
    fn calibration_window_is_median_plus_minus_2() {
        let rounds: Vec<_> = [140u32, 160, 160, 160, 180]
            .iter()
            .map(|&d| CalibrationRound { distance: d })
            .collect();
        let (dmin, dmax) = calibrate_distance_window(&rounds).unwrap();
        assert_eq!(dmin, 158);
        assert_eq!(dmax, 162);
    }

    #[test]
    fn find_nonce_distance_locates_unique_match() {
        let key = 0xFFFF_FFFF_FFFF;
        let uid = 0x0DB3_FA11;
        let nt1 = 0xE051_2BB5;
        let d = 160;
        let nt2 = prng_successor(nt1, d);
        let (nt2_enc, ks) = make_nonce_observation(key, uid, nt2);
        let parity = parity_for(nt2, ks);
        let found = find_nonce_distance(nt1, nt2_enc, ks, parity, d - 2, d + 2);
        assert_eq!(found, Some(d));
    }

    #[test]
    fn brute_force_solver_recovers_known_key_in_small_space() {
        let key = 0x0000_0000_002A;
        let uid = 0x0DB3_FA11;
        let nt = 0xE051_2BB5;
        let mut state = state_from_key(key);
        let ks = word(&mut state, uid ^ nt, false);
        let pairs = vec![NonceKeystreamPair { uid, nt, ks1: ks }];
        let solver = BruteForceSolver { key_space: 0..64 };
        let candidates = solver.recover_candidates(&pairs);
        assert!(candidates.contains(&key));
    }
}
