//! `DecodeMifareData` (spec §4.8 step 7): replays a MIFARE Classic/Plus
//! CRYPTO-1 session across a trace, trying each dictionary key against the
//! most recent auth and, once matched, decrypting subsequent frames
//! inline.
//!
//! Ground truth: spec §4.8 step 7's contract plus `crypto1::mutual_auth`
//! (already built for the handshake itself); the upstream `crapto1`
//! decoder this mirrors was not part of the retrieved source (see
//! `crypto1/mod.rs`'s header note), so the key-matching loop here is
//! reconstructed from the handshake's externally observable contract:
//! a key is "the" key iff it reproduces the tag's `{aR}` for the observed
//! `(nt, {nR}, {aR})` triple.

use crate::crypto1::{prng_successor, state_from_key, step, word, Crypto1State};
use crate::dict::{Dictionary, KeyWidth};

/// Cipher state tracked across a session, set once a dictionary key is
/// confirmed against the most recent authentication.
pub struct DecodeMifareData {
    state: Option<Crypto1State>,
}

impl DecodeMifareData {
    pub fn new() -> Self {
        DecodeMifareData { state: None }
    }

    pub fn is_synced(&self) -> bool {
        self.state.is_some()
    }

    /// Tries every 6-byte key in `dict` against the observed auth
    /// transcript; on a match, stores the resulting cipher state
    /// (positioned right after the `{aR}` keystream word) and returns the
    /// recovered key.
    pub fn try_keys(&mut self, uid: u32, nt: u32, nr_enc: u32, ar_enc: u32, dict: &Dictionary) -> Option<u64> {
        for key_bytes in dict.iter() {
            if key_bytes.len() != 6 {
                continue;
            }
            let mut key_buf = [0u8; 8];
            key_buf[2..].copy_from_slice(key_bytes);
            let key = u64::from_be_bytes(key_buf);

            let mut tag_state = state_from_key(key);
            word(&mut tag_state, uid ^ nt, false);
            word(&mut tag_state, nr_enc, true);
            let ar_expected = prng_successor(nt, 64);
            let ks2 = word(&mut tag_state, 0, false);
            if ks2 ^ ar_enc == ar_expected {
                self.state = Some(tag_state);
                return Some(key);
            }
        }
        None
    }

    /// Decrypts `ciphertext` against the tracked cipher state, advancing
    /// it by `ciphertext.len()` bytes. Returns `None` before any key has
    /// been matched (spec §4.8: "outputs decrypted bytes ... when a
    /// matching key ... is found").
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Option<Vec<u8>> {
        let state = self.state.as_mut()?;
        Some(decrypt_bytes(state, ciphertext))
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

impl Default for DecodeMifareData {
    fn default() -> Self {
        Self::new()
    }
}

fn decrypt_bytes(state: &mut Crypto1State, ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ciphertext.len());
    for &cbyte in ciphertext {
        let mut ks_byte = 0u8;
        for i in 0..8 {
            let bit = (cbyte >> (7 - i)) & 1;
            let ks = step(state, bit, true);
            ks_byte = (ks_byte << 1) | ks;
        }
        out.push(cbyte ^ ks_byte);
    }
    out
}
