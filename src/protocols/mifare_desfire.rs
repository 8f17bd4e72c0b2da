//! MIFARE DESFire: native and ISO-7816-wrapped command framing, modeled
//! over DES/3DES/AES/EV2 authentication variants (spec §2 item 7).
//!
//! No DESFire source file was present in the retrieved teacher/pack
//! material, so this module follows spec.md's contract directly: the
//! *authentication protocol shape* (challenge/response round count, session
//! key derivation point, native vs ISO-wrapped command framing) is modeled
//! here; the DES/AES primitives themselves stay behind the
//! [`BlockCipher`]/[`super::mifare_ultralight::BlockCipher`]-style trait
//! boundary per spec.md's "no general-purpose cryptographic library"
//! Non-goal. Native framing reuses `protocols::iso14b`-style wrapping where
//! DESFire runs over 14443-4; ISO-wrapped framing delegates to `apdu`.
use crate::error::CoreError;

/// Which authentication family a given key slot uses. DESFire EV1 supports
/// DES/3DES/AES per key; EV2 adds an authenticate-with-session-key variant
/// that derives a fresh session key each exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVariant {
    Des,
    TripleDes,
    Aes,
    Ev2,
}

impl AuthVariant {
    /// Session/challenge block size for this variant: 8 bytes for
    /// DES/3DES, 16 for AES/EV2.
    pub fn block_size(self) -> usize {
        match self {
            AuthVariant::Des | AuthVariant::TripleDes => 8,
            AuthVariant::Aes | AuthVariant::Ev2 => 16,
        }
    }
}

/// Native DESFire command wrapper: `[cmd, data...]`, no CLA/INS/SW.
pub fn wrap_native(cmd: u8, data: &[u8]) -> Vec<u8> {
    let mut out = vec![cmd];
    out.extend_from_slice(data);
    out
}

/// ISO-7816 wrapped command: DESFire command becomes the APDU's `INS` under
/// CLA `0x90`, with `Lc`/`Le` framing per spec §6's "T=0-style smartcard
/// adaptor" contract (shared with `apdu`'s `GET RESPONSE`/`61 XX` handling).
pub fn wrap_iso(cmd: u8, data: &[u8]) -> Vec<u8> {
    let mut apdu = vec![0x90u8, cmd, 0x00, 0x00, data.len() as u8];
    apdu.extend_from_slice(data);
    apdu.push(0x00); // Le
    apdu
}

/// The authenticate command opcode for a given variant (native framing).
pub fn authenticate_cmd(variant: AuthVariant) -> u8 {
    match variant {
        AuthVariant::Des => 0x0A,
        AuthVariant::TripleDes => 0x1A,
        AuthVariant::Aes => 0xAA,
        AuthVariant::Ev2 => 0x71,
    }
}

/// Two-round challenge/response authentication state machine shape. Round 1:
/// card sends an encrypted random challenge `RndB`; reader decrypts, rotates
/// it, picks its own `RndA`, and sends `Ek(RndA || RndB')` back. Round 2:
/// card validates and returns `Ek(RndA')`; the session key is derived from
/// `RndA`/`RndB` per variant. The cipher primitive is supplied by the
/// caller via `decrypt`/`encrypt` closures so no crypto is implemented here.
pub struct AuthChallenge<'a> {
    pub variant: AuthVariant,
    pub decrypt: &'a dyn Fn(&[u8]) -> Vec<u8>,
    pub encrypt: &'a dyn Fn(&[u8]) -> Vec<u8>,
}

impl<'a> AuthChallenge<'a> {
    /// Builds the round-1 response from the card's encrypted `RndB`
    /// challenge and the reader's freshly chosen `RndA`.
    pub fn build_round1_response(&self, enc_rnd_b: &[u8], rnd_a: &[u8]) -> Result<Vec<u8>, CoreError> {
        let block = self.variant.block_size();
        if enc_rnd_b.len() != block || rnd_a.len() != block {
            return Err(CoreError::WrongLength {
                got: enc_rnd_b.len(),
                expected: block,
            });
        }
        let rnd_b = (self.decrypt)(enc_rnd_b);
        let rnd_b_rotated = rotate_left_one(&rnd_b);
        let mut plain = rnd_a.to_vec();
        plain.extend_from_slice(&rnd_b_rotated);
        Ok((self.encrypt)(&plain))
    }

    /// Validates the card's round-2 reply `Ek(RndA')` against the reader's
    /// own `RndA`.
    pub fn verify_round2(&self, enc_rnd_a_rotated: &[u8], rnd_a: &[u8]) -> Result<bool, CoreError> {
        let block = self.variant.block_size();
        if enc_rnd_a_rotated.len() != block {
            return Err(CoreError::WrongLength {
                got: enc_rnd_a_rotated.len(),
                expected: block,
            });
        }
        let decrypted = (self.decrypt)(enc_rnd_a_rotated);
        Ok(decrypted == rotate_left_one(rnd_a))
    }
}

fn rotate_left_one(bytes: &[u8]) -> Vec<u8> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let mut out = bytes[1..].to_vec();
    out.push(bytes[0]);
    out
}

/// Per-algorithm key set indexed by key number (spec §3 "DESFire key set").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesfireKeySet {
    pub des_keys: Vec<Option<[u8; 8]>>,
    pub triple_des_keys: Vec<Option<[u8; 16]>>,
    pub aes_keys: Vec<Option<[u8; 16]>>,
    pub k3kdes_keys: Vec<Option<[u8; 24]>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    #[test]
    fn block_sizes_match_variant() {
        assert_eq!(AuthVariant::Des.block_size(), 8);
        assert_eq!(AuthVariant::Aes.block_size(), 16);
    }

    #[test]
    fn native_and_iso_wrapping_differ_in_shape() {
        let native = wrap_native(0x0A, &[1, 2, 3]);
        assert_eq!(native[0], 0x0A);
        let iso = wrap_iso(0x0A, &[1, 2, 3]);
        assert_eq!(iso[0], 0x90);
        assert_eq!(iso[1], 0x0A);
    }

    #[test]
    fn round1_response_rotates_rnd_b_with_identity_cipher() {
        let challenge = AuthChallenge {
            variant: AuthVariant::Des,
            decrypt: &identity,
            encrypt: &identity,
        };
        let rnd_b = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let rnd_a = [9u8, 10, 11, 12, 13, 14, 15, 16];
        let response = challenge.build_round1_response(&rnd_b, &rnd_a).unwrap();
        assert_eq!(&response[..8], &rnd_a);
        assert_eq!(&response[8..], &[2, 3, 4, 5, 6, 7, 8, 1]);
    }

    #[test]
    fn round2_verification_checks_rotated_rnd_a() {
        let challenge = AuthChallenge {
            variant: AuthVariant::Des,
            decrypt: &identity,
            encrypt: &identity,
        };
        let rnd_a = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let rotated = rotate_left_one(&rnd_a);
        assert!(challenge.verify_round2(&rotated, &rnd_a).unwrap());
        assert!(!challenge.verify_round2(&rnd_a, &rnd_a).unwrap());
    }
}
