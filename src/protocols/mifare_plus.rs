//! MIFARE Plus: AES-keyed variant of the Classic sector layout (spec §2
//! item 7). No dedicated Plus source file was retrieved; this follows
//! spec.md directly, reusing `mifare_classic`'s sector/trailer layout and
//! the `mifare_desfire::AuthVariant::Aes` challenge/response shape for the
//! AES authenticate-first-message exchange (MIFARE Plus layers AES auth on
//! top of the same 4/16-block sector geometry as Classic).

pub use crate::protocols::mifare_classic::{first_block_of_sector, is_trailer_block};
use crate::protocols::mifare_desfire::AuthChallenge;

/// MIFARE Plus security level: level 0 behaves like plain Classic (no AES),
/// level 1 adds AES authentication for the first read, level 3 runs AES
/// throughout (native AES mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    Level0,
    Level1,
    Level3,
}

/// An AES key slot: 16 bytes, indexed like a Classic sector key but keyed
/// per security-level semantics rather than A/B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesKeySlot {
    pub sector: u8,
    pub key: [u8; 16],
}

/// The AES authenticate-first-message exchange reuses the DESFire
/// challenge/response shape (same 16-byte AES block, same rotate-and-reply
/// contract) since both are NXP's shared AES-auth protocol.
pub fn aes_challenge<'a>(decrypt: &'a dyn Fn(&[u8]) -> Vec<u8>, encrypt: &'a dyn Fn(&[u8]) -> Vec<u8>) -> AuthChallenge<'a> {
    AuthChallenge {
        variant: crate::protocols::mifare_desfire::AuthVariant::Aes,
        decrypt,
        encrypt,
    }
}
