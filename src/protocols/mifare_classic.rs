//! MIFARE Classic: auth/read/write/halt, nested and hardnested nonce
//! acquisition, and the magic-card gen-1 escape sequence (spec §2 item 7,
//! §4.4, §4.10).
//!
//! Ground truth: `armsrc/mifarecmd.c` (`MifareReadBlock`, `MifareWriteBlock`,
//! `MifareAcquireEncryptedNonces`, `MifareNested`, `MifareCSetBlock`'s
//! `wupC1`/`wupC2`/`wipeC` magic sequence). The device performs the actual
//! RF-level CRYPTO-1 handshake; the host only supplies key/block arguments
//! and consumes status/data, which is why `authenticate` here is a thin
//! request/reply exchange rather than a from-scratch cipher handshake —
//! `crate::crypto1` is exercised directly only by the trace-replay and
//! nested/hardnested nonce-analysis paths, matching where the real client
//! touches CRYPTO-1 state itself.

use std::time::Duration;

use crate::attack::{valid_nonce, NonceKeystreamPair};
use crate::error::CoreError;
use crate::link::{
    decode_acquire_nonces_reply, decode_nested_reply, opcode, AcquireNoncesRequest, Link,
};
use crate::protocols::CardHandle14a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    A = 0x60,
    B = 0x61,
}

/// Sector trailer is at block 3-of-4 for sectors 0-31, block 15-of-16 for
/// sectors 32-39 (spec §3 invariant).
pub fn is_trailer_block(block_no: u8) -> bool {
    if block_no < 128 {
        block_no % 4 == 3
    } else {
        (block_no - 128) % 16 == 15
    }
}

/// First block of `sector` (0-31 are 4-block sectors; 32-39 are 16-block).
pub fn first_block_of_sector(sector: u8) -> u8 {
    if sector < 32 {
        sector * 4
    } else {
        128 + (sector - 32) * 16
    }
}

pub struct Idle;

pub struct Selected {
    pub handle: CardHandle14a,
}

pub struct Authenticated {
    pub handle: CardHandle14a,
    pub block_no: u8,
    pub key_type: KeyType,
}

pub struct Halted;

pub struct MifareClassicSession<S> {
    state: S,
}

impl MifareClassicSession<Idle> {
    pub fn new() -> Self {
        MifareClassicSession { state: Idle }
    }

    pub fn select(self, handle: CardHandle14a) -> MifareClassicSession<Selected> {
        MifareClassicSession {
            state: Selected { handle },
        }
    }
}

impl Default for MifareClassicSession<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

impl MifareClassicSession<Selected> {
    /// Authenticates to `block_no` with `key`. The device carries out the
    /// actual CRYPTO-1 handshake; the host sends `(keyType<<8)|blockNo` plus
    /// the 6-byte key and interprets the device's pass/fail status.
    pub fn authenticate(
        self,
        link: &mut dyn Link,
        block_no: u8,
        key_type: KeyType,
        key: u64,
        timeout: Duration,
    ) -> Result<MifareClassicSession<Authenticated>, CoreError> {
        let arg0 = crate::link::pack_key_block_arg(key_type as u8, block_no);
        let payload = key.to_be_bytes()[2..].to_vec();
        link.send(opcode::MIFARE_AUTH1, [arg0, 0, 0], &payload)?;
        let reply = link.wait(opcode::MIFARE_AUTH1, timeout)?;
        if reply.status != 0 {
            log::debug!("mifare_classic: auth failed on block {}", block_no);
            return Err(CoreError::AuthFailed);
        }
        Ok(MifareClassicSession {
            state: Authenticated {
                handle: self.state.handle,
                block_no,
                key_type,
            },
        })
    }
}

impl MifareClassicSession<Authenticated> {
    pub fn read_block(
        &mut self,
        link: &mut dyn Link,
        block_no: u8,
        timeout: Duration,
    ) -> Result<[u8; 16], CoreError> {
        let arg0 = crate::link::pack_key_block_arg(self.state.key_type as u8, block_no);
        link.send(opcode::MIFARE_READBL, [arg0, 0, 0], &[])?;
        let reply = link.wait(opcode::MIFARE_READBL, timeout)?;
        if reply.status != 0 {
            return Err(CoreError::CommandFailed(format!(
                "read block {} failed",
                block_no
            )));
        }
        if reply.data.len() != 16 {
            return Err(CoreError::WrongLength {
                got: reply.data.len(),
                expected: 16,
            });
        }
        let mut block = [0u8; 16];
        block.copy_from_slice(&reply.data);
        Ok(block)
    }

    pub fn write_block(
        &mut self,
        link: &mut dyn Link,
        block_no: u8,
        data: &[u8; 16],
        timeout: Duration,
    ) -> Result<(), CoreError> {
        if is_trailer_block(block_no) {
            log::warn!("mifare_classic: overwriting trailer block {}", block_no);
        }
        let arg0 = crate::link::pack_key_block_arg(self.state.key_type as u8, block_no);
        link.send(opcode::MIFARE_WRITEBL, [arg0, 0, 0], data)?;
        let reply = link.wait(opcode::MIFARE_WRITEBL, timeout)?;
        if reply.status != 0 {
            return Err(CoreError::CommandFailed(format!(
                "write block {} failed",
                block_no
            )));
        }
        Ok(())
    }

    pub fn halt(self, link: &mut dyn Link, timeout: Duration) -> Result<MifareClassicSession<Halted>, CoreError> {
        link.send(opcode::ACK, [0, 0, 0], &crate::frame::iso14a::HALT)?;
        let _ = link.wait(opcode::ACK, timeout);
        Ok(MifareClassicSession { state: Halted })
    }
}

/// Acquires `count` encrypted-nonce pairs for the classic-nested attack
/// (spec §4.4 steps 1-3, §6 `MifareAcquireEncryptedNonces`).
pub fn acquire_encrypted_nonces(
    link: &mut dyn Link,
    request: AcquireNoncesRequest,
    timeout: Duration,
) -> Result<Vec<crate::link::NoncePair>, CoreError> {
    let (args, payload) = request.into_send();
    link.send(opcode::MIFARE_ACQUIRE_ENCRYPTED_NONCES, args, &payload)?;
    let reply = link.wait(opcode::MIFARE_ACQUIRE_ENCRYPTED_NONCES, timeout)?;
    decode_acquire_nonces_reply(&reply.data)
}

/// Runs `MifareNested` for the calibrated distance window and returns the
/// decoded 20-byte `{cuid, nt[0], ks1[0], nt[1], ks1[1]}` buffer (spec §6).
pub fn run_nested(
    link: &mut dyn Link,
    known_block: u8,
    known_key_type: KeyType,
    target_block: u8,
    target_key_type: KeyType,
    calibrate: bool,
    timeout: Duration,
) -> Result<crate::link::NestedReply, CoreError> {
    let arg0 = crate::link::pack_key_block_arg(known_key_type as u8, known_block);
    let arg1 = crate::link::pack_key_block_arg(target_key_type as u8, target_block);
    link.send(
        opcode::MIFARE_NESTED,
        [arg0, arg1, calibrate as u32],
        &[],
    )?;
    let reply = link.wait(opcode::MIFARE_NESTED, timeout)?;
    decode_nested_reply(&reply.data)
}

/// Validates a nested-reply pair against a candidate nonce distance,
/// producing a disambiguated pair for handoff to the offline solver (spec
/// §4.4 step 4).
pub fn disambiguate_nested_pair(
    cuid: u32,
    nt1: u32,
    nt2_enc: u32,
    ks1: u32,
    parity: [u8; 3],
    dmin: u32,
    dmax: u32,
) -> Option<NonceKeystreamPair> {
    let d = crate::attack::find_nonce_distance(nt1, nt2_enc, ks1, parity, dmin, dmax)?;
    let nt = crate::crypto1::prng_successor(nt1, d);
    let _ = valid_nonce; // re-exported for callers that want to re-check directly
    Some(NonceKeystreamPair { uid: cuid, nt, ks1 })
}

/// Magic gen-1 out-of-spec opcodes (spec §4.10): `wupC1` is a 7-bit short
/// frame (`0x40`), `wupC2` is `0x43`, `wipeC` is `0x41`. Ground truth:
/// `armsrc/mifarecmd.c`'s `wupC1[]`/`wupC2[]`/`wipeC[]` byte arrays.
pub mod magic {
    pub const WUPC1: u8 = 0x40;
    pub const WUPC2: u8 = 0x43;
    pub const WIPEC: u8 = 0x41;
    pub const EXPECT_ACK: u8 = 0x0A;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicSequenceFlags {
    pub init: bool,
    pub wupc: bool,
    pub halt: bool,
    pub wipe: bool,
}

/// Builds the out-of-spec command sequence for a gen-1 magic card,
/// flag-controlled per spec §4.10 ("set/get/identify operations with
/// flag-controlled sequencing").
pub fn build_magic_sequence(flags: MagicSequenceFlags) -> Vec<u8> {
    let mut seq = Vec::new();
    if flags.wipe {
        seq.push(magic::WUPC1);
        seq.push(magic::WIPEC);
    }
    if flags.wupc {
        seq.push(magic::WUPC1);
        seq.push(magic::WUPC2);
    }
    if flags.halt {
        seq.extend_from_slice(&crate::frame::iso14a::HALT);
    }
    seq
}

/// After a gen-1 unlock, a standard `WRITE BLOCK` (`0xA0 blk` + 16 data
/// bytes) works with no authentication (spec §4.10).
pub fn encode_magic_write(block_no: u8, data: &[u8; 16]) -> crate::frame::Frame {
    let mut payload = vec![0xA0u8, block_no];
    payload.extend_from_slice(data);
    crate::frame::iso14a::encode_standard_frame(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DeviceReply, FakeLink};

    fn handle() -> CardHandle14a {
        CardHandle14a {
            uid: vec![0x11, 0x22, 0x33, 0x44],
            atqa: [0x04, 0x00],
            sak: 0x08,
            ats: None,
        }
    }

    #[test]
    fn trailer_blocks_identified_for_both_sector_sizes() {
        assert!(is_trailer_block(3));
        assert!(!is_trailer_block(4));
        assert!(is_trailer_block(first_block_of_sector(32) + 15));
    }

    #[test]
    fn first_block_of_sector_matches_4_and_16_block_layout() {
        assert_eq!(first_block_of_sector(0), 0);
        assert_eq!(first_block_of_sector(31), 124);
        assert_eq!(first_block_of_sector(32), 128);
        assert_eq!(first_block_of_sector(39), 128 + 7 * 16);
    }

    #[test]
    fn auth_read_write_halt_happy_path() {
        let mut link = FakeLink::new()
            .expect(opcode::MIFARE_AUTH1, DeviceReply::ok(opcode::MIFARE_AUTH1))
            .expect(
                opcode::MIFARE_READBL,
                DeviceReply {
                    opcode: opcode::MIFARE_READBL,
                    status: 0,
                    args: [0; 3],
                    data: vec![0u8; 16],
                },
            )
            .expect(opcode::MIFARE_WRITEBL, DeviceReply::ok(opcode::MIFARE_WRITEBL))
            .expect(opcode::ACK, DeviceReply::ok(opcode::ACK));

        let session = MifareClassicSession::new().select(handle());
        let mut session = session
            .authenticate(&mut link, 4, KeyType::A, 0xFFFF_FFFF_FFFF, Duration::from_millis(500))
            .unwrap();
        let block = session.read_block(&mut link, 4, Duration::from_millis(500)).unwrap();
        assert_eq!(block, [0u8; 16]);
        session
            .write_block(&mut link, 4, &[0xAAu8; 16], Duration::from_millis(500))
            .unwrap();
        let _halted = session.halt(&mut link, Duration::from_millis(500)).unwrap();
    }

    #[test]
    fn auth_failure_surfaces_as_auth_failed() {
        let mut link = FakeLink::new().expect(
            opcode::MIFARE_AUTH1,
            DeviceReply {
                opcode: opcode::MIFARE_AUTH1,
                status: 1,
                args: [0; 3],
                data: vec![],
            },
        );
        let session = MifareClassicSession::new().select(handle());
        let err = session
            .authenticate(&mut link, 4, KeyType::A, 0, Duration::from_millis(500))
            .unwrap_err();
        assert!(matches!(err, CoreError::AuthFailed));
    }

    #[test]
    fn magic_sequence_respects_flags() {
        let seq = build_magic_sequence(MagicSequenceFlags {
            init: false,
            wupc: true,
            halt: true,
            wipe: false,
        });
        assert_eq!(seq[0], magic::WUPC1);
        assert_eq!(seq[1], magic::WUPC2);
        assert!(seq.ends_with(&crate::frame::iso14a::HALT));
    }

    #[test]
    fn magic_write_has_crc_but_no_auth() {
        let f = encode_magic_write(1, &[0x42u8; 16]);
        assert_eq!(f.data.len(), 2 + 16 + 2);
        assert_eq!(f.data[0], 0xA0);
    }

    #[test]
    fn disambiguate_nested_pair_finds_unique_distance() {
        let key = 0xFFFF_FFFF_FFFF;
        let uid = 0x0DB3_FA11;
        let nt1 = 0xE051_2BB5;
        let d = 160;
        let nt2 = crate::crypto1::prng_successor(nt1, d);
        let mut state = crate::crypto1::state_from_key(key);
        let ks = crate::crypto1::word(&mut state, uid ^ nt2, false);
        let nt2_enc = nt2 ^ ks;
        let bit = |n: u32| ((ks >> n) & 1) as u8;
        let parity = [
            crate::util::parity::oddparity8(((nt2 >> 24) & 0xFF) as u8) ^ bit(16),
            crate::util::parity::oddparity8(((nt2 >> 16) & 0xFF) as u8) ^ bit(8),
            crate::util::parity::oddparity8(((nt2 >> 8) & 0xFF) as u8) ^ bit(0),
        ];
        let pair = disambiguate_nested_pair(uid, nt1, nt2_enc, ks, parity, d - 2, d + 2).unwrap();
        assert_eq!(pair.nt, nt2);
        assert_eq!(pair.uid, uid);
    }
}
