//! LEGIC Prime session: IV-seeded stream cipher handshake shape and
//! segment-addressed read/write (spec §4.2, §4.7-adjacent).
//!
//! Ground truth: `client/src/cmdhflegic.c`'s `CmdLegicRdbl`/`CmdLegicWrbl`
//! segment-offset addressing; the actual LEGIC stream cipher stays outside
//! this crate per spec.md's crypto Non-goal — only the IV/session shape
//! from `frame::legic` is modeled here.

use std::time::Duration;

use crate::error::CoreError;
use crate::frame::legic::make_iv;
use crate::link::{opcode, Link};

pub struct Idle;
pub struct Established {
    pub uid: [u8; 4],
    pub iv: u8,
}

pub struct LegicSession<S> {
    state: S,
}

impl LegicSession<Idle> {
    pub fn new() -> Self {
        LegicSession { state: Idle }
    }

    /// Establishes a session with a freshly minted IV (spec: "7-bit IV ...
    /// seeds the LEGIC stream cipher for each new session").
    pub fn establish(
        self,
        link: &mut dyn Link,
        iv_seed: u8,
        timeout: Duration,
    ) -> Result<LegicSession<Established>, CoreError> {
        let iv = make_iv(iv_seed);
        link.send(opcode::ISO14443A_RAW, [iv as u32, 0, 0], &[])?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if reply.data.len() != 4 {
            return Err(CoreError::WrongLength {
                got: reply.data.len(),
                expected: 4,
            });
        }
        let mut uid = [0u8; 4];
        uid.copy_from_slice(&reply.data);
        Ok(LegicSession {
            state: Established { uid, iv },
        })
    }
}

impl Default for LegicSession<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes before this offset (UID/stamp/segment-0 header) are never
/// obfuscated; the CRC-8 obfuscation key only masks the rest of the dump
/// (spec §3 invariant / Testable Property 2).
pub const OBFUSCATION_START: usize = 22;

/// Verifies the segment-0 obfuscation key (`CRC8Legic(D[0..4]) == D[4]`)
/// and XORs it into every byte from [`OBFUSCATION_START`] onward, in
/// place. Applying this twice to the same buffer is a no-op (XOR with the
/// same key cancels out), matching Testable Property 2's idempotency
/// requirement — this is used both to de-obfuscate a freshly read dump
/// and to re-obfuscate one before writing it back.
///
/// Ground truth: spec §3's Legic obfuscation-key invariant; `CmdLegicRdbl`
/// never implemented this itself in the retrieved source (the original
/// leaves segment decoding to a separate pass), so this follows the
/// invariant's own bit-exact contract.
pub fn deobfuscate(data: &mut [u8]) -> Result<(), CoreError> {
    if data.len() < OBFUSCATION_START {
        return Err(CoreError::WrongLength {
            got: data.len(),
            expected: OBFUSCATION_START,
        });
    }
    let key = crate::util::crc::crc8_legic(&data[0..4]);
    if key != data[4] {
        return Err(CoreError::CrcFail);
    }
    for byte in &mut data[OBFUSCATION_START..] {
        *byte ^= key;
    }
    Ok(())
}

impl LegicSession<Established> {
    pub fn uid(&self) -> [u8; 4] {
        self.state.uid
    }

    pub fn iv(&self) -> u8 {
        self.state.iv
    }

    /// Segment-offset addressed read (`rdbl`): offset is a byte address
    /// into the tag's linear memory, not a block number.
    pub fn read_byte(
        &mut self,
        link: &mut dyn Link,
        offset: u16,
        timeout: Duration,
    ) -> Result<u8, CoreError> {
        link.send(opcode::ISO14443A_RAW, [offset as u32, 0, 0], &[])?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        reply
            .data
            .first()
            .copied()
            .ok_or(CoreError::WrongLength { got: 0, expected: 1 })
    }

    pub fn write_byte(
        &mut self,
        link: &mut dyn Link,
        offset: u16,
        value: u8,
        timeout: Duration,
    ) -> Result<(), CoreError> {
        link.send(opcode::ISO14443A_RAW, [offset as u32, value as u32, 0], &[])?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if reply.status != 0 {
            return Err(CoreError::CommandFailed(format!(
                "legic write at offset {} failed",
                offset
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DeviceReply, FakeLink};

    #[test]
    fn establish_then_read_byte() {
        let mut link = FakeLink::new()
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: vec![0x11, 0x22, 0x33, 0x44],
                },
            )
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: vec![0x7F],
                },
            );

        let mut session = LegicSession::new().establish(&mut link, 5, Duration::from_millis(500)).unwrap();
        assert_eq!(session.uid(), [0x11, 0x22, 0x33, 0x44]);
        assert_eq!(session.iv() & 0x01, 1);
        let byte = session.read_byte(&mut link, 0x10, Duration::from_millis(500)).unwrap();
        assert_eq!(byte, 0x7F);
    }

    fn sample_dump() -> Vec<u8> {
        let mut dump = vec![0u8; 32];
        dump[0] = 0x11;
        dump[1] = 0x22;
        dump[2] = 0x33;
        dump[3] = 0x44;
        dump[4] = crate::util::crc::crc8_legic(&dump[0..4]);
        for (i, b) in dump[OBFUSCATION_START..].iter_mut().enumerate() {
            *b = i as u8;
        }
        dump
    }

    #[test]
    fn deobfuscate_rejects_wrong_key() {
        let mut dump = sample_dump();
        dump[4] ^= 0xFF;
        assert!(matches!(deobfuscate(&mut dump), Err(CoreError::CrcFail)));
    }

    #[test]
    fn deobfuscate_is_idempotent_when_reapplied() {
        // Testable Property 2: de-obfuscation XORed back in a second time
        // restores the original bytes.
        let original = sample_dump();
        let mut dump = original.clone();
        deobfuscate(&mut dump).unwrap();
        assert_ne!(dump[OBFUSCATION_START..], original[OBFUSCATION_START..]);
        deobfuscate(&mut dump).unwrap();
        assert_eq!(dump, original);
    }

    #[test]
    fn deobfuscate_rejects_short_buffer() {
        let mut short = vec![0u8; 10];
        assert!(matches!(
            deobfuscate(&mut short),
            Err(CoreError::WrongLength { .. })
        ));
    }
}
