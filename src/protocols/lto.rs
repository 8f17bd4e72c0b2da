//! LTO-CM session: `WUPA -> select-SN -> select` with SAK verification,
//! 32-byte block reads via the 16-byte continuation fetch, and two-chunk
//! block writes (spec §4.7).
//!
//! Ground truth: `client/src/cmdhflto.c`'s `CmdHfLtoInfo`/`CmdHfLtoRrb`/
//! `CmdHfLtoWrb`, framed by `frame::lto`.

use std::time::Duration;

use crate::error::CoreError;
use crate::frame::lto as frame;
use crate::link::{opcode, Link};

pub struct Idle;
pub struct Selected {
    pub uid: [u8; 4],
    pub block_count: u32,
}

pub struct LtoSession<S> {
    state: S,
}

impl LtoSession<Idle> {
    pub fn new() -> Self {
        LtoSession { state: Idle }
    }

    pub fn select(
        self,
        link: &mut dyn Link,
        timeout: Duration,
    ) -> Result<LtoSession<Selected>, CoreError> {
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &frame::SELECT_SN)?;
        let sn_reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if sn_reply.data.len() != 4 {
            return Err(CoreError::WrongLength {
                got: sn_reply.data.len(),
                expected: 4,
            });
        }
        let mut uid = [0u8; 4];
        uid.copy_from_slice(&sn_reply.data);

        let select_frame = frame::encode_select(uid);
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &select_frame.data)?;
        let select_reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        let sak = select_reply.data.first().copied().unwrap_or(0);
        frame::verify_sak(sak)?;

        let type_info = select_reply.data.get(1).copied().unwrap_or(0);
        let block_count = frame::block_count_from_type_info(type_info)?;

        Ok(LtoSession {
            state: Selected { uid, block_count },
        })
    }
}

impl Default for LtoSession<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

impl LtoSession<Selected> {
    pub fn uid(&self) -> [u8; 4] {
        self.state.uid
    }

    pub fn block_count(&self) -> u32 {
        self.state.block_count
    }

    /// Reads a 32-byte block: the tag replies with the first 16 bytes,
    /// then a `READ_CONTINUATION` fetches the remaining 16.
    pub fn read_block(
        &mut self,
        link: &mut dyn Link,
        block: u8,
        timeout: Duration,
    ) -> Result<[u8; 32], CoreError> {
        if block as u32 >= self.state.block_count {
            return Err(CoreError::OutOfBound {
                offset: block as usize,
                len: self.state.block_count as usize,
            });
        }
        let first = frame::encode_read_block(block);
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &first.data)?;
        let first_reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        let first_half = frame::check_read_page(&first_reply.data)?;

        let cont = frame::encode_read_continuation();
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &cont.data)?;
        let second_reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        let second_half = frame::check_read_page(&second_reply.data)?;

        if first_half.data.len() < 18 || second_half.data.len() < 18 {
            return Err(CoreError::WrongLength {
                got: first_half.data.len().min(second_half.data.len()),
                expected: 18,
            });
        }
        let mut block_data = [0u8; 32];
        block_data[..16].copy_from_slice(&first_half.data[..16]);
        block_data[16..].copy_from_slice(&second_half.data[..16]);
        Ok(block_data)
    }

    /// Writes a 32-byte block as two 16-byte CRC-framed chunks, each
    /// expecting an `ACK` (spec §4.7).
    pub fn write_block(
        &mut self,
        link: &mut dyn Link,
        block: u8,
        data: &[u8; 32],
        timeout: Duration,
    ) -> Result<(), CoreError> {
        let select_write = frame::encode_write_block(block);
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &select_write.data)?;
        link.wait(opcode::ISO14443A_RAW, timeout)?;

        for chunk in [&data[..16], &data[16..]] {
            let mut fixed = [0u8; 16];
            fixed.copy_from_slice(chunk);
            let frame = frame::encode_write_chunk(&fixed);
            link.send(opcode::ISO14443A_RAW, [0, 0, 0], &frame.data)?;
            let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
            if reply.data.first().copied() != Some(frame::ACK) {
                return Err(CoreError::Nack(reply.data.first().copied().unwrap_or(0)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DeviceReply, FakeLink};

    #[test]
    fn select_verifies_sak_and_type_info() {
        let mut link = FakeLink::new()
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: vec![1, 2, 3, 4],
                },
            )
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: vec![frame::EXPECTED_SAK, 0x01],
                },
            );

        let selected = LtoSession::new().select(&mut link, Duration::from_millis(500)).unwrap();
        assert_eq!(selected.uid(), [1, 2, 3, 4]);
        assert_eq!(selected.block_count(), 101);
    }

    #[test]
    fn select_rejects_wrong_sak() {
        let mut link = FakeLink::new()
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: vec![1, 2, 3, 4],
                },
            )
            .expect(
                opcode::ISO14443A_RAW,
                DeviceReply {
                    opcode: opcode::ISO14443A_RAW,
                    status: 0,
                    args: [0; 3],
                    data: vec![0x00, 0x01],
                },
            );
        assert!(LtoSession::new().select(&mut link, Duration::from_millis(500)).is_err());
    }
}
