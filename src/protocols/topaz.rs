//! Topaz (NFC Forum Type 1 Tag) session: `REQA -> RID -> RALL`, then
//! 8-byte block read/write (spec §4.2).
//!
//! Ground truth: `client/src/cmdhftopaz.c`'s `CmdHFTopazReader`/
//! `CmdHFTopazDump` sequencing; command bytes come from `frame::topaz`.
//! The reader-fragment merge logic in `frame::topaz` is a trace-replay
//! concern (spec §4.8), not part of this live session.

use std::time::Duration;

use crate::error::CoreError;
use crate::frame::topaz as frame;
use crate::link::{opcode, Link};

pub struct Idle;
pub struct Selected {
    pub uid: [u8; 4],
    pub hr: [u8; 2],
}

pub struct TopazSession<S> {
    state: S,
}

impl TopazSession<Idle> {
    pub fn new() -> Self {
        TopazSession { state: Idle }
    }

    pub fn select(
        self,
        link: &mut dyn Link,
        timeout: Duration,
    ) -> Result<TopazSession<Selected>, CoreError> {
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &[frame::REQA])?;
        link.wait(opcode::ISO14443A_RAW, timeout)?;
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &[frame::RID])?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if reply.data.len() != 6 {
            return Err(CoreError::WrongLength {
                got: reply.data.len(),
                expected: 6,
            });
        }
        let mut hr = [0u8; 2];
        let mut uid = [0u8; 4];
        hr.copy_from_slice(&reply.data[..2]);
        uid.copy_from_slice(&reply.data[2..6]);
        Ok(TopazSession {
            state: Selected { uid, hr },
        })
    }
}

impl Default for TopazSession<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

impl TopazSession<Selected> {
    pub fn uid(&self) -> [u8; 4] {
        self.state.uid
    }

    pub fn hr(&self) -> [u8; 2] {
        self.state.hr
    }

    /// `RALL`: dumps the whole static memory block in one exchange.
    pub fn read_all(&mut self, link: &mut dyn Link, timeout: Duration) -> Result<Vec<u8>, CoreError> {
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &[frame::RALL, 0, 0])?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        Ok(reply.data)
    }

    pub fn read8(
        &mut self,
        link: &mut dyn Link,
        block_no: u8,
        timeout: Duration,
    ) -> Result<[u8; 8], CoreError> {
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &[frame::READ8, block_no])?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if reply.data.len() != 8 {
            return Err(CoreError::WrongLength {
                got: reply.data.len(),
                expected: 8,
            });
        }
        let mut block = [0u8; 8];
        block.copy_from_slice(&reply.data);
        Ok(block)
    }

    /// `WRITE-E` (erase-then-write, expects an ACK) vs `WRITE-NE`
    /// (non-erase, no ACK) per the byte flag chosen by the caller.
    pub fn write_byte(
        &mut self,
        link: &mut dyn Link,
        addr: u8,
        value: u8,
        erase: bool,
        timeout: Duration,
    ) -> Result<(), CoreError> {
        let cmd = if erase { frame::WRITE_E } else { frame::WRITE_NE };
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &[cmd, addr, value])?;
        if erase {
            let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
            if reply.status != 0 {
                return Err(CoreError::CommandFailed(format!(
                    "topaz write-e at address {} failed",
                    addr
                )));
            }
        }
        Ok(())
    }
}
