//! ISO/IEC 15693 (vicinity card) session: anticollision inventory, then
//! addressed read/write against a selected UID (spec §4.2, §4.6).
//!
//! Ground truth: `client/src/cmdhf15.c`'s `CmdHF15Reader`/`CmdHF15Info`
//! anticollision-then-addressed-access pattern, shared command set with
//! `frame::iso15693`.

use std::time::Duration;

use crate::error::CoreError;
use crate::frame::iso15693::{self as frame, flag};
use crate::link::{opcode, Link};

pub struct Idle;
pub struct Selected {
    pub uid: [u8; 8],
    pub dsfid: u8,
}

pub struct Iso15693Session<S> {
    state: S,
}

impl Iso15693Session<Idle> {
    pub fn new() -> Self {
        Iso15693Session { state: Idle }
    }

    /// Single-slot inventory; returns the first responder's UID/DSFID.
    pub fn inventory(
        self,
        link: &mut dyn Link,
        timeout: Duration,
    ) -> Result<Iso15693Session<Selected>, CoreError> {
        let request = frame::encode_unaddressed_request(flag::INVENTORY, frame::CMD_INVENTORY, &[0x00]);
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &request.data)?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        let (dsfid, uid) = frame::decode_inventory_reply(&reply.data)?;
        Ok(Iso15693Session {
            state: Selected { uid, dsfid },
        })
    }
}

impl Default for Iso15693Session<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

impl Iso15693Session<Selected> {
    pub fn uid(&self) -> [u8; 8] {
        self.state.uid
    }

    pub fn dsfid(&self) -> u8 {
        self.state.dsfid
    }

    pub fn read_block(
        &mut self,
        link: &mut dyn Link,
        block_no: u8,
        timeout: Duration,
    ) -> Result<Vec<u8>, CoreError> {
        let request = frame::encode_addressed_request(
            0,
            frame::CMD_READ_SINGLE_BLOCK,
            self.state.uid,
            &[block_no],
        );
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &request.data)?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        let decoded = frame::decode_frame(&reply.data)?;
        if decoded.data.len() < 3 {
            return Err(CoreError::WrongLength {
                got: decoded.data.len(),
                expected: 3,
            });
        }
        Ok(decoded.data[1..decoded.data.len() - 2].to_vec())
    }

    pub fn write_block(
        &mut self,
        link: &mut dyn Link,
        block_no: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<(), CoreError> {
        let mut payload = vec![block_no];
        payload.extend_from_slice(data);
        let request = frame::encode_addressed_request(
            flag::OPTION,
            frame::CMD_WRITE_SINGLE_BLOCK,
            self.state.uid,
            &payload,
        );
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &request.data)?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        if reply.status != 0 {
            return Err(CoreError::CommandFailed(format!(
                "iso15693 write block {} failed",
                block_no
            )));
        }
        Ok(())
    }
}
