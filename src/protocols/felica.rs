//! FeliCa session: polling (188 kbps Manchester-free) yields IDm/PMm, then
//! service-scoped read/write without encryption (spec §4.2).
//!
//! Ground truth: `client/src/cmdhffelica.c`'s `CmdHFFelicaSimLite`/
//! `CmdHFFelicaRequestService` shape, framed by `frame::felica`.

use std::time::Duration;

use crate::error::CoreError;
use crate::frame::felica as frame;
use crate::link::{opcode, Link};

pub struct Idle;
pub struct Polled {
    pub idm: [u8; 8],
    pub pmm: [u8; 8],
}

pub struct FelicaSession<S> {
    state: S,
}

impl FelicaSession<Idle> {
    pub fn new() -> Self {
        FelicaSession { state: Idle }
    }

    pub fn poll(
        self,
        link: &mut dyn Link,
        system_code: [u8; 2],
        timeout: Duration,
    ) -> Result<FelicaSession<Polled>, CoreError> {
        let mut payload = vec![frame::CMD_POLLING];
        payload.extend_from_slice(&system_code);
        payload.extend_from_slice(&[0x01, 0x00]);
        let request = frame::encode_packet(&payload);
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &request.data)?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        let decoded = frame::decode_packet(&reply.data)?;
        if decoded.data.len() < 17 {
            return Err(CoreError::WrongLength {
                got: decoded.data.len(),
                expected: 17,
            });
        }
        let mut idm = [0u8; 8];
        let mut pmm = [0u8; 8];
        idm.copy_from_slice(&decoded.data[1..9]);
        pmm.copy_from_slice(&decoded.data[9..17]);
        Ok(FelicaSession {
            state: Polled { idm, pmm },
        })
    }
}

impl Default for FelicaSession<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

impl FelicaSession<Polled> {
    pub fn idm(&self) -> [u8; 8] {
        self.state.idm
    }

    pub fn pmm(&self) -> [u8; 8] {
        self.state.pmm
    }

    pub fn read_without_encryption(
        &mut self,
        link: &mut dyn Link,
        service_code: [u8; 2],
        block_no: u8,
        timeout: Duration,
    ) -> Result<Vec<u8>, CoreError> {
        let mut payload = vec![frame::CMD_READ_WITHOUT_ENCRYPTION];
        payload.extend_from_slice(&self.state.idm);
        payload.push(0x01);
        payload.extend_from_slice(&service_code);
        payload.push(0x01);
        payload.push(0x80);
        payload.push(block_no);
        let request = frame::encode_packet(&payload);
        link.send(opcode::ISO14443A_RAW, [0, 0, 0], &request.data)?;
        let reply = link.wait(opcode::ISO14443A_RAW, timeout)?;
        let decoded = frame::decode_packet(&reply.data)?;
        if decoded.data.len() < 12 {
            return Err(CoreError::WrongLength {
                got: decoded.data.len(),
                expected: 12,
            });
        }
        Ok(decoded.data[12..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{DeviceReply, FakeLink};

    #[test]
    fn poll_extracts_idm_and_pmm() {
        let mut payload = vec![0x01u8];
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        payload.extend_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        let reply_frame = frame::encode_packet(&payload);

        let mut link = FakeLink::new().expect(
            opcode::ISO14443A_RAW,
            DeviceReply {
                opcode: opcode::ISO14443A_RAW,
                status: 0,
                args: [0; 3],
                data: reply_frame.data,
            },
        );

        let session = FelicaSession::new().poll(&mut link, [0xFF, 0xFF], Duration::from_millis(500)).unwrap();
        assert_eq!(session.idm(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(session.pmm(), [9, 10, 11, 12, 13, 14, 15, 16]);
    }
}
