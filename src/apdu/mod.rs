//! ISO/IEC 14443-4 (T=CL) APDU transport (spec §4.5).
//!
//! `IsoDepSession` is a small typestate: `Idle` can only `select`; the
//! resulting `Selected` handle (carrying the negotiated FSC) is the only
//! place `exchange_apdu`/`handle_apdu` live, mirroring the teacher's
//! `WizardMachine` idea of "a method only exists on the state it's valid
//! from" but expressed at the type level (an enum-and-match machine would
//! also work, but a real transport session is a better fit for the
//! compiler tracking "you can't exchange an APDU before selecting").

use std::time::Duration;

use crate::error::CoreError;
use crate::link::{DeviceReply, Link};

/// Max ETU timeout the device will accept for a single exchange (spec
/// §4.5: "clamped to 4949 ms max").
pub const MAX_ETU_TIMEOUT: Duration = Duration::from_millis(4949);

/// Protocol Control Byte bit layout used throughout this module.
mod pcb {
    pub const I_BLOCK_CHAINING: u8 = 0x10;
    pub const R_ACK_PATTERN: u8 = 0xA2;
    pub const R_ACK_MASK: u8 = 0xE2;
    pub const I_BLOCK_MASK: u8 = 0x80;
}

fn clamp_timeout(requested: Duration) -> Duration {
    if requested > MAX_ETU_TIMEOUT {
        MAX_ETU_TIMEOUT
    } else {
        requested
    }
}

/// Idle state: only RATS/ATTRIB (performed by the card-family modules, not
/// here — spec §4.5 places "perform RATS/ATTRIB" at connection
/// establishment, ahead of this transport) has happened yet, or not even
/// that.
pub struct Idle;

/// Selected state: FSC negotiated, `apdu_frame_length` fixed for the
/// session.
pub struct Selected {
    pub fsc: usize,
    pub apdu_frame_length: usize,
    chaining_out: bool,
}

pub struct IsoDepSession<S> {
    state: S,
}

impl IsoDepSession<Idle> {
    pub fn new() -> Self {
        IsoDepSession { state: Idle }
    }

    /// Completes connection establishment with the already-negotiated FSC
    /// (RATS/ATTRIB themselves are protocol-family specific and live in
    /// `protocols::*`).
    pub fn select(self, fsc: usize) -> IsoDepSession<Selected> {
        IsoDepSession {
            state: Selected {
                fsc,
                apdu_frame_length: fsc,
                chaining_out: false,
            },
        }
    }
}

impl Default for IsoDepSession<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

impl IsoDepSession<Selected> {
    pub fn apdu_frame_length(&self) -> usize {
        self.state.apdu_frame_length
    }

    /// `handle_apdu`: sends one I-block (or R-ACK if `chaining_in`'s
    /// continuation is requested by the caller already having more data
    /// queued) and returns the payload with trailing SW stripped, plus
    /// whether the reply itself requests chaining to continue.
    pub fn handle_apdu(
        &mut self,
        link: &mut dyn Link,
        opcode: u16,
        chaining_in: bool,
        data: &[u8],
        activate_field: bool,
        timeout: Duration,
    ) -> Result<(Vec<u8>, bool), CoreError> {
        if activate_field {
            log::debug!("apdu: reselecting card without disconnect");
        }
        let pcb = if chaining_in {
            0x00 | pcb::I_BLOCK_CHAINING
        } else {
            0x00
        };
        let mut payload = vec![pcb];
        payload.extend_from_slice(data);
        link.send(opcode, [0, 0, 0], &payload)?;
        let reply = link.wait(opcode, clamp_timeout(timeout))?;
        self.interpret_reply(reply)
    }

    fn interpret_reply(&mut self, reply: DeviceReply) -> Result<(Vec<u8>, bool), CoreError> {
        if reply.data.is_empty() {
            return Err(CoreError::WrongLength { got: 0, expected: 1 });
        }
        let first = reply.data[0];
        if first & pcb::R_ACK_MASK == pcb::R_ACK_PATTERN {
            self.state.chaining_out = true;
            return Ok((Vec::new(), true));
        }
        if first & pcb::I_BLOCK_MASK != 0 && first & pcb::I_BLOCK_CHAINING != 0 {
            self.state.chaining_out = true;
            let body = &reply.data[1..];
            return Ok((body.to_vec(), true));
        }
        self.state.chaining_out = false;
        if reply.data.len() < 3 {
            return Err(CoreError::WrongLength {
                got: reply.data.len(),
                expected: 3,
            });
        }
        // Strip PCB (byte 0) and trailing 2-byte SW.
        let body = reply.data[1..reply.data.len() - 2].to_vec();
        Ok((body, false))
    }

    /// `exchange_apdu`: segments `datain` into `apdu_frame_length`-sized
    /// I-blocks (chaining set on all but the last), then drains
    /// `handle_apdu(chaining=false)` while the reply keeps requesting
    /// chaining, accumulating the output.
    pub fn exchange_apdu(
        &mut self,
        link: &mut dyn Link,
        opcode: u16,
        datain: &[u8],
        activate: bool,
        leave_on: bool,
        timeout: Duration,
    ) -> Result<Vec<u8>, CoreError> {
        let max_payload = self.state.apdu_frame_length.saturating_sub(3).max(1);
        let mut out = Vec::new();
        let chunks: Vec<&[u8]> = if datain.is_empty() {
            vec![&[][..]]
        } else {
            datain.chunks(max_payload).collect()
        };
        let last_index = chunks.len() - 1;

        for (i, chunk) in chunks.iter().enumerate() {
            let is_last = i == last_index;
            let (body, _) = self.handle_apdu(link, opcode, !is_last, chunk, activate && i == 0, timeout)?;
            if is_last {
                out.extend_from_slice(&body);
            }
        }

        while self.state.chaining_out {
            let (body, _) = self.handle_apdu(link, opcode, false, &[], false, timeout)?;
            out.extend_from_slice(&body);
        }

        if !leave_on {
            link.send(opcode, [0, 0, 0], &[])?;
        }

        Ok(out)
    }
}

/// Contact smartcard backend retry loop: `61 XX` -> GET RESPONSE; `6C XX`
/// -> retransmit with `Le := SW2` (spec §4.5, shared with `smartcard`).
pub fn apply_sw_retry_rule(sw1: u8, sw2: u8) -> SwAction {
    match sw1 {
        0x61 => SwAction::GetResponse { le: sw2 },
        0x6C => SwAction::RetransmitWithLe { le: sw2 },
        _ => SwAction::Done,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwAction {
    GetResponse { le: u8 },
    RetransmitWithLe { le: u8 },
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{opcode, FakeLink};

    #[test]
    fn sw_61_triggers_get_response() {
        assert_eq!(
            apply_sw_retry_rule(0x61, 0x0A),
            SwAction::GetResponse { le: 0x0A }
        );
    }

    #[test]
    fn sw_6c_triggers_retransmit() {
        assert_eq!(
            apply_sw_retry_rule(0x6C, 0x05),
            SwAction::RetransmitWithLe { le: 0x05 }
        );
    }

    #[test]
    fn final_sw_stops_retry_loop() {
        assert_eq!(apply_sw_retry_rule(0x90, 0x00), SwAction::Done);
    }

    #[test]
    fn timeout_is_clamped_to_4949ms() {
        assert_eq!(clamp_timeout(Duration::from_secs(10)), MAX_ETU_TIMEOUT);
        assert_eq!(clamp_timeout(Duration::from_millis(100)), Duration::from_millis(100));
    }

    #[test]
    fn handle_apdu_strips_pcb_and_sw() {
        let mut session = IsoDepSession::new().select(256);
        let mut reply_data = vec![0x02u8]; // I-block, no chaining
        reply_data.extend_from_slice(&[0x90, 0x00]);
        let mut link = FakeLink::new().expect(
            opcode::ISO14443A_RAW,
            DeviceReply {
                opcode: opcode::ISO14443A_RAW,
                status: 0,
                args: [0; 3],
                data: reply_data,
            },
        );
        let (body, chaining) = session
            .handle_apdu(&mut link, opcode::ISO14443A_RAW, false, &[0x00, 0xA4, 0x04, 0x00], false, Duration::from_millis(500))
            .unwrap();
        assert!(body.is_empty());
        assert!(!chaining);
    }

    #[test]
    fn handle_apdu_detects_rack_continuation() {
        let mut session = IsoDepSession::new().select(256);
        let mut link = FakeLink::new().expect(
            opcode::ISO14443A_RAW,
            DeviceReply {
                opcode: opcode::ISO14443A_RAW,
                status: 0,
                args: [0; 3],
                data: vec![0xA2],
            },
        );
        let (_, chaining) = session
            .handle_apdu(&mut link, opcode::ISO14443A_RAW, false, &[], false, Duration::from_millis(500))
            .unwrap();
        assert!(chaining);
    }
}
